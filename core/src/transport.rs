//! Blocking execution of `HttpRequest` values.
//!
//! # Design
//! `Transport` is the only place the client touches the network. The
//! default implementation uses ureq with status-as-error disabled, so 4xx
//! and 5xx answers come back as data and the client's `parse_*` methods
//! decide what counts as success. Tests swap in their own `Transport` to
//! observe the requests that would be sent.

use tracing::debug;

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, StreamingResponse};

/// Executes one HTTP exchange.
pub trait Transport {
    /// Send `request` and return the response with an unread body.
    fn execute_streaming(&self, request: HttpRequest) -> Result<StreamingResponse, ApiError>;

    /// Send `request` and read the whole response body.
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        self.execute_streaming(request)?
            .into_buffered()
            .map_err(|e| ApiError::Transport(ureq::Error::Io(e)))
    }
}

impl<T: Transport + ?Sized> Transport for &T {
    fn execute_streaming(&self, request: HttpRequest) -> Result<StreamingResponse, ApiError> {
        (**self).execute_streaming(request)
    }

    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        (**self).execute(request)
    }
}

/// `Transport` backed by a blocking ureq agent.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }

    /// Use a caller-configured agent (proxies, TLS, timeouts).
    ///
    /// The agent must be built with `http_status_as_error(false)`, otherwise
    /// non-200 answers surface as `ApiError::Transport` instead of
    /// `ApiError::RequestFailed`.
    pub fn with_agent(agent: ureq::Agent) -> Self {
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn execute_streaming(&self, request: HttpRequest) -> Result<StreamingResponse, ApiError> {
        let HttpRequest {
            method,
            url,
            headers,
            body,
        } = request;
        debug!(%method, %url, "sending request");

        let body = body.unwrap_or_default();
        let response = match method {
            HttpMethod::Get => with_headers(self.agent.get(url.as_str()), &headers).call(),
            HttpMethod::Delete => with_headers(self.agent.delete(url.as_str()), &headers).call(),
            HttpMethod::Post => with_headers(self.agent.post(url.as_str()), &headers).send(&body[..]),
            HttpMethod::Put => with_headers(self.agent.put(url.as_str()), &headers).send(&body[..]),
            HttpMethod::Patch => with_headers(self.agent.patch(url.as_str()), &headers).send(&body[..]),
        }?;

        let status = response.status().as_u16();
        debug!(%method, %url, status, "received response");
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();

        Ok(StreamingResponse {
            status,
            headers,
            body: Box::new(response.into_body().into_reader()),
        })
    }
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}
