//! Request building, response parsing and execution for the file API.
//!
//! # Design
//! Every operation is split the same way: a `build_*` method produces an
//! `HttpRequest`, the `Transport` executes it, and a `parse_*` method turns
//! the `HttpResponse` into the result. The builders and parsers are public
//! and free of I/O, so callers can drive the exchange themselves; the
//! operation methods (`get`, `mv`, `ls`, ...) glue the three together and
//! perform exactly one request each.
//!
//! The client keeps no per-request state. A failed exchange is reported
//! through `ApiError::RequestFailed`, which carries the status and body.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use tracing::{debug, warn};

use crate::command::Command;
use crate::config::ClientConfig;
use crate::error::{ApiError, PreconditionError};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::local;
use crate::multipart::MultipartForm;
use crate::transport::{Transport, UreqTransport};

const DOWNLOAD_BUFFER_SIZE: usize = 64 * 1024;

/// Blocking client for a path-addressed file-management server.
#[derive(Debug, Clone)]
pub struct RemoteFileClient<T = UreqTransport> {
    config: ClientConfig,
    transport: T,
}

impl RemoteFileClient<UreqTransport> {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_transport(config, UreqTransport::new())
    }
}

impl<T: Transport> RemoteFileClient<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    // -----------------------------------------------------------------------
    // Request builders
    // -----------------------------------------------------------------------

    pub fn build_get(&self, remote_path: &str) -> HttpRequest {
        self.request(HttpMethod::Get, remote_path, Vec::new(), None)
    }

    pub fn build_put(&self, data: &[u8], remote_path: &str) -> HttpRequest {
        self.request(HttpMethod::Put, remote_path, Vec::new(), Some(data.to_vec()))
    }

    pub fn build_delete(&self, remote_path: &str) -> HttpRequest {
        self.request(HttpMethod::Delete, remote_path, Vec::new(), None)
    }

    /// Build a multipart POST that stores `data` at `remote_target`.
    ///
    /// The request goes to the parent directory of `remote_target`; the form
    /// part is named after its final segment.
    pub fn build_upload(&self, data: &[u8], remote_target: &str) -> Result<HttpRequest, ApiError> {
        let (dir, name) = split_target(remote_target);
        if name.is_empty() {
            return Err(PreconditionError::MissingFileName(remote_target.to_string()).into());
        }
        let form = MultipartForm::single_file(name, data);
        Ok(self.request(
            HttpMethod::Post,
            dir,
            vec![("content-type".to_string(), form.content_type)],
            Some(form.body),
        ))
    }

    /// Build the PATCH request running `command` on `remote_path`.
    pub fn build_patch(&self, remote_path: &str, command: &Command) -> Result<HttpRequest, ApiError> {
        let body = serde_json::to_vec(&command.to_body(self.config.path_prefix()))
            .map_err(|e| ApiError::Serialization(e.to_string()))?;
        Ok(self.request(
            HttpMethod::Patch,
            remote_path,
            vec![("content-type".to_string(), "application/json".to_string())],
            Some(body),
        ))
    }

    fn request(
        &self,
        method: HttpMethod,
        remote_path: &str,
        mut headers: Vec<(String, String)>,
        body: Option<Vec<u8>>,
    ) -> HttpRequest {
        if let Some(cookie) = self.config.credential().cookie_header() {
            headers.push(("cookie".to_string(), cookie));
        }
        HttpRequest {
            method,
            url: self.config.url_for(remote_path),
            headers,
            body,
        }
    }

    // -----------------------------------------------------------------------
    // Response parsers
    // -----------------------------------------------------------------------

    /// Accept a 200 response and ignore its body.
    pub fn parse_empty(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response)
    }

    pub fn parse_get(&self, response: HttpResponse) -> Result<Vec<u8>, ApiError> {
        check_status(&response)?;
        Ok(response.body)
    }

    /// A non-empty body means the path is a directory.
    pub fn parse_is_dir(&self, response: HttpResponse) -> Result<bool, ApiError> {
        check_status(&response)?;
        Ok(!response.body.is_empty())
    }

    /// Split the listing on `\n`.
    ///
    /// The split is literal: a body ending in a newline yields a trailing
    /// empty name and an empty body yields a single empty name.
    pub fn parse_ls(&self, response: HttpResponse) -> Result<Vec<String>, ApiError> {
        check_status(&response)?;
        Ok(response.text().split('\n').map(str::to_string).collect())
    }

    /// Digest string exactly as the server formatted it.
    pub fn parse_digest(&self, response: HttpResponse) -> Result<String, ApiError> {
        check_status(&response)?;
        Ok(response.text())
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    pub fn read_local<P: AsRef<Path>>(&self, path: P) -> Result<Vec<u8>, ApiError> {
        local::read_local(path)
    }

    pub fn write_local<P: AsRef<Path>>(&self, data: &[u8], path: P) -> Result<(), ApiError> {
        local::write_local(data, path)
    }

    /// Send a prepared request and return the raw response, whatever its status.
    pub fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        self.transport.execute(request)
    }

    /// Run `command` on `remote_path` and return the 200 response.
    pub fn patch(&self, remote_path: &str, command: &Command) -> Result<HttpResponse, ApiError> {
        let response = self.execute(self.build_patch(remote_path, command)?)?;
        check_status(&response)?;
        Ok(response)
    }

    /// Fetch a remote file into memory.
    pub fn get(&self, remote_path: &str) -> Result<Vec<u8>, ApiError> {
        self.parse_get(self.execute(self.build_get(remote_path))?)
    }

    /// Store `data` as the remote file at `remote_path`.
    pub fn put(&self, data: &[u8], remote_path: &str) -> Result<(), ApiError> {
        self.parse_empty(self.execute(self.build_put(data, remote_path))?)
    }

    /// Delete a remote file or directory tree.
    pub fn delete(&self, remote_path: &str) -> Result<(), ApiError> {
        self.parse_empty(self.execute(self.build_delete(remote_path))?)
    }

    /// Stream a remote file into `local_path` and return the number of bytes written.
    ///
    /// The status is checked before the local file is created. If the
    /// transfer fails partway, the partially written file is left in place.
    pub fn download<P: AsRef<Path>>(&self, remote_path: &str, local_path: P) -> Result<u64, ApiError> {
        let local_path = local_path.as_ref();
        let mut response = self.transport.execute_streaming(self.build_get(remote_path))?;
        if response.status != 200 {
            let status = response.status;
            let response = response.into_buffered().unwrap_or_else(|_| HttpResponse {
                status,
                headers: Vec::new(),
                body: Vec::new(),
            });
            return Err(request_failed(&response));
        }

        let mut file = File::create(local_path).map_err(|e| ApiError::local_io(local_path, e))?;
        let mut buf = vec![0u8; DOWNLOAD_BUFFER_SIZE];
        let mut written = 0u64;
        loop {
            let n = match response.body.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(ApiError::Transport(ureq::Error::Io(e))),
            };
            file.write_all(&buf[..n])
                .map_err(|e| ApiError::local_io(local_path, e))?;
            written += n as u64;
        }
        file.flush().map_err(|e| ApiError::local_io(local_path, e))?;
        debug!(remote_path, ?local_path, bytes = written, "download complete");
        Ok(written)
    }

    /// Upload the local file at `local_path` to `remote_target`.
    pub fn upload<P: AsRef<Path>>(&self, local_path: P, remote_target: &str) -> Result<(), ApiError> {
        let (_, name) = split_target(remote_target);
        if name.is_empty() {
            return Err(PreconditionError::MissingFileName(remote_target.to_string()).into());
        }
        let data = local::read_local(local_path)?;
        self.parse_empty(self.execute(self.build_upload(&data, remote_target)?)?)
    }

    pub fn is_dir(&self, remote_path: &str) -> Result<bool, ApiError> {
        self.parse_is_dir(self.execute(self.build_patch(remote_path, &Command::IsDir)?)?)
    }

    /// Move or rename `from` to `to`.
    pub fn mv(&self, from: &str, to: &str) -> Result<(), ApiError> {
        let command = Command::Mv {
            other_path: to.to_string(),
        };
        self.patch(from, &command).map(drop)
    }

    /// Copy a file or directory tree.
    pub fn cp(&self, from: &str, to: &str) -> Result<(), ApiError> {
        let command = Command::Cp {
            other_path: to.to_string(),
        };
        self.patch(from, &command).map(drop)
    }

    /// Archive `from` into the new `.zip` file `to`.
    pub fn zip(&self, from: &str, to: &str) -> Result<(), ApiError> {
        if !to.ends_with(".zip") {
            return Err(PreconditionError::ZipTargetExtension(to.to_string()).into());
        }
        let command = Command::Zip {
            other_path: to.to_string(),
        };
        self.patch(from, &command).map(drop)
    }

    /// Extract the `.zip` archive `from` into `to`.
    pub fn unzip(&self, from: &str, to: &str) -> Result<(), ApiError> {
        if !from.ends_with(".zip") {
            return Err(PreconditionError::UnzipSourceExtension(from.to_string()).into());
        }
        let command = Command::Unzip {
            other_path: to.to_string(),
        };
        self.patch(from, &command).map(drop)
    }

    /// Names of the entries in a remote directory, in server order.
    pub fn ls(&self, remote_path: &str) -> Result<Vec<String>, ApiError> {
        self.parse_ls(self.execute(self.build_patch(remote_path, &Command::Ls)?)?)
    }

    pub fn mkdir(&self, remote_path: &str) -> Result<(), ApiError> {
        self.patch(remote_path, &Command::Mkdir).map(drop)
    }

    pub fn md5(&self, remote_path: &str) -> Result<String, ApiError> {
        self.parse_digest(self.execute(self.build_patch(remote_path, &Command::Md5)?)?)
    }

    pub fn sha256(&self, remote_path: &str) -> Result<String, ApiError> {
        self.parse_digest(self.execute(self.build_patch(remote_path, &Command::Sha256)?)?)
    }
}

/// Anything other than 200 is a failure.
fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if response.status == 200 {
        return Ok(());
    }
    Err(request_failed(response))
}

fn request_failed(response: &HttpResponse) -> ApiError {
    let body = response.text();
    warn!(status = response.status, %body, "request failed");
    ApiError::RequestFailed {
        status: response.status,
        body,
    }
}

/// Split an upload target into its directory and final segment.
fn split_target(target: &str) -> (&str, &str) {
    target.rsplit_once('/').unwrap_or(("", target))
}
