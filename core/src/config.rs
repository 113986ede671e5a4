//! Client configuration: server origin, URL path prefix and session cookies.
//!
//! A `ClientConfig` is validated once when it is built and cannot be changed
//! afterwards, so every request made with it targets a well-formed URL.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

/// Session cookies attached to every request.
///
/// The client never inspects the values; they are supplied by whatever
/// performed the login.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Credential {
    cookies: BTreeMap<String, String>,
}

impl Credential {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a cookie.
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    /// Value for a `Cookie` request header, or `None` when there are no cookies.
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        let pairs: Vec<String> = self
            .cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        Some(pairs.join("; "))
    }
}

/// Validated connection settings for `RemoteFileClient`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    origin: String,
    path_prefix: String,
    credential: Credential,
}

/// On-disk shape of a `ClientConfig`, validated by `ClientConfig::new`.
#[derive(Deserialize)]
struct RawConfig {
    origin: String,
    path_prefix: String,
    #[serde(default)]
    credential: Credential,
}

impl ClientConfig {
    /// Validate and build a configuration.
    ///
    /// `origin` must be `http://host[:port]` or `https://host[:port]` with
    /// nothing after the authority. `path_prefix` must start and end with `/`
    /// and must not contain `:`.
    pub fn new(
        origin: impl Into<String>,
        path_prefix: impl Into<String>,
        credential: Credential,
    ) -> Result<Self, ConfigError> {
        let origin = origin.into();
        let path_prefix = path_prefix.into();
        validate_origin(&origin)?;
        validate_prefix(&path_prefix)?;
        Ok(Self {
            origin,
            path_prefix,
            credential,
        })
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(toml_str)?;
        Self::new(raw.origin, raw.path_prefix, raw.credential)
    }

    /// Load and validate a TOML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!("loaded client config from {:?}", path);
        Self::from_toml(&contents)
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn path_prefix(&self) -> &str {
        &self.path_prefix
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Full request URL for a remote path.
    pub fn url_for(&self, remote_path: &str) -> String {
        format!("{}{}{}", self.origin, self.path_prefix, remote_path)
    }
}

fn validate_origin(origin: &str) -> Result<(), ConfigError> {
    let authority = origin
        .strip_prefix("http://")
        .or_else(|| origin.strip_prefix("https://"))
        .ok_or_else(|| ConfigError::OriginScheme(origin.to_string()))?;
    if authority.is_empty() || authority.contains('/') {
        return Err(ConfigError::OriginHasPath(origin.to_string()));
    }
    Ok(())
}

fn validate_prefix(prefix: &str) -> Result<(), ConfigError> {
    if !prefix.starts_with('/') {
        return Err(ConfigError::PrefixMissingLeadingSlash(prefix.to_string()));
    }
    if !prefix.ends_with('/') {
        return Err(ConfigError::PrefixMissingTrailingSlash(prefix.to_string()));
    }
    if prefix.contains(':') {
        return Err(ConfigError::PrefixHasPortDelimiter(prefix.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(origin: &str, prefix: &str) -> Result<ClientConfig, ConfigError> {
        ClientConfig::new(origin, prefix, Credential::new())
    }

    #[test]
    fn accepts_plain_origins() {
        assert!(config("http://localhost:8080", "/files/").is_ok());
        assert!(config("https://example.com", "/").is_ok());
    }

    #[test]
    fn rejects_origin_without_scheme() {
        let err = config("localhost:8080", "/files/").unwrap_err();
        assert!(matches!(err, ConfigError::OriginScheme(_)));

        let err = config("ftp://example.com", "/files/").unwrap_err();
        assert!(matches!(err, ConfigError::OriginScheme(_)));
    }

    #[test]
    fn rejects_origin_with_path_segment() {
        let err = config("http://example.com/api", "/files/").unwrap_err();
        assert!(matches!(err, ConfigError::OriginHasPath(_)));

        let err = config("http://example.com/", "/files/").unwrap_err();
        assert!(matches!(err, ConfigError::OriginHasPath(_)));
    }

    #[test]
    fn rejects_origin_with_second_scheme() {
        let err = config("http://https://example.com", "/files/").unwrap_err();
        assert!(matches!(err, ConfigError::OriginHasPath(_)));
    }

    #[test]
    fn rejects_origin_without_host() {
        let err = config("https://", "/files/").unwrap_err();
        assert!(matches!(err, ConfigError::OriginHasPath(_)));
    }

    #[test]
    fn rejects_malformed_prefixes() {
        let err = config("http://localhost", "files/").unwrap_err();
        assert!(matches!(err, ConfigError::PrefixMissingLeadingSlash(_)));

        let err = config("http://localhost", "/files").unwrap_err();
        assert!(matches!(err, ConfigError::PrefixMissingTrailingSlash(_)));

        let err = config("http://localhost", "/files:8080/").unwrap_err();
        assert!(matches!(err, ConfigError::PrefixHasPortDelimiter(_)));
    }

    #[test]
    fn url_joins_origin_prefix_and_path() {
        let config = config("http://localhost:8080", "/files/").unwrap();
        assert_eq!(config.url_for("a/b.txt"), "http://localhost:8080/files/a/b.txt");
    }

    #[test]
    fn cookie_header_is_sorted_and_joined() {
        let credential = Credential::new()
            .with_cookie("session", "abc")
            .with_cookie("csrf", "xyz");
        assert_eq!(credential.cookie_header().as_deref(), Some("csrf=xyz; session=abc"));
        assert_eq!(Credential::new().cookie_header(), None);
    }

    #[test]
    fn from_toml_validates() {
        let config = ClientConfig::from_toml(
            r#"
            origin = "http://localhost:8080"
            path_prefix = "/files/"

            [credential]
            session = "abc123"
            "#,
        )
        .unwrap();
        assert_eq!(config.origin(), "http://localhost:8080");
        assert_eq!(config.credential().cookie_header().as_deref(), Some("session=abc123"));

        let err = ClientConfig::from_toml(
            r#"
            origin = "http://localhost:8080/api"
            path_prefix = "/files/"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::OriginHasPath(_)));

        let err = ClientConfig::from_toml("origin = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = ClientConfig::load("/nonexistent/fileutil.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
