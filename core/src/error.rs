//! Error types for the file-management client.
//!
//! # Design
//! Failures fall into four groups: a malformed configuration (`ConfigError`,
//! returned by `ClientConfig` constructors before a client exists),
//! arguments the client refuses before sending anything
//! (`PreconditionError`), a server answer other than 200
//! (`ApiError::RequestFailed`), and local or transport I/O failures. Nothing
//! is retried; every error aborts the single operation in flight.

use std::path::PathBuf;

use thiserror::Error;

/// Rejected `ClientConfig` values.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("origin must start with http:// or https://, got {0:?}")]
    OriginScheme(String),

    #[error("origin must not contain a path segment or a second scheme, got {0:?}")]
    OriginHasPath(String),

    #[error("path prefix must start with '/', got {0:?}")]
    PrefixMissingLeadingSlash(String),

    #[error("path prefix must end with '/', got {0:?}")]
    PrefixMissingTrailingSlash(String),

    #[error("path prefix must not contain ':', got {0:?}")]
    PrefixHasPortDelimiter(String),

    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Arguments rejected before any request is sent.
#[derive(Debug, Error)]
pub enum PreconditionError {
    /// `zip` destination must name a `.zip` archive.
    #[error("zip destination must end with \".zip\", got {0:?}")]
    ZipTargetExtension(String),

    /// `unzip` source must name a `.zip` archive.
    #[error("unzip source must end with \".zip\", got {0:?}")]
    UnzipSourceExtension(String),

    /// Upload target has no final segment to use as the file name.
    #[error("upload target has no file name: {0:?}")]
    MissingFileName(String),
}

/// Errors returned by `RemoteFileClient` operations.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    /// The server answered with a status other than 200.
    #[error("request failed with HTTP {status}: {body}")]
    RequestFailed { status: u16, body: String },

    /// Reading or writing a local file failed.
    #[error("local I/O error on {path:?}: {source}")]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The HTTP exchange itself failed (connection, protocol, body read).
    #[error("transport error: {0}")]
    Transport(#[from] ureq::Error),

    /// The command body could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl ApiError {
    /// Status code of a `RequestFailed` error.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::RequestFailed { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn local_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ApiError::LocalIo {
            path: path.into(),
            source,
        }
    }
}
