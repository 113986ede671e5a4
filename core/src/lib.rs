//! Blocking client for a path-addressed file-management HTTP server.
//!
//! # Overview
//! Local file operations (read, write, list, copy, move, zip, hash) map onto
//! HTTP verbs against `origin + path_prefix + remote_path`. GET, PUT and
//! DELETE transfer raw file contents, POST uploads a multipart form, and
//! PATCH runs a server-side command described by a small JSON body.
//!
//! # Design
//! - `ClientConfig` is validated once and immutable; session cookies are
//!   supplied by the caller and attached to every request.
//! - Each operation is split into `build_*` (produces an `HttpRequest`) and
//!   `parse_*` (consumes an `HttpResponse`), with a `Transport` in between.
//!   `RemoteFileClient` runs all three for one-call operations.
//! - Success is exactly HTTP 200. Nothing is retried.

pub mod client;
pub mod command;
pub mod config;
pub mod error;
pub mod http;
pub mod local;
pub mod multipart;
pub mod transport;

pub use client::RemoteFileClient;
pub use command::{Command, PatchBody};
pub use config::{ClientConfig, Credential};
pub use error::{ApiError, ConfigError, PreconditionError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, StreamingResponse};
pub use local::{read_local, write_local};
pub use transport::{Transport, UreqTransport};
