//! `multipart/form-data` encoding for uploads.
//!
//! The server saves every form part as a file named after the part's field
//! name, so an upload is a single part whose field name and filename are the
//! destination file name.

use uuid::Uuid;

/// An encoded single-file form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartForm {
    pub content_type: String,
    pub body: Vec<u8>,
}

impl MultipartForm {
    /// Encode one file part with a random boundary.
    pub fn single_file(name: &str, data: &[u8]) -> Self {
        let boundary = format!("------------------------{}", Uuid::new_v4().simple());
        Self::with_boundary(&boundary, name, data)
    }

    pub fn with_boundary(boundary: &str, name: &str, data: &[u8]) -> Self {
        let name = escape_quoted(name);
        let mut body = Vec::with_capacity(data.len() + 256);
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{name}\"; filename=\"{name}\"\r\n")
                .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
        Self {
            content_type: format!("multipart/form-data; boundary={boundary}"),
            body,
        }
    }
}

/// Percent-encode the characters that would end a quoted header parameter.
fn escape_quoted(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}
