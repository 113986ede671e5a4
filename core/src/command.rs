//! Server-side commands carried in PATCH request bodies.
//!
//! # Design
//! The server overloads PATCH to run filesystem commands on the addressed
//! path. Each supported command is one `Command` variant; all of them
//! serialize to the same wire shape:
//!
//! ```json
//! {"command": "mv", "otherPath": "/files/b.txt"}
//! ```
//!
//! `otherPath` is only present for two-path commands and is rewritten to
//! include the client's path prefix before it is sent.

use serde::Serialize;

/// A filesystem command executed by the server on a remote path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Test whether the path is a directory.
    IsDir,
    Mv { other_path: String },
    Cp { other_path: String },
    /// Archive the path into `other_path`, which must end with `.zip`.
    Zip { other_path: String },
    /// Extract the `.zip` archive at the path into `other_path`.
    Unzip { other_path: String },
    Ls,
    Mkdir,
    Md5,
    Sha256,
}

/// JSON body of a PATCH request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchBody {
    pub command: &'static str,
    #[serde(rename = "otherPath", skip_serializing_if = "Option::is_none")]
    pub other_path: Option<String>,
}

impl Command {
    /// Command name understood by the server.
    pub fn name(&self) -> &'static str {
        match self {
            Command::IsDir => "-d",
            Command::Mv { .. } => "mv",
            Command::Cp { .. } => "cp",
            Command::Zip { .. } => "zip",
            Command::Unzip { .. } => "unzip",
            Command::Ls => "ls",
            Command::Mkdir => "mkdir",
            Command::Md5 => "md5",
            Command::Sha256 => "sha256",
        }
    }

    /// Secondary path of a two-path command, as given by the caller.
    pub fn other_path(&self) -> Option<&str> {
        match self {
            Command::Mv { other_path }
            | Command::Cp { other_path }
            | Command::Zip { other_path }
            | Command::Unzip { other_path } => Some(other_path),
            Command::IsDir | Command::Ls | Command::Mkdir | Command::Md5 | Command::Sha256 => None,
        }
    }

    /// Wire body with `otherPath` prefixed by `path_prefix`.
    pub fn to_body(&self, path_prefix: &str) -> PatchBody {
        PatchBody {
            command: self.name(),
            other_path: self.other_path().map(|path| format!("{path_prefix}{path}")),
        }
    }
}
