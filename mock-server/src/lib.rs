//! In-memory file-management server speaking the same HTTP contract as the
//! production server: raw GET/PUT/DELETE on paths under a URL prefix,
//! multipart POST uploads, and PATCH commands carried in a JSON body.

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};
use std::sync::Arc;

use axum::{
    body::{to_bytes, Bytes},
    extract::{FromRequest, Multipart, Request, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use md5::Md5;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;
use zip::{write::SimpleFileOptions, CompressionMethod, ZipArchive, ZipWriter};

/// Server settings.
#[derive(Clone, Debug)]
pub struct MockConfig {
    /// Every request path must start with this prefix.
    pub url_prefix: String,
    /// When set, requests must carry this `name=value` cookie.
    pub session_cookie: Option<(String, String)>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            url_prefix: "/files/".to_string(),
            session_cookie: None,
        }
    }
}

/// A stored entry. Directories have no payload; their children are the keys
/// below them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    File(Vec<u8>),
    Dir,
}

/// Paths relative to the prefix, without leading or trailing slashes. The
/// root directory is the empty key and always exists.
pub type Db = Arc<RwLock<BTreeMap<String, Node>>>;

#[derive(Clone)]
struct AppState {
    config: Arc<MockConfig>,
    db: Db,
}

#[derive(Default, Deserialize)]
struct PatchRequest {
    #[serde(default)]
    command: String,
    #[serde(default, rename = "otherPath")]
    other_path: String,
}

/// Plain-text error reply.
#[derive(Debug)]
struct Failure(StatusCode, String);

impl Failure {
    fn bad_request(msg: impl std::fmt::Display) -> Self {
        Failure(StatusCode::BAD_REQUEST, format!("Bad Request: {msg}"))
    }

    fn not_found(msg: impl std::fmt::Display) -> Self {
        Failure(StatusCode::NOT_FOUND, format!("File Not Found: {msg}"))
    }

    fn internal(msg: impl std::fmt::Display) -> Self {
        Failure(StatusCode::INTERNAL_SERVER_ERROR, format!("Internal Server Error: {msg}"))
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        debug!(status = %self.0, message = %self.1, "request rejected");
        (self.0, self.1).into_response()
    }
}

type Reply = Result<Response, Failure>;

pub fn app(config: MockConfig) -> Router {
    app_with_db(config, new_db())
}

/// Router over an existing tree, so tests can inspect or seed it.
pub fn app_with_db(config: MockConfig, db: Db) -> Router {
    let state = AppState {
        config: Arc::new(config),
        db,
    };
    Router::new().fallback(handle).with_state(state)
}

pub fn new_db() -> Db {
    let mut tree = BTreeMap::new();
    tree.insert(String::new(), Node::Dir);
    Arc::new(RwLock::new(tree))
}

pub async fn run(listener: TcpListener, config: MockConfig) -> Result<(), std::io::Error> {
    axum::serve(listener, app(config)).await
}

async fn handle(State(state): State<AppState>, request: Request) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    debug!(%method, %path, "handling request");

    match dispatch(&state, method, &path, request).await {
        Ok(response) => response,
        Err(failure) => failure.into_response(),
    }
}

async fn dispatch(state: &AppState, method: Method, path: &str, request: Request) -> Reply {
    if let Some((name, value)) = &state.config.session_cookie {
        if !has_cookie(&request, name, value) {
            return Err(Failure(StatusCode::UNAUTHORIZED, "Unauthorized".to_string()));
        }
    }
    let key = key_for(&state.config.url_prefix, path)
        .ok_or_else(|| Failure::internal("Wrong Prefix"))?;

    match method {
        Method::GET => get(state, &key).await,
        Method::PUT => {
            let body = read_body(request).await?;
            put(state, &key, body).await
        }
        Method::DELETE => delete(state, &key).await,
        Method::POST => {
            let multipart = Multipart::from_request(request, state)
                .await
                .map_err(Failure::bad_request)?;
            post(state, &key, multipart).await
        }
        Method::PATCH => {
            let body = read_body(request).await?;
            // Unparseable bodies fall through to the unknown-command reply.
            let patch: PatchRequest = serde_json::from_slice(&body).unwrap_or_default();
            debug!(command = %patch.command, other_path = %patch.other_path, "patch body");
            run_command(state, &key, patch).await
        }
        _ => Err(Failure::bad_request("Unsupported Method")),
    }
}

async fn get(state: &AppState, key: &str) -> Reply {
    let tree = state.db.read().await;
    match tree.get(key) {
        Some(Node::File(data)) => Ok(data.clone().into_response()),
        Some(Node::Dir) => Ok(text(children_text(&tree, key))),
        None => Err(Failure::not_found(key)),
    }
}

async fn put(state: &AppState, key: &str, body: Bytes) -> Reply {
    let mut tree = state.db.write().await;
    require_parent_dir(&tree, key).map_err(|_| Failure::not_found(key))?;
    if matches!(tree.get(key), Some(Node::Dir)) {
        return Err(Failure::internal("is a directory"));
    }
    tree.insert(key.to_string(), Node::File(body.to_vec()));
    Ok(ok())
}

async fn delete(state: &AppState, key: &str) -> Reply {
    let mut tree = state.db.write().await;
    let doomed: Vec<String> = subtree(&tree, key).into_iter().map(|(rel, _)| join(key, &rel)).collect();
    for k in doomed {
        tree.remove(&k);
    }
    // Deleting the root empties it.
    tree.insert(String::new(), Node::Dir);
    Ok(ok())
}

async fn post(state: &AppState, key: &str, mut multipart: Multipart) -> Reply {
    let mut tree = state.db.write().await;
    if !matches!(tree.get(key), Some(Node::Dir)) {
        return Err(Failure::not_found(key));
    }
    while let Some(field) = multipart.next_field().await.map_err(Failure::internal)? {
        let name = field
            .name()
            .map(str::to_string)
            .ok_or_else(|| Failure::bad_request("unnamed form field"))?;
        if name.is_empty() || name.contains('/') || name == "." || name == ".." {
            return Err(Failure::bad_request(format!("invalid file name {name:?}")));
        }
        let data = field.bytes().await.map_err(Failure::internal)?;
        tree.insert(join(key, &name), Node::File(data.to_vec()));
    }
    Ok(ok())
}

async fn run_command(state: &AppState, key: &str, patch: PatchRequest) -> Reply {
    let other = if patch.other_path.is_empty() {
        None
    } else {
        Some(key_for(&state.config.url_prefix, &patch.other_path).ok_or_else(|| {
            Failure::bad_request(format!(
                "Path did not start with url prefix: {}",
                patch.other_path
            ))
        })?)
    };
    let need_other = || other.clone().ok_or_else(|| Failure::bad_request("missing otherPath"));

    let mut tree = state.db.write().await;
    match patch.command.as_str() {
        "-d" => match tree.get(key) {
            Some(Node::Dir) => Ok(text("1".to_string())),
            Some(Node::File(_)) => Ok(ok()),
            None => Err(Failure::internal(format!("no such file: {key}"))),
        },
        "mv" => {
            let dest = need_other()?;
            transplant(&mut tree, key, &dest, true)?;
            Ok(ok())
        }
        "cp" => {
            let dest = need_other()?;
            transplant(&mut tree, key, &dest, false)?;
            Ok(ok())
        }
        "zip" => {
            let dest = need_other()?;
            if !dest.ends_with(".zip") {
                return Err(Failure::bad_request("second path must end in \".zip\""));
            }
            if tree.contains_key(&dest) {
                return Err(Failure::bad_request("Item exists at path."));
            }
            require_parent_dir(&tree, &dest)?;
            let archive = zip_subtree(&tree, key)?;
            tree.insert(dest, Node::File(archive));
            Ok(ok())
        }
        "unzip" => {
            if !key.ends_with(".zip") {
                return Err(Failure::bad_request("first path must end in \".zip\""));
            }
            let dest = need_other()?;
            if tree.contains_key(&dest) {
                return Err(Failure::bad_request("entity exists at destination"));
            }
            require_parent_dir(&tree, &dest)?;
            let data = match tree.get(key) {
                Some(Node::File(data)) => data.clone(),
                _ => return Err(Failure::internal(format!("no such archive: {key}"))),
            };
            for (k, node) in unzip_entries(&data, &dest)? {
                tree.insert(k, node);
            }
            Ok(ok())
        }
        "ls" => match tree.get(key) {
            Some(Node::Dir) => Ok(text(children_text(&tree, key))),
            _ => Err(Failure::internal(format!("not a directory: {key}"))),
        },
        "mkdir" => {
            if tree.contains_key(key) {
                return Err(Failure::internal(format!("file exists: {key}")));
            }
            require_parent_dir(&tree, key)?;
            tree.insert(key.to_string(), Node::Dir);
            Ok(ok())
        }
        "md5" | "sha256" => match tree.get(key) {
            Some(Node::File(data)) => {
                let digest = if patch.command == "md5" {
                    hex::encode(Md5::digest(data))
                } else {
                    hex::encode(Sha256::digest(data))
                };
                Ok(text(digest))
            }
            _ => Err(Failure::internal(format!("not a file: {key}"))),
        },
        _ => Err(Failure::bad_request("Unsupported PATCH command")),
    }
}

/// Copy (or move) the subtree at `from` to `to`.
fn transplant(
    tree: &mut BTreeMap<String, Node>,
    from: &str,
    to: &str,
    remove_source: bool,
) -> Result<(), Failure> {
    if from.is_empty() || !tree.contains_key(from) {
        return Err(Failure::internal(format!("no such file: {from}")));
    }
    if to == from || to.starts_with(&format!("{from}/")) {
        return Err(Failure::internal("destination is inside source"));
    }
    if to.is_empty() || from.starts_with(&format!("{to}/")) {
        return Err(Failure::internal("destination is a parent of source"));
    }
    require_parent_dir(tree, to)?;
    let entries = subtree(tree, from);
    if remove_source {
        for (rel, _) in &entries {
            tree.remove(&join(from, rel));
        }
    }
    // Replace whatever sat at the destination.
    let stale: Vec<String> = subtree(tree, to).into_iter().map(|(rel, _)| join(to, &rel)).collect();
    for k in stale {
        tree.remove(&k);
    }
    for (rel, node) in entries {
        tree.insert(join(to, &rel), node);
    }
    Ok(())
}

fn zip_subtree(tree: &BTreeMap<String, Node>, key: &str) -> Result<Vec<u8>, Failure> {
    let entries = subtree(tree, key);
    if entries.is_empty() {
        return Err(Failure::internal(format!("no such file: {key}")));
    }
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let base = key.rsplit('/').next().unwrap_or(key);
    for (rel, node) in entries {
        match node {
            // The archived directory itself is implied by its entries.
            Node::Dir if rel.is_empty() => {}
            Node::Dir => writer
                .add_directory(format!("{rel}/"), options)
                .map_err(Failure::internal)?,
            Node::File(data) => {
                let name = if rel.is_empty() { base } else { rel.as_str() };
                writer.start_file(name, options).map_err(Failure::internal)?;
                writer.write_all(&data).map_err(Failure::internal)?;
            }
        }
    }
    let cursor = writer.finish().map_err(Failure::internal)?;
    Ok(cursor.into_inner())
}

/// Entries of an archive extracted below `dest`, including `dest` itself
/// and every intermediate directory.
fn unzip_entries(data: &[u8], dest: &str) -> Result<Vec<(String, Node)>, Failure> {
    let mut archive = ZipArchive::new(Cursor::new(data)).map_err(Failure::bad_request)?;
    let mut out = vec![(dest.to_string(), Node::Dir)];
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).map_err(Failure::internal)?;
        let name = file.name().trim_matches('/').to_string();
        let parts: Vec<&str> = name.split('/').collect();
        if name.is_empty() || parts.iter().any(|p| p.is_empty() || *p == "." || *p == "..") {
            return Err(Failure::bad_request(format!("unsafe archive entry {name:?}")));
        }
        for depth in 1..parts.len() {
            out.push((join(dest, &parts[..depth].join("/")), Node::Dir));
        }
        let node = if file.is_dir() {
            Node::Dir
        } else {
            let mut contents = Vec::new();
            file.read_to_end(&mut contents).map_err(Failure::internal)?;
            Node::File(contents)
        };
        out.push((join(dest, &name), node));
    }
    Ok(out)
}

/// Entries at and below `key`, keyed relative to it ("" is `key` itself).
fn subtree(tree: &BTreeMap<String, Node>, key: &str) -> Vec<(String, Node)> {
    if key.is_empty() {
        return tree
            .iter()
            .filter(|(k, _)| !k.is_empty())
            .map(|(k, node)| (k.clone(), node.clone()))
            .collect();
    }
    let nested = format!("{key}/");
    tree.iter()
        .filter_map(|(k, node)| {
            if k == key {
                Some((String::new(), node.clone()))
            } else {
                k.strip_prefix(&nested).map(|rel| (rel.to_string(), node.clone()))
            }
        })
        .collect()
}

/// Visible child names of a directory, one per line, no trailing newline.
fn children_text(tree: &BTreeMap<String, Node>, dir: &str) -> String {
    let names: Vec<&str> = tree
        .keys()
        .filter(|k| !k.is_empty() && parent(k) == dir)
        .map(|k| k.rsplit('/').next().unwrap_or(k))
        .filter(|name| !name.starts_with('.'))
        .collect();
    names.join("\n")
}

fn require_parent_dir(tree: &BTreeMap<String, Node>, key: &str) -> Result<(), Failure> {
    if key.is_empty() {
        return Err(Failure::internal("root already exists"));
    }
    match tree.get(parent(key)) {
        Some(Node::Dir) => Ok(()),
        _ => Err(Failure::internal(format!("no such directory: {}", parent(key)))),
    }
}

fn parent(key: &str) -> &str {
    key.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

fn join(dir: &str, rel: &str) -> String {
    match (dir.is_empty(), rel.is_empty()) {
        (_, true) => dir.to_string(),
        (true, false) => rel.to_string(),
        (false, false) => format!("{dir}/{rel}"),
    }
}

/// Tree key for a URL path, or `None` when the prefix does not match.
fn key_for(prefix: &str, url_path: &str) -> Option<String> {
    url_path
        .strip_prefix(prefix)
        .map(|rest| rest.trim_matches('/').to_string())
}

fn has_cookie(request: &Request, name: &str, value: &str) -> bool {
    request
        .headers()
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .any(|(k, v)| k == name && v == value)
}

async fn read_body(request: Request) -> Result<Bytes, Failure> {
    to_bytes(request.into_body(), usize::MAX)
        .await
        .map_err(Failure::internal)
}

fn ok() -> Response {
    StatusCode::OK.into_response()
}

fn text(body: String) -> Response {
    ([(header::CONTENT_TYPE, "text/plain")], body).into_response()
}
