//! End-to-end test against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then exercises every client
//! operation over real HTTP through the default ureq transport. Local files
//! live in a temporary directory.

use fileutil_core::{
    ApiError, ClientConfig, Credential, PreconditionError, RemoteFileClient,
};
use mock_server::MockConfig;

const PREFIX: &str = "/files/";

/// Start the mock server on a random port and return its origin.
fn start_server() -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    let config = MockConfig {
        url_prefix: PREFIX.to_string(),
        session_cookie: Some(("session".to_string(), "s3cret".to_string())),
    };
    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener, config).await
        })
        .unwrap();
    });

    format!("http://{addr}")
}

fn client(origin: &str) -> RemoteFileClient {
    let credential = Credential::new().with_cookie("session", "s3cret");
    RemoteFileClient::new(ClientConfig::new(origin, PREFIX, credential).unwrap())
}

#[test]
fn file_operations_lifecycle() {
    let origin = start_server();
    let client = client(&origin);
    let local = tempfile::tempdir().unwrap();

    // Step 1: the empty root lists as a single empty name.
    assert_eq!(client.ls("").unwrap(), [""]);

    // Step 2: create a directory.
    client.mkdir("a").unwrap();
    assert!(client.is_dir("a").unwrap());

    // Step 3: put then get returns the same bytes.
    client.put(b"hello", "a/file.txt").unwrap();
    assert_eq!(client.get("a/file.txt").unwrap(), b"hello");
    assert!(!client.is_dir("a/file.txt").unwrap());

    // Step 4: hashes computed by the server.
    assert_eq!(client.md5("a/file.txt").unwrap(), "5d41402abc4b2a76b9719d911017c592");
    assert_eq!(
        client.sha256("a/file.txt").unwrap(),
        "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
    );

    // Step 5: copy and move.
    client.cp("a/file.txt", "a/copy.txt").unwrap();
    client.mv("a/copy.txt", "a/moved.txt").unwrap();
    assert_eq!(client.ls("a/").unwrap(), ["file.txt", "moved.txt"]);

    // Step 6: zip and unzip, with extension checks before sending.
    let err = client.zip("a/file.txt", "a/out.tar").unwrap_err();
    assert!(matches!(
        err,
        ApiError::Precondition(PreconditionError::ZipTargetExtension(_))
    ));
    client.zip("a/file.txt", "a/out.zip").unwrap();

    let err = client.unzip("a/out.tar", "a/extracted").unwrap_err();
    assert!(matches!(
        err,
        ApiError::Precondition(PreconditionError::UnzipSourceExtension(_))
    ));
    client.unzip("a/out.zip", "a/extracted").unwrap();
    assert_eq!(client.get("a/extracted/file.txt").unwrap(), b"hello");

    // Step 7: upload a local file larger than one download buffer.
    let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    let upload_path = local.path().join("upload.bin");
    client.write_local(&payload, &upload_path).unwrap();
    client.upload(&upload_path, "a/up.bin").unwrap();
    assert_eq!(client.get("a/up.bin").unwrap(), payload);

    // Step 8: download streams into a local file.
    let download_path = local.path().join("download.bin");
    let written = client.download("a/up.bin", &download_path).unwrap();
    assert_eq!(written, payload.len() as u64);
    assert_eq!(client.read_local(&download_path).unwrap(), payload);

    // Step 9: a failed download reports the status and creates no file.
    let missing_path = local.path().join("missing.bin");
    let err = client.download("a/missing.bin", &missing_path).unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert!(!missing_path.exists());

    // Step 10: delete the tree.
    client.delete("a").unwrap();
    let err = client.get("a/file.txt").unwrap_err();
    assert!(matches!(err, ApiError::RequestFailed { status: 404, .. }));
    assert_eq!(client.ls("").unwrap(), [""]);
}

#[test]
fn missing_credential_is_rejected() {
    let origin = start_server();
    let config = ClientConfig::new(origin.as_str(), PREFIX, Credential::new()).unwrap();
    let client = RemoteFileClient::new(config);

    let err = client.ls("").unwrap_err();
    assert_eq!(err.status(), Some(401));
}

#[test]
fn server_errors_surface_as_request_failed() {
    let origin = start_server();
    let client = client(&origin);

    // mkdir below a missing parent.
    let err = client.mkdir("no/such/dir").unwrap_err();
    assert_eq!(err.status(), Some(500));

    // ls of a file.
    client.put(b"x", "plain").unwrap();
    let err = client.ls("plain").unwrap_err();
    assert_eq!(err.status(), Some(500));

    // unzip onto an existing destination.
    client.zip("plain", "plain.zip").unwrap();
    let err = client.unzip("plain.zip", "plain").unwrap_err();
    assert_eq!(err.status(), Some(400));
}

#[test]
fn wrong_prefix_is_a_server_error() {
    let origin = start_server();
    let config = ClientConfig::new(origin.as_str(), "/other/", Credential::new().with_cookie("session", "s3cret"))
        .unwrap();
    let client = RemoteFileClient::new(config);

    let err = client.get("a.txt").unwrap_err();
    assert_eq!(err.status(), Some(500));
}
