//! Integration tests for the HTTP transport and scoped temporary destinations.

use changelog_mirror::{
    Credentials, DownloadError, HttpTimeouts, HttpTransport, TempDestination, Transport,
};
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper to create a mock server with a file endpoint.
async fn setup_mock_file(path_str: &str, content: &[u8]) -> MockServer {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(path_str))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(content.to_vec()))
        .mount(&mock_server)
        .await;

    mock_server
}

fn file_url(server: &MockServer, file: &str) -> Url {
    Url::parse(&format!("{}{file}", server.uri())).expect("file url")
}

#[tokio::test]
async fn test_download_writes_full_body() {
    let content = b"Quarterly report\nLine 2.\nLine 3.";
    let server = setup_mock_file("/docs/report.docx", content).await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    let transport = HttpTransport::new(HttpTimeouts::default(), None).expect("transport");
    let destination = TempDestination::acquire(temp_dir.path()).expect("destination");
    let bytes = transport
        .download(&file_url(&server, "/docs/report.docx"), destination.path())
        .await
        .expect("download should succeed");

    assert_eq!(bytes, content.len() as u64);
    let written = std::fs::read(destination.path()).expect("should read file");
    assert_eq!(written, content);

    let released = destination.release().expect("release");
    assert!(!released.exists(), "released destination must be gone");
}

#[tokio::test]
async fn test_download_large_body_streams_to_disk() {
    let content = vec![0xAB_u8; 3 * 1024 * 1024];
    let server = setup_mock_file("/big.bin", &content).await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    let transport = HttpTransport::new(HttpTimeouts::default(), None).expect("transport");
    let destination = TempDestination::acquire(temp_dir.path()).expect("destination");
    let bytes = transport
        .download(&file_url(&server, "/big.bin"), destination.path())
        .await
        .expect("download should succeed");

    assert_eq!(bytes, content.len() as u64);
    assert_eq!(
        std::fs::metadata(destination.path()).expect("metadata").len(),
        content.len() as u64
    );
}

#[tokio::test]
async fn test_download_http_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.docx"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    let transport = HttpTransport::new(HttpTimeouts::default(), None).expect("transport");
    let destination = TempDestination::acquire(temp_dir.path()).expect("destination");
    let err = transport
        .download(&file_url(&server, "/missing.docx"), destination.path())
        .await
        .expect_err("404 should fail");

    assert!(
        matches!(err, DownloadError::HttpStatus { status: 404, .. }),
        "unexpected error: {err:?}"
    );
    drop(destination);
    assert!(
        std::fs::read_dir(temp_dir.path()).expect("read dir").next().is_none(),
        "dropped destination must be removed"
    );
}

#[tokio::test]
async fn test_download_sends_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/secure.docx"))
        .and(header("Authorization", "Basic Q09SUFxzdmM6cHc="))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
        .expect(1)
        .mount(&server)
        .await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    let transport = HttpTransport::new(
        HttpTimeouts::default(),
        Credentials::from_parts("svc", "pw", "CORP"),
    )
    .expect("transport");
    let destination = TempDestination::acquire(temp_dir.path()).expect("destination");
    let bytes = transport
        .download(&file_url(&server, "/secure.docx"), destination.path())
        .await
        .expect("authorised download");
    assert_eq!(bytes, 2);
}

#[tokio::test]
async fn test_download_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow.docx"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"late".to_vec())
                .set_delay(std::time::Duration::from_secs(3)),
        )
        .mount(&server)
        .await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    let timeouts = HttpTimeouts {
        connect_secs: 1,
        read_secs: 1,
    };
    let transport = HttpTransport::new(timeouts, None).expect("transport");
    let destination = TempDestination::acquire(temp_dir.path()).expect("destination");
    let err = transport
        .download(&file_url(&server, "/slow.docx"), destination.path())
        .await
        .expect_err("should time out");

    assert!(
        matches!(err, DownloadError::Timeout { .. }),
        "unexpected error: {err:?}"
    );
}
