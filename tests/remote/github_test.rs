//! GitHub contents API updater against a mock server.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tunnel_autopilot::config::RemoteLogSettings;
use tunnel_autopilot::remote::{GitHubContentsLog, RemoteLog, RemoteLogError};

const DOC_PATH: &str = "/repos/octo/notes/contents/logs/codes.txt";

fn settings(server: &MockServer) -> RemoteLogSettings {
    settings_for(&server.uri())
}

fn settings_for(api_base: &str) -> RemoteLogSettings {
    RemoteLogSettings {
        owner: "octo".to_string(),
        repo: "notes".to_string(),
        branch: "codes".to_string(),
        path: "logs/codes.txt".to_string(),
        token: None,
        token_env: "GITHUB_TOKEN".to_string(),
        api_base: api_base.to_string(),
    }
}

/// The API wraps base64 content across lines.
fn wrapped_base64(text: &str) -> String {
    let encoded = STANDARD.encode(text);
    let mut wrapped = String::new();
    for (i, c) in encoded.chars().enumerate() {
        if i > 0 && i % 8 == 0 {
            wrapped.push('\n');
        }
        wrapped.push(c);
    }
    wrapped
}

async fn mount_document(server: &MockServer, content: &str, sha: &str) {
    Mock::given(method("GET"))
        .and(path(DOC_PATH))
        .and(query_param("ref", "codes"))
        .and(header("authorization", "token secret"))
        .and(header("accept", "application/vnd.github.v3+json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sha": sha,
            "content": wrapped_base64(content),
            "encoding": "base64",
        })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn append_reads_then_writes_with_version() {
    let server = MockServer::start().await;
    mount_document(&server, "old line\n", "abc123").await;
    Mock::given(method("PUT"))
        .and(path(DOC_PATH))
        .and(header("authorization", "token secret"))
        .and(body_partial_json(json!({
            "message": "Auto-detected: Please login with code ABC-123",
            "content": STANDARD.encode("old line\nPlease login with code ABC-123\n"),
            "sha": "abc123",
            "branch": "codes",
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let log = GitHubContentsLog::new(&settings(&server), "secret").unwrap();
    log.append("  Please login with code ABC-123  ").await.unwrap();
}

#[tokio::test]
async fn fetch_decodes_wrapped_content() {
    let server = MockServer::start().await;
    mount_document(&server, "a fairly long first line\nsecond\n", "v1").await;

    let log = GitHubContentsLog::new(&settings(&server), "secret").unwrap();
    let document = log.fetch().await.unwrap();

    assert_eq!(document.content, "a fairly long first line\nsecond\n");
    assert_eq!(document.version_token, "v1");
}

#[tokio::test]
async fn missing_trailing_newline_is_added_before_appending() {
    let server = MockServer::start().await;
    mount_document(&server, "no newline", "v2").await;
    Mock::given(method("PUT"))
        .and(path(DOC_PATH))
        .and(body_partial_json(json!({
            "content": STANDARD.encode("no newline\ncode 9\n"),
            "sha": "v2",
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let log = GitHubContentsLog::new(&settings(&server), "secret").unwrap();
    log.append("code 9").await.unwrap();
}

#[tokio::test]
async fn fetch_failure_skips_the_write() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DOC_PATH))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let log = GitHubContentsLog::new(&settings(&server), "secret").unwrap();
    let err = log.append("code").await.unwrap_err();

    assert!(matches!(err, RemoteLogError::Fetch { status: 404 }));
}

#[tokio::test]
async fn version_conflict_is_an_update_error() {
    let server = MockServer::start().await;
    mount_document(&server, "", "stale").await;
    Mock::given(method("PUT"))
        .and(path(DOC_PATH))
        .respond_with(ResponseTemplate::new(409))
        .expect(1)
        .mount(&server)
        .await;

    let log = GitHubContentsLog::new(&settings(&server), "secret").unwrap();
    let err = log.append("code").await.unwrap_err();

    assert!(matches!(err, RemoteLogError::Update { status: 409 }));
    assert_eq!(err.status(), Some(409));
}

#[tokio::test]
async fn unexpected_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DOC_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "not a file" })))
        .mount(&server)
        .await;

    let log = GitHubContentsLog::new(&settings(&server), "secret").unwrap();
    let err = log.fetch().await.unwrap_err();

    assert!(matches!(err, RemoteLogError::Decode(_)));
}

#[tokio::test]
async fn unreachable_remote_is_an_http_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let settings = settings_for(&format!("http://127.0.0.1:{port}"));
    let log = GitHubContentsLog::new(&settings, "secret").unwrap();
    let err = log.append("code").await.unwrap_err();

    assert!(matches!(err, RemoteLogError::Http(_)));
    assert_eq!(err.status(), None);
}
