//! Binary resolver against a mock download server.

use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tunnel_autopilot::binary::{BinaryError, BinaryResolver, Platform};
use tunnel_autopilot::config::Settings;

fn settings(server: &MockServer, commit: &str, dir: &Path) -> Settings {
    let mut settings = Settings::for_commit(commit);
    settings.download_url_format = format!(
        "{}/commit:{{commit_id}}/{{platform_path}}/{{quality}}",
        server.uri()
    );
    settings.extracted_path = dir.to_string_lossy().into_owned();
    settings
}

fn linux() -> Platform {
    Platform::from_parts("linux", "x86_64").unwrap()
}

fn tar_gz(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (name, data) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, *data).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

#[tokio::test]
async fn downloads_and_extracts_missing_client() {
    let server = MockServer::start().await;
    let archive = tar_gz(&[
        ("code", "#!/bin/sh\necho tunnel\n".as_bytes()),
        ("LICENSE", "mit".as_bytes()),
    ]);
    Mock::given(method("GET"))
        .and(path("/commit:it-download-1/cli-alpine-x64/stable"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(archive))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("vscode-cli");
    let settings = settings(&server, "it-download-1", &base);
    let resolver = BinaryResolver::for_platform(&settings, linux()).unwrap();

    let executable = resolver.resolve().await.unwrap();

    assert_eq!(executable, base.join("code"));
    assert!(base.join("LICENSE").exists());

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&executable).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}

#[tokio::test]
async fn existing_client_is_reused() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("code"), b"already here").unwrap();
    let settings = settings(&server, "it-reuse", dir.path());
    let resolver = BinaryResolver::for_platform(&settings, linux()).unwrap();

    let executable = resolver.resolve().await.unwrap();
    assert_eq!(std::fs::read(executable).unwrap(), b"already here");
}

#[tokio::test]
async fn download_error_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let settings = settings(&server, "it-missing", dir.path());
    let resolver = BinaryResolver::for_platform(&settings, linux()).unwrap();

    let err = resolver.resolve().await.unwrap_err();
    assert!(matches!(err, BinaryError::DownloadStatus { status: 404, .. }));
}

#[tokio::test]
async fn archive_without_client_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(tar_gz(&[("README", "hi".as_bytes())])))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let settings = settings(&server, "it-empty", dir.path());
    let resolver = BinaryResolver::for_platform(&settings, linux()).unwrap();

    let err = resolver.resolve().await.unwrap_err();
    assert!(matches!(err, BinaryError::MissingExecutable(_)));
}

#[tokio::test]
async fn corrupt_archive_is_an_extract_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"not gzip".to_vec()))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let settings = settings(&server, "it-corrupt", dir.path());
    let resolver = BinaryResolver::for_platform(&settings, linux()).unwrap();

    let err = resolver.resolve().await.unwrap_err();
    assert!(matches!(err, BinaryError::Extract { .. }));
}

#[test]
fn download_url_uses_platform_flavour() {
    let mut settings = Settings::for_commit("deadbeef");
    settings.quality = "insider".to_string();
    let platform = Platform::from_parts("macos", "aarch64").unwrap();
    let resolver = BinaryResolver::for_platform(&settings, platform).unwrap();

    assert_eq!(
        resolver.download_url(),
        "https://update.code.visualstudio.com/commit:deadbeef/cli-darwin-arm64/insider"
    );
}
