//! Remote log stored as a file in a GitHub repository.
//!
//! Uses the contents API: the file is read together with its blob SHA, the
//! line is appended locally, and the whole file is written back conditionally
//! on that SHA. A concurrent edit makes the write fail instead of being
//! silently overwritten.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::config::RemoteLogSettings;

use super::{RemoteLog, RemoteLogError};

const ACCEPT_HEADER: &str = "application/vnd.github.v3+json";

const USER_AGENT: &str = concat!("tunnel-autopilot/", env!("CARGO_PKG_VERSION"));

/// A remote document together with the version it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDocument {
    pub content: String,
    /// Opaque version of `content`; required to write it back.
    pub version_token: String,
}

/// Response body of `GET /repos/{owner}/{repo}/contents/{path}`.
#[derive(Debug, Deserialize)]
struct ContentsResponse {
    sha: String,
    content: String,
}

/// Append `line` to `content` as a new line.
///
/// The line is trimmed. If `content` does not already end with a newline one
/// is inserted first, so the line never runs into the previous one.
#[must_use]
pub fn append_line(content: &str, line: &str) -> String {
    let line = line.trim();
    let mut updated = String::with_capacity(content.len() + line.len() + 2);
    updated.push_str(content);
    if !content.is_empty() && !content.ends_with('\n') {
        updated.push('\n');
    }
    updated.push_str(line);
    updated.push('\n');
    updated
}

/// Remote log backed by the GitHub contents API.
#[derive(Debug, Clone)]
pub struct GitHubContentsLog {
    client: Client,
    url: Url,
    token: String,
    branch: String,
}

impl GitHubContentsLog {
    /// Create an updater for the document described by `settings`.
    ///
    /// # Errors
    ///
    /// Returns `RemoteLogError::Url` if the endpoint is not a valid URL and
    /// `RemoteLogError::Http` if the HTTP client cannot be built.
    pub fn new(settings: &RemoteLogSettings, token: impl Into<String>) -> Result<Self, RemoteLogError> {
        let url = Url::parse(&format!(
            "{}/repos/{}/{}/contents/{}",
            settings.api_base.trim_end_matches('/'),
            settings.owner,
            settings.repo,
            settings.path.trim_start_matches('/'),
        ))?;
        let client = Client::builder().user_agent(USER_AGENT).build()?;

        Ok(Self {
            client,
            url,
            token: token.into(),
            branch: settings.branch.clone(),
        })
    }

    fn document_url(&self) -> Url {
        let mut url = self.url.clone();
        url.query_pairs_mut().append_pair("ref", &self.branch);
        url
    }

    /// Read the current document and its version.
    ///
    /// # Errors
    ///
    /// Returns `RemoteLogError::Fetch` on a non-success status and
    /// `RemoteLogError::Decode` if the body is not a base64 file.
    pub async fn fetch(&self) -> Result<RemoteDocument, RemoteLogError> {
        let url = self.document_url();
        tracing::debug!(%url, "Fetching remote log document");

        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, format!("token {}", self.token))
            .header(ACCEPT, ACCEPT_HEADER)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteLogError::Fetch {
                status: status.as_u16(),
            });
        }

        let body: ContentsResponse = response
            .json()
            .await
            .map_err(|e| RemoteLogError::Decode(e.to_string()))?;

        // The API wraps base64 at 60 columns.
        let encoded: String = body.content.split_whitespace().collect();
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| RemoteLogError::Decode(e.to_string()))?;

        Ok(RemoteDocument {
            content: String::from_utf8_lossy(&bytes).into_owned(),
            version_token: body.sha,
        })
    }

    /// Write `content` back, conditional on the version of `previous`.
    ///
    /// # Errors
    ///
    /// Returns `RemoteLogError::Update` if the remote rejects the write.
    pub async fn store(
        &self,
        previous: &RemoteDocument,
        content: &str,
        summary: &str,
    ) -> Result<(), RemoteLogError> {
        let body = serde_json::json!({
            "message": format!("Auto-detected: {}", summary.trim()),
            "content": STANDARD.encode(content.as_bytes()),
            "sha": previous.version_token,
            "branch": self.branch,
        });

        let response = self
            .client
            .put(self.document_url())
            .header(AUTHORIZATION, format!("token {}", self.token))
            .header(ACCEPT, ACCEPT_HEADER)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(RemoteLogError::Update {
                status: status.as_u16(),
            })
        }
    }
}

#[async_trait]
impl RemoteLog for GitHubContentsLog {
    async fn append(&self, line: &str) -> Result<(), RemoteLogError> {
        let document = self.fetch().await?;
        let updated = append_line(&document.content, line);
        self.store(&document, &updated, line).await?;
        tracing::info!(destination = %self.url, "Remote log updated");
        Ok(())
    }

    fn destination(&self) -> String {
        self.url.to_string()
    }
}
