//! Operational settings.

use serde::{Deserialize, Serialize};

/// Which child transport to use.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportChoice {
    /// Pipes on Windows, a pseudo-terminal everywhere else.
    #[default]
    Auto,
    Pipe,
    Pty,
}

/// Settings loaded from `tunnel-autopilot.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Raise log verbosity to debug.
    #[serde(default)]
    pub debug: bool,
    /// Commit of the tunnel client build to run.
    pub commit_id: String,
    /// Release quality of the build (stable or insider).
    #[serde(default = "default_quality")]
    pub quality: String,
    /// Download URL template with `{commit_id}`, `{platform_path}` and `{quality}`.
    #[serde(default = "default_download_url_format")]
    pub download_url_format: String,
    /// Directory the client archive is extracted into. `~` is expanded.
    #[serde(default = "default_extracted_path")]
    pub extracted_path: String,
    /// File name of the client executable inside the extracted directory.
    #[serde(default = "default_extracted_bin")]
    pub extracted_bin: String,
    #[serde(default)]
    pub transport: TransportChoice,
    /// Pause after each reaction, in milliseconds.
    #[serde(default = "default_reaction_delay_ms")]
    pub reaction_delay_ms: u64,
    /// Where matched lines are forwarded. Forwarding is off when absent.
    #[serde(default)]
    pub remote_log: Option<RemoteLogSettings>,
}

fn default_quality() -> String {
    "stable".to_string()
}

fn default_download_url_format() -> String {
    "https://update.code.visualstudio.com/commit:{commit_id}/{platform_path}/{quality}".to_string()
}

fn default_extracted_path() -> String {
    "~/.vscode-cli".to_string()
}

fn default_extracted_bin() -> String {
    "code".to_string()
}

fn default_reaction_delay_ms() -> u64 {
    200
}

impl Settings {
    /// Settings for `commit_id` with every other field at its default.
    #[must_use]
    pub fn for_commit(commit_id: impl Into<String>) -> Self {
        Self {
            debug: false,
            commit_id: commit_id.into(),
            quality: default_quality(),
            download_url_format: default_download_url_format(),
            extracted_path: default_extracted_path(),
            extracted_bin: default_extracted_bin(),
            transport: TransportChoice::default(),
            reaction_delay_ms: default_reaction_delay_ms(),
            remote_log: None,
        }
    }
}

/// Target document of the remote log, on a GitHub-compatible contents API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteLogSettings {
    pub owner: String,
    pub repo: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Path of the log document inside the repository.
    pub path: String,
    /// Access token. Takes precedence over `token_env`.
    #[serde(default)]
    pub token: Option<String>,
    /// Environment variable holding the access token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    /// Base URL of the API.
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}

impl RemoteLogSettings {
    /// The configured token, or the value of `token_env`.
    #[must_use]
    pub fn resolve_token(&self) -> Option<String> {
        self.token
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| std::env::var(&self.token_env).ok().filter(|t| !t.is_empty()))
    }
}
