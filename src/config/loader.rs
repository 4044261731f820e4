//! Configuration file loader.

use std::path::{Path, PathBuf};

use crate::rules::{RuleLoadError, RuleSet};

use super::Settings;

/// File name of the operational settings.
pub const SETTINGS_FILE: &str = "tunnel-autopilot.toml";

/// File name of the detector rules.
pub const RULES_FILE: &str = "detector.toml";

/// Directory under the user config directory that is searched.
const APP_DIR: &str = "tunnel-autopilot";

/// Loader for one configuration document, searching several locations.
#[derive(Debug)]
pub struct ConfigLoader {
    /// Search paths in order of priority.
    search_paths: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Create a loader for `file_name` with the default search paths.
    #[must_use]
    pub fn new(file_name: &str) -> Self {
        let mut search_paths = Vec::new();

        // 1. Current directory
        search_paths.push(PathBuf::from(file_name));

        // 2. User config directory: ~/.config/tunnel-autopilot/<file>
        if let Some(config_dir) = dirs::config_dir() {
            search_paths.push(config_dir.join(APP_DIR).join(file_name));
        }

        Self { search_paths }
    }

    /// Loader for the settings document.
    #[must_use]
    pub fn settings() -> Self {
        Self::new(SETTINGS_FILE)
    }

    /// Loader for the rule document.
    #[must_use]
    pub fn rules() -> Self {
        Self::new(RULES_FILE)
    }

    /// Create a config loader with a specific config file path.
    #[must_use]
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            search_paths: vec![path.into()],
        }
    }

    /// Get the search paths for debugging.
    #[must_use]
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Find the first config file that exists.
    #[must_use]
    pub fn find_config_file(&self) -> Option<PathBuf> {
        self.search_paths.iter().find(|p| p.exists()).cloned()
    }

    /// Load the settings document.
    ///
    /// # Errors
    ///
    /// Returns an error if no file exists or the file cannot be read or parsed.
    pub fn load_settings(&self) -> Result<Settings, ConfigError> {
        let (path, content) = self.read()?;
        toml::from_str(&content).map_err(|source| ConfigError::ParseError { path, source })
    }

    /// Load the rule document.
    ///
    /// # Errors
    ///
    /// Returns an error if no file exists, the file cannot be read, or the
    /// rules are malformed.
    pub fn load_rules(&self) -> Result<RuleSet, ConfigError> {
        let (path, content) = self.read()?;
        let rules = RuleSet::from_toml(&content)
            .map_err(|source| ConfigError::RulesError { path: path.clone(), source })?;
        tracing::debug!(path = %path.display(), rules = rules.len(), "Loaded detector rules");
        Ok(rules)
    }

    fn read(&self) -> Result<(PathBuf, String), ConfigError> {
        let path = self.find_config_file().ok_or_else(|| ConfigError::NotFound {
            searched: self.search_paths.clone(),
        })?;
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = read_file(&path)?;
        Ok((path, content))
    }
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Errors that can occur during configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No config file found, searched {searched:?}")]
    NotFound { searched: Vec<PathBuf> },

    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid rules in {path}: {source}")]
    RulesError {
        path: PathBuf,
        source: RuleLoadError,
    },
}
