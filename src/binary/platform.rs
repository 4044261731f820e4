//! Host platform detection and on-disk locations.

use std::path::{Path, PathBuf};

use crate::config::Settings;

use super::BinaryError;

/// Operating system family of a download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    Windows,
    Linux,
    MacOs,
}

impl OsFamily {
    /// Map a `std::env::consts::OS` value.
    #[must_use]
    pub fn from_os(os: &str) -> Option<Self> {
        match os {
            "windows" => Some(Self::Windows),
            "linux" => Some(Self::Linux),
            "macos" => Some(Self::MacOs),
            _ => None,
        }
    }

    /// Archive format the client ships in on this family.
    #[must_use]
    pub fn archive_extension(self) -> &'static str {
        match self {
            Self::Windows => "zip",
            Self::Linux | Self::MacOs => "tar.gz",
        }
    }
}

/// A downloadable build flavour of the tunnel client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: OsFamily,
    /// Path segment of the download URL, e.g. `cli-alpine-x64`.
    pub download_path: &'static str,
}

impl Platform {
    /// Platform of the running host.
    ///
    /// # Errors
    ///
    /// Returns `BinaryError::UnsupportedPlatform` if no build exists for it.
    pub fn detect() -> Result<Self, BinaryError> {
        Self::from_parts(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Platform for an `(os, arch)` pair as reported by `std::env::consts`.
    ///
    /// # Errors
    ///
    /// Returns `BinaryError::UnsupportedPlatform` if no build exists for it.
    pub fn from_parts(os: &str, arch: &str) -> Result<Self, BinaryError> {
        let unsupported = || BinaryError::UnsupportedPlatform {
            os: os.to_string(),
            arch: arch.to_string(),
        };
        let family = OsFamily::from_os(os).ok_or_else(unsupported)?;

        let download_path = match (family, arch) {
            (OsFamily::Windows, _) => "cli-win32-x64",
            (OsFamily::Linux, "x86_64") => "cli-alpine-x64",
            (OsFamily::Linux, "aarch64") => "cli-alpine-arm64",
            (OsFamily::Linux, "arm") => "cli-linux-armhf",
            (OsFamily::Linux, _) => return Err(unsupported()),
            (OsFamily::MacOs, "aarch64") => "cli-darwin-arm64",
            (OsFamily::MacOs, _) => "cli-darwin-x64",
        };

        Ok(Self {
            os: family,
            download_path,
        })
    }
}

/// Where the client lives on disk for a given commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryLocation {
    /// The client executable.
    pub executable: PathBuf,
    /// Directory the archive is extracted into.
    pub base_dir: PathBuf,
    /// Where the downloaded archive is cached.
    pub archive_path: PathBuf,
}

impl BinaryLocation {
    /// Resolve paths for `platform` and the commit configured in `settings`.
    #[must_use]
    pub fn resolve(settings: &Settings, platform: &Platform) -> Self {
        let base_dir = match platform.os {
            OsFamily::MacOs => home_dir().join("Library/Application Support/vscode-server"),
            OsFamily::Windows | OsFamily::Linux => expand_home(&settings.extracted_path),
        };

        let executable = match platform.os {
            OsFamily::Windows => base_dir.join(format!("{}.exe", settings.extracted_bin)),
            OsFamily::Linux | OsFamily::MacOs => base_dir.join(&settings.extracted_bin),
        };

        let archive_path = std::env::temp_dir().join(format!(
            "vscode-cli-{}.{}",
            settings.commit_id,
            platform.os.archive_extension()
        ));

        Self {
            executable,
            base_dir,
            archive_path,
        }
    }
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Expand a leading `~` to the home directory.
#[must_use]
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        return home_dir();
    }
    match path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        Some(rest) => home_dir().join(rest),
        None => Path::new(path).to_path_buf(),
    }
}
