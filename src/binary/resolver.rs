//! Download and extraction of the tunnel client.

use std::path::{Path, PathBuf};
use std::time::Duration;

use flate2::read::GzDecoder;
use reqwest::Client;
use tokio::io::AsyncWriteExt;

use crate::config::Settings;
use crate::display;

use super::{BinaryLocation, OsFamily, Platform};

/// Connection timeout for the download.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors while resolving the client binary.
#[derive(thiserror::Error, Debug)]
pub enum BinaryError {
    #[error("Unsupported platform: {os} {arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("Download request failed: {0}")]
    Download(#[from] reqwest::Error),

    #[error("Download of {url} failed: HTTP {status}")]
    DownloadStatus { url: String, status: u16 },

    #[error("Failed to extract archive {path}: {reason}")]
    Extract { path: PathBuf, reason: String },

    #[error("Extraction did not produce {0}")]
    MissingExecutable(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Finds the client on disk, downloading and unpacking it when missing.
#[derive(Debug, Clone)]
pub struct BinaryResolver {
    client: Client,
    platform: Platform,
    location: BinaryLocation,
    url: String,
}

impl BinaryResolver {
    /// Resolver for the host platform.
    ///
    /// # Errors
    ///
    /// Returns `BinaryError::UnsupportedPlatform` if the host has no build, or
    /// `BinaryError::Download` if the HTTP client cannot be built.
    pub fn new(settings: &Settings) -> Result<Self, BinaryError> {
        Self::for_platform(settings, Platform::detect()?)
    }

    /// Resolver for an explicit platform.
    ///
    /// # Errors
    ///
    /// Returns `BinaryError::Download` if the HTTP client cannot be built.
    pub fn for_platform(settings: &Settings, platform: Platform) -> Result<Self, BinaryError> {
        let client = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;
        let location = BinaryLocation::resolve(settings, &platform);
        let url = download_url(settings, &platform);
        Ok(Self {
            client,
            platform,
            location,
            url,
        })
    }

    #[must_use]
    pub fn location(&self) -> &BinaryLocation {
        &self.location
    }

    #[must_use]
    pub fn download_url(&self) -> &str {
        &self.url
    }

    /// Path to a ready-to-run client executable.
    ///
    /// An executable already present is reused as is.
    ///
    /// # Errors
    ///
    /// Returns `BinaryError` if the download or extraction fails, or if the
    /// archive does not contain the expected executable.
    pub async fn resolve(&self) -> Result<PathBuf, BinaryError> {
        let executable = &self.location.executable;
        tracing::debug!(path = %executable.display(), "Checking for tunnel client");
        if tokio::fs::try_exists(executable).await? {
            display::print_success(&format!(
                "Tunnel client already exists at {}",
                executable.display()
            ));
            return Ok(executable.clone());
        }

        tokio::fs::create_dir_all(&self.location.base_dir).await?;
        self.download().await?;
        self.extract().await?;

        if !tokio::fs::try_exists(executable).await? {
            return Err(BinaryError::MissingExecutable(executable.clone()));
        }

        #[cfg(unix)]
        {
            if self.platform.os != OsFamily::Windows {
                make_executable(executable)?;
            }
        }

        display::print_success(&format!("Tunnel client ready at {}", executable.display()));
        Ok(executable.clone())
    }

    async fn download(&self) -> Result<(), BinaryError> {
        display::print_status(&format!("Downloading tunnel client from {}", self.url));
        let mut response = self.client.get(&self.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(BinaryError::DownloadStatus {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        let mut file = tokio::fs::File::create(&self.location.archive_path).await?;
        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        tracing::info!(
            path = %self.location.archive_path.display(),
            bytes = written,
            "Archive downloaded"
        );
        Ok(())
    }

    async fn extract(&self) -> Result<(), BinaryError> {
        display::print_status(&format!(
            "Extracting archive to {}",
            self.location.base_dir.display()
        ));
        let archive = self.location.archive_path.clone();
        let dest = self.location.base_dir.clone();
        let os = self.platform.os;

        tokio::task::spawn_blocking(move || extract_archive(&archive, &dest, os))
            .await
            .map_err(|e| BinaryError::Extract {
                path: self.location.archive_path.clone(),
                reason: e.to_string(),
            })?
    }
}

/// Fill in the download URL template.
#[must_use]
pub fn download_url(settings: &Settings, platform: &Platform) -> String {
    settings
        .download_url_format
        .replace("{commit_id}", &settings.commit_id)
        .replace("{platform_path}", platform.download_path)
        .replace("{quality}", &settings.quality)
}

/// Unpack `archive` into `dest`: zip on Windows, gzipped tar elsewhere.
///
/// # Errors
///
/// Returns `BinaryError::Extract` if the archive is unreadable.
pub fn extract_archive(archive: &Path, dest: &Path, os: OsFamily) -> Result<(), BinaryError> {
    let extract_err = |reason: String| BinaryError::Extract {
        path: archive.to_path_buf(),
        reason,
    };
    let file = std::fs::File::open(archive)?;

    match os {
        OsFamily::Windows => {
            let mut zip = zip::ZipArchive::new(file).map_err(|e| extract_err(e.to_string()))?;
            zip.extract(dest).map_err(|e| extract_err(e.to_string()))
        }
        OsFamily::Linux | OsFamily::MacOs => {
            let mut tar = tar::Archive::new(GzDecoder::new(file));
            tar.unpack(dest).map_err(|e| extract_err(e.to_string()))
        }
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}
