//! Remote log error types.

/// Errors from a remote log update.
///
/// None of these are fatal to a session; the driver logs them and keeps going.
#[derive(thiserror::Error, Debug)]
pub enum RemoteLogError {
    /// Reading the current document returned a non-success status.
    #[error("Remote log fetch failed: HTTP {status}")]
    Fetch { status: u16 },

    /// Writing the new document was rejected, e.g. on a version mismatch.
    #[error("Remote log update rejected: HTTP {status}")]
    Update { status: u16 },

    /// The request could not be sent or the response not read.
    #[error("Remote log request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The fetched document was not in the expected shape.
    #[error("Remote document could not be decoded: {0}")]
    Decode(String),

    /// The configured endpoint does not form a valid URL.
    #[error("Invalid remote log URL: {0}")]
    Url(#[from] url::ParseError),
}

impl RemoteLogError {
    /// HTTP status returned by the remote, if the failure carried one.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Fetch { status } | Self::Update { status } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::Decode(_) | Self::Url(_) => None,
        }
    }
}
