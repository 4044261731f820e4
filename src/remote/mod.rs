//! Best-effort forwarding of matched lines to a remote append-only log.

mod error;
mod github;

pub use error::*;
pub use github::*;

use async_trait::async_trait;

/// A remote document that matched lines are appended to.
#[async_trait]
pub trait RemoteLog: Send + Sync {
    /// Append `line` to the remote document.
    ///
    /// Each call is a single attempt: one read of the current document and
    /// one conditional write. Nothing is retried or cached.
    async fn append(&self, line: &str) -> Result<(), RemoteLogError>;

    /// Human readable destination, for log messages.
    fn destination(&self) -> String;
}
