//! Pacing between reactions.
//!
//! The child gives no signal when it is ready for more input, so the driver
//! waits a fixed time after every reaction. Everything that waits goes
//! through [`Pacer`], so a real readiness check can replace the delay later.

use std::time::Duration;

use async_trait::async_trait;

/// Default pause after each reaction.
pub const DEFAULT_REACTION_DELAY: Duration = Duration::from_millis(200);

/// Decides how long to wait after a reaction before doing anything else.
#[async_trait]
pub trait Pacer: Send + Sync {
    /// Wait until the child can take the next input.
    async fn pause(&self);
}

/// Waits a fixed duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    #[must_use]
    pub fn from_millis(millis: u64) -> Self {
        Self::new(Duration::from_millis(millis))
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for FixedDelay {
    fn default() -> Self {
        Self::new(DEFAULT_REACTION_DELAY)
    }
}

#[async_trait]
impl Pacer for FixedDelay {
    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}
