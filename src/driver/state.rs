//! Driver state machine.

use serde::{Deserialize, Serialize};

/// Current state of the interaction loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriverState {
    #[default]
    Starting,
    AwaitingOutput,
    EvaluatingLine,
    Reacting,
    Ended,
    Failed,
}

impl DriverState {
    /// Whether no further transitions are possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ended | Self::Failed)
    }

    /// Whether moving from `self` to `next` is a valid step.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        use DriverState::{AwaitingOutput, Ended, EvaluatingLine, Failed, Reacting, Starting};

        matches!(
            (self, next),
            (Starting, AwaitingOutput | Failed)
                | (AwaitingOutput, EvaluatingLine | Ended | Failed)
                | (EvaluatingLine, Reacting | AwaitingOutput)
                | (Reacting, AwaitingOutput | Failed)
        )
    }
}

/// State machine for tracking loop progress.
#[derive(Debug, Clone, Default)]
pub struct DriverStateMachine {
    state: DriverState,
    stats: DriverStats,
}

impl DriverStateMachine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Move to `new_state`. Invalid steps are logged and ignored.
    ///
    /// Returns whether the transition happened.
    pub fn transition(&mut self, new_state: DriverState) -> bool {
        if !self.state.can_transition_to(new_state) {
            tracing::warn!(from = ?self.state, to = ?new_state, "Ignoring invalid state transition");
            return false;
        }
        tracing::trace!(from = ?self.state, to = ?new_state, "State transition");
        self.state = new_state;
        true
    }

    pub fn record_line(&mut self) {
        self.stats.lines = self.stats.lines.saturating_add(1);
    }

    pub fn record_match(&mut self) {
        self.stats.matches = self.stats.matches.saturating_add(1);
    }

    pub fn record_forward(&mut self) {
        self.stats.forwarded = self.stats.forwarded.saturating_add(1);
    }

    pub fn record_forward_failure(&mut self) {
        self.stats.forward_failures = self.stats.forward_failures.saturating_add(1);
    }

    pub fn record_reaction_sent(&mut self) {
        self.stats.reactions_sent = self.stats.reactions_sent.saturating_add(1);
    }

    pub fn record_reaction_skipped(&mut self) {
        self.stats.reactions_skipped = self.stats.reactions_skipped.saturating_add(1);
    }

    #[must_use]
    pub fn stats(&self) -> DriverStats {
        self.stats
    }
}

/// Counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverStats {
    /// Non-blank lines read from the child.
    pub lines: usize,
    /// Rule matches, counting every matching rule of every line.
    pub matches: usize,
    /// Successful remote log updates.
    pub forwarded: usize,
    /// Remote log updates that failed or had no destination.
    pub forward_failures: usize,
    /// Reactions written to the child.
    pub reactions_sent: usize,
    /// Unknown or unsupported reactions that were skipped.
    pub reactions_skipped: usize,
}
