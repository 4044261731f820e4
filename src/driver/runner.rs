//! Interaction driver: reads the child's output line by line, matches it
//! against the rule set and reacts.
//!
//! One line is handled at a time. All reactions for a line are sent, with a
//! pause after each, before the next line is read. Remote log failures and
//! unknown actions are reported and skipped; only a broken child stream or an
//! operator interrupt ends the loop.
//!
//! A fragment (a line handed out before its newline) is evaluated right away so
//! prompts get answered. When the line is later completed, rules that already
//! fired on the fragment do not fire again, and forwards are sent with the
//! completed text. A forward held for an open fragment is sent with the
//! fragment's text if nothing completes it within [`FRAGMENT_FORWARD_GRACE`].

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::child::{
    spawn_transport, ChildCommand, ChildTransport, SendOutcome, SpawnError, TransportError,
    TransportKind,
};
use crate::display;
use crate::output::OutputLine;
use crate::remote::RemoteLog;
use crate::rules::{DetectorRule, RuleAction, RuleSet};

use super::{DriverState, DriverStateMachine, DriverStats, Pacer};

/// How long a forward waits for its fragment to be completed.
pub const FRAGMENT_FORWARD_GRACE: Duration = Duration::from_secs(2);

/// How a session's interaction loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The child closed its output.
    Ended,
    /// The operator interrupted the session.
    Interrupted,
    /// Reading from or writing to the child failed.
    StreamFailed { reason: String },
}

/// Rules applied to a fragment whose line is still open.
#[derive(Debug, Default)]
struct OpenFragment {
    cleaned: String,
    applied: Vec<usize>,
    /// Forward rules waiting for the completed line.
    deferred: Vec<usize>,
}

/// Drives one child process through its transport.
pub struct InteractionDriver<'a> {
    rules: &'a RuleSet,
    pacer: &'a dyn Pacer,
    remote: Option<&'a dyn RemoteLog>,
    state: DriverStateMachine,
    cancel: Option<CancellationToken>,
    fragment: Option<OpenFragment>,
}

impl<'a> InteractionDriver<'a> {
    /// Create a driver that does not forward anything remotely.
    #[must_use]
    pub fn new(rules: &'a RuleSet, pacer: &'a dyn Pacer) -> Self {
        Self {
            rules,
            pacer,
            remote: None,
            state: DriverStateMachine::new(),
            cancel: None,
            fragment: None,
        }
    }

    /// Forward lines of matching `forward` rules to `remote`.
    #[must_use]
    pub fn with_remote_log(mut self, remote: &'a dyn RemoteLog) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Set a cancellation token for operator interrupts.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    #[must_use]
    pub fn state(&self) -> DriverState {
        self.state.state()
    }

    #[must_use]
    pub fn stats(&self) -> DriverStats {
        self.state.stats()
    }

    /// Start `command` on a `kind` transport.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError` if the child cannot be started. The driver is
    /// `Failed` afterwards.
    pub fn spawn(
        &mut self,
        kind: TransportKind,
        command: &ChildCommand,
    ) -> Result<Box<dyn ChildTransport>, SpawnError> {
        match spawn_transport(kind, command) {
            Ok(transport) => {
                self.state.transition(DriverState::AwaitingOutput);
                Ok(transport)
            }
            Err(e) => {
                self.state.transition(DriverState::Failed);
                Err(e)
            }
        }
    }

    /// Run the loop until the child's output ends, the stream breaks or the
    /// session is cancelled.
    pub async fn run(&mut self, transport: &mut dyn ChildTransport) -> SessionOutcome {
        if self.state.state() == DriverState::Starting {
            self.state.transition(DriverState::AwaitingOutput);
        }
        tracing::info!(transport = %transport.kind(), pid = ?transport.id(), "Watching child output");

        loop {
            let grace = self.has_deferred_forwards().then_some(FRAGMENT_FORWARD_GRACE);
            let next = if let Some(cancel) = self.cancel.clone() {
                tokio::select! {
                    biased;

                    () = cancel.cancelled() => {
                        tracing::info!("Session interrupted by operator");
                        self.state.transition(DriverState::Ended);
                        return SessionOutcome::Interrupted;
                    }
                    next = read_within(transport, grace) => next,
                }
            } else {
                read_within(transport, grace).await
            };

            let Some(next) = next else {
                tracing::debug!("Fragment was not completed in time");
                self.flush_deferred_forwards().await;
                continue;
            };

            let result = match next {
                Ok(Some(line)) => self.handle_line(transport, &line).await,
                Ok(None) => {
                    tracing::info!("Child closed its output");
                    self.flush_deferred_forwards().await;
                    self.state.transition(DriverState::Ended);
                    return SessionOutcome::Ended;
                }
                Err(e) => Err(e),
            };

            if let Err(e) = result {
                tracing::error!(error = %e, "Child stream failed");
                self.state.transition(DriverState::Failed);
                return SessionOutcome::StreamFailed {
                    reason: e.to_string(),
                };
            }
        }
    }

    /// Evaluate one line and perform the reactions of every matching rule.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if a reaction cannot be written to the child.
    pub async fn handle_line(
        &mut self,
        transport: &mut dyn ChildTransport,
        line: &OutputLine,
    ) -> Result<(), TransportError> {
        if line.is_blank() {
            return Ok(());
        }

        let open = if line.is_continuation() {
            self.fragment.take()
        } else {
            self.flush_deferred_forwards().await;
            self.fragment = None;
            None
        };

        self.state.transition(DriverState::EvaluatingLine);
        if open.is_none() {
            self.state.record_line();
        }
        display::print_output(line.cleaned());
        tracing::trace!(raw = ?line.raw(), fragment = line.is_fragment(), "Child output");

        let OpenFragment {
            mut applied,
            mut deferred,
            ..
        } = open.unwrap_or_default();
        if !line.is_fragment() {
            for _ in deferred.drain(..) {
                self.forward(line.cleaned()).await;
            }
        }

        let rules = self.rules;
        let matched: Vec<_> = rules
            .matching(line.cleaned())
            .filter(|(index, _)| !applied.contains(index))
            .collect();

        if !matched.is_empty() {
            self.state.transition(DriverState::Reacting);
            for (index, rule) in matched {
                applied.push(index);
                let hold = rule.forward && line.is_fragment();
                if hold {
                    deferred.push(index);
                }
                self.apply_rule(transport, rule, line.cleaned(), !hold).await?;
            }
        }

        if line.is_fragment() {
            self.fragment = Some(OpenFragment {
                cleaned: line.cleaned().to_string(),
                applied,
                deferred,
            });
        }
        self.state.transition(DriverState::AwaitingOutput);
        Ok(())
    }

    async fn apply_rule(
        &mut self,
        transport: &mut dyn ChildTransport,
        rule: &DetectorRule,
        cleaned: &str,
        forward_now: bool,
    ) -> Result<(), TransportError> {
        self.state.record_match();
        display::print_match(&rule.match_text);
        tracing::debug!(rule = %rule.match_text, forward = rule.forward, "Detected match");

        if rule.forward && forward_now {
            self.forward(cleaned).await;
        }

        for action in &rule.actions {
            self.perform(transport, action).await?;
            self.pacer.pause().await;
        }
        Ok(())
    }

    fn has_deferred_forwards(&self) -> bool {
        self.fragment.as_ref().is_some_and(|f| !f.deferred.is_empty())
    }

    /// Send held forwards with the fragment's text. The fragment stays open so
    /// its rules do not fire again if the line is completed later.
    async fn flush_deferred_forwards(&mut self) {
        let Some(fragment) = self.fragment.as_mut() else {
            return;
        };
        let pending = std::mem::take(&mut fragment.deferred).len();
        let cleaned = fragment.cleaned.clone();
        for _ in 0..pending {
            self.forward(&cleaned).await;
        }
    }

    /// Send `line` to the remote log. Failures are reported, never returned.
    async fn forward(&mut self, line: &str) {
        let Some(remote) = self.remote else {
            tracing::warn!("Rule forwards matches but no remote log is configured");
            self.state.record_forward_failure();
            return;
        };

        match remote.append(line).await {
            Ok(()) => {
                self.state.record_forward();
                display::print_success("Remote log updated");
            }
            Err(e) => {
                self.state.record_forward_failure();
                display::print_warning(&format!("Remote log update failed: {e}"));
                tracing::warn!(
                    destination = %remote.destination(),
                    error = %e,
                    "Remote log update failed"
                );
            }
        }
    }

    async fn perform(
        &mut self,
        transport: &mut dyn ChildTransport,
        action: &RuleAction,
    ) -> Result<(), TransportError> {
        match action {
            RuleAction::Send(reaction) => match transport.send_reaction(reaction).await? {
                SendOutcome::Sent => {
                    self.state.record_reaction_sent();
                    display::print_reaction(reaction);
                    tracing::debug!(%reaction, "Sent reaction");
                }
                SendOutcome::Unsupported => {
                    self.state.record_reaction_skipped();
                    display::print_warning(&format!(
                        "{reaction} is not supported by the {} transport",
                        transport.kind()
                    ));
                    tracing::warn!(%reaction, transport = %transport.kind(), "Unsupported reaction skipped");
                }
            },
            RuleAction::Unknown(identifier) => {
                self.state.record_reaction_skipped();
                display::print_warning(&format!("Unknown action: {identifier}"));
                tracing::warn!(action = %identifier, "Unknown action skipped");
            }
        }
        Ok(())
    }
}

/// Read the next line, giving up after `grace` when one is set.
async fn read_within(
    transport: &mut dyn ChildTransport,
    grace: Option<Duration>,
) -> Option<Result<Option<OutputLine>, TransportError>> {
    match grace {
        Some(grace) => tokio::time::timeout(grace, transport.read_next_line())
            .await
            .ok(),
        None => Some(transport.read_next_line().await),
    }
}
