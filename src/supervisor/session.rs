//! Session supervisor: resolves the tunnel client, attaches a transport and
//! runs the interaction driver until the session ends.

use tokio_util::sync::CancellationToken;

use crate::binary::{BinaryError, BinaryResolver};
use crate::child::{ChildCommand, SpawnError, TransportKind, DEFAULT_TERMINATE_TIMEOUT};
use crate::config::{ConfigError, Settings};
use crate::display;
use crate::driver::{FixedDelay, InteractionDriver, SessionOutcome};
use crate::remote::{GitHubContentsLog, RemoteLog};
use crate::rules::RuleSet;

/// Fatal errors that end the program with a failure exit code.
#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Could not prepare the tunnel client: {0}")]
    Binary(#[from] BinaryError),

    #[error("Could not start the tunnel client: {0}")]
    Spawn(#[from] SpawnError),
}

/// One supervised run of the tunnel client.
pub struct Session {
    settings: Settings,
    rules: RuleSet,
    cancel: Option<CancellationToken>,
}

impl Session {
    #[must_use]
    pub fn new(settings: Settings, rules: RuleSet) -> Self {
        Self {
            settings,
            rules,
            cancel: None,
        }
    }

    /// Set a cancellation token for operator interrupts.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Transport the session will use.
    #[must_use]
    pub fn transport_kind(&self) -> TransportKind {
        TransportKind::from_choice(self.settings.transport)
    }

    /// Resolve the client, run it to completion and return how it ended.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the client cannot be prepared or started.
    /// Failures after the child is running are reported in the outcome.
    pub async fn run(self) -> Result<SessionOutcome, SessionError> {
        let kind = self.transport_kind();
        tracing::info!(
            commit = %self.settings.commit_id,
            transport = %kind,
            rules = self.rules.len(),
            "Starting tunnel session"
        );

        let executable = BinaryResolver::new(&self.settings)?.resolve().await?;
        let command = ChildCommand::tunnel(executable);

        let remote = remote_log(&self.settings, &self.rules);
        let pacer = FixedDelay::from_millis(self.settings.reaction_delay_ms);
        let mut driver = InteractionDriver::new(&self.rules, &pacer);
        if let Some(remote) = remote.as_ref() {
            driver = driver.with_remote_log(remote);
        }
        if let Some(cancel) = self.cancel.clone() {
            driver = driver.with_cancellation(cancel);
        }

        display::print_status(&format!("Running {command}"));
        let mut transport = match driver.spawn(kind, &command) {
            Ok(transport) => transport,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    program = %command.program().display(),
                    state = ?driver.state(),
                    "Spawn failed"
                );
                return Err(e.into());
            }
        };

        let outcome = driver.run(transport.as_mut()).await;

        if let Err(e) = transport.terminate(DEFAULT_TERMINATE_TIMEOUT).await {
            tracing::warn!(error = %e, "Failed to terminate tunnel client");
        }

        display::print_session_end(&outcome, &driver.stats());
        Ok(outcome)
    }
}

/// Build the remote log if one is configured and usable.
fn remote_log(settings: &Settings, rules: &RuleSet) -> Option<GitHubContentsLog> {
    let Some(remote) = settings.remote_log.as_ref() else {
        if rules.forwards_anything() {
            display::print_warning("Rules forward matches but no remote log is configured");
        }
        return None;
    };

    let Some(token) = remote.resolve_token() else {
        display::print_warning(&format!(
            "No token for the remote log (set `token` or ${}), forwarding disabled",
            remote.token_env
        ));
        return None;
    };

    match GitHubContentsLog::new(remote, token) {
        Ok(log) => {
            tracing::info!(destination = %log.destination(), "Remote log enabled");
            Some(log)
        }
        Err(e) => {
            display::print_warning(&format!("Remote log disabled: {e}"));
            None
        }
    }
}
