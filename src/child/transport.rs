//! The transport contract shared by pipe and pseudo-terminal children.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::TransportChoice;
use crate::output::OutputLine;
use crate::rules::Reaction;

use super::{ChildCommand, PipeTransport, PtyTransport, SpawnError};

/// Default timeout for graceful child termination.
pub const DEFAULT_TERMINATE_TIMEOUT: Duration = Duration::from_secs(5);

/// How the child is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Plain pipes; stderr is merged into the observed output.
    Pipe,
    /// A pseudo-terminal; the child sees an interactive terminal.
    Pty,
}

impl TransportKind {
    /// Transport for the current host: pipes on Windows, a pseudo-terminal
    /// everywhere else.
    #[must_use]
    pub fn for_host() -> Self {
        if cfg!(windows) {
            Self::Pipe
        } else {
            Self::Pty
        }
    }

    /// Resolve a configured choice.
    #[must_use]
    pub fn from_choice(choice: TransportChoice) -> Self {
        match choice {
            TransportChoice::Auto => Self::for_host(),
            TransportChoice::Pipe => Self::Pipe,
            TransportChoice::Pty => Self::Pty,
        }
    }

    /// Bytes to write for `reaction`, or `None` if this transport cannot
    /// express it.
    ///
    /// Pipes carry no terminal key codes, so arrows are unsupported there.
    #[must_use]
    pub fn encode(self, reaction: &Reaction) -> Option<&str> {
        match (self, reaction) {
            (_, Reaction::Literal(text)) => Some(text),
            (Self::Pipe, Reaction::Enter) => Some("\n"),
            (Self::Pipe, _) => None,
            (Self::Pty, Reaction::Enter) => Some("\r"),
            (Self::Pty, Reaction::ArrowUp) => Some("\x1b[A"),
            (Self::Pty, Reaction::ArrowDown) => Some("\x1b[B"),
            (Self::Pty, Reaction::ArrowRight) => Some("\x1b[C"),
            (Self::Pty, Reaction::ArrowLeft) => Some("\x1b[D"),
        }
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pipe => write!(f, "pipe"),
            Self::Pty => write!(f, "pty"),
        }
    }
}

/// Result of sending a reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The input was written to the child.
    Sent,
    /// The transport has no way to express the reaction; nothing was written.
    Unsupported,
}

/// Errors while talking to a running child.
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("Failed to read child output: {0}")]
    Read(#[source] std::io::Error),
    #[error("Failed to write child input: {0}")]
    Write(#[source] std::io::Error),
}

/// A running child process: its output stream, its input stream and its
/// lifetime.
///
/// Exactly one owner reads and writes a transport. After
/// [`ChildTransport::terminate`] the transport must not be used again.
#[async_trait]
pub trait ChildTransport: Send {
    /// How the child is attached.
    fn kind(&self) -> TransportKind;

    /// Process ID of the child, if known.
    fn id(&self) -> Option<u32>;

    /// Wait for the next line of output.
    ///
    /// Blocks for as long as the child stays silent. Returns `Ok(None)` once
    /// the child has closed its output.
    async fn read_next_line(&mut self) -> Result<Option<OutputLine>, TransportError>;

    /// Write a reaction to the child's input.
    async fn send_reaction(&mut self, reaction: &Reaction) -> Result<SendOutcome, TransportError>;

    /// Stop the child, first politely, then forcefully after `timeout`.
    async fn terminate(&mut self, timeout: Duration) -> std::io::Result<()>;
}

/// Start `command` attached through the transport of the given kind.
///
/// Must be called from within a Tokio runtime.
///
/// # Errors
///
/// Returns `SpawnError` if the child cannot be started.
pub fn spawn_transport(
    kind: TransportKind,
    command: &ChildCommand,
) -> Result<Box<dyn ChildTransport>, SpawnError> {
    tracing::info!(transport = %kind, command = %command, "Spawning child");
    match kind {
        TransportKind::Pipe => Ok(Box::new(PipeTransport::spawn(command)?)),
        TransportKind::Pty => Ok(Box::new(PtyTransport::spawn(command)?)),
    }
}

/// Ask a process to terminate with SIGTERM.
#[cfg(unix)]
pub(crate) fn request_termination(pid: u32) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let nix_pid = Pid::from_raw(i32::try_from(pid).unwrap_or(i32::MAX));
    if let Err(e) = kill(nix_pid, Signal::SIGTERM) {
        tracing::debug!(pid, error = %e, "SIGTERM not delivered");
    }
}
