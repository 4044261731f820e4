//! Child attached through a pseudo-terminal.
//!
//! A terminal is character-oriented: interactive prompts are printed without
//! a trailing newline and then wait for input. Complete lines are handed out
//! as soon as their newline arrives. A trailing fragment is handed out as a
//! line of its own once the child has been quiet for [`PROMPT_SETTLE`]. If the
//! child then finishes that line, the completed line repeats the fragment and
//! is marked as its continuation.

use std::io::{Read, Write};
use std::time::Duration;

use async_trait::async_trait;
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use tokio::sync::mpsc;

use crate::output::{Frame, LineSplitter, OutputLine};
use crate::rules::Reaction;

use super::{ChildCommand, ChildTransport, SendOutcome, SpawnError, TransportError, TransportKind};

/// Quiet period after which an unterminated fragment is treated as a prompt.
pub const PROMPT_SETTLE: Duration = Duration::from_millis(100);

/// Poll interval while waiting for a terminated child to exit.
const EXIT_POLL: Duration = Duration::from_millis(50);

const READ_CHUNK: usize = 4096;

/// Chunks buffered between the reader thread and the driver.
const CHUNK_BUFFER: usize = 64;

const TERMINAL_SIZE: PtySize = PtySize {
    rows: 24,
    cols: 120,
    pixel_width: 0,
    pixel_height: 0,
};

/// A child process attached to a pseudo-terminal.
pub struct PtyTransport {
    child: Box<dyn Child + Send + Sync>,
    writer: Box<dyn Write + Send>,
    chunks: mpsc::Receiver<std::io::Result<Vec<u8>>>,
    splitter: LineSplitter,
    eof: bool,
    _master: Box<dyn MasterPty + Send>,
}

impl std::fmt::Debug for PtyTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PtyTransport")
            .field("child", &self.child)
            .field("eof", &self.eof)
            .finish_non_exhaustive()
    }
}

impl PtyTransport {
    /// Spawn `command` on a fresh pseudo-terminal.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError::Pty` if the terminal cannot be opened or the
    /// process cannot be started on it.
    pub fn spawn(command: &ChildCommand) -> Result<Self, SpawnError> {
        let pair = native_pty_system()
            .openpty(TERMINAL_SIZE)
            .map_err(|e| SpawnError::Pty(e.to_string()))?;

        let mut cmd = CommandBuilder::new(command.program());
        cmd.args(command.args());
        if let Some(dir) = command.get_working_dir() {
            cmd.cwd(dir);
        }
        cmd.env("TERM", "xterm-256color");

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| SpawnError::Pty(format!("{}: {e}", command.program().display())))?;
        // Only the child may hold the slave side, or end of stream is never seen.
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| SpawnError::Pty(e.to_string()))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| SpawnError::Pty(e.to_string()))?;

        // Detached: a grandchild may keep the terminal open past our exit.
        let (tx, chunks) = mpsc::channel(CHUNK_BUFFER);
        std::thread::Builder::new()
            .name("pty-reader".to_string())
            .spawn(move || read_chunks(reader, &tx))?;

        tracing::debug!(pid = ?child.process_id(), "PTY child spawned");
        Ok(Self {
            child,
            writer,
            chunks,
            splitter: LineSplitter::new(),
            eof: false,
            _master: pair.master,
        })
    }

    async fn next_chunk(&mut self) -> Option<std::io::Result<Vec<u8>>> {
        self.chunks.recv().await
    }
}

/// Blocking read loop feeding raw terminal output into `tx`.
fn read_chunks(mut reader: Box<dyn Read + Send>, tx: &mpsc::Sender<std::io::Result<Vec<u8>>>) {
    let mut buf = [0u8; READ_CHUNK];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if tx.blocking_send(Ok(buf[..n].to_vec())).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) if is_hangup(&e) => break,
            Err(e) => {
                tracing::error!(error = %e, "PTY read error");
                let _ = tx.blocking_send(Err(e));
                break;
            }
        }
    }
    tracing::debug!("PTY reader finished");
}

/// Linux reports EIO on the master once the last slave handle is closed.
#[cfg(unix)]
fn is_hangup(err: &std::io::Error) -> bool {
    err.raw_os_error() == Some(nix::errno::Errno::EIO as i32)
}

#[cfg(not(unix))]
fn is_hangup(err: &std::io::Error) -> bool {
    err.kind() == std::io::ErrorKind::BrokenPipe
}

#[async_trait]
impl ChildTransport for PtyTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Pty
    }

    fn id(&self) -> Option<u32> {
        self.child.process_id()
    }

    async fn read_next_line(&mut self) -> Result<Option<OutputLine>, TransportError> {
        loop {
            if let Some(frame) = self.splitter.next_line() {
                return Ok(Some(frame.into_terminal_line()));
            }
            if self.eof {
                return Ok(self.splitter.finish().map(Frame::into_terminal_line));
            }

            let chunk = if self.splitter.has_partial() {
                if let Ok(chunk) = tokio::time::timeout(PROMPT_SETTLE, self.next_chunk()).await {
                    chunk
                } else {
                    if let Some(fragment) = self.splitter.take_partial() {
                        return Ok(Some(fragment.into_terminal_line()));
                    }
                    self.next_chunk().await
                }
            } else {
                self.next_chunk().await
            };

            match chunk {
                Some(Ok(bytes)) => self.splitter.push(&bytes),
                Some(Err(e)) => return Err(TransportError::Read(e)),
                None => self.eof = true,
            }
        }
    }

    async fn send_reaction(&mut self, reaction: &Reaction) -> Result<SendOutcome, TransportError> {
        let Some(input) = TransportKind::Pty.encode(reaction) else {
            return Ok(SendOutcome::Unsupported);
        };
        self.writer
            .write_all(input.as_bytes())
            .map_err(TransportError::Write)?;
        self.writer.flush().map_err(TransportError::Write)?;
        // The answered prompt is done; its echo starts a new line.
        self.splitter.discard_carry();
        Ok(SendOutcome::Sent)
    }

    async fn terminate(&mut self, timeout: Duration) -> std::io::Result<()> {
        if self.child.try_wait()?.is_some() {
            return Ok(());
        }

        #[cfg(unix)]
        {
            if let Some(pid) = self.child.process_id() {
                super::request_termination(pid);
                let deadline = tokio::time::Instant::now() + timeout;
                while tokio::time::Instant::now() < deadline {
                    if self.child.try_wait()?.is_some() {
                        return Ok(());
                    }
                    tokio::time::sleep(EXIT_POLL).await;
                }
            }
        }

        #[cfg(not(unix))]
        let _ = timeout;

        self.child.kill()?;
        let _ = self.child.try_wait();
        Ok(())
    }
}
