//! Child attached through plain pipes.
//!
//! Output is line-buffered: a line is only seen once the child writes its
//! newline. Stdout and stderr are read concurrently and merged into one
//! stream, in arrival order.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;

use crate::output::OutputLine;
use crate::rules::Reaction;

use super::{ChildCommand, ChildTransport, SendOutcome, SpawnError, TransportError, TransportKind};

/// Lines buffered between the stream readers and the driver.
const LINE_BUFFER: usize = 64;

/// A child process attached through pipes.
#[derive(Debug)]
pub struct PipeTransport {
    child: Child,
    stdin: ChildStdin,
    lines: mpsc::Receiver<std::io::Result<String>>,
}

impl PipeTransport {
    /// Spawn `command` with piped stdin, stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError` if the process fails to spawn.
    pub fn spawn(command: &ChildCommand) -> Result<Self, SpawnError> {
        let mut cmd = Command::new(command.program());
        cmd.args(command.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = command.get_working_dir() {
            cmd.current_dir(dir);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| SpawnError::from_io(e, command.program()))?;

        let stdin = child.stdin.take().ok_or(SpawnError::MissingStream("stdin"))?;
        let stdout = child.stdout.take().ok_or(SpawnError::MissingStream("stdout"))?;
        let stderr = child.stderr.take().ok_or(SpawnError::MissingStream("stderr"))?;

        let (tx, lines) = mpsc::channel(LINE_BUFFER);
        tokio::spawn(forward_lines(stdout, tx.clone()));
        tokio::spawn(forward_lines(stderr, tx));

        tracing::debug!(pid = ?child.id(), "Pipe child spawned");
        Ok(Self { child, stdin, lines })
    }

    /// Check if the process has exited without blocking.
    ///
    /// # Errors
    ///
    /// Returns an error if the process state cannot be queried.
    pub fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    #[cfg(unix)]
    async fn graceful_terminate_unix(&mut self, timeout: Duration) -> std::io::Result<()> {
        if let Some(pid) = self.child.id() {
            super::request_termination(pid);

            match tokio::time::timeout(timeout, self.child.wait()).await {
                Ok(Ok(_)) => Ok(()),
                Ok(Err(e)) => Err(e),
                Err(_) => self.child.kill().await,
            }
        } else {
            // Process already exited
            Ok(())
        }
    }
}

/// Read newline-terminated lines from `stream` into `tx` until end of stream.
async fn forward_lines<R>(stream: R, tx: mpsc::Sender<std::io::Result<String>>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf).into_owned();
                if tx.send(Ok(line)).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                let _ = tx.send(Err(e)).await;
                break;
            }
        }
    }
}

#[async_trait]
impl ChildTransport for PipeTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Pipe
    }

    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    async fn read_next_line(&mut self) -> Result<Option<OutputLine>, TransportError> {
        match self.lines.recv().await {
            Some(Ok(raw)) => Ok(Some(OutputLine::new(raw))),
            Some(Err(e)) => Err(TransportError::Read(e)),
            // Both stdout and stderr reached end of stream.
            None => Ok(None),
        }
    }

    async fn send_reaction(&mut self, reaction: &Reaction) -> Result<SendOutcome, TransportError> {
        let Some(input) = TransportKind::Pipe.encode(reaction) else {
            return Ok(SendOutcome::Unsupported);
        };
        self.stdin
            .write_all(input.as_bytes())
            .await
            .map_err(TransportError::Write)?;
        self.stdin.flush().await.map_err(TransportError::Write)?;
        Ok(SendOutcome::Sent)
    }

    async fn terminate(&mut self, timeout: Duration) -> std::io::Result<()> {
        if self.child.try_wait()?.is_some() {
            return Ok(());
        }

        #[cfg(unix)]
        {
            self.graceful_terminate_unix(timeout).await
        }

        #[cfg(not(unix))]
        {
            let _ = timeout;
            self.child.kill().await
        }
    }
}
