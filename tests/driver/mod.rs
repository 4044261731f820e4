//! Interaction driver tests against a scripted child.


use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use tunnel_autopilot::child::{ChildTransport, SendOutcome, TransportError, TransportKind};
use tunnel_autopilot::driver::Pacer;
use tunnel_autopilot::output::OutputLine;
use tunnel_autopilot::remote::{RemoteLog, RemoteLogError};
use tunnel_autopilot::rules::Reaction;

/// Something observable the driver did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Input(String),
    Unsupported(String),
    Forward(String),
    Pause,
}

/// Shared, ordered record of events across the fakes.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<Event>>>);

impl EventLog {
    pub fn push(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }

    pub fn inputs(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Input(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn forwards(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Forward(s) => Some(s),
                _ => None,
            })
            .collect()
    }
}

/// One step of a scripted child.
pub enum Step {
    Line(&'static str),
    /// Text handed out before its newline arrived.
    Fragment(&'static str),
    /// The completed line, repeating the fragment before it.
    Continuation(&'static str),
    Fail,
}

/// A child whose output is a fixed script.
pub struct ScriptedChild {
    kind: TransportKind,
    script: VecDeque<Step>,
    hang_at_end: bool,
    writes_left: Option<usize>,
    log: EventLog,
    pub sent_at: Vec<Instant>,
    pub terminated: bool,
}

impl ScriptedChild {
    pub fn new(kind: TransportKind, log: &EventLog, script: Vec<Step>) -> Self {
        Self {
            kind,
            script: script.into(),
            hang_at_end: false,
            writes_left: None,
            log: log.clone(),
            sent_at: Vec::new(),
            terminated: false,
        }
    }

    pub fn lines(kind: TransportKind, log: &EventLog, lines: &[&'static str]) -> Self {
        Self::new(kind, log, lines.iter().copied().map(Step::Line).collect())
    }

    /// Stay silent instead of closing output once the script is done.
    pub fn hang_at_end(mut self) -> Self {
        self.hang_at_end = true;
        self
    }

    /// Accept `count` reactions, then fail every write.
    pub fn fail_writes_after(mut self, count: usize) -> Self {
        self.writes_left = Some(count);
        self
    }
}

#[async_trait]
impl ChildTransport for ScriptedChild {
    fn kind(&self) -> TransportKind {
        self.kind
    }

    fn id(&self) -> Option<u32> {
        None
    }

    async fn read_next_line(&mut self) -> Result<Option<OutputLine>, TransportError> {
        match self.script.pop_front() {
            Some(Step::Line(raw)) => Ok(Some(OutputLine::new(raw))),
            Some(Step::Fragment(raw)) => Ok(Some(OutputLine::new(raw).with_fragment(true))),
            Some(Step::Continuation(raw)) => {
                Ok(Some(OutputLine::new(raw).with_continuation(true)))
            }
            Some(Step::Fail) => Err(TransportError::Read(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "child went away",
            ))),
            None if self.hang_at_end => std::future::pending().await,
            None => Ok(None),
        }
    }

    async fn send_reaction(&mut self, reaction: &Reaction) -> Result<SendOutcome, TransportError> {
        match self.writes_left.as_mut() {
            Some(0) => {
                return Err(TransportError::Write(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "child stopped reading",
                )));
            }
            Some(left) => *left -= 1,
            None => {}
        }
        if let Some(input) = self.kind.encode(reaction) {
            self.log.push(Event::Input(input.to_string()));
            self.sent_at.push(Instant::now());
            Ok(SendOutcome::Sent)
        } else {
            self.log.push(Event::Unsupported(reaction.to_string()));
            Ok(SendOutcome::Unsupported)
        }
    }

    async fn terminate(&mut self, _timeout: Duration) -> std::io::Result<()> {
        self.terminated = true;
        Ok(())
    }
}

/// Remote log that records appends and optionally fails them.
pub struct RecordingRemote {
    log: EventLog,
    fail: bool,
}

impl RecordingRemote {
    pub fn new(log: &EventLog) -> Self {
        Self {
            log: log.clone(),
            fail: false,
        }
    }

    pub fn failing(log: &EventLog) -> Self {
        Self {
            log: log.clone(),
            fail: true,
        }
    }
}

#[async_trait]
impl RemoteLog for RecordingRemote {
    async fn append(&self, line: &str) -> Result<(), RemoteLogError> {
        self.log.push(Event::Forward(line.to_string()));
        if self.fail {
            Err(RemoteLogError::Fetch { status: 503 })
        } else {
            Ok(())
        }
    }

    fn destination(&self) -> String {
        "memory".to_string()
    }
}

/// Pacer that records pauses without waiting.
pub struct RecordingPacer {
    log: EventLog,
}

impl RecordingPacer {
    pub fn new(log: &EventLog) -> Self {
        Self { log: log.clone() }
    }
}

#[async_trait]
impl Pacer for RecordingPacer {
    async fn pause(&self) {
        self.log.push(Event::Pause);
    }
}
