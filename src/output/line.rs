//! Output lines and byte-stream framing.

use std::collections::VecDeque;

use super::strip_control_sequences;

/// Caret-notation echo of a cursor-down key (`ESC [ B`) as a terminal prints
/// it back. It survives stripping because it is plain text.
const CURSOR_DOWN_ECHO: &str = "^[[B";

/// A single line of child output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    raw: String,
    cleaned: String,
    fragment: bool,
    continuation: bool,
}

impl OutputLine {
    /// Build a line from raw child output, stripping control sequences and
    /// surrounding whitespace.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let cleaned = strip_control_sequences(raw.trim()).trim().to_string();
        Self {
            raw,
            cleaned,
            fragment: false,
            continuation: false,
        }
    }

    /// Mark the line as handed out before its newline arrived.
    #[must_use]
    pub fn with_fragment(mut self, fragment: bool) -> Self {
        self.fragment = fragment;
        self
    }

    /// Mark the line as extending the fragment handed out just before it.
    /// Its text includes that fragment.
    #[must_use]
    pub fn with_continuation(mut self, continuation: bool) -> Self {
        self.continuation = continuation;
        self
    }

    /// Build a line read from a pseudo-terminal.
    ///
    /// Same as [`OutputLine::new`], plus removal of echoed cursor-down
    /// artifacts from the front of the cleaned text.
    #[must_use]
    pub fn from_terminal(raw: impl Into<String>) -> Self {
        let mut line = Self::new(raw);
        line.cleaned = trim_cursor_artifacts(&line.cleaned).to_string();
        line
    }

    /// The line as the child wrote it.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The line without control sequences, used for display and matching.
    #[must_use]
    pub fn cleaned(&self) -> &str {
        &self.cleaned
    }

    /// Whether nothing but whitespace and control sequences was read.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.cleaned.is_empty()
    }

    /// Whether the child may still add to this line.
    #[must_use]
    pub fn is_fragment(&self) -> bool {
        self.fragment
    }

    #[must_use]
    pub fn is_continuation(&self) -> bool {
        self.continuation
    }
}

/// Drop leading `^[[B` echoes, and the whitespace around them.
///
/// Only this one artifact is recognised. Anything else is returned untouched.
#[must_use]
pub fn trim_cursor_artifacts(text: &str) -> &str {
    let mut rest = text;
    while let Some(stripped) = rest.strip_prefix(CURSOR_DOWN_ECHO) {
        rest = stripped.trim_start();
    }
    rest
}

/// A piece of terminal output framed by [`LineSplitter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Raw text, including any fragment of the same line handed out before.
    pub text: String,
    /// Handed out before its newline arrived.
    pub fragment: bool,
    /// Extends a fragment that was already handed out.
    pub continues: bool,
}

impl Frame {
    fn line(text: String, continues: bool) -> Self {
        Self {
            text,
            fragment: false,
            continues,
        }
    }

    /// Convert into an output line read from a pseudo-terminal.
    #[must_use]
    pub fn into_terminal_line(self) -> OutputLine {
        OutputLine::from_terminal(self.text)
            .with_fragment(self.fragment)
            .with_continuation(self.continues)
    }
}

/// Splits a byte stream into newline-terminated lines.
///
/// Bytes are buffered until a `\n` arrives, so multi-byte UTF-8 characters
/// split across reads are decoded correctly. A trailing `\r` is kept in the
/// line and removed later by [`OutputLine`].
///
/// Text handed out early through [`LineSplitter::take_partial`] is carried
/// over: the frame that eventually completes the line contains it again and
/// is marked as a continuation.
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: Vec<u8>,
    carry: Option<String>,
    complete: VecDeque<Frame>,
}

impl LineSplitter {
    /// Create an empty splitter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes read from the child.
    pub fn push(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            if byte == b'\n' {
                let rest = std::mem::take(&mut self.pending);
                let frame = self.join(&String::from_utf8_lossy(&rest));
                self.complete.push_back(frame);
            } else {
                self.pending.push(byte);
            }
        }
    }

    /// Next complete line, if any.
    pub fn next_line(&mut self) -> Option<Frame> {
        self.complete.pop_front()
    }

    /// Whether bytes without a terminating newline are buffered.
    #[must_use]
    pub fn has_partial(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Take the buffered fragment without waiting for a newline.
    ///
    /// An incomplete UTF-8 sequence at the end of the fragment stays buffered
    /// so the rest of the character can still arrive.
    pub fn take_partial(&mut self) -> Option<Frame> {
        if self.pending.is_empty() {
            return None;
        }
        let valid = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(_) => self.pending.len(),
        };
        if valid == 0 {
            return None;
        }
        let rest = self.pending.split_off(valid);
        let head = std::mem::replace(&mut self.pending, rest);

        let mut frame = self.join(&String::from_utf8_lossy(&head));
        frame.fragment = true;
        self.carry = Some(frame.text.clone());
        Some(frame)
    }

    /// Forget the carried fragment; whatever follows starts a new line.
    pub fn discard_carry(&mut self) {
        self.carry = None;
    }

    /// Take everything still buffered, at end of stream.
    pub fn finish(&mut self) -> Option<Frame> {
        if self.pending.is_empty() {
            self.carry = None;
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(self.join(&String::from_utf8_lossy(&rest)))
    }

    fn join(&mut self, text: &str) -> Frame {
        match self.carry.take() {
            Some(mut carried) => {
                carried.push_str(text);
                Frame::line(carried, true)
            }
            None => Frame::line(text.to_string(), false),
        }
    }
}
