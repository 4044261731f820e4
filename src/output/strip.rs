//! Terminal control sequence removal.
//!
//! The tunnel client paints its output with colors, cursor movement and
//! window-title updates when it believes it talks to a terminal. Rules are
//! matched against plain text, so every line goes through
//! [`strip_control_sequences`] first.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

/// Matches one escape sequence. Alternatives are ordered longest-first so that
/// an OSC or DCS introducer is never consumed as a two-byte escape.
///
/// - DCS / PM / APC: `ESC P|^|_ ... ESC \`
/// - OSC: `ESC ] ... BEL` or `ESC ] ... ESC \`
/// - CSI: `ESC [ <params 0x30-0x3F> <intermediates 0x20-0x2F> <final 0x40-0x7E>`
/// - two-byte escapes: `ESC 7`, `ESC 8`, `ESC =`, `ESC >`, `ESC @`..`ESC Z`, `ESC \`..`ESC _`
static CONTROL_SEQUENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?s)\x1B[P^_].*?\x1B\\",
        r"|\x1B\][^\x07\x1B]*(?:\x07|\x1B\\)",
        r"|\x1B\[[0-?]*[ -/]*[@-~]",
        r"|\x1B[78=>@-Z\\-_]",
    ))
    .expect("control sequence pattern is valid")
});

/// Remove ANSI/VT escape sequences from `text`.
///
/// Everything that is not part of a recognised sequence is kept as is.
/// Malformed sequences, such as a trailing `ESC [` without a final byte, are
/// left in place.
///
/// Removal runs until nothing more matches, so the result never contains a
/// sequence that only appeared after an inner one was cut out. This makes the
/// function idempotent.
#[must_use]
pub fn strip_control_sequences(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        match CONTROL_SEQUENCE.replace_all(&current, "") {
            Cow::Borrowed(_) => return current,
            Cow::Owned(next) => current = next,
        }
    }
}
