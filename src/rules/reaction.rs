//! Synthetic input sent back to the child.

use serde::{Deserialize, Serialize};

/// Prefix of an action that types literal text.
const LITERAL_PREFIX: &str = "string:";

/// A synthetic input event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reaction {
    /// Confirm the current prompt.
    Enter,
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    /// Type the given text, without a trailing newline.
    Literal(String),
}

impl Reaction {
    /// Whether this reaction is a directional key.
    #[must_use]
    pub fn is_arrow(&self) -> bool {
        matches!(
            self,
            Self::ArrowUp | Self::ArrowDown | Self::ArrowLeft | Self::ArrowRight
        )
    }
}

impl std::fmt::Display for Reaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Enter => write!(f, "Enter"),
            Self::ArrowUp => write!(f, "Up"),
            Self::ArrowDown => write!(f, "Down"),
            Self::ArrowLeft => write!(f, "Left"),
            Self::ArrowRight => write!(f, "Right"),
            Self::Literal(text) => write!(f, "string: {text}"),
        }
    }
}

/// One entry of a rule's action list, as configured.
///
/// Identifiers are case-insensitive: `enter`, `up`, `down`, `left`, `right`
/// and `string:<text>`. The text after `string:` is kept verbatim. Anything
/// else is kept as [`RuleAction::Unknown`] so it can be reported when the rule
/// fires instead of failing the whole rule file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum RuleAction {
    Send(Reaction),
    Unknown(String),
}

impl RuleAction {
    /// Parse a configured action identifier.
    #[must_use]
    pub fn parse(identifier: &str) -> Self {
        let lowered = identifier.to_ascii_lowercase();
        let reaction = match lowered.as_str() {
            "enter" => Reaction::Enter,
            "up" => Reaction::ArrowUp,
            "down" => Reaction::ArrowDown,
            "left" => Reaction::ArrowLeft,
            "right" => Reaction::ArrowRight,
            _ if lowered.starts_with(LITERAL_PREFIX) => {
                Reaction::Literal(identifier[LITERAL_PREFIX.len()..].to_string())
            }
            _ => return Self::Unknown(identifier.to_string()),
        };
        Self::Send(reaction)
    }
}

impl From<String> for RuleAction {
    fn from(identifier: String) -> Self {
        Self::parse(&identifier)
    }
}

impl From<&str> for RuleAction {
    fn from(identifier: &str) -> Self {
        Self::parse(identifier)
    }
}

impl From<Reaction> for RuleAction {
    fn from(reaction: Reaction) -> Self {
        Self::Send(reaction)
    }
}
