//! Ordered detector rules and line evaluation.

use serde::Deserialize;

use super::RuleAction;

/// Errors found while validating a rule set.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum RuleSetError {
    /// A rule has an empty match text, which would match every line.
    #[error("Detector rule #{index} has an empty match text")]
    EmptyMatch { index: usize },
}

/// A substring to watch for and what to do when it shows up.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DetectorRule {
    /// Case-sensitive substring searched for in each cleaned line.
    #[serde(rename = "match")]
    pub match_text: String,
    /// Forward the matching line to the remote log.
    #[serde(default, rename = "upload")]
    pub forward: bool,
    /// Actions performed in order after a match.
    #[serde(default, rename = "action")]
    pub actions: Vec<RuleAction>,
}

impl DetectorRule {
    /// Create a rule without actions that does not forward.
    #[must_use]
    pub fn new(match_text: impl Into<String>) -> Self {
        Self {
            match_text: match_text.into(),
            forward: false,
            actions: Vec::new(),
        }
    }

    /// Set whether matches are forwarded to the remote log.
    #[must_use]
    pub fn forward(mut self, forward: bool) -> Self {
        self.forward = forward;
        self
    }

    /// Append an action.
    #[must_use]
    pub fn action(mut self, action: impl Into<RuleAction>) -> Self {
        self.actions.push(action.into());
        self
    }

    /// Check if the line contains this rule's match text.
    #[must_use]
    pub fn matches(&self, line: &str) -> bool {
        line.contains(&self.match_text)
    }
}

/// On-disk layout of the rule document.
#[derive(Debug, Default, Deserialize)]
struct RuleDocument {
    #[serde(default)]
    detect: Vec<DetectorRule>,
}

/// Immutable, ordered collection of detector rules.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<DetectorRule>,
}

impl RuleSet {
    /// Build a rule set, rejecting rules with an empty match text.
    ///
    /// # Errors
    ///
    /// Returns `RuleSetError::EmptyMatch` naming the first offending rule.
    pub fn new(rules: Vec<DetectorRule>) -> Result<Self, RuleSetError> {
        if let Some(index) = rules.iter().position(|r| r.match_text.is_empty()) {
            return Err(RuleSetError::EmptyMatch { index });
        }
        Ok(Self { rules })
    }

    /// Parse a TOML rule document made of `[[detect]]` tables.
    ///
    /// # Errors
    ///
    /// Returns `RuleLoadError` if the document is malformed or a rule is invalid.
    pub fn from_toml(source: &str) -> Result<Self, RuleLoadError> {
        let document: RuleDocument = toml::from_str(source)?;
        Ok(Self::new(document.detect)?)
    }

    /// Every rule whose match text occurs in `line`, in configured order.
    #[must_use]
    pub fn evaluate<'s>(&'s self, line: &'s str) -> Vec<&'s DetectorRule> {
        self.matching(line).map(|(_, rule)| rule).collect()
    }

    /// Matching rules with their position in the set, in configured order.
    pub fn matching<'s>(
        &'s self,
        line: &'s str,
    ) -> impl Iterator<Item = (usize, &'s DetectorRule)> + 's {
        self.rules
            .iter()
            .enumerate()
            .filter(move |(_, rule)| rule.matches(line))
    }

    /// All rules, in configured order.
    #[must_use]
    pub fn rules(&self) -> &[DetectorRule] {
        &self.rules
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Whether any rule forwards to the remote log.
    #[must_use]
    pub fn forwards_anything(&self) -> bool {
        self.rules.iter().any(|r| r.forward)
    }
}

/// Errors from parsing a rule document.
#[derive(thiserror::Error, Debug)]
pub enum RuleLoadError {
    #[error("Malformed rule document: {0}")]
    Parse(#[from] toml::de::Error),
    #[error(transparent)]
    Invalid(#[from] RuleSetError),
}
