//! Detector rules: what to look for in the output and how to react.

mod reaction;
mod rule_set;

pub use reaction::*;
pub use rule_set::*;
