//! Cleaning and framing of child process output.

mod line;
mod strip;

pub use line::*;
pub use strip::*;
