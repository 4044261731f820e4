//! The observe-match-react loop.

mod pacing;
mod runner;
mod state;

pub use pacing::*;
pub use runner::*;
pub use state::*;
