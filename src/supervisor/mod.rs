//! Top-level coordination of a tunnel session.

mod session;

pub use session::*;
