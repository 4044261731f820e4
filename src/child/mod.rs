//! Child process transports.
//!
//! The tunnel client is attached either through plain pipes or through a
//! pseudo-terminal. Both are exposed as a [`ChildTransport`] so the driver
//! never needs to know which one it talks to.

mod command;
mod pipe;
mod pty;
mod transport;

pub use command::*;
pub use pipe::*;
pub use pty::*;
pub use transport::*;
