//! Locating, downloading and unpacking the tunnel client.

mod platform;
mod resolver;

pub use platform::*;
pub use resolver::*;
