//! Tunnel Autopilot - unattended driver for an interactive tunnel client.

pub mod binary;
pub mod child;
pub mod config;
pub mod display;
pub mod driver;
pub mod output;
pub mod remote;
pub mod rules;
pub mod supervisor;
