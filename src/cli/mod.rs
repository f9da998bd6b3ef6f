//! Command-line interface: argument parsing and command runners.

pub mod args;
pub mod commands;

pub use args::{Cli, Commands};
