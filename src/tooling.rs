//! Tooling & Integration Layer
//!
//! Command-line interface over the pipeline and the status store.

pub mod cli;
pub mod format;

pub use cli::{Cli, CliContext, Commands};
