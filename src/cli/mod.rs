//! Command-line interface for swe-retry.
//!
//! Parses the task id and harness options, then drives the attempt controller.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli};
