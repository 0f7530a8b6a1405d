//! CLI module for tardigrade
//!
//! One subcommand per store operation. Output is a single JSON object on
//! stdout; logs go to stderr.

mod args;
mod commands;
mod config;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{run, run_command};
pub use config::Config;
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_error, write_response};
