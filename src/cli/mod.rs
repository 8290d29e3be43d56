//! CLI module
//!
//! Provides command-line interface for:
//! - serve: Load config and run the session API
//! - hash-password: Print a password hash for the user directory

mod args;
mod commands;
mod errors;

pub use args::{Cli, Command};
pub use commands::{hash_password, run, run_command, serve, Config, SIGNING_KEY_ENV};
pub use errors::{CliError, CliErrorCode, CliResult};
