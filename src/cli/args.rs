//! CLI argument definitions using clap
//!
//! Commands:
//! - trainlog serve --config <path>
//! - trainlog hash-password <password>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Trainlog session API
#[derive(Parser, Debug)]
#[command(name = "trainlog")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP server
    Serve {
        /// Path to configuration file
        #[arg(long, default_value = "./trainlog.json")]
        config: PathBuf,
    },

    /// Print the Argon2id hash of a password, for seeding the user directory
    HashPassword {
        password: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
