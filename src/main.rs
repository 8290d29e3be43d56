//! trainlog CLI entry point
//!
//! All logic is delegated to the CLI module; this only reports the error and
//! sets the exit code.

use trainlog_auth::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
