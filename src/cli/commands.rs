//! CLI command implementations

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::auth::crypto;
use crate::auth::user::{AuthUser, InMemoryUserDirectory};
use crate::http_server::{AuthConfig, AuthState, HttpServer, HttpServerConfig};

use super::args::Command;
use super::errors::{CliError, CliResult};

/// Environment variable that overrides `auth.signing_key`
pub const SIGNING_KEY_ENV: &str = "TRAINLOG_SIGNING_KEY";

const DEFAULT_LOG_FILTER: &str = "trainlog_auth=info,tower_http=info";

/// Configuration file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: HttpServerConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    /// Directory entries served by the in-memory user directory
    #[serde(default)]
    pub users: Vec<AuthUser>,
}

impl Config {
    /// Load configuration from file, applying environment overrides
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;

        let mut config: Config = serde_json::from_str(&content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;

        config.apply_signing_key_override(env::var(SIGNING_KEY_ENV).ok());
        config.validate()?;

        Ok(config)
    }

    /// Replace the file key with a non-empty override
    pub fn apply_signing_key_override(&mut self, key: Option<String>) {
        if let Some(key) = key.filter(|k| !k.is_empty()) {
            self.auth.signing_key = key;
        }
    }

    fn validate(&self) -> CliResult<()> {
        if self.auth.signing_key.is_empty() {
            return Err(CliError::config_error(format!(
                "auth.signing_key must not be empty (or set {})",
                SIGNING_KEY_ENV
            )));
        }

        self.auth
            .policy()
            .map_err(|e| CliError::config_error(format!("auth: {}", e)))?;

        if self.auth.cookie_name.is_empty() {
            return Err(CliError::config_error("auth.cookie_name must not be empty"));
        }

        let mut seen = HashSet::new();
        for user in &self.users {
            if !seen.insert(user.email_address.as_str()) {
                return Err(CliError::config_error(format!(
                    "duplicate user email: {}",
                    user.email_address
                )));
            }
        }

        Ok(())
    }

    /// Build the in-memory user directory from `users`
    pub fn user_directory(&self) -> CliResult<InMemoryUserDirectory> {
        let directory = InMemoryUserDirectory::new();
        for user in &self.users {
            directory.insert(user.clone())?;
        }
        Ok(directory)
    }
}

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    init_tracing();
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Serve { config } => serve(&config),
        Command::HashPassword { password } => {
            println!("{}", hash_password(&password)?);
            Ok(())
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Start the HTTP server
pub fn serve(config_path: &Path) -> CliResult<()> {
    let config = Config::load(config_path)?;

    let users = Arc::new(config.user_directory()?);
    let auth_state = Arc::new(AuthState::in_memory(&config.auth, users)?);
    info!(
        users = config.users.len(),
        session_ttl_secs = config.auth.session_ttl_secs,
        "auth subsystem ready"
    );

    let server = HttpServer::with_config(config.server.clone(), auth_state);

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))?;

    rt.block_on(async {
        server
            .start()
            .await
            .map_err(|e| CliError::boot_failed(format!("HTTP server failed: {}", e)))
    })?;

    Ok(())
}

/// Argon2id hash for a directory entry
pub fn hash_password(password: &str) -> CliResult<String> {
    if password.is_empty() {
        return Err(CliError::config_error("password must not be empty"));
    }
    Ok(crypto::hash_password(password)?)
}
