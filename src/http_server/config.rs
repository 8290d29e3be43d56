//! HTTP Server Configuration
//!
//! Listener, CORS and session settings.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::auth::cookie::{SessionCookieCodec, DEFAULT_SESSION_COOKIE};
use crate::auth::errors::{AuthError, AuthResult};
use crate::auth::service::SessionPolicy;
use crate::auth::token::SigningKey;

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpServerConfig {
    /// Host to bind to (default: "0.0.0.0")
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind to (default: 8080)
    #[serde(default = "default_port")]
    pub port: u16,

    /// CORS allowed origins. Empty means permissive.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:5173".to_string(),
        "http://127.0.0.1:5173".to_string(),
    ]
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
        }
    }
}

impl HttpServerConfig {
    /// Create a new config with specified port
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Longest accepted session token lifetime (one day)
pub const MAX_SESSION_TTL_SECS: i64 = 86_400;

/// Longest accepted refresh token lifetime (ten years)
pub const MAX_REFRESH_TTL_DAYS: i64 = 3_650;

/// Session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for session tokens. Must be non-empty.
    #[serde(default)]
    pub signing_key: String,

    /// Session token lifetime in seconds (default: 300)
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: i64,

    /// Refresh token lifetime in days (default: 365)
    #[serde(default = "default_refresh_ttl_days")]
    pub refresh_ttl_days: i64,

    /// Session cookie name
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Mark the cookie `Secure` (HTTPS only)
    #[serde(default)]
    pub cookie_secure: bool,
}

fn default_session_ttl_secs() -> i64 {
    300
}

fn default_refresh_ttl_days() -> i64 {
    365
}

fn default_cookie_name() -> String {
    DEFAULT_SESSION_COOKIE.to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            signing_key: String::new(),
            session_ttl_secs: default_session_ttl_secs(),
            refresh_ttl_days: default_refresh_ttl_days(),
            cookie_name: default_cookie_name(),
            cookie_secure: false,
        }
    }
}

impl AuthConfig {
    /// Config with the given key and default lifetimes
    pub fn with_signing_key(signing_key: impl Into<String>) -> Self {
        Self {
            signing_key: signing_key.into(),
            ..Default::default()
        }
    }

    /// Fails when a lifetime is outside `1..=MAX_*`
    pub fn policy(&self) -> AuthResult<SessionPolicy> {
        if !(1..=MAX_SESSION_TTL_SECS).contains(&self.session_ttl_secs) {
            return Err(AuthError::Configuration(format!(
                "session_ttl_secs must be in 1..={}, got {}",
                MAX_SESSION_TTL_SECS, self.session_ttl_secs
            )));
        }
        if !(1..=MAX_REFRESH_TTL_DAYS).contains(&self.refresh_ttl_days) {
            return Err(AuthError::Configuration(format!(
                "refresh_ttl_days must be in 1..={}, got {}",
                MAX_REFRESH_TTL_DAYS, self.refresh_ttl_days
            )));
        }

        Ok(SessionPolicy {
            session_ttl: Duration::seconds(self.session_ttl_secs),
            refresh_ttl: Duration::days(self.refresh_ttl_days),
        })
    }

    /// Fails when the key is empty
    pub fn signing_key(&self) -> AuthResult<SigningKey> {
        SigningKey::new(self.signing_key.as_bytes())
    }

    pub fn cookie_codec(&self) -> SessionCookieCodec {
        SessionCookieCodec::new(self.cookie_name.clone(), self.cookie_secure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HttpServerConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert!(!config.cors_origins.is_empty());
    }

    #[test]
    fn test_socket_addr() {
        let config = HttpServerConfig::with_port(9000);
        assert_eq!(config.socket_addr(), "0.0.0.0:9000");
    }

    #[test]
    fn test_auth_defaults() {
        let config: AuthConfig = serde_json::from_str(r#"{"signing_key":"k"}"#).unwrap();

        let policy = config.policy().unwrap();
        assert_eq!(policy.session_ttl, Duration::minutes(5));
        assert_eq!(policy.refresh_ttl, Duration::days(365));
        assert_eq!(config.cookie_codec().name(), DEFAULT_SESSION_COOKIE);
        assert!(!config.cookie_secure);
    }

    #[test]
    fn test_empty_signing_key_rejected() {
        let result = AuthConfig::default().signing_key();
        assert!(matches!(result, Err(AuthError::Configuration(_))));
    }

    #[test]
    fn test_policy_bounds() {
        let mut config = AuthConfig::with_signing_key("k");

        config.session_ttl_secs = MAX_SESSION_TTL_SECS;
        config.refresh_ttl_days = MAX_REFRESH_TTL_DAYS;
        assert!(config.policy().is_ok());

        config.refresh_ttl_days = 200_000_000;
        assert!(matches!(config.policy(), Err(AuthError::Configuration(_))));

        config.refresh_ttl_days = 365;
        config.session_ttl_secs = i64::MAX;
        assert!(matches!(config.policy(), Err(AuthError::Configuration(_))));

        config.session_ttl_secs = 0;
        assert!(matches!(config.policy(), Err(AuthError::Configuration(_))));
    }
}
