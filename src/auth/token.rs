//! # Session Tokens
//!
//! HS256-signed short-lived session tokens.
//!
//! ## Invariants
//! - A token is accepted only if its signature verifies against the server
//!   key and `now < exp`
//! - A token is only handed out once its allow-list record is stored
//! - Tokens carry the refresh token's public fields, never its value

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use uuid::Uuid;

use super::allow_list::SessionAllowList;
use super::errors::{AuthError, AuthResult};
use super::refresh::{expiry_after, RefreshToken};

/// Server secret for signing session tokens
///
/// Loaded once at start and shared read-only.
#[derive(Clone)]
pub struct SigningKey {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKey {
    pub fn new(secret: &[u8]) -> AuthResult<Self> {
        if secret.is_empty() {
            return Err(AuthError::Configuration("signing key is empty".to_string()));
        }

        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        })
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(..)")
    }
}

/// Claim set of a session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (user ID)
    pub sub: String,

    /// Refresh token ID
    pub rti: String,

    /// Refresh token creation (Unix seconds)
    pub rtc: i64,

    /// Refresh token expiry (Unix seconds)
    pub rte: i64,

    /// Issued at (Unix seconds)
    pub iat: i64,

    /// Expiration (Unix seconds)
    pub exp: i64,

    /// Unique per issued token, so two logins in the same second never
    /// share an allow-list entry
    pub jti: String,
}

impl SessionClaims {
    fn new(user_id: Uuid, refresh: &RefreshToken, now: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            sub: user_id.to_string(),
            rti: refresh.id.to_string(),
            rtc: refresh.created_at.timestamp(),
            rte: refresh.expires_at.timestamp(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
        }
    }
}

/// Token handed to the client after login
#[derive(Debug, Clone)]
pub struct IssuedSessionToken {
    pub token: String,
    pub claims: SessionClaims,
    pub expires_at: DateTime<Utc>,
}

/// Mints session tokens and records them in the allow-list
#[derive(Clone)]
pub struct SessionTokenIssuer {
    key: Arc<SigningKey>,
    ttl: Duration,
    allow_list: Arc<dyn SessionAllowList>,
}

impl SessionTokenIssuer {
    pub fn new(key: Arc<SigningKey>, ttl: Duration, allow_list: Arc<dyn SessionAllowList>) -> Self {
        Self { key, ttl, allow_list }
    }

    /// Sign a token for `user_id` and record it
    pub fn issue(
        &self,
        user_id: Uuid,
        device: &str,
        refresh: &RefreshToken,
        now: DateTime<Utc>,
    ) -> AuthResult<IssuedSessionToken> {
        let expires_at = expiry_after(now, self.ttl)?;
        let claims = SessionClaims::new(user_id, refresh, now, expires_at);

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.key.encoding).map_err(|e| {
            error!(%user_id, error = %e, "failed to sign session token");
            AuthError::Signing
        })?;

        if let Err(e) = self.allow_list.delete_expired(now) {
            warn!(error = %e, "failed to evict lapsed session records");
        }

        // An unrecorded token could never be revoked, so don't hand it out.
        self.allow_list
            .save(user_id, device, &token, expires_at)
            .map_err(|e| {
                error!(%user_id, error = %e, "failed to record session token");
                match e {
                    AuthError::Persistence(_) => e,
                    other => AuthError::Persistence(other.to_string()),
                }
            })?;

        Ok(IssuedSessionToken {
            token,
            claims,
            expires_at,
        })
    }
}

/// Identity carried by a verified token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSession {
    pub user_id: Uuid,
    pub refresh_token_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Checks signature and claims of session tokens
#[derive(Clone)]
pub struct SessionTokenVerifier {
    key: Arc<SigningKey>,
}

impl SessionTokenVerifier {
    pub fn new(key: Arc<SigningKey>) -> Self {
        Self { key }
    }

    /// Verify a token against the server key and `now`
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> AuthResult<VerifiedSession> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked below against the caller's clock snapshot.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<SessionClaims>(token, &self.key.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::MissingRequiredClaim(claim) => {
                    AuthError::InvalidClaims(format!("missing {}", claim))
                }
                ErrorKind::Json(_) => AuthError::InvalidClaims("unexpected claim shape".to_string()),
                _ => AuthError::Corrupted,
            }
        })?;
        let claims = data.claims;

        if now.timestamp() >= claims.exp {
            return Err(AuthError::Expired);
        }

        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AuthError::InvalidClaims("subject is not a user id".to_string()))?;
        let refresh_token_id = Uuid::parse_str(&claims.rti)
            .map_err(|_| AuthError::InvalidClaims("refresh token id".to_string()))?;
        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or_else(|| AuthError::InvalidClaims("exp out of range".to_string()))?;

        Ok(VerifiedSession {
            user_id,
            refresh_token_id,
            expires_at,
        })
    }
}
