//! # Refresh Tokens
//!
//! Long-lived per-user secret referenced by every session token.
//!
//! ## Invariants
//! - At most one stored refresh token per user, shared by all devices
//! - A refresh token is valid iff `now < expires_at` and the presented value
//!   equals the stored one
//! - Issuing a session token only replaces the refresh token when the stored
//!   one is absent or expired

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::crypto::{constant_time_str_eq, generate_token};
use super::errors::{AuthError, AuthResult};

/// Stored refresh token record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshToken {
    /// Record identifier (embedded in session tokens)
    pub id: Uuid,

    /// Owner
    pub user_id: Uuid,

    /// Opaque random value
    #[serde(skip_serializing)]
    pub value: String,

    /// When the token was minted
    pub created_at: DateTime<Utc>,

    /// When the token stops being valid
    pub expires_at: DateTime<Utc>,
}

impl RefreshToken {
    /// Mint a new token with a random value
    pub fn mint(user_id: Uuid, now: DateTime<Utc>, ttl: Duration) -> AuthResult<Self> {
        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            value: generate_token(),
            created_at: now,
            expires_at: expiry_after(now, ttl)?,
        })
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// `now + ttl`, failing instead of overflowing
pub(crate) fn expiry_after(now: DateTime<Utc>, ttl: Duration) -> AuthResult<DateTime<Utc>> {
    now.checked_add_signed(ttl).ok_or_else(|| {
        AuthError::Configuration(format!("token lifetime of {}s overflows the clock", ttl.num_seconds()))
    })
}

/// Refresh token storage
pub trait RefreshTokenPersistence: Send + Sync {
    /// Current token for a user
    fn get(&self, user_id: Uuid) -> AuthResult<Option<RefreshToken>>;

    /// Store a token, overwriting whatever the user had
    fn save(&self, token: RefreshToken) -> AuthResult<RefreshToken>;

    /// Store a token only if the user's current record still has
    /// `expected_expiry` (`None` = no record). Fails with
    /// [`AuthError::RefreshTokenConflict`] otherwise.
    fn save_if_unchanged(
        &self,
        expected_expiry: Option<DateTime<Utc>>,
        token: RefreshToken,
    ) -> AuthResult<RefreshToken>;

    /// Delete the user's token
    fn delete(&self, user_id: Uuid) -> AuthResult<()>;

    /// Delete every token the user has; returns how many were removed
    fn delete_all_for_user(&self, user_id: Uuid) -> AuthResult<usize>;
}

/// Fetch-or-mint rotation over a [`RefreshTokenPersistence`]
#[derive(Clone)]
pub struct RefreshTokenRotator {
    store: Arc<dyn RefreshTokenPersistence>,
    ttl: Duration,
}

impl RefreshTokenRotator {
    pub fn new(store: Arc<dyn RefreshTokenPersistence>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Return the user's still-valid token, or mint and store a new one
    pub fn fetch_or_mint(&self, user_id: Uuid, now: DateTime<Utc>) -> AuthResult<RefreshToken> {
        let current = self.store.get(user_id)?;

        if let Some(token) = &current {
            if !token.is_expired(now) {
                debug!(%user_id, token_id = %token.id, "reusing refresh token");
                return Ok(token.clone());
            }
        }

        let fresh = RefreshToken::mint(user_id, now, self.ttl)?;
        let expected = current.map(|t| t.expires_at);

        match self.store.save_if_unchanged(expected, fresh) {
            Ok(saved) => {
                info!(%user_id, token_id = %saved.id, "minted refresh token");
                Ok(saved)
            }
            Err(AuthError::RefreshTokenConflict) => {
                // A concurrent login stored its token first; share it.
                match self.store.get(user_id)? {
                    Some(winner) if !winner.is_expired(now) => {
                        debug!(%user_id, token_id = %winner.id, "adopting concurrently minted refresh token");
                        Ok(winner)
                    }
                    _ => {
                        warn!(%user_id, "refresh token rotation lost a race");
                        Err(AuthError::RefreshTokenConflict)
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Check a presented value against the stored record
    pub fn validate(&self, user_id: Uuid, presented: &str, now: DateTime<Utc>) -> AuthResult<RefreshToken> {
        let token = self
            .store
            .get(user_id)?
            .ok_or(AuthError::InvalidRefreshToken)?;

        if token.is_expired(now) || !constant_time_str_eq(&token.value, presented) {
            return Err(AuthError::InvalidRefreshToken);
        }

        Ok(token)
    }

    /// Remove every refresh token for the user
    pub fn revoke_all(&self, user_id: Uuid) -> AuthResult<usize> {
        self.store.delete_all_for_user(user_id)
    }
}

/// In-memory refresh token store
#[derive(Debug, Default)]
pub struct InMemoryRefreshTokenStore {
    tokens: RwLock<HashMap<Uuid, RefreshToken>>,
}

impl InMemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> AuthError {
    AuthError::Persistence("Lock poisoned".to_string())
}

impl RefreshTokenPersistence for InMemoryRefreshTokenStore {
    fn get(&self, user_id: Uuid) -> AuthResult<Option<RefreshToken>> {
        let tokens = self.tokens.read().map_err(poisoned)?;
        Ok(tokens.get(&user_id).cloned())
    }

    fn save(&self, token: RefreshToken) -> AuthResult<RefreshToken> {
        let mut tokens = self.tokens.write().map_err(poisoned)?;
        tokens.insert(token.user_id, token.clone());
        Ok(token)
    }

    fn save_if_unchanged(
        &self,
        expected_expiry: Option<DateTime<Utc>>,
        token: RefreshToken,
    ) -> AuthResult<RefreshToken> {
        let mut tokens = self.tokens.write().map_err(poisoned)?;

        let stored_expiry = tokens.get(&token.user_id).map(|t| t.expires_at);
        if stored_expiry != expected_expiry {
            return Err(AuthError::RefreshTokenConflict);
        }

        tokens.insert(token.user_id, token.clone());
        Ok(token)
    }

    fn delete(&self, user_id: Uuid) -> AuthResult<()> {
        let mut tokens = self.tokens.write().map_err(poisoned)?;
        tokens.remove(&user_id);
        Ok(())
    }

    fn delete_all_for_user(&self, user_id: Uuid) -> AuthResult<usize> {
        let mut tokens = self.tokens.write().map_err(poisoned)?;
        Ok(usize::from(tokens.remove(&user_id).is_some()))
    }
}
