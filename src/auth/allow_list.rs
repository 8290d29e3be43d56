//! # Session Allow-List
//!
//! Every issued session token is recorded here so logout can revoke it.
//! Records are keyed by the SHA-256 digest of the literal token value.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::crypto::digest_token;
use super::errors::{AuthError, AuthResult};

/// Stored copy of an issued session token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub user_id: Uuid,
    /// Client label, audit only
    pub device: String,
    pub token_digest: String,
    pub expires_at: DateTime<Utc>,
}

/// Allow-list of issued session tokens
pub trait SessionAllowList: Send + Sync {
    /// Record an issued token
    fn save(&self, user_id: Uuid, device: &str, token: &str, expires_at: DateTime<Utc>) -> AuthResult<()>;

    /// Remove the record for exactly this token value.
    /// Returns whether a record existed.
    fn delete(&self, token: &str) -> AuthResult<bool>;

    /// Remove every record of a user
    fn delete_all_for_user(&self, user_id: Uuid) -> AuthResult<usize>;

    /// Remove records whose token has lapsed (`expires_at <= now`)
    fn delete_expired(&self, now: DateTime<Utc>) -> AuthResult<usize>;
}

/// In-memory allow-list
#[derive(Debug, Default)]
pub struct InMemorySessionAllowList {
    records: RwLock<HashMap<String, SessionRecord>>,
}

fn poisoned<T>(_: T) -> AuthError {
    AuthError::Persistence("Lock poisoned".to_string())
}

impl InMemorySessionAllowList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether this token value is recorded
    pub fn contains(&self, token: &str) -> AuthResult<bool> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records.contains_key(&digest_token(token)))
    }

    /// Records held for a user
    pub fn records_for_user(&self, user_id: Uuid) -> AuthResult<Vec<SessionRecord>> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }
}

impl SessionAllowList for InMemorySessionAllowList {
    fn save(&self, user_id: Uuid, device: &str, token: &str, expires_at: DateTime<Utc>) -> AuthResult<()> {
        let mut records = self.records.write().map_err(poisoned)?;

        let token_digest = digest_token(token);
        records.insert(
            token_digest.clone(),
            SessionRecord {
                user_id,
                device: device.to_string(),
                token_digest,
                expires_at,
            },
        );
        Ok(())
    }

    fn delete(&self, token: &str) -> AuthResult<bool> {
        let mut records = self.records.write().map_err(poisoned)?;
        Ok(records.remove(&digest_token(token)).is_some())
    }

    fn delete_all_for_user(&self, user_id: Uuid) -> AuthResult<usize> {
        let mut records = self.records.write().map_err(poisoned)?;

        let len_before = records.len();
        records.retain(|_, r| r.user_id != user_id);
        Ok(len_before - records.len())
    }

    fn delete_expired(&self, now: DateTime<Utc>) -> AuthResult<usize> {
        let mut records = self.records.write().map_err(poisoned)?;

        let len_before = records.len();
        records.retain(|_, r| r.expires_at > now);
        Ok(len_before - records.len())
    }
}
