//! # Users & Credential Verification
//!
//! The user directory is owned elsewhere; this module only reads it through
//! [`CredentialLookup`] and checks passwords against the stored hash.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use super::crypto::{hash_password, verify_against_decoy, verify_password};
use super::errors::{AuthError, AuthResult};

/// User as seen by the auth subsystem
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    /// Unique user identifier
    pub id: Uuid,

    /// Login email address
    pub email_address: String,

    /// Display name
    pub username: String,

    /// Argon2id password hash (never plaintext)
    #[serde(skip_serializing)]
    pub password_hash: String,
}

impl AuthUser {
    /// Build a user with a freshly hashed password
    pub fn new(email_address: impl Into<String>, username: impl Into<String>, password: &str) -> AuthResult<Self> {
        Ok(Self {
            id: Uuid::new_v4(),
            email_address: email_address.into(),
            username: username.into(),
            password_hash: hash_password(password)?,
        })
    }
}

/// Read access to the user directory
pub trait CredentialLookup: Send + Sync {
    /// Find a user by email. `Ok(None)` when nobody matches.
    fn find_by_email(&self, email_address: &str) -> AuthResult<Option<AuthUser>>;
}

/// Checks an email/password pair against the directory
#[derive(Clone)]
pub struct CredentialVerifier {
    users: Arc<dyn CredentialLookup>,
}

impl CredentialVerifier {
    pub fn new(users: Arc<dyn CredentialLookup>) -> Self {
        Self { users }
    }

    /// Verify credentials
    ///
    /// Returns `Ok(None)` when the directory has no such email or cannot
    /// answer, and `Err(IncorrectCredentials)` when the password does not
    /// match. Every path runs one Argon2 verification.
    pub fn verify(&self, email_address: &str, password: &str) -> AuthResult<Option<AuthUser>> {
        let user = match self.users.find_by_email(email_address) {
            Ok(Some(user)) => user,
            Ok(None) => {
                debug!("no directory entry for login email");
                verify_against_decoy(password);
                return Ok(None);
            }
            Err(e) => {
                warn!(error = %e, "user directory lookup failed");
                verify_against_decoy(password);
                return Ok(None);
            }
        };

        if !verify_password(password, &user.password_hash)? {
            return Err(AuthError::IncorrectCredentials);
        }

        Ok(Some(user))
    }
}

/// In-memory user directory for tests and local runs
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<Vec<AuthUser>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user, replacing any entry with the same email
    pub fn insert(&self, user: AuthUser) -> AuthResult<()> {
        let mut users = self
            .users
            .write()
            .map_err(|_| AuthError::Persistence("Lock poisoned".to_string()))?;
        users.retain(|u| u.email_address != user.email_address);
        users.push(user);
        Ok(())
    }
}

impl CredentialLookup for InMemoryUserDirectory {
    fn find_by_email(&self, email_address: &str) -> AuthResult<Option<AuthUser>> {
        let users = self
            .users
            .read()
            .map_err(|_| AuthError::Persistence("Lock poisoned".to_string()))?;
        Ok(users.iter().find(|u| u.email_address == email_address).cloned())
    }
}
