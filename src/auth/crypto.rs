//! # Cryptographic Utilities
//!
//! Password hashing, secure random tokens and token digests.
//!
//! ## Invariants
//! - Passwords are only stored as Argon2id PHC strings
//! - Secrets are compared in constant time

use argon2::{
    password_hash::{self, rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use std::sync::OnceLock;

use super::errors::{AuthError, AuthResult};

/// Bytes of entropy in a refresh token value
pub const REFRESH_TOKEN_BYTES: usize = 32;

/// Hash a password using Argon2id
pub fn hash_password(password: &str) -> AuthResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::HashingFailed)
}

/// Verify a password against its stored hash
///
/// `Ok(false)` means the password is wrong. An `Err` means the comparison
/// itself could not be carried out (e.g. the stored hash is not a PHC string).
pub fn verify_password(password: &str, hash: &str) -> AuthResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AuthError::PasswordVerification(e.to_string()))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::PasswordVerification(e.to_string())),
    }
}

/// Hash checked when there is no stored hash to compare against
fn decoy_hash() -> &'static str {
    static DECOY: OnceLock<String> = OnceLock::new();
    DECOY.get_or_init(|| hash_password("trainlog-decoy-password").unwrap_or_default())
}

/// Spend one full Argon2 verification on the decoy hash
///
/// A login for an unknown email must cost the same as a wrong password.
pub fn verify_against_decoy(password: &str) {
    let _ = verify_password(password, decoy_hash());
}

/// Generate a cryptographically secure random token
///
/// Returns 256 random bits as URL-safe base64.
pub fn generate_token() -> String {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 digest of a token, used as a storage key
///
/// Stores never hold the literal session token, only this digest.
pub fn digest_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest)
}

/// Constant-time comparison of two strings
pub fn constant_time_str_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
