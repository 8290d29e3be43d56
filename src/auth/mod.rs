//! # Auth Module
//!
//! Cookie-based session authentication.
//!
//! Login verifies credentials, reuses or mints the user's long-lived refresh
//! token, and issues a short-lived signed session token that travels in an
//! HttpOnly cookie. Every issued session token is recorded in an allow-list
//! so logout can revoke it.

pub mod allow_list;
pub mod cookie;
pub mod crypto;
pub mod errors;
pub mod middleware;
pub mod refresh;
pub mod service;
pub mod token;
pub mod user;

pub use allow_list::{InMemorySessionAllowList, SessionAllowList, SessionRecord};
pub use cookie::{SessionCookieCodec, DEFAULT_SESSION_COOKIE};
pub use errors::{AuthError, AuthResult};
pub use middleware::{require_session, AuthGate, AuthenticatedUser};
pub use refresh::{InMemoryRefreshTokenStore, RefreshToken, RefreshTokenPersistence, RefreshTokenRotator};
pub use service::{LoginOutcome, RevocationSummary, SessionOrchestrator, SessionPolicy};
pub use token::{SessionClaims, SessionTokenIssuer, SessionTokenVerifier, SigningKey};
pub use user::{AuthUser, CredentialLookup, CredentialVerifier, InMemoryUserDirectory};
