//! # Session Orchestration
//!
//! Login and logout flows composed from credential verification, refresh
//! token rotation and session token issuance.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use super::allow_list::SessionAllowList;
use super::errors::{AuthError, AuthResult};
use super::refresh::{RefreshToken, RefreshTokenPersistence, RefreshTokenRotator};
use super::token::{IssuedSessionToken, SessionTokenIssuer, SigningKey};
use super::user::{AuthUser, CredentialLookup, CredentialVerifier};

/// Lifetimes of the two token kinds
#[derive(Debug, Clone)]
pub struct SessionPolicy {
    /// Session token lifetime
    pub session_ttl: Duration,

    /// Refresh token lifetime
    pub refresh_ttl: Duration,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            session_ttl: Duration::minutes(5),
            refresh_ttl: Duration::days(365),
        }
    }
}

/// Result of a successful login
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub session: IssuedSessionToken,
    pub refresh_token: RefreshToken,
}

/// What logout-everywhere removed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevocationSummary {
    pub sessions: usize,
    pub refresh_tokens: usize,
}

/// Composes the login/logout flows
#[derive(Clone)]
pub struct SessionOrchestrator {
    credentials: CredentialVerifier,
    refresh: RefreshTokenRotator,
    issuer: SessionTokenIssuer,
    allow_list: Arc<dyn SessionAllowList>,
}

impl SessionOrchestrator {
    pub fn new(
        users: Arc<dyn CredentialLookup>,
        refresh_tokens: Arc<dyn RefreshTokenPersistence>,
        allow_list: Arc<dyn SessionAllowList>,
        key: Arc<SigningKey>,
        policy: SessionPolicy,
    ) -> Self {
        Self {
            credentials: CredentialVerifier::new(users),
            refresh: RefreshTokenRotator::new(refresh_tokens, policy.refresh_ttl),
            issuer: SessionTokenIssuer::new(key, policy.session_ttl, allow_list.clone()),
            allow_list,
        }
    }

    /// Check an email/password pair
    ///
    /// Unknown emails and wrong passwords both come back as
    /// [`AuthError::IncorrectCredentials`].
    pub fn verify_credentials(&self, email_address: &str, password: &str) -> AuthResult<AuthUser> {
        self.credentials
            .verify(email_address, password)?
            .ok_or(AuthError::IncorrectCredentials)
    }

    /// Start a session for an already-authenticated user
    pub fn login(&self, user_id: Uuid, device: &str, now: DateTime<Utc>) -> AuthResult<LoginOutcome> {
        let refresh_token = self.refresh.fetch_or_mint(user_id, now)?;
        let session = self.issuer.issue(user_id, device, &refresh_token, now)?;

        info!(%user_id, device, expires_at = %session.expires_at, "session started");

        Ok(LoginOutcome {
            session,
            refresh_token,
        })
    }

    /// Revoke the allow-list entry for exactly this token value
    ///
    /// Returns whether an entry was removed.
    pub fn logout(&self, token: &str) -> AuthResult<bool> {
        let removed = self.allow_list.delete(token)?;
        if !removed {
            warn!("logout presented a token with no allow-list entry");
        }
        Ok(removed)
    }

    /// Drop the user's refresh token and every recorded session
    pub fn logout_everywhere(&self, user_id: Uuid) -> AuthResult<RevocationSummary> {
        let sessions = self.allow_list.delete_all_for_user(user_id)?;
        let refresh_tokens = self.refresh.revoke_all(user_id)?;

        info!(%user_id, sessions, refresh_tokens, "revoked all sessions");

        Ok(RevocationSummary {
            sessions,
            refresh_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::allow_list::InMemorySessionAllowList;
    use crate::auth::refresh::InMemoryRefreshTokenStore;
    use crate::auth::token::SessionTokenVerifier;
    use crate::auth::user::InMemoryUserDirectory;

    struct Fixture {
        orchestrator: SessionOrchestrator,
        verifier: SessionTokenVerifier,
        allow_list: Arc<InMemorySessionAllowList>,
        refresh_tokens: Arc<InMemoryRefreshTokenStore>,
        user: AuthUser,
    }

    struct OfflineRefreshStore;

    impl RefreshTokenPersistence for OfflineRefreshStore {
        fn get(&self, _: Uuid) -> AuthResult<Option<RefreshToken>> {
            Err(AuthError::Persistence("refresh store offline".to_string()))
        }
        fn save(&self, _: RefreshToken) -> AuthResult<RefreshToken> {
            Err(AuthError::Persistence("refresh store offline".to_string()))
        }
        fn save_if_unchanged(&self, _: Option<DateTime<Utc>>, _: RefreshToken) -> AuthResult<RefreshToken> {
            Err(AuthError::Persistence("refresh store offline".to_string()))
        }
        fn delete(&self, _: Uuid) -> AuthResult<()> {
            Err(AuthError::Persistence("refresh store offline".to_string()))
        }
        fn delete_all_for_user(&self, _: Uuid) -> AuthResult<usize> {
            Err(AuthError::Persistence("refresh store offline".to_string()))
        }
    }

    fn fixture() -> Fixture {
        let directory = Arc::new(InMemoryUserDirectory::new());
        let user = AuthUser::new("a@b.com", "alice", "Secret123").unwrap();
        directory.insert(user.clone()).unwrap();

        let allow_list = Arc::new(InMemorySessionAllowList::new());
        let refresh_tokens = Arc::new(InMemoryRefreshTokenStore::new());
        let key = Arc::new(SigningKey::new(b"orchestrator_test_key").unwrap());

        Fixture {
            orchestrator: SessionOrchestrator::new(
                directory,
                refresh_tokens.clone(),
                allow_list.clone(),
                key.clone(),
                SessionPolicy::default(),
            ),
            verifier: SessionTokenVerifier::new(key),
            allow_list,
            refresh_tokens,
            user,
        }
    }

    #[test]
    fn test_login_issues_verifiable_five_minute_token() {
        let f = fixture();
        let now = Utc::now();

        let user = f.orchestrator.verify_credentials("a@b.com", "Secret123").unwrap();
        let outcome = f.orchestrator.login(user.id, "laptop", now).unwrap();

        assert_eq!(outcome.session.claims.exp, (now + Duration::minutes(5)).timestamp());
        let session = f.verifier.verify(&outcome.session.token, now).unwrap();
        assert_eq!(session.user_id, f.user.id);
        assert_eq!(session.refresh_token_id, outcome.refresh_token.id);
    }

    #[test]
    fn test_unknown_email_and_wrong_password_look_the_same() {
        let f = fixture();

        let wrong_password = f.orchestrator.verify_credentials("a@b.com", "nope").unwrap_err();
        let unknown_email = f.orchestrator.verify_credentials("x@b.com", "Secret123").unwrap_err();

        assert_eq!(wrong_password, unknown_email);
        assert_eq!(wrong_password, AuthError::IncorrectCredentials);
    }

    #[test]
    fn test_repeat_login_reuses_refresh_token() {
        let f = fixture();
        let now = Utc::now();

        let first = f.orchestrator.login(f.user.id, "laptop", now).unwrap();
        let second = f.orchestrator.login(f.user.id, "phone", now + Duration::hours(1)).unwrap();

        assert_eq!(first.refresh_token.value, second.refresh_token.value);
        assert_ne!(first.session.token, second.session.token);
    }

    #[test]
    fn test_login_after_refresh_expiry_rotates() {
        let f = fixture();
        let now = Utc::now();

        let first = f.orchestrator.login(f.user.id, "laptop", now).unwrap();
        let later = first.refresh_token.expires_at + Duration::seconds(1);
        let second = f.orchestrator.login(f.user.id, "laptop", later).unwrap();

        assert_ne!(first.refresh_token.value, second.refresh_token.value);
        assert_eq!(
            f.refresh_tokens.get(f.user.id).unwrap().unwrap().value,
            second.refresh_token.value
        );
    }

    #[test]
    fn test_logout_revokes_only_presented_token() {
        let f = fixture();
        let now = Utc::now();

        let laptop = f.orchestrator.login(f.user.id, "laptop", now).unwrap();
        let phone = f.orchestrator.login(f.user.id, "phone", now).unwrap();

        assert!(f.orchestrator.logout(&laptop.session.token).unwrap());

        assert!(!f.allow_list.contains(&laptop.session.token).unwrap());
        assert!(f.allow_list.contains(&phone.session.token).unwrap());
        // The refresh token survives a single logout
        assert!(f.refresh_tokens.get(f.user.id).unwrap().is_some());
        // Logging out twice is harmless
        assert!(!f.orchestrator.logout(&laptop.session.token).unwrap());
    }

    #[test]
    fn test_logout_everywhere() {
        let f = fixture();
        let now = Utc::now();

        f.orchestrator.login(f.user.id, "laptop", now).unwrap();
        f.orchestrator.login(f.user.id, "phone", now).unwrap();

        let summary = f.orchestrator.logout_everywhere(f.user.id).unwrap();

        assert_eq!(
            summary,
            RevocationSummary {
                sessions: 2,
                refresh_tokens: 1
            }
        );
        assert!(f.refresh_tokens.get(f.user.id).unwrap().is_none());
    }

    #[test]
    fn test_refresh_store_failure_aborts_login() {
        let f = fixture();
        let orchestrator = SessionOrchestrator::new(
            Arc::new(InMemoryUserDirectory::new()),
            Arc::new(OfflineRefreshStore),
            f.allow_list.clone(),
            Arc::new(SigningKey::new(b"k").unwrap()),
            SessionPolicy::default(),
        );

        let result = orchestrator.login(f.user.id, "laptop", Utc::now());

        assert!(matches!(result, Err(AuthError::Persistence(_))));
        assert!(f.allow_list.records_for_user(f.user.id).unwrap().is_empty());
    }
}
