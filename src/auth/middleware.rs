//! # Auth Gate
//!
//! Per-request middleware that validates the session cookie and injects the
//! caller's identity into request extensions.
//!
//! The gate trusts signature + expiry alone. It does not look at the
//! allow-list or the refresh token, so a logged-out token keeps working until
//! it lapses.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, warn};
use uuid::Uuid;

use super::cookie::SessionCookieCodec;
use super::errors::{AuthError, AuthResult};
use super::token::{SessionTokenVerifier, SigningKey, VerifiedSession};

/// Identity of the caller, available to handlers behind the gate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub refresh_token_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl From<VerifiedSession> for AuthenticatedUser {
    fn from(session: VerifiedSession) -> Self {
        Self {
            user_id: session.user_id,
            refresh_token_id: session.refresh_token_id,
            expires_at: session.expires_at,
        }
    }
}

/// Validates session cookies
#[derive(Clone)]
pub struct AuthGate {
    verifier: SessionTokenVerifier,
    cookies: SessionCookieCodec,
}

impl AuthGate {
    pub fn new(key: Arc<SigningKey>, cookies: SessionCookieCodec) -> Self {
        Self {
            verifier: SessionTokenVerifier::new(key),
            cookies,
        }
    }

    /// Resolve the caller from the request headers
    pub fn authenticate(&self, headers: &HeaderMap, now: DateTime<Utc>) -> AuthResult<AuthenticatedUser> {
        let token = self
            .cookies
            .extract_from_headers(headers)
            .ok_or(AuthError::MissingCookie)?;

        self.verifier.verify(&token, now).map(AuthenticatedUser::from)
    }
}

/// Middleware rejecting requests without a valid session
pub async fn require_session(
    State(gate): State<Arc<AuthGate>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    match gate.authenticate(req.headers(), Utc::now()) {
        Ok(user) => {
            req.extensions_mut().insert(user);
            Ok(next.run(req).await)
        }
        Err(e) => {
            warn!(
                method = %req.method(),
                uri = %req.uri(),
                reason = %e,
                "rejected unauthenticated request"
            );
            Err(e)
        }
    }
}

/// Error body sent to clients
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if !self.is_client_error() {
            error!(error = %self, "auth request failed");
        }

        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(ErrorResponse {
            error: self.client_message(),
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::allow_list::InMemorySessionAllowList;
    use crate::auth::refresh::RefreshToken;
    use crate::auth::token::SessionTokenIssuer;
    use axum::{
        body::{to_bytes, Body},
        http::{header::COOKIE, HeaderValue, Request as HttpRequest},
        middleware::from_fn_with_state,
        routing::get,
        Extension, Router,
    };
    use chrono::Duration;
    use tower::ServiceExt;

    fn setup() -> (Arc<AuthGate>, SessionTokenIssuer) {
        let key = Arc::new(SigningKey::new(b"gate_test_key").unwrap());
        let gate = Arc::new(AuthGate::new(key.clone(), SessionCookieCodec::default()));
        let issuer = SessionTokenIssuer::new(key, Duration::minutes(5), Arc::new(InMemorySessionAllowList::new()));
        (gate, issuer)
    }

    fn mint(issuer: &SessionTokenIssuer, user_id: Uuid, now: DateTime<Utc>) -> String {
        let refresh = RefreshToken::mint(user_id, now, Duration::days(365)).unwrap();
        issuer.issue(user_id, "test", &refresh, now).unwrap().token
    }

    fn cookie_headers(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("trainlog_session={}", token)).unwrap(),
        );
        headers
    }

    fn app(gate: Arc<AuthGate>) -> Router {
        Router::new()
            .route(
                "/whoami",
                get(|Extension(user): Extension<AuthenticatedUser>| async move {
                    user.user_id.to_string()
                }),
            )
            .layer(from_fn_with_state(gate, require_session))
    }

    #[test]
    fn test_missing_cookie() {
        let (gate, _) = setup();
        let err = gate.authenticate(&HeaderMap::new(), Utc::now()).unwrap_err();

        assert_eq!(err, AuthError::MissingCookie);
        assert_eq!(err.to_string(), "no cookie");
    }

    #[test]
    fn test_reasons_are_distinguished() {
        let (gate, issuer) = setup();
        let now = Utc::now();
        let token = mint(&issuer, Uuid::new_v4(), now);

        assert_eq!(
            gate.authenticate(&cookie_headers("garbage"), now).unwrap_err(),
            AuthError::Corrupted
        );
        assert_eq!(
            gate.authenticate(&cookie_headers(&token), now + Duration::minutes(5))
                .unwrap_err(),
            AuthError::Expired
        );
    }

    #[test]
    fn test_valid_cookie_resolves_user() {
        let (gate, issuer) = setup();
        let user_id = Uuid::new_v4();
        let now = Utc::now();
        let token = mint(&issuer, user_id, now);

        let user = gate.authenticate(&cookie_headers(&token), now).unwrap();
        assert_eq!(user.user_id, user_id);
    }

    #[tokio::test]
    async fn test_gate_injects_identity() {
        let (gate, issuer) = setup();
        let user_id = Uuid::new_v4();
        let token = mint(&issuer, user_id, Utc::now());

        let response = app(gate)
            .oneshot(
                HttpRequest::builder()
                    .uri("/whoami")
                    .header(COOKIE, format!("trainlog_session={}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body, user_id.to_string().as_bytes());
    }

    #[tokio::test]
    async fn test_gate_rejects_without_cookie() {
        let (gate, _) = setup();

        let response = app(gate)
            .oneshot(HttpRequest::builder().uri("/whoami").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, serde_json::json!({ "error": "unauthorized" }));
    }

    #[tokio::test]
    async fn test_expired_and_corrupted_look_identical_to_client() {
        let (gate, issuer) = setup();
        let stale = mint(&issuer, Uuid::new_v4(), Utc::now() - Duration::minutes(10));

        let mut bodies = Vec::new();
        for token in [stale.as_str(), "not-a-token"] {
            let response = app(gate.clone())
                .oneshot(
                    HttpRequest::builder()
                        .uri("/whoami")
                        .header(COOKIE, format!("trainlog_session={}", token))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            bodies.push(to_bytes(response.into_body(), usize::MAX).await.unwrap());
        }

        assert_eq!(bodies[0], bodies[1]);
    }
}
