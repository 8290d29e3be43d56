//! Auth HTTP Routes
//!
//! Login and logout endpoints on top of [`SessionOrchestrator`], plus the
//! routes that sit behind the session gate.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Json, State},
    http::{header::USER_AGENT, HeaderMap, StatusCode},
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Router,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::allow_list::{InMemorySessionAllowList, SessionAllowList};
use crate::auth::cookie::SessionCookieCodec;
use crate::auth::errors::{AuthError, AuthResult};
use crate::auth::middleware::{require_session, AuthGate, AuthenticatedUser};
use crate::auth::refresh::{InMemoryRefreshTokenStore, RefreshTokenPersistence};
use crate::auth::service::SessionOrchestrator;
use crate::auth::user::{AuthUser, CredentialLookup};

use super::config::AuthConfig;

const UNKNOWN_DEVICE: &str = "unknown";
const INVALID_REQUEST: &str = "invalid request";
const MAX_DEVICE_LEN: usize = 256;

/// Shared auth state
pub struct AuthState {
    pub orchestrator: SessionOrchestrator,
    pub gate: Arc<AuthGate>,
    pub cookies: SessionCookieCodec,
}

impl AuthState {
    /// Wire the auth components from config and storage collaborators
    pub fn new(
        config: &AuthConfig,
        users: Arc<dyn CredentialLookup>,
        refresh_tokens: Arc<dyn RefreshTokenPersistence>,
        allow_list: Arc<dyn SessionAllowList>,
    ) -> AuthResult<Self> {
        let key = Arc::new(config.signing_key()?);
        let policy = config.policy()?;
        let cookies = config.cookie_codec();

        Ok(Self {
            orchestrator: SessionOrchestrator::new(
                users,
                refresh_tokens,
                allow_list,
                key.clone(),
                policy,
            ),
            gate: Arc::new(AuthGate::new(key, cookies.clone())),
            cookies,
        })
    }

    /// In-memory refresh token store and allow-list
    pub fn in_memory(config: &AuthConfig, users: Arc<dyn CredentialLookup>) -> AuthResult<Self> {
        Self::new(
            config,
            users,
            Arc::new(InMemoryRefreshTokenStore::new()),
            Arc::new(InMemorySessionAllowList::new()),
        )
    }
}

/// Auth routes with shared state
pub fn auth_routes(state: Arc<AuthState>) -> Router {
    let protected = Router::new()
        .route("/logout-all", post(logout_all_handler))
        .route("/session", get(session_handler))
        .route_layer(from_fn_with_state(state.gate.clone(), require_session));

    Router::new()
        .route("/login", post(login_handler))
        .route("/logout", post(logout_handler))
        .merge(protected)
        .with_state(state)
}

// ==================
// Request/Response Types
// ==================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email_address: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub email_address: String,
    pub username: String,
}

impl From<&AuthUser> for UserResponse {
    fn from(user: &AuthUser) -> Self {
        Self {
            id: user.id.to_string(),
            email_address: user.email_address.clone(),
            username: user.username.clone(),
        }
    }
}

/// Login body. `user` is `null` on rejection.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: Option<UserResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

// ==================
// Handlers
// ==================

/// Client label recorded with the session, taken from `User-Agent`
fn device_label(headers: &HeaderMap) -> String {
    headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| v.chars().take(MAX_DEVICE_LEN).collect())
        .unwrap_or_else(|| UNKNOWN_DEVICE.to_string())
}

/// Login handler
async fn login_handler(
    State(state): State<Arc<AuthState>>,
    headers: HeaderMap,
    jar: CookieJar,
    request: Result<Json<LoginRequest>, JsonRejection>,
) -> Response {
    let now = Utc::now();
    let device = device_label(&headers);

    let request = match request {
        Ok(Json(request)) => request,
        Err(rejection) => {
            info!(device = %device, reason = %rejection.body_text(), "login body rejected");
            let body = LoginResponse {
                user: None,
                error: Some(INVALID_REQUEST),
            };
            return (rejection.status(), state.cookies.clear(jar), Json(body)).into_response();
        }
    };

    let user = match state
        .orchestrator
        .verify_credentials(&request.email_address, &request.password)
    {
        Ok(user) => user,
        Err(AuthError::IncorrectCredentials) => {
            info!(device = %device, "login rejected");
            let body = LoginResponse {
                user: None,
                error: Some(AuthError::IncorrectCredentials.client_message()),
            };
            return (StatusCode::UNAUTHORIZED, state.cookies.clear(jar), Json(body)).into_response();
        }
        Err(e) => return (state.cookies.clear(jar), e).into_response(),
    };

    match state.orchestrator.login(user.id, &device, now) {
        Ok(outcome) => {
            let body = LoginResponse {
                user: Some(UserResponse::from(&user)),
                error: None,
            };
            (state.cookies.bind(jar, &outcome.session.token), Json(body)).into_response()
        }
        Err(e) => (state.cookies.clear(jar), e).into_response(),
    }
}

/// Logout handler
///
/// Always clears the cookie. Revocation is best effort.
async fn logout_handler(State(state): State<Arc<AuthState>>, jar: CookieJar) -> impl IntoResponse {
    if let Some(token) = state.cookies.extract(&jar) {
        if let Err(e) = state.orchestrator.logout(&token) {
            warn!(error = %e, "failed to revoke session token on logout");
        }
    }

    (state.cookies.clear(jar), StatusCode::NO_CONTENT)
}

/// Revoke every session and the refresh token of the caller
async fn logout_all_handler(
    State(state): State<Arc<AuthState>>,
    Extension(user): Extension<AuthenticatedUser>,
    jar: CookieJar,
) -> Response {
    let jar = state.cookies.clear(jar);
    match state.orchestrator.logout_everywhere(user.user_id) {
        Ok(_) => (jar, StatusCode::NO_CONTENT).into_response(),
        Err(e) => (jar, e).into_response(),
    }
}

/// Identity of the caller
async fn session_handler(Extension(user): Extension<AuthenticatedUser>) -> Json<AuthenticatedUser> {
    Json(user)
}
