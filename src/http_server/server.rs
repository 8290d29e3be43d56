//! # HTTP Server
//!
//! Combines the health and auth routers behind CORS and request tracing.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::auth_routes::{auth_routes, AuthState};
use super::config::HttpServerConfig;
use super::health_routes::health_routes;

/// HTTP server for the session API
pub struct HttpServer {
    config: HttpServerConfig,
    router: Router,
}

impl HttpServer {
    pub fn with_config(config: HttpServerConfig, auth_state: Arc<AuthState>) -> Self {
        let router = Self::build_router(&config, auth_state);
        Self { config, router }
    }

    /// Build the combined router with all endpoints
    fn build_router(config: &HttpServerConfig, auth_state: Arc<AuthState>) -> Router {
        Router::new()
            .merge(health_routes())
            .nest("/auth", auth_routes(auth_state))
            .layer(Self::cors(config))
            .layer(TraceLayer::new_for_http())
    }

    fn cors(config: &HttpServerConfig) -> CorsLayer {
        if config.cors_origins.is_empty() {
            return CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any);
        }

        let origins: Vec<_> = config
            .cors_origins
            .iter()
            .filter_map(|s| match s.parse::<axum::http::HeaderValue>() {
                Ok(origin) => Some(origin),
                Err(_) => {
                    warn!(origin = %s, "ignoring unparsable CORS origin");
                    None
                }
            })
            .collect();

        // Credentialed CORS cannot use wildcard methods or headers
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
            .allow_headers([axum::http::header::CONTENT_TYPE])
            .allow_credentials(true)
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// Get the router (for testing)
    pub fn router(self) -> Router {
        self.router
    }

    /// Start the HTTP server (async)
    pub async fn start(self) -> Result<(), io::Error> {
        let addr: SocketAddr = self
            .config
            .socket_addr()
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, format!("invalid socket address: {}", e)))?;

        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "session API listening");

        axum::serve(listener, self.router).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::user::InMemoryUserDirectory;
    use crate::http_server::config::AuthConfig;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn state() -> Arc<AuthState> {
        let config = AuthConfig::with_signing_key("server_test_key");
        Arc::new(AuthState::in_memory(&config, Arc::new(InMemoryUserDirectory::new())).unwrap())
    }

    #[test]
    fn test_server_with_custom_port() {
        let server = HttpServer::with_config(HttpServerConfig::with_port(9000), state());
        assert_eq!(server.socket_addr(), "0.0.0.0:9000");
    }

    #[tokio::test]
    async fn test_health() {
        let router = HttpServer::with_config(HttpServerConfig::default(), state()).router();

        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_permissive_cors_when_no_origins() {
        let config = HttpServerConfig {
            cors_origins: Vec::new(),
            ..Default::default()
        };
        let router = HttpServer::with_config(config, state()).router();

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header("origin", "http://elsewhere.test")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "*"
        );
    }
}
