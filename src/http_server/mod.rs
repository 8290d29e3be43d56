//! # HTTP Server Module
//!
//! Axum server exposing the session endpoints.
//!
//! # Endpoints
//!
//! - `/health` - Health check
//! - `/auth/login`, `/auth/logout` - Session lifecycle
//! - `/auth/logout-all`, `/auth/session` - Behind the session gate

pub mod auth_routes;
pub mod config;
pub mod health_routes;
pub mod server;

pub use auth_routes::{auth_routes, AuthState};
pub use config::{AuthConfig, HttpServerConfig};
pub use server::HttpServer;
