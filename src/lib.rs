//! trainlog-auth - cookie-based session authentication for the trainlog API

pub mod auth;
pub mod cli;
pub mod http_server;
