//! # Session Cookie
//!
//! Binds the session token to an HttpOnly, SameSite=Strict cookie on `/`.

use axum::http::HeaderMap;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

/// Default cookie name
pub const DEFAULT_SESSION_COOKIE: &str = "trainlog_session";

/// Reads and writes the session cookie
#[derive(Debug, Clone)]
pub struct SessionCookieCodec {
    name: String,
    secure: bool,
}

impl Default for SessionCookieCodec {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_COOKIE, false)
    }
}

impl SessionCookieCodec {
    pub fn new(name: impl Into<String>, secure: bool) -> Self {
        Self {
            name: name.into(),
            secure,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn cookie(&self, value: String) -> Cookie<'static> {
        Cookie::build((self.name.clone(), value))
            .http_only(true)
            .same_site(SameSite::Strict)
            .path("/")
            .secure(self.secure)
            .build()
    }

    /// Add the session cookie carrying `token`
    pub fn bind(&self, jar: CookieJar, token: &str) -> CookieJar {
        jar.add(self.cookie(token.to_string()))
    }

    /// Overwrite the session cookie with an expired, empty one
    ///
    /// Always emits a `Set-Cookie`, whether or not the request carried one.
    pub fn clear(&self, jar: CookieJar) -> CookieJar {
        let mut removal = self.cookie(String::new());
        removal.make_removal();
        jar.add(removal)
    }

    /// Session token from a cookie jar, if any
    pub fn extract(&self, jar: &CookieJar) -> Option<String> {
        jar.get(&self.name)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Session token straight from request headers
    pub fn extract_from_headers(&self, headers: &HeaderMap) -> Option<String> {
        self.extract(&CookieJar::from_headers(headers))
    }
}
