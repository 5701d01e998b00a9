//! Session and authentication client for the LISA backend
//!
//! This crate keeps a bearer token and its expiry in cookies, derives the
//! authenticated state from them, logs out when the token expires or the
//! backend rejects it, and performs the UUID-based automatic login used when
//! the dashboard is embedded in another application.

pub mod clock;
pub mod cookies;
pub mod embedding;
pub mod fetch;
pub mod manager;
pub mod notify;
pub mod session;
pub mod timer;
pub mod types;

use std::time::Duration;

use thiserror::Error;

pub use clock::{Clock, ManualClock, SystemClock};
pub use cookies::{
    CookieJar, CookieOptions, CookieStore, FileCookieStore, MemoryCookieStore, SameSite,
    StoredCookie,
};
pub use embedding::{detect_embedding, FrameProbe, Framed, LaunchContext, TopLevel};
pub use fetch::{ApiClient, ApiRequest, Envelope};
pub use manager::{SessionManager, SessionManagerBuilder};
pub use notify::{LogNavigator, LogNotifier, Navigator, Notification, Notifier, Variant};
pub use session::{is_authenticated, Grant, Session};
pub use timer::TimerState;
pub use types::*;

/// Error type
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("Cookie storage error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Missing field in response: {0}")]
    MissingField(&'static str),

    #[error("Session rejected by the server")]
    Unauthorized,

    #[error("Login response carried an already expired session")]
    ExpiredGrant,

    #[error("Cannot access parent frame: {0}")]
    FrameAccess(String),
}

impl AuthError {
    /// Builds an API error from a response body, using `fallback` when the
    /// body is empty. JSON bodies contribute their `message` or `data` string.
    pub fn api(status: u16, body: String, fallback: &str) -> Self {
        let from_json = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| {
                ["message", "data", "response"]
                    .iter()
                    .find_map(|key| v.get(*key).and_then(|m| m.as_str()).map(str::to_string))
            })
            .filter(|m| !m.is_empty());

        let message = match from_json {
            Some(message) => message,
            None if body.trim().is_empty() => fallback.to_string(),
            None => body,
        };

        AuthError::ApiError { status, message }
    }
}

/// Client options
#[derive(Debug, Clone)]
pub struct AuthOptions {
    /// Directory sent with username/password logins
    pub directory: String,
    /// Token lifetime assumed when the backend does not send one
    pub default_grant: Duration,
}

impl Default for AuthOptions {
    fn default() -> Self {
        Self {
            directory: "pertamina".to_string(),
            default_grant: Duration::from_secs(3600),
        }
    }
}

impl AuthOptions {
    pub fn with_directory(mut self, directory: &str) -> Self {
        self.directory = directory.to_string();
        self
    }

    pub fn with_default_grant(mut self, default_grant: Duration) -> Self {
        self.default_grant = default_grant;
        self
    }
}
