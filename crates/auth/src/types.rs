//! Wire types for the authentication endpoints

use serde::{Deserialize, Serialize};

/// Body of `POST /auth/login`
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    pub directory: String,
}

/// Successful response of `POST /auth/login`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub name: String,
    pub group: String,
    pub token: String,
    /// Token lifetime in seconds
    #[serde(default)]
    pub expires: Option<i64>,
}

/// Response of `POST /auth/iframeLogin`, either a direct token in `data` or
/// a redirect with cookies to install first
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IframeLoginResponse {
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub redirect: Option<String>,
    #[serde(default)]
    pub cookie_session: Option<String>,
}

impl IframeLoginResponse {
    pub fn redirect_url(&self) -> Option<&str> {
        self.redirect.as_deref().filter(|r| !r.is_empty())
    }

    pub fn direct_token(&self) -> Option<&str> {
        self.data.as_deref().filter(|t| !t.is_empty())
    }
}

/// Progress of the one-shot automatic login
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutoLoginState {
    #[default]
    NotAttempted,
    InFlight,
    Failed,
    Succeeded,
}

/// What an automatic login attempt did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoLoginOutcome {
    /// Token stored, session is authenticated in place
    Authenticated,
    /// Cookies injected and a full navigation to `url` requested
    Redirect { url: String },
    /// The exchange failed; no further attempt will be made
    Failed { message: String },
    /// Nothing was attempted
    Skipped,
}

/// Why the session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutReason {
    User,
    Expired,
    /// The backend answered 401
    Rejected,
}

/// Authentication transitions broadcast by the session manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Authenticated,
    LoggedOut(LogoutReason),
}
