//! Session data derived from cookies

use std::time::Duration;

use log::{debug, warn};

use crate::cookies::{CookieJar, CookieOptions, SameSite};
use crate::AuthError;

pub const AUTH_TOKEN_KEY: &str = "auth_token";
pub const AUTH_NAME_KEY: &str = "auth_name";
pub const AUTH_GROUP_KEY: &str = "auth_group";
/// Expiry in epoch milliseconds
pub const AUTH_EXPIRES_AT_KEY: &str = "auth_expires_at";

/// All cookies owned by the session
pub const SESSION_KEYS: [&str; 4] = [
    AUTH_TOKEN_KEY,
    AUTH_NAME_KEY,
    AUTH_GROUP_KEY,
    AUTH_EXPIRES_AT_KEY,
];

/// Snapshot of the session cookies
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub token: Option<String>,
    pub name: Option<String>,
    pub group: Option<String>,
    /// Epoch milliseconds; 0 when missing or unparsable
    pub expires_at: i64,
}

impl Session {
    /// Reads the current session cookies
    pub fn read(jar: &CookieJar) -> Self {
        let expires_at = jar
            .get(AUTH_EXPIRES_AT_KEY)
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .unwrap_or(0);

        Self {
            token: jar.get(AUTH_TOKEN_KEY).filter(|t| !t.is_empty()),
            name: jar.get(AUTH_NAME_KEY),
            group: jar.get(AUTH_GROUP_KEY),
            expires_at,
        }
    }

    /// Whether this snapshot is valid at `now_millis`
    pub fn is_valid_at(&self, now_millis: i64) -> bool {
        self.token.is_some() && self.expires_at > 0 && self.expires_at > now_millis
    }

    /// Milliseconds left before expiry; zero or negative once expired
    pub fn remaining_millis(&self, now_millis: i64) -> i64 {
        self.expires_at - now_millis
    }
}

/// `true` iff a non-empty token and a future expiry are present in the jar
pub fn is_authenticated(jar: &CookieJar) -> bool {
    Session::read(jar).is_valid_at(jar.now_millis())
}

/// Token grant about to be written to cookies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    pub token: String,
    pub name: Option<String>,
    pub group: Option<String>,
    pub expires_at: i64,
}

impl Grant {
    /// Resolves the expiry of a fresh token. A server-supplied lifetime (in
    /// seconds) always wins over the client-side default.
    pub fn new(
        token: String,
        expires_in_secs: Option<i64>,
        default_grant: Duration,
        now_millis: i64,
    ) -> Self {
        let lifetime_millis = match expires_in_secs {
            Some(secs) => secs.saturating_mul(1000),
            None => {
                warn!(
                    "Backend did not supply a token lifetime, assuming {}s",
                    default_grant.as_secs()
                );
                default_grant.as_millis() as i64
            }
        };

        Self {
            token,
            name: None,
            group: None,
            expires_at: now_millis.saturating_add(lifetime_millis),
        }
    }

    pub fn with_profile(mut self, name: Option<String>, group: Option<String>) -> Self {
        self.name = name;
        self.group = group;
        self
    }

    /// Writes the grant to cookies. The expiry cookie is written last so that
    /// a partially written session never reads as authenticated.
    pub fn persist(&self, jar: &CookieJar, same_site: SameSite, secure: bool) -> Result<(), AuthError> {
        let options = CookieOptions::new()
            .with_expires_at(self.expires_at)
            .with_same_site(same_site)
            .with_secure(secure);

        jar.set(AUTH_TOKEN_KEY, &self.token, &options)?;
        if let Some(name) = &self.name {
            jar.set(AUTH_NAME_KEY, name, &options)?;
        }
        if let Some(group) = &self.group {
            jar.set(AUTH_GROUP_KEY, group, &options)?;
        }
        jar.set(AUTH_EXPIRES_AT_KEY, &self.expires_at.to_string(), &options)?;

        debug!("Persisted session cookies (expires_at={})", self.expires_at);
        Ok(())
    }
}

/// Deletes every session cookie, attempting all of them even if one fails
pub fn clear(jar: &CookieJar) -> Result<(), AuthError> {
    let mut first_error = None;
    for key in SESSION_KEYS {
        if let Err(e) = jar.delete(key) {
            warn!("Failed to delete cookie {}: {}", key, e);
            first_error.get_or_insert(e);
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
