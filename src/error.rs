//! Error handling for the LISA client

use std::fmt;

use lisa_rust_auth::AuthError;
use lisa_rust_licenses::LicenseError;
use lisa_rust_notifications::NotificationError;
use thiserror::Error;

use crate::config::ConfigError;

/// Unified error type for the LISA client
#[derive(Error, Debug)]
pub enum Error {
    /// Network or HTTP related errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization or deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Session and login errors
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// License endpoint errors
    #[error("License error: {0}")]
    Licenses(#[from] LicenseError),

    /// Recipient and schedule errors
    #[error("Notification error: {0}")]
    Notifications(#[from] NotificationError),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Local file errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// General errors
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Create a new general error
    pub fn general<T: fmt::Display>(msg: T) -> Self {
        Error::General(msg.to_string())
    }

    /// True when the backend rejected the session, whichever client saw it
    pub fn is_unauthorized(&self) -> bool {
        match self {
            Error::Auth(AuthError::Unauthorized) => true,
            Error::Licenses(e) => e.is_unauthorized(),
            Error::Notifications(e) => e.is_unauthorized(),
            _ => false,
        }
    }
}
