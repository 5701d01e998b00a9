//! Expiry notification settings for the LISA backend
//!
//! The backend mails license expiry reports to a list of recipients on a
//! cron schedule. This crate manages both.

pub mod recipients;
pub mod schedule;

use lisa_rust_auth::AuthError;
use thiserror::Error;

pub use recipients::{EmailRecipient, EmailType, RecipientForm, RecipientsClient};
pub use schedule::{CronJob, SaveOutcome, Schedule, ScheduleClient, ScheduleTime};

/// Error type
#[derive(Error, Debug)]
pub enum NotificationError {
    #[error(transparent)]
    Auth(AuthError),

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid input: {}", .0.join(", "))]
    Validation(Vec<String>),

    #[error("Invalid cron expression '{expression}': {reason}")]
    InvalidCron { expression: String, reason: String },
}

impl From<AuthError> for NotificationError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::ApiError { status, message } => {
                NotificationError::ApiError { status, message }
            }
            other => NotificationError::Auth(other),
        }
    }
}

impl NotificationError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, NotificationError::Auth(AuthError::Unauthorized))
    }
}
