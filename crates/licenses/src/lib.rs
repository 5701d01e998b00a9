//! License records for the LISA backend
//!
//! This crate manages the license inventory behind the dashboard.
//!
//! # Features
//!
//! - Paginated, searchable and sortable listing
//! - Create, update and delete with client-side validation
//! - Bulk import from a spreadsheet upload
//! - Price history export
//! - Status classification and table helpers

pub mod client;
pub mod export;
pub mod table;
pub mod types;

use lisa_rust_auth::AuthError;
use thiserror::Error;

pub use client::LicensesClient;
pub use export::{history_rows, license_rows, price_rows, HistoryRow, LicenseRow, PriceRow};
pub use table::{
    format_rupiah, paginate, search_history, sort_history, sort_licenses, HistorySortField,
    StatusSummary,
};
pub use types::*;

/// Error type
#[derive(Error, Debug)]
pub enum LicenseError {
    #[error(transparent)]
    Auth(AuthError),

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid license: {}", .0.join(", "))]
    Validation(Vec<String>),

    #[error("Session invalid, please sign in again")]
    SessionInvalid,
}

impl From<AuthError> for LicenseError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::ApiError { status, message } => LicenseError::ApiError { status, message },
            other => LicenseError::Auth(other),
        }
    }
}

impl LicenseError {
    /// True when the backend rejected the session
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, LicenseError::Auth(AuthError::Unauthorized))
    }
}
