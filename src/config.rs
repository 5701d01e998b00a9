//! Configuration options for the LISA client

use std::path::PathBuf;
use std::time::Duration;

use lisa_rust_auth::AuthOptions;
use thiserror::Error;

/// Backend used when `LISA_ISDEV=true`
pub const DEV_BASE_URL: &str = "http://localhost:8282";

/// Production backend
pub const PROD_BASE_URL: &str = "https://digio.pgn.co.id/lisa_backend";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Configuration options for the LISA client
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Backend base URL, without a trailing slash
    pub base_url: String,

    /// The request timeout
    pub request_timeout: Option<Duration>,

    /// Directory sent with username/password logins
    pub login_directory: String,

    /// Token lifetime assumed when the backend does not send one
    pub default_grant: Duration,

    /// Where session cookies are kept between runs. `None` keeps them in
    /// memory.
    pub cookie_file: Option<PathBuf>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        let auth = AuthOptions::default();
        Self {
            base_url: PROD_BASE_URL.to_string(),
            request_timeout: Some(Duration::from_secs(30)),
            login_directory: auth.directory,
            default_grant: auth.default_grant,
            cookie_file: None,
        }
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}

impl ClientOptions {
    /// Reads options from the process environment, loading `.env` first
    /// when present
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            log::debug!("Loaded environment from {}", path.display());
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads options through `lookup`. Unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut options = Self::default();

        if let Some(value) = lookup("LISA_ISDEV") {
            if parse_bool("LISA_ISDEV", &value)? {
                options.base_url = DEV_BASE_URL.to_string();
            }
        }

        if let Some(value) = lookup("LISA_BASE_URL").filter(|v| !v.trim().is_empty()) {
            if url::Url::parse(value.trim()).is_err() {
                return Err(ConfigError::InvalidValue {
                    key: "LISA_BASE_URL",
                    value,
                });
            }
            options = options.with_base_url(value.trim());
        }

        if let Some(value) = lookup("LISA_LOGIN_DIRECTORY").filter(|v| !v.trim().is_empty()) {
            options.login_directory = value.trim().to_string();
        }

        if let Some(value) = lookup("LISA_COOKIE_FILE").filter(|v| !v.trim().is_empty()) {
            options.cookie_file = Some(PathBuf::from(value.trim()));
        }

        if let Some(value) = lookup("LISA_REQUEST_TIMEOUT_SECS") {
            let secs: u64 = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    key: "LISA_REQUEST_TIMEOUT_SECS",
                    value: value.clone(),
                })?;
            options.request_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        Ok(options)
    }

    /// Set the backend base URL
    pub fn with_base_url(mut self, value: &str) -> Self {
        self.base_url = value.trim_end_matches('/').to_string();
        self
    }

    /// Set the request timeout
    pub fn with_request_timeout(mut self, value: Option<Duration>) -> Self {
        self.request_timeout = value;
        self
    }

    pub fn with_login_directory(mut self, value: &str) -> Self {
        self.login_directory = value.to_string();
        self
    }

    pub fn with_default_grant(mut self, value: Duration) -> Self {
        self.default_grant = value;
        self
    }

    /// Persist session cookies in `path`
    pub fn with_cookie_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.cookie_file = Some(path.into());
        self
    }

    pub fn auth_options(&self) -> AuthOptions {
        AuthOptions::default()
            .with_directory(&self.login_directory)
            .with_default_grant(self.default_grant)
    }
}
