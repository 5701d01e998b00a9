//! Launch context: query parameters and frame embedding

use std::collections::BTreeMap;

use log::{debug, info};
use url::Url;

use crate::AuthError;

/// Compares the current window with its top-level ancestor
pub trait FrameProbe {
    /// `Ok(true)` when this is the top-level window. An `Err` means the
    /// ancestor could not be inspected, which only happens across origins.
    fn is_top_level(&self) -> Result<bool, AuthError>;
}

/// Probe for a window that is its own top
#[derive(Debug, Clone, Copy, Default)]
pub struct TopLevel;

impl FrameProbe for TopLevel {
    fn is_top_level(&self) -> Result<bool, AuthError> {
        Ok(true)
    }
}

/// Probe for a window nested in a same-origin frame
#[derive(Debug, Clone, Copy, Default)]
pub struct Framed;

impl FrameProbe for Framed {
    fn is_top_level(&self) -> Result<bool, AuthError> {
        Ok(false)
    }
}

/// `true` when running inside a foreign frame. A failing probe counts as
/// embedded.
pub fn detect_embedding(probe: &dyn FrameProbe) -> bool {
    match probe.is_top_level() {
        Ok(top) => !top,
        Err(e) => {
            debug!("Frame probe failed ({}), treating as embedded", e);
            true
        }
    }
}

/// Query parameters read once when the application starts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchContext {
    pub params: BTreeMap<String, String>,
    /// Whether the client runs inside a foreign frame. Informational for the
    /// caller; the login flow does not branch on it.
    pub embedded: bool,
}

impl LaunchContext {
    /// Parses the query string of the launch URL. Repeated keys keep the first
    /// value.
    pub fn parse(launch_url: &str) -> Result<Self, AuthError> {
        let url = Url::parse(launch_url)?;

        let mut params = BTreeMap::new();
        for (key, value) in url.query_pairs() {
            params
                .entry(key.into_owned())
                .or_insert_with(|| value.into_owned());
        }

        if !params.is_empty() {
            info!("Query parameters detected at launch: {:?}", params.keys().collect::<Vec<_>>());
        }

        Ok(Self {
            params,
            embedded: false,
        })
    }

    pub fn with_embedding(mut self, probe: &dyn FrameProbe) -> Self {
        self.embedded = detect_embedding(probe);
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn uuid(&self) -> Option<&str> {
        self.param("uuid")
    }

    pub fn redirect(&self) -> Option<&str> {
        self.param("redirect")
    }

    pub fn theme(&self) -> Option<&str> {
        self.param("theme")
    }

    pub fn has_valid_uuid(&self) -> bool {
        self.uuid().map_or(false, |uuid| !uuid.is_empty())
    }

    pub fn has_params(&self) -> bool {
        !self.params.is_empty()
    }
}
