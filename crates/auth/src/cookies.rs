//! Cookie storage for session state
//!
//! The jar mirrors browser cookie semantics closely enough for the session
//! manager: names and values are percent-encoded on write, every cookie
//! carries `path`, `SameSite` and `Secure` attributes, and a cookie whose
//! expiry has passed is never returned.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{TimeZone, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::clock::Clock;
use crate::AuthError;

/// `SameSite` cookie attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SameSite {
    #[default]
    Lax,
    Strict,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lax => "Lax",
            Self::Strict => "Strict",
            Self::None => "None",
        }
    }
}

/// Attributes applied when writing a cookie
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieOptions {
    /// Epoch milliseconds after which the cookie disappears. `None` keeps it
    /// for the lifetime of the store.
    pub expires_at: Option<i64>,
    pub path: String,
    pub same_site: SameSite,
    pub secure: bool,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            expires_at: None,
            path: "/".to_string(),
            same_site: SameSite::Lax,
            secure: false,
        }
    }
}

impl CookieOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attributes usable from inside a third-party frame (`SameSite=None; Secure`)
    pub fn cross_site() -> Self {
        Self::default().with_same_site(SameSite::None).with_secure(true)
    }

    pub fn with_expires_at(mut self, expires_at: i64) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn with_path(mut self, path: &str) -> Self {
        self.path = path.to_string();
        self
    }

    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }
}

/// A cookie as held by a [`CookieStore`]. Name and value are kept encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    pub expires_at: Option<i64>,
    pub path: String,
    pub same_site: SameSite,
    pub secure: bool,
}

impl StoredCookie {
    pub fn is_expired(&self, now_millis: i64) -> bool {
        matches!(self.expires_at, Some(expires_at) if expires_at <= now_millis)
    }

    /// Renders the cookie the way it would appear in a `Set-Cookie` header
    pub fn header_value(&self) -> String {
        let mut cookie = format!("{}={};", self.name, self.value);

        if let Some(expires_at) = self.expires_at {
            if let Some(date) = Utc.timestamp_millis_opt(expires_at).single() {
                cookie.push_str(&format!(
                    "expires={};",
                    date.format("%a, %d %b %Y %H:%M:%S GMT")
                ));
            }
        }

        cookie.push_str(&format!("path={};", self.path));
        cookie.push_str(&format!("SameSite={};", self.same_site.as_str()));
        if self.secure {
            cookie.push_str("Secure;");
        }

        cookie
    }
}

/// Backing storage for a [`CookieJar`]
pub trait CookieStore: Send + Sync {
    fn load(&self, name: &str) -> Result<Option<StoredCookie>, AuthError>;

    fn save(&self, cookie: StoredCookie) -> Result<(), AuthError>;

    fn remove(&self, name: &str) -> Result<(), AuthError>;

    fn all(&self) -> Result<Vec<StoredCookie>, AuthError>;
}

/// Store that lives only as long as the process
#[derive(Debug, Default)]
pub struct MemoryCookieStore {
    cookies: Mutex<BTreeMap<String, StoredCookie>>,
}

impl MemoryCookieStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CookieStore for MemoryCookieStore {
    fn load(&self, name: &str) -> Result<Option<StoredCookie>, AuthError> {
        let cookies = self.cookies.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(cookies.get(name).cloned())
    }

    fn save(&self, cookie: StoredCookie) -> Result<(), AuthError> {
        let mut cookies = self.cookies.lock().unwrap_or_else(PoisonError::into_inner);
        cookies.insert(cookie.name.clone(), cookie);
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<(), AuthError> {
        let mut cookies = self.cookies.lock().unwrap_or_else(PoisonError::into_inner);
        cookies.remove(name);
        Ok(())
    }

    fn all(&self) -> Result<Vec<StoredCookie>, AuthError> {
        let cookies = self.cookies.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(cookies.values().cloned().collect())
    }
}

/// Store persisted as a JSON file, rewritten on every mutation.
///
/// Two stores opened on the same path observe each other's writes only after
/// reopening, the same way a reloaded page re-reads `document.cookie`.
#[derive(Debug)]
pub struct FileCookieStore {
    path: PathBuf,
    cookies: Mutex<BTreeMap<String, StoredCookie>>,
}

impl FileCookieStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuthError> {
        let path = path.as_ref().to_path_buf();

        let cookies = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                BTreeMap::new()
            } else {
                let list: Vec<StoredCookie> = serde_json::from_str(&raw)?;
                list.into_iter().map(|c| (c.name.clone(), c)).collect()
            }
        } else {
            BTreeMap::new()
        };

        debug!("Opened cookie file {} ({} cookies)", path.display(), cookies.len());

        Ok(Self {
            path,
            cookies: Mutex::new(cookies),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes a sibling temp file and renames it over the cookie file, so a
    /// reader only ever sees the old or the new contents.
    fn flush(&self, cookies: &BTreeMap<String, StoredCookie>) -> Result<(), AuthError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let list: Vec<&StoredCookie> = cookies.values().collect();
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&serde_json::to_vec_pretty(&list)?)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl CookieStore for FileCookieStore {
    fn load(&self, name: &str) -> Result<Option<StoredCookie>, AuthError> {
        let cookies = self.cookies.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(cookies.get(name).cloned())
    }

    fn save(&self, cookie: StoredCookie) -> Result<(), AuthError> {
        let mut cookies = self.cookies.lock().unwrap_or_else(PoisonError::into_inner);
        cookies.insert(cookie.name.clone(), cookie);
        self.flush(&cookies)
    }

    fn remove(&self, name: &str) -> Result<(), AuthError> {
        let mut cookies = self.cookies.lock().unwrap_or_else(PoisonError::into_inner);
        if cookies.remove(name).is_some() {
            self.flush(&cookies)?;
        }
        Ok(())
    }

    fn all(&self) -> Result<Vec<StoredCookie>, AuthError> {
        let cookies = self.cookies.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(cookies.values().cloned().collect())
    }
}

/// Read/write view over a [`CookieStore`] with expiry and encoding applied
#[derive(Clone)]
pub struct CookieJar {
    store: Arc<dyn CookieStore>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for CookieJar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieJar").finish_non_exhaustive()
    }
}

impl CookieJar {
    pub fn new(store: Arc<dyn CookieStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        Self::new(Arc::new(MemoryCookieStore::new()), clock)
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    /// Writes a cookie. An expiry that already passed deletes it instead.
    pub fn set(&self, name: &str, value: &str, options: &CookieOptions) -> Result<(), AuthError> {
        let encoded_name = urlencoding::encode(name).into_owned();

        if matches!(options.expires_at, Some(at) if at <= self.now_millis()) {
            return self.store.remove(&encoded_name);
        }

        self.store.save(StoredCookie {
            name: encoded_name,
            value: urlencoding::encode(value).into_owned(),
            expires_at: options.expires_at,
            path: options.path.clone(),
            same_site: options.same_site,
            secure: options.secure,
        })
    }

    /// Returns the decoded value of a live cookie
    pub fn get(&self, name: &str) -> Option<String> {
        let encoded_name = urlencoding::encode(name);

        let cookie = match self.store.load(&encoded_name) {
            Ok(Some(cookie)) => cookie,
            Ok(None) => return None,
            Err(e) => {
                warn!("Failed to read cookie {}: {}", name, e);
                return None;
            }
        };

        if cookie.is_expired(self.now_millis()) {
            if let Err(e) = self.store.remove(&cookie.name) {
                warn!("Failed to purge expired cookie {}: {}", name, e);
            }
            return None;
        }

        Some(decode(&cookie.value))
    }

    /// Removes a cookie. Removing a missing cookie is not an error.
    pub fn delete(&self, name: &str) -> Result<(), AuthError> {
        self.store.remove(&urlencoding::encode(name))
    }

    /// Writes every `name=value` pair of a `"a=1; b=2"` cookie string as its
    /// own cookie and returns how many were written
    pub fn inject_pairs(&self, pairs: &str, options: &CookieOptions) -> Result<usize, AuthError> {
        let mut written = 0;

        for pair in pairs.split(';') {
            let Some((name, value)) = pair.trim().split_once('=') else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            self.set(&decode(name), &decode(value.trim()), options)?;
            written += 1;
        }

        Ok(written)
    }

    /// Live cookies as stored (encoded), for diagnostics
    pub fn entries(&self) -> Vec<StoredCookie> {
        let now = self.now_millis();
        match self.store.all() {
            Ok(all) => all.into_iter().filter(|c| !c.is_expired(now)).collect(),
            Err(e) => {
                warn!("Failed to list cookies: {}", e);
                Vec::new()
            }
        }
    }
}

fn decode(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|v| v.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}
