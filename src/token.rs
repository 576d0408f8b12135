//! ==============================================================================
//! token.rs - spotify access token acquisition (implicit grant)
//! ==============================================================================
//!
//! purpose:
//! resolves the bearer token used for every spotify call.
//!
//! 1. a token saved under TOKEN_KEY wins.
//! 2. if the browser has landed on the redirect uri with
//!    `#access_token=...`, the token is saved and the browser is sent
//!    back to the app root.
//! 3. otherwise the browser is sent to the spotify authorize endpoint.
//!
//! any navigation means "no credential this tick". the fragment is only
//! parsed while the location sits on the callback path, so a grant is
//! consumed exactly once.
//!
//! relationships:
//! - used by: sync.rs (acquire on every tick, forget on 401)
//! - uses: TokenStorage (file or memory), PageNavigator (BrowserRelay)
//! - fed by: server.rs (/callback relays the landed location)
//!
//! ==============================================================================

use crate::domain::Credential;
use crate::error::{Result, SyncError};

use reqwest::Url;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, error, info, warn};

/// storage key of the persisted access token
pub const TOKEN_KEY: &str = "spotify_access_token";

// ==============================================================================
// capabilities
// ==============================================================================

/// page-local key/value store (the host's stand-in for browser local storage)
pub trait TokenStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// where the user's browser currently is, and a way to send it elsewhere
pub trait PageNavigator: Send + Sync {
    fn current_location(&self) -> Option<Url>;
    fn navigate(&self, target: &Url);
}

// ==============================================================================
// file storage
// ==============================================================================

/// json object on disk, one string per key
pub struct FileTokenStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileTokenStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| SyncError::Storage(format!("{}: {}", self.path.display(), e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let json = serde_json::to_string_pretty(entries)
            .map_err(|e| SyncError::Storage(e.to_string()))?;
        // write then rename so a crash never leaves half a file behind
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TokenStorage for FileTokenStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.guard();
        Ok(self.read_all()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.guard();
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.guard();
        let mut entries = self.read_all()?;
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}

/// in-process storage, lost on restart
#[derive(Default)]
pub struct MemoryTokenStorage {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryTokenStorage {
    fn entries(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TokenStorage for MemoryTokenStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries().remove(key);
        Ok(())
    }
}

// ==============================================================================
// browser relay
// ==============================================================================

/// tracks the browser location as reported by the dashboard
///
/// `navigate` cannot move a real browser from here, so off-origin targets
/// (the authorize page) are logged and shown as a link on the dashboard.
pub struct BrowserRelay {
    app_root: Url,
    location: RwLock<Option<Url>>,
}

impl BrowserRelay {
    pub fn new(app_root: Url) -> Self {
        Self { app_root, location: RwLock::new(None) }
    }

    pub fn app_root(&self) -> &Url {
        &self.app_root
    }

    /// called by the web server when a page reports `location.href`
    pub fn report(&self, location: Url) {
        debug!("browser reported location {}", location.path());
        *self.location.write().unwrap_or_else(|p| p.into_inner()) = Some(location);
    }

    /// the authorize url the user still has to open, if any
    pub fn pending_authorization(&self) -> Option<Url> {
        self.current_location().filter(|loc| loc.origin() != self.app_root.origin())
    }
}

impl PageNavigator for BrowserRelay {
    fn current_location(&self) -> Option<Url> {
        self.location.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    fn navigate(&self, target: &Url) {
        if target.origin() != self.app_root.origin() {
            warn!("Authorization required - open this url in a browser: {}", target);
        } else {
            info!("Navigating to {}", target);
        }
        *self.location.write().unwrap_or_else(|p| p.into_inner()) = Some(target.clone());
    }
}

// ==============================================================================
// token store
// ==============================================================================

#[derive(Debug, Clone)]
pub struct AuthorizeParams {
    pub client_id: String,
    pub redirect_uri: Url,
    pub scopes: Vec<String>,
    pub accounts_url: String,
}

impl AuthorizeParams {
    /// `{accounts}/authorize?client_id=..&response_type=token&redirect_uri=..&scope=..`
    pub fn authorize_url(&self) -> Result<Url> {
        let base = format!("{}/authorize", self.accounts_url.trim_end_matches('/'));
        let mut url = Url::parse(&base)
            .map_err(|e| SyncError::InvalidUrl(format!("{}: {}", base, e)))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("response_type", "token")
            .append_pair("redirect_uri", self.redirect_uri.as_str())
            .append_pair("scope", &self.scopes.join(" "));
        Ok(url)
    }

    /// the app root on the redirect uri's origin
    pub fn app_root(&self) -> Url {
        let mut root = self.redirect_uri.clone();
        root.set_path("/");
        root.set_query(None);
        root.set_fragment(None);
        root
    }
}

pub struct TokenStore {
    storage: Arc<dyn TokenStorage>,
    navigator: Arc<dyn PageNavigator>,
    params: AuthorizeParams,
}

impl TokenStore {
    pub fn new(
        storage: Arc<dyn TokenStorage>,
        navigator: Arc<dyn PageNavigator>,
        params: AuthorizeParams,
    ) -> Self {
        Self { storage, navigator, params }
    }

    /// resolve the credential for this tick; `None` means "skip this tick"
    pub fn acquire(&self) -> Option<Credential> {
        match self.storage.get(TOKEN_KEY) {
            Ok(Some(token)) if !token.trim().is_empty() => return Some(Credential::new(token)),
            Ok(_) => {}
            Err(e) => {
                error!("Token storage unreadable: {}", e);
                return None;
            }
        }

        if let Some(location) = self.navigator.current_location() {
            if self.is_callback(&location) {
                self.complete_callback(&location);
                return None;
            }
        }

        self.begin_authorization();
        None
    }

    /// drop the stored token so the next tick re-authorizes
    pub fn forget(&self) {
        match self.storage.remove(TOKEN_KEY) {
            Ok(()) => info!("Stored spotify token discarded"),
            Err(e) => error!("Failed to discard stored token: {}", e),
        }
    }

    pub fn has_token(&self) -> bool {
        matches!(self.storage.get(TOKEN_KEY), Ok(Some(t)) if !t.trim().is_empty())
    }

    fn is_callback(&self, location: &Url) -> bool {
        let redirect = &self.params.redirect_uri;
        location.origin() == redirect.origin() && location.path() == redirect.path()
    }

    fn complete_callback(&self, location: &Url) {
        let fragment = location.fragment().unwrap_or("");
        match fragment_param(fragment, "access_token") {
            Some(token) if !token.is_empty() => match self.storage.set(TOKEN_KEY, &token) {
                Ok(()) => info!("✓ Spotify authorization stored"),
                Err(e) => error!("Failed to persist spotify token: {}", e),
            },
            _ => {
                let reason = fragment_param(fragment, "error").unwrap_or_else(|| "no token".into());
                warn!("Spotify callback without access token ({})", reason);
            }
        }
        self.navigator.navigate(&self.params.app_root());
    }

    fn begin_authorization(&self) {
        if self.params.client_id.is_empty() {
            warn!("No spotify client id configured - cannot authorize");
            return;
        }
        let url = match self.params.authorize_url() {
            Ok(url) => url,
            Err(e) => {
                error!("{}", e);
                return;
            }
        };
        if self.navigator.current_location().as_ref() == Some(&url) {
            debug!("Still waiting for the user to authorize");
            return;
        }
        self.navigator.navigate(&url);
    }
}

/// value of `key` in an `a=1&b=2` url fragment, percent-decoded
pub fn fragment_param(fragment: &str, key: &str) -> Option<String> {
    let parsed = Url::parse(&format!("http://fragment.invalid/?{}", fragment)).ok()?;
    let value = parsed.query_pairs().find(|(k, _)| k == key)?.1.into_owned();
    Some(value)
}
