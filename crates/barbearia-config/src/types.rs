//! Configuration types mapping to the TOML schema.
//!
//! ```toml
//! [api]        # backend location and auth endpoints
//! [session]    # where tokens are kept
//! [routes]     # guard route table
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g. project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BarbeariaConfig {
    /// API settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api: Option<ApiConfig>,

    /// Token storage settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionConfig>,

    /// Route table used by the guards.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routes: Option<RoutesConfig>,
}

impl BarbeariaConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Config with every section filled with defaults, as written by
    /// `config init`.
    pub fn with_defaults() -> Self {
        Self {
            api: Some(ApiConfig::default()),
            session: Some(SessionConfig::default()),
            routes: Some(RoutesConfig::default()),
        }
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> crate::Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> crate::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Sections replace whole; fields inside a section are not merged.
    pub fn merge(&mut self, other: BarbeariaConfig) {
        if other.api.is_some() {
            self.api = other.api;
        }

        if other.session.is_some() {
            self.session = other.session;
        }

        if other.routes.is_some() {
            self.routes = other.routes;
        }
    }

    /// Effective API settings.
    pub fn api(&self) -> ApiConfig {
        self.api.clone().unwrap_or_default()
    }

    /// Effective session settings.
    pub fn session(&self) -> SessionConfig {
        self.session.clone().unwrap_or_default()
    }

    /// Effective route table.
    pub fn routes(&self) -> RoutesConfig {
        self.routes.clone().unwrap_or_default()
    }

    /// Override the API base URL (CLI `--server`).
    pub fn set_base_url(&mut self, base_url: impl Into<String>) {
        let mut api = self.api();
        api.base_url = base_url.into();
        self.api = Some(api);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// API
// ─────────────────────────────────────────────────────────────────────────────

/// Backend API settings.
///
/// ```toml
/// [api]
/// base_url = "http://localhost:8080/api"
/// timeout_secs = 30
/// login_path = "auth/login"
/// refresh_path = "auth/refresh"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Root every endpoint path is resolved against.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Login endpoint, relative to `base_url`.
    pub login_path: String,
    /// Refresh endpoint, relative to `base_url`.
    pub refresh_path: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            timeout_secs: 30,
            login_path: "auth/login".to_string(),
            refresh_path: "auth/refresh".to_string(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// Where tokens are persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// JSON file on disk; survives between runs.
    #[default]
    File,
    /// Process memory only.
    Memory,
    /// No storage; every token operation is a no-op.
    None,
}

/// Token storage settings.
///
/// ```toml
/// [session]
/// storage = "file"
/// token_file = "/home/ana/.config/barbearia/tokens.json"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub storage: StorageKind,
    /// Token file for `storage = "file"`. Defaults to `tokens.json` in the
    /// user config directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_file: Option<PathBuf>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Routes
// ─────────────────────────────────────────────────────────────────────────────

/// Route table for the navigation guards.
///
/// ```toml
/// [routes]
/// public = ["/login", "/not-found", "/recuperar-senha", "/setup-conta"]
/// login = "/login"
/// landing = "/dashboard"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutesConfig {
    /// Paths reachable without a session.
    pub public: Vec<String>,
    /// Unauthenticated entry point.
    pub login: String,
    /// Where signed-in users land, and where role denials go.
    pub landing: String,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            public: ["/login", "/not-found", "/recuperar-senha", "/setup-conta"]
                .into_iter()
                .map(String::from)
                .collect(),
            login: "/login".to_string(),
            landing: "/dashboard".to_string(),
        }
    }
}
