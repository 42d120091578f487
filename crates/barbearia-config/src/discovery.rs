//! Config file discovery and layered merging.
//!
//! Resolution order (later overrides earlier):
//! 1. `~/.config/barbearia/config.toml` (user config)
//! 2. `./barbearia.toml` (project-local)
//! 3. CLI arguments (handled externally)

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::{BarbeariaConfig, ConfigError, Result};

/// Default config filename for project-local config.
const PROJECT_CONFIG_FILE: &str = "barbearia.toml";

/// Default config filename within the user config directory.
const USER_CONFIG_FILE: &str = "config.toml";

/// Default token filename within the user config directory.
const TOKEN_FILE: &str = "tokens.json";

/// Written above the defaults by [`init_config_file`].
const INIT_HEADER: &str = "# Barbearia client configuration.\n\
# Layered under ./barbearia.toml and the --server flag.\n\n";

/// Application name for config directory resolution.
const APP_NAME: &str = "barbearia";

/// Environment variable to override the config directory.
const CONFIG_DIR_ENV: &str = "BARBEARIA_CONFIG_DIR";

/// Tracks where each config layer was loaded from.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub path: PathBuf,
    /// Whether the file was found and loaded.
    pub loaded: bool,
}

/// Result of config discovery and loading.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The merged configuration.
    pub config: BarbeariaConfig,
    /// Sources that were checked, lowest precedence first.
    pub sources: Vec<ConfigSource>,
    /// Warnings generated during loading.
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Paths of sources that were actually loaded.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter(|s| s.loaded)
            .map(|s| s.path.as_path())
            .collect()
    }
}

/// Load configuration by discovering and merging all config layers.
///
/// Never fails: unreadable layers are skipped and reported in `warnings`.
pub fn load_config(project_dir: Option<&Path>) -> LoadedConfig {
    load_config_with_options(project_dir, None)
}

/// Load configuration with explicit control over the user config directory.
///
/// `config_dir` overrides both `BARBEARIA_CONFIG_DIR` and the platform default.
pub fn load_config_with_options(
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
) -> LoadedConfig {
    let mut config = BarbeariaConfig::new();
    let mut sources = Vec::new();
    let mut warnings = Vec::new();

    let user_config = match config_dir {
        Some(dir) => Some(dir.join(USER_CONFIG_FILE)),
        None => user_config_path(),
    };
    if let Some(path) = user_config {
        sources.push(load_layer(&mut config, &path, &mut warnings));
    }

    let project_path = project_dir
        .map(|d| d.join(PROJECT_CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));
    sources.push(load_layer(&mut config, &project_path, &mut warnings));

    check_routes(&config, &mut warnings);

    LoadedConfig {
        config,
        sources,
        warnings,
    }
}

/// Write a config file holding every default, for the user to edit.
///
/// Returns `Ok(false)` and leaves the file alone if it already exists.
pub fn init_config_file(path: &Path) -> Result<bool> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteFile {
            path: parent.display().to_string(),
            source: e,
        })?;
    }

    let mut file = match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
    {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => {
            return Err(ConfigError::WriteFile {
                path: path.display().to_string(),
                source: e,
            });
        }
    };

    let contents = format!("{}{}", INIT_HEADER, BarbeariaConfig::with_defaults().to_toml()?);
    file.write_all(contents.as_bytes())
        .map_err(|e| ConfigError::WriteFile {
            path: path.display().to_string(),
            source: e,
        })?;

    Ok(true)
}

/// Path of the user config file.
pub fn user_config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join(USER_CONFIG_FILE))
}

/// User config directory; also holds the token file and logs.
///
/// Checks `BARBEARIA_CONFIG_DIR` first, then falls back to the platform
/// default (`~/.config/barbearia` on Linux).
pub fn config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Token file used when `[session] token_file` is not set.
pub fn default_token_file() -> Option<PathBuf> {
    config_dir().map(|d| d.join(TOKEN_FILE))
}

/// Try to load a config file and merge it into the existing config.
///
/// A missing file is skipped; an unreadable one becomes a warning.
fn load_layer(config: &mut BarbeariaConfig, path: &Path, warnings: &mut Vec<String>) -> ConfigSource {
    if !path.is_file() {
        return ConfigSource {
            path: path.to_path_buf(),
            loaded: false,
        };
    }

    match read_layer(path) {
        Ok(layer) => {
            config.merge(layer);
            ConfigSource {
                path: path.to_path_buf(),
                loaded: true,
            }
        }
        Err(e) => {
            warnings.push(format!("Failed to load {}: {}", path.display(), e));
            ConfigSource {
                path: path.to_path_buf(),
                loaded: false,
            }
        }
    }
}

fn read_layer(path: &Path) -> Result<BarbeariaConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    BarbeariaConfig::from_toml(&contents)
}

/// Warn about route tables that would loop unauthenticated users.
fn check_routes(config: &BarbeariaConfig, warnings: &mut Vec<String>) {
    let Some(routes) = &config.routes else {
        return;
    };

    if !routes.public.iter().any(|r| r == &routes.login) {
        warnings.push(format!(
            "[routes] login route '{}' is not listed in public routes; \
             unauthenticated users would be redirected to it forever.",
            routes.login
        ));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
