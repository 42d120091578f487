//! Configuration for the Barbearia session client.
//!
//! Provides TOML-based configuration with:
//! - API endpoint settings (`[api]`)
//! - Token storage selection (`[session]`)
//! - Route table for the navigation guards (`[routes]`)
//! - Config file layering (user config + project-local overrides)

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    LoadedConfig, config_dir, default_token_file, init_config_file, load_config,
    load_config_with_options, user_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
