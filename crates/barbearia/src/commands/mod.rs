//! CLI command handlers.

pub mod auth;
pub mod config;
pub mod guard;
pub mod request;
pub mod status;

use std::sync::Arc;

use anyhow::Result;

use barbearia_config::{BarbeariaConfig, StorageKind};
use barbearia_session::{FileStorage, GuardConfig, SessionClient};

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Merged configuration, with CLI overrides applied.
    pub config: BarbeariaConfig,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Build a session client from the configuration.
    pub fn session_client(&self) -> Result<SessionClient> {
        let api = self.config.api();
        let routes = self.config.routes();
        let session = self.config.session();

        let builder = SessionClient::builder()
            .base_url(api.base_url.clone())
            .timeout(api.timeout())
            .user_agent(format!("barbearia/{}", env!("CARGO_PKG_VERSION")))
            .login_path(api.login_path)
            .refresh_path(api.refresh_path)
            .guard_config(GuardConfig {
                public_routes: routes.public,
                login_route: routes.login,
                landing_route: routes.landing,
            });

        let builder = match session.storage {
            StorageKind::File => {
                let path = session
                    .token_file
                    .or_else(barbearia_config::default_token_file)
                    .ok_or_else(|| anyhow::anyhow!("Could not determine token file location"))?;
                tracing::debug!(path = %path.display(), "Using file token storage");
                builder.storage(Arc::new(FileStorage::open(path)))
            }
            StorageKind::Memory => builder,
            StorageKind::None => builder.without_storage(),
        };

        Ok(builder.build()?)
    }
}

/// Format a Unix timestamp for display.
pub fn format_timestamp(epoch_seconds: i64) -> String {
    chrono::DateTime::from_timestamp(epoch_seconds, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| epoch_seconds.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "1970-01-01 00:00:00 UTC");
        assert_eq!(format_timestamp(1_700_000_000), "2023-11-14 22:13:20 UTC");
    }

    #[test]
    fn test_session_client_honours_storage_kind() {
        let mut config = BarbeariaConfig::from_toml("[session]\nstorage = \"none\"\n").unwrap();
        config.set_base_url("http://localhost:9999/api");
        let ctx = Context {
            config,
            json_output: false,
            verbose: false,
        };

        let client = ctx.session_client().unwrap();
        assert!(!client.store().is_available());
    }

    #[test]
    fn test_session_client_uses_configured_token_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("tokens.json");
        let config = BarbeariaConfig::from_toml(&format!(
            "[session]\nstorage = \"file\"\ntoken_file = {:?}\n",
            path.display().to_string()
        ))
        .unwrap();
        let ctx = Context {
            config,
            json_output: false,
            verbose: false,
        };

        ctx.session_client().unwrap().store().set_access("A1");

        let reopened = ctx.session_client().unwrap();
        assert_eq!(reopened.store().get_access().as_deref(), Some("A1"));
    }
}
