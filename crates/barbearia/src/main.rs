//! Barbearia - back-office API client
//!
//! Main entry point for the Barbearia CLI.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{auth, config, guard, request, status};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Barbearia - command-line client for the back-office API
#[derive(Parser)]
#[command(name = "barbearia")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// API base URL (default: from config, else http://localhost:8080/api)
    #[arg(long, global = true, env = "BARBEARIA_SERVER_URL")]
    pub server: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in and store the session tokens
    Login(auth::LoginArgs),

    /// Sign out and clear stored tokens
    Logout,

    /// Show the stored session (no network)
    Status,

    /// Fetch the signed-in user's profile
    Whoami,

    /// Send an authenticated request to the API
    Request(request::RequestArgs),

    /// Evaluate the navigation guards for a URL
    Guard(guard::GuardArgs),

    /// Configuration management
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Console (stderr, so --json output stays clean) + rotating JSON file
    let filter = if cli.verbose {
        "barbearia=debug,barbearia_session=debug,barbearia_config=debug,info"
    } else {
        "barbearia=info,barbearia_session=warn,warn"
    };

    let log_dir = barbearia_config::config_dir()
        .map(|d| d.join("logs"))
        .unwrap_or_else(|| std::path::PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "barbearia.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "barbearia=trace,barbearia_session=trace,barbearia_config=trace,info",
                )),
        )
        .init();

    let loaded = barbearia_config::load_config(None);
    for warning in &loaded.warnings {
        tracing::warn!("{}", warning);
    }

    let mut config = loaded.config;
    if let Some(server) = cli.server {
        config.set_base_url(server);
    }

    let ctx = commands::Context {
        config,
        json_output: cli.json,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Login(args) => auth::login(args, &ctx).await,
        Commands::Logout => auth::logout(&ctx).await,
        Commands::Status => status::run(&ctx).await,
        Commands::Whoami => auth::whoami(&ctx).await,
        Commands::Request(args) => request::run(args, &ctx).await,
        Commands::Guard(args) => guard::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}
