//! Config command - configuration management.

use anyhow::Result;
use clap::{Args, Subcommand};

use barbearia_config::BarbeariaConfig;

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration and where it was loaded from
    Show,

    /// Show the user configuration file path
    Path,

    /// Initialize a config file with defaults
    Init {
        /// Create project-local config (./barbearia.toml) instead of user config
        #[arg(long)]
        local: bool,
    },
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Path => cmd_path(),
        ConfigCommand::Init { local } => cmd_init(local),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let effective = BarbeariaConfig {
        api: Some(ctx.config.api()),
        session: Some(ctx.config.session()),
        routes: Some(ctx.config.routes()),
    };

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&effective)?);
        return Ok(());
    }

    let loaded = barbearia_config::load_config(None);
    let sources = loaded.loaded_from();
    if sources.is_empty() {
        println!("# No config files loaded (using defaults)");
    } else {
        for source in &sources {
            println!("# Loaded: {}", source.display());
        }
    }
    for warning in &loaded.warnings {
        println!("# Warning: {}", warning);
    }
    println!();
    print!("{}", effective.to_toml()?);
    Ok(())
}

fn cmd_path() -> Result<()> {
    match barbearia_config::user_config_path() {
        Some(path) => println!("{}", path.display()),
        None => anyhow::bail!("Could not determine config directory"),
    }
    Ok(())
}

fn cmd_init(local: bool) -> Result<()> {
    let path = if local {
        std::path::PathBuf::from("barbearia.toml")
    } else {
        barbearia_config::user_config_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
    };

    if barbearia_config::init_config_file(&path)? {
        println!("Created {}", path.display());
    } else {
        println!("Config file already exists: {}", path.display());
    }
    Ok(())
}
