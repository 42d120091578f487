//! Session commands: login, logout and whoami.

use anyhow::Result;
use clap::Args;
use console::{Style, style};
use serde::Serialize;

use super::{Context, format_timestamp};

/// Arguments for the login command.
#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Account e-mail
    #[arg(short, long)]
    pub email: String,

    /// Password (prompted when omitted)
    #[arg(short, long, env = "BARBEARIA_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

/// Login result for JSON output.
#[derive(Debug, Serialize)]
struct LoginOutput {
    authenticated: bool,
    subject: Option<String>,
    roles: Vec<String>,
    expires_at: Option<i64>,
}

/// Sign in with e-mail and password.
pub async fn login(args: LoginArgs, ctx: &Context) -> Result<()> {
    let password = match args.password {
        Some(password) => password,
        None => rpassword::prompt_password("Password: ")?,
    };
    if password.is_empty() {
        anyhow::bail!("Password must not be empty");
    }

    let client = ctx.session_client()?;
    client.auth().login(&args.email, &password).await?;

    let state = client.state();
    let output = LoginOutput {
        authenticated: true,
        subject: state.current_subject(),
        roles: state.current_roles().into_iter().collect(),
        expires_at: state.expires_at(),
    };

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let green = Style::new().green();
    let dim = Style::new().dim();
    println!("{} Signed in as {}", green.apply_to("✓"), style(&args.email).bold());
    if !output.roles.is_empty() {
        println!("  {} {}", dim.apply_to("Roles:"), output.roles.join(", "));
    }
    if let Some(exp) = output.expires_at {
        println!("  {} {}", dim.apply_to("Expires:"), format_timestamp(exp));
    }
    Ok(())
}

/// Sign out. Stored tokens are removed even if the server is unreachable.
pub async fn logout(ctx: &Context) -> Result<()> {
    let client = ctx.session_client()?;
    let had_token = client.state().has_token();

    client.auth().logout().await?;

    if ctx.json_output {
        println!("{}", serde_json::json!({ "logged_out": had_token }));
    } else if had_token {
        println!("Signed out.");
    } else {
        println!("No stored session.");
    }
    Ok(())
}

/// Show the signed-in user's profile, as the server sees it.
pub async fn whoami(ctx: &Context) -> Result<()> {
    let client = ctx.session_client()?;
    if !client.state().has_token() {
        anyhow::bail!("Not signed in. Run 'barbearia login --email <EMAIL>' first.");
    }

    let user = client.profile().get().await?;

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&user)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    println!();
    println!("{}", style(&user.name).bold());
    println!("{}", dim.apply_to("─".repeat(40)));
    println!("  {} {}", dim.apply_to("E-mail:"), user.email);
    println!("  {} {}", dim.apply_to("Role:"), user.role);
    if let Some(phone) = &user.phone {
        println!("  {} {}", dim.apply_to("Phone:"), phone);
    }
    if let Some(pending) = &user.pending_email {
        println!("  {} {} (unconfirmed)", dim.apply_to("Pending e-mail:"), pending);
    }
    if !user.active {
        println!("  {}", Style::new().red().apply_to("Account inactive"));
    }
    if ctx.verbose {
        println!("  {} {}", dim.apply_to("Id:"), user.id);
    }
    println!();
    Ok(())
}
