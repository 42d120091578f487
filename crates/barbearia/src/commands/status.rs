//! Status command - shows the stored session without calling the server.

use anyhow::Result;
use console::{Style, style};
use serde::Serialize;

use barbearia_session::state::now_epoch_seconds;

use super::{Context, format_timestamp};

/// Status output for JSON mode.
#[derive(Debug, Serialize)]
struct StatusOutput {
    authenticated: bool,
    has_token: bool,
    subject: Option<String>,
    roles: Vec<String>,
    expires_at: Option<i64>,
    server_url: String,
}

/// Run the status command.
pub async fn run(ctx: &Context) -> Result<()> {
    let client = ctx.session_client()?;
    let state = client.state();

    let output = StatusOutput {
        authenticated: state.has_session(),
        has_token: state.has_token(),
        subject: state.current_subject(),
        roles: state.current_roles().into_iter().collect(),
        expires_at: state.expires_at(),
        server_url: ctx.config.api().base_url,
    };

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let dim = Style::new().dim();

    println!();
    println!("{}", style("Session Status").bold());
    println!("{}", dim.apply_to("─".repeat(40)));
    println!();

    let status = match (output.authenticated, output.has_token) {
        (true, _) => Style::new().green().apply_to("● signed in"),
        (false, true) => Style::new().yellow().apply_to("● token expired"),
        (false, false) => Style::new().red().apply_to("● signed out"),
    };
    println!("  {} {}", dim.apply_to("Status:"), status);
    println!("  {} {}", dim.apply_to("Server:"), output.server_url);

    if let Some(subject) = &output.subject {
        println!("  {} {}", dim.apply_to("Subject:"), subject);
    }
    if !output.roles.is_empty() {
        println!("  {} {}", dim.apply_to("Roles:"), output.roles.join(", "));
    }
    if let Some(exp) = output.expires_at {
        let remaining = exp - now_epoch_seconds();
        let suffix = if remaining > 0 {
            format!("in {}m", remaining / 60)
        } else {
            "expired".to_string()
        };
        println!(
            "  {} {} ({})",
            dim.apply_to("Expires:"),
            format_timestamp(exp),
            suffix
        );
    }

    if !output.has_token {
        println!();
        println!(
            "  {}",
            dim.apply_to("Sign in with: barbearia login --email <EMAIL>")
        );
    } else if !output.authenticated {
        println!();
        println!(
            "  {}",
            dim.apply_to("The next request will try to refresh the session.")
        );
    }
    println!();

    Ok(())
}
