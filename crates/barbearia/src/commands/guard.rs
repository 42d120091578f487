//! Guard command - evaluates the navigation guards for a destination.

use anyhow::Result;
use clap::Args;
use console::Style;
use serde::Serialize;

use barbearia_session::GuardDecision;

use super::Context;

/// Arguments for the guard command.
#[derive(Args, Debug)]
pub struct GuardArgs {
    /// Destination URL (e.g. /usuarios)
    pub url: String,

    /// Role allowed to open the destination (repeatable)
    #[arg(short, long = "role", value_name = "ROLE")]
    pub roles: Vec<String>,
}

/// Decision output for JSON mode.
#[derive(Debug, Serialize)]
struct GuardOutput {
    url: String,
    allowed: bool,
    redirect_to: Option<String>,
    notice: Option<&'static str>,
}

/// Run the guard command.
pub async fn run(args: GuardArgs, ctx: &Context) -> Result<()> {
    let client = ctx.session_client()?;
    let roles: Vec<&str> = args.roles.iter().map(String::as_str).collect();

    let decision = client.guards().evaluate(&args.url, &roles).await;

    let output = match &decision {
        GuardDecision::Allow => GuardOutput {
            url: args.url.clone(),
            allowed: true,
            redirect_to: None,
            notice: None,
        },
        GuardDecision::Redirect { to, notice } => GuardOutput {
            url: args.url.clone(),
            allowed: false,
            redirect_to: Some(to.clone()),
            notice: notice.map(|n| n.message()),
        },
    };

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    match (&output.redirect_to, output.notice) {
        (None, _) => println!("{} {}", Style::new().green().apply_to("allow"), output.url),
        (Some(to), notice) => {
            println!(
                "{} {} -> {}",
                Style::new().yellow().apply_to("redirect"),
                output.url,
                to
            );
            if let Some(message) = notice {
                println!("  {}", Style::new().dim().apply_to(message));
            }
        }
    }
    Ok(())
}
