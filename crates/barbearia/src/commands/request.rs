//! Request command - sends an arbitrary API call through the session layer.

use anyhow::{Context as _, Result};
use clap::Args;
use console::Style;
use reqwest::Method;
use serde::Serialize;

use barbearia_session::ApiRequest;

use super::Context;

/// Arguments for the request command.
#[derive(Args, Debug)]
pub struct RequestArgs {
    /// HTTP method (GET, POST, PUT, PATCH, DELETE)
    pub method: String,

    /// Path relative to the API base URL (e.g. services)
    pub path: String,

    /// JSON request body
    #[arg(long)]
    pub body: Option<String>,

    /// Query parameter as key=value (repeatable)
    #[arg(short, long = "query", value_name = "KEY=VALUE")]
    pub query: Vec<String>,
}

/// Response output for JSON mode.
#[derive(Debug, Serialize)]
struct RequestOutput {
    status: u16,
    body: serde_json::Value,
}

/// Run the request command.
pub async fn run(args: RequestArgs, ctx: &Context) -> Result<()> {
    let request = build_request(&args)?;

    let client = ctx.session_client()?;
    let response = client.dispatch(request).await?;

    let body = serde_json::from_slice::<serde_json::Value>(response.body())
        .unwrap_or_else(|_| serde_json::Value::String(response.text()));

    if ctx.json_output {
        let output = RequestOutput {
            status: response.status(),
            body,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        let style = if response.is_success() {
            Style::new().green()
        } else {
            Style::new().red()
        };
        eprintln!("{}", style.apply_to(format!("HTTP {}", response.status())));
        match &body {
            serde_json::Value::String(text) => println!("{}", text),
            other => println!("{}", serde_json::to_string_pretty(other)?),
        }
    }

    if !response.is_success() {
        anyhow::bail!("Request failed with HTTP {}", response.status());
    }
    Ok(())
}

fn build_request(args: &RequestArgs) -> Result<ApiRequest> {
    let method = parse_method(&args.method)?;
    let mut request = ApiRequest::new(method, args.path.clone());

    if let Some(body) = &args.body {
        let value: serde_json::Value =
            serde_json::from_str(body).context("--body is not valid JSON")?;
        request = request.with_json(&value)?;
    }

    for pair in &args.query {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("Query parameter '{}' must be KEY=VALUE", pair))?;
        request = request.with_query(key, value);
    }

    Ok(request)
}

fn parse_method(s: &str) -> Result<Method> {
    match s.to_uppercase().as_str() {
        "GET" => Ok(Method::GET),
        "POST" => Ok(Method::POST),
        "PUT" => Ok(Method::PUT),
        "PATCH" => Ok(Method::PATCH),
        "DELETE" => Ok(Method::DELETE),
        other => Err(anyhow::anyhow!(
            "Unknown method '{}'. Valid: GET, POST, PUT, PATCH, DELETE",
            other
        )),
    }
}
