// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Portal-Client command line
//!
//! Issues authenticated calls against the developer portal API using the
//! same token lifecycle as the dashboard.

use anyhow::Context;
use clap::{Parser, Subcommand};
use portal_client::{ClientConfig, PortalClient, QueryParams, RequestOptions};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "portal-client", about = "Authenticated developer portal API client")]
struct Cli {
    /// Emit JSON logs instead of human-readable text
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// GET a JSON resource
    Get {
        path: String,
        /// Query parameters as key=value
        params: Vec<String>,
    },
    /// DELETE a resource
    Delete {
        path: String,
        params: Vec<String>,
    },
    /// POST a JSON body
    Post {
        path: String,
        /// Request body as JSON text
        #[arg(long)]
        body: String,
        params: Vec<String>,
    },
    /// Download a binary payload
    Binary {
        path: String,
        /// File to write the payload to
        #[arg(short, long)]
        output: PathBuf,
        params: Vec<String>,
    },
    /// Obtain a token and print its metadata
    Token,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<portal_client::ApiError>() {
                Some(api_err) => {
                    let body = serde_json::to_string_pretty(&api_err.to_body())
                        .unwrap_or_else(|_| api_err.to_string());
                    eprintln!("{}", body);
                }
                None => eprintln!("error: {:#}", err),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> anyhow::Result<()> {
    let config = ClientConfig::from_env().context("Failed to load configuration")?;
    let client = PortalClient::new(&config)?;

    match command {
        Command::Get { path, params } => {
            let value: serde_json::Value = client.get(&path, options(&params)?).await?;
            print_json(&value)?;
        }
        Command::Delete { path, params } => {
            let value: serde_json::Value = client.delete(&path, options(&params)?).await?;
            print_json(&value)?;
        }
        Command::Post { path, body, params } => {
            let body: serde_json::Value =
                serde_json::from_str(&body).context("--body is not valid JSON")?;
            let value: serde_json::Value = client.post(&path, &body, options(&params)?).await?;
            print_json(&value)?;
        }
        Command::Binary {
            path,
            output,
            params,
        } => {
            let payload = client.get_binary(&path, options(&params)?).await?;
            tokio::fs::write(&output, &payload.bytes)
                .await
                .with_context(|| format!("Failed to write {}", output.display()))?;
            tracing::info!(
                path = %output.display(),
                bytes = payload.bytes.len(),
                content_type = payload.content_type.as_deref().unwrap_or("<unknown>"),
                "Binary payload saved"
            );
        }
        Command::Token => {
            let token = client.token_manager().ensure_token().await.map_err(|e| {
                portal_client::ApiError::AuthenticationRequired(e.to_string())
            })?;
            print_json(&serde_json::json!({
                "tokenType": token.token_type(),
                "expiresAt": token.expires_at().map(|t| t.to_rfc3339()),
                "scope": token.scope(),
                "profile": token.profile(),
            }))?;
        }
    }

    Ok(())
}

/// Parse `key=value` arguments into request options.
fn options(params: &[String]) -> anyhow::Result<RequestOptions> {
    let mut query = QueryParams::new();
    for raw in params {
        let (key, value) = raw
            .split_once('=')
            .with_context(|| format!("expected key=value, got {:?}", raw))?;
        query = query.param(key, value);
    }
    Ok(RequestOptions::new().params(query))
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Initialize logging on stderr, JSON or compact text.
fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("portal_client=debug,info"));

    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(false)
                    .with_current_span(true)
                    .flatten_event(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}
