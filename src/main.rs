//! botchat - replay a scripted chat session
//!
//! Reads a JSON-lines script from the file given as first argument (or stdin),
//! runs it through a client, and prints every outbound wire event followed by
//! the final history as JSON lines on stdout.

use botchat::config::{ClientConfig, ConfigError};
use botchat::replay::{parse_script, replay};
use std::io::Write;
use tokio::io::AsyncReadExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const REPLAY_SERVER_URL: &str = "replay://local";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "botchat=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    // Configuration
    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(ConfigError::MissingServerUrl) => {
            ClientConfig::from_env_with_default(REPLAY_SERVER_URL)?
        }
        Err(e) => return Err(e.into()),
    };

    let script = match std::env::args().nth(1) {
        Some(path) => {
            tracing::info!(%path, "Reading script");
            tokio::fs::read_to_string(&path).await?
        }
        None => {
            let mut input = String::new();
            tokio::io::stdin().read_to_string(&mut input).await?;
            input
        }
    };

    let steps = parse_script(&script)?;
    tracing::info!(steps = steps.len(), endpoint = %config.endpoint(), "Replaying script");

    let report = replay(config, steps).await?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for event in &report.outbound {
        writeln!(out, "{}", serde_json::to_string(event)?)?;
    }
    for message in &report.history {
        writeln!(out, "{}", serde_json::to_string(message.as_ref())?)?;
    }

    tracing::info!(
        state = %report.state,
        messages = report.history.len(),
        "Replay finished"
    );
    Ok(())
}
