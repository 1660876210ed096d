//! # Completion Gateway
//!
//! Runs prompts through a quota-aware, caching, retrying completion client.
//!
//! ## Usage
//!
//! ```bash
//! # One prompt per line on stdin, one JSON result per line on stdout
//! cat prompts.txt | completion-gateway gateway.yaml
//!
//! # Without a config file, defaults plus environment overrides
//! GATEWAY_API_KEY=sk-... GATEWAY_MODEL=gpt-4o-mini completion-gateway < prompts.txt
//! ```
//!
//! Final statistics are written to stderr as JSON.

use anyhow::Context;
use gateway_client::GatewayClientBuilder;
use gateway_config::{config_from_env, load_config, GatewayConfig};
use gateway_core::{event_channel, CompletionRequest, CompletionResponse, GatewayResult};
use gateway_telemetry::{init_logging, spawn_event_logger};
use serde_json::json;
use std::env;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info};

/// Environment variable naming the config file when no argument is given
const CONFIG_ENV: &str = "GATEWAY_CONFIG";

/// Application entry point
#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!(error = %e, "Application failed");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

/// Main application logic
async fn run() -> anyhow::Result<()> {
    let config = resolve_config().await?;

    init_logging(&config.logging).context("failed to initialize logging")?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        provider = %config.provider.id,
        model = %config.provider.model,
        "Starting completion gateway"
    );

    let (sink, events) = event_channel();
    let event_logger = spawn_event_logger(events);

    let client = GatewayClientBuilder::from_config(&config)?
        .events(sink)
        .build()?;

    let requests = read_prompts().await?;
    info!(prompts = requests.len(), "Prompts read");

    let results = client.call_batch(requests).await;
    write_results(&results).await?;

    let stats = serde_json::to_string(&client.stats())?;
    eprintln!("{stats}");

    // Dropping the client closes the event channel so the logger can finish.
    drop(client);
    let logged = event_logger.await.unwrap_or_default();
    info!(events = logged, "Completion gateway finished");

    Ok(())
}

/// Load the config file named on the command line or in `GATEWAY_CONFIG`
async fn resolve_config() -> anyhow::Result<GatewayConfig> {
    match env::args().nth(1).or_else(|| env::var(CONFIG_ENV).ok()) {
        Some(path) => load_config(&path)
            .await
            .with_context(|| format!("failed to load config from {path}")),
        None => config_from_env().context("invalid configuration from environment"),
    }
}

/// One request per non-blank stdin line
async fn read_prompts() -> anyhow::Result<Vec<CompletionRequest>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut requests = Vec::new();

    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let prompt = line.trim();
        if !prompt.is_empty() {
            requests.push(CompletionRequest::user(prompt));
        }
    }

    Ok(requests)
}

/// One JSON line per result, in input order
async fn write_results(results: &[GatewayResult<CompletionResponse>]) -> anyhow::Result<()> {
    let mut stdout = tokio::io::stdout();

    for (index, result) in results.iter().enumerate() {
        let line = match result {
            Ok(response) => json!({ "index": index, "ok": true, "response": response }),
            Err(e) => json!({ "index": index, "ok": false, "error": e }),
        };
        stdout.write_all(line.to_string().as_bytes()).await?;
        stdout.write_all(b"\n").await?;
    }

    stdout.flush().await?;
    Ok(())
}
