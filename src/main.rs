//! Command-line interface for kafka-loadgen
//!
//! Provisions the topic, runs the selected roles until the duration elapses
//! or Ctrl+C is pressed, then prints the run summary to stdout.

use anyhow::Context;
use clap::Parser;
use kafka_loadgen::{LoadgenOpts, SummaryFormat};
use loadgen_core::RunOrchestrator;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing, defaulting to info when RUST_LOG is unset
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let opts = LoadgenOpts::parse();
    let config = opts.load_config()?;
    let connector = Arc::new(opts.connector());

    let cancel = setup_shutdown_handler();
    let report = RunOrchestrator::new(connector, config)
        .run(&cancel)
        .await
        .context("Load generation failed")?;

    match opts.summary_format {
        SummaryFormat::Text => println!("{}", report.render_text()),
        SummaryFormat::Json => {
            let json = report.to_json().context("Failed to serialize run summary")?;
            println!("{json}");
        }
    }

    Ok(())
}

/// Cancel the run on Ctrl+C. Roles stop, flush and still report.
fn setup_shutdown_handler() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received interrupt signal (Ctrl+C), stopping...");
                trigger.cancel();
            }
            Err(e) => warn!("Failed to install Ctrl+C handler: {e}"),
        }
    });

    cancel
}
