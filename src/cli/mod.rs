//! Command-line interface for strix.
//!
//! Provides commands for running the engine against a node and inspecting
//! the resolved configuration.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use crate::config;
use crate::core::Engine;
use crate::deciders::HeaderPrinter;
use crate::rpc::RpcClient;
use crate::sinks::LogSink;
use crate::sources::{HeaderSource, LogSource, TransactionSource};

/// strix - Event-driven automation engine for reactive chain bots
#[derive(Parser, Debug)]
#[command(name = "strix")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch a node and print what happens (dry run: actions are only logged)
    Run {
        /// Node HTTP endpoint (overrides STRIX_RPC_URL and the config file)
        #[arg(long)]
        rpc_url: Option<String>,

        /// Poll new block headers (default when no source is selected)
        #[arg(long)]
        headers: bool,

        /// Poll transactions of new blocks
        #[arg(long)]
        transactions: bool,

        /// Poll logs matching the configured filter
        #[arg(long)]
        logs: bool,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Run {
                rpc_url,
                headers,
                transactions,
                logs,
            } => run(rpc_url, headers, transactions, logs).await,
            Commands::Config => show_config(),
        }
    }
}

async fn run(rpc_url: Option<String>, headers: bool, transactions: bool, logs: bool) -> Result<()> {
    let config = config::config()?;

    let url = rpc_url
        .or_else(|| config.rpc_url.clone())
        .context("No RPC URL: pass --rpc-url, set STRIX_RPC_URL, or set rpc.url in .strix/config.yaml")?;
    let client = Arc::new(
        RpcClient::new(url, config.request_timeout()).context("Failed to build RPC client")?,
    );
    let settings = config.poll_settings();

    let mut engine = Engine::new();
    if headers || !(transactions || logs) {
        engine.add_source(Arc::new(HeaderSource::new(client.clone(), settings.clone())));
    }
    if transactions {
        engine.add_source(Arc::new(TransactionSource::new(client.clone(), settings.clone())));
    }
    if logs {
        engine.add_source(Arc::new(LogSource::new(
            client.clone(),
            config.log_filter.clone(),
            settings,
        )));
    }
    engine.add_decider(Arc::new(HeaderPrinter::new()));
    engine.set_sink(Arc::new(LogSink::new()));

    let cancel = CancellationToken::new();
    engine.start(cancel.clone()).await?;

    eprintln!(
        "Watching {} with {} source(s). Press Ctrl-C to stop.",
        client.url(),
        engine.source_count()
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    eprintln!("Shutting down...");
    cancel.cancel();
    let report = engine.stop().await;

    for failure in &report.stop_failures {
        eprintln!("  {}", failure);
    }
    if report.panicked_workers > 0 {
        eprintln!("  {} worker(s) panicked", report.panicked_workers);
    }

    let stats = engine.stats();
    eprintln!(
        "Shutdown complete: {} events, {} actions, {} decider failures, {} action failures",
        stats.events_dispatched,
        stats.actions_executed,
        stats.decision_failures,
        stats.execution_failures
    );
    Ok(())
}

fn show_config() -> Result<()> {
    let config = config::config()?;
    match &config.config_file {
        Some(path) => println!("# Config file: {}", path.display()),
        None => println!("# Config file: (none, using defaults)"),
    }
    print!("{}", serde_yaml::to_string(config).context("Failed to render config")?);
    Ok(())
}
