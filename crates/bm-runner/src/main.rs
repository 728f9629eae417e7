//! # bm-runner
//!
//! Entry point for the bond trading mesh and its helper processes.
//!
//! `run` loads a JSON configuration, builds the service graph, starts the
//! inbound listeners and the shared-memory consumer, and runs until Ctrl+C.
//! The other subcommands drive or observe a running system.
//!
//! # Usage
//!
//! ```bash
//! bm-runner generate --out-dir data
//! bm-runner run config/trading_system.json --log-level info
//! bm-runner shm-publish --config config/trading_system.json --input data/marketdata.txt
//! bm-runner feed --port 9001 --input data/prices.txt
//! bm-runner print --port 9101 --label executions
//! ```

mod generate;
mod tools;

use std::path::PathBuf;

use anyhow::Result;
use bm_core::config::{AppConfig, load_config};
use bm_services::system::TradingSystem;
use clap::{Parser, Subcommand};
use tracing::{error, info};

/// Bond Trading Mesh Runner.
#[derive(Parser)]
#[command(name = "bm-runner", about = "Bond Trading Mesh Runner")]
struct Cli {
    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Optional log directory for file output.
    #[arg(long, global = true)]
    log_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the trading system until Ctrl+C.
    Run {
        /// Configuration file path (JSON).
        config: PathBuf,
    },
    /// Push every valid order book line of a file onto the shm queue.
    ShmPublish {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        input: PathBuf,
    },
    /// Write every non-empty line of a file to a TCP line server.
    Feed {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long)]
        port: u16,
        #[arg(long)]
        input: PathBuf,
    },
    /// Accept one connection and print its lines until the peer closes.
    Print {
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        #[arg(long)]
        port: u16,
        #[arg(long, default_value = "out")]
        label: String,
    },
    /// Write sample prices, trades, inquiries and market data files.
    Generate {
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
        /// Price and book updates per product.
        #[arg(long, default_value_t = 1000)]
        count: usize,
        /// Config whose product list is used (defaults otherwise).
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run { config } => {
            let config = load_config(&config)?;
            let log_dir = cli.log_dir.as_deref().or(config.module.log_path.as_deref());
            bm_core::logging::init_logging(&cli.log_level, log_dir, &config.module_name());
            run(config).await
        }
        Command::ShmPublish { config, input } => {
            bm_core::logging::init_logging(&cli.log_level, cli.log_dir.as_deref(), "shm_publish");
            let config = load_config(&config)?;
            let pushed = tokio::task::spawn_blocking(move || tools::shm_publish(&config, &input)).await??;
            info!("[shm_publish] pushed {pushed} book(s)");
            Ok(())
        }
        Command::Feed { host, port, input } => {
            bm_core::logging::init_logging(&cli.log_level, cli.log_dir.as_deref(), "feed");
            let sent = tools::feed(&host, port, &input).await?;
            info!("[feed] sent {sent} line(s) to {host}:{port}");
            Ok(())
        }
        Command::Print { host, port, label } => {
            bm_core::logging::init_logging(&cli.log_level, cli.log_dir.as_deref(), "print");
            tools::print(&host, port, &label).await
        }
        Command::Generate { out_dir, count, config } => {
            bm_core::logging::init_logging(&cli.log_level, cli.log_dir.as_deref(), "generate");
            let config = match config {
                Some(path) => load_config(&path)?,
                None => AppConfig::default(),
            };
            generate::write_all(&out_dir, &config, count)
        }
    }
}

async fn run(config: AppConfig) -> Result<()> {
    info!(
        "bm-runner starting: module={}, shm={}, history={}",
        config.module_name(),
        config.shm.name,
        config.history.dir.display()
    );

    let mut system = TradingSystem::new(config)?;
    if let Err(e) = system.start().await {
        error!("[{}] start failed: {e:#}", system.name());
        system.stop();
        return Err(e);
    }
    info!("[{}] running, press Ctrl+C to stop", system.name());

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    system.stop();
    info!("goodbye");
    Ok(())
}
