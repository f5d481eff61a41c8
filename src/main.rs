//! Script-callback HTTP relay.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────┐
//!                        │                     RELAY                        │
//!                        │                                                  │
//!   GET /proxy.js?url=…  │  ┌──────────┐   ┌───────────┐   ┌────────────┐  │
//!   ─────────────────────┼─▶│  http    │──▶│ validator │──▶│   engine   │──┼──▶ Upstream
//!                        │  │  params  │   │ + access  │   │ + headers  │  │     Server
//!                        │  └──────────┘   └───────────┘   └─────┬──────┘  │
//!                        │                                       │ events  │
//!   text/javascript      │  ┌──────────┐   ┌───────────┐         ▼         │
//!   ◀────────────────────┼──│ response │◀──│  writer   │◀── encoder        │
//!   (streamed)           │  │  stream  │   │  (flush)  │                   │
//!                        │  └──────────┘   └───────────┘                   │
//!                        │                                                  │
//!                        │   config · observability · lifecycle             │
//!                        └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use ajax_relay::config::{self, RelayConfig};
use ajax_relay::lifecycle::{self, Shutdown};
use ajax_relay::observability::logging;

#[derive(Parser)]
#[command(name = "ajax-relay")]
#[command(about = "Relays HTTP requests for browser scripts as streamed callback statements", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => RelayConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
        config::validation::validate_config(&config).map_err(config::ConfigError::Validation)?;
    }

    logging::init_logging(&config.observability);

    tracing::info!("ajax-relay v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        path = %config.relay.path,
        whitelist = config.relay.url_whitelist.as_deref().unwrap_or("<none>"),
        connect_timeout_secs = ?config.timeouts.connect_secs,
        request_timeout_secs = ?config.timeouts.request_secs,
        "Configuration loaded"
    );

    let shutdown = Shutdown::new();
    lifecycle::start(config, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
