//! # Corral
//!
//! Command line front end of the Corral resource store.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                 apps/corral (THE BINARY)              │
//! │                                                       │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────┐   │
//! │  │    CLI      │    │ Orchestrator│    │  Config  │   │
//! │  │   (clap)    │    │   (tokio)   │    │  (toml)  │   │
//! │  └──────┬──────┘    └──────┬──────┘    └────┬─────┘   │
//! │         └──────────────────┼────────────────┘         │
//! │                            ▼                          │
//! │                    ┌───────────────┐                  │
//! │                    │  corral-core  │                  │
//! │                    │  (THE LOGIC)  │                  │
//! │                    └───────────────┘                  │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! corral init
//! corral status --json
//! corral relations --destination node:6f1c... --relation belongsto
//! corral run --config /etc/corral.toml
//! ```

use clap::Parser;
use corral::cli;
use corral::config::{AppConfig, LogConfig, LogFormat};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    let config = AppConfig::load(cli.config.as_deref());
    match &config {
        Ok(config) => init_tracing(&config.log),
        Err(_) => init_tracing(&LogConfig::default()),
    }

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Error: {}", e);
            std::process::exit(1);
        }
    };

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli, config).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Install the tracing subscriber. `RUST_LOG` wins over the configured filter.
fn init_tracing(log: &LogConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| log.filter_or_default().into());

    match log.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
}

fn print_banner() {
    println!("corral v{}", env!("CARGO_PKG_VERSION"));
}
