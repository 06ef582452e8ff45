//! # Corral CLI Module
//!
//! This module implements the CLI interface for Corral.
//!
//! ## Available Commands
//!
//! - `init` - Open every store and apply the schema
//! - `status` - Load the stores and report counts per kind
//! - `show` - Print one loaded resource
//! - `relations` - List relation rows matching a filter
//! - `run` - Load, then run the orchestrator until interrupted

mod commands;

use crate::config::AppConfig;
use clap::{Parser, Subcommand};
use corral_core::{CorralError, RelationType, ResourceType};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Corral - resource store for fleet models
///
/// Clusters, nodes, pods, applications and their network endpoints,
/// validated and mirrored into SQLite.
#[derive(Parser, Debug)]
#[command(name = "corral")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to a TOML configuration file (default: ./corral.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output in JSON format (for programmatic access)
    #[arg(long = "json", global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the stores and apply the schema
    Init,

    /// Show resource and relation counts
    Status,

    /// Print a resource by identifier
    Show {
        /// Resource identifier, e.g. node:6f1c...
        id: String,
    },

    /// List relations
    Relations {
        /// Origin resource identifier
        #[arg(long)]
        origin: Option<String>,

        /// Destination resource identifier
        #[arg(long)]
        destination: Option<String>,

        /// Relation type (belongsto, isa)
        #[arg(long, value_parser = parse_relation)]
        relation: Option<RelationType>,

        /// Origin kind (cluster, node, pod, ...)
        #[arg(long, value_parser = parse_kind)]
        origin_type: Option<ResourceType>,

        /// Destination kind (cluster, node, pod, ...)
        #[arg(long, value_parser = parse_kind)]
        destination_type: Option<ResourceType>,
    },

    /// Load the stores and run until interrupted
    Run,
}

fn parse_kind(raw: &str) -> Result<ResourceType, String> {
    raw.parse().map_err(|e: corral_core::ValidationError| e.to_string())
}

fn parse_relation(raw: &str) -> Result<RelationType, String> {
    raw.parse().map_err(|e: corral_core::ValidationError| e.to_string())
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli, config: AppConfig) -> Result<(), CorralError> {
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Init) => cmd_init(&config, json_mode),
        Some(Commands::Status) => cmd_status(&config, json_mode),
        Some(Commands::Show { id }) => cmd_show(&config, &id),
        Some(Commands::Relations {
            origin,
            destination,
            relation,
            origin_type,
            destination_type,
        }) => cmd_relations(
            &config,
            json_mode,
            origin.as_deref(),
            destination.as_deref(),
            relation,
            origin_type,
            destination_type,
        ),
        Some(Commands::Run) => cmd_run(&config, json_mode).await,
        None => {
            // No subcommand - show status by default
            cmd_status(&config, json_mode)
        }
    }
}
