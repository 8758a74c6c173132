// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # swarmos CLI
//!
//! Runs agents and optimization swarms in-process against the node
//! configuration.
//!
//! ## Commands
//!
//! - `swarmos swarm run` - Run an optimization swarm to completion
//! - `swarmos agent ping|list` - Agent operations
//! - `swarmos config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use swarmos::commands::{self, AgentCommand, ConfigCommand, SwarmCommand};
use swarmos_core::domain::node_config::{LoggingConfig, NodeConfigManifest};

/// swarmos - agent lifecycle and swarm optimization
#[derive(Parser)]
#[command(name = "swarmos")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(short, long, global = true, env = "SWARMOS_CONFIG_PATH", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); defaults to the configured level
    #[arg(long, global = true, env = "SWARMOS_LOG_LEVEL")]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Optimization swarms
    #[command(name = "swarm")]
    Swarm {
        #[command(subcommand)]
        command: SwarmCommand,
    },

    /// Agent management
    #[command(name = "agent")]
    Agent {
        #[command(subcommand)]
        command: AgentCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Read once for log settings only; a broken config file falls back to
    // default logging and is reported by the command itself
    let mut logging = NodeConfigManifest::load_or_default(cli.config.clone())
        .map(|c| c.logging())
        .unwrap_or_else(|_| NodeConfigManifest::default().logging());
    if let Some(level) = cli.log_level {
        logging.level = level;
    }
    if cli.json_logs {
        logging.format = "json".to_string();
    }
    init_logging(&logging)?;

    match cli.command {
        Some(Commands::Swarm { command }) => commands::swarm::handle_command(command, cli.config).await,
        Some(Commands::Agent { command }) => commands::agent::handle_command(command, cli.config).await,
        Some(Commands::Config { command }) => commands::config::handle_command(command, cli.config).await,
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&config.level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if config.format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.compact().init();
    }

    Ok(())
}
