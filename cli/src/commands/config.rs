// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use swarmos_core::domain::node_config::NodeConfigManifest;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./swarmos-config.yaml)
        #[arg(short, long, default_value = "./swarmos-config.yaml")]
        output: PathBuf,

        /// Include comments for every setting
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths),
        ConfigCommand::Validate { file } => validate(file.or(config_override)),
        ConfigCommand::Generate { output, examples } => generate(output, examples),
    }
}

fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = NodeConfigManifest::load_or_default(config_override.clone()).context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. SWARMOS_CONFIG_PATH: {}",
            std::env::var("SWARMOS_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./swarmos-config.yaml");
        println!("  4. ~/.swarmos/config.yaml");
        println!();
    }

    let spec = &config.spec;
    println!("{}", "Current configuration:".bold());
    println!("  Node: {}", config.metadata.name);
    println!();

    println!("{}", "Scheduler:".bold());
    println!("  Iteration delay: {} ms", spec.scheduler.iteration_delay_ms);
    println!("  Persist on improvement: {}", spec.scheduler.persist_on_improvement);
    println!();

    println!("{}", "Storage:".bold());
    println!("  Backend: {:?}", spec.storage.backend);
    println!("  Data dir: {}", spec.storage.data_dir.display());
    println!();

    println!("{}", "Agent defaults:".bold());
    println!("  Task history: {}", spec.agents.max_task_history);
    println!("  Memory size: {}", spec.agents.default_memory_max_size);
    println!("  Queue size: {}", spec.agents.default_queue_max_size);
    println!(
        "  Default LLM provider: {}",
        spec.llm.default_provider.as_deref().unwrap_or("(none)")
    );
    println!();

    let logging = config.logging();
    println!("{}", "Logging:".bold());
    println!("  Level: {}", logging.level);
    println!("  Format: {}", logging.format);

    Ok(())
}

fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = NodeConfigManifest::load_or_default(config_path).context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());
    Ok(())
}

fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        include_str!("../../templates/config-with-examples.yaml").to_string()
    } else {
        NodeConfigManifest::default().to_yaml_string()?
    };

    std::fs::write(&output, sample).with_context(|| format!("Failed to write config to {:?}", output))?;

    println!("{}", format!("✓ Configuration generated: {}", output.display()).green());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annotated_template_is_valid() {
        let config =
            NodeConfigManifest::from_yaml_str(include_str!("../../templates/config-with-examples.yaml")).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_generate_writes_loadable_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("swarmos-config.yaml");
        generate(path.clone(), false).unwrap();

        let config = NodeConfigManifest::from_yaml_file(&path).unwrap();
        assert_eq!(config, NodeConfigManifest::default());
    }
}
