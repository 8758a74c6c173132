// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use swarmos_core::application::AgentLifecycleService;
use swarmos_core::domain::agent::{AgentConfig, AgentType};
use swarmos_core::domain::node_config::NodeConfigManifest;

use crate::embedded::EmbeddedNode;

#[derive(Subcommand)]
pub enum AgentCommand {
    /// Create, start and ping an agent in-process
    Ping {
        /// Agent name
        #[arg(long, default_value = "cli-pinger")]
        name: String,
    },

    /// List agents known to the configured store
    List,
}

pub async fn handle_command(command: AgentCommand, config_path: Option<PathBuf>) -> Result<()> {
    let config = NodeConfigManifest::load_or_default(config_path).context("Failed to load configuration")?;
    let node = EmbeddedNode::new(&config).await?;

    match command {
        AgentCommand::Ping { name } => ping(&node, name).await,
        AgentCommand::List => list(&node).await,
    }
}

async fn ping(node: &EmbeddedNode, name: String) -> Result<()> {
    let agent = node
        .agents
        .create_agent(AgentConfig::new(name, AgentType::Monitor).with_ability("ping"))
        .await?;
    node.agents.start_agent(agent.id).await?;

    let result = node
        .agents
        .execute_task(agent.id, serde_json::json!({ "ability": "ping" }))
        .await?;

    if result.is_success() {
        println!("{}", format!("✓ Agent {} answered", agent.id).green());
        if let Some(output) = &result.output {
            println!("{}", serde_json::to_string_pretty(output)?);
        }
    } else {
        println!(
            "{}",
            format!("✗ Ping failed: {}", result.error.as_deref().unwrap_or("unknown error")).red()
        );
    }

    node.agents.stop_agent(agent.id).await?;
    node.agents.delete_agent(agent.id).await?;
    Ok(())
}

async fn list(node: &EmbeddedNode) -> Result<()> {
    let agents = node.agents.list_agents(Default::default()).await;

    if agents.is_empty() {
        println!("{}", "No agents found".yellow());
        return Ok(());
    }

    println!("{} agents found:", agents.len());
    println!("{:<38} {:<20} {:<16} STATE", "ID", "NAME", "TYPE");
    for agent in agents {
        println!(
            "{:<38} {:<20} {:<16} {}",
            agent.id,
            agent.name.bold(),
            format!("{:?}", agent.agent_type),
            agent.state()
        );
    }

    Ok(())
}
