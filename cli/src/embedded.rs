// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Embedded mode: agent and swarm services built in-process from the node
//! configuration.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use swarmos_core::application::abilities::builtin_abilities;
use swarmos_core::application::{AgentLifecycleService, StandardAgentLifecycleService};
use swarmos_core::domain::node_config::NodeConfigManifest;
use swarmos_core::infrastructure::llm::LlmProviderRegistry;
use swarmos_core::infrastructure::{snapshot_store_for, EventBus};
use swarmos_swarm::application::{StandardSwarmService, SwarmService, SwarmServiceConfig};

pub struct EmbeddedNode {
    pub event_bus: EventBus,
    pub agents: Arc<StandardAgentLifecycleService>,
    pub swarms: StandardSwarmService,
}

impl EmbeddedNode {
    pub async fn new(config: &NodeConfigManifest) -> Result<Self> {
        config.validate().context("Configuration validation failed")?;

        let spec = &config.spec;
        let event_bus = EventBus::with_default_capacity();
        let providers =
            Arc::new(LlmProviderRegistry::new().with_default_provider(spec.llm.default_provider.clone()));

        let agents = Arc::new(
            StandardAgentLifecycleService::new(builtin_abilities(providers), event_bus.clone())
                .with_defaults(spec.agents.clone())
                .with_store(snapshot_store_for(spec.storage.backend, spec.storage.agents_path())),
        );
        let swarms = StandardSwarmService::new(
            agents.clone(),
            event_bus.clone(),
            SwarmServiceConfig {
                scheduler: spec.scheduler.clone(),
                store: Some(snapshot_store_for(spec.storage.backend, spec.storage.swarms_path())),
                ..SwarmServiceConfig::default()
            },
        );

        let agent_report = agents.restore().await.context("Failed to restore agents")?;
        let swarm_report = swarms.restore().await.context("Failed to restore swarms")?;
        info!(
            backend = ?spec.storage.backend,
            agents = agent_report.restored,
            swarms = swarm_report.restored,
            skipped = agent_report.skipped + swarm_report.skipped,
            "Embedded node ready"
        );

        Ok(Self {
            event_bus,
            agents,
            swarms,
        })
    }

    /// Stop every live swarm run
    pub async fn shutdown(&self) {
        self.swarms.shutdown().await;
    }
}
