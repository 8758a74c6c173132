// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Swarm use cases
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** [`SwarmService`] trait, its standard implementation and the
//!   per-swarm background scheduler

mod scheduler;
pub mod service;

use async_trait::async_trait;

use swarmos_core::domain::agent::AgentId;
use swarmos_core::domain::repository::{RepositoryError, RestoreReport};

use crate::domain::algorithm::AlgorithmError;
use crate::domain::problem::ConfigurationError;
use crate::domain::swarm::{
    Swarm, SwarmConfig, SwarmFilter, SwarmId, SwarmStatus, SwarmStatusSnapshot, SwarmTask, SwarmTaskId,
    TaskBoardError,
};

pub use service::{StandardSwarmService, SwarmServiceConfig};

#[async_trait]
pub trait SwarmService: Send + Sync {
    async fn create_swarm(&self, config: SwarmConfig) -> Result<Swarm, SwarmError>;
    async fn get_swarm(&self, id: SwarmId) -> Option<Swarm>;
    async fn list_swarms(&self, filter: SwarmFilter) -> Vec<Swarm>;

    /// Start a background run. A no-op if a run is already live; refused
    /// while the swarm is in ERROR.
    async fn start_swarm(&self, id: SwarmId) -> Result<(), SwarmError>;

    /// Stop the live run and wait for it to exit. Idempotent for swarms that
    /// are not running; refused while the swarm is in ERROR.
    async fn stop_swarm(&self, id: SwarmId) -> Result<(), SwarmError>;

    async fn add_agent(&self, swarm_id: SwarmId, agent_id: AgentId) -> Result<(), SwarmError>;
    async fn remove_agent(&self, swarm_id: SwarmId, agent_id: AgentId) -> Result<(), SwarmError>;

    /// One key when `key` is given (`null` if absent), otherwise the whole
    /// shared map
    async fn get_shared_state(&self, id: SwarmId, key: Option<String>) -> Result<serde_json::Value, SwarmError>;
    async fn update_shared_state(&self, id: SwarmId, key: String, value: serde_json::Value) -> Result<(), SwarmError>;

    async fn get_status(&self, id: SwarmId) -> Result<SwarmStatusSnapshot, SwarmError>;

    async fn allocate_task(&self, id: SwarmId, payload: serde_json::Value) -> Result<SwarmTaskId, SwarmError>;
    async fn claim_task(&self, id: SwarmId, task_id: SwarmTaskId, agent_id: AgentId) -> Result<SwarmTask, SwarmError>;
    async fn complete_task(
        &self,
        id: SwarmId,
        task_id: SwarmTaskId,
        agent_id: AgentId,
        result: serde_json::Value,
    ) -> Result<(), SwarmError>;

    /// Reload swarms from the configured snapshot store
    async fn restore(&self) -> Result<RestoreReport, SwarmError>;

    /// Stop every live run and wait for all of them
    async fn shutdown(&self);
}

#[derive(Debug, thiserror::Error)]
pub enum SwarmError {
    #[error("Swarm not found: {0}")]
    NotFound(SwarmId),

    #[error("Agent not found: {0}")]
    AgentNotFound(AgentId),

    #[error("Swarm {id} is {status}: {reason}")]
    InvalidState { id: SwarmId, status: SwarmStatus, reason: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Algorithm error: {0}")]
    Algorithm(#[from] AlgorithmError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Swarm task not found: {0}")]
    TaskNotFound(SwarmTaskId),

    #[error("Swarm task conflict: {0}")]
    TaskConflict(String),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<TaskBoardError> for SwarmError {
    fn from(e: TaskBoardError) -> Self {
        match e {
            TaskBoardError::NotFound(id) => SwarmError::TaskNotFound(id),
            other => SwarmError::TaskConflict(other.to_string()),
        }
    }
}
