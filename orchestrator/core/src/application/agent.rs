// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::agent::{Agent, AgentConfig, AgentId, AgentState, AgentType, InvalidStateTransition};
use crate::domain::repository::{RepositoryError, RestoreReport};
use crate::domain::task::{Task, TaskResult};

/// Agent lifecycle operations exposed to the API layer and the swarm engine.
///
/// Lookups of unknown agents return `None` or [`AgentError::NotFound`]
/// rather than panicking, so batch callers can check and continue.
#[async_trait]
pub trait AgentLifecycleService: Send + Sync {
    async fn create_agent(&self, config: AgentConfig) -> Result<Agent, AgentError>;
    async fn get_agent(&self, id: AgentId) -> Option<Agent>;
    async fn list_agents(&self, filter: AgentFilter) -> Vec<Agent>;
    async fn agent_exists(&self, id: AgentId) -> bool;

    async fn start_agent(&self, id: AgentId) -> Result<(), AgentError>;
    async fn stop_agent(&self, id: AgentId) -> Result<(), AgentError>;
    async fn pause_agent(&self, id: AgentId) -> Result<(), AgentError>;
    async fn resume_agent(&self, id: AgentId) -> Result<(), AgentError>;
    async fn delete_agent(&self, id: AgentId) -> Result<(), AgentError>;

    /// Dispatch `payload` to the ability named by its `"ability"` field and
    /// wait for the handler. Handler failures come back as a failed
    /// [`TaskResult`], not as an `Err`.
    async fn execute_task(&self, id: AgentId, payload: serde_json::Value) -> Result<TaskResult, AgentError>;
    async fn task_history(&self, id: AgentId) -> Result<Vec<Task>, AgentError>;

    /// One key when `key` is given (`null` if absent), otherwise the whole
    /// memory as an object
    async fn get_memory(&self, id: AgentId, key: Option<String>) -> Result<serde_json::Value, AgentError>;
    async fn set_memory(&self, id: AgentId, key: String, value: serde_json::Value) -> Result<(), AgentError>;
    async fn clear_memory(&self, id: AgentId) -> Result<(), AgentError>;

    /// Reload agents from the configured snapshot store
    async fn restore(&self) -> Result<RestoreReport, AgentError>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<AgentType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<AgentState>,
}

impl AgentFilter {
    pub fn matches(&self, agent: &Agent) -> bool {
        self.agent_type.as_ref().is_none_or(|t| *t == agent.agent_type)
            && self.state.is_none_or(|s| s == agent.state())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Agent not found: {0}")]
    NotFound(AgentId),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: AgentState, to: AgentState },

    #[error("Agent {id} is not running (state: {state})")]
    NotRunning { id: AgentId, state: AgentState },

    #[error("Unknown ability: {0}")]
    UnknownAbility(String),

    #[error("Invalid task payload: {0}")]
    InvalidPayload(String),

    #[error("Invalid agent configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Task queue full ({max} tasks in flight)")]
    QueueFull { max: usize },

    #[error("Agent has {0} task(s) in flight")]
    TasksInFlight(usize),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<InvalidStateTransition> for AgentError {
    fn from(e: InvalidStateTransition) -> Self {
        AgentError::InvalidStateTransition { from: e.from, to: e.to }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_matching() {
        let mut agent = Agent::new(AgentConfig::new("m", AgentType::Monitor));
        assert!(AgentFilter::default().matches(&agent));

        let by_type = AgentFilter { agent_type: Some(AgentType::Trading), state: None };
        assert!(!by_type.matches(&agent));

        agent.start().unwrap();
        let by_state = AgentFilter { agent_type: Some(AgentType::Monitor), state: Some(AgentState::Running) };
        assert!(by_state.matches(&agent));
    }
}
