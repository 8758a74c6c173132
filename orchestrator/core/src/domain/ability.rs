// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Abilities
//!
//! An ability is a named handler an agent can execute. Tasks name the
//! ability in their payload (`{"ability": "ping", ...}`) and the lifecycle
//! service dispatches to the handler registered under that name.
//!
//! Handlers are registered once, before the lifecycle service is built,
//! and the registry is read-only afterwards.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::agent::{AgentId, AgentType, LlmConfig};

/// Read-only view of the executing agent handed to a handler
#[derive(Debug, Clone)]
pub struct AbilityContext {
    pub agent_id: AgentId,
    pub agent_name: String,
    pub agent_type: AgentType,
    pub parameters: HashMap<String, serde_json::Value>,
    pub llm_config: LlmConfig,
    pub memory: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum AbilityError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("LLM call failed: {0}")]
    Llm(#[from] crate::domain::llm::LLMError),

    #[error("Execution failed: {0}")]
    Execution(String),
}

#[async_trait]
pub trait AbilityHandler: Send + Sync {
    async fn execute(
        &self,
        context: AbilityContext,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value, AbilityError>;
}

#[derive(Clone, Default)]
pub struct AbilityRegistry {
    handlers: HashMap<String, Arc<dyn AbilityHandler>>,
}

impl AbilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`, replacing any previous handler
    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn AbilityHandler>) {
        let name = name.into();
        if self.handlers.insert(name.clone(), handler).is_some() {
            tracing::warn!(ability = %name, "Replacing previously registered ability handler");
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn AbilityHandler>> {
        self.handlers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for AbilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbilityRegistry")
            .field("abilities", &self.names())
            .finish()
    }
}
