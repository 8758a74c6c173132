// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::warn;

use crate::domain::agent::{Agent, AgentId};

/// Process-wide agent table guarded by a single lock.
///
/// Closures passed to [`AgentRegistry::update`] and
/// [`AgentRegistry::remove_if`] run with the lock held and must not await or
/// do long-running work.
#[derive(Clone, Default)]
pub struct AgentRegistry {
    agents: Arc<Mutex<HashMap<AgentId, Agent>>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, agent: Agent) {
        self.agents.lock().insert(agent.id, agent);
    }

    pub fn get(&self, id: AgentId) -> Option<Agent> {
        self.agents.lock().get(&id).cloned()
    }

    pub fn contains(&self, id: AgentId) -> bool {
        self.agents.lock().contains_key(&id)
    }

    /// All agents, oldest first
    pub fn list(&self) -> Vec<Agent> {
        let mut agents: Vec<Agent> = self.agents.lock().values().cloned().collect();
        agents.sort_by_key(|a| a.created_at);
        agents
    }

    /// Mutate an agent in place. Returns `None` if the agent is unknown.
    pub fn update<R>(&self, id: AgentId, f: impl FnOnce(&mut Agent) -> R) -> Option<R> {
        self.agents.lock().get_mut(&id).map(f)
    }

    /// Remove an agent if `check` accepts it. `Ok(None)` when unknown.
    pub fn remove_if<E>(
        &self,
        id: AgentId,
        check: impl FnOnce(&Agent) -> Result<(), E>,
    ) -> Result<Option<Agent>, E> {
        let mut agents = self.agents.lock();
        match agents.get(&id) {
            None => Ok(None),
            Some(agent) => {
                check(agent)?;
                Ok(agents.remove(&id))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.agents.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.lock().is_empty()
    }

    /// Serialize every agent for a snapshot, keyed by id
    pub fn snapshot_entries(&self) -> BTreeMap<String, serde_json::Value> {
        let agents = self.agents.lock();
        agents
            .values()
            .filter_map(|agent| match serde_json::to_value(agent) {
                Ok(value) => Some((agent.id.to_string(), value)),
                Err(e) => {
                    warn!(agent_id = %agent.id, "Failed to serialize agent: {}", e);
                    None
                }
            })
            .collect()
    }
}
