// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Agent Aggregate
//!
//! An [`Agent`] is a long-lived worker identity with a typed configuration,
//! a lifecycle state machine, a bounded key/value memory and a bounded
//! history of executed tasks.
//!
//! ## State Machine
//!
//! ```text
//! Created ──start──▶ Running ◀──resume── Paused
//!                      │  └────pause────▶  │
//!                      └──stop──▶ Stopped ◀┘
//! Running ──(handler panic)──▶ Error ──stop──▶ Stopped
//! ```
//!
//! `Stopped` is terminal. `Error` is sticky: only `stop` leaves it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt;
use uuid::Uuid;

use crate::domain::task::{Task, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub Uuid);

impl AgentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    Trading,
    Monitor,
    Arbitrage,
    DataCollection,
    Notification,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentState {
    Created,
    Running,
    Paused,
    Stopped,
    Error,
}

impl AgentState {
    /// Whether the lifecycle permits moving from `self` to `target`.
    pub fn can_transition_to(self, target: AgentState) -> bool {
        use AgentState::*;
        matches!(
            (self, target),
            (Created, Running)
                | (Running, Paused)
                | (Paused, Running)
                | (Running, Stopped)
                | (Paused, Stopped)
                | (Running, Error)
                | (Error, Stopped)
        )
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgentState::Created => "CREATED",
            AgentState::Running => "RUNNING",
            AgentState::Paused => "PAUSED",
            AgentState::Stopped => "STOPPED",
            AgentState::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// Agent configuration supplied at creation time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    pub name: String,

    #[serde(rename = "type")]
    pub agent_type: AgentType,

    /// Ability names this agent may execute (e.g. "ping", "llm_chat")
    #[serde(default)]
    pub abilities: BTreeSet<String>,

    /// Free-form agent parameters, passed to ability handlers
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub parameters: HashMap<String, serde_json::Value>,

    #[serde(default)]
    pub llm_config: LlmConfig,

    #[serde(default)]
    pub memory_config: MemoryConfig,

    #[serde(default)]
    pub queue_config: QueueConfig,
}

impl AgentConfig {
    pub fn new(name: impl Into<String>, agent_type: AgentType) -> Self {
        Self {
            name: name.into(),
            agent_type,
            abilities: BTreeSet::new(),
            parameters: HashMap::new(),
            llm_config: LlmConfig::default(),
            memory_config: MemoryConfig::default(),
            queue_config: QueueConfig::default(),
        }
    }

    pub fn with_ability(mut self, ability: impl Into<String>) -> Self {
        self.abilities.insert(ability.into());
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("agent name cannot be empty".to_string());
        }
        if self.memory_config.max_size == 0 {
            return Err("memory_config.max_size must be greater than zero".to_string());
        }
        if self.queue_config.max_size == 0 {
            return Err("queue_config.max_size must be greater than zero".to_string());
        }
        if let Some(t) = self.llm_config.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(format!("llm_config.temperature must be between 0.0 and 2.0, got {}", t));
            }
        }
        Ok(())
    }
}

/// LLM settings used by the `llm_chat` ability
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct LlmConfig {
    /// Provider name registered on the node; `None` selects the default provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryConfig {
    /// Maximum number of keys retained in agent memory
    #[serde(default = "default_memory_max_size")]
    pub max_size: usize,

    #[serde(default)]
    pub retention: RetentionPolicy,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_size: default_memory_max_size(),
            retention: RetentionPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RetentionPolicy {
    /// Evict the oldest inserted key when full
    #[default]
    Fifo,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueConfig {
    /// Maximum number of tasks in flight for this agent
    #[serde(default = "default_queue_max_size")]
    pub max_size: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_size: default_queue_max_size(),
        }
    }
}

fn default_memory_max_size() -> usize { 1000 }
fn default_queue_max_size() -> usize { 100 }

/// Insertion-ordered, size-bounded key/value store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AgentMemory {
    entries: HashMap<String, serde_json::Value>,
    order: VecDeque<String>,
}

impl AgentMemory {
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.entries.get(key)
    }

    /// Insert or replace `key`, evicting the oldest keys beyond `max_size`.
    /// Returns the evicted keys.
    pub fn set(&mut self, key: String, value: serde_json::Value, max_size: usize) -> Vec<String> {
        if self.entries.insert(key.clone(), value).is_none() {
            self.order.push_back(key);
        }
        let mut evicted = Vec::new();
        while self.order.len() > max_size.max(1) {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
                evicted.push(oldest);
            }
        }
        evicted
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Entries in insertion order
    pub fn to_map(&self) -> serde_json::Map<String, serde_json::Value> {
        self.order
            .iter()
            .filter_map(|k| self.entries.get(k).map(|v| (k.clone(), v.clone())))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid state transition: {from} -> {to}")]
pub struct InvalidStateTransition {
    pub from: AgentState,
    pub to: AgentState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub agent_type: AgentType,
    state: AgentState,
    pub config: AgentConfig,
    pub memory: AgentMemory,
    /// Tasks currently pending or running, in submission order
    #[serde(default)]
    pub task_queue: VecDeque<Task>,
    /// Finished tasks, oldest first
    #[serde(default)]
    pub task_history: VecDeque<Task>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    pub fn new(config: AgentConfig) -> Self {
        let now = Utc::now();
        Self {
            id: AgentId::new(),
            name: config.name.clone(),
            agent_type: config.agent_type.clone(),
            state: AgentState::Created,
            config,
            memory: AgentMemory::default(),
            task_queue: VecDeque::new(),
            task_history: VecDeque::new(),
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn has_ability(&self, ability: &str) -> bool {
        self.config.abilities.contains(ability)
    }

    fn transition(&mut self, to: AgentState) -> Result<(), InvalidStateTransition> {
        if !self.state.can_transition_to(to) {
            return Err(InvalidStateTransition { from: self.state, to });
        }
        self.state = to;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), InvalidStateTransition> {
        if self.state != AgentState::Created {
            return Err(InvalidStateTransition { from: self.state, to: AgentState::Running });
        }
        self.transition(AgentState::Running)
    }

    pub fn pause(&mut self) -> Result<(), InvalidStateTransition> {
        self.transition(AgentState::Paused)
    }

    pub fn resume(&mut self) -> Result<(), InvalidStateTransition> {
        if self.state != AgentState::Paused {
            return Err(InvalidStateTransition { from: self.state, to: AgentState::Running });
        }
        self.transition(AgentState::Running)
    }

    pub fn stop(&mut self) -> Result<(), InvalidStateTransition> {
        self.transition(AgentState::Stopped)
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), InvalidStateTransition> {
        self.transition(AgentState::Error)?;
        self.last_error = Some(reason.into());
        Ok(())
    }

    /// Move a finished task from the queue into the bounded history
    pub fn archive_task(&mut self, task: Task, max_history: usize) {
        self.task_queue.retain(|t| t.id != task.id);
        self.task_history.push_back(task);
        while self.task_history.len() > max_history.max(1) {
            self.task_history.pop_front();
        }
        self.updated_at = Utc::now();
    }

    pub fn has_running_tasks(&self) -> bool {
        !self.task_queue.is_empty()
    }

    pub fn find_task(&self, id: TaskId) -> Option<&Task> {
        self.task_queue
            .iter()
            .chain(self.task_history.iter())
            .find(|t| t.id == id)
    }

    /// Reset bookkeeping that only makes sense inside a live process
    pub fn clear_in_flight(&mut self) {
        for mut task in self.task_queue.drain(..) {
            task.cancel("process restarted before task finished");
            self.task_history.push_back(task);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn agent() -> Agent {
        Agent::new(AgentConfig::new("tester", AgentType::Custom).with_ability("ping"))
    }

    #[test]
    fn test_created_only_starts() {
        let mut a = agent();
        assert!(a.pause().is_err());
        assert!(a.resume().is_err());
        assert!(a.stop().is_err());
        assert!(a.start().is_ok());
        assert_eq!(a.state(), AgentState::Running);
    }

    #[test]
    fn test_pause_resume_cycle() {
        let mut a = agent();
        a.start().unwrap();
        a.pause().unwrap();
        assert_eq!(a.state(), AgentState::Paused);
        assert!(a.start().is_err());
        a.resume().unwrap();
        assert_eq!(a.state(), AgentState::Running);
    }

    #[test]
    fn test_stopped_is_terminal() {
        let mut a = agent();
        a.start().unwrap();
        a.stop().unwrap();
        for attempt in [Agent::start, Agent::pause, Agent::resume, Agent::stop] {
            let err = attempt(&mut a).unwrap_err();
            assert_eq!(err.from, AgentState::Stopped);
        }
    }

    #[test]
    fn test_error_only_stops() {
        let mut a = agent();
        a.start().unwrap();
        a.fail("boom").unwrap();
        assert_eq!(a.last_error.as_deref(), Some("boom"));
        assert!(a.resume().is_err());
        assert!(a.start().is_err());
        assert!(a.stop().is_ok());
    }

    #[test]
    fn test_memory_evicts_oldest() {
        let mut mem = AgentMemory::default();
        mem.set("a".into(), json!(1), 2);
        mem.set("b".into(), json!(2), 2);
        mem.set("a".into(), json!(3), 2);
        let evicted = mem.set("c".into(), json!(4), 2);
        assert_eq!(evicted, vec!["a".to_string()]);
        assert!(mem.get("a").is_none());
        assert_eq!(mem.get("b"), Some(&json!(2)));
        let keys: Vec<_> = mem.to_map().keys().cloned().collect();
        assert_eq!(keys, vec!["b", "c"]);
    }

    #[test]
    fn test_config_validation() {
        let mut config = AgentConfig::new("x", AgentType::Monitor);
        assert!(config.validate().is_ok());
        config.queue_config.max_size = 0;
        assert!(config.validate().is_err());
        config.queue_config.max_size = 1;
        config.name = "  ".into();
        assert!(config.validate().is_err());
    }
}
