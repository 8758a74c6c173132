// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Swarm Aggregate
//!
//! Defines the core types for swarm optimization:
//!
//! - [`Swarm`] - aggregate root tracking configuration, membership,
//!   iteration progress, the best solution found and the task board.
//! - [`SwarmId`] - unique identifier (UUID newtype).
//! - [`SwarmRecord`] - the persisted form; the objective is stored by name
//!   and re-resolved on load.
//!
//! The live algorithm instance is not part of the aggregate. It belongs to
//! the background run driving the swarm and is dropped when the run ends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use swarmos_core::domain::agent::AgentId;

use crate::domain::algorithm::{AlgorithmParams, AlgorithmType};
use crate::domain::objective::ObjectiveRegistry;
use crate::domain::problem::{ConfigurationError, OptimizationProblem, ProblemDescriptor, SwarmSolution};

/// Unique identifier for a [`Swarm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SwarmId(pub Uuid);

impl SwarmId {
    /// Generate a new random `SwarmId`.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for SwarmId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SwarmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SwarmStatus {
    Created,
    Running,
    Stopped,
    Error,
    Completed,
}

impl SwarmStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SwarmStatus::Created => "CREATED",
            SwarmStatus::Running => "RUNNING",
            SwarmStatus::Stopped => "STOPPED",
            SwarmStatus::Error => "ERROR",
            SwarmStatus::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for SwarmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable swarm configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SwarmConfig {
    pub name: String,
    pub algorithm_type: AlgorithmType,
    pub algorithm_params: AlgorithmParams,
    pub objective_description: String,
    pub max_iterations: u64,
    pub target_fitness: Option<f64>,
    pub problem: OptimizationProblem,
}

impl SwarmConfig {
    pub fn new(
        name: impl Into<String>,
        algorithm_type: AlgorithmType,
        problem: OptimizationProblem,
        max_iterations: u64,
    ) -> Self {
        let objective_description = problem.objective().name().to_string();
        Self {
            name: name.into(),
            algorithm_type,
            algorithm_params: AlgorithmParams::default(),
            objective_description,
            max_iterations,
            target_fitness: None,
            problem,
        }
    }

    pub fn with_params(mut self, params: AlgorithmParams) -> Self {
        self.algorithm_params = params;
        self
    }

    pub fn with_target(mut self, target_fitness: f64) -> Self {
        self.target_fitness = Some(target_fitness);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.name.trim().is_empty() {
            return Err(ConfigurationError::Invalid("swarm name cannot be empty".into()));
        }
        if self.max_iterations == 0 {
            return Err(ConfigurationError::ZeroIterations);
        }
        if self.target_fitness.is_some_and(|t| !t.is_finite()) {
            return Err(ConfigurationError::Invalid("target_fitness must be finite".into()));
        }
        Ok(())
    }

    pub fn to_record(&self) -> SwarmConfigRecord {
        SwarmConfigRecord {
            name: self.name.clone(),
            algorithm_type: self.algorithm_type,
            algorithm_params: self.algorithm_params.clone(),
            objective_description: self.objective_description.clone(),
            max_iterations: self.max_iterations,
            target_fitness: self.target_fitness,
            problem: self.problem.descriptor(),
        }
    }

    pub fn from_record(
        record: SwarmConfigRecord,
        objectives: &ObjectiveRegistry,
    ) -> Result<Self, ConfigurationError> {
        let problem = OptimizationProblem::from_descriptor(&record.problem, objectives)?;
        Ok(Self {
            name: record.name,
            algorithm_type: record.algorithm_type,
            algorithm_params: record.algorithm_params,
            objective_description: record.objective_description,
            max_iterations: record.max_iterations,
            target_fitness: record.target_fitness,
            problem,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmConfigRecord {
    pub name: String,
    pub algorithm_type: AlgorithmType,
    #[serde(default)]
    pub algorithm_params: AlgorithmParams,
    #[serde(default)]
    pub objective_description: String,
    pub max_iterations: u64,
    pub target_fitness: Option<f64>,
    pub problem: ProblemDescriptor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SwarmTaskId(pub Uuid);

impl SwarmTaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SwarmTaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SwarmTaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwarmTaskStatus {
    Pending,
    Claimed,
    Completed,
}

/// A unit of work posted on the swarm's task board for member agents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmTask {
    pub id: SwarmTaskId,
    pub payload: serde_json::Value,
    pub status: SwarmTaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claimed_by: Option<AgentId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TaskBoardError {
    #[error("Task not found: {0}")]
    NotFound(SwarmTaskId),

    #[error("Agent {0} is not a member of the swarm")]
    NotMember(AgentId),

    #[error("Task {task_id} is {status:?}")]
    WrongStatus { task_id: SwarmTaskId, status: SwarmTaskStatus },

    #[error("Task {task_id} is claimed by another agent")]
    ClaimedByOther { task_id: SwarmTaskId },
}

/// Aggregate root for one optimization swarm.
///
/// # Invariants
///
/// - `members` holds each agent at most once, in insertion order.
/// - `best_solution` only ever changes to a strictly better solution.
#[derive(Debug, Clone, PartialEq)]
pub struct Swarm {
    pub id: SwarmId,
    pub name: String,
    status: SwarmStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub config: SwarmConfig,
    members: Vec<AgentId>,
    pub current_iteration: u64,
    best_solution: Option<SwarmSolution>,
    pub shared_data: serde_json::Map<String, serde_json::Value>,
    pub task_queue: Vec<SwarmTask>,
    pub last_error: Option<String>,
}

impl Swarm {
    pub fn new(config: SwarmConfig) -> Self {
        let now = Utc::now();
        Self {
            id: SwarmId::new(),
            name: config.name.clone(),
            status: SwarmStatus::Created,
            created_at: now,
            updated_at: now,
            config,
            members: Vec::new(),
            current_iteration: 0,
            best_solution: None,
            shared_data: serde_json::Map::new(),
            task_queue: Vec::new(),
            last_error: None,
        }
    }

    pub fn status(&self) -> SwarmStatus {
        self.status
    }

    pub fn members(&self) -> &[AgentId] {
        &self.members
    }

    pub fn best_solution(&self) -> Option<&SwarmSolution> {
        self.best_solution.as_ref()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub(crate) fn set_status(&mut self, status: SwarmStatus) {
        self.status = status;
        self.touch();
    }

    /// Enter RUNNING for a fresh run. The best solution survives restarts.
    pub(crate) fn begin_run(&mut self) {
        self.status = SwarmStatus::Running;
        self.current_iteration = 0;
        self.last_error = None;
        self.touch();
    }

    /// Returns `false` if the agent was already a member
    pub fn add_member(&mut self, agent_id: AgentId) -> bool {
        if self.members.contains(&agent_id) {
            return false;
        }
        self.members.push(agent_id);
        self.touch();
        true
    }

    /// Returns `false` if the agent was not a member
    pub fn remove_member(&mut self, agent_id: AgentId) -> bool {
        let before = self.members.len();
        self.members.retain(|m| *m != agent_id);
        let removed = self.members.len() != before;
        if removed {
            self.touch();
        }
        removed
    }

    /// Replace the best solution if `candidate` is strictly better
    pub fn offer_solution(&mut self, candidate: SwarmSolution) -> bool {
        let improves = self
            .best_solution
            .as_ref()
            .is_none_or(|best| self.config.problem.is_better(&candidate.fitness, &best.fitness));
        if improves {
            self.best_solution = Some(candidate);
            self.touch();
        }
        improves
    }

    pub fn allocate_task(&mut self, payload: serde_json::Value) -> SwarmTaskId {
        let now = Utc::now();
        let task = SwarmTask {
            id: SwarmTaskId::new(),
            payload,
            status: SwarmTaskStatus::Pending,
            claimed_by: None,
            result: None,
            created_at: now,
            updated_at: now,
        };
        let id = task.id;
        self.task_queue.push(task);
        self.touch();
        id
    }

    pub fn claim_task(&mut self, task_id: SwarmTaskId, agent_id: AgentId) -> Result<SwarmTask, TaskBoardError> {
        if !self.members.contains(&agent_id) {
            return Err(TaskBoardError::NotMember(agent_id));
        }
        let task = self.task_mut(task_id)?;
        if task.status != SwarmTaskStatus::Pending {
            return Err(TaskBoardError::WrongStatus { task_id, status: task.status });
        }
        task.status = SwarmTaskStatus::Claimed;
        task.claimed_by = Some(agent_id);
        task.updated_at = Utc::now();
        let claimed = task.clone();
        self.touch();
        Ok(claimed)
    }

    pub fn complete_task(
        &mut self,
        task_id: SwarmTaskId,
        agent_id: AgentId,
        result: serde_json::Value,
    ) -> Result<(), TaskBoardError> {
        let task = self.task_mut(task_id)?;
        if task.status != SwarmTaskStatus::Claimed {
            return Err(TaskBoardError::WrongStatus { task_id, status: task.status });
        }
        if task.claimed_by != Some(agent_id) {
            return Err(TaskBoardError::ClaimedByOther { task_id });
        }
        task.status = SwarmTaskStatus::Completed;
        task.result = Some(result);
        task.updated_at = Utc::now();
        self.touch();
        Ok(())
    }

    fn task_mut(&mut self, task_id: SwarmTaskId) -> Result<&mut SwarmTask, TaskBoardError> {
        self.task_queue
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or(TaskBoardError::NotFound(task_id))
    }

    pub fn pending_tasks(&self) -> usize {
        self.task_queue
            .iter()
            .filter(|t| t.status == SwarmTaskStatus::Pending)
            .count()
    }

    pub fn status_snapshot(&self, loop_active: bool) -> SwarmStatusSnapshot {
        SwarmStatusSnapshot {
            id: self.id,
            name: self.name.clone(),
            status: self.status,
            algorithm: self.config.algorithm_type,
            current_iteration: self.current_iteration,
            max_iterations: self.config.max_iterations,
            best_fitness: self.best_solution.as_ref().map(|s| s.fitness.scalar()),
            member_count: self.members.len(),
            pending_tasks: self.pending_tasks(),
            loop_active,
            last_error: self.last_error.clone(),
            updated_at: self.updated_at,
        }
    }

    pub fn to_record(&self) -> SwarmRecord {
        SwarmRecord {
            id: self.id,
            name: self.name.clone(),
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
            config: self.config.to_record(),
            member_agent_ids: self.members.clone(),
            current_iteration: self.current_iteration,
            best_solution: self.best_solution.clone(),
            shared_data: self.shared_data.clone(),
            task_queue: self.task_queue.clone(),
            last_error: self.last_error.clone(),
        }
    }

    pub fn from_record(record: SwarmRecord, objectives: &ObjectiveRegistry) -> Result<Self, ConfigurationError> {
        let config = SwarmConfig::from_record(record.config, objectives)?;
        let mut members: Vec<AgentId> = Vec::with_capacity(record.member_agent_ids.len());
        for id in record.member_agent_ids {
            if !members.contains(&id) {
                members.push(id);
            }
        }
        Ok(Self {
            id: record.id,
            name: record.name,
            status: record.status,
            created_at: record.created_at,
            updated_at: record.updated_at,
            config,
            members,
            current_iteration: record.current_iteration,
            best_solution: record.best_solution,
            shared_data: record.shared_data,
            task_queue: record.task_queue,
            last_error: record.last_error,
        })
    }
}

/// Persisted form of a [`Swarm`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmRecord {
    pub id: SwarmId,
    pub name: String,
    pub status: SwarmStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub config: SwarmConfigRecord,
    #[serde(default)]
    pub member_agent_ids: Vec<AgentId>,
    #[serde(default)]
    pub current_iteration: u64,
    pub best_solution: Option<SwarmSolution>,
    #[serde(default)]
    pub shared_data: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub task_queue: Vec<SwarmTask>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmStatusSnapshot {
    pub id: SwarmId,
    pub name: String,
    pub status: SwarmStatus,
    pub algorithm: AlgorithmType,
    pub current_iteration: u64,
    pub max_iterations: u64,
    pub best_fitness: Option<f64>,
    pub member_count: usize,
    pub pending_tasks: usize,
    pub loop_active: bool,
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SwarmFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SwarmStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<AlgorithmType>,
}

impl SwarmFilter {
    pub fn matches(&self, swarm: &Swarm) -> bool {
        self.status.is_none_or(|s| s == swarm.status())
            && self.algorithm.is_none_or(|a| a == swarm.config.algorithm_type)
    }
}
