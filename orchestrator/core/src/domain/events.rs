// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::agent::{AgentId, AgentState, AgentType};
use crate::domain::task::{TaskId, TaskStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AgentLifecycleEvent {
    AgentCreated {
        agent_id: AgentId,
        name: String,
        agent_type: AgentType,
        created_at: DateTime<Utc>,
    },
    AgentStateChanged {
        agent_id: AgentId,
        from: AgentState,
        to: AgentState,
        changed_at: DateTime<Utc>,
    },
    AgentFailed {
        agent_id: AgentId,
        reason: String,
        failed_at: DateTime<Utc>,
    },
    AgentDeleted {
        agent_id: AgentId,
        deleted_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TaskEvent {
    TaskStarted {
        agent_id: AgentId,
        task_id: TaskId,
        ability: String,
        started_at: DateTime<Utc>,
    },
    TaskFinished {
        agent_id: AgentId,
        task_id: TaskId,
        ability: String,
        status: TaskStatus,
        finished_at: DateTime<Utc>,
    },
}

/// Swarm events carry the raw swarm UUID; the swarm crate owns the
/// `SwarmId` newtype.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SwarmEvent {
    SwarmCreated {
        swarm_id: Uuid,
        name: String,
        algorithm: String,
        created_at: DateTime<Utc>,
    },
    SwarmStarted {
        swarm_id: Uuid,
        run_id: Uuid,
        started_at: DateTime<Utc>,
    },
    BestSolutionImproved {
        swarm_id: Uuid,
        iteration: u64,
        fitness: f64,
        improved_at: DateTime<Utc>,
    },
    SwarmFinished {
        swarm_id: Uuid,
        run_id: Uuid,
        /// Final status name (COMPLETED, STOPPED or ERROR)
        status: String,
        iterations: u64,
        best_fitness: Option<f64>,
        error: Option<String>,
        finished_at: DateTime<Utc>,
    },
    MembershipChanged {
        swarm_id: Uuid,
        agent_id: AgentId,
        joined: bool,
        changed_at: DateTime<Utc>,
    },
}
