// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_finished(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

/// A unit of work submitted to an agent
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: TaskId,
    pub ability: String,
    pub payload: serde_json::Value,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(ability: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: TaskId::new(),
            ability: ability.into(),
            payload,
            status: TaskStatus::Pending,
            result: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn start(&mut self) {
        if self.status == TaskStatus::Pending {
            self.status = TaskStatus::Running;
            self.started_at = Some(Utc::now());
        }
    }

    pub fn complete(&mut self, result: serde_json::Value) {
        self.finish(TaskStatus::Completed);
        self.result = Some(result);
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.finish(TaskStatus::Failed);
        self.error = Some(error.into());
    }

    pub fn cancel(&mut self, reason: impl Into<String>) {
        self.finish(TaskStatus::Cancelled);
        self.error = Some(reason.into());
    }

    fn finish(&mut self, status: TaskStatus) {
        self.status = status;
        self.finished_at = Some(Utc::now());
    }
}

/// Outcome of `execute_task`, returned to the caller in place of a raised error
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskResult {
    pub task_id: TaskId,
    pub ability: String,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskResult {
    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Completed
    }
}

impl From<&Task> for TaskResult {
    fn from(task: &Task) -> Self {
        Self {
            task_id: task.id,
            ability: task.ability.clone(),
            status: task.status,
            output: task.result.clone(),
            error: task.error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_lifecycle() {
        let mut task = Task::new("ping", json!({}));
        assert_eq!(task.status, TaskStatus::Pending);
        task.start();
        assert_eq!(task.status, TaskStatus::Running);
        assert!(task.started_at.is_some());
        task.complete(json!({"status": "pong"}));
        assert!(task.status.is_finished());
        let result = TaskResult::from(&task);
        assert!(result.is_success());
        assert_eq!(result.output, Some(json!({"status": "pong"})));
    }

    #[test]
    fn test_failed_task_carries_error() {
        let mut task = Task::new("llm_chat", json!({}));
        task.start();
        task.fail("provider unavailable");
        let result = TaskResult::from(&task);
        assert_eq!(result.status, TaskStatus::Failed);
        assert_eq!(result.error.as_deref(), Some("provider unavailable"));
    }
}
