// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use chrono::Utc;
use std::any::Any;
use std::sync::Arc;
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};

use crate::application::agent::{AgentError, AgentFilter, AgentLifecycleService};
use crate::domain::ability::{AbilityContext, AbilityError, AbilityHandler, AbilityRegistry};
use crate::domain::agent::{Agent, AgentConfig, AgentId, AgentState, InvalidStateTransition, MemoryConfig, QueueConfig};
use crate::domain::events::{AgentLifecycleEvent, TaskEvent};
use crate::domain::node_config::AgentDefaults;
use crate::domain::repository::{RestoreReport, Snapshot, SnapshotStore};
use crate::domain::task::{Task, TaskResult};
use crate::infrastructure::agent_registry::AgentRegistry;
use crate::infrastructure::event_bus::EventBus;

pub struct StandardAgentLifecycleService {
    registry: AgentRegistry,
    abilities: AbilityRegistry,
    event_bus: EventBus,
    persistence: Arc<RegistryPersistence>,
    defaults: AgentDefaults,
}

/// Snapshot store plus the lock that serializes writes to it. Shared with
/// detached task bookkeeping, which persists after the caller may be gone.
#[derive(Default)]
struct RegistryPersistence {
    store: Option<Arc<dyn SnapshotStore>>,
    lock: tokio::sync::Mutex<()>,
}

impl RegistryPersistence {
    /// Write the whole registry to the snapshot store. Failures are logged;
    /// the in-memory state stays authoritative.
    async fn save(&self, registry: &AgentRegistry) {
        let Some(store) = &self.store else {
            return;
        };
        let _guard = self.lock.lock().await;
        let snapshot = Snapshot::new(registry.snapshot_entries());
        if let Err(e) = store.save(&snapshot).await {
            warn!("Failed to persist agent registry: {}", e);
        }
    }
}

/// Everything needed to settle an admitted task once its handler returns
struct TaskSettlement {
    agent_id: AgentId,
    registry: AgentRegistry,
    event_bus: EventBus,
    persistence: Arc<RegistryPersistence>,
    max_history: usize,
}

impl StandardAgentLifecycleService {
    pub fn new(abilities: AbilityRegistry, event_bus: EventBus) -> Self {
        Self {
            registry: AgentRegistry::new(),
            abilities,
            event_bus,
            persistence: Arc::new(RegistryPersistence::default()),
            defaults: AgentDefaults::default(),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        self.persistence = Arc::new(RegistryPersistence {
            store: Some(store),
            lock: tokio::sync::Mutex::new(()),
        });
        self
    }

    pub fn with_defaults(mut self, defaults: AgentDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    async fn persist(&self) {
        self.persistence.save(&self.registry).await;
    }

    async fn transition(
        &self,
        id: AgentId,
        op: fn(&mut Agent) -> Result<(), InvalidStateTransition>,
    ) -> Result<(), AgentError> {
        let (from, to) = self
            .registry
            .update(id, |agent| {
                let from = agent.state();
                op(agent).map(|_| (from, agent.state()))
            })
            .ok_or(AgentError::NotFound(id))??;

        info!(agent_id = %id, %from, %to, "Agent state changed");
        self.event_bus.publish_agent_event(AgentLifecycleEvent::AgentStateChanged {
            agent_id: id,
            from,
            to,
            changed_at: Utc::now(),
        });
        self.persist().await;
        Ok(())
    }

    /// Fill sizes left at their built-in defaults from the node defaults
    fn apply_defaults(&self, config: &mut AgentConfig) {
        if config.memory_config == MemoryConfig::default() {
            config.memory_config.max_size = self.defaults.default_memory_max_size;
        }
        if config.queue_config == QueueConfig::default() {
            config.queue_config.max_size = self.defaults.default_queue_max_size;
        }
    }

    /// Checks run in this order: state, ability field, ability known,
    /// queue capacity. On success the task is already queued as running.
    fn admit_task(
        &self,
        agent: &mut Agent,
        payload: &serde_json::Value,
    ) -> Result<(Task, AbilityContext, Arc<dyn AbilityHandler>), AgentError> {
        if agent.state() != AgentState::Running {
            return Err(AgentError::NotRunning { id: agent.id, state: agent.state() });
        }

        let ability = payload
            .get("ability")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| AgentError::InvalidPayload("missing string field 'ability'".into()))?;

        let handler = match self.abilities.get(ability) {
            Some(handler) if agent.has_ability(ability) => handler,
            _ => return Err(AgentError::UnknownAbility(ability.to_string())),
        };

        let max = agent.config.queue_config.max_size;
        if agent.task_queue.len() >= max {
            return Err(AgentError::QueueFull { max });
        }

        let mut task = Task::new(ability, payload.clone());
        task.start();
        agent.task_queue.push_back(task.clone());

        let context = AbilityContext {
            agent_id: agent.id,
            agent_name: agent.name.clone(),
            agent_type: agent.agent_type.clone(),
            parameters: agent.config.parameters.clone(),
            llm_config: agent.config.llm_config.clone(),
            memory: agent.memory.to_map(),
        };
        Ok((task, context, handler))
    }
}

#[async_trait]
impl AgentLifecycleService for StandardAgentLifecycleService {
    async fn create_agent(&self, mut config: AgentConfig) -> Result<Agent, AgentError> {
        config.validate().map_err(AgentError::InvalidConfiguration)?;
        self.apply_defaults(&mut config);

        for ability in &config.abilities {
            if !self.abilities.contains(ability) {
                warn!(ability = %ability, agent = %config.name, "Agent declares an ability with no registered handler");
            }
        }

        let agent = Agent::new(config);
        info!(agent_id = %agent.id, name = %agent.name, "Agent created");
        self.registry.insert(agent.clone());
        self.event_bus.publish_agent_event(AgentLifecycleEvent::AgentCreated {
            agent_id: agent.id,
            name: agent.name.clone(),
            agent_type: agent.agent_type.clone(),
            created_at: agent.created_at,
        });
        self.persist().await;
        Ok(agent)
    }

    async fn get_agent(&self, id: AgentId) -> Option<Agent> {
        self.registry.get(id)
    }

    async fn list_agents(&self, filter: AgentFilter) -> Vec<Agent> {
        self.registry
            .list()
            .into_iter()
            .filter(|a| filter.matches(a))
            .collect()
    }

    async fn agent_exists(&self, id: AgentId) -> bool {
        self.registry.contains(id)
    }

    async fn start_agent(&self, id: AgentId) -> Result<(), AgentError> {
        self.transition(id, Agent::start).await
    }

    async fn stop_agent(&self, id: AgentId) -> Result<(), AgentError> {
        self.transition(id, Agent::stop).await
    }

    async fn pause_agent(&self, id: AgentId) -> Result<(), AgentError> {
        self.transition(id, Agent::pause).await
    }

    async fn resume_agent(&self, id: AgentId) -> Result<(), AgentError> {
        self.transition(id, Agent::resume).await
    }

    async fn delete_agent(&self, id: AgentId) -> Result<(), AgentError> {
        self.registry
            .remove_if(id, |agent| {
                if agent.has_running_tasks() {
                    Err(AgentError::TasksInFlight(agent.task_queue.len()))
                } else {
                    Ok(())
                }
            })?
            .ok_or(AgentError::NotFound(id))?;

        info!(agent_id = %id, "Agent deleted");
        self.event_bus.publish_agent_event(AgentLifecycleEvent::AgentDeleted {
            agent_id: id,
            deleted_at: Utc::now(),
        });
        self.persist().await;
        Ok(())
    }

    async fn execute_task(&self, id: AgentId, payload: serde_json::Value) -> Result<TaskResult, AgentError> {
        let (task, context, handler) = self
            .registry
            .update(id, |agent| self.admit_task(agent, &payload))
            .ok_or(AgentError::NotFound(id))??;

        debug!(agent_id = %id, task_id = %task.id, ability = %task.ability, "Executing task");
        self.event_bus.publish_task_event(TaskEvent::TaskStarted {
            agent_id: id,
            task_id: task.id,
            ability: task.ability.clone(),
            started_at: Utc::now(),
        });

        // Settle on a detached task: a caller that drops this future (for
        // example under a timeout) must not strand the task in the queue.
        let settlement = TaskSettlement {
            agent_id: id,
            registry: self.registry.clone(),
            event_bus: self.event_bus.clone(),
            persistence: self.persistence.clone(),
            max_history: self.defaults.max_task_history,
        };
        let pending = task.clone();
        let run = tokio::spawn(async move {
            let outcome = tokio::spawn(async move { handler.execute(context, payload).await }).await;
            settlement.settle(task, outcome).await
        });

        match run.await {
            Ok(result) => Ok(result),
            Err(join_error) => {
                let mut task = pending;
                task.cancel(join_error.to_string());
                Ok(TaskResult::from(&task))
            }
        }
    }

    async fn task_history(&self, id: AgentId) -> Result<Vec<Task>, AgentError> {
        self.registry
            .get(id)
            .map(|agent| agent.task_history.into_iter().collect())
            .ok_or(AgentError::NotFound(id))
    }

    async fn get_memory(&self, id: AgentId, key: Option<String>) -> Result<serde_json::Value, AgentError> {
        let agent = self.registry.get(id).ok_or(AgentError::NotFound(id))?;
        Ok(match key {
            Some(key) => agent.memory.get(&key).cloned().unwrap_or(serde_json::Value::Null),
            None => serde_json::Value::Object(agent.memory.to_map()),
        })
    }

    async fn set_memory(&self, id: AgentId, key: String, value: serde_json::Value) -> Result<(), AgentError> {
        let evicted = self
            .registry
            .update(id, |agent| {
                let max = agent.config.memory_config.max_size;
                let evicted = agent.memory.set(key, value, max);
                agent.updated_at = Utc::now();
                evicted
            })
            .ok_or(AgentError::NotFound(id))?;

        if !evicted.is_empty() {
            debug!(agent_id = %id, ?evicted, "Evicted oldest memory entries");
        }
        self.persist().await;
        Ok(())
    }

    async fn clear_memory(&self, id: AgentId) -> Result<(), AgentError> {
        self.registry
            .update(id, |agent| {
                agent.memory.clear();
                agent.updated_at = Utc::now();
            })
            .ok_or(AgentError::NotFound(id))?;
        self.persist().await;
        Ok(())
    }

    async fn restore(&self) -> Result<RestoreReport, AgentError> {
        let Some(store) = &self.persistence.store else {
            return Ok(RestoreReport::default());
        };

        let snapshot = store.load().await?;
        let mut report = RestoreReport::default();
        for (key, value) in snapshot.entries {
            match serde_json::from_value::<Agent>(value) {
                Ok(mut agent) => {
                    agent.clear_in_flight();
                    self.registry.insert(agent);
                    report.restored += 1;
                }
                Err(e) => {
                    warn!(entry = %key, "Skipping undecodable agent snapshot entry: {}", e);
                    report.skipped += 1;
                }
            }
        }

        info!(restored = report.restored, skipped = report.skipped, "Agent registry restored");
        Ok(report)
    }
}

impl TaskSettlement {
    /// Record the handler outcome, archive the task and apply the
    /// panic -> ERROR transition. The handler runs on its own task so a
    /// panic cannot unwind through the registry.
    async fn settle(
        self,
        mut task: Task,
        outcome: Result<Result<serde_json::Value, AbilityError>, JoinError>,
    ) -> TaskResult {
        let id = self.agent_id;
        let mut panic_reason = None;
        match outcome {
            Ok(Ok(output)) => task.complete(output),
            Ok(Err(e)) => {
                warn!(agent_id = %id, task_id = %task.id, "Task failed: {}", e);
                task.fail(e.to_string());
            }
            Err(join_error) if join_error.is_panic() => {
                let reason = format!(
                    "ability '{}' panicked: {}",
                    task.ability,
                    panic_message(join_error.into_panic())
                );
                error!(agent_id = %id, task_id = %task.id, "{}", reason);
                task.fail(reason.clone());
                panic_reason = Some(reason);
            }
            Err(join_error) => task.cancel(join_error.to_string()),
        }

        let max_history = self.max_history;
        let failed_transition = self.registry.update(id, |agent| {
            agent.archive_task(task.clone(), max_history);
            panic_reason.as_ref().map(|reason| {
                let from = agent.state();
                match agent.fail(reason.clone()) {
                    Ok(()) => Some(from),
                    Err(e) => {
                        warn!(agent_id = %id, "Could not move agent to ERROR: {}", e);
                        agent.last_error = Some(reason.clone());
                        None
                    }
                }
            })
        });

        if let Some(Some(Some(from))) = failed_transition {
            let reason = panic_reason.clone().unwrap_or_default();
            self.event_bus.publish_agent_event(AgentLifecycleEvent::AgentStateChanged {
                agent_id: id,
                from,
                to: AgentState::Error,
                changed_at: Utc::now(),
            });
            self.event_bus.publish_agent_event(AgentLifecycleEvent::AgentFailed {
                agent_id: id,
                reason,
                failed_at: Utc::now(),
            });
        }

        metrics::counter!(
            "swarmos_agent_tasks_total",
            "ability" => task.ability.clone(),
            "status" => task.status.as_str()
        )
        .increment(1);

        self.event_bus.publish_task_event(TaskEvent::TaskFinished {
            agent_id: id,
            task_id: task.id,
            ability: task.ability.clone(),
            status: task.status,
            finished_at: Utc::now(),
        });
        self.persistence.save(&self.registry).await;

        TaskResult::from(&task)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
