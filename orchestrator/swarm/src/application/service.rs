// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use swarmos_core::application::agent::AgentLifecycleService;
use swarmos_core::domain::agent::AgentId;
use swarmos_core::domain::events::SwarmEvent;
use swarmos_core::domain::node_config::SchedulerConfig;
use swarmos_core::domain::repository::{RestoreReport, Snapshot, SnapshotStore};
use swarmos_core::infrastructure::event_bus::{EventBus, EventBusError};

use super::scheduler;
use super::{SwarmError, SwarmService};
use crate::domain::algorithm::AlgorithmRegistry;
use crate::domain::objective::ObjectiveRegistry;
use crate::domain::swarm::{
    Swarm, SwarmConfig, SwarmFilter, SwarmId, SwarmRecord, SwarmStatus, SwarmStatusSnapshot, SwarmTask, SwarmTaskId,
};

/// Collaborators and settings for [`StandardSwarmService`]
#[derive(Clone)]
pub struct SwarmServiceConfig {
    pub scheduler: SchedulerConfig,
    pub objectives: Arc<ObjectiveRegistry>,
    pub algorithms: Arc<AlgorithmRegistry>,
    pub store: Option<Arc<dyn SnapshotStore>>,
}

impl Default for SwarmServiceConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            objectives: Arc::new(ObjectiveRegistry::with_builtins()),
            algorithms: Arc::new(AlgorithmRegistry::with_builtins()),
            store: None,
        }
    }
}

/// Handle on a live background run. Present in the registry exactly while
/// the run owns its swarm.
pub(crate) struct RunHandle {
    pub(crate) run_id: Uuid,
    pub(crate) cancel: CancellationToken,
    pub(crate) join: Option<JoinHandle<()>>,
}

#[derive(Default)]
pub(crate) struct RegistryState {
    pub(crate) swarms: HashMap<SwarmId, Swarm>,
    pub(crate) runs: HashMap<SwarmId, RunHandle>,
}

/// State shared between the service and its background runs
pub(crate) struct SwarmRuntime {
    pub(crate) state: Mutex<RegistryState>,
    pub(crate) event_bus: EventBus,
    pub(crate) scheduler: SchedulerConfig,
    pub(crate) objectives: Arc<ObjectiveRegistry>,
    pub(crate) algorithms: Arc<AlgorithmRegistry>,
    store: Option<Arc<dyn SnapshotStore>>,
    persist_lock: tokio::sync::Mutex<()>,
}

impl SwarmRuntime {
    /// Run `f` on the swarm if run `run_id` still owns it and it is RUNNING
    pub(crate) fn with_run<R>(
        &self,
        swarm_id: SwarmId,
        run_id: Uuid,
        f: impl FnOnce(&mut Swarm) -> R,
    ) -> Option<R> {
        let mut state = self.state.lock();
        let RegistryState { swarms, runs } = &mut *state;
        if runs.get(&swarm_id).map(|r| r.run_id) != Some(run_id) {
            return None;
        }
        swarms
            .get_mut(&swarm_id)
            .filter(|s| s.status() == SwarmStatus::Running)
            .map(f)
    }

    fn snapshot_entries(&self) -> BTreeMap<String, serde_json::Value> {
        let state = self.state.lock();
        state
            .swarms
            .values()
            .filter_map(|swarm| match serde_json::to_value(swarm.to_record()) {
                Ok(value) => Some((swarm.id.to_string(), value)),
                Err(e) => {
                    warn!(swarm_id = %swarm.id, "Failed to serialize swarm: {}", e);
                    None
                }
            })
            .collect()
    }

    /// Write the whole registry to the snapshot store. Failures are logged;
    /// the in-memory state stays authoritative.
    pub(crate) async fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let _guard = self.persist_lock.lock().await;
        let snapshot = Snapshot::new(self.snapshot_entries());
        if let Err(e) = store.save(&snapshot).await {
            warn!("Failed to persist swarm registry: {}", e);
        }
    }
}

pub struct StandardSwarmService {
    runtime: Arc<SwarmRuntime>,
    agents: Arc<dyn AgentLifecycleService>,
}

impl StandardSwarmService {
    pub fn new(agents: Arc<dyn AgentLifecycleService>, event_bus: EventBus, config: SwarmServiceConfig) -> Self {
        Self {
            runtime: Arc::new(SwarmRuntime {
                state: Mutex::new(RegistryState::default()),
                event_bus,
                scheduler: config.scheduler,
                objectives: config.objectives,
                algorithms: config.algorithms,
                store: config.store,
                persist_lock: tokio::sync::Mutex::new(()),
            }),
            agents,
        }
    }

    pub fn objectives(&self) -> &ObjectiveRegistry {
        &self.runtime.objectives
    }

    /// Wait until the swarm is no longer RUNNING and return its final state
    pub async fn wait_for_completion(&self, id: SwarmId) -> Result<Swarm, SwarmError> {
        let mut events = self.runtime.event_bus.subscribe_swarm(id.0);
        loop {
            let swarm = self
                .runtime
                .state
                .lock()
                .swarms
                .get(&id)
                .cloned()
                .ok_or(SwarmError::NotFound(id))?;
            if swarm.status() != SwarmStatus::Running {
                return Ok(swarm);
            }
            match events.recv().await {
                Ok(_) | Err(EventBusError::Lagged(_)) => continue,
                Err(_) => return Ok(swarm),
            }
        }
    }

    fn with_swarm<R>(&self, id: SwarmId, f: impl FnOnce(&mut Swarm) -> R) -> Result<R, SwarmError> {
        let mut state = self.runtime.state.lock();
        state.swarms.get_mut(&id).map(f).ok_or(SwarmError::NotFound(id))
    }

    fn invalid_state(swarm: &Swarm, reason: &str) -> SwarmError {
        SwarmError::InvalidState {
            id: swarm.id,
            status: swarm.status(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl SwarmService for StandardSwarmService {
    async fn create_swarm(&self, config: SwarmConfig) -> Result<Swarm, SwarmError> {
        config.validate()?;
        // Reject bad algorithm parameters now rather than on first start
        self.runtime
            .algorithms
            .create(config.algorithm_type, &config.algorithm_params)?;

        let swarm = Swarm::new(config);
        info!(
            swarm_id = %swarm.id,
            name = %swarm.name,
            algorithm = %swarm.config.algorithm_type,
            objective = %swarm.config.problem.objective().name(),
            "Swarm created"
        );
        self.runtime.state.lock().swarms.insert(swarm.id, swarm.clone());
        self.runtime.event_bus.publish_swarm_event(SwarmEvent::SwarmCreated {
            swarm_id: swarm.id.0,
            name: swarm.name.clone(),
            algorithm: swarm.config.algorithm_type.to_string(),
            created_at: swarm.created_at,
        });
        self.runtime.persist().await;
        Ok(swarm)
    }

    async fn get_swarm(&self, id: SwarmId) -> Option<Swarm> {
        self.runtime.state.lock().swarms.get(&id).cloned()
    }

    async fn list_swarms(&self, filter: SwarmFilter) -> Vec<Swarm> {
        let mut swarms: Vec<Swarm> = self
            .runtime
            .state
            .lock()
            .swarms
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        swarms.sort_by_key(|s| s.created_at);
        swarms
    }

    async fn start_swarm(&self, id: SwarmId) -> Result<(), SwarmError> {
        let (run_id, cancel, algorithm) = {
            let mut state = self.runtime.state.lock();
            let RegistryState { swarms, runs } = &mut *state;
            let swarm = swarms.get_mut(&id).ok_or(SwarmError::NotFound(id))?;

            match swarm.status() {
                SwarmStatus::Error => {
                    return Err(Self::invalid_state(swarm, "failed swarms must be reset before restarting"));
                }
                SwarmStatus::Running if runs.contains_key(&id) => {
                    debug!(swarm_id = %id, "Swarm already running");
                    return Ok(());
                }
                _ => {}
            }

            let algorithm = self
                .runtime
                .algorithms
                .create(swarm.config.algorithm_type, &swarm.config.algorithm_params)?;
            swarm.begin_run();

            let run_id = Uuid::new_v4();
            let cancel = CancellationToken::new();
            runs.insert(
                id,
                RunHandle {
                    run_id,
                    cancel: cancel.clone(),
                    join: None,
                },
            );
            (run_id, cancel, algorithm)
        };

        info!(swarm_id = %id, %run_id, "Swarm started");
        self.runtime.event_bus.publish_swarm_event(SwarmEvent::SwarmStarted {
            swarm_id: id.0,
            run_id,
            started_at: Utc::now(),
        });

        let join = tokio::spawn(scheduler::run_swarm(self.runtime.clone(), id, run_id, algorithm, cancel));
        {
            let mut state = self.runtime.state.lock();
            if let Some(run) = state.runs.get_mut(&id) {
                if run.run_id == run_id {
                    run.join = Some(join);
                }
            }
        }

        self.runtime.persist().await;
        Ok(())
    }

    async fn stop_swarm(&self, id: SwarmId) -> Result<(), SwarmError> {
        let run = {
            let mut state = self.runtime.state.lock();
            let RegistryState { swarms, runs } = &mut *state;
            let swarm = swarms.get_mut(&id).ok_or(SwarmError::NotFound(id))?;
            match swarm.status() {
                SwarmStatus::Error => {
                    return Err(Self::invalid_state(swarm, "failed swarms cannot be stopped"));
                }
                SwarmStatus::Running => {
                    swarm.set_status(SwarmStatus::Stopped);
                    runs.remove(&id)
                }
                _ => return Ok(()),
            }
        };

        if let Some(run) = run {
            run.cancel.cancel();
            if let Some(join) = run.join {
                if let Err(e) = join.await {
                    warn!(swarm_id = %id, "Swarm run did not exit cleanly: {}", e);
                }
            }
        }

        info!(swarm_id = %id, "Swarm stopped");
        self.runtime.persist().await;
        Ok(())
    }

    async fn add_agent(&self, swarm_id: SwarmId, agent_id: AgentId) -> Result<(), SwarmError> {
        if !self.runtime.state.lock().swarms.contains_key(&swarm_id) {
            return Err(SwarmError::NotFound(swarm_id));
        }
        if !self.agents.agent_exists(agent_id).await {
            return Err(SwarmError::AgentNotFound(agent_id));
        }

        let added = self.with_swarm(swarm_id, |swarm| swarm.add_member(agent_id))?;
        if added {
            debug!(%swarm_id, %agent_id, "Agent joined swarm");
            self.runtime.event_bus.publish_swarm_event(SwarmEvent::MembershipChanged {
                swarm_id: swarm_id.0,
                agent_id,
                joined: true,
                changed_at: Utc::now(),
            });
            self.runtime.persist().await;
        }
        Ok(())
    }

    async fn remove_agent(&self, swarm_id: SwarmId, agent_id: AgentId) -> Result<(), SwarmError> {
        let removed = self.with_swarm(swarm_id, |swarm| swarm.remove_member(agent_id))?;
        if removed {
            debug!(%swarm_id, %agent_id, "Agent left swarm");
            self.runtime.event_bus.publish_swarm_event(SwarmEvent::MembershipChanged {
                swarm_id: swarm_id.0,
                agent_id,
                joined: false,
                changed_at: Utc::now(),
            });
            self.runtime.persist().await;
        }
        Ok(())
    }

    async fn get_shared_state(&self, id: SwarmId, key: Option<String>) -> Result<serde_json::Value, SwarmError> {
        self.with_swarm(id, |swarm| match key {
            Some(key) => swarm.shared_data.get(&key).cloned().unwrap_or(serde_json::Value::Null),
            None => serde_json::Value::Object(swarm.shared_data.clone()),
        })
    }

    async fn update_shared_state(&self, id: SwarmId, key: String, value: serde_json::Value) -> Result<(), SwarmError> {
        self.with_swarm(id, |swarm| {
            swarm.shared_data.insert(key, value);
            swarm.touch();
        })?;
        self.runtime.persist().await;
        Ok(())
    }

    async fn get_status(&self, id: SwarmId) -> Result<SwarmStatusSnapshot, SwarmError> {
        let state = self.runtime.state.lock();
        let loop_active = state.runs.contains_key(&id);
        state
            .swarms
            .get(&id)
            .map(|swarm| swarm.status_snapshot(loop_active))
            .ok_or(SwarmError::NotFound(id))
    }

    async fn allocate_task(&self, id: SwarmId, payload: serde_json::Value) -> Result<SwarmTaskId, SwarmError> {
        let task_id = self.with_swarm(id, |swarm| swarm.allocate_task(payload))?;
        debug!(swarm_id = %id, %task_id, "Swarm task allocated");
        self.runtime.persist().await;
        Ok(task_id)
    }

    async fn claim_task(&self, id: SwarmId, task_id: SwarmTaskId, agent_id: AgentId) -> Result<SwarmTask, SwarmError> {
        let task = self.with_swarm(id, |swarm| swarm.claim_task(task_id, agent_id))??;
        self.runtime.persist().await;
        Ok(task)
    }

    async fn complete_task(
        &self,
        id: SwarmId,
        task_id: SwarmTaskId,
        agent_id: AgentId,
        result: serde_json::Value,
    ) -> Result<(), SwarmError> {
        self.with_swarm(id, |swarm| swarm.complete_task(task_id, agent_id, result))??;
        self.runtime.persist().await;
        Ok(())
    }

    async fn restore(&self) -> Result<RestoreReport, SwarmError> {
        let Some(store) = &self.runtime.store else {
            return Ok(RestoreReport::default());
        };

        let snapshot = store.load().await?;
        let mut report = RestoreReport::default();
        let mut decoded = Vec::with_capacity(snapshot.entries.len());
        for (key, value) in snapshot.entries {
            let swarm = serde_json::from_value::<SwarmRecord>(value)
                .map_err(|e| e.to_string())
                .and_then(|record| Swarm::from_record(record, &self.runtime.objectives).map_err(|e| e.to_string()));
            match swarm {
                Ok(mut swarm) => {
                    if swarm.status() == SwarmStatus::Running {
                        info!(swarm_id = %swarm.id, "Restored RUNNING swarm has no live run, marking STOPPED");
                        swarm.set_status(SwarmStatus::Stopped);
                    }
                    decoded.push(swarm);
                }
                Err(e) => {
                    warn!(entry = %key, "Skipping undecodable swarm snapshot entry: {}", e);
                    report.skipped += 1;
                }
            }
        }

        {
            let mut state = self.runtime.state.lock();
            for swarm in decoded {
                if state.runs.contains_key(&swarm.id) {
                    warn!(swarm_id = %swarm.id, "Not replacing a swarm with a live run");
                    report.skipped += 1;
                    continue;
                }
                state.swarms.insert(swarm.id, swarm);
                report.restored += 1;
            }
        }

        info!(restored = report.restored, skipped = report.skipped, "Swarm registry restored");
        Ok(report)
    }

    async fn shutdown(&self) {
        let runs: Vec<(SwarmId, RunHandle)> = {
            let mut state = self.runtime.state.lock();
            let RegistryState { swarms, runs } = &mut *state;
            for id in runs.keys() {
                if let Some(swarm) = swarms.get_mut(id) {
                    if swarm.status() == SwarmStatus::Running {
                        swarm.set_status(SwarmStatus::Stopped);
                    }
                }
            }
            runs.drain().collect()
        };

        for (_, run) in &runs {
            run.cancel.cancel();
        }
        for (id, run) in runs {
            if let Some(join) = run.join {
                if let Err(e) = join.await {
                    warn!(swarm_id = %id, "Swarm run did not exit cleanly: {}", e);
                }
            }
        }

        info!("Swarm service shut down");
        self.runtime.persist().await;
    }
}
