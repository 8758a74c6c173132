// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for the swarm service and its background runs.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use swarmos_core::application::abilities::builtin_abilities;
use swarmos_core::application::{AgentLifecycleService, StandardAgentLifecycleService};
use swarmos_core::domain::agent::{AgentConfig, AgentId, AgentType};
use swarmos_core::domain::events::SwarmEvent;
use swarmos_core::domain::node_config::SchedulerConfig;
use swarmos_core::domain::repository::SnapshotStore;
use swarmos_core::infrastructure::llm::LlmProviderRegistry;
use swarmos_core::infrastructure::{EventBus, InMemorySnapshotStore, JsonFileSnapshotStore};
use swarmos_swarm::application::{StandardSwarmService, SwarmError, SwarmService, SwarmServiceConfig};
use swarmos_swarm::domain::algorithm::GLOBAL_BEST_FITNESS_KEY;
use swarmos_swarm::{
    AlgorithmError, AlgorithmParams, AlgorithmRegistry, AlgorithmType, ObjectiveRegistry, OptimizationAlgorithm,
    OptimizationProblem, Swarm, SwarmConfig, SwarmFilter, SwarmId, SwarmSolution, SwarmStatus,
};

/// Steps normally until iteration 2, then panics
struct PanickingAlgorithm;

impl OptimizationAlgorithm for PanickingAlgorithm {
    fn algorithm_type(&self) -> AlgorithmType {
        AlgorithmType::Mock
    }

    fn initialize(
        &mut self,
        _problem: &OptimizationProblem,
        _members: &[AgentId],
    ) -> Result<Option<SwarmSolution>, AlgorithmError> {
        Ok(None)
    }

    fn step(
        &mut self,
        _problem: &OptimizationProblem,
        _members: &[AgentId],
        iteration: u64,
        _shared_data: &mut serde_json::Map<String, serde_json::Value>,
    ) -> Result<Option<SwarmSolution>, AlgorithmError> {
        if iteration >= 2 {
            panic!("step blew up at iteration {}", iteration);
        }
        Ok(None)
    }
}

struct Harness {
    agents: Arc<StandardAgentLifecycleService>,
    swarms: StandardSwarmService,
    event_bus: EventBus,
}

fn harness_with_store(store: Option<Arc<dyn SnapshotStore>>) -> Harness {
    harness_with(store, Arc::new(AlgorithmRegistry::with_builtins()))
}

fn harness_with(store: Option<Arc<dyn SnapshotStore>>, algorithms: Arc<AlgorithmRegistry>) -> Harness {
    let event_bus = EventBus::new(1024);
    let agents = Arc::new(StandardAgentLifecycleService::new(
        builtin_abilities(Arc::new(LlmProviderRegistry::new())),
        event_bus.clone(),
    ));
    let swarms = StandardSwarmService::new(
        agents.clone(),
        event_bus.clone(),
        SwarmServiceConfig {
            scheduler: SchedulerConfig {
                iteration_delay_ms: 1,
                ..SchedulerConfig::default()
            },
            store,
            algorithms,
            ..SwarmServiceConfig::default()
        },
    );
    Harness {
        agents,
        swarms,
        event_bus,
    }
}

fn harness() -> Harness {
    harness_with_store(None)
}

fn sphere(dimensions: usize, low: f64, high: f64) -> OptimizationProblem {
    let objectives = ObjectiveRegistry::with_builtins();
    OptimizationProblem::new(dimensions, vec![(low, high); dimensions], objectives.resolve("sphere"), true).unwrap()
}

fn mock_config(name: &str, max_iterations: u64, params: AlgorithmParams) -> SwarmConfig {
    SwarmConfig::new(name, AlgorithmType::Mock, sphere(1, -4.0, 4.0), max_iterations).with_params(params)
}

async fn wait(h: &Harness, id: SwarmId) -> Swarm {
    tokio::time::timeout(Duration::from_secs(10), h.swarms.wait_for_completion(id))
        .await
        .expect("swarm run did not finish in time")
        .unwrap()
}

async fn agent(h: &Harness, name: &str) -> AgentId {
    h.agents
        .create_agent(AgentConfig::new(name, AgentType::Custom).with_ability("ping"))
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn test_pso_minimizes_sphere() {
    let h = harness();
    let mut events = h.event_bus.subscribe();
    let config = SwarmConfig::new("pso-sphere", AlgorithmType::Pso, sphere(2, -5.0, 5.0), 50)
        .with_params(AlgorithmParams::new().with("seed", 42).with("num_particles", 20));
    let swarm = h.swarms.create_swarm(config).await.unwrap();
    assert_eq!(swarm.status(), SwarmStatus::Created);

    h.swarms.start_swarm(swarm.id).await.unwrap();
    let finished = wait(&h, swarm.id).await;

    assert_eq!(finished.status(), SwarmStatus::Completed);
    assert_eq!(finished.current_iteration, 50);
    let best = finished.best_solution().unwrap().fitness.scalar();
    assert!(best.is_finite());
    assert!(best >= 0.0);
    assert!(best < 50.0, "best {} is no better than a corner of the box", best);

    // The first improvement is the initial population's best
    let mut initial_best = None;
    while let Ok(event) = events.try_recv() {
        if let swarmos_core::infrastructure::DomainEvent::Swarm(SwarmEvent::BestSolutionImproved {
            iteration: 0,
            fitness,
            ..
        }) = event
        {
            initial_best = Some(fitness);
        }
    }
    assert!(best <= initial_best.expect("initial best was published"));

    let status = h.swarms.get_status(swarm.id).await.unwrap();
    assert!(!status.loop_active);
    assert_eq!(status.best_fitness, Some(best));
}

#[tokio::test]
async fn test_target_fitness_stops_early() {
    let h = harness();
    let swarm = h
        .swarms
        .create_swarm(mock_config("target", 100, AlgorithmParams::new()).with_target(0.01))
        .await
        .unwrap();

    h.swarms.start_swarm(swarm.id).await.unwrap();
    let finished = wait(&h, swarm.id).await;

    assert_eq!(finished.status(), SwarmStatus::Completed);
    // 16 * 0.25^k drops to 0.01 or below first at k = 6
    assert_eq!(finished.current_iteration, 6);
    assert!(finished.best_solution().unwrap().fitness.scalar() <= 0.01);
}

#[tokio::test]
async fn test_pso_stops_once_exact_optimum_is_found() {
    let h = harness();
    let mut events = h.event_bus.subscribe();
    let config = SwarmConfig::new("pso-exact", AlgorithmType::Pso, sphere(2, -5.0, 5.0), 300)
        .with_params(AlgorithmParams::new().with("seed", 7).with("num_particles", 20))
        .with_target(0.0);
    let swarm = h.swarms.create_swarm(config).await.unwrap();

    h.swarms.start_swarm(swarm.id).await.unwrap();
    let finished = wait(&h, swarm.id).await;
    assert_eq!(finished.status(), SwarmStatus::Completed);
    let best = finished.best_solution().unwrap().fitness.scalar();

    let mut first_at_target = None;
    while let Ok(event) = events.try_recv() {
        if let swarmos_core::infrastructure::DomainEvent::Swarm(SwarmEvent::BestSolutionImproved {
            swarm_id,
            iteration,
            fitness,
            ..
        }) = event
        {
            if swarm_id == swarm.id.0 && fitness <= 0.0 && first_at_target.is_none() {
                first_at_target = Some(iteration);
            }
        }
    }

    // Sphere only reaches 0.0 once coordinates underflow, so either outcome
    // is legitimate; the run must stop exactly when the target is met
    match first_at_target {
        Some(iteration) => {
            assert!(best <= 0.0);
            assert!(iteration <= 300);
            assert_eq!(finished.current_iteration, iteration);
        }
        None => {
            assert!(best > 0.0);
            assert_eq!(finished.current_iteration, 300);
        }
    }
}

#[tokio::test]
async fn test_stop_is_idempotent_and_restart_resets_iteration() {
    let h = harness();
    let swarm = h
        .swarms
        .create_swarm(mock_config("long", 1_000_000, AlgorithmParams::new()))
        .await
        .unwrap();

    // Stopping a swarm that never ran is a no-op
    h.swarms.stop_swarm(swarm.id).await.unwrap();
    assert_eq!(h.swarms.get_swarm(swarm.id).await.unwrap().status(), SwarmStatus::Created);

    h.swarms.start_swarm(swarm.id).await.unwrap();
    // Starting a live run again does nothing
    h.swarms.start_swarm(swarm.id).await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    h.swarms.stop_swarm(swarm.id).await.unwrap();
    let stopped = h.swarms.get_swarm(swarm.id).await.unwrap();
    assert_eq!(stopped.status(), SwarmStatus::Stopped);
    assert!(stopped.current_iteration > 0);
    assert!(!h.swarms.get_status(swarm.id).await.unwrap().loop_active);
    let frozen = stopped.current_iteration;

    h.swarms.stop_swarm(swarm.id).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(h.swarms.get_swarm(swarm.id).await.unwrap().current_iteration, frozen);

    h.swarms.start_swarm(swarm.id).await.unwrap();
    let restarted = h.swarms.get_swarm(swarm.id).await.unwrap();
    assert_eq!(restarted.status(), SwarmStatus::Running);
    assert!(restarted.best_solution().is_some(), "best solution survives a restart");

    h.swarms.shutdown().await;
    assert_eq!(h.swarms.get_swarm(swarm.id).await.unwrap().status(), SwarmStatus::Stopped);
}

#[tokio::test]
async fn test_algorithm_error_is_sticky() {
    let h = harness();
    let swarm = h
        .swarms
        .create_swarm(mock_config("faulty", 10, AlgorithmParams::new().with("fail_at_iteration", 3)))
        .await
        .unwrap();

    h.swarms.start_swarm(swarm.id).await.unwrap();
    let failed = wait(&h, swarm.id).await;

    assert_eq!(failed.status(), SwarmStatus::Error);
    assert_eq!(failed.current_iteration, 2);
    assert!(failed.last_error.as_deref().unwrap().contains("mock failure"));

    assert!(matches!(
        h.swarms.start_swarm(swarm.id).await,
        Err(SwarmError::InvalidState { status: SwarmStatus::Error, .. })
    ));
    assert!(matches!(
        h.swarms.stop_swarm(swarm.id).await,
        Err(SwarmError::InvalidState { .. })
    ));
}

#[tokio::test]
async fn test_algorithm_panic_fails_the_run() {
    let mut algorithms = AlgorithmRegistry::with_builtins();
    algorithms.register(AlgorithmType::Mock, |_| Ok(Box::new(PanickingAlgorithm)));
    let h = harness_with(None, Arc::new(algorithms));
    let swarm = h
        .swarms
        .create_swarm(mock_config("panicky", 10, AlgorithmParams::new()))
        .await
        .unwrap();

    h.swarms.start_swarm(swarm.id).await.unwrap();
    let failed = wait(&h, swarm.id).await;

    assert_eq!(failed.status(), SwarmStatus::Error);
    assert!(failed.last_error.as_deref().unwrap().contains("panicked"));
    assert!(!h.swarms.get_status(swarm.id).await.unwrap().loop_active);
}

#[tokio::test]
async fn test_invalid_configuration_is_rejected() {
    let h = harness();
    let config = SwarmConfig::new("tiny-de", AlgorithmType::De, sphere(2, -1.0, 1.0), 10)
        .with_params(AlgorithmParams::new().with("population_size", 2));
    assert!(matches!(
        h.swarms.create_swarm(config).await,
        Err(SwarmError::Configuration(_))
    ));

    let zero = SwarmConfig::new("zero", AlgorithmType::Pso, sphere(2, -1.0, 1.0), 0);
    assert!(matches!(h.swarms.create_swarm(zero).await, Err(SwarmError::Configuration(_))));
    assert!(h.swarms.list_swarms(SwarmFilter::default()).await.is_empty());
}

#[tokio::test]
async fn test_membership_requires_existing_agents() {
    let h = harness();
    let swarm = h
        .swarms
        .create_swarm(mock_config("members", 5, AlgorithmParams::new()))
        .await
        .unwrap();
    let worker = agent(&h, "worker").await;

    let ghost = AgentId::new();
    assert!(matches!(
        h.swarms.add_agent(swarm.id, ghost).await,
        Err(SwarmError::AgentNotFound(id)) if id == ghost
    ));
    assert!(h.swarms.get_swarm(swarm.id).await.unwrap().members().is_empty());

    h.swarms.add_agent(swarm.id, worker).await.unwrap();
    h.swarms.add_agent(swarm.id, worker).await.unwrap();
    assert_eq!(h.swarms.get_swarm(swarm.id).await.unwrap().members(), &[worker]);
    assert_eq!(h.swarms.get_status(swarm.id).await.unwrap().member_count, 1);

    h.swarms.remove_agent(swarm.id, worker).await.unwrap();
    h.swarms.remove_agent(swarm.id, worker).await.unwrap();
    assert!(h.swarms.get_swarm(swarm.id).await.unwrap().members().is_empty());

    assert!(matches!(
        h.swarms.add_agent(SwarmId::new(), worker).await,
        Err(SwarmError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_task_board_through_service() {
    let h = harness();
    let swarm = h
        .swarms
        .create_swarm(mock_config("board", 5, AlgorithmParams::new()))
        .await
        .unwrap();
    let member = agent(&h, "member").await;
    let outsider = agent(&h, "outsider").await;
    h.swarms.add_agent(swarm.id, member).await.unwrap();

    let task_id = h.swarms.allocate_task(swarm.id, json!({"region": 3})).await.unwrap();
    assert_eq!(h.swarms.get_status(swarm.id).await.unwrap().pending_tasks, 1);

    assert!(matches!(
        h.swarms.claim_task(swarm.id, task_id, outsider).await,
        Err(SwarmError::TaskConflict(_))
    ));

    let claimed = h.swarms.claim_task(swarm.id, task_id, member).await.unwrap();
    assert_eq!(claimed.payload, json!({"region": 3}));
    assert_eq!(h.swarms.get_status(swarm.id).await.unwrap().pending_tasks, 0);

    assert!(matches!(
        h.swarms.claim_task(swarm.id, task_id, member).await,
        Err(SwarmError::TaskConflict(_))
    ));
    assert!(matches!(
        h.swarms.complete_task(swarm.id, task_id, outsider, json!(null)).await,
        Err(SwarmError::TaskConflict(_))
    ));
    h.swarms
        .complete_task(swarm.id, task_id, member, json!({"fitness": 0.5}))
        .await
        .unwrap();

    let unknown = swarmos_swarm::SwarmTaskId::new();
    assert!(matches!(
        h.swarms.claim_task(swarm.id, unknown, member).await,
        Err(SwarmError::TaskNotFound(_))
    ));
}

#[tokio::test]
async fn test_shared_state_survives_runs() {
    let h = harness();
    let swarm = h
        .swarms
        .create_swarm(mock_config("shared", 20, AlgorithmParams::new()))
        .await
        .unwrap();

    assert_eq!(
        h.swarms.get_shared_state(swarm.id, Some("missing".into())).await.unwrap(),
        json!(null)
    );
    h.swarms
        .update_shared_state(swarm.id, "note".into(), json!("keep me"))
        .await
        .unwrap();

    h.swarms.start_swarm(swarm.id).await.unwrap();
    wait(&h, swarm.id).await;

    let all = h.swarms.get_shared_state(swarm.id, None).await.unwrap();
    assert_eq!(all["note"], json!("keep me"));
    assert!(all[GLOBAL_BEST_FITNESS_KEY].is_number());
}

#[tokio::test]
async fn test_list_filters() {
    let h = harness();
    let a = h
        .swarms
        .create_swarm(mock_config("a", 3, AlgorithmParams::new()))
        .await
        .unwrap();
    h.swarms
        .create_swarm(SwarmConfig::new("b", AlgorithmType::Ga, sphere(2, -1.0, 1.0), 3))
        .await
        .unwrap();

    h.swarms.start_swarm(a.id).await.unwrap();
    wait(&h, a.id).await;

    assert_eq!(h.swarms.list_swarms(SwarmFilter::default()).await.len(), 2);
    let completed = h
        .swarms
        .list_swarms(SwarmFilter {
            status: Some(SwarmStatus::Completed),
            ..SwarmFilter::default()
        })
        .await;
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].id, a.id);

    let ga = h
        .swarms
        .list_swarms(SwarmFilter {
            algorithm: Some(AlgorithmType::Ga),
            ..SwarmFilter::default()
        })
        .await;
    assert_eq!(ga.len(), 1);
    assert_eq!(ga[0].name, "b");
}

#[tokio::test]
async fn test_finished_runs_are_persisted() {
    let store = Arc::new(InMemorySnapshotStore::new());
    let h = harness_with_store(Some(store.clone()));
    let swarm = h
        .swarms
        .create_swarm(mock_config("persisted", 4, AlgorithmParams::new()))
        .await
        .unwrap();
    h.swarms.start_swarm(swarm.id).await.unwrap();
    wait(&h, swarm.id).await;
    // Let finalize finish its write
    tokio::time::sleep(Duration::from_millis(20)).await;

    let snapshot = store.load().await.unwrap();
    let entry = &snapshot.entries[&swarm.id.to_string()];
    assert_eq!(entry["status"], json!("COMPLETED"));
    assert_eq!(entry["current_iteration"], json!(4));
}

#[tokio::test]
async fn test_restore_skips_corrupt_entries_and_stops_running_swarms() {
    let dir = tempfile::tempdir().unwrap();
    let live_store = Arc::new(InMemorySnapshotStore::new());

    let original = harness_with_store(Some(live_store.clone()));
    let worker = agent(&original, "worker").await;
    let swarm = original
        .swarms
        .create_swarm(mock_config("durable", 1_000_000, AlgorithmParams::new()))
        .await
        .unwrap();
    original.swarms.add_agent(swarm.id, worker).await.unwrap();
    original.swarms.start_swarm(swarm.id).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Capture the registry as a crash would leave it
    let mut snapshot = live_store.load().await.unwrap();
    original.swarms.shutdown().await;
    assert_eq!(snapshot.entries[&swarm.id.to_string()]["status"], json!("RUNNING"));
    snapshot.entries.insert("garbage".into(), json!({"name": 7}));

    let file_store = Arc::new(JsonFileSnapshotStore::new(dir.path().join("swarms.json")));
    file_store.save(&snapshot).await.unwrap();

    let restarted = harness_with_store(Some(file_store));
    let report = restarted.swarms.restore().await.unwrap();
    assert_eq!(report.restored, 1);
    assert_eq!(report.skipped, 1);

    let restored = restarted.swarms.get_swarm(swarm.id).await.unwrap();
    assert_eq!(restored.status(), SwarmStatus::Stopped);
    assert_eq!(restored.name, "durable");
    assert_eq!(restored.members(), &[worker]);
    assert!(restored.best_solution().is_some());
    assert!(!restarted.swarms.get_status(swarm.id).await.unwrap().loop_active);
}
