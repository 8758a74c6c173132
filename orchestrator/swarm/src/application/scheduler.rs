// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Swarm Scheduler - one background task per running swarm
//
// The loop suspends only at the inter-iteration delay. A step always runs to
// completion before the stop signal is observed, so stopping takes at most
// one step. Errors and panics end the run with ERROR and never escape the
// task.

use chrono::Utc;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use swarmos_core::domain::events::SwarmEvent;

use super::service::SwarmRuntime;
use crate::domain::algorithm::OptimizationAlgorithm;
use crate::domain::swarm::{SwarmId, SwarmStatus};

#[derive(Debug)]
enum RunOutcome {
    Completed,
    Stopped,
    Failed(String),
}

pub(crate) async fn run_swarm(
    runtime: Arc<SwarmRuntime>,
    swarm_id: SwarmId,
    run_id: Uuid,
    mut algorithm: Box<dyn OptimizationAlgorithm>,
    cancel: CancellationToken,
) {
    let outcome = AssertUnwindSafe(drive(&runtime, swarm_id, run_id, algorithm.as_mut(), &cancel))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| RunOutcome::Failed(format!("algorithm panicked: {}", panic_message(panic))));

    // The algorithm instance lives exactly as long as the run
    drop(algorithm);
    finalize(&runtime, swarm_id, run_id, outcome).await;
}

async fn drive(
    runtime: &SwarmRuntime,
    swarm_id: SwarmId,
    run_id: Uuid,
    algorithm: &mut dyn OptimizationAlgorithm,
    cancel: &CancellationToken,
) -> RunOutcome {
    let Some((config, members)) =
        runtime.with_run(swarm_id, run_id, |s| (s.config.clone(), s.members().to_vec()))
    else {
        return RunOutcome::Stopped;
    };
    let problem = &config.problem;
    let algorithm_label = config.algorithm_type.as_str();
    let delay = Duration::from_millis(runtime.scheduler.iteration_delay_ms);

    let initial = match algorithm.initialize(problem, &members) {
        Ok(initial) => initial,
        Err(e) => return RunOutcome::Failed(format!("initialize failed: {}", e)),
    };
    if let Some(solution) = initial {
        let improved = runtime
            .with_run(swarm_id, run_id, |s| s.offer_solution(solution))
            .unwrap_or(false);
        if improved {
            publish_improvement(runtime, swarm_id, 0).await;
        }
    }

    loop {
        if cancel.is_cancelled() {
            return RunOutcome::Stopped;
        }

        let Some((members, shared_before, iteration)) = runtime.with_run(swarm_id, run_id, |s| {
            (s.members().to_vec(), s.shared_data.clone(), s.current_iteration + 1)
        }) else {
            return RunOutcome::Stopped;
        };

        let mut shared = shared_before.clone();
        let candidate = match algorithm.step(problem, &members, iteration, &mut shared) {
            Ok(candidate) => candidate,
            Err(e) => return RunOutcome::Failed(format!("step {} failed: {}", iteration, e)),
        };
        metrics::counter!("swarmos_swarm_iterations_total", "algorithm" => algorithm_label).increment(1);

        let committed = runtime.with_run(swarm_id, run_id, |s| {
            s.current_iteration = iteration;
            // Only keys the algorithm changed; concurrent external writes survive
            for (key, value) in shared {
                if shared_before.get(&key) != Some(&value) {
                    s.shared_data.insert(key, value);
                }
            }
            let improved = candidate.is_some_and(|c| s.offer_solution(c));
            s.touch();
            (improved, s.best_solution().cloned())
        });
        let Some((improved, best)) = committed else {
            return RunOutcome::Stopped;
        };

        if improved {
            publish_improvement(runtime, swarm_id, iteration).await;
        }

        if algorithm.should_terminate(
            iteration,
            config.max_iterations,
            best.as_ref(),
            config.target_fitness,
            problem,
        ) {
            return RunOutcome::Completed;
        }

        tokio::select! {
            _ = cancel.cancelled() => return RunOutcome::Stopped,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

async fn publish_improvement(runtime: &SwarmRuntime, swarm_id: SwarmId, iteration: u64) {
    let fitness = {
        let state = runtime.state.lock();
        state
            .swarms
            .get(&swarm_id)
            .and_then(|s| s.best_solution().map(|b| b.fitness.scalar()))
    };
    let Some(fitness) = fitness else {
        return;
    };

    debug!(%swarm_id, iteration, fitness, "Best solution improved");
    runtime.event_bus.publish_swarm_event(SwarmEvent::BestSolutionImproved {
        swarm_id: swarm_id.0,
        iteration,
        fitness,
        improved_at: Utc::now(),
    });
    if runtime.scheduler.persist_on_improvement {
        runtime.persist().await;
    }
}

async fn finalize(runtime: &SwarmRuntime, swarm_id: SwarmId, run_id: Uuid, outcome: RunOutcome) {
    let finished = {
        let mut state = runtime.state.lock();
        // A newer run owns the swarm; leave it alone
        if state.runs.get(&swarm_id).is_some_and(|r| r.run_id != run_id) {
            None
        } else {
            state.runs.remove(&swarm_id);
            state.swarms.get_mut(&swarm_id).map(|swarm| {
                match (&outcome, swarm.status()) {
                    (RunOutcome::Completed, SwarmStatus::Running) => swarm.set_status(SwarmStatus::Completed),
                    (RunOutcome::Stopped, SwarmStatus::Running) => swarm.set_status(SwarmStatus::Stopped),
                    (RunOutcome::Failed(reason), status) => {
                        if status == SwarmStatus::Running {
                            swarm.set_status(SwarmStatus::Error);
                        }
                        swarm.last_error = Some(reason.clone());
                        swarm.touch();
                    }
                    _ => swarm.touch(),
                }
                (
                    swarm.status(),
                    swarm.current_iteration,
                    swarm.best_solution().map(|b| b.fitness.scalar()),
                    swarm.last_error.clone(),
                )
            })
        }
    };

    let Some((status, iterations, best_fitness, last_error)) = finished else {
        debug!(%swarm_id, %run_id, "Superseded run exited");
        return;
    };

    match &outcome {
        RunOutcome::Failed(reason) => error!(%swarm_id, %run_id, iterations, "Swarm run failed: {}", reason),
        _ => info!(%swarm_id, %run_id, %status, iterations, ?best_fitness, "Swarm run finished"),
    }
    metrics::counter!("swarmos_swarm_runs_total", "outcome" => status.as_str().to_ascii_lowercase()).increment(1);

    runtime.event_bus.publish_swarm_event(SwarmEvent::SwarmFinished {
        swarm_id: swarm_id.0,
        run_id,
        status: status.to_string(),
        iterations,
        best_fitness,
        error: last_error,
        finished_at: Utc::now(),
    });
    runtime.persist().await;
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        warn!("Swarm run panicked with a non-string payload");
        "unknown panic".to_string()
    }
}
