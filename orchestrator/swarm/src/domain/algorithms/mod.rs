// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod de;
pub mod ga;
pub mod mock;
pub mod pso;

pub use de::DifferentialEvolution;
pub use ga::GeneticAlgorithm;
pub use mock::MockAlgorithm;
pub use pso::ParticleSwarm;

use crate::domain::algorithm::{AlgorithmType, GLOBAL_BEST_FITNESS_KEY};
use crate::domain::problem::{Fitness, OptimizationProblem, SwarmSolution};

/// Index of the best fitness in `fitness`; `None` for an empty slice
pub(crate) fn best_index(problem: &OptimizationProblem, fitness: &[Fitness]) -> Option<usize> {
    fitness
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| problem.compare(a, b))
        .map(|(i, _)| i)
}

/// Replace `global` with `candidate` when strictly better
pub(crate) fn keep_better(
    problem: &OptimizationProblem,
    global: &mut Option<SwarmSolution>,
    candidate: SwarmSolution,
) {
    let improves = global
        .as_ref()
        .is_none_or(|current| problem.is_better(&candidate.fitness, &current.fitness));
    if improves {
        *global = Some(candidate);
    }
}

pub(crate) fn solution(
    algorithm: AlgorithmType,
    position: Vec<f64>,
    fitness: Fitness,
    iteration: u64,
) -> SwarmSolution {
    SwarmSolution::new(position, fitness)
        .with_metadata("algorithm", algorithm.as_str())
        .with_metadata("iteration", iteration)
}

pub(crate) fn publish_best(
    shared_data: &mut serde_json::Map<String, serde_json::Value>,
    best: Option<&SwarmSolution>,
) {
    if let Some(best) = best {
        shared_data.insert(
            GLOBAL_BEST_FITNESS_KEY.to_string(),
            serde_json::Value::from(best.fitness.scalar()),
        );
    }
}
