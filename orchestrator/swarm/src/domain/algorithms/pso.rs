// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Particle Swarm Optimization.
//!
//! Each step runs in two passes: every particle moves against the global
//! best of the previous step, then the global best is recomputed from the
//! personal bests. Moving particles never see a global best updated mid-sweep,
//! so the result does not depend on particle order.

use rand::rngs::StdRng;
use rand::Rng;

use swarmos_core::domain::agent::AgentId;

use super::{keep_better, publish_best, solution};
use crate::domain::algorithm::{invalid, AlgorithmError, AlgorithmParams, AlgorithmType, OptimizationAlgorithm};
use crate::domain::problem::{ConfigurationError, Fitness, OptimizationProblem, SwarmSolution};

#[derive(Debug, Clone)]
struct Particle {
    position: Vec<f64>,
    velocity: Vec<f64>,
    best_position: Vec<f64>,
    best_fitness: Fitness,
}

#[derive(Debug)]
pub struct ParticleSwarm {
    num_particles: usize,
    inertia: f64,
    cognitive: f64,
    social: f64,
    max_velocity: Option<f64>,
    rng: StdRng,
    particles: Vec<Particle>,
    global_best: Option<SwarmSolution>,
}

impl ParticleSwarm {
    /// Defaults: 30 particles, inertia 0.7, cognitive and social 1.5
    pub fn from_params(params: &AlgorithmParams) -> Result<Self, ConfigurationError> {
        let num_particles = params.usize_or("num_particles", 30)?;
        if num_particles == 0 {
            return Err(invalid("num_particles", "must be at least 1"));
        }
        let max_velocity = params.opt_f64("max_velocity")?;
        if max_velocity.is_some_and(|v| v <= 0.0) {
            return Err(invalid("max_velocity", "must be positive"));
        }
        Ok(Self {
            num_particles,
            inertia: params.f64_or("inertia", 0.7)?,
            cognitive: params.f64_or("cognitive", 1.5)?,
            social: params.f64_or("social", 1.5)?,
            max_velocity,
            rng: params.rng()?,
            particles: Vec::new(),
            global_best: None,
        })
    }

    /// Current particle positions
    pub fn positions(&self) -> Vec<Vec<f64>> {
        self.particles.iter().map(|p| p.position.clone()).collect()
    }

    pub fn global_best(&self) -> Option<&SwarmSolution> {
        self.global_best.as_ref()
    }
}

impl OptimizationAlgorithm for ParticleSwarm {
    fn algorithm_type(&self) -> AlgorithmType {
        AlgorithmType::Pso
    }

    fn initialize(
        &mut self,
        problem: &OptimizationProblem,
        _members: &[AgentId],
    ) -> Result<Option<SwarmSolution>, AlgorithmError> {
        let dims = problem.dimensions();
        self.global_best = None;
        self.particles = (0..self.num_particles)
            .map(|_| {
                let position = problem.random_position(&mut self.rng);
                let fitness = problem.evaluate(&position);
                Particle {
                    velocity: vec![0.0; dims],
                    best_position: position.clone(),
                    best_fitness: fitness,
                    position,
                }
            })
            .collect();

        for particle in &self.particles {
            let candidate = solution(
                AlgorithmType::Pso,
                particle.best_position.clone(),
                particle.best_fitness.clone(),
                0,
            );
            keep_better(problem, &mut self.global_best, candidate);
        }
        Ok(self.global_best.clone())
    }

    fn step(
        &mut self,
        problem: &OptimizationProblem,
        _members: &[AgentId],
        iteration: u64,
        shared_data: &mut serde_json::Map<String, serde_json::Value>,
    ) -> Result<Option<SwarmSolution>, AlgorithmError> {
        let gbest = self
            .global_best
            .as_ref()
            .map(|b| b.position.clone())
            .ok_or(AlgorithmError::NotInitialized)?;

        // Pass 1: move every particle against the previous global best
        for particle in &mut self.particles {
            for d in 0..particle.position.len() {
                let r1: f64 = self.rng.random();
                let r2: f64 = self.rng.random();
                let x = particle.position[d];
                let mut v = self.inertia * particle.velocity[d]
                    + self.cognitive * r1 * (particle.best_position[d] - x)
                    + self.social * r2 * (gbest[d] - x);
                if let Some(vmax) = self.max_velocity {
                    v = v.clamp(-vmax, vmax);
                }
                particle.velocity[d] = v;
                particle.position[d] = x + v;
            }
            problem.clamp(&mut particle.position);

            let fitness = problem.evaluate(&particle.position);
            if problem.is_better(&fitness, &particle.best_fitness) {
                particle.best_position = particle.position.clone();
                particle.best_fitness = fitness;
            }
        }

        // Pass 2: recompute the global best from personal bests
        for particle in &self.particles {
            let candidate = solution(
                AlgorithmType::Pso,
                particle.best_position.clone(),
                particle.best_fitness.clone(),
                iteration,
            );
            keep_better(problem, &mut self.global_best, candidate);
        }

        publish_best(shared_data, self.global_best.as_ref());
        Ok(self.global_best.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::objective::ObjectiveRegistry;

    fn sphere(bounds: Vec<(f64, f64)>) -> OptimizationProblem {
        let dims = bounds.len();
        OptimizationProblem::new(dims, bounds, ObjectiveRegistry::with_builtins().resolve("sphere"), true)
            .unwrap()
    }

    fn pso(seed: u64) -> ParticleSwarm {
        ParticleSwarm::from_params(&AlgorithmParams::new().with("seed", seed).with("num_particles", 12)).unwrap()
    }

    #[test]
    fn test_initial_positions_within_bounds() {
        let problem = sphere(vec![(-5.0, 5.0), (0.0, 1.0), (10.0, 20.0)]);
        for seed in 0..10 {
            let mut algorithm = pso(seed);
            algorithm.initialize(&problem, &[]).unwrap();
            for position in algorithm.positions() {
                for (x, (low, high)) in position.iter().zip(problem.bounds()) {
                    assert!(x >= low && x <= high, "{} outside [{}, {}]", x, low, high);
                }
            }
        }
    }

    #[test]
    fn test_global_best_is_monotone() {
        let problem = sphere(vec![(-5.0, 5.0); 4]);
        let mut algorithm = pso(42);
        let mut shared = serde_json::Map::new();
        let mut previous = algorithm.initialize(&problem, &[]).unwrap().unwrap().fitness.scalar();

        for iteration in 1..=50 {
            let best = algorithm.step(&problem, &[], iteration, &mut shared).unwrap().unwrap();
            let current = best.fitness.scalar();
            assert!(current <= previous, "iteration {}: {} > {}", iteration, current, previous);
            assert_eq!(shared["global_best_fitness"], serde_json::json!(current));
            previous = current;
        }
    }

    #[test]
    fn test_positions_stay_clamped_with_large_coefficients() {
        let problem = sphere(vec![(-1.0, 1.0); 2]);
        let params = AlgorithmParams::new()
            .with("seed", 3)
            .with("inertia", 5.0)
            .with("social", 10.0);
        let mut algorithm = ParticleSwarm::from_params(&params).unwrap();
        algorithm.initialize(&problem, &[]).unwrap();
        let mut shared = serde_json::Map::new();
        for iteration in 1..=10 {
            algorithm.step(&problem, &[], iteration, &mut shared).unwrap();
            for position in algorithm.positions() {
                assert!(position.iter().all(|x| (-1.0..=1.0).contains(x)));
            }
        }
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let problem = sphere(vec![(-5.0, 5.0); 3]);
        let run = |seed| {
            let mut algorithm = pso(seed);
            algorithm.initialize(&problem, &[]).unwrap();
            let mut shared = serde_json::Map::new();
            let mut best = None;
            for iteration in 1..=5 {
                best = algorithm.step(&problem, &[], iteration, &mut shared).unwrap();
            }
            best.unwrap().position
        };
        assert_eq!(run(11), run(11));
    }

    #[test]
    fn test_step_before_initialize_fails() {
        let problem = sphere(vec![(-1.0, 1.0)]);
        let mut algorithm = pso(1);
        let mut shared = serde_json::Map::new();
        assert!(matches!(
            algorithm.step(&problem, &[], 1, &mut shared),
            Err(AlgorithmError::NotInitialized)
        ));
    }
}
