// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Differential Evolution, DE/rand/1/bin with greedy one-to-one selection.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::Rng;

use swarmos_core::domain::agent::AgentId;

use super::{best_index, keep_better, publish_best, solution};
use crate::domain::algorithm::{invalid, AlgorithmError, AlgorithmParams, AlgorithmType, OptimizationAlgorithm};
use crate::domain::problem::{ConfigurationError, Fitness, OptimizationProblem, SwarmSolution};

#[derive(Debug)]
pub struct DifferentialEvolution {
    population_size: usize,
    crossover_rate: f64,
    mutation_factor: f64,
    rng: StdRng,
    population: Vec<Vec<f64>>,
    fitness: Vec<Fitness>,
    global_best: Option<SwarmSolution>,
}

impl DifferentialEvolution {
    /// Defaults: population 30, crossover rate 0.9, mutation factor 0.8
    pub fn from_params(params: &AlgorithmParams) -> Result<Self, ConfigurationError> {
        let population_size = params.usize_or("population_size", 30)?;
        if population_size < 4 {
            return Err(invalid("population_size", "DE/rand/1 needs at least 4 individuals"));
        }
        let mutation_factor = params.f64_or("mutation_factor", 0.8)?;
        if !(0.0..=2.0).contains(&mutation_factor) {
            return Err(invalid("mutation_factor", "must be between 0 and 2"));
        }
        Ok(Self {
            population_size,
            crossover_rate: params.rate_or("crossover_rate", 0.9)?,
            mutation_factor,
            rng: params.rng()?,
            population: Vec::new(),
            fitness: Vec::new(),
            global_best: None,
        })
    }

    /// Three distinct indices, all different from `target`
    fn pick_donors(&mut self, target: usize) -> [usize; 3] {
        let picked = index::sample(&mut self.rng, self.population_size - 1, 3);
        let mut donors = [0usize; 3];
        for (slot, i) in donors.iter_mut().zip(picked.iter()) {
            *slot = if i >= target { i + 1 } else { i };
        }
        donors
    }
}

impl OptimizationAlgorithm for DifferentialEvolution {
    fn algorithm_type(&self) -> AlgorithmType {
        AlgorithmType::De
    }

    fn initialize(
        &mut self,
        problem: &OptimizationProblem,
        _members: &[AgentId],
    ) -> Result<Option<SwarmSolution>, AlgorithmError> {
        self.population = (0..self.population_size)
            .map(|_| problem.random_position(&mut self.rng))
            .collect();
        self.fitness = self.population.iter().map(|x| problem.evaluate(x)).collect();
        self.global_best = best_index(problem, &self.fitness).map(|i| {
            solution(AlgorithmType::De, self.population[i].clone(), self.fitness[i].clone(), 0)
        });
        Ok(self.global_best.clone())
    }

    fn step(
        &mut self,
        problem: &OptimizationProblem,
        _members: &[AgentId],
        iteration: u64,
        shared_data: &mut serde_json::Map<String, serde_json::Value>,
    ) -> Result<Option<SwarmSolution>, AlgorithmError> {
        if self.population.len() != self.population_size {
            return Err(AlgorithmError::NotInitialized);
        }

        let dims = problem.dimensions();
        let mut next_population = self.population.clone();
        let mut next_fitness = self.fitness.clone();

        for i in 0..self.population_size {
            let [a, b, c] = self.pick_donors(i);
            let forced = self.rng.random_range(0..dims);

            let mut trial = self.population[i].clone();
            for (j, gene) in trial.iter_mut().enumerate() {
                if j == forced || self.rng.random::<f64>() < self.crossover_rate {
                    *gene = self.population[a][j]
                        + self.mutation_factor * (self.population[b][j] - self.population[c][j]);
                }
            }
            problem.clamp(&mut trial);

            let trial_fitness = problem.evaluate(&trial);
            // Greedy selection; ties favour the trial to keep the population moving
            if !problem.is_better(&self.fitness[i], &trial_fitness) {
                next_population[i] = trial;
                next_fitness[i] = trial_fitness;
            }
        }

        self.population = next_population;
        self.fitness = next_fitness;

        if let Some(i) = best_index(problem, &self.fitness) {
            let candidate = solution(AlgorithmType::De, self.population[i].clone(), self.fitness[i].clone(), iteration);
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

    fn problem() -> OptimizationProblem {
        OptimizationProblem::new(
            3,
            vec![(-5.0, 5.0); 3],
            ObjectiveRegistry::with_builtins().resolve("sphere"),
            true,
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_tiny_population() {
        let params = AlgorithmParams::new().with("population_size", 3);
        assert!(DifferentialEvolution::from_params(&params).is_err());
    }

    #[test]
    fn test_donors_are_distinct() {
        let mut de = DifferentialEvolution::from_params(&AlgorithmParams::new().with("seed", 5).with("population_size", 4)).unwrap();
        for target in 0..4 {
            for _ in 0..50 {
                let [a, b, c] = de.pick_donors(target);
                assert!(a != b && b != c && a != c);
                assert!(a != target && b != target && c != target);
                assert!(a < 4 && b < 4 && c < 4);
            }
        }
    }

    #[test]
    fn test_improves_on_sphere() {
        let problem = problem();
        let mut de = DifferentialEvolution::from_params(&AlgorithmParams::new().with("seed", 17)).unwrap();
        let initial = de.initialize(&problem, &[]).unwrap().unwrap().fitness.scalar();
        let mut shared = serde_json::Map::new();
        let mut last = initial;
        for iteration in 1..=60 {
            let best = de.step(&problem, &[], iteration, &mut shared).unwrap().unwrap();
            assert!(best.fitness.scalar() <= last);
            last = best.fitness.scalar();
        }
        assert!(last < initial);
        assert!(shared.contains_key("global_best_fitness"));
    }
}
