// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Real-coded genetic algorithm: tournament selection, arithmetic crossover,
//! uniform-reset mutation and elitism.

use rand::rngs::StdRng;
use rand::Rng;

use swarmos_core::domain::agent::AgentId;

use super::{best_index, keep_better, publish_best, solution};
use crate::domain::algorithm::{invalid, AlgorithmError, AlgorithmParams, AlgorithmType, OptimizationAlgorithm};
use crate::domain::problem::{ConfigurationError, Fitness, OptimizationProblem, SwarmSolution};

#[derive(Debug)]
pub struct GeneticAlgorithm {
    population_size: usize,
    crossover_rate: f64,
    mutation_rate: f64,
    tournament_size: usize,
    elitism: usize,
    rng: StdRng,
    population: Vec<Vec<f64>>,
    fitness: Vec<Fitness>,
    global_best: Option<SwarmSolution>,
}

impl GeneticAlgorithm {
    /// Defaults: population 40, crossover 0.8, mutation 0.1, tournament 3,
    /// one elite
    pub fn from_params(params: &AlgorithmParams) -> Result<Self, ConfigurationError> {
        let population_size = params.usize_or("population_size", 40)?;
        if population_size < 2 {
            return Err(invalid("population_size", "must be at least 2"));
        }
        let tournament_size = params.usize_or("tournament_size", 3)?;
        if tournament_size == 0 {
            return Err(invalid("tournament_size", "must be at least 1"));
        }
        let elitism = params.usize_or("elitism", 1)?;
        if elitism >= population_size {
            return Err(invalid("elitism", "must be smaller than population_size"));
        }
        Ok(Self {
            population_size,
            crossover_rate: params.rate_or("crossover_rate", 0.8)?,
            mutation_rate: params.rate_or("mutation_rate", 0.1)?,
            tournament_size,
            elitism,
            rng: params.rng()?,
            population: Vec::new(),
            fitness: Vec::new(),
            global_best: None,
        })
    }

    fn tournament(&mut self, problem: &OptimizationProblem) -> usize {
        let mut winner = self.rng.random_range(0..self.population_size);
        for _ in 1..self.tournament_size {
            let challenger = self.rng.random_range(0..self.population_size);
            if problem.is_better(&self.fitness[challenger], &self.fitness[winner]) {
                winner = challenger;
            }
        }
        winner
    }

    fn breed(&mut self, problem: &OptimizationProblem) -> Vec<f64> {
        let p1 = self.tournament(problem);
        let p2 = self.tournament(problem);

        let mut child = if self.rng.random::<f64>() < self.crossover_rate {
            let alpha: f64 = self.rng.random();
            self.population[p1]
                .iter()
                .zip(&self.population[p2])
                .map(|(a, b)| alpha * a + (1.0 - alpha) * b)
                .collect()
        } else {
            self.population[p1].clone()
        };

        for (gene, &(low, high)) in child.iter_mut().zip(problem.bounds()) {
            if self.rng.random::<f64>() < self.mutation_rate {
                *gene = if low < high { self.rng.random_range(low..=high) } else { low };
            }
        }
        problem.clamp(&mut child);
        child
    }
}

impl OptimizationAlgorithm for GeneticAlgorithm {
    fn algorithm_type(&self) -> AlgorithmType {
        AlgorithmType::Ga
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
            solution(AlgorithmType::Ga, self.population[i].clone(), self.fitness[i].clone(), 0)
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

        let mut ranked: Vec<usize> = (0..self.population_size).collect();
        ranked.sort_by(|&a, &b| problem.compare(&self.fitness[a], &self.fitness[b]));

        let mut next_population: Vec<Vec<f64>> = Vec::with_capacity(self.population_size);
        let mut next_fitness: Vec<Fitness> = Vec::with_capacity(self.population_size);
        for &elite in ranked.iter().take(self.elitism) {
            next_population.push(self.population[elite].clone());
            next_fitness.push(self.fitness[elite].clone());
        }

        while next_population.len() < self.population_size {
            let child = self.breed(problem);
            next_fitness.push(problem.evaluate(&child));
            next_population.push(child);
        }

        self.population = next_population;
        self.fitness = next_fitness;

        if let Some(i) = best_index(problem, &self.fitness) {
            let candidate = solution(AlgorithmType::Ga, self.population[i].clone(), self.fitness[i].clone(), iteration);
            keep_better(problem, &mut self.global_best, candidate);
        }
        publish_best(shared_data, self.global_best.as_ref());
        Ok(self.global_best.clone())
    }
}
