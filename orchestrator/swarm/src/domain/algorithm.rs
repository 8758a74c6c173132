// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Optimization Algorithm Contract
//!
//! Every algorithm implements [`OptimizationAlgorithm`]:
//!
//! | Operation | Contract |
//! |-----------|----------|
//! | `initialize` | allocate population state sized to the problem, seed positions uniformly in bounds, evaluate them, return the initial best |
//! | `step` | advance one generation, evaluating the full population, and return the best solution known after the step |
//! | `should_terminate` | `iteration >= max_iterations`, or the best solution meets `target_fitness` |
//!
//! Algorithms are constructed from their parameters by an
//! [`AlgorithmRegistry`] factory, so invalid parameters are rejected when a
//! swarm is created rather than when it first runs.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use swarmos_core::domain::agent::AgentId;

use crate::domain::algorithms::{DifferentialEvolution, GeneticAlgorithm, MockAlgorithm, ParticleSwarm};
use crate::domain::problem::{ConfigurationError, OptimizationProblem, SwarmSolution};

/// Key algorithms use to publish their best fitness into `shared_data`
pub const GLOBAL_BEST_FITNESS_KEY: &str = "global_best_fitness";

#[derive(Debug, thiserror::Error)]
pub enum AlgorithmError {
    #[error("Algorithm has not been initialized")]
    NotInitialized,

    #[error("Evaluation failed: {0}")]
    Evaluation(String),

    #[error("{0}")]
    Internal(String),
}

pub trait OptimizationAlgorithm: Send {
    fn algorithm_type(&self) -> AlgorithmType;

    fn initialize(
        &mut self,
        problem: &OptimizationProblem,
        members: &[AgentId],
    ) -> Result<Option<SwarmSolution>, AlgorithmError>;

    fn step(
        &mut self,
        problem: &OptimizationProblem,
        members: &[AgentId],
        iteration: u64,
        shared_data: &mut serde_json::Map<String, serde_json::Value>,
    ) -> Result<Option<SwarmSolution>, AlgorithmError>;

    fn should_terminate(
        &self,
        iteration: u64,
        max_iterations: u64,
        best: Option<&SwarmSolution>,
        target_fitness: Option<f64>,
        problem: &OptimizationProblem,
    ) -> bool {
        default_should_terminate(iteration, max_iterations, best, target_fitness, problem)
    }
}

pub fn default_should_terminate(
    iteration: u64,
    max_iterations: u64,
    best: Option<&SwarmSolution>,
    target_fitness: Option<f64>,
    problem: &OptimizationProblem,
) -> bool {
    if iteration >= max_iterations {
        return true;
    }
    match (target_fitness, best) {
        (Some(target), Some(best)) => problem.meets_target(&best.fitness, target),
        _ => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlgorithmType {
    Pso,
    De,
    Ga,
    Mock,
}

impl AlgorithmType {
    pub fn as_str(self) -> &'static str {
        match self {
            AlgorithmType::Pso => "PSO",
            AlgorithmType::De => "DE",
            AlgorithmType::Ga => "GA",
            AlgorithmType::Mock => "MOCK",
        }
    }
}

impl fmt::Display for AlgorithmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlgorithmType {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PSO" => Ok(AlgorithmType::Pso),
            "DE" => Ok(AlgorithmType::De),
            "GA" => Ok(AlgorithmType::Ga),
            "MOCK" => Ok(AlgorithmType::Mock),
            _ => Err(ConfigurationError::UnknownAlgorithm(s.to_string())),
        }
    }
}

/// Free-form algorithm parameters with typed accessors
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlgorithmParams(pub serde_json::Map<String, serde_json::Value>);

impl AlgorithmParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn f64_or(&self, key: &str, default: f64) -> Result<f64, ConfigurationError> {
        Ok(self.opt_f64(key)?.unwrap_or(default))
    }

    pub fn opt_f64(&self, key: &str) -> Result<Option<f64>, ConfigurationError> {
        match self.0.get(key) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(v) => v
                .as_f64()
                .filter(|f| f.is_finite())
                .map(Some)
                .ok_or_else(|| invalid(key, "expected a finite number")),
        }
    }

    pub fn usize_or(&self, key: &str, default: usize) -> Result<usize, ConfigurationError> {
        match self.0.get(key) {
            None | Some(serde_json::Value::Null) => Ok(default),
            Some(v) => v
                .as_u64()
                .and_then(|n| usize::try_from(n).ok())
                .ok_or_else(|| invalid(key, "expected a non-negative integer")),
        }
    }

    /// A rate parameter in `[0, 1]`
    pub fn rate_or(&self, key: &str, default: f64) -> Result<f64, ConfigurationError> {
        let value = self.f64_or(key, default)?;
        if !(0.0..=1.0).contains(&value) {
            return Err(invalid(key, "must be between 0 and 1"));
        }
        Ok(value)
    }

    pub fn seed(&self) -> Result<Option<u64>, ConfigurationError> {
        match self.0.get("seed") {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(v) => v
                .as_u64()
                .map(Some)
                .ok_or_else(|| invalid("seed", "expected a non-negative integer")),
        }
    }

    /// RNG seeded from `seed`, or from entropy when absent
    pub fn rng(&self) -> Result<StdRng, ConfigurationError> {
        Ok(match self.seed()? {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::seed_from_u64(rand::random::<u64>()),
        })
    }
}

pub(crate) fn invalid(name: &str, reason: &str) -> ConfigurationError {
    ConfigurationError::InvalidParameter {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

pub type AlgorithmFactory =
    fn(&AlgorithmParams) -> Result<Box<dyn OptimizationAlgorithm>, ConfigurationError>;

/// Maps each algorithm type to the factory building fresh instances
#[derive(Clone)]
pub struct AlgorithmRegistry {
    factories: HashMap<AlgorithmType, AlgorithmFactory>,
}

impl AlgorithmRegistry {
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(AlgorithmType::Pso, |p| Ok(Box::new(ParticleSwarm::from_params(p)?)));
        registry.register(AlgorithmType::De, |p| Ok(Box::new(DifferentialEvolution::from_params(p)?)));
        registry.register(AlgorithmType::Ga, |p| Ok(Box::new(GeneticAlgorithm::from_params(p)?)));
        registry.register(AlgorithmType::Mock, |p| Ok(Box::new(MockAlgorithm::from_params(p)?)));
        registry
    }

    pub fn register(&mut self, algorithm: AlgorithmType, factory: AlgorithmFactory) {
        self.factories.insert(algorithm, factory);
    }

    /// Build a fresh, uninitialized instance
    pub fn create(
        &self,
        algorithm: AlgorithmType,
        params: &AlgorithmParams,
    ) -> Result<Box<dyn OptimizationAlgorithm>, ConfigurationError> {
        let factory = self
            .factories
            .get(&algorithm)
            .ok_or_else(|| ConfigurationError::UnknownAlgorithm(algorithm.to_string()))?;
        factory(params)
    }
}

impl Default for AlgorithmRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for AlgorithmRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.factories.keys().map(|a| a.as_str()).collect();
        names.sort();
        f.debug_struct("AlgorithmRegistry").field("algorithms", &names).finish()
    }
}
