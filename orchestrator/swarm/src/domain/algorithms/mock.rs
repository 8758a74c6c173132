// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Deterministic algorithm for tests and demos.
//!
//! A single point starts at the lower corner of the bounds and halves its
//! distance to the centre every step. `fail_at_iteration` makes `step`
//! return an error at that iteration.

use swarmos_core::domain::agent::AgentId;

use super::{keep_better, publish_best, solution};
use crate::domain::algorithm::{invalid, AlgorithmError, AlgorithmParams, AlgorithmType, OptimizationAlgorithm};
use crate::domain::problem::{ConfigurationError, OptimizationProblem, SwarmSolution};

#[derive(Debug, Default)]
pub struct MockAlgorithm {
    fail_at_iteration: Option<u64>,
    initialized: bool,
    global_best: Option<SwarmSolution>,
}

impl MockAlgorithm {
    pub fn from_params(params: &AlgorithmParams) -> Result<Self, ConfigurationError> {
        Ok(Self {
            fail_at_iteration: opt_u64(params, "fail_at_iteration")?,
            ..Self::default()
        })
    }

    fn point_at(problem: &OptimizationProblem, iteration: u64) -> Vec<f64> {
        let shrink = 0.5f64.powi(iteration.min(1074) as i32);
        problem
            .bounds()
            .iter()
            .map(|&(low, high)| {
                let centre = (low + high) / 2.0;
                centre + (low - centre) * shrink
            })
            .collect()
    }
}

fn opt_u64(params: &AlgorithmParams, key: &str) -> Result<Option<u64>, ConfigurationError> {
    match params.0.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .map(Some)
            .ok_or_else(|| invalid(key, "expected a non-negative integer")),
    }
}

impl OptimizationAlgorithm for MockAlgorithm {
    fn algorithm_type(&self) -> AlgorithmType {
        AlgorithmType::Mock
    }

    fn initialize(
        &mut self,
        problem: &OptimizationProblem,
        _members: &[AgentId],
    ) -> Result<Option<SwarmSolution>, AlgorithmError> {
        let position = Self::point_at(problem, 0);
        let fitness = problem.evaluate(&position);
        self.global_best = Some(solution(AlgorithmType::Mock, position, fitness, 0));
        self.initialized = true;
        Ok(self.global_best.clone())
    }

    fn step(
        &mut self,
        problem: &OptimizationProblem,
        _members: &[AgentId],
        iteration: u64,
        shared_data: &mut serde_json::Map<String, serde_json::Value>,
    ) -> Result<Option<SwarmSolution>, AlgorithmError> {
        if !self.initialized {
            return Err(AlgorithmError::NotInitialized);
        }
        if self.fail_at_iteration == Some(iteration) {
            return Err(AlgorithmError::Evaluation(format!(
                "mock failure at iteration {}",
                iteration
            )));
        }

        let position = Self::point_at(problem, iteration);
        let fitness = problem.evaluate(&position);
        keep_better(problem, &mut self.global_best, solution(AlgorithmType::Mock, position, fitness, iteration));
        publish_best(shared_data, self.global_best.as_ref());
        Ok(self.global_best.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::objective::ObjectiveRegistry;

    #[test]
    fn test_point_converges_to_centre() {
        let problem = OptimizationProblem::new(
            2,
            vec![(-4.0, 4.0), (0.0, 2.0)],
            ObjectiveRegistry::with_builtins().resolve("sphere"),
            true,
        )
        .unwrap();
        let mut mock = MockAlgorithm::default();
        let initial = mock.initialize(&problem, &[]).unwrap().unwrap();
        assert_eq!(initial.position, vec![-4.0, 0.0]);

        let mut shared = serde_json::Map::new();
        let best = mock.step(&problem, &[], 2, &mut shared).unwrap().unwrap();
        assert_eq!(best.position, vec![-1.0, 0.75]);
    }

    #[test]
    fn test_injected_failure() {
        let problem = OptimizationProblem::new(
            1,
            vec![(-1.0, 1.0)],
            ObjectiveRegistry::with_builtins().resolve("sphere"),
            true,
        )
        .unwrap();
        let mut mock = MockAlgorithm::from_params(&AlgorithmParams::new().with("fail_at_iteration", 2)).unwrap();
        mock.initialize(&problem, &[]).unwrap();
        let mut shared = serde_json::Map::new();
        assert!(mock.step(&problem, &[], 1, &mut shared).is_ok());
        assert!(matches!(
            mock.step(&problem, &[], 2, &mut shared),
            Err(AlgorithmError::Evaluation(_))
        ));
    }

    #[test]
    fn test_only_declared_faults_are_injected() {
        let problem = OptimizationProblem::new(
            1,
            vec![(-1.0, 1.0)],
            ObjectiveRegistry::with_builtins().resolve("sphere"),
            true,
        )
        .unwrap();
        let params = AlgorithmParams::new().with("panic_at_iteration", 1).with("fail_at_iteration", 3);
        let mut mock = MockAlgorithm::from_params(&params).unwrap();
        mock.initialize(&problem, &[]).unwrap();
        let mut shared = serde_json::Map::new();
        for iteration in 1..3 {
            assert!(mock.step(&problem, &[], iteration, &mut shared).is_ok());
        }
        assert!(mock.step(&problem, &[], 3, &mut shared).is_err());
    }
}
