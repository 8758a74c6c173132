// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::domain::objective::{ObjectiveFunction, ObjectiveRegistry};

/// Value of an objective at a position. Vector fitness is compared by the
/// sum of its components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Fitness {
    Scalar(f64),
    Vector(Vec<f64>),
}

impl Fitness {
    pub fn scalar(&self) -> f64 {
        match self {
            Fitness::Scalar(v) => *v,
            Fitness::Vector(values) => values.iter().sum(),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.scalar().is_finite()
    }
}

impl From<f64> for Fitness {
    fn from(v: f64) -> Self {
        Fitness::Scalar(v)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Problem must have at least one dimension")]
    NoDimensions,

    #[error("Problem has {dimensions} dimensions but {bounds} bounds")]
    BoundsMismatch { dimensions: usize, bounds: usize },

    #[error("Invalid bound for dimension {index}: ({low}, {high})")]
    InvalidBound { index: usize, low: f64, high: f64 },

    #[error("max_iterations must be greater than zero")]
    ZeroIterations,

    #[error("Invalid algorithm parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("No implementation registered for algorithm {0}")]
    UnknownAlgorithm(String),

    #[error("{0}")]
    Invalid(String),
}

/// An immutable optimization problem: search box, objective and direction
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationProblem {
    dimensions: usize,
    bounds: Vec<(f64, f64)>,
    objective: ObjectiveFunction,
    is_minimization: bool,
}

impl OptimizationProblem {
    /// Bounds must be given for every dimension; a shorter list is rejected
    /// rather than reused.
    pub fn new(
        dimensions: usize,
        bounds: Vec<(f64, f64)>,
        objective: ObjectiveFunction,
        is_minimization: bool,
    ) -> Result<Self, ConfigurationError> {
        if dimensions == 0 {
            return Err(ConfigurationError::NoDimensions);
        }
        if bounds.len() != dimensions {
            return Err(ConfigurationError::BoundsMismatch {
                dimensions,
                bounds: bounds.len(),
            });
        }
        for (index, &(low, high)) in bounds.iter().enumerate() {
            // random_range needs a finite span, not just finite endpoints
            if !low.is_finite() || !high.is_finite() || low > high || !(high - low).is_finite() {
                return Err(ConfigurationError::InvalidBound { index, low, high });
            }
        }
        Ok(Self {
            dimensions,
            bounds,
            objective,
            is_minimization,
        })
    }

    /// Rebuild from a persisted descriptor, resolving the objective by name
    pub fn from_descriptor(
        descriptor: &ProblemDescriptor,
        objectives: &ObjectiveRegistry,
    ) -> Result<Self, ConfigurationError> {
        Self::new(
            descriptor.dimensions,
            descriptor.bounds.clone(),
            objectives.resolve(&descriptor.objective),
            descriptor.is_minimization,
        )
    }

    pub fn descriptor(&self) -> ProblemDescriptor {
        ProblemDescriptor {
            dimensions: self.dimensions,
            bounds: self.bounds.clone(),
            objective: self.objective.name().to_string(),
            is_minimization: self.is_minimization,
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn bounds(&self) -> &[(f64, f64)] {
        &self.bounds
    }

    pub fn objective(&self) -> &ObjectiveFunction {
        &self.objective
    }

    pub fn is_minimization(&self) -> bool {
        self.is_minimization
    }

    pub fn evaluate(&self, position: &[f64]) -> Fitness {
        self.objective.evaluate(position)
    }

    /// Key where lower is always better; NaN ranks last
    fn rank(&self, fitness: &Fitness) -> f64 {
        let v = fitness.scalar();
        if v.is_nan() {
            f64::INFINITY
        } else if self.is_minimization {
            v
        } else {
            -v
        }
    }

    /// Strictly better; ties are not improvements
    pub fn is_better(&self, candidate: &Fitness, incumbent: &Fitness) -> bool {
        self.rank(candidate) < self.rank(incumbent)
    }

    /// Ordering with the better fitness first
    pub fn compare(&self, a: &Fitness, b: &Fitness) -> Ordering {
        self.rank(a).total_cmp(&self.rank(b))
    }

    /// Whether `fitness` reaches `target` in the problem's direction
    pub fn meets_target(&self, fitness: &Fitness, target: f64) -> bool {
        let v = fitness.scalar();
        if v.is_nan() {
            return false;
        }
        if self.is_minimization {
            v <= target
        } else {
            v >= target
        }
    }

    pub fn clamp(&self, position: &mut [f64]) {
        for (x, &(low, high)) in position.iter_mut().zip(&self.bounds) {
            *x = x.clamp(low, high);
        }
    }

    /// Uniform sample inside the bounds
    pub fn random_position<R: Rng>(&self, rng: &mut R) -> Vec<f64> {
        self.bounds
            .iter()
            .map(|&(low, high)| if low < high { rng.random_range(low..=high) } else { low })
            .collect()
    }
}

/// Serializable form of [`OptimizationProblem`]; the objective is stored by name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemDescriptor {
    pub dimensions: usize,
    pub bounds: Vec<(f64, f64)>,
    pub objective: String,
    pub is_minimization: bool,
}

/// A candidate solution. Replaced wholesale, never mutated, when a better one
/// is found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmSolution {
    pub position: Vec<f64>,
    pub fitness: Fitness,
    pub is_feasible: bool,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl SwarmSolution {
    pub fn new(position: Vec<f64>, fitness: Fitness) -> Self {
        Self {
            position,
            fitness,
            is_feasible: true,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sphere_problem(minimize: bool) -> OptimizationProblem {
        OptimizationProblem::new(
            2,
            vec![(-5.0, 5.0), (-1.0, 1.0)],
            ObjectiveRegistry::with_builtins().resolve("sphere"),
            minimize,
        )
        .unwrap()
    }

    #[test]
    fn test_bounds_must_cover_every_dimension() {
        let objective = ObjectiveRegistry::with_builtins().resolve("sphere");
        assert_eq!(
            OptimizationProblem::new(3, vec![(-1.0, 1.0)], objective.clone(), true),
            Err(ConfigurationError::BoundsMismatch { dimensions: 3, bounds: 1 })
        );
        assert_eq!(
            OptimizationProblem::new(0, vec![], objective.clone(), true),
            Err(ConfigurationError::NoDimensions)
        );
        assert!(matches!(
            OptimizationProblem::new(1, vec![(2.0, 1.0)], objective.clone(), true),
            Err(ConfigurationError::InvalidBound { index: 0, .. })
        ));
        assert!(matches!(
            OptimizationProblem::new(2, vec![(0.0, 1.0), (-1e308, 1e308)], objective, true),
            Err(ConfigurationError::InvalidBound { index: 1, .. })
        ));
    }

    #[test]
    fn test_comparison_respects_direction() {
        let min = sphere_problem(true);
        let max = sphere_problem(false);
        let low = Fitness::Scalar(1.0);
        let high = Fitness::Scalar(2.0);

        assert!(min.is_better(&low, &high));
        assert!(!min.is_better(&low, &low));
        assert!(max.is_better(&high, &low));
        assert!(min.is_better(&low, &Fitness::Scalar(f64::NAN)));
        assert!(!min.is_better(&Fitness::Scalar(f64::NAN), &high));

        assert!(min.meets_target(&low, 1.0));
        assert!(!max.meets_target(&low, 1.5));
    }

    #[test]
    fn test_vector_fitness_scalarizes_by_sum() {
        let min = sphere_problem(true);
        let v = Fitness::Vector(vec![0.5, 0.25]);
        assert_eq!(v.scalar(), 0.75);
        assert!(min.is_better(&v, &Fitness::Scalar(1.0)));
    }

    #[test]
    fn test_random_positions_within_bounds() {
        let problem = sphere_problem(true);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let p = problem.random_position(&mut rng);
            assert!((-5.0..=5.0).contains(&p[0]));
            assert!((-1.0..=1.0).contains(&p[1]));
        }
    }

    #[test]
    fn test_descriptor_roundtrip_resolves_objective() {
        let problem = sphere_problem(true);
        let json = serde_json::to_string(&problem.descriptor()).unwrap();
        let descriptor: ProblemDescriptor = serde_json::from_str(&json).unwrap();
        let restored =
            OptimizationProblem::from_descriptor(&descriptor, &ObjectiveRegistry::with_builtins()).unwrap();
        assert_eq!(restored, problem);
        assert_eq!(restored.evaluate(&[3.0, 4.0]), Fitness::Scalar(25.0));
    }
}
