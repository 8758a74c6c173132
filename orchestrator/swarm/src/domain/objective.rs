// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Objective Functions
//!
//! Objectives are pure functions from a position vector to a [`Fitness`],
//! identified by name. Persisted swarms store only the name, so the
//! [`ObjectiveRegistry`] is consulted again on restore.
//!
//! Unknown names never fail: [`ObjectiveRegistry::resolve`] falls back to
//! `sum` and logs a warning, which keeps snapshot loading robust when an
//! objective is renamed or not registered in this process.

use std::collections::HashMap;
use std::f64::consts::{E, PI};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

use crate::domain::problem::Fitness;

pub const FALLBACK_OBJECTIVE: &str = "sum";

pub type ObjectiveFn = dyn Fn(&[f64]) -> Fitness + Send + Sync;

/// A named objective function. Cloning shares the underlying function.
#[derive(Clone)]
pub struct ObjectiveFunction {
    name: String,
    func: Arc<ObjectiveFn>,
}

impl ObjectiveFunction {
    pub fn new(name: impl Into<String>, func: impl Fn(&[f64]) -> Fitness + Send + Sync + 'static) -> Self {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// Wrap a scalar-valued function
    pub fn scalar(name: impl Into<String>, func: fn(&[f64]) -> f64) -> Self {
        Self::new(name, move |x| Fitness::Scalar(func(x)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn evaluate(&self, position: &[f64]) -> Fitness {
        (self.func)(position)
    }
}

impl fmt::Debug for ObjectiveFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectiveFunction").field("name", &self.name).finish()
    }
}

impl PartialEq for ObjectiveFunction {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// Name → objective lookup, populated at startup and read-only afterwards
#[derive(Debug, Clone)]
pub struct ObjectiveRegistry {
    functions: HashMap<String, ObjectiveFunction>,
}

impl ObjectiveRegistry {
    /// Registry containing only the `sum` fallback
    pub fn new() -> Self {
        let mut functions = HashMap::new();
        functions.insert(
            FALLBACK_OBJECTIVE.to_string(),
            ObjectiveFunction::scalar(FALLBACK_OBJECTIVE, sum),
        );
        Self { functions }
    }

    /// Registry with `sphere`, `rastrigin`, `rosenbrock`, `ackley` and `sum`
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(ObjectiveFunction::scalar("sphere", sphere));
        registry.register(ObjectiveFunction::scalar("rastrigin", rastrigin));
        registry.register(ObjectiveFunction::scalar("rosenbrock", rosenbrock));
        registry.register(ObjectiveFunction::scalar("ackley", ackley));
        registry
    }

    /// Register `function` under its name. An existing entry is replaced.
    pub fn register(&mut self, function: ObjectiveFunction) {
        let name = function.name().to_string();
        if self.functions.insert(name.clone(), function).is_some() {
            warn!(objective = %name, "Objective function replaced");
        }
    }

    pub fn get(&self, name: &str) -> Option<ObjectiveFunction> {
        self.functions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Look up `name`, falling back to `sum` when it is unknown
    pub fn resolve(&self, name: &str) -> ObjectiveFunction {
        if let Some(function) = self.get(name) {
            return function;
        }
        warn!(objective = %name, fallback = FALLBACK_OBJECTIVE, "Unknown objective function, using fallback");
        self.get(FALLBACK_OBJECTIVE)
            .unwrap_or_else(|| ObjectiveFunction::scalar(FALLBACK_OBJECTIVE, sum))
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.functions.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for ObjectiveRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

pub fn sum(x: &[f64]) -> f64 {
    x.iter().sum()
}

pub fn sphere(x: &[f64]) -> f64 {
    x.iter().map(|v| v * v).sum()
}

pub fn rastrigin(x: &[f64]) -> f64 {
    10.0 * x.len() as f64
        + x.iter()
            .map(|v| v * v - 10.0 * (2.0 * PI * v).cos())
            .sum::<f64>()
}

pub fn rosenbrock(x: &[f64]) -> f64 {
    x.windows(2)
        .map(|w| 100.0 * (w[1] - w[0] * w[0]).powi(2) + (1.0 - w[0]).powi(2))
        .sum()
}

pub fn ackley(x: &[f64]) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    let n = x.len() as f64;
    let sum_sq = x.iter().map(|v| v * v).sum::<f64>() / n;
    let sum_cos = x.iter().map(|v| (2.0 * PI * v).cos()).sum::<f64>() / n;
    -20.0 * (-0.2 * sum_sq.sqrt()).exp() - sum_cos.exp() + 20.0 + E
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(f: Fitness) -> f64 {
        f.scalar()
    }

    #[test]
    fn test_builtins_have_known_minima() {
        let registry = ObjectiveRegistry::with_builtins();
        let origin = [0.0, 0.0, 0.0];
        assert_eq!(scalar(registry.resolve("sphere").evaluate(&origin)), 0.0);
        assert!(scalar(registry.resolve("rastrigin").evaluate(&origin)).abs() < 1e-12);
        assert!(scalar(registry.resolve("ackley").evaluate(&origin)).abs() < 1e-12);
        assert_eq!(scalar(registry.resolve("rosenbrock").evaluate(&[1.0, 1.0, 1.0])), 0.0);
        assert_eq!(scalar(registry.resolve("sum").evaluate(&[1.0, 2.0, -0.5])), 2.5);
    }

    #[test]
    fn test_unknown_name_falls_back_to_sum() {
        let registry = ObjectiveRegistry::with_builtins();
        let f = registry.resolve("does-not-exist");
        assert_eq!(f.name(), "sum");
        assert_eq!(scalar(f.evaluate(&[1.0, 1.0])), 2.0);
    }

    #[test]
    fn test_register_overwrites() {
        let mut registry = ObjectiveRegistry::with_builtins();
        registry.register(ObjectiveFunction::scalar("sphere", |_| 42.0));
        assert_eq!(scalar(registry.resolve("sphere").evaluate(&[3.0])), 42.0);
        assert_eq!(registry.names().len(), 5);
    }
}
