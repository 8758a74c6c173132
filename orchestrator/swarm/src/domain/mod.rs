// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod algorithm;
pub mod algorithms;
pub mod objective;
pub mod problem;
pub mod swarm;

pub use algorithm::{AlgorithmError, AlgorithmParams, AlgorithmRegistry, AlgorithmType, OptimizationAlgorithm};
pub use objective::{ObjectiveFunction, ObjectiveRegistry};
pub use problem::{ConfigurationError, Fitness, OptimizationProblem, ProblemDescriptor, SwarmSolution};
pub use swarm::{Swarm, SwarmConfig, SwarmFilter, SwarmId, SwarmRecord, SwarmStatus, SwarmStatusSnapshot, SwarmTask, SwarmTaskId, SwarmTaskStatus};
