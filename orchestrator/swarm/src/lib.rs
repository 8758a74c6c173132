// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `swarmos-swarm` - Swarm Optimization Engine
//!
//! Coordinates populations of candidate solutions across pluggable
//! optimization algorithms toward a named objective function.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | `Swarm` aggregate, `OptimizationProblem`, objectives, the `OptimizationAlgorithm` trait with PSO / DE / GA / Mock |
//! | [`application`] | Application | `SwarmService` use-case trait, `StandardSwarmService` and the per-swarm background scheduler |
//!
//! ## Key Concepts
//!
//! - **Run**: one background task driving a swarm from `start` until it
//!   completes, is stopped or fails. The live algorithm instance belongs to
//!   the run and is discarded with it; restarting re-initializes it.
//! - **Cooperative stop**: `stop` cancels the run's token and joins it. A
//!   step in progress always finishes first, so cancellation latency is at
//!   most one step.
//! - **Sticky error**: a run that fails leaves the swarm in `ERROR`;
//!   `start` refuses it until an explicit reset exists.

pub mod domain;
pub mod application;

pub use domain::*;
