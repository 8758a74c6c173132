// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # swarmos-core
//!
//! Agent lifecycle core shared by the swarm engine and the `swarmos` binary.
//!
//! # Architecture
//!
//! - **domain:** agent aggregate, tasks, abilities, events, node configuration
//!   and the snapshot persistence contract
//! - **application:** the agent lifecycle service and built-in abilities
//! - **infrastructure:** in-memory registry, snapshot stores, event bus and
//!   LLM provider registry

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
