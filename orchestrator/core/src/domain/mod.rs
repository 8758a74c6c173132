// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain model
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Entities, value objects and collaborator contracts with no
//!   runtime dependencies beyond serialization

pub mod agent;
pub mod task;
pub mod ability;
pub mod events;
pub mod llm;
pub mod node_config;
pub mod repository;
