// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod agent_registry;
pub mod event_bus;
pub mod llm;
pub mod repositories;

pub use agent_registry::AgentRegistry;
pub use event_bus::{DomainEvent, EventBus, EventBusError, EventReceiver, SwarmEventReceiver};
pub use repositories::{snapshot_store_for, InMemorySnapshotStore, JsonFileSnapshotStore};
