// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod abilities;
pub mod agent;
pub mod lifecycle;

pub use agent::{AgentError, AgentFilter, AgentLifecycleService};
pub use lifecycle::StandardAgentLifecycleService;
