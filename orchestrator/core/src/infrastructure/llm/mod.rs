// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// LLM Provider Infrastructure
//
// Concrete HTTP adapters are supplied by the embedding process; the core only
// keeps the registry that maps provider names to `LLMProvider` instances.

pub mod registry;

pub use registry::LlmProviderRegistry;
