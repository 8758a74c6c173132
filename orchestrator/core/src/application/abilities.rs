// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Built-in ability handlers: `ping`, `echo` and `llm_chat`.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use crate::domain::ability::{AbilityContext, AbilityError, AbilityHandler, AbilityRegistry};
use crate::infrastructure::llm::LlmProviderRegistry;

pub const PING: &str = "ping";
pub const ECHO: &str = "echo";
pub const LLM_CHAT: &str = "llm_chat";

/// Health probe; never touches a collaborator
pub struct PingAbility;

#[async_trait]
impl AbilityHandler for PingAbility {
    async fn execute(&self, context: AbilityContext, _payload: Value) -> Result<Value, AbilityError> {
        Ok(json!({
            "status": "pong",
            "healthy": true,
            "agent_id": context.agent_id.to_string(),
            "timestamp": Utc::now(),
        }))
    }
}

pub struct EchoAbility;

#[async_trait]
impl AbilityHandler for EchoAbility {
    async fn execute(&self, _context: AbilityContext, payload: Value) -> Result<Value, AbilityError> {
        Ok(payload)
    }
}

/// Sends `payload.prompt` to the agent's LLM provider and waits for the
/// completion.
pub struct LlmChatAbility {
    providers: Arc<LlmProviderRegistry>,
}

impl LlmChatAbility {
    pub fn new(providers: Arc<LlmProviderRegistry>) -> Self {
        Self { providers }
    }
}

#[async_trait]
impl AbilityHandler for LlmChatAbility {
    async fn execute(&self, context: AbilityContext, payload: Value) -> Result<Value, AbilityError> {
        let prompt = payload
            .get("prompt")
            .or_else(|| payload.get("message"))
            .and_then(Value::as_str)
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| AbilityError::InvalidInput("llm_chat requires a non-empty 'prompt'".into()))?;

        debug!(agent_id = %context.agent_id, "Dispatching llm_chat prompt");
        let response = self.providers.generate(&context.llm_config, prompt).await?;

        Ok(json!({
            "response": response.text,
            "provider": response.provider,
            "model": response.model,
            "usage": response.usage,
        }))
    }
}

/// Registry holding every built-in ability. Custom abilities are added with
/// [`AbilityRegistry::register`] before the lifecycle service is built.
pub fn builtin_abilities(providers: Arc<LlmProviderRegistry>) -> AbilityRegistry {
    let mut registry = AbilityRegistry::new();
    registry.register(PING, Arc::new(PingAbility));
    registry.register(ECHO, Arc::new(EchoAbility));
    registry.register(LLM_CHAT, Arc::new(LlmChatAbility::new(providers)));
    registry
}
