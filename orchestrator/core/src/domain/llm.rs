// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! LLM collaborator interface consumed by the `llm_chat` ability.
//!
//! Concrete HTTP adapters live outside the core; anything implementing
//! [`LLMProvider`] can be registered on the
//! [`LlmProviderRegistry`](crate::infrastructure::llm::LlmProviderRegistry).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::agent::LlmConfig;

#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Provider name used in logs and responses (e.g. "ollama", "openai")
    fn name(&self) -> &str;

    /// Generate a chat completion for `prompt`. Blocks the calling task
    /// until the provider answers or fails.
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<GenerationResponse, LLMError>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationOptions {
    /// Model override; `None` uses the provider default
    pub model: Option<String>,

    pub system_prompt: Option<String>,

    pub max_tokens: Option<u32>,

    /// Sampling temperature (0.0 = deterministic)
    pub temperature: Option<f32>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: None,
            system_prompt: None,
            max_tokens: Some(1024),
            temperature: Some(0.7),
        }
    }
}

impl From<&LlmConfig> for GenerationOptions {
    fn from(config: &LlmConfig) -> Self {
        let defaults = Self::default();
        Self {
            model: config.model.clone(),
            system_prompt: config.system_prompt.clone(),
            max_tokens: config.max_tokens.or(defaults.max_tokens),
            temperature: config.temperature.or(defaults.temperature),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationResponse {
    pub text: String,
    pub usage: TokenUsage,
    pub provider: String,
    pub model: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Provider not configured: {0}")]
    ProviderNotFound(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_from_agent_config() {
        let config = LlmConfig {
            provider: Some("local".into()),
            model: Some("llama3.2".into()),
            temperature: None,
            max_tokens: Some(64),
            system_prompt: Some("be brief".into()),
        };
        let options = GenerationOptions::from(&config);
        assert_eq!(options.model.as_deref(), Some("llama3.2"));
        assert_eq!(options.max_tokens, Some(64));
        assert_eq!(options.temperature, Some(0.7));
        assert_eq!(options.system_prompt.as_deref(), Some("be brief"));
    }
}
