// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// LLM Provider Registry - Provider Resolution and Retry
//
// Maps provider names to `LLMProvider` instances and resolves the provider an
// agent asks for, falling back to the node default.

use crate::domain::agent::LlmConfig;
use crate::domain::llm::{GenerationOptions, GenerationResponse, LLMError, LLMProvider};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

const MAX_RETRY_DELAY_MS: u64 = 30_000;

/// Registry for managing LLM providers
#[derive(Clone)]
pub struct LlmProviderRegistry {
    providers: HashMap<String, Arc<dyn LLMProvider>>,
    default_provider: Option<String>,
    max_retries: u32,
    retry_delay_ms: u64,
}

impl LlmProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: None,
            max_retries: 1,
            retry_delay_ms: 250,
        }
    }

    /// Register a provider under its own name. The first provider registered
    /// becomes the default unless one was set explicitly.
    pub fn register(&mut self, provider: Arc<dyn LLMProvider>) {
        let name = provider.name().to_string();
        info!("Registering LLM provider: {}", name);
        if self.default_provider.is_none() {
            self.default_provider = Some(name.clone());
        }
        if self.providers.insert(name.clone(), provider).is_some() {
            warn!("LLM provider '{}' replaced", name);
        }
    }

    pub fn with_default_provider(mut self, name: Option<String>) -> Self {
        if name.is_some() {
            self.default_provider = name;
        }
        self
    }

    /// Retry failed generations up to `max_retries` attempts with
    /// exponential backoff starting at `retry_delay_ms`
    pub fn with_retries(mut self, max_retries: u32, retry_delay_ms: u64) -> Self {
        self.max_retries = max_retries.max(1);
        self.retry_delay_ms = retry_delay_ms;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn default_provider(&self) -> Option<&str> {
        self.default_provider.as_deref()
    }

    /// Resolve the provider named in `config`, or the default provider
    pub fn resolve(&self, config: &LlmConfig) -> Result<Arc<dyn LLMProvider>, LLMError> {
        let name = config
            .provider
            .as_deref()
            .or(self.default_provider.as_deref())
            .ok_or_else(|| LLMError::ProviderNotFound("no default provider configured".into()))?;

        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| LLMError::ProviderNotFound(name.to_string()))
    }

    /// Generate with the agent's provider, retrying transient failures
    pub async fn generate(
        &self,
        config: &LlmConfig,
        prompt: &str,
    ) -> Result<GenerationResponse, LLMError> {
        let provider = self.resolve(config)?;
        let options = GenerationOptions::from(config);

        let mut last_error = None;
        for attempt in 0..self.max_retries {
            match provider.generate(prompt, &options).await {
                Ok(response) => {
                    debug!("Generation successful on attempt {}", attempt + 1);
                    return Ok(response);
                }
                Err(e @ (LLMError::Authentication(_) | LLMError::InvalidInput(_))) => {
                    return Err(e);
                }
                Err(e) => {
                    warn!(
                        "Generation failed (attempt {}/{}): {}",
                        attempt + 1,
                        self.max_retries,
                        e
                    );
                    last_error = Some(e);
                    if attempt + 1 < self.max_retries {
                        tokio::time::sleep(self.backoff_delay(attempt)).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| LLMError::Provider("no generation attempts made".into())))
    }
}

impl LlmProviderRegistry {
    /// Delay before retry `attempt + 1`: doubles each attempt, capped
    fn backoff_delay(&self, attempt: u32) -> tokio::time::Duration {
        let delay_ms = 2_u64
            .checked_pow(attempt)
            .and_then(|factor| self.retry_delay_ms.checked_mul(factor))
            .unwrap_or(MAX_RETRY_DELAY_MS)
            .min(MAX_RETRY_DELAY_MS);
        tokio::time::Duration::from_millis(delay_ms)
    }
}

impl Default for LlmProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LlmProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.providers.keys().collect();
        names.sort();
        f.debug_struct("LlmProviderRegistry")
            .field("providers", &names)
            .field("default_provider", &self.default_provider)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm::TokenUsage;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyProvider {
        name: String,
        failures_left: AtomicU32,
    }

    #[async_trait]
    impl LLMProvider for FlakyProvider {
        fn name(&self) -> &str {
            &self.name
        }

        async fn generate(
            &self,
            prompt: &str,
            options: &GenerationOptions,
        ) -> Result<GenerationResponse, LLMError> {
            if self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                return Err(LLMError::Network("connection reset".into()));
            }
            Ok(GenerationResponse {
                text: format!("echo: {}", prompt),
                usage: TokenUsage::default(),
                provider: self.name.clone(),
                model: options.model.clone().unwrap_or_else(|| "default".into()),
            })
        }
    }

    fn provider(name: &str, failures: u32) -> Arc<dyn LLMProvider> {
        Arc::new(FlakyProvider {
            name: name.into(),
            failures_left: AtomicU32::new(failures),
        })
    }

    #[test]
    fn test_first_registered_is_default() {
        let mut registry = LlmProviderRegistry::new();
        registry.register(provider("local", 0));
        registry.register(provider("remote", 0));
        assert_eq!(registry.default_provider(), Some("local"));

        let resolved = registry.resolve(&LlmConfig::default()).unwrap();
        assert_eq!(resolved.name(), "local");

        let explicit = LlmConfig {
            provider: Some("remote".into()),
            ..Default::default()
        };
        assert_eq!(registry.resolve(&explicit).unwrap().name(), "remote");
    }

    #[test]
    fn test_unknown_provider() {
        let registry = LlmProviderRegistry::new();
        assert!(matches!(
            registry.resolve(&LlmConfig::default()),
            Err(LLMError::ProviderNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failure() {
        let mut registry = LlmProviderRegistry::new().with_retries(3, 1);
        registry.register(provider("local", 2));
        let response = registry.generate(&LlmConfig::default(), "hi").await.unwrap();
        assert_eq!(response.text, "echo: hi");
    }

    #[tokio::test]
    async fn test_retry_exhaustion_returns_last_error() {
        let mut registry = LlmProviderRegistry::new().with_retries(2, 1);
        registry.register(provider("local", 5));
        assert!(matches!(
            registry.generate(&LlmConfig::default(), "hi").await,
            Err(LLMError::Network(_))
        ));
    }

    #[test]
    fn test_backoff_doubles_and_saturates_at_cap() {
        let registry = LlmProviderRegistry::new().with_retries(200, 250);
        assert_eq!(registry.backoff_delay(0).as_millis(), 250);
        assert_eq!(registry.backoff_delay(2).as_millis(), 1_000);
        assert_eq!(registry.backoff_delay(7).as_millis(), 30_000);
        assert_eq!(registry.backoff_delay(64).as_millis(), 30_000);
        assert_eq!(registry.backoff_delay(150).as_millis(), 30_000);
    }
}
