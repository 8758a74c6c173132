// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Node Configuration Types
//
// Kubernetes-style manifest (apiVersion/kind/metadata/spec) describing how a
// swarmos node runs:
// - Swarm scheduler pacing and persistence triggers
// - Snapshot storage backend
// - Agent defaults (history, memory and queue bounds)
// - LLM provider selection
// - Logging

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::domain::repository::StorageBackend;

pub const API_VERSION: &str = "swarmos.dev/v1";
pub const KIND: &str = "NodeConfig";

/// Top-level node configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeConfigManifest {
    /// API version (must be "swarmos.dev/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "NodeConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: NodeConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct NodeConfigSpec {
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub agents: AgentDefaults,

    #[serde(default)]
    pub llm: LlmSelection,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observability: Option<ObservabilityConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchedulerConfig {
    /// Pause between swarm iterations; bounds CPU use and gives the
    /// stop signal a chance to land
    #[serde(default = "default_iteration_delay_ms")]
    pub iteration_delay_ms: u64,

    /// Persist the swarm registry whenever a better solution is found
    #[serde(default = "default_true")]
    pub persist_on_improvement: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            iteration_delay_ms: default_iteration_delay_ms(),
            persist_on_improvement: default_true(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Directory holding `agents.json` and `swarms.json` (file backend)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            data_dir: default_data_dir(),
        }
    }
}

impl StorageConfig {
    pub fn agents_path(&self) -> PathBuf {
        self.data_dir.join("agents.json")
    }

    pub fn swarms_path(&self) -> PathBuf {
        self.data_dir.join("swarms.json")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentDefaults {
    /// Finished tasks kept per agent
    #[serde(default = "default_max_task_history")]
    pub max_task_history: usize,

    #[serde(default = "default_memory_max_size")]
    pub default_memory_max_size: usize,

    #[serde(default = "default_queue_max_size")]
    pub default_queue_max_size: usize,
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            max_task_history: default_max_task_history(),
            default_memory_max_size: default_memory_max_size(),
            default_queue_max_size: default_queue_max_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct LlmSelection {
    /// Provider used when an agent does not name one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_provider: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObservabilityConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format ("json" or "text")
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_true() -> bool { true }
fn default_iteration_delay_ms() -> u64 { 10 }
fn default_data_dir() -> PathBuf { PathBuf::from(".swarmos") }
fn default_max_task_history() -> usize { 100 }
fn default_memory_max_size() -> usize { 1000 }
fn default_queue_max_size() -> usize { 100 }
fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "text".to_string() }

impl Default for NodeConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "swarmos-node".to_string(),
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: NodeConfigSpec::default(),
        }
    }
}

impl NodeConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Discover configuration file using precedence order
    /// 1. SWARMOS_CONFIG_PATH environment variable
    /// 2. ./swarmos-config.yaml (working directory)
    /// 3. ~/.swarmos/config.yaml (user home)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("SWARMOS_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./swarmos-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".swarmos").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // An explicit path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        let mut config = match Self::discover_config() {
            Some(config_path) => {
                tracing::info!("Loading configuration from discovered path: {:?}", config_path);
                Self::from_yaml_file(config_path)?
            }
            None => {
                tracing::warn!("No configuration file found in standard locations. Using defaults.");
                Self::default()
            }
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SWARMOS_ITERATION_DELAY_MS") {
            match val.parse::<u64>() {
                Ok(ms) if ms > 0 => {
                    tracing::info!("Environment override: SWARMOS_ITERATION_DELAY_MS={}", ms);
                    self.spec.scheduler.iteration_delay_ms = ms;
                }
                _ => tracing::warn!(
                    "Invalid value for SWARMOS_ITERATION_DELAY_MS: '{}'. Expected a positive integer. Ignoring.",
                    val
                ),
            }
        }

        if let Ok(val) = std::env::var("SWARMOS_DATA_DIR") {
            if val.trim().is_empty() {
                tracing::warn!("Empty SWARMOS_DATA_DIR. Ignoring.");
            } else {
                tracing::info!("Environment override: SWARMOS_DATA_DIR={}", val);
                self.spec.storage.data_dir = PathBuf::from(val);
            }
        }

        if let Ok(val) = std::env::var("SWARMOS_STORAGE_BACKEND") {
            match val.to_lowercase().as_str() {
                "file" => self.spec.storage.backend = StorageBackend::File,
                "in-memory" | "memory" => self.spec.storage.backend = StorageBackend::InMemory,
                _ => tracing::warn!(
                    "Invalid value for SWARMOS_STORAGE_BACKEND: '{}'. Expected file/in-memory. Ignoring.",
                    val
                ),
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        if self.spec.scheduler.iteration_delay_ms == 0 {
            anyhow::bail!("spec.scheduler.iteration_delay_ms must be greater than zero");
        }

        let agents = &self.spec.agents;
        if agents.max_task_history == 0 {
            anyhow::bail!("spec.agents.max_task_history must be greater than zero");
        }
        if agents.default_memory_max_size == 0 || agents.default_queue_max_size == 0 {
            anyhow::bail!("spec.agents memory and queue sizes must be greater than zero");
        }

        if self.spec.storage.backend == StorageBackend::File
            && self.spec.storage.data_dir.as_os_str().is_empty()
        {
            anyhow::bail!("spec.storage.data_dir is required for the file backend");
        }

        Ok(())
    }

    pub fn logging(&self) -> LoggingConfig {
        self.spec
            .observability
            .as_ref()
            .and_then(|o| o.logging.clone())
            .unwrap_or(LoggingConfig {
                level: default_log_level(),
                format: default_log_format(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_manifest() {
        let manifest = NodeConfigManifest::default();
        assert_eq!(manifest.api_version, API_VERSION);
        assert_eq!(manifest.kind, KIND);
        assert_eq!(manifest.spec.scheduler.iteration_delay_ms, 10);
        assert_eq!(manifest.spec.storage.backend, StorageBackend::InMemory);
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let yaml = r#"
apiVersion: swarmos.dev/v1
kind: NodeConfig
metadata:
  name: lab-node
  labels:
    environment: test
spec:
  scheduler:
    iteration_delay_ms: 25
  storage:
    backend: file
    data_dir: /var/lib/swarmos
  agents:
    max_task_history: 10
  llm:
    default_provider: ollama
  observability:
    logging:
      level: debug
      format: json
"#;
        let manifest = NodeConfigManifest::from_yaml_str(yaml).unwrap();
        assert_eq!(manifest.metadata.name, "lab-node");
        assert_eq!(manifest.spec.scheduler.iteration_delay_ms, 25);
        assert!(manifest.spec.scheduler.persist_on_improvement);
        assert_eq!(manifest.spec.storage.backend, StorageBackend::File);
        assert_eq!(
            manifest.spec.storage.swarms_path(),
            PathBuf::from("/var/lib/swarmos/swarms.json")
        );
        assert_eq!(manifest.spec.agents.max_task_history, 10);
        assert_eq!(manifest.spec.agents.default_queue_max_size, 100);
        assert_eq!(manifest.spec.llm.default_provider.as_deref(), Some("ollama"));
        assert_eq!(manifest.logging().format, "json");

        let reparsed =
            NodeConfigManifest::from_yaml_str(&manifest.to_yaml_string().unwrap()).unwrap();
        assert_eq!(reparsed, manifest);
    }

    #[test]
    fn test_validation() {
        let mut manifest = NodeConfigManifest::default();

        manifest.api_version = "wrong/v1".to_string();
        assert!(manifest.validate().is_err());
        manifest.api_version = API_VERSION.to_string();

        manifest.kind = "WrongKind".to_string();
        assert!(manifest.validate().is_err());
        manifest.kind = KIND.to_string();

        manifest.spec.scheduler.iteration_delay_ms = 0;
        assert!(manifest.validate().is_err());
        manifest.spec.scheduler.iteration_delay_ms = 5;

        manifest.spec.agents.max_task_history = 0;
        assert!(manifest.validate().is_err());
        manifest.spec.agents.max_task_history = 5;

        manifest.spec.storage.backend = StorageBackend::File;
        manifest.spec.storage.data_dir = PathBuf::new();
        assert!(manifest.validate().is_err());
    }
}
