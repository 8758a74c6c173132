// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Snapshot Persistence Contract
//!
//! Registries persist themselves as a whole: every save writes the full
//! collection of entities as a [`Snapshot`], every load returns the last
//! saved snapshot. Entities are stored as independent JSON documents so a
//! single corrupt entry can be skipped without discarding the rest.
//!
//! | Implementation | Backend |
//! |----------------|---------|
//! | `InMemorySnapshotStore` | process memory (tests, development) |
//! | `JsonFileSnapshotStore` | JSON file, atomic temp-file + rename |

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Storage backend selection for registry snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum StorageBackend {
    #[default]
    InMemory,
    File,
}

/// A full registry snapshot: entity id -> JSON document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub entries: BTreeMap<String, serde_json::Value>,
}

impl Snapshot {
    pub fn new(entries: BTreeMap<String, serde_json::Value>) -> Self {
        Self {
            version: SNAPSHOT_FORMAT_VERSION,
            saved_at: Utc::now(),
            entries,
        }
    }

    pub fn empty() -> Self {
        Self::new(BTreeMap::new())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Replace the stored snapshot. Implementations must never leave a
    /// partially written snapshot behind.
    async fn save(&self, snapshot: &Snapshot) -> Result<(), RepositoryError>;

    /// Load the last saved snapshot; an empty snapshot if nothing was saved
    async fn load(&self) -> Result<Snapshot, RepositoryError>;
}

/// Result of restoring a registry from a snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreReport {
    pub restored: usize,
    pub skipped: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<std::io::Error> for RepositoryError {
    fn from(err: std::io::Error) -> Self {
        RepositoryError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}
