// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::domain::repository::{
    RepositoryError, Snapshot, SnapshotStore, StorageBackend, SNAPSHOT_FORMAT_VERSION,
};

#[derive(Clone, Default)]
pub struct InMemorySnapshotStore {
    snapshot: Arc<Mutex<Option<Snapshot>>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entities in the last saved snapshot
    pub fn len(&self) -> usize {
        self.snapshot.lock().as_ref().map_or(0, |s| s.entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn save(&self, snapshot: &Snapshot) -> Result<(), RepositoryError> {
        *self.snapshot.lock() = Some(snapshot.clone());
        Ok(())
    }

    async fn load(&self) -> Result<Snapshot, RepositoryError> {
        Ok(self.snapshot.lock().clone().unwrap_or_else(Snapshot::empty))
    }
}

/// Snapshot store backed by a single JSON file.
///
/// Saves go to `<file>.tmp` first and are renamed over the target once
/// flushed, so a crash mid-write leaves the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct JsonFileSnapshotStore {
    path: PathBuf,
}

impl JsonFileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "snapshot".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SnapshotStore for JsonFileSnapshotStore {
    async fn save(&self, snapshot: &Snapshot) -> Result<(), RepositoryError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let bytes = serde_json::to_vec_pretty(snapshot)?;
        let tmp = self.temp_path();

        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), entries = snapshot.entries.len(), "Snapshot saved");
        Ok(())
    }

    async fn load(&self) -> Result<Snapshot, RepositoryError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Snapshot::empty()),
            Err(e) => return Err(e.into()),
        };

        let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
        if snapshot.version > SNAPSHOT_FORMAT_VERSION {
            return Err(RepositoryError::Serialization(format!(
                "snapshot version {} is newer than supported version {}",
                snapshot.version, SNAPSHOT_FORMAT_VERSION
            )));
        }
        Ok(snapshot)
    }
}

/// Build the snapshot store selected by configuration
pub fn snapshot_store_for(backend: StorageBackend, path: impl Into<PathBuf>) -> Arc<dyn SnapshotStore> {
    match backend {
        StorageBackend::InMemory => Arc::new(InMemorySnapshotStore::new()),
        StorageBackend::File => Arc::new(JsonFileSnapshotStore::new(path)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn snapshot() -> Snapshot {
        let mut entries = BTreeMap::new();
        entries.insert("a".to_string(), json!({"name": "alpha"}));
        entries.insert("b".to_string(), json!({"name": "beta"}));
        Snapshot::new(entries)
    }

    #[tokio::test]
    async fn test_in_memory_store_roundtrip() {
        let store = InMemorySnapshotStore::new();
        assert!(store.load().await.unwrap().is_empty());
        store.save(&snapshot()).await.unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.load().await.unwrap().entries, snapshot().entries);
    }

    #[tokio::test]
    async fn test_file_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileSnapshotStore::new(dir.path().join("swarms.json"));
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_store_atomic_replace() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("agents.json");
        let store = JsonFileSnapshotStore::new(&path);

        store.save(&snapshot()).await.unwrap();
        let mut second = snapshot();
        second.entries.remove("a");
        store.save(&second).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.entries.len(), 1);
        assert!(loaded.entries.contains_key("b"));
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn test_file_store_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("swarms.json");
        std::fs::write(&path, b"{not json").unwrap();
        let store = JsonFileSnapshotStore::new(&path);
        assert!(matches!(
            store.load().await,
            Err(RepositoryError::Serialization(_))
        ));
    }
}
