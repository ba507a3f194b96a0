//! Durable snapshot storage for the function registry.
//!
//! The snapshot is a cache-of-record for restart, not a source of truth
//! during a run: writes are best-effort and asynchronous, and readers of
//! the registry always see the in-memory state.

use std::path::{Path, PathBuf};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{OrchestratorError, Result};
use crate::functions::Function;

/// Default snapshot location, relative to the working directory.
pub const DEFAULT_SNAPSHOT_PATH: &str = "data/functions.json";

/// Reads and writes the function snapshot file.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    /// Creates a store for the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the snapshot path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the snapshot.
    ///
    /// A missing file is not an error and yields an empty set; a
    /// malformed file is an error, so the caller can warn and start
    /// empty.
    pub fn load(&self) -> Result<Vec<Function>> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(OrchestratorError::Store(e.to_string())),
        };

        serde_json::from_slice(&data)
            .map_err(|e| OrchestratorError::Store(format!("malformed snapshot: {e}")))
    }

    /// Writes the snapshot as a pretty-printed JSON array.
    pub async fn write(&self, functions: &[Function]) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                tokio::fs::create_dir_all(dir)
                    .await
                    .map_err(|e| OrchestratorError::Store(e.to_string()))?;
            }
        }

        let data = serde_json::to_vec_pretty(functions)
            .map_err(|e| OrchestratorError::Store(e.to_string()))?;

        tokio::fs::write(&self.path, data)
            .await
            .map_err(|e| OrchestratorError::Store(e.to_string()))?;

        Ok(())
    }

    /// Spawns the background writer task.
    ///
    /// The task persists the latest snapshot observed on `rx` after each
    /// change; intermediate states may be skipped, the final state never
    /// is. Write failures are logged and otherwise ignored.
    pub fn spawn_writer(
        self,
        mut rx: watch::Receiver<Vec<Function>>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let snapshot = rx.borrow_and_update().clone();
                        match self.write(&snapshot).await {
                            Ok(()) => {
                                debug!(path = %self.path.display(), count = snapshot.len(), "snapshot written");
                            }
                            Err(e) => {
                                warn!(path = %self.path.display(), error = %e, "snapshot write failed");
                            }
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::FunctionRegistry;

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("functions.json"));

        let functions = store.load().unwrap();
        assert!(functions.is_empty());
    }

    #[test]
    fn malformed_file_fails_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("functions.json");
        std::fs::write(&path, b"not json at all").unwrap();

        let store = SnapshotStore::new(path);
        assert!(matches!(store.load(), Err(OrchestratorError::Store(_))));
    }

    #[tokio::test]
    async fn write_then_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("nested/functions.json"));

        let registry = FunctionRegistry::new();
        registry
            .add("hello", "hello-world", Some("greets".to_owned()))
            .unwrap();
        registry.add("bye", "busybox", None).unwrap();
        let written = registry.snapshot();

        store.write(&written).await.unwrap();
        let loaded = store.load().unwrap();

        assert_eq!(loaded, written);
    }

    #[tokio::test]
    async fn snapshot_is_valid_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("functions.json"));

        store.write(&[]).await.unwrap();

        let data = std::fs::read(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&data).unwrap();
        assert!(value.is_array());
    }

    #[tokio::test]
    async fn writer_task_persists_registry_mutations() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("functions.json"));
        let load_store = store.clone();

        let (tx, rx) = watch::channel(Vec::new());
        let cancel = CancellationToken::new();
        let writer = store.spawn_writer(rx, cancel.clone());

        let registry = FunctionRegistry::with_persistence(Vec::new(), tx);
        registry.add("hello", "hello-world", None).unwrap();

        // Give the writer a moment to observe the change.
        for _ in 0..50 {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            if load_store.load().map(|f| f.len()).unwrap_or(0) == 1 {
                break;
            }
        }

        let loaded = load_store.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name, "hello");

        cancel.cancel();
        writer.await.unwrap();
    }
}
