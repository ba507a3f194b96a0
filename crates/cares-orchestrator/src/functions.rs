//! Function registry with durable snapshots.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::{OrchestratorError, Result};

/// Unique function identifier.
pub type FunctionId = String;

/// A registered, invocable function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    /// Opaque unique identifier.
    pub id: FunctionId,
    /// Unique, case-sensitive user-facing name.
    pub name: String,
    /// Container image reference.
    pub image: String,
    /// Optional free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// Registration time.
    pub created_at: DateTime<Utc>,
    /// Whether the function can currently be invoked.
    pub status: FunctionStatus,
}

/// Function status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FunctionStatus {
    /// Invocable.
    Active,
    /// Registered but disabled.
    Inactive,
}

/// Function registry.
///
/// Readers take the shared lock and copy values out; writers hold the
/// exclusive lock only for the map mutation. Every mutation publishes a
/// fresh snapshot on the persistence channel without blocking on disk.
#[derive(Debug)]
pub struct FunctionRegistry {
    functions: RwLock<HashMap<FunctionId, Function>>,
    persist_tx: Option<watch::Sender<Vec<Function>>>,
}

impl FunctionRegistry {
    /// Creates an empty registry with no persistence.
    #[must_use]
    pub fn new() -> Self {
        Self {
            functions: RwLock::new(HashMap::new()),
            persist_tx: None,
        }
    }

    /// Creates a registry seeded from a loaded snapshot, publishing
    /// subsequent snapshots on `persist_tx`.
    #[must_use]
    pub fn with_persistence(
        initial: Vec<Function>,
        persist_tx: watch::Sender<Vec<Function>>,
    ) -> Self {
        let functions = initial.into_iter().map(|f| (f.id.clone(), f)).collect();
        Self {
            functions: RwLock::new(functions),
            persist_tx: Some(persist_tx),
        }
    }

    /// Registers a new function.
    ///
    /// Rejects empty images and duplicate names; the uniqueness check and
    /// the insert happen under one exclusive lock acquisition.
    pub fn add(
        &self,
        name: impl Into<String>,
        image: impl Into<String>,
        description: Option<String>,
    ) -> Result<Function> {
        let name = name.into();
        let image = image.into();

        if image.is_empty() {
            return Err(OrchestratorError::InvalidRequest(
                "container image is required".to_owned(),
            ));
        }

        let function = {
            let mut functions = self.functions.write();

            if functions.values().any(|f| f.name == name) {
                return Err(OrchestratorError::DuplicateFunction(name));
            }

            let function = Function {
                id: Uuid::new_v4().to_string(),
                name,
                image,
                description,
                created_at: Utc::now(),
                status: FunctionStatus::Active,
            };
            functions.insert(function.id.clone(), function.clone());
            function
        };

        self.schedule_snapshot();
        Ok(function)
    }

    /// Returns an independent copy of the function with the given id.
    pub fn get(&self, id: &str) -> Option<Function> {
        self.functions.read().get(id).cloned()
    }

    /// Returns an independent copy of the function with the given name.
    pub fn get_by_name(&self, name: &str) -> Option<Function> {
        self.functions
            .read()
            .values()
            .find(|f| f.name == name)
            .cloned()
    }

    /// Returns a full copy of the registry, ordered by creation time.
    ///
    /// Ties on `created_at` fall back to id so the ordering is stable.
    pub fn snapshot(&self) -> Vec<Function> {
        let mut functions: Vec<Function> = self.functions.read().values().cloned().collect();
        functions.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        functions
    }

    /// Removes the function with the given id. Returns false when absent.
    pub fn remove(&self, id: &str) -> bool {
        let removed = self.functions.write().remove(id).is_some();
        if removed {
            self.schedule_snapshot();
        }
        removed
    }

    /// Updates a function's status. Returns false when the id is unknown.
    pub fn update_status(&self, id: &str, status: FunctionStatus) -> bool {
        let updated = {
            let mut functions = self.functions.write();
            match functions.get_mut(id) {
                Some(function) => {
                    function.status = status;
                    true
                }
                None => false,
            }
        };
        if updated {
            self.schedule_snapshot();
        }
        updated
    }

    /// Returns the number of registered functions.
    pub fn count(&self) -> usize {
        self.functions.read().len()
    }

    /// Publishes the current snapshot for the background writer.
    ///
    /// Best-effort by contract: mutations never wait on disk I/O.
    fn schedule_snapshot(&self) {
        if let Some(tx) = &self.persist_tx {
            tx.send_replace(self.snapshot());
        }
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_get() {
        let registry = FunctionRegistry::new();
        let function = registry
            .add("hello", "hello-world", Some("greets".to_owned()))
            .unwrap();

        assert_eq!(function.name, "hello");
        assert_eq!(function.status, FunctionStatus::Active);

        let by_id = registry.get(&function.id).unwrap();
        assert_eq!(by_id, function);

        let by_name = registry.get_by_name("hello").unwrap();
        assert_eq!(by_name.id, function.id);
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let registry = FunctionRegistry::new();
        registry.add("f", "x", None).unwrap();

        let result = registry.add("f", "y", None);
        assert!(matches!(
            result,
            Err(OrchestratorError::DuplicateFunction(_))
        ));
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn names_are_case_sensitive() {
        let registry = FunctionRegistry::new();
        registry.add("hello", "x", None).unwrap();

        assert!(registry.add("Hello", "x", None).is_ok());
        assert_eq!(registry.count(), 2);
    }

    #[test]
    fn empty_image_is_rejected() {
        let registry = FunctionRegistry::new();
        let result = registry.add("f", "", None);
        assert!(matches!(result, Err(OrchestratorError::InvalidRequest(_))));
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn snapshot_ordered_by_creation() {
        let registry = FunctionRegistry::new();
        let first = registry.add("first", "img", None).unwrap();
        let second = registry.add("second", "img", None).unwrap();
        let third = registry.add("third", "img", None).unwrap();

        let snapshot = registry.snapshot();
        let ids: Vec<&str> = snapshot.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec![&first.id, &second.id, &third.id]);
    }

    #[test]
    fn remove_and_update_status() {
        let registry = FunctionRegistry::new();
        let function = registry.add("f", "img", None).unwrap();

        assert!(registry.update_status(&function.id, FunctionStatus::Inactive));
        assert_eq!(
            registry.get(&function.id).unwrap().status,
            FunctionStatus::Inactive
        );

        assert!(registry.remove(&function.id));
        assert!(!registry.remove(&function.id));
        assert!(!registry.update_status(&function.id, FunctionStatus::Active));
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn mutations_publish_snapshots() {
        let (tx, rx) = watch::channel(Vec::new());
        let registry = FunctionRegistry::with_persistence(Vec::new(), tx);

        registry.add("f", "img", None).unwrap();
        assert_eq!(rx.borrow().len(), 1);

        let id = rx.borrow()[0].id.clone();
        registry.remove(&id);
        assert!(rx.borrow().is_empty());
    }

    #[test]
    fn seeded_registry_serves_loaded_functions() {
        let function = Function {
            id: "id-1".to_owned(),
            name: "hello".to_owned(),
            image: "hello-world".to_owned(),
            description: None,
            created_at: Utc::now(),
            status: FunctionStatus::Active,
        };
        let (tx, _rx) = watch::channel(Vec::new());
        let registry = FunctionRegistry::with_persistence(vec![function.clone()], tx);

        assert_eq!(registry.count(), 1);
        assert_eq!(registry.get_by_name("hello").unwrap(), function);
    }
}
