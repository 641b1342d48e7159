//! In-memory object store.
//!
//! Backs tests and `memory:` connections. Every call is recorded so callers
//! can assert on exactly which gateway operations a job performed.

use super::{validate_key, ObjectStore, StoreError, StoreResult};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::BTreeMap;

/// One recorded gateway call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOperation {
    EnsureContainer { container: String },
    Get { container: String, key: String },
    Put { container: String, key: String },
}

#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    containers: DashMap<String, BTreeMap<String, Vec<u8>>>,
    operations: Mutex<Vec<StoreOperation>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object, creating its container as needed. Not recorded.
    pub fn insert(&self, container: &str, key: &str, bytes: impl Into<Vec<u8>>) {
        self.containers
            .entry(container.to_string())
            .or_default()
            .insert(key.to_string(), bytes.into());
    }

    /// Read an object without recording the access
    pub fn object(&self, container: &str, key: &str) -> Option<Vec<u8>> {
        self.containers
            .get(container)
            .and_then(|objects| objects.get(key).cloned())
    }

    /// Sorted keys in a container, optionally filtered by prefix
    pub fn keys(&self, container: &str, prefix: &str) -> Vec<String> {
        self.containers
            .get(container)
            .map(|objects| {
                objects
                    .keys()
                    .filter(|key| key.starts_with(prefix))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn has_container(&self, container: &str) -> bool {
        self.containers.contains_key(container)
    }

    pub fn operations(&self) -> Vec<StoreOperation> {
        self.operations.lock().clone()
    }

    fn record(&self, operation: StoreOperation) {
        self.operations.lock().push(operation);
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn ensure_container(&self, container: &str) -> StoreResult<()> {
        self.record(StoreOperation::EnsureContainer {
            container: container.to_string(),
        });
        self.containers.entry(container.to_string()).or_default();
        Ok(())
    }

    async fn get_object(&self, container: &str, key: &str) -> StoreResult<Vec<u8>> {
        self.record(StoreOperation::Get {
            container: container.to_string(),
            key: key.to_string(),
        });
        let objects = self
            .containers
            .get(container)
            .ok_or_else(|| StoreError::container_not_found(container))?;
        objects
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::not_found(container, key))
    }

    async fn put_object(
        &self,
        container: &str,
        key: &str,
        bytes: Vec<u8>,
        overwrite: bool,
    ) -> StoreResult<()> {
        self.record(StoreOperation::Put {
            container: container.to_string(),
            key: key.to_string(),
        });
        validate_key(key)?;
        let mut objects = self
            .containers
            .get_mut(container)
            .ok_or_else(|| StoreError::container_not_found(container))?;
        if !overwrite && objects.contains_key(key) {
            return Err(StoreError::already_exists(container, key));
        }
        objects.insert(key.to_string(), bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_missing_container_and_object() {
        let store = InMemoryObjectStore::new();
        let err = store.get_object("uploads", "a.csv").await.unwrap_err();
        assert!(matches!(err, StoreError::ContainerNotFound { .. }));

        store.ensure_container("uploads").await.unwrap();
        let err = store.get_object("uploads", "a.csv").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_ensure_container_is_idempotent() {
        let store = InMemoryObjectStore::new();
        store.ensure_container("outputs").await.unwrap();
        store.put_object("outputs", "r/x", b"1".to_vec(), true).await.unwrap();
        store.ensure_container("outputs").await.unwrap();
        assert_eq!(store.object("outputs", "r/x"), Some(b"1".to_vec()));
    }

    #[tokio::test]
    async fn test_put_overwrite_semantics() {
        let store = InMemoryObjectStore::new();
        store.ensure_container("outputs").await.unwrap();
        store.put_object("outputs", "k", b"a".to_vec(), true).await.unwrap();
        store.put_object("outputs", "k", b"b".to_vec(), true).await.unwrap();
        assert_eq!(store.object("outputs", "k"), Some(b"b".to_vec()));

        let err = store
            .put_object("outputs", "k", b"c".to_vec(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
        assert_eq!(store.operations().len(), 4);
    }

    #[tokio::test]
    async fn test_keys_by_prefix() {
        let store = InMemoryObjectStore::new();
        store.insert("outputs", "run-a/Flags.csv", "x");
        store.insert("outputs", "run-a/Summary.txt", "x");
        store.insert("outputs", "run-b/Flags.csv", "x");
        assert_eq!(
            store.keys("outputs", "run-a/"),
            vec!["run-a/Flags.csv".to_string(), "run-a/Summary.txt".to_string()]
        );
        assert!(store.operations().is_empty());
    }
}
