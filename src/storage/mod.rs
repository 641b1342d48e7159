//! # Object Store Gateway
//!
//! Container-scoped get/put of named byte blobs. The pipeline only depends on
//! the [`ObjectStore`] trait; concrete backends are selected from the storage
//! connection string with [`connect`].
//!
//! No atomicity is assumed across separate calls: a job that fails halfway
//! through publishing leaves the objects it already wrote in place.

pub mod local;
pub mod memory;

pub use local::LocalObjectStore;
pub use memory::{InMemoryObjectStore, StoreOperation};

use crate::config::ConfigurationError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Object store error types
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Object not found: {container}/{key}")]
    NotFound { container: String, key: String },

    #[error("Container not found: {container}")]
    ContainerNotFound { container: String },

    #[error("Object already exists: {container}/{key}")]
    AlreadyExists { container: String, key: String },

    #[error("Invalid object key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn not_found(container: impl Into<String>, key: impl Into<String>) -> Self {
        Self::NotFound {
            container: container.into(),
            key: key.into(),
        }
    }

    pub fn container_not_found(container: impl Into<String>) -> Self {
        Self::ContainerNotFound {
            container: container.into(),
        }
    }

    pub fn already_exists(container: impl Into<String>, key: impl Into<String>) -> Self {
        Self::AlreadyExists {
            container: container.into(),
            key: key.into(),
        }
    }

    pub fn invalid_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// True for missing containers and missing objects
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::NotFound { .. } | StoreError::ContainerNotFound { .. }
        )
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Container-scoped blob storage
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Create the container if needed. Must succeed when it already exists,
    /// including when another worker creates it concurrently.
    async fn ensure_container(&self, container: &str) -> StoreResult<()>;

    /// Read the full content of an object
    async fn get_object(&self, container: &str, key: &str) -> StoreResult<Vec<u8>>;

    /// Write an object, replacing any existing object when `overwrite` is set
    async fn put_object(
        &self,
        container: &str,
        key: &str,
        bytes: Vec<u8>,
        overwrite: bool,
    ) -> StoreResult<()>;
}

/// Reject keys that could escape a container or address nothing
pub(crate) fn validate_key(key: &str) -> StoreResult<()> {
    if key.is_empty() {
        return Err(StoreError::invalid_key(key, "key is empty"));
    }
    if key.starts_with('/') || key.starts_with('\\') {
        return Err(StoreError::invalid_key(key, "key must be relative"));
    }
    for segment in key.split('/') {
        match segment {
            "" => return Err(StoreError::invalid_key(key, "key has an empty segment")),
            "." | ".." => {
                return Err(StoreError::invalid_key(
                    key,
                    "key may not contain relative segments",
                ))
            }
            s if s.contains('\\') => {
                return Err(StoreError::invalid_key(key, "key may not contain '\\'"))
            }
            _ => {}
        }
    }
    Ok(())
}

/// Build a store from a connection string.
///
/// - `memory:` selects a fresh [`InMemoryObjectStore`]
/// - `file://<path>` or a bare filesystem path selects a [`LocalObjectStore`]
pub fn connect(connection: &str) -> Result<Arc<dyn ObjectStore>, ConfigurationError> {
    let connection = connection.trim();
    if connection.is_empty() {
        return Err(ConfigurationError::missing_required_field(
            "storage_connection",
            "storage",
        ));
    }

    if connection == "memory:" || connection == "memory://" {
        return Ok(Arc::new(InMemoryObjectStore::new()));
    }

    let root = if let Some(path) = connection.strip_prefix("file://") {
        PathBuf::from(path)
    } else if connection.contains("://") || connection.contains("AccountKey=") {
        return Err(ConfigurationError::invalid_value(
            "storage_connection",
            "[REDACTED]",
            "unsupported storage backend; expected memory: or file://<path>",
        ));
    } else {
        PathBuf::from(connection)
    };

    Ok(Arc::new(LocalObjectStore::new(root)))
}
