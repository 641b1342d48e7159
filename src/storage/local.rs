//! Filesystem-backed object store.
//!
//! Each container is a directory under the store root; object keys map to
//! relative paths inside it, so `run-1/Flags.csv` lands in
//! `<root>/<container>/run-1/Flags.csv`.

use super::{validate_key, ObjectStore, StoreError, StoreResult};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn container_path(&self, container: &str) -> StoreResult<PathBuf> {
        if container.is_empty() || container.contains('/') || container.contains('\\') {
            return Err(StoreError::invalid_key(
                container,
                "container name must be a single path segment",
            ));
        }
        if container == "." || container == ".." {
            return Err(StoreError::invalid_key(container, "invalid container name"));
        }
        Ok(self.root.join(container))
    }

    fn object_path(&self, container: &str, key: &str) -> StoreResult<PathBuf> {
        validate_key(key)?;
        let mut path = self.container_path(container)?;
        path.extend(key.split('/'));
        Ok(path)
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn ensure_container(&self, container: &str) -> StoreResult<()> {
        let path = self.container_path(container)?;
        // create_dir_all tolerates the directory appearing concurrently
        tokio::fs::create_dir_all(&path).await?;
        Ok(())
    }

    async fn get_object(&self, container: &str, key: &str) -> StoreResult<Vec<u8>> {
        let container_path = self.container_path(container)?;
        if !tokio::fs::try_exists(&container_path).await? {
            return Err(StoreError::container_not_found(container));
        }
        let path = self.object_path(container, key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::not_found(container, key)),
            Err(e) => Err(e.into()),
        }
    }

    async fn put_object(
        &self,
        container: &str,
        key: &str,
        bytes: Vec<u8>,
        overwrite: bool,
    ) -> StoreResult<()> {
        let container_path = self.container_path(container)?;
        if !tokio::fs::try_exists(&container_path).await? {
            return Err(StoreError::container_not_found(container));
        }
        let path = self.object_path(container, key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        if overwrite {
            // Write beside the target and rename so readers never see a torn object
            let staging = path.with_extension(format!("partial-{}", uuid::Uuid::new_v4().simple()));
            tokio::fs::write(&staging, &bytes).await?;
            if let Err(e) = tokio::fs::rename(&staging, &path).await {
                let _ = tokio::fs::remove_file(&staging).await;
                return Err(e.into());
            }
        } else {
            use tokio::io::AsyncWriteExt;
            let mut file = match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    return Err(StoreError::already_exists(container, key))
                }
                Err(e) => return Err(e.into()),
            };
            file.write_all(&bytes).await?;
            file.flush().await?;
        }

        debug!(container = %container, key = %key, size = bytes.len(), "Stored object");
        Ok(())
    }
}
