//! # Job Workspace
//!
//! Exclusively owned local staging directory for one job. The directory is
//! removed when the [`Workspace`] is released or dropped, so every exit path
//! of a job (errors, panics, a cancelled future) tears it down. No two jobs
//! ever share one: each acquisition creates a fresh uniquely named directory.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

const WORKSPACE_PREFIX: &str = "job-";

#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
    files: BTreeMap<String, PathBuf>,
}

impl Workspace {
    /// Create a new workspace under `root`, or the system temp dir
    pub fn acquire(root: Option<&Path>) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(WORKSPACE_PREFIX);
        let dir = match root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        debug!(workspace = %dir.path().display(), "Acquired job workspace");
        Ok(Self {
            dir,
            files: BTreeMap::new(),
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Materialize `bytes` as `file_name` and register it under `slot`
    pub async fn write_file(&mut self, slot: &str, file_name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        if file_name.is_empty()
            || file_name == "."
            || file_name == ".."
            || file_name.contains(['/', '\\'])
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid workspace file name {file_name:?}"),
            ));
        }
        let path = self.dir.path().join(file_name);
        tokio::fs::write(&path, bytes).await?;
        self.files.insert(slot.to_string(), path.clone());
        Ok(path)
    }

    /// Read back the file registered under `slot`
    pub async fn read_file(&self, slot: &str) -> io::Result<Vec<u8>> {
        let path = self.file(slot).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no workspace file registered for {slot}"),
            )
        })?;
        tokio::fs::read(path).await
    }

    pub fn file(&self, slot: &str) -> Option<&Path> {
        self.files.get(slot).map(PathBuf::as_path)
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Delete the workspace and everything in it, reporting removal errors
    pub fn release(self) -> io::Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close()?;
        debug!(workspace = %path.display(), "Released job workspace");
        Ok(())
    }
}
