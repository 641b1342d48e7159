//! # Worker Bootstrap
//!
//! Builds a ready-to-run [`WorkerRuntime`] from a validated configuration:
//! storage backend from the connection string, rules engine from the rules
//! file, standard artifact writers and the spool-directory queue.

use super::runtime::WorkerRuntime;
use crate::artifacts::StandardWriters;
use crate::config::{ConfigurationError, WorkerConfig};
use crate::messaging::{DirectoryQueue, QueueError};
use crate::orchestration::JobOrchestrator;
use crate::storage;
use crate::validation::{EngineError, RulesEngine};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("Failed to load validation rules: {0}")]
    Rules(#[from] EngineError),

    #[error("Failed to open job queue: {0}")]
    Queue(#[from] QueueError),
}

pub async fn bootstrap_worker(config: WorkerConfig) -> Result<WorkerRuntime, BootstrapError> {
    config.validate()?;

    let store = storage::connect(&config.storage_connection)?;
    let engine = RulesEngine::from_path(&config.rules_path)?;
    let queue = DirectoryQueue::open(&config.queue.directory).await?;
    queue.recover().await?;

    info!(
        output_container = %config.output_container,
        rules_path = %config.rules_path.display(),
        profiles = engine.rules().profiles.len(),
        queue = %config.queue.directory.display(),
        "Worker bootstrapped"
    );

    let orchestrator = JobOrchestrator::new(
        Arc::new(config),
        store,
        Arc::new(engine),
        Arc::new(StandardWriters::new()),
    );
    Ok(WorkerRuntime::new(Arc::new(orchestrator), Arc::new(queue)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bootstrap_with_local_backends() {
        let dir = tempfile::tempdir().unwrap();
        let rules = dir.path().join("rules.yml");
        std::fs::write(&rules, "profiles:\n  A1:\n    required: [id]\n").unwrap();

        let mut config = WorkerConfig {
            storage_connection: format!("file://{}", dir.path().join("store").display()),
            rules_path: rules,
            ..Default::default()
        };
        config.queue.directory = dir.path().join("queue");

        let runtime = bootstrap_worker(config).await.unwrap();
        assert_eq!(runtime.orchestrator().config().output_container, "outputs");
        assert!(dir.path().join("queue/pending").is_dir());
    }

    #[tokio::test]
    async fn test_bootstrap_requires_rules_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = WorkerConfig {
            storage_connection: "memory:".to_string(),
            rules_path: dir.path().join("missing.yml"),
            ..Default::default()
        };
        config.queue.directory = dir.path().join("queue");

        let err = bootstrap_worker(config).await.err().unwrap();
        assert!(matches!(err, BootstrapError::Rules(_)));
    }

    #[tokio::test]
    async fn test_bootstrap_requires_storage_connection() {
        let err = bootstrap_worker(WorkerConfig::default()).await.err().unwrap();
        assert!(matches!(err, BootstrapError::Configuration(_)));
    }
}
