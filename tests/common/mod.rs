//! Shared fixtures for integration tests.
//!
//! Deterministic collaborators with failure injection: an engine whose
//! results are scripted, writers that fail on a chosen artifact and a store
//! that fails a chosen call.

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use validator_worker::artifacts::{
    ArtifactName, ArtifactWriters, RunSummary, StandardWriters, WriteError,
};
use validator_worker::storage::{InMemoryObjectStore, ObjectStore, StoreError, StoreResult};
use validator_worker::table::Table;
use validator_worker::validation::{
    EngineError, EngineRun, Issue, MergeEntry, MergeMap, RunRequest, Severity, ValidationEngine,
    ValidationResult,
};
use validator_worker::{JobOrchestrator, WorkerConfig};

pub const UPLOADS: &str = "uploads";
pub const OUTPUTS: &str = "outputs";

/// CSV with an `id,name` header and `rows` data rows
pub fn csv_with_rows(rows: usize) -> Vec<u8> {
    let mut out = String::from("id,name\n");
    for i in 0..rows {
        out.push_str(&format!("{i},name-{i}\n"));
    }
    out.into_bytes()
}

pub fn job_payload(blob: &str, profile: Option<&str>) -> Vec<u8> {
    let mut value = serde_json::json!({
        "upload_container": UPLOADS,
        "upload_blob": blob,
    });
    if let Some(profile) = profile {
        value["profile"] = serde_json::Value::String(profile.to_string());
    }
    serde_json::to_vec(&value).unwrap()
}

pub fn test_config(workspace_root: &Path) -> WorkerConfig {
    WorkerConfig {
        storage_connection: "memory:".to_string(),
        output_container: OUTPUTS.to_string(),
        workspace_root: Some(workspace_root.to_path_buf()),
        ..Default::default()
    }
}

/// Entries left under a workspace root; zero when it does not exist
pub fn workspace_entries(root: &Path) -> usize {
    std::fs::read_dir(root)
        .map(|entries| entries.count())
        .unwrap_or(0)
}

pub fn orchestrator(
    workspace_root: &Path,
    store: Arc<dyn ObjectStore>,
    engine: Arc<dyn ValidationEngine>,
    writers: Arc<dyn ArtifactWriters>,
) -> JobOrchestrator {
    JobOrchestrator::new(Arc::new(test_config(workspace_root)), store, engine, writers)
}

/// Scripted validation engine with sequential run ids
#[derive(Debug, Default)]
pub struct FixtureEngine {
    issues: usize,
    merge: Option<(usize, usize)>,
    fail: bool,
    blocking_delay: Option<Duration>,
    runs: AtomicUsize,
    requests: Mutex<Vec<RunRequest>>,
}

impl FixtureEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flag the first `count` rows
    pub fn with_issues(mut self, count: usize) -> Self {
        self.issues = count;
        self
    }

    /// Consolidate input row `drop` into row `keep`
    pub fn with_merge(mut self, keep: usize, drop: usize) -> Self {
        self.merge = Some((keep, drop));
        self
    }

    /// Block the calling thread for `delay` on every run, like CPU-bound rules
    pub fn with_blocking_delay(mut self, delay: Duration) -> Self {
        self.blocking_delay = Some(delay);
        self
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<RunRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn run_count(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ValidationEngine for FixtureEngine {
    async fn run(&self, table: &Table, request: &RunRequest) -> Result<EngineRun, EngineError> {
        self.requests.lock().unwrap().push(request.clone());
        let n = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(delay) = self.blocking_delay {
            std::thread::sleep(delay);
        }
        if self.fail {
            return Err(EngineError::execution("scripted engine failure"));
        }

        let issues = (0..self.issues.min(table.row_count()))
            .map(|row| {
                Issue::new(
                    row,
                    Some("name"),
                    Severity::Error,
                    "missing_value",
                    "scripted issue",
                )
            })
            .collect();

        let (merged, merge_map) = match self.merge {
            Some((keep, drop)) if request.auto_merge => {
                let rows = table
                    .rows
                    .iter()
                    .enumerate()
                    .filter(|(idx, _)| *idx != drop)
                    .map(|(_, row)| row.clone())
                    .collect();
                let merged_row = if keep < drop { keep } else { keep - 1 };
                let entries = [keep, drop]
                    .into_iter()
                    .map(|source_row| MergeEntry {
                        source_row,
                        merged_row,
                        key: format!("key-{keep}"),
                    })
                    .collect();
                (
                    Table::new(table.columns.clone(), rows),
                    Some(MergeMap { entries }),
                )
            }
            _ => (table.clone(), None),
        };

        Ok(EngineRun {
            run_id: format!("run-{n:04}"),
            result: ValidationResult {
                issues,
                merged,
                merge_map,
                runtime_ms: 7,
            },
        })
    }
}

/// Standard writers that fail on one artifact
#[derive(Debug)]
pub struct FailingWriters {
    inner: StandardWriters,
    fail_on: ArtifactName,
}

impl FailingWriters {
    pub fn new(fail_on: ArtifactName) -> Self {
        Self {
            inner: StandardWriters::new(),
            fail_on,
        }
    }

    fn check(&self, artifact: ArtifactName) -> Result<(), WriteError> {
        if artifact == self.fail_on {
            return Err(WriteError::Format(format!("injected failure for {artifact}")));
        }
        Ok(())
    }
}

impl ArtifactWriters for FailingWriters {
    fn write_flags(&self, issues: &[Issue]) -> Result<Vec<u8>, WriteError> {
        self.check(ArtifactName::Flags)?;
        self.inner.write_flags(issues)
    }

    fn write_summary(&self, summary: &RunSummary, issues: &[Issue]) -> Result<Vec<u8>, WriteError> {
        self.check(ArtifactName::Summary)?;
        self.inner.write_summary(summary, issues)
    }

    fn write_flagged_view(&self, input: &Table, issues: &[Issue]) -> Result<Vec<u8>, WriteError> {
        self.check(ArtifactName::FlaggedView)?;
        self.inner.write_flagged_view(input, issues)
    }

    fn write_merge_map(&self, merge_map: &MergeMap) -> Result<Vec<u8>, WriteError> {
        self.check(ArtifactName::MergeMap)?;
        self.inner.write_merge_map(merge_map)
    }

    fn write_merged_dataset(&self, merged: &Table) -> Result<Vec<u8>, WriteError> {
        self.check(ArtifactName::MergedDataset)?;
        self.inner.write_merged_dataset(merged)
    }
}

/// In-memory store that fails one chosen call
#[derive(Debug)]
pub struct FlakyStore {
    inner: Arc<InMemoryObjectStore>,
    fail_put_at: Option<usize>,
    fail_ensure: bool,
    puts: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: Arc<InMemoryObjectStore>) -> Self {
        Self {
            inner,
            fail_put_at: None,
            fail_ensure: false,
            puts: AtomicUsize::new(0),
        }
    }

    /// Fail the put with this zero-based index across the store's lifetime
    pub fn fail_put_at(mut self, index: usize) -> Self {
        self.fail_put_at = Some(index);
        self
    }

    pub fn fail_ensure_container(mut self) -> Self {
        self.fail_ensure = true;
        self
    }
}

#[async_trait]
impl ObjectStore for FlakyStore {
    async fn ensure_container(&self, container: &str) -> StoreResult<()> {
        if self.fail_ensure {
            return Err(StoreError::transport("injected ensure_container failure"));
        }
        self.inner.ensure_container(container).await
    }

    async fn get_object(&self, container: &str, key: &str) -> StoreResult<Vec<u8>> {
        self.inner.get_object(container, key).await
    }

    async fn put_object(
        &self,
        container: &str,
        key: &str,
        bytes: Vec<u8>,
        overwrite: bool,
    ) -> StoreResult<()> {
        let index = self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_put_at == Some(index) {
            return Err(StoreError::transport(format!("injected put failure for {key}")));
        }
        self.inner.put_object(container, key, bytes, overwrite).await
    }
}
