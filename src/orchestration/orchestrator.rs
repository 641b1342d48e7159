//! # Job Orchestrator
//!
//! Drives one job through its phases, strictly in order:
//!
//! 1. parse the message into a [`JobDescriptor`]
//! 2. acquire a [`Workspace`]
//! 3. fetch the input object and stage it in the workspace
//! 4. decode the input table
//! 5. run the validation engine with auto-merge
//! 6. materialize every applicable artifact into the workspace
//! 7. publish each artifact as `{run_id}/{file_name}` in the output container
//! 8. release the workspace, whatever happened in 2-7
//!
//! The first failing phase aborts the rest. Nothing is retried here; the
//! error is logged with the job identifiers and returned so the caller can
//! apply redelivery or dead-letter policy. A publish failure can leave some
//! artifacts of the run in the store. A later redelivery runs under a new run
//! id and never touches that partial prefix.

use super::types::{PublishedArtifact, RunContext, RunReport};
use super::workspace::Workspace;
use crate::artifacts::{ArtifactName, ArtifactWriters, OutputArtifactSet, RunSummary, WriteError};
use crate::config::WorkerConfig;
use crate::constants::operations;
use crate::error::{JobError, JobPhase, Result};
use crate::logging::log_job_operation;
use crate::messaging::JobDescriptor;
use crate::storage::ObjectStore;
use crate::table::Table;
use crate::validation::{EngineError, EngineRun, RunRequest, ValidationEngine, ValidationResult};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, error, info, instrument, warn, Span};

const INPUT_SLOT: &str = "input";

pub struct JobOrchestrator {
    config: Arc<WorkerConfig>,
    store: Arc<dyn ObjectStore>,
    engine: Arc<dyn ValidationEngine>,
    writers: Arc<dyn ArtifactWriters>,
}

impl JobOrchestrator {
    pub fn new(
        config: Arc<WorkerConfig>,
        store: Arc<dyn ObjectStore>,
        engine: Arc<dyn ValidationEngine>,
        writers: Arc<dyn ArtifactWriters>,
    ) -> Self {
        Self {
            config,
            store,
            engine,
            writers,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Process a raw queue payload end to end
    #[instrument(skip(self, payload), fields(payload_bytes = payload.len()))]
    pub async fn process_message(&self, payload: &[u8]) -> Result<RunReport> {
        let job = match JobDescriptor::parse(payload, &self.config.default_profile) {
            Ok(job) => job,
            Err(e) => {
                error!(
                    phase = %e.phase(),
                    error_code = e.error_code(),
                    error = %e,
                    "Rejected malformed job message"
                );
                log_job_operation(operations::JOB_FAILED, None, None, "malformed", Some(&e.to_string()));
                return Err(e);
            }
        };
        self.process_job(&job).await
    }

    /// Run phases 2-8 for an already parsed job
    #[instrument(
        skip(self, job),
        fields(
            upload_container = %job.upload_container(),
            upload_blob = %job.upload_blob(),
            profile = %job.profile(),
            run_id = tracing::field::Empty,
        )
    )]
    pub async fn process_job(&self, job: &JobDescriptor) -> Result<RunReport> {
        log_job_operation(operations::JOB_STARTED, Some(job), None, "started", None);

        let mut workspace = Workspace::acquire(self.config.workspace_root.as_deref())
            .map_err(|e| JobError::workspace(JobPhase::AcquireWorkspace, "create job workspace", e))
            .inspect_err(|e| self.log_failure(job, None, e))?;

        let mut run_id = None;
        let outcome = self.run_phases(job, &mut workspace, &mut run_id).await;

        let workspace_path = workspace.path().to_path_buf();
        if let Err(e) = workspace.release() {
            warn!(
                phase = %JobPhase::ReleaseWorkspace,
                workspace = %workspace_path.display(),
                error = %e,
                "Failed to remove job workspace"
            );
        }

        match &outcome {
            Ok(report) => {
                info!(
                    run_id = %report.run_id,
                    artifacts = report.published.len(),
                    total_rows_checked = report.summary.total_rows_checked,
                    total_issues = report.summary.total_issues,
                    "Validation job complete; outputs uploaded to {}/{}/",
                    report.output_container,
                    report.run_id
                );
                log_job_operation(
                    operations::JOB_COMPLETED,
                    Some(job),
                    Some(&report.run_id),
                    "completed",
                    None,
                );
            }
            Err(e) => self.log_failure(job, run_id.as_deref(), e),
        }

        outcome
    }

    async fn run_phases(
        &self,
        job: &JobDescriptor,
        workspace: &mut Workspace,
        run_id: &mut Option<String>,
    ) -> Result<RunReport> {
        let input = self.fetch_input(job, workspace).await?;

        let table = Table::decode(job.upload_blob(), &input)
            .map_err(|e| JobError::input_format(job.upload_blob(), e))?;
        drop(input);
        debug!(
            rows = table.row_count(),
            columns = table.columns.len(),
            "Decoded input table"
        );

        let table = Arc::new(table);
        let request = RunRequest {
            profile: job.profile().to_string(),
            auto_merge: true,
        };
        let run = self
            .validate(Arc::clone(&table), request)
            .await
            .map_err(|e| JobError::validation_engine(job.profile(), e))?;

        Span::current().record("run_id", run.run_id.as_str());
        *run_id = Some(run.run_id.clone());

        let context = RunContext::new(
            run.run_id,
            job.profile(),
            OutputArtifactSet::for_result(&run.result),
        );
        info!(
            issues = run.result.issues.len(),
            merged_rows = run.result.merged.row_count(),
            merge_map = context.artifacts.contains(ArtifactName::MergeMap),
            runtime_ms = run.result.runtime_ms,
            "Validation engine run finished"
        );

        let result = Arc::new(run.result);
        let summary = RunSummary::from_run(&table, &result);
        self.materialize(&context, workspace, table, result, summary)
            .await?;

        let published = self.publish(&context, workspace).await?;

        Ok(RunReport {
            run_id: context.run_id,
            profile: context.profile,
            output_container: self.config.output_container.clone(),
            summary,
            published,
        })
    }

    async fn fetch_input(&self, job: &JobDescriptor, workspace: &mut Workspace) -> Result<Vec<u8>> {
        let bytes = self
            .store
            .get_object(job.upload_container(), job.upload_blob())
            .await
            .map_err(|e| JobError::input_fetch(job.upload_container(), job.upload_blob(), e))?;

        let local = workspace
            .write_file(INPUT_SLOT, &job.local_file_name(), &bytes)
            .await
            .map_err(|e| JobError::workspace(JobPhase::FetchInput, "stage input in workspace", e))?;
        debug!(local = %local.display(), size = bytes.len(), "Fetched input");
        Ok(bytes)
    }

    /// Run the engine on the blocking pool
    async fn validate(
        &self,
        table: Arc<Table>,
        request: RunRequest,
    ) -> std::result::Result<EngineRun, EngineError> {
        let engine = Arc::clone(&self.engine);
        let handle = Handle::current();
        tokio::task::spawn_blocking(move || handle.block_on(engine.run(&table, &request)))
            .await
            .map_err(|e| EngineError::execution(format!("validation task failed: {e}")))?
    }

    async fn materialize(
        &self,
        context: &RunContext,
        workspace: &mut Workspace,
        input: Arc<Table>,
        result: Arc<ValidationResult>,
        summary: RunSummary,
    ) -> Result<()> {
        let writers = Arc::clone(&self.writers);
        let artifacts = context.artifacts.names().to_vec();
        let rendered = tokio::task::spawn_blocking(move || {
            artifacts
                .into_iter()
                .map(|artifact| {
                    render(writers.as_ref(), artifact, &input, &result, &summary)
                        .map(|bytes| (artifact, bytes))
                        .map_err(|e| JobError::artifact_write(artifact.file_name(), e))
                })
                .collect::<Result<Vec<_>>>()
        })
        .await
        .map_err(|e| {
            JobError::artifact_write(
                "artifacts",
                WriteError::Format(format!("render task failed: {e}")),
            )
        })??;

        for (artifact, bytes) in rendered {
            workspace
                .write_file(artifact.file_name(), artifact.file_name(), &bytes)
                .await
                .map_err(|e| JobError::artifact_write(artifact.file_name(), WriteError::Io(e)))?;
        }
        Ok(())
    }

    async fn publish(
        &self,
        context: &RunContext,
        workspace: &Workspace,
    ) -> Result<Vec<PublishedArtifact>> {
        let container = self.config.output_container.as_str();
        self.store
            .ensure_container(container)
            .await
            .map_err(|e| JobError::output_publish(container, format!("{}/", context.run_id), e))?;

        let mut published = Vec::with_capacity(context.artifacts.len());
        for &artifact in context.artifacts.names() {
            let key = context.object_key(artifact);
            let bytes = workspace
                .read_file(artifact.file_name())
                .await
                .map_err(|e| JobError::workspace(JobPhase::PublishOutputs, "read materialized artifact", e))?;
            let size_bytes = bytes.len();

            self.store
                .put_object(container, &key, bytes, true)
                .await
                .map_err(|e| JobError::output_publish(container, &key, e))?;

            info!(
                operation = operations::ARTIFACT_PUBLISHED,
                container = %container,
                key = %key,
                size_bytes,
                "Uploaded {} to {}/{}",
                artifact,
                container,
                key
            );
            published.push(PublishedArtifact {
                name: artifact,
                key,
                size_bytes,
            });
        }
        Ok(published)
    }

    fn log_failure(&self, job: &JobDescriptor, run_id: Option<&str>, err: &JobError) {
        error!(
            phase = %err.phase(),
            error_code = err.error_code(),
            category = %err.category(),
            run_id = run_id,
            error = %err,
            "Worker failure"
        );
        log_job_operation(
            operations::JOB_FAILED,
            Some(job),
            run_id,
            err.phase().as_str(),
            Some(&err.to_string()),
        );
    }
}

fn render(
    writers: &dyn ArtifactWriters,
    artifact: ArtifactName,
    input: &Table,
    result: &ValidationResult,
    summary: &RunSummary,
) -> std::result::Result<Vec<u8>, WriteError> {
    match artifact {
        ArtifactName::Flags => writers.write_flags(&result.issues),
        ArtifactName::Summary => writers.write_summary(summary, &result.issues),
        ArtifactName::FlaggedView => writers.write_flagged_view(input, &result.issues),
        ArtifactName::MergeMap => match result.effective_merge_map() {
            Some(map) => writers.write_merge_map(map),
            None => Err(WriteError::Format("run produced no merge map".to_string())),
        },
        ArtifactName::MergedDataset => writers.write_merged_dataset(&result.merged),
    }
}
