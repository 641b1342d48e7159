//! # Job Error Taxonomy
//!
//! Structured errors for the job pipeline using thiserror. Each variant
//! belongs to exactly one [`JobPhase`] and carries the identifiers needed to
//! diagnose the failure without replaying the message.
//!
//! The only permanent failure is [`JobError::MalformedJob`]: the message itself
//! can never be processed and should be routed to a dead-letter path. All
//! other failures are treated as transient and left to queue redelivery.

use crate::artifacts::WriteError;
use crate::storage::StoreError;
use crate::table::TableError;
use crate::validation::EngineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Ordered phases of a single job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    Parse,
    AcquireWorkspace,
    FetchInput,
    DecodeInput,
    Validate,
    MaterializeArtifacts,
    PublishOutputs,
    ReleaseWorkspace,
}

impl JobPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobPhase::Parse => "parse",
            JobPhase::AcquireWorkspace => "acquire_workspace",
            JobPhase::FetchInput => "fetch_input",
            JobPhase::DecodeInput => "decode_input",
            JobPhase::Validate => "validate",
            JobPhase::MaterializeArtifacts => "materialize_artifacts",
            JobPhase::PublishOutputs => "publish_outputs",
            JobPhase::ReleaseWorkspace => "release_workspace",
        }
    }
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the invoking runtime should treat a failed job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// The message can never succeed; dead-letter it
    Permanent,

    /// The message may succeed on redelivery
    Transient,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Permanent => write!(f, "Permanent"),
            ErrorCategory::Transient => write!(f, "Transient"),
        }
    }
}

/// Failure of one job, tagged by the phase that raised it
#[derive(Error, Debug)]
pub enum JobError {
    #[error("Malformed job message: {reason}")]
    MalformedJob { reason: String },

    #[error("Workspace error during {phase}: {message}: {source}")]
    Workspace {
        phase: JobPhase,
        message: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Input fetch failed for {container}/{blob}: {source}")]
    InputFetch {
        container: String,
        blob: String,
        #[source]
        source: StoreError,
    },

    #[error("Input format error for {blob}: {source}")]
    InputFormat {
        blob: String,
        #[source]
        source: TableError,
    },

    #[error("Validation engine error for profile {profile}: {source}")]
    ValidationEngine {
        profile: String,
        #[source]
        source: EngineError,
    },

    #[error("Artifact write failed for {artifact}: {source}")]
    ArtifactWrite {
        artifact: String,
        #[source]
        source: WriteError,
    },

    #[error("Output publish failed for {container}/{key}: {source}")]
    OutputPublish {
        container: String,
        key: String,
        #[source]
        source: StoreError,
    },
}

impl JobError {
    /// Create a malformed job error
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedJob {
            reason: reason.into(),
        }
    }

    /// Create a workspace error for the given phase
    pub fn workspace(phase: JobPhase, message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Workspace {
            phase,
            message: message.into(),
            source,
        }
    }

    /// Create an input fetch error
    pub fn input_fetch(
        container: impl Into<String>,
        blob: impl Into<String>,
        source: StoreError,
    ) -> Self {
        Self::InputFetch {
            container: container.into(),
            blob: blob.into(),
            source,
        }
    }

    /// Create an input format error
    pub fn input_format(blob: impl Into<String>, source: TableError) -> Self {
        Self::InputFormat {
            blob: blob.into(),
            source,
        }
    }

    /// Create a validation engine error
    pub fn validation_engine(profile: impl Into<String>, source: EngineError) -> Self {
        Self::ValidationEngine {
            profile: profile.into(),
            source,
        }
    }

    /// Create an artifact write error
    pub fn artifact_write(artifact: impl Into<String>, source: WriteError) -> Self {
        Self::ArtifactWrite {
            artifact: artifact.into(),
            source,
        }
    }

    /// Create an output publish error
    pub fn output_publish(
        container: impl Into<String>,
        key: impl Into<String>,
        source: StoreError,
    ) -> Self {
        Self::OutputPublish {
            container: container.into(),
            key: key.into(),
            source,
        }
    }

    /// Phase in which this error was raised
    pub fn phase(&self) -> JobPhase {
        match self {
            JobError::MalformedJob { .. } => JobPhase::Parse,
            JobError::Workspace { phase, .. } => *phase,
            JobError::InputFetch { .. } => JobPhase::FetchInput,
            JobError::InputFormat { .. } => JobPhase::DecodeInput,
            JobError::ValidationEngine { .. } => JobPhase::Validate,
            JobError::ArtifactWrite { .. } => JobPhase::MaterializeArtifacts,
            JobError::OutputPublish { .. } => JobPhase::PublishOutputs,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            JobError::MalformedJob { .. } => ErrorCategory::Permanent,
            _ => ErrorCategory::Transient,
        }
    }

    /// True when the message itself is unprocessable
    pub fn is_poison(&self) -> bool {
        self.category() == ErrorCategory::Permanent
    }

    /// Stable error code for logs and dead-letter reasons
    pub fn error_code(&self) -> &'static str {
        match self {
            JobError::MalformedJob { .. } => "MALFORMED_JOB",
            JobError::Workspace { .. } => "WORKSPACE",
            JobError::InputFetch { .. } => "INPUT_FETCH",
            JobError::InputFormat { .. } => "INPUT_FORMAT",
            JobError::ValidationEngine { .. } => "VALIDATION_ENGINE",
            JobError::ArtifactWrite { .. } => "ARTIFACT_WRITE",
            JobError::OutputPublish { .. } => "OUTPUT_PUBLISH",
        }
    }
}

/// Result type alias for job operations
pub type Result<T> = std::result::Result<T, JobError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_malformed_is_poison() {
        let poison = JobError::malformed("missing upload_blob");
        assert!(poison.is_poison());
        assert_eq!(poison.phase(), JobPhase::Parse);
        assert_eq!(poison.category(), ErrorCategory::Permanent);

        let fetch = JobError::input_fetch(
            "uploads",
            "data.csv",
            StoreError::not_found("uploads", "data.csv"),
        );
        assert!(!fetch.is_poison());
        assert_eq!(fetch.phase(), JobPhase::FetchInput);
        assert_eq!(fetch.category(), ErrorCategory::Transient);

        let publish = JobError::output_publish(
            "outputs",
            "run/Flags.csv",
            StoreError::transport("connection reset"),
        );
        assert!(!publish.is_poison());
        assert_eq!(publish.phase(), JobPhase::PublishOutputs);
    }

    #[test]
    fn test_workspace_error_keeps_phase() {
        let err = JobError::workspace(
            JobPhase::FetchInput,
            "write input",
            std::io::Error::other("disk full"),
        );
        assert_eq!(err.phase(), JobPhase::FetchInput);
        assert_eq!(err.error_code(), "WORKSPACE");
    }

    #[test]
    fn test_error_display() {
        let err = JobError::input_fetch(
            "uploads",
            "batch/data.csv",
            StoreError::not_found("uploads", "batch/data.csv"),
        );
        let display = format!("{err}");
        assert!(display.contains("Input fetch failed"));
        assert!(display.contains("uploads/batch/data.csv"));
        assert_eq!(JobPhase::MaterializeArtifacts.to_string(), "materialize_artifacts");
    }
}
