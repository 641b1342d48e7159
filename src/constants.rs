//! # System Constants
//!
//! Defaults and fixed names shared by the job pipeline, configuration and
//! artifact layout.

/// Profile used when a job message does not name one
pub const DEFAULT_PROFILE: &str = "A1";

/// Container that receives run artifacts
pub const DEFAULT_OUTPUT_CONTAINER: &str = "outputs";

/// Location of the validation rule configuration
pub const DEFAULT_RULES_PATH: &str = "config/rules.yml";

/// Redeliveries allowed before a transiently failing message is dead-lettered
pub const DEFAULT_MAX_DELIVERY_COUNT: u32 = 5;

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Published artifact file names
pub mod artifacts {
    pub const FLAGS: &str = "Flags.csv";
    pub const SUMMARY: &str = "Summary.txt";
    pub const FLAGGED_VIEW: &str = "Flagged.xlsx";
    pub const MERGE_MAP: &str = "merged_map.csv";
    pub const MERGED_DATASET: &str = "merged_dataset.csv";
}

/// Structured log operation names
pub mod operations {
    pub const JOB_STARTED: &str = "job.started";
    pub const JOB_COMPLETED: &str = "job.completed";
    pub const JOB_FAILED: &str = "job.failed";
    pub const ARTIFACT_PUBLISHED: &str = "artifact.published";
    pub const MESSAGE_DEAD_LETTERED: &str = "message.dead_lettered";
    pub const MESSAGE_ABANDONED: &str = "message.abandoned";
}
