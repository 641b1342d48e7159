//! # Output Artifacts
//!
//! The fixed set of files produced from a run and the writer contract that
//! serializes them. Every artifact is published as `{run_id}/{file_name}`.
//! The merge map is conditional: it exists only when the engine consolidated
//! at least one row.

pub mod writers;

pub use writers::StandardWriters;

use crate::constants::artifacts as names;
use crate::table::Table;
use crate::validation::{Issue, MergeMap, ValidationResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("CSV encoding error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet encoding error: {0}")]
    Spreadsheet(#[from] rust_xlsxwriter::XlsxError),

    #[error("Artifact does not fit the output format: {0}")]
    Format(String),

    #[error("Workspace I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Logical artifact names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactName {
    Flags,
    Summary,
    FlaggedView,
    MergeMap,
    MergedDataset,
}

impl ArtifactName {
    /// Publish order
    pub const ALL: [ArtifactName; 5] = [
        ArtifactName::Flags,
        ArtifactName::Summary,
        ArtifactName::FlaggedView,
        ArtifactName::MergeMap,
        ArtifactName::MergedDataset,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            ArtifactName::Flags => names::FLAGS,
            ArtifactName::Summary => names::SUMMARY,
            ArtifactName::FlaggedView => names::FLAGGED_VIEW,
            ArtifactName::MergeMap => names::MERGE_MAP,
            ArtifactName::MergedDataset => names::MERGED_DATASET,
        }
    }

    /// Object key under the results container
    pub fn object_key(&self, run_id: &str) -> String {
        format!("{run_id}/{}", self.file_name())
    }

    pub fn is_conditional(&self) -> bool {
        matches!(self, ArtifactName::MergeMap)
    }
}

impl fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Artifacts applicable to a run, in publish order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputArtifactSet {
    names: Vec<ArtifactName>,
}

impl OutputArtifactSet {
    pub fn for_result(result: &ValidationResult) -> Self {
        let has_merges = result.effective_merge_map().is_some();
        Self {
            names: ArtifactName::ALL
                .into_iter()
                .filter(|name| !name.is_conditional() || has_merges)
                .collect(),
        }
    }

    pub fn names(&self) -> &[ArtifactName] {
        &self.names
    }

    pub fn contains(&self, name: ArtifactName) -> bool {
        self.names.contains(&name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Counts reported in the summary artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Rows in the decoded input table, before any merging
    pub total_rows_checked: usize,
    pub total_issues: usize,
    pub runtime_ms: u64,
}

impl RunSummary {
    pub fn from_run(input: &Table, result: &ValidationResult) -> Self {
        Self {
            total_rows_checked: input.row_count(),
            total_issues: result.issues.len(),
            runtime_ms: result.runtime_ms,
        }
    }
}

/// Serializers for each artifact. Implementations must be pure: the same
/// inputs produce the same bytes.
pub trait ArtifactWriters: Send + Sync {
    fn write_flags(&self, issues: &[Issue]) -> Result<Vec<u8>, WriteError>;

    fn write_summary(&self, summary: &RunSummary, issues: &[Issue]) -> Result<Vec<u8>, WriteError>;

    /// Input table with flagged rows and cells highlighted
    fn write_flagged_view(&self, input: &Table, issues: &[Issue]) -> Result<Vec<u8>, WriteError>;

    fn write_merge_map(&self, merge_map: &MergeMap) -> Result<Vec<u8>, WriteError>;

    fn write_merged_dataset(&self, merged: &Table) -> Result<Vec<u8>, WriteError>;
}
