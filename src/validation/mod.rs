//! # Validation Engine
//!
//! Capability interface over the rule engine. The orchestrator only relies on
//! the shape of an [`EngineRun`]: a fresh run id, the ordered issues, the
//! merged dataset, an optional merge map and the elapsed time. Rule semantics
//! live behind [`ValidationEngine`] so orchestration can be exercised against
//! deterministic fixtures.

pub mod rules;

pub use rules::{ProfileRules, RuleSet, RulesEngine};

use crate::table::Table;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Unknown validation profile: {profile}")]
    UnknownProfile { profile: String },

    #[error("Rule configuration error in {path}: {message}")]
    RuleConfiguration { path: String, message: String },

    #[error("Validation failed: {message}")]
    Execution { message: String },
}

impl EngineError {
    pub fn unknown_profile(profile: impl Into<String>) -> Self {
        Self::UnknownProfile {
            profile: profile.into(),
        }
    }

    pub fn rule_configuration(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RuleConfiguration {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One flagged problem in the input table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Zero-based row index into the input table
    pub row: usize,
    pub column: Option<String>,
    pub severity: Severity,
    pub category: String,
    pub message: String,
}

impl Issue {
    pub fn new(
        row: usize,
        column: Option<&str>,
        severity: Severity,
        category: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            row,
            column: column.map(str::to_string),
            severity,
            category: category.into(),
            message: message.into(),
        }
    }
}

/// Consolidation of one input row into a merged row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeEntry {
    /// Zero-based row index in the input table
    pub source_row: usize,
    /// Zero-based row index in the merged dataset
    pub merged_row: usize,
    /// Key value the rows were consolidated on
    pub key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeMap {
    pub entries: Vec<MergeEntry>,
}

impl MergeMap {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Output of one engine run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub issues: Vec<Issue>,
    /// Always present; identical to the input when nothing was merged
    pub merged: Table,
    /// Present only when at least one consolidation happened
    pub merge_map: Option<MergeMap>,
    pub runtime_ms: u64,
}

impl ValidationResult {
    /// The merge map, if it records at least one consolidation
    pub fn effective_merge_map(&self) -> Option<&MergeMap> {
        self.merge_map.as_ref().filter(|map| !map.is_empty())
    }
}

/// Run identity paired with its result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineRun {
    pub run_id: String,
    pub result: ValidationResult,
}

/// Parameters for a single run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub profile: String,
    pub auto_merge: bool,
}

/// Validation rule engine
#[async_trait]
pub trait ValidationEngine: Send + Sync {
    /// Validate `table` under `request.profile`, assigning a new run id
    async fn run(&self, table: &Table, request: &RunRequest) -> Result<EngineRun, EngineError>;
}
