//! Rule-file driven validation engine.
//!
//! Rules are grouped by profile in a YAML file:
//!
//! ```yaml
//! profiles:
//!   A1:
//!     required: [id, name]
//!     numeric: [amount]
//!     allowed:
//!       status: [active, inactive]
//!     max_length:
//!       name: 64
//!     key_columns: [id]
//! ```
//!
//! With auto-merge enabled, rows sharing the same non-empty values in every
//! key column are consolidated into the first such row; empty cells of that
//! row are filled from the later duplicates.

use super::{
    EngineError, EngineRun, Issue, MergeEntry, MergeMap, RunRequest, Severity, ValidationEngine,
    ValidationResult,
};
use crate::table::Table;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Instant;
use tracing::debug;
use uuid::Uuid;

/// Rules for one profile
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProfileRules {
    pub required: Vec<String>,
    pub numeric: Vec<String>,
    pub allowed: BTreeMap<String, Vec<String>>,
    pub max_length: BTreeMap<String, usize>,
    pub key_columns: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RuleSet {
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileRules>,
}

impl RuleSet {
    pub fn from_yaml_str(yaml: &str, origin: &str) -> Result<Self, EngineError> {
        serde_yaml::from_str(yaml).map_err(|e| EngineError::rule_configuration(origin, e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let origin = path.display().to_string();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| EngineError::rule_configuration(&origin, e.to_string()))?;
        Self::from_yaml_str(&yaml, &origin)
    }

    pub fn profile(&self, name: &str) -> Option<&ProfileRules> {
        self.profiles.get(name)
    }
}

#[derive(Debug, Clone)]
pub struct RulesEngine {
    rules: RuleSet,
}

impl RulesEngine {
    pub fn new(rules: RuleSet) -> Self {
        Self { rules }
    }

    pub fn from_path(path: &Path) -> Result<Self, EngineError> {
        Ok(Self::new(RuleSet::load(path)?))
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }
}

#[async_trait]
impl ValidationEngine for RulesEngine {
    async fn run(&self, table: &Table, request: &RunRequest) -> Result<EngineRun, EngineError> {
        let started = Instant::now();
        let rules = self
            .rules
            .profile(&request.profile)
            .ok_or_else(|| EngineError::unknown_profile(&request.profile))?;

        let mut issues = check_rows(table, rules);

        let (merged, entries) = if request.auto_merge {
            merge_duplicates(table, &rules.key_columns)
        } else {
            issues.extend(flag_duplicates(table, &rules.key_columns));
            (table.clone(), Vec::new())
        };

        let run_id = Uuid::new_v4().to_string();
        let runtime_ms = started.elapsed().as_millis() as u64;

        debug!(
            run_id = %run_id,
            profile = %request.profile,
            rows = table.row_count(),
            issues = issues.len(),
            merged_rows = merged.row_count(),
            "Rules engine run finished"
        );

        Ok(EngineRun {
            run_id,
            result: ValidationResult {
                issues,
                merged,
                merge_map: (!entries.is_empty()).then_some(MergeMap { entries }),
                runtime_ms,
            },
        })
    }
}

fn check_rows(table: &Table, rules: &ProfileRules) -> Vec<Issue> {
    let lookup = |name: &str| table.column_index(name);
    let mut issues = Vec::new();

    for (row, _) in table.rows.iter().enumerate() {
        let value = |column: &String| {
            lookup(column.as_str())
                .and_then(|idx| table.cell(row, idx))
                .map(str::trim)
                .unwrap_or("")
        };

        for column in &rules.required {
            if value(column).is_empty() {
                issues.push(Issue::new(
                    row,
                    Some(column.as_str()),
                    Severity::Error,
                    "missing_value",
                    format!("required column '{column}' is empty"),
                ));
            }
        }

        for column in &rules.numeric {
            let v = value(column);
            if !v.is_empty() && v.parse::<f64>().is_err() {
                issues.push(Issue::new(
                    row,
                    Some(column.as_str()),
                    Severity::Error,
                    "not_numeric",
                    format!("'{v}' is not a number"),
                ));
            }
        }

        for (column, allowed) in &rules.allowed {
            let v = value(column);
            if !v.is_empty() && !allowed.iter().any(|a| a == v) {
                issues.push(Issue::new(
                    row,
                    Some(column.as_str()),
                    Severity::Warning,
                    "invalid_value",
                    format!("'{v}' is not an allowed value"),
                ));
            }
        }

        for (column, limit) in &rules.max_length {
            let len = value(column).chars().count();
            if len > *limit {
                issues.push(Issue::new(
                    row,
                    Some(column.as_str()),
                    Severity::Warning,
                    "too_long",
                    format!("{len} characters exceeds limit of {limit}"),
                ));
            }
        }
    }

    issues
}

/// Composite key for a row, or `None` when any key cell is empty
fn row_key(table: &Table, key_indexes: &[usize], row: usize) -> Option<String> {
    let mut parts = Vec::with_capacity(key_indexes.len());
    for idx in key_indexes {
        let value = table.cell(row, *idx).map(str::trim).unwrap_or("");
        if value.is_empty() {
            return None;
        }
        parts.push(value);
    }
    Some(parts.join("|"))
}

fn key_indexes(table: &Table, key_columns: &[String]) -> Option<Vec<usize>> {
    if key_columns.is_empty() {
        return None;
    }
    key_columns.iter().map(|c| table.column_index(c)).collect()
}

fn merge_duplicates(table: &Table, key_columns: &[String]) -> (Table, Vec<MergeEntry>) {
    let Some(indexes) = key_indexes(table, key_columns) else {
        return (table.clone(), Vec::new());
    };

    let mut merged_rows: Vec<Vec<String>> = Vec::with_capacity(table.row_count());
    let mut groups: HashMap<String, (usize, Vec<usize>)> = HashMap::new();

    for (source_row, row) in table.rows.iter().enumerate() {
        match row_key(table, &indexes, source_row) {
            Some(key) => match groups.entry(key) {
                Entry::Occupied(mut slot) => {
                    let (merged_row, members) = slot.get_mut();
                    let target = &mut merged_rows[*merged_row];
                    for (cell, incoming) in target.iter_mut().zip(row) {
                        if cell.trim().is_empty() && !incoming.trim().is_empty() {
                            cell.clone_from(incoming);
                        }
                    }
                    members.push(source_row);
                }
                Entry::Vacant(slot) => {
                    slot.insert((merged_rows.len(), vec![source_row]));
                    merged_rows.push(row.clone());
                }
            },
            None => merged_rows.push(row.clone()),
        }
    }

    let mut entries: Vec<MergeEntry> = groups
        .into_iter()
        .filter(|(_, (_, members))| members.len() > 1)
        .flat_map(|(key, (merged_row, members))| {
            members.into_iter().map(move |source_row| MergeEntry {
                source_row,
                merged_row,
                key: key.clone(),
            })
        })
        .collect();
    entries.sort_by_key(|e| (e.merged_row, e.source_row));

    (Table::new(table.columns.clone(), merged_rows), entries)
}

fn flag_duplicates(table: &Table, key_columns: &[String]) -> Vec<Issue> {
    let Some(indexes) = key_indexes(table, key_columns) else {
        return Vec::new();
    };
    let mut first_seen: HashMap<String, usize> = HashMap::new();
    let mut issues = Vec::new();
    for row in 0..table.row_count() {
        if let Some(key) = row_key(table, &indexes, row) {
            if let Some(first) = first_seen.get(&key) {
                issues.push(Issue::new(
                    row,
                    None,
                    Severity::Warning,
                    "duplicate_key",
                    format!("duplicates key '{key}' first seen on row {first}"),
                ));
            } else {
                first_seen.insert(key, row);
            }
        }
    }
    issues
}
