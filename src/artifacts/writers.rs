//! Standard artifact encoders: CSV for flags, merge map and merged dataset,
//! `key=value` text for the summary, and an xlsx workbook for the flagged view.

use super::{ArtifactWriters, RunSummary, WriteError};
use crate::table::Table;
use crate::validation::{Issue, MergeMap};
use rust_xlsxwriter::{Color, Format, Workbook};
use std::collections::{BTreeMap, HashMap, HashSet};

const FLAGS_HEADER: [&str; 5] = ["row", "column", "severity", "category", "message"];
const MERGE_MAP_HEADER: [&str; 3] = ["source_row", "merged_row", "key"];
const ISSUES_COLUMN: &str = "issues";

#[derive(Debug, Clone, Copy, Default)]
pub struct StandardWriters;

impl StandardWriters {
    pub fn new() -> Self {
        Self
    }
}

fn finish_csv(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>, WriteError> {
    writer
        .into_inner()
        .map_err(|e| WriteError::Io(e.into_error()))
}

impl ArtifactWriters for StandardWriters {
    fn write_flags(&self, issues: &[Issue]) -> Result<Vec<u8>, WriteError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(FLAGS_HEADER)?;
        for issue in issues {
            writer.write_record([
                issue.row.to_string().as_str(),
                issue.column.as_deref().unwrap_or(""),
                issue.severity.as_str(),
                issue.category.as_str(),
                issue.message.as_str(),
            ])?;
        }
        finish_csv(writer)
    }

    fn write_summary(&self, summary: &RunSummary, issues: &[Issue]) -> Result<Vec<u8>, WriteError> {
        let mut by_severity: BTreeMap<&str, usize> = BTreeMap::new();
        let mut by_category: BTreeMap<&str, usize> = BTreeMap::new();
        for issue in issues {
            *by_severity.entry(issue.severity.as_str()).or_default() += 1;
            *by_category.entry(issue.category.as_str()).or_default() += 1;
        }

        let mut lines = vec![
            format!("total_rows_checked={}", summary.total_rows_checked),
            format!("total_issues={}", summary.total_issues),
            format!("runtime_ms={}", summary.runtime_ms),
        ];
        lines.extend(
            by_severity
                .iter()
                .map(|(severity, count)| format!("issues.{severity}={count}")),
        );
        lines.extend(
            by_category
                .iter()
                .map(|(category, count)| format!("category.{category}={count}")),
        );

        let mut out = lines.join("\n");
        out.push('\n');
        Ok(out.into_bytes())
    }

    fn write_flagged_view(&self, input: &Table, issues: &[Issue]) -> Result<Vec<u8>, WriteError> {
        let mut row_messages: HashMap<usize, Vec<&str>> = HashMap::new();
        let mut flagged_cells: HashSet<(usize, &str)> = HashSet::new();
        for issue in issues {
            row_messages
                .entry(issue.row)
                .or_default()
                .push(issue.message.as_str());
            if let Some(column) = issue.column.as_deref() {
                flagged_cells.insert((issue.row, column));
            }
        }

        let header = Format::new().set_bold();
        let flagged_row = Format::new().set_background_color(Color::RGB(0xFFF2CC));
        let flagged_cell = Format::new().set_background_color(Color::Yellow);

        let mut workbook = Workbook::new();
        {
            let sheet = workbook.add_worksheet();
            sheet.set_name("Flagged")?;

            for (col, name) in input
                .columns
                .iter()
                .map(String::as_str)
                .chain(std::iter::once(ISSUES_COLUMN))
                .enumerate()
            {
                sheet.write_string_with_format(0, to_col(col)?, name, &header)?;
            }

            for (idx, row) in input.rows.iter().enumerate() {
                let xl_row = to_row(idx + 1)?;
                let messages = row_messages.get(&idx);

                for (col, value) in row.iter().enumerate() {
                    let format = match input.columns.get(col) {
                        Some(name) if flagged_cells.contains(&(idx, name.as_str())) => {
                            Some(&flagged_cell)
                        }
                        _ if messages.is_some() => Some(&flagged_row),
                        _ => None,
                    };
                    match format {
                        Some(format) => {
                            sheet.write_string_with_format(xl_row, to_col(col)?, value, format)?
                        }
                        None => sheet.write_string(xl_row, to_col(col)?, value)?,
                    };
                }

                if let Some(messages) = messages {
                    sheet.write_string_with_format(
                        xl_row,
                        to_col(input.columns.len())?,
                        messages.join("; "),
                        &flagged_row,
                    )?;
                }
            }
        }

        Ok(workbook.save_to_buffer()?)
    }

    fn write_merge_map(&self, merge_map: &MergeMap) -> Result<Vec<u8>, WriteError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(MERGE_MAP_HEADER)?;
        for entry in &merge_map.entries {
            writer.write_record([
                entry.source_row.to_string().as_str(),
                entry.merged_row.to_string().as_str(),
                entry.key.as_str(),
            ])?;
        }
        finish_csv(writer)
    }

    fn write_merged_dataset(&self, merged: &Table) -> Result<Vec<u8>, WriteError> {
        Ok(merged.to_csv()?)
    }
}

fn to_row(idx: usize) -> Result<u32, WriteError> {
    u32::try_from(idx).map_err(|_| WriteError::Format(format!("row {idx} out of range")))
}

fn to_col(idx: usize) -> Result<u16, WriteError> {
    u16::try_from(idx).map_err(|_| WriteError::Format(format!("column {idx} out of range")))
}
