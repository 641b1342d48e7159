//! # Tabular Input
//!
//! In-memory table of string cells decoded from the fetched input bytes. The
//! format is chosen from the blob name's extension:
//!
//! | extension      | format                                   |
//! |----------------|------------------------------------------|
//! | `.tsv`, `.tab` | tab-delimited with header row            |
//! | `.json`        | array of flat objects                    |
//! | anything else  | comma-delimited with header row          |

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TableError {
    #[error("Input is empty")]
    Empty,

    #[error("Input has no header row")]
    MissingHeader,

    #[error("Duplicate column name: {0}")]
    DuplicateColumn(String),

    #[error("Delimited input error: {0}")]
    Delimited(#[from] csv::Error),

    #[error("JSON input error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("JSON input must be an array of objects: {0}")]
    JsonShape(String),
}

/// Recognized input encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Csv,
    Tsv,
    Json,
}

impl InputFormat {
    /// Pick the format from a blob or file name
    pub fn from_name(name: &str) -> Self {
        let extension = Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());
        match extension.as_deref() {
            Some("tsv") | Some("tab") => InputFormat::Tsv,
            Some("json") => InputFormat::Json,
            _ => InputFormat::Csv,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { columns, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
    }

    /// Decode `bytes` using the format implied by `name`
    pub fn decode(name: &str, bytes: &[u8]) -> Result<Self, TableError> {
        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(TableError::Empty);
        }
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        match InputFormat::from_name(name) {
            InputFormat::Csv => Self::from_delimited(bytes, b','),
            InputFormat::Tsv => Self::from_delimited(bytes, b'\t'),
            InputFormat::Json => Self::from_json(bytes),
        }
    }

    fn from_delimited(bytes: &[u8], delimiter: u8) -> Result<Self, TableError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(false)
            .from_reader(bytes);

        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        if columns.is_empty() || columns.iter().all(|c| c.trim().is_empty()) {
            return Err(TableError::MissingHeader);
        }
        check_unique(&columns)?;

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(Self { columns, rows })
    }

    fn from_json(bytes: &[u8]) -> Result<Self, TableError> {
        let value: serde_json::Value = serde_json::from_slice(bytes)?;
        let records = value
            .as_array()
            .ok_or_else(|| TableError::JsonShape("top-level value is not an array".to_string()))?;

        let mut columns: Vec<String> = Vec::new();
        for (idx, record) in records.iter().enumerate() {
            let obj = record
                .as_object()
                .ok_or_else(|| TableError::JsonShape(format!("element {idx} is not an object")))?;
            for key in obj.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }
        // `[]` is a dataset with no records; records without any keys are not
        if columns.is_empty() && !records.is_empty() {
            return Err(TableError::MissingHeader);
        }

        let rows = records
            .iter()
            .filter_map(|record| record.as_object())
            .map(|obj| {
                columns
                    .iter()
                    .map(|column| match obj.get(column) {
                        None | Some(serde_json::Value::Null) => String::new(),
                        Some(serde_json::Value::String(s)) => s.clone(),
                        Some(other) => other.to_string(),
                    })
                    .collect()
            })
            .collect();

        Ok(Self { columns, rows })
    }

    /// Encode as comma-delimited text with a header row
    pub fn to_csv(&self) -> Result<Vec<u8>, csv::Error> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        if !self.columns.is_empty() {
            writer.write_record(&self.columns)?;
        }
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer
            .into_inner()
            .map_err(|e| csv::Error::from(e.into_error()))
    }
}

fn check_unique(columns: &[String]) -> Result<(), TableError> {
    for (idx, column) in columns.iter().enumerate() {
        if columns[..idx].contains(column) {
            return Err(TableError::DuplicateColumn(column.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_name() {
        assert_eq!(InputFormat::from_name("batch/data.CSV"), InputFormat::Csv);
        assert_eq!(InputFormat::from_name("data.tsv"), InputFormat::Tsv);
        assert_eq!(InputFormat::from_name("data.json"), InputFormat::Json);
        assert_eq!(InputFormat::from_name("noextension"), InputFormat::Csv);
    }

    #[test]
    fn test_decode_csv() {
        let table = Table::decode("a.csv", b"id,name\n1,alice\n2,bob\n").unwrap();
        assert_eq!(table.columns, vec!["id", "name"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.cell(1, 1), Some("bob"));
        assert_eq!(table.column_index("name"), Some(1));
    }

    #[test]
    fn test_decode_header_only_has_zero_rows() {
        let table = Table::decode("a.csv", b"id,name\n").unwrap();
        assert_eq!(table.row_count(), 0);
        assert!(table.is_empty());
    }

    #[test]
    fn test_decode_empty_json_array_has_zero_rows() {
        let table = Table::decode("a.json", b" [ ] ").unwrap();
        assert!(table.columns.is_empty());
        assert!(table.is_empty());
        assert!(table.to_csv().unwrap().is_empty());

        assert!(matches!(
            Table::decode("a.json", b"[{}]"),
            Err(TableError::MissingHeader)
        ));
    }

    #[test]
    fn test_decode_strips_bom() {
        let table = Table::decode("a.csv", b"\xEF\xBB\xBFid\n1\n").unwrap();
        assert_eq!(table.columns, vec!["id"]);
    }

    #[test]
    fn test_decode_tsv() {
        let table = Table::decode("a.tsv", b"id\tname\n1\talice\n").unwrap();
        assert_eq!(table.rows, vec![vec!["1".to_string(), "alice".to_string()]]);
    }

    #[test]
    fn test_decode_json_records() {
        let table = Table::decode(
            "a.json",
            br#"[{"id": 1, "name": "alice"}, {"id": 2, "email": "b@x.io", "name": null}]"#,
        )
        .unwrap();
        assert_eq!(table.columns, vec!["id", "name", "email"]);
        assert_eq!(table.rows[0], vec!["1", "alice", ""]);
        assert_eq!(table.rows[1], vec!["2", "", "b@x.io"]);
    }

    #[test]
    fn test_decode_rejects_unrecognized_input() {
        assert!(matches!(Table::decode("a.csv", b""), Err(TableError::Empty)));
        assert!(matches!(
            Table::decode("a.csv", b"id,name\n1,alice,extra\n"),
            Err(TableError::Delimited(_))
        ));
        assert!(matches!(
            Table::decode("a.csv", b"id,id\n1,2\n"),
            Err(TableError::DuplicateColumn(_))
        ));
        assert!(Table::decode("a.csv", b"id\n\xff\xfe\n").is_err());
        assert!(matches!(
            Table::decode("a.json", b"{\"id\": 1}"),
            Err(TableError::JsonShape(_))
        ));
        assert!(matches!(Table::decode("a.json", b"[1,"), Err(TableError::Json(_))));
    }

    #[test]
    fn test_to_csv_round_trip() {
        let table = Table::new(
            vec!["id".into(), "note".into()],
            vec![vec!["1".into(), "has, comma".into()]],
        );
        let bytes = table.to_csv().unwrap();
        assert_eq!(Table::decode("x.csv", &bytes).unwrap(), table);
    }
}
