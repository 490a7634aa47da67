//! Result Set Model
//!
//! Raw rows arrive as field/value lists in whatever order the service
//! produced them, and different rows may carry different fields.
//! Normalization flattens them into one tabular shape: metadata columns
//! (the `@`-prefixed, system-populated fields) first in a canonical order,
//! then caller-selected fields in first-seen order. Cells a row never
//! mentioned are null.

use std::collections::{HashMap, HashSet};

use crate::service::{CellValue, RawRow};

pub mod format;
pub mod retrieve;

pub use format::{render, FormatError, OutputArtifact, OutputEncoding};
pub use retrieve::{retrieve, RetrievalOptions};

/// Row cap applied when the caller does not choose one
pub const DEFAULT_ROW_LIMIT: usize = 10_000;

/// System-populated columns, in the order they are shown
const METADATA_ORDER: [&str; 4] = ["@timestamp", "@message", "@source", "@ingestion_time"];

/// One normalized row, cells aligned to the parent set's columns
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub cells: Vec<CellValue>,
}

/// A normalized, tabular result set
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<ResultRow>,

    /// Whether `@`-prefixed columns were dropped during normalization
    pub metadata_excluded: bool,
}

impl ResultSet {
    /// Normalize raw service rows into a table.
    ///
    /// Column order: canonical metadata, remaining `@` fields first-seen,
    /// then caller-selected fields first-seen. With `exclude_metadata` the
    /// `@` columns are dropped after ordering is settled.
    pub fn from_raw(raw: Vec<RawRow>, exclude_metadata: bool) -> Self {
        let mut seen: HashSet<String> = HashSet::new();
        let mut extra_metadata: Vec<String> = Vec::new();
        let mut fields: Vec<String> = Vec::new();

        for row in &raw {
            for cell in row {
                if !seen.insert(cell.field.clone()) {
                    continue;
                }
                if cell.field.starts_with('@') {
                    if !METADATA_ORDER.contains(&cell.field.as_str()) {
                        extra_metadata.push(cell.field.clone());
                    }
                } else {
                    fields.push(cell.field.clone());
                }
            }
        }

        let mut columns: Vec<String> = Vec::new();
        if !exclude_metadata {
            for name in METADATA_ORDER {
                if seen.contains(name) {
                    columns.push(name.to_string());
                }
            }
            columns.extend(extra_metadata);
        }
        columns.extend(fields);

        let rows = raw
            .into_iter()
            .map(|row| {
                let mut by_field: HashMap<String, CellValue> =
                    HashMap::with_capacity(row.len());
                for cell in row {
                    // A field repeated within one row keeps its last value
                    by_field.insert(cell.field, cell.value);
                }
                ResultRow {
                    cells: columns
                        .iter()
                        .map(|column| by_field.remove(column).unwrap_or(CellValue::Null))
                        .collect(),
                }
            })
            .collect();

        Self {
            columns,
            rows,
            metadata_excluded: exclude_metadata,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell lookup by row index and column name
    pub fn get(&self, row: usize, column: &str) -> Option<&CellValue> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row).and_then(|r| r.cells.get(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::RawField;

    fn row(fields: &[(&str, CellValue)]) -> RawRow {
        fields
            .iter()
            .map(|(name, value)| RawField {
                field: name.to_string(),
                value: value.clone(),
            })
            .collect()
    }

    #[test]
    fn test_metadata_columns_come_first_in_canonical_order() {
        // Arrival order deliberately scrambled
        let raw = vec![row(&[
            ("level", "error".into()),
            ("@message", "boom".into()),
            ("@timestamp", "2025-06-01T10:00:00Z".into()),
        ])];

        let set = ResultSet::from_raw(raw, false);
        assert_eq!(set.columns, vec!["@timestamp", "@message", "level"]);
    }

    #[test]
    fn test_unknown_metadata_follows_canonical_metadata() {
        let raw = vec![row(&[
            ("@shard", "s-7".into()),
            ("@timestamp", "t".into()),
            ("status", "200".into()),
        ])];

        let set = ResultSet::from_raw(raw, false);
        assert_eq!(set.columns, vec!["@timestamp", "@shard", "status"]);
    }

    #[test]
    fn test_ragged_rows_fill_with_null() {
        let raw = vec![
            row(&[("a", CellValue::from(1i64))]),
            row(&[("b", CellValue::from("x"))]),
        ];

        let set = ResultSet::from_raw(raw, false);
        assert_eq!(set.columns, vec!["a", "b"]);
        assert_eq!(set.get(0, "a"), Some(&CellValue::from(1i64)));
        assert_eq!(set.get(0, "b"), Some(&CellValue::Null));
        assert_eq!(set.get(1, "a"), Some(&CellValue::Null));
        assert_eq!(set.get(1, "b"), Some(&CellValue::from("x")));
    }

    #[test]
    fn test_field_order_is_first_seen_across_rows() {
        let raw = vec![
            row(&[("b", "1".into()), ("a", "2".into())]),
            row(&[("c", "3".into()), ("a", "4".into())]),
        ];

        let set = ResultSet::from_raw(raw, false);
        assert_eq!(set.columns, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_exclude_metadata_drops_all_at_columns() {
        let raw = vec![row(&[
            ("@timestamp", "t".into()),
            ("@shard", "s".into()),
            ("level", "info".into()),
        ])];

        let set = ResultSet::from_raw(raw, true);
        assert_eq!(set.columns, vec!["level"]);
        assert!(set.metadata_excluded);
    }

    #[test]
    fn test_duplicate_field_in_one_row_keeps_last_value() {
        let raw = vec![row(&[
            ("level", "first".into()),
            ("level", "second".into()),
        ])];

        let set = ResultSet::from_raw(raw, false);
        assert_eq!(set.columns, vec!["level"]);
        assert_eq!(set.get(0, "level"), Some(&CellValue::from("second")));
    }

    #[test]
    fn test_empty_input_is_an_empty_set() {
        let set = ResultSet::from_raw(vec![], false);
        assert!(set.is_empty());
        assert!(set.columns.is_empty());
    }

    #[test]
    fn test_numbers_survive_normalization() {
        let raw = vec![row(&[("count", CellValue::from(1456i64))])];
        let set = ResultSet::from_raw(raw, false);
        assert_eq!(set.get(0, "count"), Some(&CellValue::from(1456i64)));
    }
}
