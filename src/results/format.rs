//! Output Rendering
//!
//! Three encodings of a normalized result set: a fixed-width table for
//! terminals, RFC 4180 CSV, and JSON. All three respect the result set's
//! column order, JSON included, so metadata keys lead in every encoding.

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::path::Path;

use crate::results::{ResultRow, ResultSet};
use crate::service::{CellValue, QueryHandle};

/// Cells wider than this are cut to fit the table
const MAX_COLUMN_WIDTH: usize = 50;

/// Errors from encoding a result set
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("CSV encoding failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    // Recovering the CSV writer's buffer yields a bare io::Error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Output encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputEncoding {
    Table,
    Csv,
    Json,
}

impl OutputEncoding {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "table" => Some(OutputEncoding::Table),
            "csv" => Some(OutputEncoding::Csv),
            "json" => Some(OutputEncoding::Json),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputEncoding::Table => "txt",
            OutputEncoding::Csv => "csv",
            OutputEncoding::Json => "json",
        }
    }

    /// Machine encodings go to a file when no path is given; tables go to
    /// the terminal.
    pub fn defaults_to_file(&self) -> bool {
        !matches!(self, OutputEncoding::Table)
    }
}

impl std::fmt::Display for OutputEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OutputEncoding::Table => "table",
            OutputEncoding::Csv => "csv",
            OutputEncoding::Json => "json",
        };
        write!(f, "{}", name)
    }
}

/// A rendered result set, ready to print or persist
#[derive(Debug, Clone)]
pub struct OutputArtifact {
    pub encoding: OutputEncoding,
    pub content: String,
}

impl OutputArtifact {
    /// File name used when the caller gives none: the query id's short
    /// prefix keeps reruns from clobbering each other.
    pub fn default_file_name(&self, handle: &QueryHandle) -> String {
        format!(
            "lookout_results_{}.{}",
            handle.short_id(),
            self.encoding.extension()
        )
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, &self.content)
    }
}

/// Render a result set in the requested encoding
pub fn render(result: &ResultSet, encoding: OutputEncoding) -> Result<OutputArtifact, FormatError> {
    let content = match encoding {
        OutputEncoding::Table => render_table(result),
        OutputEncoding::Csv => render_csv(result)?,
        OutputEncoding::Json => render_json(result, true)?,
    };

    Ok(OutputArtifact { encoding, content })
}

fn render_table(result: &ResultSet) -> String {
    if result.columns.is_empty() {
        return String::new();
    }

    let rendered: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| row.cells.iter().map(truncate_cell).collect())
        .collect();

    let widths: Vec<usize> = result
        .columns
        .iter()
        .enumerate()
        .map(|(i, column)| {
            rendered
                .iter()
                .map(|row| row[i].len())
                .chain(std::iter::once(column.len()))
                .max()
                .unwrap_or(0)
                .min(MAX_COLUMN_WIDTH)
        })
        .collect();

    let mut out = String::new();

    let header: Vec<String> = result
        .columns
        .iter()
        .zip(&widths)
        .map(|(column, &width)| format!("{:<width$}", column))
        .collect();
    out.push_str(&header.join(" | "));
    out.push('\n');

    let separator: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
    out.push_str(&separator.join("-+-"));
    out.push('\n');

    for row in &rendered {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(value, &width)| format!("{:<width$}", value))
            .collect();
        out.push_str(&line.join(" | "));
        out.push('\n');
    }

    out
}

fn truncate_cell(cell: &CellValue) -> String {
    let text = cell.render();
    if text.len() <= MAX_COLUMN_WIDTH {
        return text;
    }

    let mut cut = MAX_COLUMN_WIDTH - 3;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &text[..cut])
}

fn render_csv(result: &ResultSet) -> Result<String, FormatError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer.write_record(&result.columns)?;
    for row in &result.rows {
        writer.write_record(row.cells.iter().map(|cell| cell.render()))?;
    }

    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn render_json(result: &ResultSet, pretty: bool) -> Result<String, FormatError> {
    let objects: Vec<JsonRow> = result
        .rows
        .iter()
        .map(|row| JsonRow {
            columns: &result.columns,
            row,
        })
        .collect();

    let content = if pretty {
        serde_json::to_string_pretty(&objects)?
    } else {
        serde_json::to_string(&objects)?
    };
    Ok(content)
}

/// One row as a JSON object with keys in column order. Serialized by hand
/// because map-backed serialization would reorder the keys.
struct JsonRow<'a> {
    columns: &'a [String],
    row: &'a ResultRow,
}

impl Serialize for JsonRow<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, cell) in self.columns.iter().zip(&self.row.cells) {
            map.serialize_entry(column, cell)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::ResultSet;
    use crate::service::RawField;

    fn sample_set() -> ResultSet {
        ResultSet::from_raw(
            vec![
                vec![RawField::new("id", 1i64), RawField::new("msg", "hello")],
                vec![RawField::new("id", 2i64), RawField::new("msg", "x")],
            ],
            false,
        )
    }

    #[test]
    fn test_table_layout() {
        let table = render_table(&sample_set());
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines[0], "id | msg  ");
        assert_eq!(lines[1], "---+------");
        assert_eq!(lines[2], "1  | hello");
        assert_eq!(lines[3], "2  | x    ");
    }

    #[test]
    fn test_table_truncates_wide_cells() {
        let long = "x".repeat(80);
        let set = ResultSet::from_raw(
            vec![vec![RawField::new("wide", long.as_str())]],
            false,
        );

        let table = render_table(&set);
        let cell_line = table.lines().nth(2).unwrap();
        assert_eq!(cell_line.len(), MAX_COLUMN_WIDTH);
        assert!(cell_line.ends_with("..."));
    }

    #[test]
    fn test_table_of_empty_set_is_empty() {
        let set = ResultSet::from_raw(vec![], false);
        assert_eq!(render_table(&set), "");
    }

    #[test]
    fn test_csv_escapes_delimiters_and_quotes() {
        let set = ResultSet::from_raw(
            vec![vec![
                RawField::new("a", "plain"),
                RawField::new("b", "with, comma"),
                RawField::new("c", "say \"hi\""),
            ]],
            false,
        );

        let content = render_csv(&set).unwrap();
        assert_eq!(content, "a,b,c\nplain,\"with, comma\",\"say \"\"hi\"\"\"\n");
    }

    #[test]
    fn test_csv_renders_null_as_empty() {
        let set = ResultSet::from_raw(
            vec![
                vec![RawField::new("a", 1i64), RawField::new("b", "y")],
                vec![RawField::new("a", 2i64)],
            ],
            false,
        );

        let content = render_csv(&set).unwrap();
        assert_eq!(content, "a,b\n1,y\n2,\n");
    }

    #[test]
    fn test_csv_round_trips_through_a_reader() {
        let set = ResultSet::from_raw(
            vec![vec![
                RawField::new("msg", "line one\nline two"),
                RawField::new("count", 7i64),
            ]],
            false,
        );

        let content = render_csv(&set).unwrap();
        let mut reader = csv::Reader::from_reader(content.as_bytes());

        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers, csv::StringRecord::from(vec!["msg", "count"]));

        let record = reader.records().next().unwrap().unwrap();
        assert_eq!(&record[0], "line one\nline two");
        assert_eq!(&record[1], "7");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "sink closed");
        let err: FormatError = io_err.into();
        assert!(matches!(err, FormatError::Io(_)));
        assert_eq!(err.to_string(), "IO error: sink closed");
    }

    #[test]
    fn test_json_preserves_values_and_nulls() {
        // One row without "b", one with a string there
        let set = ResultSet::from_raw(
            vec![
                vec![RawField::new("a", 1i64)],
                vec![RawField::new("a", 2i64), RawField::new("b", "x")],
            ],
            false,
        );

        let content = render_json(&set, false).unwrap();
        assert_eq!(content, r#"[{"a":1,"b":null},{"a":2,"b":"x"}]"#);
    }

    #[test]
    fn test_json_keys_follow_column_order() {
        let set = ResultSet::from_raw(
            vec![vec![
                RawField::new("level", "info"),
                RawField::new("@timestamp", "t1"),
            ]],
            false,
        );

        let content = render_json(&set, false).unwrap();
        // Metadata key must serialize before the selected field
        assert_eq!(content, r#"[{"@timestamp":"t1","level":"info"}]"#);
    }

    #[test]
    fn test_pretty_json_parses_back_to_every_row() {
        let content = render_json(&sample_set(), true).unwrap();
        assert!(content.starts_with("[\n"));

        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), sample_set().len());
    }

    #[test]
    fn test_default_file_names() {
        let handle = QueryHandle::new("a1b2c3d4-e5f6", 0);

        let csv = render(&sample_set(), OutputEncoding::Csv).unwrap();
        assert_eq!(csv.default_file_name(&handle), "lookout_results_a1b2c3d4.csv");

        let json = render(&sample_set(), OutputEncoding::Json).unwrap();
        assert_eq!(
            json.default_file_name(&handle),
            "lookout_results_a1b2c3d4.json"
        );
    }

    #[test]
    fn test_encoding_parse() {
        assert_eq!(OutputEncoding::parse("table"), Some(OutputEncoding::Table));
        assert_eq!(OutputEncoding::parse("CSV"), Some(OutputEncoding::Csv));
        assert_eq!(OutputEncoding::parse("json"), Some(OutputEncoding::Json));
        assert_eq!(OutputEncoding::parse("yaml"), None);
    }

    #[test]
    fn test_only_table_prints_to_the_terminal() {
        assert!(!OutputEncoding::Table.defaults_to_file());
        assert!(OutputEncoding::Csv.defaults_to_file());
        assert!(OutputEncoding::Json.defaults_to_file());
    }

    #[test]
    fn test_save_writes_the_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");

        let artifact = render(&sample_set(), OutputEncoding::Csv).unwrap();
        artifact.save(&path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, artifact.content);
    }
}
