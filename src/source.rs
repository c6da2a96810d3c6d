//! Source table loading
//!
//! Rows come from a warehouse export, one row per channel metadata entry.
//! Each of the three name columns may hold a single name or a list of names.
//! CSV cells carry lists as JSON array literals; JSON exports carry real
//! arrays.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::antigen::rules::coerce_to_string;
use crate::antigen::SourceRecord;
use crate::TARGET_REPORT;

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "Channel_Metadata_ID")]
    source_id: String,
    #[serde(rename = "Antibody_Name", default)]
    antibody_name: Option<String>,
    #[serde(rename = "Marker_Name", default)]
    marker_name: Option<String>,
    #[serde(rename = "Channel_Name", default)]
    channel_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JsonRow {
    #[serde(rename = "Channel_Metadata_ID")]
    source_id: Value,
    #[serde(rename = "Antibody_Name", default)]
    antibody_name: Value,
    #[serde(rename = "Marker_Name", default)]
    marker_name: Value,
    #[serde(rename = "Channel_Name", default)]
    channel_name: Value,
}

impl From<CsvRow> for SourceRecord {
    fn from(row: CsvRow) -> Self {
        let names = |cell: Option<String>| cell.map(|c| names_from_cell(&c)).unwrap_or_default();
        SourceRecord {
            source_id: row.source_id.trim().to_string(),
            antibody_names: names(row.antibody_name),
            marker_names: names(row.marker_name),
            channel_names: names(row.channel_name),
        }
    }
}

impl From<JsonRow> for SourceRecord {
    fn from(row: JsonRow) -> Self {
        SourceRecord {
            source_id: coerce_to_string(&row.source_id),
            antibody_names: names_from_value(&row.antibody_name),
            marker_names: names_from_value(&row.marker_name),
            channel_names: names_from_value(&row.channel_name),
        }
    }
}

/// Names held in one CSV cell. Empty cells hold none; a JSON array literal
/// holds one name per element; anything else is a single name.
pub fn names_from_cell(cell: &str) -> Vec<String> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    if trimmed.starts_with('[') {
        if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(trimmed) {
            return items.iter().map(coerce_to_string).collect();
        }
        debug!(target: TARGET_REPORT, "Cell '{}' is not a JSON list, keeping as one name", cell);
    }

    vec![cell.to_string()]
}

/// Names held in one JSON field. A missing or null field holds none; null
/// elements inside a list are kept as the missing-value marker.
pub fn names_from_value(value: &Value) -> Vec<String> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.iter().map(coerce_to_string).collect(),
        Value::String(s) if s.trim().is_empty() => Vec::new(),
        other => vec![coerce_to_string(other)],
    }
}

pub fn load_csv(path: &Path) -> Result<Vec<SourceRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut records = Vec::new();
    for (index, row) in reader.deserialize::<CsvRow>().enumerate() {
        let row = row.with_context(|| format!("Bad row {} in {}", index + 1, path.display()))?;
        records.push(SourceRecord::from(row));
    }
    Ok(records)
}

/// A JSON array of row objects, or newline-delimited row objects.
pub fn load_json(path: &Path) -> Result<Vec<SourceRecord>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    if text.trim_start().starts_with('[') {
        let rows: Vec<JsonRow> = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        return Ok(rows.into_iter().map(SourceRecord::from).collect());
    }

    serde_json::Deserializer::from_str(&text)
        .into_iter::<JsonRow>()
        .map(|row| {
            row.map(SourceRecord::from)
                .with_context(|| format!("Failed to parse {}", path.display()))
        })
        .collect()
}

/// Load source records, picking the format from the file extension.
pub fn load_records(path: &Path) -> Result<Vec<SourceRecord>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    let records = match extension.as_str() {
        "csv" => load_csv(path)?,
        "json" | "jsonl" | "ndjson" => load_json(path)?,
        other => bail!(
            "Unsupported input format '{}' for {} (expected csv, json, jsonl)",
            other,
            path.display()
        ),
    };

    info!(
        target: TARGET_REPORT,
        "Loaded {} source records from {}",
        records.len(),
        path.display()
    );
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_names_from_cell() {
        assert!(names_from_cell("").is_empty());
        assert!(names_from_cell("   ").is_empty());
        assert_eq!(names_from_cell("CD3(2)"), vec!["CD3(2)"]);
        assert_eq!(
            names_from_cell(r#"["CD3", "Anti-CD4", null]"#),
            vec!["CD3", "Anti-CD4", "nan"]
        );
        // Not a valid list: one name
        assert_eq!(names_from_cell("[CD3"), vec!["[CD3"]);
    }

    #[test]
    fn test_names_from_value() {
        assert!(names_from_value(&Value::Null).is_empty());
        assert_eq!(names_from_value(&json!("DAPI-1")), vec!["DAPI-1"]);
        assert_eq!(names_from_value(&json!(["A", 7, null])), vec!["A", "7", "nan"]);
        assert_eq!(names_from_value(&json!(42)), vec!["42"]);
    }

    #[test]
    fn test_load_csv() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rows.csv");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "Channel_Metadata_ID,Antibody_Name,Marker_Name,Channel_Name").unwrap();
        writeln!(file, "S1,\"[\"\"Anti-CD3\"\", \"\"CD8\"\"]\",CD3,DAPI-1").unwrap();
        writeln!(file, "S2,,Vimentin,").unwrap();
        drop(file);

        let records = load_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].source_id, "S1");
        assert_eq!(records[0].antibody_names, vec!["Anti-CD3", "CD8"]);
        assert_eq!(records[0].channel_names, vec!["DAPI-1"]);
        assert!(records[1].antibody_names.is_empty());
        assert_eq!(records[1].marker_names, vec!["Vimentin"]);
    }

    #[test]
    fn test_load_json_array_and_lines() {
        let dir = TempDir::new().unwrap();

        let array_path = dir.path().join("rows.json");
        fs::write(
            &array_path,
            r#"[{"Channel_Metadata_ID": 17, "Antibody_Name": ["CD3"], "Marker_Name": null}]"#,
        )
        .unwrap();
        let records = load_records(&array_path).unwrap();
        assert_eq!(records[0].source_id, "17");
        assert_eq!(records[0].antibody_names, vec!["CD3"]);
        assert!(records[0].marker_names.is_empty());
        assert!(records[0].channel_names.is_empty());

        let lines_path = dir.path().join("rows.jsonl");
        fs::write(
            &lines_path,
            "{\"Channel_Metadata_ID\": \"A\", \"Marker_Name\": [\"CD4\"]}\n{\"Channel_Metadata_ID\": \"B\", \"Channel_Name\": \"DAPI\"}\n",
        )
        .unwrap();
        let records = load_records(&lines_path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].channel_names, vec!["DAPI"]);
    }

    #[test]
    fn test_unsupported_extension() {
        assert!(load_records(Path::new("rows.parquet")).is_err());
    }
}
