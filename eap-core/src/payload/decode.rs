//! Gzip artifact → [`Table`].
//!
//! CSV: header row, double-quote quoting; rows that fail to parse (wrong
//! field count, invalid UTF-8) are skipped and counted. Empty cells are null.
//!
//! JSON: an array of records (or a single record); nested objects are
//! flattened into dotted keys (`a.b.c`).

use crate::domain::{OutputFormat, Row, Table};
use crate::error::EapError;
use flate2::read::GzDecoder;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedTable {
    pub table: Table,
    pub skipped_rows: usize,
}

/// Decompress and parse a downloaded artifact.
pub fn decode_artifact(path: &Path, format: OutputFormat) -> Result<DecodedTable, EapError> {
    let label = path.display().to_string();
    let file = File::open(path).map_err(|e| EapError::decode(&label, e.to_string()))?;

    let mut bytes = Vec::new();
    GzDecoder::new(BufReader::new(file))
        .read_to_end(&mut bytes)
        .map_err(|e| EapError::decode(&label, format!("invalid gzip: {e}")))?;

    let decoded = match format {
        OutputFormat::Csv => decode_csv(&bytes),
        OutputFormat::Json => decode_json(&bytes),
    }
    .map_err(|reason| EapError::decode(&label, reason))?;

    info!(
        path = %label,
        rows = decoded.table.len(),
        columns = decoded.table.columns().len(),
        skipped = decoded.skipped_rows,
        "artifact decoded"
    );
    Ok(decoded)
}

pub fn decode_csv(bytes: &[u8]) -> Result<DecodedTable, String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .quote(b'"')
        .flexible(false)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| format!("invalid CSV header: {e}"))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut table = Table::new(Vec::new());
    let mut skipped_rows = 0;
    for (i, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!(row = i + 1, error = %e, "skipping malformed CSV row");
                skipped_rows += 1;
                continue;
            }
        };
        let row: Row = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| {
                let cell = if v.is_empty() {
                    Value::Null
                } else {
                    Value::String(v.to_string())
                };
                (h.clone(), cell)
            })
            .collect();
        table.push_ordered(&headers, row);
    }

    // Header-only artifacts keep their columns.
    if table.is_empty() {
        table = Table::new(dedup(headers));
    }

    Ok(DecodedTable {
        table,
        skipped_rows,
    })
}

pub fn decode_json(bytes: &[u8]) -> Result<DecodedTable, String> {
    let text = std::str::from_utf8(bytes).map_err(|e| format!("invalid UTF-8: {e}"))?;
    let value: Value = serde_json::from_str(text).map_err(|e| format!("invalid JSON: {e}"))?;

    let records = match value {
        Value::Array(items) => items,
        obj @ Value::Object(_) => vec![obj],
        other => return Err(format!("expected an array of records, got {}", kind(&other))),
    };

    let mut table = Table::new(Vec::new());
    for (i, record) in records.into_iter().enumerate() {
        let map = match record {
            Value::Object(map) => map,
            other => return Err(format!("record {i} is {}, not an object", kind(&other))),
        };
        let mut order = Vec::new();
        let mut row = Row::new();
        flatten_into("", map, &mut order, &mut row);
        table.push_ordered(&order, row);
    }

    Ok(DecodedTable {
        table,
        skipped_rows: 0,
    })
}

fn flatten_into(prefix: &str, map: Map<String, Value>, order: &mut Vec<String>, row: &mut Row) {
    for (key, value) in map {
        let path = if prefix.is_empty() {
            key
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(inner) if !inner.is_empty() => flatten_into(&path, inner, order, row),
            Value::Object(_) => {}
            other => {
                order.push(path.clone());
                row.insert(path, other);
            }
        }
    }
}

fn dedup(columns: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(columns.len());
    for c in columns {
        if !out.contains(&c) {
            out.push(c);
        }
    }
    out
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn csv_skips_rows_with_wrong_field_count() {
        let csv = "IDENTIFIER,PX_LAST\nA@1,10.5\nbroken\nB@2,\"1,000\"\n";
        let decoded = decode_csv(csv.as_bytes()).unwrap();
        assert_eq!(decoded.skipped_rows, 1);
        assert_eq!(decoded.table.len(), 2);
        assert_eq!(decoded.table.text(1, "PX_LAST").as_deref(), Some("1,000"));
        assert_eq!(
            decoded.table.columns(),
            &["IDENTIFIER".to_string(), "PX_LAST".to_string()]
        );
    }

    #[test]
    fn csv_empty_cells_are_null() {
        let decoded = decode_csv(b"A,B\n1,\n").unwrap();
        assert_eq!(decoded.table.cell(0, "B"), Some(&Value::Null));
    }

    #[test]
    fn csv_header_only_keeps_columns() {
        let decoded = decode_csv(b"A,B\n").unwrap();
        assert!(decoded.table.is_empty());
        assert_eq!(decoded.table.columns().len(), 2);
    }

    #[test]
    fn json_flattens_nested_objects() {
        let body = json!([
            {"IDENTIFIER": "A@1", "DATA": {"PX_LAST": 10.5, "META": {"SRC": "x"}}, "TAGS": [1, 2]},
            {"IDENTIFIER": "B@2", "EXTRA": null}
        ]);
        let decoded = decode_json(body.to_string().as_bytes()).unwrap();
        let t = &decoded.table;
        assert_eq!(t.len(), 2);
        assert_eq!(t.cell(0, "DATA.PX_LAST"), Some(&json!(10.5)));
        assert_eq!(t.cell(0, "DATA.META.SRC"), Some(&json!("x")));
        assert_eq!(t.cell(0, "TAGS"), Some(&json!([1, 2])));
        assert!(t.has_column("EXTRA"));
        assert!(t.cell(0, "EXTRA").is_none());
    }

    #[test]
    fn json_single_object_is_one_row() {
        let decoded = decode_json(br#"{"A": 1}"#).unwrap();
        assert_eq!(decoded.table.len(), 1);
    }

    #[test]
    fn json_rejects_scalars() {
        assert!(decode_json(b"42").is_err());
        assert!(decode_json(b"[1, 2]").is_err());
        assert!(decode_json(b"{not json").is_err());
    }
}
