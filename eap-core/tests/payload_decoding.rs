//! Decoding of gzip artifacts as they land on disk.

use eap_core::domain::OutputFormat;
use eap_core::payload::decode_artifact;
use eap_core::EapError;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::{json, Value};
use std::io::Write;
use std::path::{Path, PathBuf};

fn write_gz(dir: &Path, name: &str, body: &[u8]) -> PathBuf {
    let path = dir.join(name);
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(body).unwrap();
    std::fs::write(&path, encoder.finish().unwrap()).unwrap();
    path
}

#[test]
fn csv_artifact_decodes_with_quoted_fields() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_gz(
        dir.path(),
        "r1.csv.gz",
        b"IDENTIFIER,NAME,PX_LAST\nUS1@AAA,\"Acme, Inc.\",10.5\nUS1@BBB,Beta,\n",
    );
    let decoded = decode_artifact(&path, OutputFormat::Csv).unwrap();
    assert_eq!(decoded.skipped_rows, 0);
    assert_eq!(decoded.table.len(), 2);
    assert_eq!(decoded.table.text(0, "NAME").as_deref(), Some("Acme, Inc."));
    assert_eq!(decoded.table.cell(1, "PX_LAST"), Some(&Value::Null));
}

#[test]
fn json_artifact_decodes_records() {
    let dir = tempfile::tempdir().unwrap();
    let body = json!([
        {"IDENTIFIER": "US1@AAA", "PX_LAST": 10.5},
        {"IDENTIFIER": "US1@BBB", "PX_LAST": 11.0}
    ]);
    let path = write_gz(dir.path(), "r1.json.gz", body.to_string().as_bytes());
    let decoded = decode_artifact(&path, OutputFormat::Json).unwrap();
    assert_eq!(decoded.table.len(), 2);
    assert_eq!(decoded.table.cell(1, "PX_LAST"), Some(&json!(11.0)));
}

#[test]
fn plain_bytes_are_not_gzip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("r1.csv.gz");
    std::fs::write(&path, b"IDENTIFIER\nUS1@AAA\n").unwrap();
    let err = decode_artifact(&path, OutputFormat::Csv).unwrap_err();
    assert!(matches!(err, EapError::PayloadDecode { .. }));
}

#[test]
fn wrong_format_is_a_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_gz(dir.path(), "r1.json.gz", b"IDENTIFIER\nUS1@AAA\n");
    let err = decode_artifact(&path, OutputFormat::Json).unwrap_err();
    assert!(matches!(err, EapError::PayloadDecode { .. }));
}

#[test]
fn missing_artifact_is_a_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = decode_artifact(&dir.path().join("absent.gz"), OutputFormat::Csv).unwrap_err();
    assert!(matches!(err, EapError::PayloadDecode { .. }));
}
