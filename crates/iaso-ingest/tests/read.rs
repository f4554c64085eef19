//! Submission file reading tests.

use std::io::Write;

use iaso_ingest::{IngestError, read_submissions_file};
use iaso_model::CellValue;

fn write_csv(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).expect("create fixture");
    file.write_all(content.as_bytes()).expect("write fixture");
    path
}

#[test]
fn reads_csv_rows_with_typed_cells() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_csv(
        &dir,
        "subs.csv",
        "org_unit_id,age,name\n42,31,Alice\n43,,Bob\n",
    );

    let rows = read_submissions_file(&path).expect("read csv");
    assert_eq!(rows.columns, vec!["org_unit_id", "age", "name"]);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows.rows[0].org_unit_id(), Some(42));
    assert_eq!(rows.rows[0].get("age"), Some(&CellValue::Integer(31)));
    assert_eq!(rows.rows[1].get("age"), Some(&CellValue::Null));
    assert_eq!(
        rows.rows[1].get("name"),
        Some(&CellValue::Text("Bob".to_string()))
    );
}

#[test]
fn skips_fully_blank_records() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_csv(&dir, "subs.csv", "org_unit_id,name\n42,Alice\n,\n43,Bob\n");

    let rows = read_submissions_file(&path).expect("read csv");
    assert_eq!(rows.len(), 2);
}

#[test]
fn empty_file_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_csv(&dir, "subs.csv", "org_unit_id,name\n");

    let error = read_submissions_file(&path).expect_err("no data rows");
    assert!(matches!(error, IngestError::EmptyFile(_)));
}

#[test]
fn unsupported_extension_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_csv(&dir, "subs.parquet", "not a parquet");

    let error = read_submissions_file(&path).expect_err("unsupported");
    assert!(matches!(error, IngestError::UnsupportedFormat(_)));
}

#[test]
fn missing_file_is_an_error() {
    let error =
        read_submissions_file(std::path::Path::new("/nonexistent/subs.csv")).expect_err("missing");
    assert!(matches!(error, IngestError::FileNotFound(_)));
}
