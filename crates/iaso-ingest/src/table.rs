//! CSV row loading.

use std::fs::File;
use std::path::Path;

use csv::ReaderBuilder;

use iaso_model::{CellValue, Row, RowSet};

use crate::error::IngestError;

/// Read a CSV file into rows.
///
/// Headers are trimmed and BOM-stripped; fully blank records are skipped.
pub fn read_csv(path: &Path) -> Result<RowSet, IngestError> {
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file);

    let columns: Vec<String> = reader
        .headers()?
        .iter()
        .map(normalize_header)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        let cells = columns
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let raw = record.get(idx).unwrap_or("");
                (name.clone(), CellValue::parse(raw))
            })
            .collect();
        rows.push(Row::new(cells));
    }

    Ok(RowSet { columns, rows })
}

pub(crate) fn normalize_header(raw: &str) -> String {
    raw.trim().trim_matches('\u{feff}').to_string()
}
