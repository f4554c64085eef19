pub mod error;
pub mod excel;
pub mod table;

use std::path::Path;

use tracing::info;

use iaso_model::RowSet;

pub use error::IngestError;

/// Read a submissions file into rows, dispatching on the file extension.
///
/// Supports `.csv`, `.xlsx` and `.xls`. An empty file (no data rows) is an
/// error: a run over zero rows is always a caller mistake.
pub fn read_submissions_file(path: &Path) -> Result<RowSet, IngestError> {
    if !path.exists() {
        return Err(IngestError::FileNotFound(path.display().to_string()));
    }

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase();

    let rows = match extension.as_str() {
        "csv" => table::read_csv(path)?,
        "xlsx" | "xls" => excel::read_workbook(path)?,
        other => return Err(IngestError::UnsupportedFormat(other.to_string())),
    };

    if rows.is_empty() {
        return Err(IngestError::EmptyFile(path.display().to_string()));
    }

    info!(
        path = %path.display(),
        record_count = rows.len(),
        column_count = rows.columns.len(),
        "submissions file read"
    );
    Ok(rows)
}
