//! Excel row loading via calamine.

use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};

use iaso_model::{CellValue, Row, RowSet};

use crate::error::IngestError;
use crate::table::normalize_header;

/// Read the first worksheet of an Excel workbook into rows.
pub fn read_workbook(path: &Path) -> Result<RowSet, IngestError> {
    let mut workbook =
        open_workbook_auto(path).map_err(|error| IngestError::Excel(error.to_string()))?;

    let sheet_names = workbook.sheet_names();
    let Some(sheet_name) = sheet_names.first().cloned() else {
        return Err(IngestError::Excel("workbook has no sheets".to_string()));
    };

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|error| IngestError::Excel(error.to_string()))?;

    let mut sheet_rows = range.rows();
    let Some(header_row) = sheet_rows.next() else {
        return Ok(RowSet::default());
    };

    let columns: Vec<String> = header_row
        .iter()
        .map(|cell| normalize_header(&cell.to_string()))
        .collect();

    let mut rows = Vec::new();
    for data_row in sheet_rows {
        if data_row.iter().all(is_blank) {
            continue;
        }
        let cells = columns
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let value = data_row.get(idx).map_or(CellValue::Null, convert_cell);
                (name.clone(), value)
            })
            .collect();
        rows.push(Row::new(cells));
    }

    Ok(RowSet { columns, rows })
}

fn is_blank(cell: &Data) -> bool {
    match cell {
        Data::Empty => true,
        Data::String(value) => value.trim().is_empty(),
        _ => false,
    }
}

pub(crate) fn convert_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Null,
        Data::Int(value) => CellValue::Integer(*value),
        Data::Float(value) => {
            if value.fract() == 0.0 {
                CellValue::Integer(*value as i64)
            } else {
                CellValue::Float(*value)
            }
        }
        Data::Bool(value) => CellValue::Bool(*value),
        Data::String(value) => CellValue::parse(value),
        other => CellValue::parse(&other.to_string()),
    }
}
