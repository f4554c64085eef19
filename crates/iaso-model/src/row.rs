//! Submission rows.
//!
//! A `Row` is an ordered column -> value mapping read once from the input
//! file. Rows are never mutated in place; passes that adjust values (casts,
//! calculated columns) build new rows.

use crate::cell::CellValue;

/// Well-known column names with strategy-dependent meaning.
pub const COL_ID: &str = "id";
pub const COL_INSTANCE_ID: &str = "instanceID";
pub const COL_ORG_UNIT_ID: &str = "org_unit_id";
pub const COL_FORM_VERSION: &str = "form_version";
pub const COL_LATITUDE: &str = "latitude";
pub const COL_LONGITUDE: &str = "longitude";
pub const COL_ALTITUDE: &str = "altitude";
pub const COL_ACCURACY: &str = "accuracy";

/// One submission row, in source column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: Vec<(String, CellValue)>,
}

impl Row {
    pub fn new(cells: Vec<(String, CellValue)>) -> Self {
        Self { cells }
    }

    pub fn cells(&self) -> &[(String, CellValue)] {
        &self.cells
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// True when the column exists and holds a non-null value.
    pub fn has_value(&self, column: &str) -> bool {
        self.get(column).is_some_and(|value| !value.is_null())
    }

    /// Numeric remote instance identifier.
    pub fn id(&self) -> Option<i64> {
        self.get(COL_ID).and_then(CellValue::as_integer)
    }

    /// Instance UUID string, possibly carrying a `uuid:` prefix.
    pub fn instance_uuid(&self) -> Option<String> {
        self.get(COL_INSTANCE_ID).and_then(CellValue::as_text)
    }

    pub fn org_unit_id(&self) -> Option<i64> {
        self.get(COL_ORG_UNIT_ID).and_then(CellValue::as_integer)
    }

    pub fn form_version(&self) -> Option<String> {
        self.get(COL_FORM_VERSION).and_then(CellValue::as_text)
    }

    pub fn latitude(&self) -> Option<f64> {
        self.get(COL_LATITUDE).and_then(CellValue::as_float)
    }

    pub fn longitude(&self) -> Option<f64> {
        self.get(COL_LONGITUDE).and_then(CellValue::as_float)
    }

    pub fn altitude(&self) -> Option<f64> {
        self.get(COL_ALTITUDE).and_then(CellValue::as_float)
    }

    pub fn accuracy(&self) -> Option<f64> {
        self.get(COL_ACCURACY).and_then(CellValue::as_float)
    }

    /// Copy of this row with one column replaced or appended.
    pub fn with_cell(&self, column: &str, value: CellValue) -> Row {
        let mut cells = self.cells.clone();
        match cells.iter_mut().find(|(name, _)| name == column) {
            Some((_, slot)) => *slot = value,
            None => cells.push((column.to_string(), value)),
        }
        Row { cells }
    }
}

/// The full input table: column order plus one `Row` per record.
#[derive(Debug, Clone, Default)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl RowSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|name| name == column)
    }
}
