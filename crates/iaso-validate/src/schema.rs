//! Structural validation ahead of constraint checks.
//!
//! Two layers: a table-level structure report computed once per run (missing
//! columns, type mismatches to cast, unexpected columns), and a per-row check
//! applied after routing. The per-row check always verifies the action's
//! identifier columns; the remaining typed checks only run in strict mode.

use chrono::NaiveDate;
use tracing::debug;

use iaso_model::row::{COL_ACCURACY, COL_ALTITUDE, COL_LATITUDE, COL_LONGITUDE};
use iaso_model::{
    CellValue, FormVersion, ImportStrategy, Question, QuestionType, Row, RowAction, RowFailure,
    RowSet,
};

/// Columns every action of a strategy may need, checked at table level.
fn strategy_required_columns(strategy: ImportStrategy) -> &'static [&'static str] {
    match strategy {
        ImportStrategy::Create => &["org_unit_id"],
        ImportStrategy::Update => &["id", "instanceID"],
        // Either leg of CREATE_AND_UPDATE can apply, so only the column both
        // legs share is required up front.
        ImportStrategy::CreateAndUpdate => &["org_unit_id"],
        ImportStrategy::Delete => &["id"],
    }
}

/// Table-level structure report.
#[derive(Debug, Clone, Default)]
pub struct StructureReport {
    pub missing_columns: Vec<String>,
    /// Columns whose question type disagrees with the ingested cells.
    pub cast_columns: Vec<(String, QuestionType)>,
    pub warnings: Vec<String>,
}

impl StructureReport {
    pub fn is_valid(&self) -> bool {
        self.missing_columns.is_empty()
    }
}

/// Check the input table against the strategy and the form's question set.
///
/// Missing columns make affected rows ignorable later; they are reported
/// here once so the operator sees the problem up front.
pub fn check_structure(
    rows: &RowSet,
    version: &FormVersion,
    strategy: ImportStrategy,
) -> StructureReport {
    let mut report = StructureReport::default();

    for column in strategy_required_columns(strategy) {
        if !rows.has_column(column) {
            report.missing_columns.push((*column).to_string());
        }
    }

    for question in &version.questions {
        if !question.qtype.is_value_bearing() {
            continue;
        }
        if question.required && !rows.has_column(&question.name) {
            report.missing_columns.push(question.name.clone());
        }
        if rows.has_column(&question.name) && column_needs_cast(rows, question) {
            report
                .cast_columns
                .push((question.name.clone(), question.qtype.clone()));
        }
    }

    let known = |name: &str| {
        version.questions.iter().any(|question| question.name == name)
            || RESERVED_COLUMNS.contains(&name)
    };
    for column in &rows.columns {
        if !known(column) {
            report.warnings.push(format!("unexpected column '{column}'"));
        }
    }

    report
}

/// Columns with importer-level meaning that are not form questions.
const RESERVED_COLUMNS: &[&str] = &[
    "id",
    "instanceID",
    "org_unit_id",
    "form_version",
    "created_at",
    "latitude",
    "longitude",
    "altitude",
    "accuracy",
];

fn column_needs_cast(rows: &RowSet, question: &Question) -> bool {
    rows.rows.iter().any(|row| {
        let Some(value) = row.get(&question.name) else {
            return false;
        };
        if value.is_null() {
            return false;
        }
        match question.qtype {
            QuestionType::Integer => !matches!(value, CellValue::Integer(_)),
            QuestionType::Decimal | QuestionType::Calculate => {
                !matches!(value, CellValue::Integer(_) | CellValue::Float(_))
            }
            QuestionType::Text => !matches!(value, CellValue::Text(_)),
            _ => false,
        }
    })
}

/// Cast columns to the types their questions declare, producing a new table.
///
/// Uncastable cells are left as read; the strict per-row check rejects them.
pub fn apply_question_casts(rows: &RowSet, report: &StructureReport) -> RowSet {
    if report.cast_columns.is_empty() {
        return rows.clone();
    }
    for (column, qtype) in &report.cast_columns {
        debug!(column = %column, target = ?qtype, "casting column to question type");
    }

    let casted = rows
        .rows
        .iter()
        .map(|row| {
            let mut out = row.clone();
            for (column, qtype) in &report.cast_columns {
                let Some(value) = row.get(column) else {
                    continue;
                };
                if let Some(cast) = cast_cell(value, qtype) {
                    out = out.with_cell(column, cast);
                }
            }
            out
        })
        .collect();

    RowSet {
        columns: rows.columns.clone(),
        rows: casted,
    }
}

fn cast_cell(value: &CellValue, qtype: &QuestionType) -> Option<CellValue> {
    if value.is_null() {
        return None;
    }
    match qtype {
        QuestionType::Integer => value.as_integer().map(CellValue::Integer),
        QuestionType::Decimal | QuestionType::Calculate => value.as_float().map(CellValue::Float),
        QuestionType::Text => value.as_text().map(CellValue::Text),
        _ => None,
    }
}

/// Per-row structural check for the routed action.
///
/// Identifier columns are verified regardless of mode; an absent required
/// column always ignores the row. The full typed pass (question types, date
/// and geo castability) runs only under strict validation.
pub fn validate_row_schema(
    row: &Row,
    action: &RowAction,
    version: &FormVersion,
    strict: bool,
) -> Result<(), RowFailure> {
    match action {
        RowAction::Create => {
            if row.org_unit_id().is_none() {
                return Err(RowFailure::missing_column("org_unit_id"));
            }
        }
        RowAction::Update { .. } => {
            if row.id().is_none() {
                return Err(RowFailure::missing_column("id"));
            }
            if row.instance_uuid().is_none() {
                return Err(RowFailure::missing_column("instanceID"));
            }
        }
        RowAction::Delete { .. } => {
            if row.id().is_none() {
                return Err(RowFailure::missing_column("id"));
            }
        }
        RowAction::Ignored(reason) => return Err(reason.clone()),
    }

    if !strict {
        return Ok(());
    }

    for column in [COL_LATITUDE, COL_LONGITUDE, COL_ALTITUDE, COL_ACCURACY] {
        if let Some(value) = row.get(column)
            && !value.is_null()
            && value.as_float().is_none()
        {
            return Err(RowFailure::SchemaError(format!(
                "column '{column}' is not numeric"
            )));
        }
    }

    for question in &version.questions {
        let Some(value) = row.get(&question.name) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        let castable = match &question.qtype {
            QuestionType::Integer => value.as_integer().is_some(),
            QuestionType::Decimal | QuestionType::Calculate => value.as_float().is_some(),
            QuestionType::Date => is_date_like(value),
            _ => true,
        };
        if !castable {
            return Err(RowFailure::SchemaError(format!(
                "column '{}' is not castable to {:?}",
                question.name, question.qtype
            )));
        }
    }

    Ok(())
}

fn is_date_like(value: &CellValue) -> bool {
    let Some(text) = value.as_text() else {
        return false;
    };
    const FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y"];
    FORMATS
        .iter()
        .any(|format| NaiveDate::parse_from_str(text.trim(), format).is_ok())
}
