//! Structure and per-row schema validation tests.

use iaso_model::{
    CellValue, FormVersion, ImportStrategy, Question, QuestionType, Row, RowAction, RowFailure,
    RowSet,
};
use iaso_validate::{apply_question_casts, check_structure, validate_row_schema};

fn question(name: &str, qtype: QuestionType, required: bool) -> Question {
    Question {
        name: name.to_string(),
        qtype,
        label: None,
        required,
        constraint: None,
        calculation: None,
    }
}

fn version(questions: Vec<Question>) -> FormVersion {
    FormVersion {
        version_id: "1".to_string(),
        questions,
        choices: vec![],
    }
}

fn row(cells: Vec<(&str, CellValue)>) -> Row {
    Row::new(
        cells
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect(),
    )
}

fn rowset(columns: Vec<&str>, rows: Vec<Row>) -> RowSet {
    RowSet {
        columns: columns.into_iter().map(str::to_string).collect(),
        rows,
    }
}

#[test]
fn structure_flags_missing_strategy_columns() {
    let v = version(vec![question("name", QuestionType::Text, false)]);
    let rows = rowset(
        vec!["name"],
        vec![row(vec![("name", CellValue::Text("x".to_string()))])],
    );

    let report = check_structure(&rows, &v, ImportStrategy::Create);
    assert!(!report.is_valid());
    assert_eq!(report.missing_columns, vec!["org_unit_id"]);

    let report = check_structure(&rows, &v, ImportStrategy::Update);
    assert_eq!(report.missing_columns, vec!["id", "instanceID"]);
}

#[test]
fn structure_warns_on_unexpected_columns() {
    let v = version(vec![question("name", QuestionType::Text, false)]);
    let rows = rowset(vec!["org_unit_id", "name", "hint_note"], vec![]);

    let report = check_structure(&rows, &v, ImportStrategy::Create);
    assert!(report.is_valid());
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("hint_note"));
}

#[test]
fn cast_pass_aligns_cells_with_question_types() {
    let v = version(vec![question("age", QuestionType::Integer, false)]);
    let rows = rowset(
        vec!["org_unit_id", "age"],
        vec![row(vec![
            ("org_unit_id", CellValue::Integer(1)),
            ("age", CellValue::Float(31.0)),
        ])],
    );

    let report = check_structure(&rows, &v, ImportStrategy::Create);
    assert_eq!(report.cast_columns.len(), 1);

    let casted = apply_question_casts(&rows, &report);
    assert_eq!(casted.rows[0].get("age"), Some(&CellValue::Integer(31)));
}

#[test]
fn lenient_mode_checks_only_identifier_columns() {
    let v = version(vec![question("age", QuestionType::Integer, false)]);
    let r = row(vec![
        ("org_unit_id", CellValue::Integer(1)),
        ("age", CellValue::Text("not a number".to_string())),
    ]);

    // Lenient: the uncastable question column is tolerated.
    assert!(validate_row_schema(&r, &RowAction::Create, &v, false).is_ok());

    // Strict: it is not.
    let error = validate_row_schema(&r, &RowAction::Create, &v, true).expect_err("uncastable");
    assert!(matches!(error, RowFailure::SchemaError(_)));
}

#[test]
fn absent_identifier_ignores_row_in_any_mode() {
    let v = version(vec![]);
    let r = row(vec![("name", CellValue::Text("x".to_string()))]);

    for strict in [false, true] {
        let error =
            validate_row_schema(&r, &RowAction::Create, &v, strict).expect_err("missing org unit");
        assert_eq!(error, RowFailure::missing_column("org_unit_id"));
    }
}

#[test]
fn strict_mode_validates_geo_columns() {
    let v = version(vec![]);
    let r = row(vec![
        ("org_unit_id", CellValue::Integer(1)),
        ("latitude", CellValue::Text("north".to_string())),
    ]);

    let error = validate_row_schema(&r, &RowAction::Create, &v, true).expect_err("bad latitude");
    assert!(matches!(error, RowFailure::SchemaError(_)));
    assert!(validate_row_schema(&r, &RowAction::Create, &v, false).is_ok());
}

#[test]
fn strict_mode_accepts_iso_dates() {
    let v = version(vec![question("visit_date", QuestionType::Date, false)]);
    let ok = row(vec![
        ("org_unit_id", CellValue::Integer(1)),
        ("visit_date", CellValue::Text("2026-01-15".to_string())),
    ]);
    assert!(validate_row_schema(&ok, &RowAction::Create, &v, true).is_ok());

    let bad = row(vec![
        ("org_unit_id", CellValue::Integer(1)),
        ("visit_date", CellValue::Text("someday".to_string())),
    ]);
    assert!(validate_row_schema(&bad, &RowAction::Create, &v, true).is_err());
}
