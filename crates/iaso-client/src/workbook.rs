//! Form-definition workbook parsing.
//!
//! The platform serves each form version as an XLSForm workbook: a survey
//! sheet with one row per question and a `choices` sheet with one row per
//! choice-list entry.

use std::io::Cursor;

use calamine::{Data, Reader, Xlsx};

use iaso_model::{Choice, FormVersion, Question, QuestionType};

use crate::error::ClientError;

/// Parse a fetched workbook into a [`FormVersion`].
pub fn parse_form_version(bytes: &[u8], version_id: &str) -> Result<FormVersion, ClientError> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes.to_vec()))
        .map_err(|error| ClientError::Workbook(error.to_string()))?;

    let sheet_names = workbook.sheet_names();
    let survey_sheet = sheet_names
        .iter()
        .find(|name| name.eq_ignore_ascii_case("survey"))
        .cloned()
        .or_else(|| sheet_names.first().cloned())
        .ok_or_else(|| ClientError::Workbook("workbook has no sheets".to_string()))?;
    let choices_sheet = sheet_names
        .iter()
        .find(|name| name.eq_ignore_ascii_case("choices"))
        .cloned();

    let questions = parse_questions(&mut workbook, &survey_sheet)?;
    let choices = match choices_sheet {
        Some(sheet) => parse_choices(&mut workbook, &sheet)?,
        None => Vec::new(),
    };

    Ok(FormVersion {
        version_id: version_id.to_string(),
        questions,
        choices,
    })
}

fn parse_questions(
    workbook: &mut Xlsx<Cursor<Vec<u8>>>,
    sheet: &str,
) -> Result<Vec<Question>, ClientError> {
    let range = workbook
        .worksheet_range(sheet)
        .map_err(|error| ClientError::Workbook(error.to_string()))?;
    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Ok(Vec::new());
    };
    let headers = lower_headers(header_row);

    let mut questions = Vec::new();
    for row in rows {
        let cell = |name: &str| -> Option<String> { cell_text(&headers, row, name) };
        let Some(name) = cell("name") else {
            continue;
        };
        let Some(type_raw) = cell("type") else {
            continue;
        };
        questions.push(Question {
            name,
            qtype: QuestionType::parse(&type_raw),
            label: cell("label"),
            required: cell("required")
                .is_some_and(|value| matches!(value.to_ascii_lowercase().as_str(), "yes" | "true")),
            constraint: cell("constraint"),
            calculation: cell("calculation"),
        });
    }
    Ok(questions)
}

fn parse_choices(
    workbook: &mut Xlsx<Cursor<Vec<u8>>>,
    sheet: &str,
) -> Result<Vec<Choice>, ClientError> {
    let range = workbook
        .worksheet_range(sheet)
        .map_err(|error| ClientError::Workbook(error.to_string()))?;
    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Ok(Vec::new());
    };
    let headers = lower_headers(header_row);

    let mut choices = Vec::new();
    for row in rows {
        let cell = |name: &str| -> Option<String> { cell_text(&headers, row, name) };
        // XLSForm spells the column "list name"; some exports use "list_name".
        let Some(list_name) = cell("list name").or_else(|| cell("list_name")) else {
            continue;
        };
        let Some(value) = cell("name").or_else(|| cell("value")) else {
            continue;
        };
        choices.push(Choice {
            list_name,
            value,
            label: cell("label"),
        });
    }
    Ok(choices)
}

fn lower_headers(row: &[Data]) -> Vec<String> {
    row.iter()
        .map(|cell| cell.to_string().trim().to_ascii_lowercase())
        .collect()
}

fn cell_text(headers: &[String], row: &[Data], name: &str) -> Option<String> {
    let idx = headers.iter().position(|header| header == name)?;
    let value = row.get(idx)?.to_string().trim().to_string();
    (!value.is_empty()).then_some(value)
}
