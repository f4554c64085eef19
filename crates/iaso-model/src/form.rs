//! Form definitions fetched from the platform.
//!
//! A form has one or more versions; each version is a fixed, ordered set of
//! questions plus the choice lists referenced by its select questions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Question type as declared in the form definition workbook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionType {
    Text,
    Integer,
    Decimal,
    Date,
    /// Single-choice select; carries the choice list name.
    SelectOne(String),
    /// Multi-choice select; carries the choice list name.
    SelectMultiple(String),
    Calculate,
    Geopoint,
    BeginGroup,
    EndGroup,
    Note,
    /// Anything the importer has no special handling for.
    Other(String),
}

impl QuestionType {
    /// Parse the workbook `type` column, e.g. `select_one fruits`.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let lowered = trimmed.to_ascii_lowercase();
        if let Some(list) = strip_select_prefix(&lowered, trimmed, "select_one")
            .or_else(|| strip_select_prefix(&lowered, trimmed, "select one"))
        {
            return QuestionType::SelectOne(list);
        }
        if let Some(list) = strip_select_prefix(&lowered, trimmed, "select_multiple")
            .or_else(|| strip_select_prefix(&lowered, trimmed, "select multiple"))
        {
            return QuestionType::SelectMultiple(list);
        }
        match lowered.as_str() {
            "text" => QuestionType::Text,
            "integer" | "int" => QuestionType::Integer,
            "decimal" => QuestionType::Decimal,
            "date" => QuestionType::Date,
            "calculate" => QuestionType::Calculate,
            "geopoint" => QuestionType::Geopoint,
            "begin group" | "begin_group" => QuestionType::BeginGroup,
            "end group" | "end_group" => QuestionType::EndGroup,
            "note" => QuestionType::Note,
            _ => QuestionType::Other(trimmed.to_string()),
        }
    }

    /// Choice list name for select questions.
    pub fn choice_list(&self) -> Option<&str> {
        match self {
            QuestionType::SelectOne(list) | QuestionType::SelectMultiple(list) => Some(list),
            _ => None,
        }
    }

    /// True for question types that hold a submittable value.
    pub fn is_value_bearing(&self) -> bool {
        !matches!(
            self,
            QuestionType::BeginGroup | QuestionType::EndGroup | QuestionType::Note
        )
    }
}

fn strip_select_prefix(lowered: &str, original: &str, prefix: &str) -> Option<String> {
    let rest = lowered.strip_prefix(prefix)?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let list = original[prefix.len()..].trim();
    (!list.is_empty()).then(|| list.to_string())
}

/// One question of a form version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub name: String,
    pub qtype: QuestionType,
    pub label: Option<String>,
    pub required: bool,
    /// Raw constraint expression, e.g. `.<= 120` or `regex(., '^[0-9]+$')`.
    pub constraint: Option<String>,
    /// Raw calculation expression for `calculate` questions.
    pub calculation: Option<String>,
}

/// One entry of a choice list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub list_name: String,
    pub value: String,
    pub label: Option<String>,
}

/// A versioned snapshot of a form's question and choice definitions.
///
/// The question set is fixed once fetched; multiple versions may coexist for
/// one form over its lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormVersion {
    pub version_id: String,
    pub questions: Vec<Question>,
    pub choices: Vec<Choice>,
}

impl FormVersion {
    pub fn question(&self, name: &str) -> Option<&Question> {
        self.questions.iter().find(|question| question.name == name)
    }

    /// Name of the first `begin group` question, when the form is grouped.
    pub fn group_name(&self) -> Option<&str> {
        self.questions
            .iter()
            .find(|question| question.qtype == QuestionType::BeginGroup)
            .map(|question| question.name.as_str())
    }

    /// Values of the named choice list, in declaration order.
    pub fn choice_values(&self, list_name: &str) -> Vec<&str> {
        self.choices
            .iter()
            .filter(|choice| choice.list_name == list_name)
            .map(|choice| choice.value.as_str())
            .collect()
    }
}

/// Form identity as resolved from the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormInfo {
    pub form_id: i64,
    /// Sanitized form name, safe for directory names.
    pub name: String,
    pub app_id: String,
    pub latest_version_id: String,
}

/// Everything the run needs to know about the target form.
///
/// Versions are fetched once and cached here, keyed by version identifier.
#[derive(Debug, Clone)]
pub struct FormModel {
    pub info: FormInfo,
    pub versions: BTreeMap<String, FormVersion>,
}

impl FormModel {
    /// The version a row targets: its own `form_version` when given,
    /// otherwise the latest version.
    pub fn resolve(&self, requested: Option<&str>) -> Option<&FormVersion> {
        let key = requested.unwrap_or(&self.info.latest_version_id);
        self.versions.get(key)
    }

    pub fn latest(&self) -> Option<&FormVersion> {
        self.versions.get(&self.info.latest_version_id)
    }
}
