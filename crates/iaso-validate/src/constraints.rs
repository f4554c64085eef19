//! Compiled field constraints.
//!
//! Constraint expressions and choice lists are compiled once per form
//! version; rows sharing a version reuse the compiled set. Expressions may
//! reference sibling fields, so compilation keying must follow the version
//! discriminator, never the whole run.

use std::collections::BTreeSet;

use regex::Regex;
use tracing::warn;

use iaso_model::{CellValue, FormVersion, Row};

/// One field constraint in evaluable form.
#[derive(Debug, Clone)]
pub enum CompiledConstraint {
    /// `regex(., '...')`; the pattern must match from the start of the value.
    Pattern(Regex),
    /// `.<= N`
    Max(f64),
    /// `.>= N`
    Min(f64),
    /// Anything the evaluator does not understand; accepted, matching the
    /// platform's permissive behavior.
    Accept,
}

impl CompiledConstraint {
    /// Compile a raw constraint expression.
    pub fn parse(expression: &str) -> Self {
        let trimmed = expression.trim();
        if trimmed.starts_with("regex") {
            if let Some(pattern) = extract_regex_pattern(trimmed) {
                match Regex::new(&format!("^(?:{pattern})")) {
                    Ok(regex) => return CompiledConstraint::Pattern(regex),
                    Err(error) => {
                        warn!(constraint = %trimmed, %error, "unparseable regex constraint");
                        return CompiledConstraint::Accept;
                    }
                }
            }
            return CompiledConstraint::Accept;
        }
        if let Some(rest) = trimmed.strip_prefix(".<=") {
            if let Ok(bound) = rest.trim().parse() {
                return CompiledConstraint::Max(bound);
            }
            return CompiledConstraint::Accept;
        }
        if let Some(rest) = trimmed.strip_prefix(".>=") {
            if let Ok(bound) = rest.trim().parse() {
                return CompiledConstraint::Min(bound);
            }
            return CompiledConstraint::Accept;
        }
        CompiledConstraint::Accept
    }

    /// Check a non-null value against this constraint.
    pub fn check(&self, value: &CellValue) -> bool {
        match self {
            CompiledConstraint::Pattern(regex) => {
                value.as_text().is_some_and(|text| regex.is_match(&text))
            }
            CompiledConstraint::Max(bound) => {
                value.as_float().is_some_and(|number| number <= *bound)
            }
            CompiledConstraint::Min(bound) => {
                value.as_float().is_some_and(|number| number >= *bound)
            }
            CompiledConstraint::Accept => true,
        }
    }
}

fn extract_regex_pattern(expression: &str) -> Option<String> {
    let open = expression.find('\'')?;
    let close = expression.rfind('\'')?;
    (close > open).then(|| expression[open + 1..close].to_string())
}

#[derive(Debug, Clone)]
struct FieldRule {
    name: String,
    constraint: Option<CompiledConstraint>,
    choices: Option<BTreeSet<String>>,
}

/// The compiled constraint set of one form version.
#[derive(Debug, Clone)]
pub struct ConstraintSet {
    fields: Vec<FieldRule>,
}

impl ConstraintSet {
    /// Compile all constraints and choice lists of a version.
    pub fn compile(version: &FormVersion) -> Self {
        let mut fields = Vec::new();
        for question in &version.questions {
            let constraint = question
                .constraint
                .as_deref()
                .map(CompiledConstraint::parse);
            let choices = question.qtype.choice_list().map(|list| {
                version
                    .choice_values(list)
                    .into_iter()
                    .map(str::to_string)
                    .collect::<BTreeSet<String>>()
            });
            if constraint.is_none() && choices.is_none() {
                continue;
            }
            fields.push(FieldRule {
                name: question.name.clone(),
                constraint,
                choices,
            });
        }
        Self { fields }
    }

    /// Names of the fields whose values violate their constraint or choice
    /// set. Null and absent values are skipped: whether a value may be
    /// missing is a schema question, not a constraint question.
    pub fn failing_fields(&self, row: &Row) -> Vec<String> {
        let mut failing = Vec::new();
        for rule in &self.fields {
            let Some(value) = row.get(&rule.name) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            if let Some(constraint) = &rule.constraint
                && !constraint.check(value)
            {
                failing.push(rule.name.clone());
                continue;
            }
            if let Some(choices) = &rule.choices {
                let in_set = value
                    .as_text()
                    .is_some_and(|text| choices.contains(text.trim()));
                if !in_set {
                    failing.push(rule.name.clone());
                }
            }
        }
        failing
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
