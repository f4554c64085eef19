//! Cell values as read from the source file.
//!
//! Source cells keep the type the reader inferred; coercion happens at the
//! access points that need a specific type.

use std::fmt;

/// A single cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl CellValue {
    /// Parse a raw textual cell into the narrowest matching type.
    ///
    /// Empty or whitespace-only cells become `Null`.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return CellValue::Null;
        }
        if let Ok(value) = trimmed.parse::<i64>() {
            return CellValue::Integer(value);
        }
        if let Ok(value) = trimmed.parse::<f64>() {
            return CellValue::Float(value);
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "true" => CellValue::Bool(true),
            "false" => CellValue::Bool(false),
            _ => CellValue::Text(trimmed.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Integer view, coercing exact floats and numeric text.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            CellValue::Integer(value) => Some(*value),
            CellValue::Float(value) if value.fract() == 0.0 => Some(*value as i64),
            CellValue::Text(value) => value.trim().parse().ok(),
            _ => None,
        }
    }

    /// Float view, coercing integers and numeric text.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            CellValue::Float(value) => Some(*value),
            CellValue::Integer(value) => Some(*value as f64),
            CellValue::Text(value) => value.trim().parse().ok(),
            _ => None,
        }
    }

    /// Text view for non-null values.
    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::Null => None,
            CellValue::Text(value) => Some(value.clone()),
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Text(value) => write!(f, "{value}"),
            CellValue::Integer(value) => write!(f, "{value}"),
            CellValue::Float(value) => write!(f, "{value}"),
            CellValue::Bool(value) => write!(f, "{value}"),
        }
    }
}
