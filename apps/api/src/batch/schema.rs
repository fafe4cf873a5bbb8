//! Extraction schema checks and write-time attribute validation.
//!
//! The extraction service answers loosely typed JSON. Before anything is stored
//! each value is coerced to its declared type; placeholders such as "N/A" count
//! as absent, and values that cannot be coerced reject the candidate.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::models::candidate::{AttributeMap, AttributeValue, ExtractionField, FieldType};

static LEADING_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?\d+(?:\.\d+)?").expect("valid regex"));

const ABSENT_MARKERS: &[&str] = &["", "n/a", "na", "none", "null", "unknown", "-", "not specified"];

#[derive(Debug, Error, PartialEq)]
pub enum SchemaError {
    #[error("Field #{index} has a blank name")]
    BlankFieldName { index: usize },

    #[error("Field '{0}' is declared more than once")]
    DuplicateField(String),

    #[error("Field '{field}' expected {expected:?}, got {found}")]
    TypeMismatch {
        field: String,
        expected: FieldType,
        found: String,
    },
}

/// Rejects blank names and case-insensitive duplicates.
pub fn validate_schema(fields: &[ExtractionField]) -> Result<(), SchemaError> {
    let mut seen = HashSet::new();
    for (index, field) in fields.iter().enumerate() {
        let name = field.name.trim();
        if name.is_empty() {
            return Err(SchemaError::BlankFieldName { index });
        }
        if !seen.insert(name.to_lowercase()) {
            return Err(SchemaError::DuplicateField(name.to_string()));
        }
    }
    Ok(())
}

/// Keeps declared fields only, coerced to their declared types.
pub fn coerce_attributes(
    raw: AttributeMap,
    fields: &[ExtractionField],
) -> Result<AttributeMap, SchemaError> {
    let mut out = AttributeMap::new();
    for field in fields {
        let value = raw.get(&field.name).or_else(|| {
            raw.iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(&field.name))
                .map(|(_, v)| v)
        });
        let Some(value) = value else {
            continue;
        };
        if let Some(coerced) = coerce_value(&field.name, field.field_type, value)? {
            out.insert(field.name.clone(), coerced);
        }
    }
    Ok(out)
}

fn coerce_value(
    field: &str,
    expected: FieldType,
    value: &AttributeValue,
) -> Result<Option<AttributeValue>, SchemaError> {
    if let AttributeValue::Text(s) = value {
        if is_absent(s) {
            return Ok(None);
        }
    }

    let mismatch = || SchemaError::TypeMismatch {
        field: field.to_string(),
        expected,
        found: describe(value),
    };

    let coerced = match (expected, value) {
        (FieldType::Boolean, AttributeValue::Bool(b)) => AttributeValue::Bool(*b),
        (FieldType::Boolean, AttributeValue::Number(n)) => AttributeValue::Bool(*n != 0.0),
        (FieldType::Boolean, AttributeValue::Text(s)) => {
            match s.trim().to_lowercase().as_str() {
                "true" | "yes" | "y" => AttributeValue::Bool(true),
                "false" | "no" | "n" => AttributeValue::Bool(false),
                _ => return Err(mismatch()),
            }
        }
        (FieldType::Number, AttributeValue::Number(n)) => AttributeValue::Number(*n),
        (FieldType::Number, AttributeValue::Text(s)) => {
            let cleaned = s.replace(',', "");
            let n = LEADING_NUMBER_RE
                .find(&cleaned)
                .and_then(|m| m.as_str().parse::<f64>().ok())
                .ok_or_else(mismatch)?;
            AttributeValue::Number(n)
        }
        (FieldType::String, AttributeValue::Text(s)) => AttributeValue::Text(s.trim().to_string()),
        (FieldType::String, AttributeValue::Number(n)) => AttributeValue::Text(n.to_string()),
        (FieldType::String, AttributeValue::Bool(b)) => AttributeValue::Text(b.to_string()),
        (FieldType::String, AttributeValue::List(items)) => AttributeValue::Text(items.join(", ")),
        (FieldType::StringList, AttributeValue::List(items)) => AttributeValue::List(clean_list(
            items.iter().map(String::as_str),
        )),
        (FieldType::StringList, AttributeValue::Text(s)) => {
            AttributeValue::List(clean_list(s.split([',', ';', '\n'])))
        }
        _ => return Err(mismatch()),
    };

    if let AttributeValue::List(items) = &coerced {
        if items.is_empty() {
            return Ok(None);
        }
    }
    Ok(Some(coerced))
}

fn clean_list<'a>(items: impl Iterator<Item = &'a str>) -> Vec<String> {
    items
        .map(str::trim)
        .filter(|s| !is_absent(s))
        .map(String::from)
        .collect()
}

fn is_absent(s: &str) -> bool {
    ABSENT_MARKERS.contains(&s.trim().to_lowercase().as_str())
}

fn describe(value: &AttributeValue) -> String {
    match value {
        AttributeValue::Bool(b) => format!("boolean {b}"),
        AttributeValue::Number(n) => format!("number {n}"),
        AttributeValue::Text(s) => format!("text '{s}'"),
        AttributeValue::List(items) => format!("list of {}", items.len()),
    }
}
