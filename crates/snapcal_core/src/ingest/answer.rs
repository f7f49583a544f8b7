//! Model answer decoding.
//!
//! # Responsibility
//! - Turn raw model text into validated, coerced meal items.
//! - Keep untyped JSON out of the domain model.
//!
//! # Invariants
//! - `kcal` and `qty_g` are rounded, non-negative integers.
//! - Every item has a non-empty name (`"Unknown"` when the model gave none).
//! - Parse diagnostics carry at most `RAW_PREFIX_CHARS` characters.

use crate::logging::sanitize_message;
use crate::model::entry::NewEntry;
use log::debug;
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Upper bound on raw-text characters kept in parse diagnostics.
pub const RAW_PREFIX_CHARS: usize = 120;

const UNKNOWN_ITEM_NAME: &str = "Unknown";

/// One food or beverage item estimated by the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MealItem {
    pub name: String,
    pub kcal: u32,
    pub qty_g: Option<u32>,
}

impl MealItem {
    /// Converts into an insertion partial tagged as model-estimated.
    pub fn into_new_entry(self) -> NewEntry {
        NewEntry::ai(self.name, f64::from(self.kcal), self.qty_g.map(f64::from))
    }
}

/// Why a model answer was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerError {
    /// Answer text is not JSON.
    Parse { raw_text_prefix: String },
    /// JSON does not have the `{"items": [...]}` shape.
    Validation(String),
}

impl Display for AnswerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse { raw_text_prefix } => {
                write!(f, "model answer is not JSON: {raw_text_prefix}")
            }
            Self::Validation(message) => write!(f, "model answer has unexpected shape: {message}"),
        }
    }
}

impl Error for AnswerError {}

/// Parses and validates the model's answer text.
///
/// Markdown code fences around the JSON are tolerated. Non-object elements of
/// `items` carry no usable data and are skipped.
pub fn parse_answer(text: &str) -> Result<Vec<MealItem>, AnswerError> {
    let body = strip_code_fence(text);
    let value: Value = serde_json::from_str(body).map_err(|_| AnswerError::Parse {
        raw_text_prefix: sanitize_message(text, RAW_PREFIX_CHARS),
    })?;

    let root = value.as_object().ok_or_else(|| {
        AnswerError::Validation("top-level answer is not a JSON object".to_string())
    })?;
    let items = match root.get("items") {
        Some(Value::Array(items)) => items,
        Some(_) => return Err(AnswerError::Validation("`items` is not an array".to_string())),
        None => return Err(AnswerError::Validation("missing `items` array".to_string())),
    };

    let mut parsed = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match item.as_object() {
            Some(fields) => parsed.push(coerce_item(fields)),
            None => debug!("event=answer_item_skipped module=ingest index={index}"),
        }
    }
    Ok(parsed)
}

fn coerce_item(fields: &Map<String, Value>) -> MealItem {
    let name = fields
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(UNKNOWN_ITEM_NAME)
        .to_string();

    MealItem {
        name,
        kcal: coerce_amount(fields.get("kcal")).unwrap_or(0),
        qty_g: coerce_amount(fields.get("qty_g")),
    }
}

/// Numbers and numeric strings become rounded non-negative integers.
fn coerce_amount(value: Option<&Value>) -> Option<u32> {
    let raw = match value? {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !raw.is_finite() {
        return None;
    }
    // Float-to-int `as` saturates at the integer bounds.
    Some(raw.max(0.0).round() as u32)
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(rest) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`) on the opening fence line.
    match rest.find('\n') {
        Some(newline) => rest[newline + 1..].trim(),
        None => rest.trim_start_matches(char::is_alphabetic).trim(),
    }
}
