//! Response parsing: accumulated model text → six invoice fields.
//!
//! The model is asked for JSON (see [`crate::prompts`]) but nothing
//! guarantees it complies. Parsing is best-effort: every failure collapses
//! into [`Extraction::error`], which the runner refuses to persist, so the
//! file is simply retried on the next run.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::error;

/// Marker written into every field when a response cannot be parsed.
pub const ERROR_MARKER: &str = "Error";

/// The six fields extracted from one document.
///
/// Field order follows the order the runner logs and the parser returns them;
/// the CSV column order is fixed separately by [`crate::table`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub total_amount: String,
    pub currency: String,
    pub description: String,
    pub invoice_date: String,
    pub is_invoice_receipt: String,
    pub confidence: String,
}

impl Extraction {
    /// The uniform failure value: `"Error"` in every field.
    pub fn error() -> Self {
        Self {
            total_amount: ERROR_MARKER.to_string(),
            currency: ERROR_MARKER.to_string(),
            description: ERROR_MARKER.to_string(),
            invoice_date: ERROR_MARKER.to_string(),
            is_invoice_receipt: ERROR_MARKER.to_string(),
            confidence: ERROR_MARKER.to_string(),
        }
    }

    /// Whether this extraction may be written to the results table.
    ///
    /// Empty descriptions and the error marker are rejected.
    pub fn is_persistable(&self) -> bool {
        !self.description.is_empty() && self.description != ERROR_MARKER
    }
}

#[derive(Debug, Error)]
enum ParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("field '{field}' must be a string, got {found}")]
    WrongType { field: &'static str, found: &'static str },
}

/// Parse the accumulated model response for one file.
///
/// Never fails: any error is logged and reported as [`Extraction::error`].
pub fn parse_response(full_response: &str) -> Extraction {
    match try_parse(full_response) {
        Ok(extraction) => extraction,
        Err(e) => {
            error!("Error parsing response: {}", e);
            Extraction::error()
        }
    }
}

fn try_parse(full_response: &str) -> Result<Extraction, ParseError> {
    let value: Value = serde_json::from_str(full_response)?;
    let obj = match value {
        Value::Object(obj) => obj,
        other => return Err(ParseError::NotAnObject(kind(&other))),
    };

    let total_amount = match obj.get("total_amount_due") {
        None => "0".to_string(),
        Some(Value::String(s)) => normalise_amount(s),
        Some(other) => {
            return Err(ParseError::WrongType {
                field: "total_amount_due",
                found: kind(other),
            })
        }
    };

    let is_invoice_receipt = match obj.get("verification_of_document_type") {
        Some(Value::String(s)) if s == "Yes" => "Yes",
        _ => "No",
    };

    Ok(Extraction {
        total_amount,
        currency: text_field(&obj, "currency_type", "CHF"),
        description: description_field(&obj),
        invoice_date: text_field(&obj, "invoice_receipt_creation_date", "Date not fully visible"),
        is_invoice_receipt: is_invoice_receipt.to_string(),
        confidence: text_field(&obj, "confidence_in_accuracy", "Unknown"),
    })
}

/// Strip the `" CHF"` suffix and turn decimal commas into dots.
///
/// Purely textual: `"1,234.50 CHF"` becomes `"1.234.50"`.
pub fn normalise_amount(raw: &str) -> String {
    raw.replace(" CHF", "").replace(',', ".")
}

/// Render a field as text. Strings are taken verbatim, `null` is empty and
/// anything else is written as its JSON text.
fn text_field(obj: &Map<String, Value>, key: &str, default: &str) -> String {
    match obj.get(key) {
        None => default.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) => String::new(),
        Some(other) => other.to_string(),
    }
}

/// The description, with JSON-falsy values (`false`, zero, `[]`, `{}`)
/// read as empty so the file is not persisted.
fn description_field(obj: &Map<String, Value>) -> String {
    match obj.get("transaction_description") {
        Some(v) if is_falsy(v) => String::new(),
        _ => text_field(obj, "transaction_description", "Unknown"),
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
