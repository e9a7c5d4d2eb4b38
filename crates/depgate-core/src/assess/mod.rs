//! Normalization of untrusted, model-produced assessment payloads.
//!
//! The evaluator replies with one JSON object (optionally fenced in a
//! code block). [`extract_json`] pulls that object out of the raw reply;
//! [`normalize`] validates it against the fixed assessment schema,
//! rejecting unknown fields and filling optional textual fields. Only a
//! fully normalized payload becomes an [`AssessmentFields`] value.
//!
//! All failures are structured [`ValidationError`] results, never fatal.

use serde_json::{Map, Value};

use crate::domain::assessment::{AssessmentFields, Compatibility, RiskStatus};
use crate::domain::error::ValidationError;

/// The fixed set of recognized assessment fields. Anything else in the
/// payload is rejected by name.
const RECOGNIZED_FIELDS: [&str; 12] = [
    "safe",
    "security_status",
    "security_concerns",
    "breaking_status",
    "breaking_changes",
    "compatibility",
    "security_change_summary",
    "security_notes",
    "compatibility_change_summary",
    "compatibility_notes",
    "change_summary",
    "notes",
];

/// Fallback when the evaluator supplied neither `change_summary` nor
/// `notes`.
const FALLBACK_SUMMARY: &str = "No summary provided by the evaluator.";

/// Validate an untrusted payload against the assessment schema.
pub fn normalize(value: &Value) -> Result<AssessmentFields, ValidationError> {
    let map = value.as_object().ok_or(ValidationError::NotAnObject)?;

    let mut unknown: Vec<String> = map
        .keys()
        .filter(|key| !RECOGNIZED_FIELDS.contains(&key.as_str()))
        .cloned()
        .collect();
    if !unknown.is_empty() {
        unknown.sort();
        return Err(ValidationError::UnknownFields { fields: unknown });
    }

    let notes = text_field(map, "notes")?;
    let mut change_summary = text_field(map, "change_summary")?;
    if change_summary.is_empty() {
        change_summary = if notes.is_empty() {
            FALLBACK_SUMMARY.to_string()
        } else {
            notes.clone()
        };
    }

    Ok(AssessmentFields {
        safe: bool_field(map, "safe")?,
        security_status: risk_field(map, "security_status")?,
        security_concerns: list_field(map, "security_concerns")?,
        breaking_status: risk_field(map, "breaking_status")?,
        breaking_changes: list_field(map, "breaking_changes")?,
        compatibility: compatibility_field(map)?,
        security_change_summary: text_field(map, "security_change_summary")?,
        security_notes: text_field(map, "security_notes")?,
        compatibility_change_summary: text_field(map, "compatibility_change_summary")?,
        compatibility_notes: text_field(map, "compatibility_notes")?,
        change_summary,
        notes,
    })
}

/// Extract the single JSON object from a raw assistant reply.
///
/// Accepts a bare object, an object inside a fenced code block, or an
/// object surrounded by prose; the first `{` starts the candidate and a
/// streaming parse takes exactly one value from there.
pub fn extract_json(raw: &str) -> Result<Value, ValidationError> {
    let candidate = match fenced_block(raw) {
        Some(block) => block,
        None => raw,
    };
    let start = candidate.find('{').ok_or(ValidationError::MissingObject)?;
    let mut stream = serde_json::Deserializer::from_str(&candidate[start..]).into_iter::<Value>();
    match stream.next() {
        Some(Ok(value @ Value::Object(_))) => Ok(value),
        Some(Ok(_)) | None => Err(ValidationError::MissingObject),
        Some(Err(err)) => Err(ValidationError::Json(err)),
    }
}

/// Contents of the first fenced code block, if any, with an optional
/// language tag stripped.
fn fenced_block(raw: &str) -> Option<&str> {
    let open = raw.find("```")?;
    let after_fence = &raw[open + 3..];
    let body_start = after_fence.find('\n')? + 1;
    let body = &after_fence[body_start..];
    let close = body.find("```")?;
    Some(&body[..close])
}

fn bool_field(map: &Map<String, Value>, field: &'static str) -> Result<bool, ValidationError> {
    match map.get(field) {
        Some(Value::Bool(value)) => Ok(*value),
        _ => Err(ValidationError::InvalidField {
            field,
            expected: "a boolean",
        }),
    }
}

fn risk_field(map: &Map<String, Value>, field: &'static str) -> Result<RiskStatus, ValidationError> {
    match map.get(field).and_then(Value::as_str) {
        Some("none") => Ok(RiskStatus::None),
        Some("concern") => Ok(RiskStatus::Concern),
        Some("unknown") => Ok(RiskStatus::Unknown),
        _ => Err(ValidationError::InvalidField {
            field,
            expected: "one of none|concern|unknown",
        }),
    }
}

fn compatibility_field(map: &Map<String, Value>) -> Result<Compatibility, ValidationError> {
    match map.get("compatibility").and_then(Value::as_str) {
        Some("compatible") => Ok(Compatibility::Compatible),
        Some("incompatible") => Ok(Compatibility::Incompatible),
        Some("unknown") => Ok(Compatibility::Unknown),
        _ => Err(ValidationError::InvalidField {
            field: "compatibility",
            expected: "one of compatible|incompatible|unknown",
        }),
    }
}

fn list_field(
    map: &Map<String, Value>,
    field: &'static str,
) -> Result<Vec<String>, ValidationError> {
    match map.get(field) {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or(
                    ValidationError::InvalidField {
                        field,
                        expected: "an array of strings",
                    },
                )
            })
            .collect(),
        Some(_) => Err(ValidationError::InvalidField {
            field,
            expected: "an array of strings",
        }),
    }
}

/// Free-text fields default to empty string when absent.
fn text_field(map: &Map<String, Value>, field: &'static str) -> Result<String, ValidationError> {
    match map.get(field) {
        None => Ok(String::new()),
        Some(Value::String(value)) => Ok(value.clone()),
        Some(_) => Err(ValidationError::InvalidField {
            field,
            expected: "a string",
        }),
    }
}
