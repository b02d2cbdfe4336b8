//! Validation rule overrides.
//!
//! Rule editors send a JSON list of rule objects instead of a
//! `ValidationRules` sheet:
//!
//! ```json
//! [{
//!   "field": "Country", "checked": true, "required": true,
//!   "minLength": 2, "maxLength": 2,
//!   "allowedType": "instruction", "allowedInstructionMode": "sheet",
//!   "allowedSheet": "Countries", "allowedColumn": "Code",
//!   "pattern": "", "customRule": "unique"
//! }]
//! ```
//!
//! Each object is converted into a [`RuleRow`] carrying the same cell text a
//! rules sheet would, so both paths share one parser.

use serde_json::{Map, Value};

use super::rule::RuleRow;
use crate::mapping::overrides::value_text;

/// Convert an override payload into rule rows.
///
/// Non-array payloads, non-object entries and entries with a blank `field`
/// give no rows.
pub fn rule_rows_from_overrides(payload: &Value) -> Vec<RuleRow> {
    let Some(entries) = payload.as_array() else {
        return Vec::new();
    };

    entries.iter().filter_map(Value::as_object).filter_map(rule_row).collect()
}

/// Parse an override document.
pub fn parse_override_json(text: &str) -> Result<Vec<RuleRow>, serde_json::Error> {
    let payload: Value = serde_json::from_str(text)?;
    Ok(rule_rows_from_overrides(&payload))
}

fn rule_row(entry: &Map<String, Value>) -> Option<RuleRow> {
    let text = |key: &str| entry.get(key).map(value_text).unwrap_or_default().trim().to_string();

    let field = text("field");
    if field.is_empty() {
        return None;
    }

    Some(RuleRow {
        field,
        checked: flag(entry.get("checked")),
        required: flag(entry.get("required")),
        min_length: text("minLength"),
        max_length: text("maxLength"),
        allowed_values: allowed_values(entry),
        pattern: text("pattern"),
        custom_rule: text("customRule"),
    })
}

/// Booleans, non-zero numbers and `true`/`1`/`yes` strings are set.
fn flag(value: Option<&Value>) -> String {
    let set = match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes"),
        _ => false,
    };
    let cell = if set { "1" } else { "0" };
    cell.to_string()
}

/// `AllowedValues` cell text for an override entry.
fn allowed_values(entry: &Map<String, Value>) -> String {
    let lowered = |key: &str, default: &str| {
        entry
            .get(key)
            .map(value_text)
            .map(|v| v.trim().to_lowercase())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| default.to_string())
    };
    let text = |key: &str| entry.get(key).map(value_text).unwrap_or_default().trim().to_string();

    if lowered("allowedType", "instruction") == "list" {
        let values: Vec<String> = match entry.get("allowedValues") {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| value_text(item).trim().to_string())
                .filter(|v| !v.is_empty())
                .collect(),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => vec![value_text(other).trim().to_string()],
        };
        let joined = values.join(";");
        return if joined.is_empty() {
            String::new()
        } else {
            format!("VALUE={joined}")
        };
    }

    if lowered("allowedInstructionMode", "custom") == "sheet" {
        let sheet = text("allowedSheet");
        if sheet.is_empty() {
            return String::new();
        }
        let column = text("allowedColumn");
        return if column.is_empty() {
            format!("SHEET={sheet}")
        } else {
            format!("SHEET={sheet};COLUMN={column}")
        };
    }

    text("allowedInstruction")
}
