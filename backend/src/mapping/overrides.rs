//! Mapping rule rows and JSON overrides.
//!
//! Rules come either from the `Parameters` sheet (first column = target,
//! second column = rule text) or from a JSON override list of
//! `{"target": "...", "rule": "..."}` objects. Both paths produce the same
//! [`RuleRow`]s.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::Table;

/// One unparsed mapping rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRow {
    pub target: String,
    #[serde(default)]
    pub rule: String,
}

impl RuleRow {
    pub fn new(target: impl Into<String>, rule: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            rule: rule.into(),
        }
    }
}

/// Rule rows of a `Parameters` sheet. A sheet with a single column yields
/// blank rules.
pub fn rule_rows_from_sheet(parameters: &Table) -> Vec<RuleRow> {
    let targets = parameters.column_at(0).unwrap_or_default();
    let rules = parameters.column_at(1);

    targets
        .iter()
        .enumerate()
        .map(|(idx, target)| {
            let rule = rules.and_then(|r| r.get(idx)).map(String::as_str).unwrap_or("");
            RuleRow::new(target.trim(), rule.trim())
        })
        .collect()
}

/// Keep only well-formed override entries.
///
/// Non-array payloads give no rules. Entries that are not objects or whose
/// target is blank are dropped; a missing or null rule is blank.
pub fn sanitize_rules(payload: &Value) -> Vec<RuleRow> {
    let entries = match payload.as_array() {
        Some(entries) => entries,
        None => return Vec::new(),
    };

    entries
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|entry| {
            let target = entry.get("target").map(value_text).unwrap_or_default();
            let target = target.trim();
            if target.is_empty() {
                return None;
            }
            let rule = entry.get("rule").map(value_text).unwrap_or_default();
            Some(RuleRow::new(target, rule.trim()))
        })
        .collect()
}

/// Parse and sanitize an override document.
pub fn parse_override_json(text: &str) -> Result<Vec<RuleRow>, serde_json::Error> {
    let payload: Value = serde_json::from_str(text)?;
    Ok(sanitize_rules(&payload))
}

/// Text of a JSON scalar as a cell would hold it.
pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
