//! Validation rule grammar.
//!
//! One row of the `ValidationRules` sheet becomes one [`ValidationRule`].
//! Unlike mapping, every configuration problem here is fatal: a rule that
//! points at a missing sheet or an ambiguous column aborts the run.

use std::collections::BTreeSet;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::cache::ReferenceCache;
use crate::error::{ConfigError, ConfigResult};
use crate::models::{is_blank, Table};
use crate::resolver::{normalize_header, resolve, resolve_normalized};

/// Columns of the `ValidationRules` sheet.
pub const RULE_COLUMNS: [&str; 8] = [
    "Field",
    "Checked",
    "Required",
    "MinLength",
    "MaxLength",
    "AllowedValues",
    "Pattern",
    "CustomRule",
];

/// Cell values accepted as "true" for `Checked` and `Required`.
const TRUE_VALUES: [&str; 6] = ["true", "1", "yes", "y", "oui", "x"];

/// One unparsed validation rule, cell by cell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RuleRow {
    pub field: String,
    pub checked: String,
    pub required: String,
    pub min_length: String,
    pub max_length: String,
    pub allowed_values: String,
    pub pattern: String,
    pub custom_rule: String,
}

/// Where the allowed values of a field come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedSource {
    /// `VALUE=a;b;c`
    Values,
    /// `SHEET=name`, `SHEET=name;COLUMN=col`, `SHEET=name!col`
    Sheet { sheet: String, column: Option<String> },
    /// Anything else; kept, never checked.
    Other(String),
}

/// Custom behavior attached to a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustomRule {
    /// Value must occur once in the Template column.
    Unique,
    /// `equals:<templateField>;<refColumn>` against the field's `SHEET=` source.
    Equals {
        template_field: String,
        ref_column: String,
    },
    /// Unrecognized, lower-cased. Inert.
    Other(String),
}

/// A compiled pattern that must match a whole value.
#[derive(Debug, Clone)]
pub struct FieldPattern {
    source: String,
    anchored: Regex,
}

impl FieldPattern {
    pub fn new(field: &str, source: &str) -> ConfigResult<Self> {
        let anchored = Regex::new(&format!("^(?:{})$", source)).map_err(|e| ConfigError::InvalidPattern {
            field: field.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            source: source.to_string(),
            anchored,
        })
    }

    /// Pattern text as written in the rule.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_full_match(&self, value: &str) -> bool {
        self.anchored.is_match(value)
    }
}

/// A parsed validation rule.
#[derive(Debug, Clone)]
pub struct ValidationRule {
    pub field: String,
    pub checked: bool,
    pub required: bool,
    pub min_length: Option<i64>,
    pub max_length: Option<i64>,
    /// Uppercased allowed values.
    pub allowed_values: Option<BTreeSet<String>>,
    pub allowed_source: Option<AllowedSource>,
    pub pattern: Option<FieldPattern>,
    pub custom_rule: Option<CustomRule>,
}

/// `true`, `1`, `yes`, `y`, `oui`, `x` in any case; anything else is false.
pub fn parse_bool(cell: &str) -> bool {
    let lowered = cell.trim().to_lowercase();
    TRUE_VALUES.contains(&lowered.as_str())
}

/// Integer bound, or `None` for blank and non-numeric cells.
///
/// Integral decimals such as `5.0` are accepted.
pub fn parse_int(cell: &str) -> Option<i64> {
    let text = cell.trim();
    if let Ok(n) = text.parse::<i64>() {
        return Some(n);
    }
    match text.parse::<f64>() {
        Ok(f) if f.is_finite() && f.fract() == 0.0 => Some(f as i64),
        _ => None,
    }
}

/// Strip an ASCII prefix case-insensitively.
fn strip_prefix_ci<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &text[prefix.len()..])
}

/// Rule rows of a `ValidationRules` sheet. Headers are matched
/// case-insensitively; missing columns read as blank.
pub fn rule_rows_from_sheet(sheet: &Table) -> Vec<RuleRow> {
    let columns: Vec<Option<&[String]>> = RULE_COLUMNS
        .iter()
        .map(|name| resolve(name, sheet.columns()).and_then(|c| sheet.column(c)))
        .collect();

    let cell = |col: usize, row: usize| -> String {
        columns[col]
            .and_then(|cells| cells.get(row))
            .cloned()
            .unwrap_or_default()
    };

    (0..sheet.len())
        .map(|row| RuleRow {
            field: cell(0, row),
            checked: cell(1, row),
            required: cell(2, row),
            min_length: cell(3, row),
            max_length: cell(4, row),
            allowed_values: cell(5, row),
            pattern: cell(6, row),
            custom_rule: cell(7, row),
        })
        .collect()
}

/// Parse rule rows in order. Blank fields are skipped; a repeated field
/// replaces the earlier rule in place.
pub fn parse_rules(rows: &[RuleRow], cache: &mut ReferenceCache<'_>) -> ConfigResult<Vec<ValidationRule>> {
    let mut rules: Vec<ValidationRule> = Vec::new();

    for row in rows {
        let field = row.field.trim();
        if field.is_empty() {
            continue;
        }

        let rule = parse_rule(field, row, cache)?;
        match rules.iter_mut().find(|r| r.field == rule.field) {
            Some(existing) => *existing = rule,
            None => rules.push(rule),
        }
    }

    Ok(rules)
}

fn parse_rule(field: &str, row: &RuleRow, cache: &mut ReferenceCache<'_>) -> ConfigResult<ValidationRule> {
    let allowed_text = row.allowed_values.trim();
    let (allowed_source, allowed_values) = if allowed_text.is_empty() {
        (None, None)
    } else {
        let (source, values) = parse_allowed(field, allowed_text, cache)?;
        (Some(source), values)
    };

    let pattern = if is_blank(&row.pattern) {
        None
    } else {
        Some(FieldPattern::new(field, &row.pattern)?)
    };

    Ok(ValidationRule {
        field: field.to_string(),
        checked: parse_bool(&row.checked),
        required: parse_bool(&row.required),
        min_length: parse_int(&row.min_length),
        max_length: parse_int(&row.max_length),
        allowed_values,
        allowed_source,
        pattern,
        custom_rule: parse_custom_rule(&row.custom_rule),
    })
}

/// Parse an `AllowedValues` cell, loading reference sheets as needed.
fn parse_allowed(
    field: &str,
    text: &str,
    cache: &mut ReferenceCache<'_>,
) -> ConfigResult<(AllowedSource, Option<BTreeSet<String>>)> {
    if let Some(raw_values) = strip_prefix_ci(text, "VALUE=") {
        let values = raw_values
            .split(';')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_uppercase)
            .collect();
        return Ok((AllowedSource::Values, Some(values)));
    }

    let Some(sheet_part) = strip_prefix_ci(text, "SHEET=") else {
        return Ok((AllowedSource::Other(text.to_string()), None));
    };

    let (sheet_name, column) = parse_sheet_reference(sheet_part.trim());
    if sheet_name.is_empty() {
        return Err(ConfigError::MissingSheetName(field.to_string()));
    }

    let sheet = cache
        .sheet(&sheet_name)?
        .ok_or_else(|| ConfigError::MissingSheet(sheet_name.clone()))?;

    let column_idx = resolve_domain_column(field, &sheet_name, &sheet, column.as_deref())?;
    let values = sheet
        .column_at(column_idx)
        .unwrap_or_default()
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_uppercase)
        .collect();

    Ok((
        AllowedSource::Sheet {
            sheet: sheet_name,
            column,
        },
        Some(values),
    ))
}

/// Split `name!col`, `name;COLUMN=col`, `name;COL=col` or `name`.
fn parse_sheet_reference(text: &str) -> (String, Option<String>) {
    if let Some((sheet, column)) = text.split_once('!') {
        let column = column.trim();
        return (
            sheet.trim().to_string(),
            (!column.is_empty()).then(|| column.to_string()),
        );
    }

    let parts: Vec<&str> = text.split(';').map(str::trim).filter(|p| !p.is_empty()).collect();
    let sheet = parts.first().copied().unwrap_or("").to_string();

    let mut column = None;
    for token in parts.iter().skip(1) {
        if let Some(value) = strip_prefix_ci(token, "COLUMN=").or_else(|| strip_prefix_ci(token, "COL=")) {
            let value = value.trim();
            column = (!value.is_empty()).then(|| value.to_string());
        }
    }

    (sheet, column)
}

/// Index of the column supplying a field's allowed values.
fn resolve_domain_column(
    field: &str,
    sheet_name: &str,
    sheet: &Table,
    column: Option<&str>,
) -> ConfigResult<usize> {
    let headers = sheet.columns();

    if let Some(column) = column {
        let wanted = normalize_header(column);
        return headers
            .iter()
            .position(|h| normalize_header(h) == wanted)
            .ok_or_else(|| ConfigError::ColumnNotFound {
                column: column.to_string(),
                sheet: sheet_name.to_string(),
            });
    }

    let wanted = normalize_header(field);
    let matching: Vec<usize> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| normalize_header(h) == wanted)
        .map(|(idx, _)| idx)
        .collect();

    match matching.as_slice() {
        [only] => Ok(*only),
        [] => (0..headers.len())
            .find(|idx| {
                sheet
                    .column_at(*idx)
                    .is_some_and(|cells| cells.iter().any(|c| !is_blank(c)))
            })
            .ok_or_else(|| ConfigError::NoUsableColumn(sheet_name.to_string())),
        _ => Err(ConfigError::AmbiguousColumn {
            field: field.to_string(),
            sheet: sheet_name.to_string(),
        }),
    }
}

/// `unique`, `equals:<field>;<column>`, or inert text.
pub fn parse_custom_rule(cell: &str) -> Option<CustomRule> {
    let text = cell.trim();
    if text.is_empty() {
        return None;
    }

    let lowered = text.to_lowercase();
    if lowered == "unique" {
        return Some(CustomRule::Unique);
    }

    if let Some(payload) = strip_prefix_ci(text, "equals:") {
        if let Some((template_field, ref_column)) = payload.split_once(';') {
            return Some(CustomRule::Equals {
                template_field: template_field.trim().to_string(),
                ref_column: ref_column.trim().to_string(),
            });
        }
    }

    Some(CustomRule::Other(lowered))
}

/// Column of `sheet` named like the sheet itself (the `equals:` join key).
pub fn join_column<'t>(sheet_name: &str, sheet: &'t Table) -> Option<&'t [String]> {
    resolve_normalized(sheet_name, sheet.columns()).and_then(|c| sheet.column(c))
}
