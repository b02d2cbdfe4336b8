//! Mapping rule grammar.
//!
//! A rule is one short text bound to a target column. It is parsed once per
//! run into a [`RuleKind`] and evaluated by [`super::engine`].
//!
//! Markers are tried in the order of [`MARKER_PRIORITY`]; the first marker
//! that matches decides the rule kind. Text that matches no marker becomes
//! [`RuleKind::Unknown`] and yields a blank column.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::models::is_nan_text;

/// A parsed mapping rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingRule {
    /// Output column name.
    pub target: String,
    pub kind: RuleKind,
}

/// What a rule derives its column from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleKind {
    /// Blank column.
    Empty,
    /// `prefix` followed by the 1-based row number zero-padded to `width`.
    Sequence { prefix: String, width: usize },
    /// Same value on every row.
    Constant { value: String },
    /// Copy of a Template column.
    ColumnRef { column: String },
    /// Per-row concatenation of literals and Template cells.
    Concat { parts: Vec<ConcatPart> },
    /// Template column translated through a two-column mapping sheet.
    Lookup { source_column: String, sheet: String },
    /// Unrecognized text, kept for diagnostics.
    Unknown { raw: String },
}

/// One operand of a concatenation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ConcatPart {
    Literal(String),
    Column(String),
}

/// Rule markers, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Empty,
    Sequence,
    Constant,
    Lookup,
    Concat,
    Plus,
    Column,
}

/// Marker priority: first match wins.
pub const MARKER_PRIORITY: [Marker; 7] = [
    Marker::Empty,
    Marker::Sequence,
    Marker::Constant,
    Marker::Lookup,
    Marker::Concat,
    Marker::Plus,
    Marker::Column,
];

const SEQUENCE_PREFIX: &str = "NS=";
const CONSTANT_PREFIX: &str = "INVARIABLE=";
const LOOKUP_PREFIX: &str = "MAPPING=";
const CONCAT_MARKER: &str = "CONCAT=";
const COLUMN_PREFIX: &str = "COLUMN=";

impl Marker {
    /// Whether `text` (already trimmed) carries this marker.
    pub fn matches(self, text: &str) -> bool {
        match self {
            Marker::Empty => text.is_empty() || is_nan_text(text),
            Marker::Sequence => text.starts_with(SEQUENCE_PREFIX),
            Marker::Constant => text.starts_with(CONSTANT_PREFIX),
            Marker::Lookup => text.starts_with(LOOKUP_PREFIX),
            Marker::Concat => text.contains(CONCAT_MARKER),
            Marker::Plus => text.contains('+'),
            Marker::Column => text.starts_with(COLUMN_PREFIX),
        }
    }

    /// Build the rule kind for `text`, which must match this marker.
    fn build(self, text: &str) -> ConfigResult<RuleKind> {
        let kind = match self {
            Marker::Empty => RuleKind::Empty,
            Marker::Sequence => {
                let template = &text[SEQUENCE_PREFIX.len()..];
                RuleKind::Sequence {
                    prefix: template.split('#').next().unwrap_or("").to_string(),
                    width: template.matches('#').count(),
                }
            }
            Marker::Constant => RuleKind::Constant {
                value: text[CONSTANT_PREFIX.len()..].to_string(),
            },
            Marker::Lookup => {
                let tail = &text[LOOKUP_PREFIX.len()..];
                let (column, sheet) = tail
                    .split_once(';')
                    .ok_or_else(|| ConfigError::MalformedMapping(text.to_string()))?;
                RuleKind::Lookup {
                    source_column: column.trim().to_string(),
                    sheet: sheet.trim().to_string(),
                }
            }
            Marker::Concat => {
                let cleaned = text
                    .replacen("'CONCAT=", "", 1)
                    .replacen(CONCAT_MARKER, "", 1);
                RuleKind::Concat {
                    parts: split_parts(cleaned.trim()),
                }
            }
            Marker::Plus => RuleKind::Concat {
                parts: split_parts(text),
            },
            Marker::Column => RuleKind::ColumnRef {
                column: text[COLUMN_PREFIX.len()..].trim().to_string(),
            },
        };
        Ok(kind)
    }

    /// Syntax shown in the marker table.
    pub fn syntax(self) -> &'static str {
        match self {
            Marker::Empty => "(blank) | nan",
            Marker::Sequence => "NS=<prefix>###",
            Marker::Constant => "INVARIABLE=<value>",
            Marker::Lookup => "MAPPING=<column>;<sheet>",
            Marker::Concat => "CONCAT='lit'+<column>+...",
            Marker::Plus => "<column>+'lit'+...",
            Marker::Column => "COLUMN=<column>",
        }
    }

    /// One-line description shown in the marker table.
    pub fn description(self) -> &'static str {
        match self {
            Marker::Empty => "Blank column",
            Marker::Sequence => "Row number, zero-padded to the number of '#'",
            Marker::Constant => "Same value on every row",
            Marker::Lookup => "Translate column through a key/value sheet, unmapped values kept",
            Marker::Concat => "Concatenate quoted literals and columns",
            Marker::Plus => "Same as CONCAT= without the marker",
            Marker::Column => "Copy a Template column",
        }
    }
}

/// Split a concatenation on `+`. Quoted parts are literals, others columns.
fn split_parts(expression: &str) -> Vec<ConcatPart> {
    expression
        .split('+')
        .map(str::trim)
        .map(|part| {
            if part.starts_with('\'') && part.ends_with('\'') {
                ConcatPart::Literal(part.trim_matches('\'').to_string())
            } else {
                ConcatPart::Column(part.to_string())
            }
        })
        .collect()
}

/// Parse one rule text. Only a malformed `MAPPING=` is an error.
pub fn parse_rule_text(text: &str) -> ConfigResult<RuleKind> {
    let text = text.trim();
    match MARKER_PRIORITY.iter().find(|marker| marker.matches(text)) {
        Some(marker) => marker.build(text),
        None => Ok(RuleKind::Unknown {
            raw: text.to_string(),
        }),
    }
}

/// Get a description of all rule markers, in priority order.
pub fn markers_description() -> String {
    let mut out = String::from("Mapping rule markers (first match wins):\n\n");
    out.push_str("| # | Syntax | Effect |\n|---|--------|--------|\n");
    for (idx, marker) in MARKER_PRIORITY.iter().enumerate() {
        out.push_str(&format!(
            "| {} | {} | {} |\n",
            idx + 1,
            marker.syntax(),
            marker.description()
        ));
    }
    out.push_str("|   | anything else | Blank column, header kept |\n");
    out
}
