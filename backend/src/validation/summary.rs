//! Per-field error counts and run metrics.

use serde::{Deserialize, Serialize};

use crate::models::Table;

/// Error tally for one validated field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSummary {
    pub field: String,
    pub errors_count: usize,
    pub errors_pct: String,
}

/// Aggregate metrics of a validation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub total_rows: usize,
    pub valid_rows: usize,
    pub valid_pct: String,
}

/// `count / total` as a percentage rounded to two decimals, e.g. `50.0%`,
/// `33.33%`. Ties round to even (`1/32` is `3.12%`). Zero rows render as `0%`.
pub fn format_percentage(count: usize, total: usize) -> String {
    if total == 0 {
        return "0%".to_string();
    }
    let pct = count as f64 / total as f64 * 100.0;
    format!("{:?}%", (pct * 100.0).round_ties_even() / 100.0)
}

/// Count, per field, the rows whose diagnostic text mentions the field name
/// (case-insensitive substring).
///
/// This is a textual heuristic: a field whose name occurs inside another
/// field's name or inside error prose is counted for those rows too.
pub fn summarize<'f>(diagnostics: &[String], fields: impl IntoIterator<Item = &'f str>) -> Vec<FieldSummary> {
    let lowered: Vec<String> = diagnostics.iter().map(|d| d.to_lowercase()).collect();
    let total = diagnostics.len();

    fields
        .into_iter()
        .map(|field| {
            let needle = field.to_lowercase();
            let errors_count = lowered.iter().filter(|d| d.contains(&needle)).count();
            FieldSummary {
                field: field.to_string(),
                errors_count,
                errors_pct: format_percentage(errors_count, total),
            }
        })
        .collect()
}

impl Metrics {
    pub fn new(total_rows: usize, valid_rows: usize) -> Self {
        Self {
            total_rows,
            valid_rows,
            valid_pct: format_percentage(valid_rows, total_rows),
        }
    }

    /// Two-column `Metric, Value` table.
    pub fn to_table(&self) -> Table {
        Table::from_rows(
            vec!["Metric".into(), "Value".into()],
            vec![
                vec!["Total Rows".into(), self.total_rows.to_string()],
                vec!["Valid Rows".into(), self.valid_rows.to_string()],
                vec!["% Valid".into(), self.valid_pct.clone()],
            ],
        )
    }
}

/// `Field, Errors Count, Errors %` table.
pub fn summary_table(summary: &[FieldSummary]) -> Table {
    Table::from_rows(
        vec!["Field".into(), "Errors Count".into(), "Errors %".into()],
        summary
            .iter()
            .map(|s| vec![s.field.clone(), s.errors_count.to_string(), s.errors_pct.clone()])
            .collect(),
    )
}
