//! Validation DSL: check every Template row against declarative rules.
//!
//! This module provides:
//! - `rule`: the `ValidationRules` grammar (allowed values, patterns, custom rules)
//! - `engine`: per-row evaluation
//! - `summary`: per-field error counts and run metrics
//! - `overrides`: rule rows from a JSON rule editor payload
//!
//! ## Usage Flow
//!
//! ```text
//! ValidationRules sheet / JSON override → RuleRow → parse_rules → ValidationRule
//!     → build_unique_counts → evaluate_row (per row) → ValidationReport
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use dmf::validation::validate_workbook;
//! use dmf::workbook::CsvDirSource;
//!
//! let report = validate_workbook(&CsvDirSource::new("input/"), None)?;
//! println!("{} / {} rows valid", report.metrics.valid_rows, report.metrics.total_rows);
//! ```

pub mod engine;
pub mod overrides;
pub mod rule;
pub mod summary;

pub use engine::{build_unique_counts, evaluate_row, Row, UniqueCounts};
pub use overrides::rule_rows_from_overrides;
pub use rule::{
    parse_bool, parse_int, parse_rules, rule_rows_from_sheet, AllowedSource, CustomRule, FieldPattern, RuleRow,
    ValidationRule, RULE_COLUMNS,
};
pub use summary::{format_percentage, summarize, summary_table, FieldSummary, Metrics};

use crate::cache::ReferenceCache;
use crate::error::{ConfigError, ConfigResult};
use crate::models::Table;
use crate::workbook::{SheetSource, RULES_SHEET, TEMPLATE_SHEET};

/// Pass/fail column prefixed to the result.
pub const VALID_COLUMN: &str = "Valid";
/// Joined diagnostics column prefixed to the result.
pub const ERRORS_COLUMN: &str = "Errors";
pub const VALID_MARK: &str = "OK";
pub const INVALID_MARK: &str = "KO";

/// Separator between the diagnostics of one row.
pub const ERROR_SEPARATOR: &str = "; ";

/// Outcome of a validation run.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    /// `Valid`, `Errors`, then the Template columns.
    pub result: Table,
    pub summary: Vec<FieldSummary>,
    pub metrics: Metrics,
}

impl ValidationReport {
    pub fn summary_table(&self) -> Table {
        summary_table(&self.summary)
    }
}

/// Validate a Template table against parsed rules.
pub fn validate_template(
    template: &Table,
    rules: &[ValidationRule],
    cache: &mut ReferenceCache<'_>,
) -> ConfigResult<ValidationReport> {
    let counts = build_unique_counts(template, rules);

    let mut diagnostics = Vec::with_capacity(template.len());
    for idx in 0..template.len() {
        let errors = evaluate_row(Row::new(template, idx), rules, &counts, cache)?;
        diagnostics.push(errors.join(ERROR_SEPARATOR));
    }

    let marks: Vec<String> = diagnostics
        .iter()
        .map(|d| (if d.is_empty() { VALID_MARK } else { INVALID_MARK }).to_string())
        .collect();
    let valid_rows = diagnostics.iter().filter(|d| d.is_empty()).count();

    let summary = summarize(&diagnostics, rules.iter().map(|r| r.field.as_str()));

    let mut result = template.clone();
    result.insert_column(0, VALID_COLUMN, marks);
    result.insert_column(1, ERRORS_COLUMN, diagnostics);

    Ok(ValidationReport {
        result,
        summary,
        metrics: Metrics::new(template.len(), valid_rows),
    })
}

/// Run the validation engine over a workbook.
///
/// `overrides` replaces the `ValidationRules` sheet unless it holds no rows,
/// in which case the sheet is used.
pub fn validate_workbook(source: &dyn SheetSource, overrides: Option<&[RuleRow]>) -> ConfigResult<ValidationReport> {
    let mut cache = ReferenceCache::new(source);

    let template = cache
        .sheet(TEMPLATE_SHEET)?
        .ok_or_else(|| ConfigError::MissingSheet(TEMPLATE_SHEET.to_string()))?;

    let rows = match overrides {
        Some(rows) if !rows.is_empty() => rows.to_vec(),
        _ => {
            let sheet = cache
                .sheet(RULES_SHEET)?
                .ok_or_else(|| ConfigError::MissingSheet(RULES_SHEET.to_string()))?;
            rule_rows_from_sheet(&sheet)
        }
    };

    let rules = parse_rules(&rows, &mut cache)?;
    validate_template(&template, &rules, &mut cache)
}
