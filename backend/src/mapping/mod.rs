//! Mapping DSL: derive output columns from declarative rules.
//!
//! This module provides:
//! - `rule`: rule grammar and the ordered marker table
//! - `engine`: evaluate parsed rules against the Template
//! - `overrides`: rule rows from the `Parameters` sheet or JSON
//!
//! ## Usage Flow
//!
//! ```text
//! Parameters sheet / JSON override → RuleRow → parse_rules → MappingRule → engine::evaluate → Table
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use dmf::mapping::{map_workbook, RuleRow};
//! use dmf::workbook::CsvDirSource;
//!
//! let source = CsvDirSource::new("input/");
//! let rules = vec![RuleRow::new("Id", "NS=ID-####")];
//! let result = map_workbook(&source, Some(&rules))?;
//! ```

pub mod engine;
pub mod overrides;
pub mod rule;

pub use engine::evaluate;
pub use overrides::{parse_override_json, rule_rows_from_sheet, sanitize_rules, RuleRow};
pub use rule::{markers_description, parse_rule_text, ConcatPart, MappingRule, Marker, RuleKind, MARKER_PRIORITY};

use crate::cache::ReferenceCache;
use crate::error::{ConfigError, ConfigResult};
use crate::models::Table;
use crate::workbook::{SheetSource, PARAMETERS_SHEET, TEMPLATE_SHEET};

/// Parse rule rows once. Rows with a blank target are skipped.
pub fn parse_rules(rows: &[RuleRow]) -> ConfigResult<Vec<MappingRule>> {
    rows.iter()
        .filter(|row| !row.target.trim().is_empty())
        .map(|row| -> ConfigResult<MappingRule> {
            Ok(MappingRule {
                target: row.target.trim().to_string(),
                kind: parse_rule_text(&row.rule)?,
            })
        })
        .collect()
}

/// Run the mapping engine over a workbook.
///
/// `overrides` replaces the `Parameters` sheet when given, even when empty
/// (an empty list produces an empty result).
pub fn map_workbook(source: &dyn SheetSource, overrides: Option<&[RuleRow]>) -> ConfigResult<Table> {
    let mut cache = ReferenceCache::new(source);

    let template = cache
        .sheet(TEMPLATE_SHEET)?
        .ok_or_else(|| ConfigError::MissingSheet(TEMPLATE_SHEET.to_string()))?;

    let rows = match overrides {
        Some(rows) => rows.to_vec(),
        None => {
            let parameters = cache
                .sheet(PARAMETERS_SHEET)?
                .ok_or_else(|| ConfigError::MissingSheet(PARAMETERS_SHEET.to_string()))?;
            rule_rows_from_sheet(&parameters)
        }
    };

    let rules = parse_rules(&rows)?;
    evaluate(&template, &rules, &mut cache)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workbook::MemorySource;

    fn workbook() -> MemorySource {
        MemorySource::new()
            .with_sheet(
                TEMPLATE_SHEET,
                Table::from_str_rows(&["Country", "Name"], &[&["FR", "Ada"], &["IT", "Alan"]]),
            )
            .with_sheet(
                PARAMETERS_SHEET,
                Table::from_str_rows(
                    &["Target", "Rule"],
                    &[
                        &["Id", "NS=C-##"],
                        &["", "INVARIABLE=skipped"],
                        &["Country", "MAPPING=Country;Countries"],
                        &["Label", "CONCAT=Name+' ('+Country+')'"],
                    ],
                ),
            )
            .with_sheet(
                "Countries",
                Table::from_str_rows(&["Code", "Name"], &[&["FR", "France"]]),
            )
    }

    #[test]
    fn test_map_workbook_from_parameters() {
        let result = map_workbook(&workbook(), None).unwrap();

        assert_eq!(result.columns(), &["Id", "Country", "Label"]);
        assert_eq!(result.column("Id").unwrap(), &["C-01", "C-02"]);
        assert_eq!(result.column("Country").unwrap(), &["France", "IT"]);
        assert_eq!(result.column("Label").unwrap(), &["Ada (FR)", "Alan (IT)"]);
    }

    #[test]
    fn test_override_replaces_parameters() {
        let rules = vec![RuleRow::new("Only", "INVARIABLE=1")];
        let result = map_workbook(&workbook(), Some(&rules)).unwrap();

        assert_eq!(result.columns(), &["Only"]);
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_empty_override_gives_empty_result() {
        let result = map_workbook(&workbook(), Some(&[])).unwrap();
        assert!(result.columns().is_empty());
    }

    #[test]
    fn test_missing_template_is_fatal() {
        let source = MemorySource::new();
        let err = map_workbook(&source, Some(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingSheet(ref s) if s == "Template"));
    }

    #[test]
    fn test_missing_parameters_is_fatal() {
        let source = MemorySource::new()
            .with_sheet(TEMPLATE_SHEET, Table::from_str_rows(&["a"], &[&["1"]]));
        let err = map_workbook(&source, None).unwrap_err();
        assert!(err.to_string().contains("Parameters"));
    }
}
