//! Row evaluation.
//!
//! Rules are applied to one Template row at a time. The only state shared
//! between rows is computed up front: the uniqueness frequencies and the
//! reference sheets already loaded while parsing rules.

use std::collections::{BTreeSet, HashMap};

use crate::cache::ReferenceCache;
use crate::error::ConfigResult;
use crate::models::Table;
use crate::resolver::{resolve, resolve_normalized};

use super::rule::{join_column, AllowedSource, CustomRule, ValidationRule};

/// Per-field frequency of trimmed Template values.
pub type UniqueCounts = HashMap<String, HashMap<String, usize>>;

/// Value frequencies for every field carrying a `unique` rule.
pub fn build_unique_counts(template: &Table, rules: &[ValidationRule]) -> UniqueCounts {
    let mut counts = UniqueCounts::new();

    for rule in rules {
        if rule.custom_rule != Some(CustomRule::Unique) {
            continue;
        }
        let mut frequencies: HashMap<String, usize> = HashMap::new();
        if let Some(cells) = resolve(&rule.field, template.columns()).and_then(|c| template.column(c)) {
            for cell in cells {
                *frequencies.entry(cell.trim().to_string()).or_default() += 1;
            }
        }
        counts.insert(rule.field.clone(), frequencies);
    }

    counts
}

/// One Template row, read through the column resolver.
#[derive(Debug, Clone, Copy)]
pub struct Row<'t> {
    table: &'t Table,
    index: usize,
}

impl<'t> Row<'t> {
    pub fn new(table: &'t Table, index: usize) -> Self {
        Self { table, index }
    }

    /// Raw cell of `field`, blank when the Template has no such column.
    pub fn value(&self, field: &str) -> &'t str {
        match resolve(field, self.table.columns()) {
            Some(column) => self.table.cell(self.index, column),
            None => "",
        }
    }
}

/// Diagnostics for one row, in rule declaration order.
pub fn evaluate_row(
    row: Row<'_>,
    rules: &[ValidationRule],
    counts: &UniqueCounts,
    cache: &mut ReferenceCache<'_>,
) -> ConfigResult<Vec<String>> {
    let mut errors = Vec::new();

    for rule in rules.iter().filter(|r| r.checked) {
        let field = &rule.field;
        let raw = row.value(field);
        let value = raw.trim();

        if rule.required && value.is_empty() {
            errors.push(format!("{field} is required"));
            continue;
        }

        let len = value.chars().count() as i64;
        if let Some(min) = rule.min_length {
            if len < min {
                errors.push(format!("{field} too short ({len} < {min})"));
            }
        }
        if let Some(max) = rule.max_length {
            if len > max {
                errors.push(format!("{field} too long ({len} > {max})"));
            }
        }

        if let Some(allowed) = &rule.allowed_values {
            if !allowed.contains(&value.to_uppercase()) {
                errors.push(format!("Invalid value '{raw}' for {field}"));
            }
        }

        if let Some(pattern) = &rule.pattern {
            if !value.is_empty() && !pattern.is_full_match(value) {
                errors.push(format!("{field} does not match pattern {}", pattern.as_str()));
            }
        }

        match &rule.custom_rule {
            Some(CustomRule::Unique) => {
                let seen = counts
                    .get(field)
                    .and_then(|frequencies| frequencies.get(value))
                    .copied()
                    .unwrap_or(0);
                if seen > 1 {
                    errors.push(format!("'{field}'='{value}' is not unique in the column"));
                }
            }
            Some(CustomRule::Equals {
                template_field,
                ref_column,
            }) => {
                errors.extend(evaluate_equals(row, rule, template_field, ref_column, cache)?);
            }
            Some(CustomRule::Other(_)) | None => {}
        }
    }

    Ok(errors)
}

/// `equals:A;B`: the row's `A` must be one of the `B` values declared for the
/// row's key in the reference sheet, and must not be declared by any other key.
fn evaluate_equals(
    row: Row<'_>,
    rule: &ValidationRule,
    template_field: &str,
    ref_column: &str,
    cache: &mut ReferenceCache<'_>,
) -> ConfigResult<Vec<String>> {
    let field = &rule.field;
    let sheet_name = match &rule.allowed_source {
        Some(AllowedSource::Sheet { sheet, .. }) => sheet,
        _ => return Ok(Vec::new()),
    };

    let Some(sheet) = cache.sheet(sheet_name)? else {
        return Ok(vec![format!(
            "Sheet '{sheet_name}' not available to check '{field}'."
        )]);
    };

    let Some(keys) = join_column(sheet_name, &sheet) else {
        return Ok(vec![format!(
            "No column matching '{sheet_name}' in sheet '{sheet_name}' (needed by '{field}')."
        )]);
    };

    let key = row.value(field).trim();
    let actual = row.value(template_field).trim().to_uppercase();

    let group: Vec<usize> = keys
        .iter()
        .enumerate()
        .filter(|(_, k)| k.trim() == key)
        .map(|(idx, _)| idx)
        .collect();

    let declared = resolve_normalized(ref_column, sheet.columns()).and_then(|c| sheet.column(c));
    let declared = match declared {
        Some(cells) if !group.is_empty() => cells,
        _ => {
            return Ok(vec![format!(
                "Value '{key}' of '{field}' not found or column '{ref_column}' missing in '{sheet_name}'."
            )])
        }
    };

    let allowed: BTreeSet<String> = group.iter().flat_map(|idx| split_declared(&declared[*idx])).collect();

    if !actual.is_empty() && !allowed.contains(&actual) {
        let expected = if allowed.is_empty() {
            "(no value declared)".to_string()
        } else {
            allowed.iter().cloned().collect::<Vec<_>>().join(", ")
        };
        return Ok(vec![format!(
            "'{template_field}' must equal a value of '{ref_column}' for '{field}'='{key}'. Expected values: {expected}."
        )]);
    }

    let used_elsewhere = keys
        .iter()
        .zip(declared)
        .filter(|(k, _)| k.trim() != key)
        .any(|(_, cell)| split_declared(cell).any(|v| v == actual));

    if !actual.is_empty() && used_elsewhere {
        return Ok(vec![format!(
            "'{template_field}'='{actual}' is already used by another '{field}' group in '{ref_column}'."
        )]);
    }

    Ok(Vec::new())
}

/// A declared cell may hold several `;`-separated values.
fn split_declared(cell: &str) -> impl Iterator<Item = String> + '_ {
    cell.split(';')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_uppercase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::rule::{parse_rules, RuleRow};
    use crate::workbook::MemorySource;

    fn rule_row(field: &str) -> RuleRow {
        RuleRow {
            field: field.to_string(),
            checked: "1".into(),
            ..RuleRow::default()
        }
    }

    fn run(source: &MemorySource, template: &Table, rows: &[RuleRow]) -> Vec<Vec<String>> {
        let mut cache = ReferenceCache::new(source);
        let rules = parse_rules(rows, &mut cache).unwrap();
        let counts = build_unique_counts(template, &rules);
        (0..template.len())
            .map(|idx| evaluate_row(Row::new(template, idx), &rules, &counts, &mut cache).unwrap())
            .collect()
    }

    #[test]
    fn test_required_short_circuits_field() {
        let template = Table::from_str_rows(&["Code"], &[&[" "], &["AB12"], &["AB1234"]]);
        let rows = [RuleRow {
            required: "true".into(),
            pattern: r"^[A-Z]{2}\d{4}$".into(),
            ..rule_row("Code")
        }];

        let errors = run(&MemorySource::new(), &template, &rows);
        assert_eq!(errors[0], vec!["Code is required"]);
        assert_eq!(errors[1].len(), 1);
        assert!(errors[1][0].contains("does not match pattern"));
        assert!(errors[2].is_empty());
    }

    #[test]
    fn test_unchecked_rules_are_skipped() {
        let template = Table::from_str_rows(&["Code"], &[&[""]]);
        let rows = [RuleRow {
            checked: "no".into(),
            required: "yes".into(),
            ..rule_row("Code")
        }];
        assert!(run(&MemorySource::new(), &template, &rows)[0].is_empty());
    }

    #[test]
    fn test_length_bounds_both_fire() {
        let template = Table::from_str_rows(&["Name"], &[&[" abcd "], &["ab"]]);
        let rows = [RuleRow {
            min_length: "5".into(),
            max_length: "3".into(),
            ..rule_row("Name")
        }];

        let errors = run(&MemorySource::new(), &template, &rows);
        assert_eq!(errors[0], vec!["Name too short (4 < 5)", "Name too long (4 > 3)"]);
        assert_eq!(errors[1], vec!["Name too short (2 < 5)"]);
    }

    #[test]
    fn test_allowed_values_cite_raw_value() {
        let template = Table::from_str_rows(&["Kind"], &[&[" a "], &["z "]]);
        let rows = [RuleRow {
            allowed_values: "VALUE=A;B".into(),
            ..rule_row("Kind")
        }];

        let errors = run(&MemorySource::new(), &template, &rows);
        assert!(errors[0].is_empty());
        assert_eq!(errors[1], vec!["Invalid value 'z ' for Kind"]);
    }

    #[test]
    fn test_unique_flags_every_duplicate() {
        let template = Table::from_str_rows(&["Ref"], &[&["A"], &["A "], &["B"], &[""], &[""]]);
        let rows = [RuleRow {
            custom_rule: "unique".into(),
            ..rule_row("ref")
        }];

        let errors = run(&MemorySource::new(), &template, &rows);
        assert_eq!(errors[0].len(), 1);
        assert_eq!(errors[1].len(), 1);
        assert!(errors[2].is_empty());
        assert_eq!(errors[3], vec!["'ref'='' is not unique in the column"]);
        assert_eq!(errors[4].len(), 1);
    }

    #[test]
    fn test_missing_template_column_reads_blank() {
        let template = Table::from_str_rows(&["Other"], &[&["x"]]);
        let rows = [RuleRow {
            required: "1".into(),
            ..rule_row("Absent")
        }];
        assert_eq!(run(&MemorySource::new(), &template, &rows)[0], vec!["Absent is required"]);
    }

    fn currencies() -> MemorySource {
        MemorySource::new().with_sheet(
            "Entities",
            Table::from_str_rows(
                &["Entities", "Currencies"],
                &[&["E1", "EUR; usd"], &["E1", "GBP"], &["E2", "CHF"], &["E3", "USD"]],
            ),
        )
    }

    fn equals_rule() -> RuleRow {
        RuleRow {
            allowed_values: "SHEET=Entities;COLUMN=Entities".into(),
            custom_rule: "equals:Currency;Currencies".into(),
            ..rule_row("Entity")
        }
    }

    #[test]
    fn test_equals_accepts_value_of_own_group() {
        let template = Table::from_str_rows(&["Entity", "Currency"], &[&["E1", "gbp"], &["E2", ""]]);
        let errors = run(&currencies(), &template, &[equals_rule()]);
        assert!(errors[0].is_empty());
        assert!(errors[1].is_empty());
    }

    #[test]
    fn test_equals_lists_expected_values() {
        let template = Table::from_str_rows(&["Entity", "Currency"], &[&["E1", "CHF"]]);
        let errors = run(&currencies(), &template, &[equals_rule()]);
        assert_eq!(
            errors[0],
            vec!["'Currency' must equal a value of 'Currencies' for 'Entity'='E1'. Expected values: EUR, GBP, USD."]
        );
    }

    #[test]
    fn test_equals_flags_cross_group_use() {
        let template = Table::from_str_rows(&["Entity", "Currency"], &[&["E1", "USD"]]);
        let errors = run(&currencies(), &template, &[equals_rule()]);
        assert_eq!(errors[0].len(), 1);
        assert!(errors[0][0].contains("already used by another 'Entity' group"));
    }

    #[test]
    fn test_equals_unknown_key_and_missing_join_column() {
        let template = Table::from_str_rows(&["Entity", "Currency"], &[&["E9", "USD"]]);
        let errors = run(&currencies(), &template, &[equals_rule()]);
        assert!(errors[0].iter().any(|e| e.contains("'E9' of 'Entity' not found")));

        let source = MemorySource::new().with_sheet(
            "Entities",
            Table::from_str_rows(&["Key", "Currencies"], &[&["E1", "EUR"]]),
        );
        let rows = [RuleRow {
            allowed_values: "SHEET=Entities;COLUMN=Key".into(),
            ..equals_rule()
        }];
        let template = Table::from_str_rows(&["Entity", "Currency"], &[&["E1", "EUR"]]);
        let errors = run(&source, &template, &rows);
        assert!(errors[0][0].starts_with("No column matching 'Entities'"));
    }
}
