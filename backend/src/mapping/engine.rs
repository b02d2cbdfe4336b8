//! Mapping Engine
//!
//! Evaluates parsed mapping rules against the Template sheet to produce the
//! result table.
//!
//! Only rule *syntax* is fatal. A well-formed rule pointing at a sheet or
//! column the workbook does not have yields a blank column, so a batch over
//! many workbooks is not stopped by one bad reference.

use std::collections::HashMap;

use super::rule::{ConcatPart, MappingRule, RuleKind};
use crate::api::logs::log_warning;
use crate::cache::ReferenceCache;
use crate::error::{ConfigError, ConfigResult};
use crate::models::{is_blank, is_nan_text, Table};
use crate::resolver::resolve;

/// Evaluate `rules` in declaration order against `template`.
///
/// Every produced column has exactly `template.len()` cells. When two rules
/// share a target, the later one overwrites the earlier column in place.
pub fn evaluate(
    template: &Table,
    rules: &[MappingRule],
    cache: &mut ReferenceCache<'_>,
) -> ConfigResult<Table> {
    let mut result = Table::new();

    for rule in rules {
        let values = evaluate_rule(template, rule, cache)?;
        result.set_column(&rule.target, values);
    }

    Ok(result)
}

fn evaluate_rule(
    template: &Table,
    rule: &MappingRule,
    cache: &mut ReferenceCache<'_>,
) -> ConfigResult<Vec<String>> {
    let rows = template.len();

    let values = match &rule.kind {
        RuleKind::Empty => blank_column(rows),
        RuleKind::Unknown { raw } => {
            log_warning(format!("Unknown rule '{}' for '{}', column left blank", raw, rule.target));
            blank_column(rows)
        }
        RuleKind::Sequence { prefix, width } => sequence_column(prefix, *width, rows),
        RuleKind::Constant { value } => vec![value.clone(); rows],
        RuleKind::ColumnRef { column } => match resolve(column, template.columns()) {
            Some(matched) => template.column(matched).map(<[String]>::to_vec).unwrap_or_default(),
            None => blank_column(rows),
        },
        RuleKind::Concat { parts } => concat_column(template, parts),
        RuleKind::Lookup {
            source_column,
            sheet,
        } => lookup_column(template, &rule.target, source_column, sheet, cache)?,
    };

    Ok(values)
}

fn blank_column(rows: usize) -> Vec<String> {
    vec![String::new(); rows]
}

/// `prefix` + 1-based row number left-padded with zeros to `width`.
fn sequence_column(prefix: &str, width: usize, rows: usize) -> Vec<String> {
    (1..=rows)
        .map(|n| format!("{}{:0width$}", prefix, n, width = width))
        .collect()
}

fn concat_column(template: &Table, parts: &[ConcatPart]) -> Vec<String> {
    // Column parts are resolved once; unresolved ones contribute nothing.
    enum Resolved<'a> {
        Text(&'a str),
        Cells(&'a [String]),
    }

    let resolved: Vec<Resolved<'_>> = parts
        .iter()
        .filter_map(|part| match part {
            ConcatPart::Literal(text) => Some(Resolved::Text(text.as_str())),
            ConcatPart::Column(name) => resolve(name, template.columns())
                .and_then(|matched| template.column(matched))
                .map(Resolved::Cells),
        })
        .collect();

    (0..template.len())
        .map(|row| {
            let mut out = String::new();
            for part in &resolved {
                match part {
                    Resolved::Text(text) => out.push_str(text),
                    Resolved::Cells(cells) => out.push_str(&cells[row]),
                }
            }
            out
        })
        .collect()
}

fn lookup_column(
    template: &Table,
    target: &str,
    source_column: &str,
    sheet_name: &str,
    cache: &mut ReferenceCache<'_>,
) -> ConfigResult<Vec<String>> {
    let rows = template.len();

    let sheet = match cache.sheet(sheet_name)? {
        Some(sheet) => sheet,
        None => {
            log_warning(format!(
                "Mapping sheet '{}' not found, '{}' left blank",
                sheet_name, target
            ));
            return Ok(blank_column(rows));
        }
    };

    let pairs = lookup_pairs(sheet_name, &sheet)?;

    let originals = match resolve(source_column, template.columns()).and_then(|c| template.column(c)) {
        Some(cells) => cells,
        None => {
            log_warning(format!(
                "Column '{}' not found in Template, '{}' left blank",
                source_column, target
            ));
            return Ok(blank_column(rows));
        }
    };

    Ok(originals
        .iter()
        .map(|original| match pairs.get(original.as_str()) {
            Some(mapped) if !is_blank(mapped) && !is_nan_text(mapped) => mapped.to_string(),
            _ => original.clone(),
        })
        .collect())
}

/// Key -> value pairs of a mapping sheet.
///
/// A column named `<sheet>Mapping` is the value column, keyed by the first
/// column. Otherwise the first two columns are (key, value). A repeated key
/// keeps its last value.
fn lookup_pairs<'t>(sheet_name: &str, sheet: &'t Table) -> ConfigResult<HashMap<&'t str, &'t str>> {
    let named_value = format!("{}Mapping", sheet_name);

    let (keys, values) = match sheet.column(&named_value) {
        Some(values) => (sheet.column_at(0).unwrap_or_default(), values),
        None => match (sheet.column_at(0), sheet.column_at(1)) {
            (Some(keys), Some(values)) => (keys, values),
            _ => return Err(ConfigError::MappingSheetTooNarrow(sheet_name.to_string())),
        },
    };

    Ok(keys
        .iter()
        .zip(values)
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::rule::parse_rule_text;
    use crate::workbook::MemorySource;

    fn rule(target: &str, text: &str) -> MappingRule {
        MappingRule {
            target: target.to_string(),
            kind: parse_rule_text(text).unwrap(),
        }
    }

    fn run(template: &Table, source: &MemorySource, rules: &[MappingRule]) -> ConfigResult<Table> {
        let mut cache = ReferenceCache::new(source);
        evaluate(template, rules, &mut cache)
    }

    fn twelve_rows() -> Table {
        let rows: Vec<Vec<String>> = (0..12).map(|i| vec![i.to_string()]).collect();
        Table::from_rows(vec!["n".into()], rows)
    }

    #[test]
    fn test_sequence_zero_padded() {
        let result = run(&twelve_rows(), &MemorySource::new(), &[rule("Id", "NS=PFX-###")]).unwrap();
        let ids = result.column("Id").unwrap();

        assert_eq!(ids.len(), 12);
        assert_eq!(ids[0], "PFX-001");
        assert_eq!(ids[11], "PFX-012");
    }

    #[test]
    fn test_sequence_without_hashes() {
        let result = run(&twelve_rows(), &MemorySource::new(), &[rule("Id", "NS=R")]).unwrap();
        assert_eq!(result.column("Id").unwrap()[9], "R10");
    }

    #[test]
    fn test_constant_repeated() {
        let result = run(&twelve_rows(), &MemorySource::new(), &[rule("Kind", "INVARIABLE=X")]).unwrap();
        assert!(result.column("Kind").unwrap().iter().all(|v| v == "X"));
    }

    #[test]
    fn test_lookup_falls_back_to_original() {
        let template = Table::from_str_rows(&["Col"], &[&["A"], &["B"], &["C"]]);
        let source = MemorySource::new().with_sheet(
            "RefSheet",
            Table::from_str_rows(&["Key", "Value"], &[&["A", "1"], &["B", "2"]]),
        );

        let result = run(&template, &source, &[rule("Out", "MAPPING=Col;RefSheet")]).unwrap();
        assert_eq!(result.column("Out").unwrap(), &["1", "2", "C"]);
    }

    #[test]
    fn test_lookup_named_value_column() {
        let template = Table::from_str_rows(&["country"], &[&["FR"], &["DE"]]);
        let source = MemorySource::new().with_sheet(
            "Country",
            Table::from_str_rows(
                &["Code", "Label", "CountryMapping"],
                &[&["FR", "France", "FRA"], &["DE", "Germany", "nan"]],
            ),
        );

        let result = run(&template, &source, &[rule("Iso3", "MAPPING=Country;Country")]).unwrap();
        // "nan" mapped values fall back to the original.
        assert_eq!(result.column("Iso3").unwrap(), &["FRA", "DE"]);
    }

    #[test]
    fn test_lookup_duplicate_key_last_wins() {
        let template = Table::from_str_rows(&["Col"], &[&["A"]]);
        let source = MemorySource::new().with_sheet(
            "Ref",
            Table::from_str_rows(&["k", "v"], &[&["A", "first"], &["A", "second"]]),
        );

        let result = run(&template, &source, &[rule("Out", "MAPPING=Col;Ref")]).unwrap();
        assert_eq!(result.column("Out").unwrap(), &["second"]);
    }

    #[test]
    fn test_lookup_missing_resources_degrade() {
        let template = Table::from_str_rows(&["Col"], &[&["A"], &["B"]]);
        let source = MemorySource::new()
            .with_sheet("Ref", Table::from_str_rows(&["k", "v"], &[&["A", "1"]]));

        let result = run(
            &template,
            &source,
            &[rule("NoSheet", "MAPPING=Col;Missing"), rule("NoCol", "MAPPING=Other;Ref")],
        )
        .unwrap();

        assert_eq!(result.column("NoSheet").unwrap(), &["", ""]);
        assert_eq!(result.column("NoCol").unwrap(), &["", ""]);
    }

    #[test]
    fn test_lookup_narrow_sheet_is_fatal() {
        let template = Table::from_str_rows(&["Col"], &[&["A"]]);
        let source = MemorySource::new().with_sheet("Ref", Table::from_str_rows(&["k"], &[&["A"]]));

        let err = run(&template, &source, &[rule("Out", "MAPPING=Col;Ref")]).unwrap_err();
        assert!(matches!(err, ConfigError::MappingSheetTooNarrow(_)));
    }

    #[test]
    fn test_concat_literals_and_columns() {
        let template = Table::from_str_rows(&["Col1"], &[&["X"], &[""]]);
        let result = run(
            &template,
            &MemorySource::new(),
            &[rule("Code", "CONCAT='PRE_'+Col1+'_SUF'")],
        )
        .unwrap();

        assert_eq!(result.column("Code").unwrap(), &["PRE_X_SUF", "PRE__SUF"]);
    }

    #[test]
    fn test_concat_unresolved_part_contributes_nothing() {
        let template = Table::from_str_rows(&["First", "Last"], &[&["Ada", "Lovelace"]]);
        let result = run(
            &template,
            &MemorySource::new(),
            &[rule("Name", "first + ' ' + Middle + LAST")],
        )
        .unwrap();

        assert_eq!(result.column("Name").unwrap(), &["Ada Lovelace"]);
    }

    #[test]
    fn test_column_ref_copy_and_missing() {
        let template = Table::from_str_rows(&["Email "], &[&["a@x.io"], &[""]]);
        let result = run(
            &template,
            &MemorySource::new(),
            &[rule("Mail", "COLUMN=email"), rule("Phone", "COLUMN=phone")],
        )
        .unwrap();

        assert_eq!(result.column("Mail").unwrap(), &["a@x.io", ""]);
        assert_eq!(result.column("Phone").unwrap(), &["", ""]);
    }

    #[test]
    fn test_unknown_rule_blank_column() {
        let template = Table::from_str_rows(&["a"], &[&["1"], &["2"], &["3"]]);
        let result = run(&template, &MemorySource::new(), &[rule("Odd", "???")]).unwrap();

        assert_eq!(result.column("Odd").unwrap(), &["", "", ""]);
    }

    #[test]
    fn test_duplicate_target_overwrites_in_place() {
        let template = Table::from_str_rows(&["a"], &[&["1"]]);
        let result = run(
            &template,
            &MemorySource::new(),
            &[
                rule("T", "INVARIABLE=first"),
                rule("U", "INVARIABLE=u"),
                rule("T", "INVARIABLE=second"),
            ],
        )
        .unwrap();

        assert_eq!(result.columns(), &["T", "U"]);
        assert_eq!(result.column("T").unwrap(), &["second"]);
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let template = Table::from_str_rows(&["Col", "Name"], &[&["A", "x"], &["B", "y"]]);
        let source = MemorySource::new()
            .with_sheet("Ref", Table::from_str_rows(&["k", "v"], &[&["A", "1"]]));
        let rules = vec![
            rule("Id", "NS=ID##"),
            rule("Mapped", "MAPPING=Col;Ref"),
            rule("Label", "CONCAT=Name+'-'+Col"),
        ];

        let first = run(&template, &source, &rules).unwrap();
        let second = run(&template, &source, &rules).unwrap();
        assert_eq!(first, second);
    }
}
