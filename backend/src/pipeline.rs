//! File-level runs of the mapping and validation engines.
//!
//! A run reads a workbook through a [`SheetSource`], evaluates it, renders
//! every output in memory and only then writes the files. A validation run
//! writes two files; if the second write fails the first one is removed.
//!
//! # Example
//!
//! ```rust,ignore
//! use dmf::pipeline::{run_mapping, RunOptions};
//! use dmf::workbook::CsvDirSource;
//!
//! let source = CsvDirSource::new("input/customers");
//! let outcome = run_mapping(&source, "customers", None, &RunOptions::new("out/"))?;
//! println!("RESULT:{}", outcome.output_name);
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::api::logs::{log_error, log_info, log_info_indent, log_success, log_warning};
use crate::error::{ConfigError, RunError, RunResult};
use crate::mapping::{self, map_workbook};
use crate::parser::table_to_csv;
use crate::validation::{self, validate_workbook, Metrics};
use crate::workbook::SheetSource;

/// Suffix of a mapping result file name.
pub const MAPPING_SUFFIX: &str = "_result";
/// Suffix of a validation report file name.
pub const REPORT_SUFFIX: &str = " review";
/// Suffix added to the report name for the summary file.
pub const SUMMARY_SUFFIX: &str = " summary";

/// Where and under which name outputs are written.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub output_dir: PathBuf,
    /// Requested output file name; `.csv` is appended when missing.
    pub output_name: Option<String>,
}

impl RunOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            output_name: None,
        }
    }

    pub fn with_output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = Some(name.into());
        self
    }
}

/// Result of a mapping run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingOutcome {
    pub output_name: String,
    #[serde(skip)]
    pub output_path: PathBuf,
    pub rows: usize,
    pub columns: usize,
}

impl MappingOutcome {
    /// Human-readable line following `RESULT:`.
    pub fn info_line(&self) -> String {
        format!("{} rows, {} columns", self.rows, self.columns)
    }
}

/// Result of a validation run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutcome {
    pub report_name: String,
    pub summary_name: String,
    #[serde(skip)]
    pub report_path: PathBuf,
    #[serde(skip)]
    pub summary_path: PathBuf,
    pub metrics: Metrics,
}

impl ValidationOutcome {
    pub fn info_line(&self) -> String {
        format!(
            "{}/{} valid rows ({})",
            self.metrics.valid_rows, self.metrics.total_rows, self.metrics.valid_pct
        )
    }
}

// =============================================================================
// Rule overrides
// =============================================================================

/// Parse a mapping override document (`[{"target", "rule"}]`).
pub fn mapping_overrides(text: &str) -> RunResult<Vec<mapping::RuleRow>> {
    mapping::parse_override_json(text).map_err(|e| RunError::Rules(e.to_string()))
}

/// Parse a validation override document.
pub fn validation_overrides(text: &str) -> RunResult<Vec<validation::RuleRow>> {
    validation::overrides::parse_override_json(text).map_err(|e| RunError::Rules(e.to_string()))
}

/// Read an override document from disk.
pub fn read_rules_file(path: &Path) -> RunResult<String> {
    fs::read_to_string(path).map_err(|e| RunError::Rules(format!("{}: {}", path.display(), e)))
}

// =============================================================================
// Runs
// =============================================================================

/// Map a workbook and write `<stem>_result.csv`.
pub fn run_mapping(
    source: &dyn SheetSource,
    input_name: &str,
    overrides: Option<&[mapping::RuleRow]>,
    options: &RunOptions,
) -> RunResult<MappingOutcome> {
    log_info(format!("Mapping '{}'", input_name));
    if let Some(rows) = overrides {
        log_info_indent(format!("{} rules from override", rows.len()), 1);
    }

    let result = map_workbook(source, overrides).map_err(|e| read_error(source, input_name, e))?;
    log_info_indent(format!("{} rows, {} columns", result.len(), result.columns().len()), 1);

    let output_name = match &options.output_name {
        Some(name) => csv_file_name(name),
        None => mapping_file_name(input_name),
    };
    let output_path = options.output_dir.join(&output_name);

    let content = table_to_csv(&result).map_err(|e| write_error(&output_name, e))?;
    write_output(&options.output_dir, &output_path, &output_name, &content)?;

    log_success(format!("Saved {}", output_name));
    Ok(MappingOutcome {
        output_name,
        output_path,
        rows: result.len(),
        columns: result.columns().len(),
    })
}

/// Validate a workbook and write `<stem> review.csv` plus its summary.
pub fn run_validation(
    source: &dyn SheetSource,
    input_name: &str,
    overrides: Option<&[validation::RuleRow]>,
    options: &RunOptions,
) -> RunResult<ValidationOutcome> {
    log_info(format!("Validating '{}'", input_name));
    if let Some(rows) = overrides.filter(|rows| !rows.is_empty()) {
        log_info_indent(format!("{} rules from override", rows.len()), 1);
    }

    let report = validate_workbook(source, overrides).map_err(|e| read_error(source, input_name, e))?;

    let stem = match &options.output_name {
        Some(name) => file_stem(&csv_file_name(name)),
        None => report_stem(input_name),
    };
    let report_name = format!("{}.csv", stem);
    let summary_name = format!("{}{}.csv", stem, SUMMARY_SUFFIX);

    let report_csv = table_to_csv(&report.result).map_err(|e| write_error(&report_name, e))?;
    let summary_csv = render_summary(&report).map_err(|e| write_error(&summary_name, e))?;

    let report_path = options.output_dir.join(&report_name);
    let summary_path = options.output_dir.join(&summary_name);

    write_output(&options.output_dir, &report_path, &report_name, &report_csv)?;
    if let Err(e) = write_output(&options.output_dir, &summary_path, &summary_name, &summary_csv) {
        if fs::remove_file(&report_path).is_err() {
            log_warning(format!("Could not remove partial report {}", report_name));
        }
        return Err(e);
    }

    let metrics = report.metrics;
    if metrics.valid_rows == metrics.total_rows {
        log_success(format!("All {} rows valid", metrics.total_rows));
    } else {
        log_warning(format!(
            "{} of {} rows invalid",
            metrics.total_rows - metrics.valid_rows,
            metrics.total_rows
        ));
    }
    log_success(format!("Saved {} and {}", report_name, summary_name));

    Ok(ValidationOutcome {
        report_name,
        summary_name,
        report_path,
        summary_path,
        metrics,
    })
}

/// Metrics block, a blank line, then the per-field table.
fn render_summary(report: &validation::ValidationReport) -> std::io::Result<String> {
    let mut out = table_to_csv(&report.metrics.to_table())?;
    out.push('\n');
    out.push_str(&table_to_csv(&report.summary_table())?);
    Ok(out)
}

// =============================================================================
// Helpers
// =============================================================================

/// Sheet read failures carry the input name; other configuration errors
/// pass through.
fn read_error(source: &dyn SheetSource, input_name: &str, err: ConfigError) -> RunError {
    if let ConfigError::MissingSheet(_) = err {
        log_info_indent(format!("Available sheets: {}", source.sheet_names().join(", ")), 1);
    }
    match err {
        ConfigError::Source(source) => {
            log_error(format!("Cannot read '{}': {}", input_name, source));
            RunError::Read {
                file: input_name.to_string(),
                source,
            }
        }
        other => {
            log_error(other.to_string());
            RunError::Config(other)
        }
    }
}

fn write_error(file: &str, source: std::io::Error) -> RunError {
    RunError::Write {
        file: file.to_string(),
        source,
    }
}

fn write_output(dir: &Path, path: &Path, name: &str, content: &str) -> RunResult<()> {
    fs::create_dir_all(dir).map_err(|e| write_error(name, e))?;
    fs::write(path, content).map_err(|e| write_error(name, e))
}

/// Default mapping output name: `<stem>_result.csv`.
pub fn mapping_file_name(input_name: &str) -> String {
    format!("{}{}.csv", file_stem(input_name), MAPPING_SUFFIX)
}

/// Default validation report name without extension: `<stem> review`.
pub fn report_stem(input_name: &str) -> String {
    format!("{}{}", file_stem(input_name), REPORT_SUFFIX)
}

/// Final path component without its extension.
fn file_stem(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("workbook")
        .to_string()
}

/// Basename of `name` with a `.csv` extension.
fn csv_file_name(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("result");
    if base.to_lowercase().ends_with(".csv") {
        base.to_string()
    } else {
        format!("{}.csv", base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Table;
    use crate::workbook::{CsvDirSource, MemorySource, PARAMETERS_SHEET, RULES_SHEET, TEMPLATE_SHEET};
    use tempfile::TempDir;

    fn workbook() -> MemorySource {
        MemorySource::new()
            .with_sheet(
                TEMPLATE_SHEET,
                Table::from_str_rows(&["Name", "Code"], &[&["Ada", "A1"], &["", "B2"]]),
            )
            .with_sheet(
                PARAMETERS_SHEET,
                Table::from_str_rows(&["Target", "Rule"], &[&["Id", "NS=#"], &["Label", "Name+'-'+Code"]]),
            )
            .with_sheet(
                RULES_SHEET,
                Table::from_str_rows(&["Field", "Checked", "Required"], &[&["Name", "1", "1"]]),
            )
    }

    #[test]
    fn test_output_names() {
        assert_eq!(file_stem("batch_07.xlsx"), "batch_07");
        assert_eq!(file_stem("dir/customers"), "customers");
        assert_eq!(csv_file_name("out"), "out.csv");
        assert_eq!(csv_file_name("../x/Out.CSV"), "Out.CSV");
    }

    #[test]
    fn test_run_mapping_writes_result() {
        let dir = TempDir::new().unwrap();
        let outcome = run_mapping(&workbook(), "customers.xlsx", None, &RunOptions::new(dir.path())).unwrap();

        assert_eq!(outcome.output_name, "customers_result.csv");
        assert_eq!(outcome.info_line(), "2 rows, 2 columns");
        let content = fs::read_to_string(&outcome.output_path).unwrap();
        assert_eq!(content, "Id,Label\n1,Ada-A1\n2,-B2\n");
    }

    #[test]
    fn test_run_mapping_requested_name() {
        let dir = TempDir::new().unwrap();
        let options = RunOptions::new(dir.path()).with_output_name("mapped");
        let outcome = run_mapping(&workbook(), "customers", None, &options).unwrap();
        assert_eq!(outcome.output_name, "mapped.csv");
        assert!(dir.path().join("mapped.csv").exists());
    }

    #[test]
    fn test_run_validation_writes_both_files() {
        let dir = TempDir::new().unwrap();
        let outcome = run_validation(&workbook(), "customers", None, &RunOptions::new(dir.path())).unwrap();

        assert_eq!(outcome.report_name, "customers review.csv");
        assert_eq!(outcome.summary_name, "customers review summary.csv");
        assert_eq!(outcome.info_line(), "1/2 valid rows (50.0%)");

        let report = fs::read_to_string(&outcome.report_path).unwrap();
        assert_eq!(report, "Valid,Errors,Name,Code\nOK,,Ada,A1\nKO,Name is required,,B2\n");

        let summary = fs::read_to_string(&outcome.summary_path).unwrap();
        assert_eq!(
            summary,
            "Metric,Value\nTotal Rows,2\nValid Rows,1\n% Valid,50.0%\n\nField,Errors Count,Errors %\nName,1,50.0%\n"
        );
    }

    #[test]
    fn test_config_error_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let rows = vec![mapping::RuleRow::new("Broken", "MAPPING=NoSeparator")];
        let err = run_mapping(&workbook(), "customers", Some(&rows), &RunOptions::new(dir.path())).unwrap_err();

        assert!(matches!(err, RunError::Config(ConfigError::MalformedMapping(_))));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_read_error_carries_input_name() {
        let input = TempDir::new().unwrap();
        fs::write(input.path().join("Template.csv"), "").unwrap();
        let out = TempDir::new().unwrap();

        let source = CsvDirSource::new(input.path());
        let err = run_validation(&source, "batch_07", None, &RunOptions::new(out.path())).unwrap_err();
        assert!(matches!(err, RunError::Read { ref file, .. } if file == "batch_07"));
    }

    #[test]
    fn test_invalid_override_json() {
        assert!(matches!(mapping_overrides("not json"), Err(RunError::Rules(_))));
        assert_eq!(validation_overrides("[]").unwrap().len(), 0);
    }
}
