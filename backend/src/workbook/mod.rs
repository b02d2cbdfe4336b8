//! Workbook sources.
//!
//! A workbook is a set of named sheets. Engines never touch files directly:
//! they ask a [`SheetSource`] for a sheet by name, through the per-run
//! [`crate::cache::ReferenceCache`].
//!
//! - [`CsvDirSource`] - a directory holding one `<Sheet>.csv` per sheet,
//!   read lazily
//! - [`MemorySource`] - sheets already in memory (uploads, tests)

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::SourceResult;
use crate::models::Table;
use crate::parser::{parse_bytes_auto, parse_file_auto, sheet_name};

/// Sheet holding the records to map or validate.
pub const TEMPLATE_SHEET: &str = "Template";

/// Sheet holding mapping rules (target, rule).
pub const PARAMETERS_SHEET: &str = "Parameters";

/// Sheet holding validation rules.
pub const RULES_SHEET: &str = "ValidationRules";

/// Anything that can hand out sheets by name.
pub trait SheetSource {
    /// Load sheet `name`. `Ok(None)` means the workbook has no such sheet.
    fn read_sheet(&self, name: &str) -> SourceResult<Option<Table>>;

    /// Names of the sheets available, for diagnostics.
    fn sheet_names(&self) -> Vec<String>;
}

// =============================================================================
// Directory of CSV sheets
// =============================================================================

/// A workbook stored as a directory of CSV files, one per sheet.
#[derive(Debug, Clone)]
pub struct CsvDirSource {
    dir: PathBuf,
}

impl CsvDirSource {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn sheet_path(&self, name: &str) -> Option<PathBuf> {
        // Sheet names never address files outside the workbook.
        if name.is_empty() || name.contains(['/', '\\']) || name == ".." {
            return None;
        }
        Some(self.dir.join(format!("{}.csv", name)))
    }
}

impl SheetSource for CsvDirSource {
    fn read_sheet(&self, name: &str) -> SourceResult<Option<Table>> {
        match self.sheet_path(name) {
            Some(path) if path.is_file() => parse_file_auto(name, &path).map(Some),
            _ => Ok(None),
        }
    }

    fn sheet_names(&self) -> Vec<String> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(e) => e,
            Err(_) => return Vec::new(),
        };

        let mut names: Vec<String> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|e| e.eq_ignore_ascii_case("csv")))
            .filter_map(|path| sheet_name(&path))
            .collect();
        names.sort();
        names
    }
}

// =============================================================================
// In-memory sheets
// =============================================================================

/// A workbook whose sheets are already loaded.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    sheets: HashMap<String, Table>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a sheet.
    pub fn insert(&mut self, name: impl Into<String>, table: Table) {
        self.sheets.insert(name.into(), table);
    }

    /// Builder-style [`MemorySource::insert`].
    pub fn with_sheet(mut self, name: impl Into<String>, table: Table) -> Self {
        self.insert(name, table);
        self
    }

    /// Parse an uploaded CSV file; the sheet is named after the file stem.
    pub fn insert_csv(&mut self, file_name: &str, bytes: &[u8]) -> SourceResult<String> {
        let name = sheet_name(Path::new(file_name)).unwrap_or_else(|| file_name.to_string());
        let table = parse_bytes_auto(&name, bytes)?;
        self.sheets.insert(name.clone(), table);
        Ok(name)
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }
}

impl SheetSource for MemorySource {
    fn read_sheet(&self, name: &str) -> SourceResult<Option<Table>> {
        Ok(self.sheets.get(name).cloned())
    }

    fn sheet_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sheets.keys().cloned().collect();
        names.sort();
        names
    }
}
