//! Reference Table Cache - per-run memoized sheet loader.
//!
//! Mapping sheets and allowed-value domains are loaded on first reference
//! and kept for the rest of the run. A sheet name is fetched from the
//! [`SheetSource`] at most once per run, and that includes sheets the
//! workbook does not have.
//!
//! A cache belongs to exactly one run. Create a fresh one for every
//! mapping or validation invocation; never share it between runs.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::SourceResult;
use crate::models::Table;
use crate::workbook::SheetSource;

/// Per-run sheet cache over a [`SheetSource`].
pub struct ReferenceCache<'s> {
    source: &'s dyn SheetSource,
    /// Loaded sheets (name -> table, `None` when the workbook lacks it).
    sheets: HashMap<String, Option<Arc<Table>>>,
}

impl<'s> ReferenceCache<'s> {
    /// Create an empty cache for one run.
    pub fn new(source: &'s dyn SheetSource) -> Self {
        Self {
            source,
            sheets: HashMap::new(),
        }
    }

    /// Get a sheet, loading it on first reference.
    pub fn sheet(&mut self, name: &str) -> SourceResult<Option<Arc<Table>>> {
        if let Some(cached) = self.sheets.get(name) {
            return Ok(cached.clone());
        }

        let loaded = self.source.read_sheet(name)?.map(Arc::new);
        self.sheets.insert(name.to_string(), loaded.clone());
        Ok(loaded)
    }

    /// Whether `name` has already been looked up during this run.
    pub fn is_loaded(&self, name: &str) -> bool {
        self.sheets.contains_key(name)
    }

    /// Number of distinct sheet names looked up so far.
    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }
}
