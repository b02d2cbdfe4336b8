//! # DMF - mapping and validation engines for template workbooks
//!
//! A workbook holds a `Template` sheet (one row per record) plus rule and
//! reference sheets. Two engines run over it:
//!
//! - **mapping**: derive a new table from the Template using short rules
//!   (`NS=`, `INVARIABLE=`, `MAPPING=`, `CONCAT=`, `COLUMN=`)
//! - **validation**: check every Template row against declarative rules
//!   (required, lengths, allowed values, patterns, `unique`, `equals:`)
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Workbook   │────▶│   Parser    │────▶│   Engine    │────▶│  CSV output │
//! │ (CSV sheets)│     │  (auto-enc) │     │ (map/check) │     │ (+ summary) │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dmf::pipeline::{run_validation, RunOptions};
//! use dmf::workbook::CsvDirSource;
//!
//! let source = CsvDirSource::new("input/customers");
//! let outcome = run_validation(&source, "customers", None, &RunOptions::new("out"))?;
//! println!("{}", outcome.info_line());
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - The column-major `Table`
//! - [`parser`] - CSV parsing with auto-detection
//! - [`workbook`] - Sheet sources (CSV directory, in-memory uploads)
//! - [`resolver`] - Column name resolution
//! - [`cache`] - Per-run reference sheet cache
//! - [`mapping`] - Mapping rules and engine
//! - [`validation`] - Validation rules, engine and summary
//! - [`pipeline`] - File-level runs
//! - [`config`] - Server settings
//! - [`api`] - HTTP API server

// Core modules
pub mod error;
pub mod models;

// Reading
pub mod parser;
pub mod resolver;
pub mod workbook;

// Caching
pub mod cache;

// Engines
pub mod mapping;
pub mod validation;

// Runs
pub mod config;
pub mod pipeline;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{ConfigError, RunError, ServerError, SourceError};

// =============================================================================
// Re-exports - Models and sources
// =============================================================================

pub use cache::ReferenceCache;
pub use models::Table;
pub use workbook::{CsvDirSource, MemorySource, SheetSource};

// =============================================================================
// Re-exports - Engines
// =============================================================================

pub use mapping::{map_workbook, markers_description, MappingRule, RuleKind};
pub use validation::{validate_workbook, Metrics, ValidationReport, ValidationRule};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use pipeline::{run_mapping, run_validation, MappingOutcome, RunOptions, ValidationOutcome};

// Server
pub mod server {
    pub use crate::api::server::start_server;
}
