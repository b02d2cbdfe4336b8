//! Error types for the DMF mapping and validation runs.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`SourceError`] - reading or decoding a sheet
//! - [`ConfigError`] - fatal configuration problems (bad rules, missing sheets)
//! - [`RunError`] - top-level run orchestration errors
//! - [`ServerError`] - HTTP layer errors
//!
//! Row-level validation violations are *not* errors: they are collected as
//! diagnostics by [`crate::validation::engine`].
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// Source Errors
// =============================================================================

/// Errors while reading a sheet from a workbook.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// Content could not be decoded.
    #[error("Failed to decode content: {0}")]
    Encoding(String),

    /// Invalid CSV content.
    #[error("Invalid CSV in sheet '{sheet}': {message}")]
    Csv { sheet: String, message: String },

    /// Sheet has no header row.
    #[error("Sheet '{0}' is empty")]
    EmptySheet(String),
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Fatal configuration problems. Any of these aborts the whole run.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A sheet the run cannot do without is absent.
    #[error("Missing required sheet '{0}'.")]
    MissingSheet(String),

    /// `MAPPING=` without the `;` separator.
    #[error("Expected format MAPPING=<column>;<sheet> (got '{0}').")]
    MalformedMapping(String),

    /// Mapping sheet cannot provide a key and a value column.
    #[error("Mapping sheet '{0}' needs at least 2 columns.")]
    MappingSheetTooNarrow(String),

    /// `SHEET=` instruction without a sheet name.
    #[error("Invalid SHEET= instruction for field '{0}': missing sheet name.")]
    MissingSheetName(String),

    /// Explicit `COLUMN=` not present in the reference sheet.
    #[error("Column '{column}' not found in sheet '{sheet}'.")]
    ColumnNotFound { column: String, sheet: String },

    /// Several reference columns match the field name.
    #[error("Several columns match field '{field}' in sheet '{sheet}'. Specify COLUMN=.")]
    AmbiguousColumn { field: String, sheet: String },

    /// Reference sheet has no column holding any value.
    #[error("No usable column found in sheet '{0}'.")]
    NoUsableColumn(String),

    /// Pattern cell is not a valid regular expression.
    #[error("Invalid pattern for field '{field}': {message}")]
    InvalidPattern { field: String, message: String },

    /// Reading a referenced sheet failed.
    #[error(transparent)]
    Source(#[from] SourceError),
}

// =============================================================================
// Run Errors (top-level)
// =============================================================================

/// Top-level run errors.
///
/// This is the error type returned by [`crate::pipeline::run_mapping`] and
/// [`crate::pipeline::run_validation`]. Collaborator failures carry the
/// file name they concern.
#[derive(Debug, Error)]
pub enum RunError {
    /// Input workbook could not be read.
    #[error("Cannot read '{file}': {source}")]
    Read { file: String, source: SourceError },

    /// Output could not be written.
    #[error("Failed to save '{file}': {source}")]
    Write {
        file: String,
        source: std::io::Error,
    },

    /// Rule override payload is not valid JSON.
    #[error("Failed to read rules override: {0}")]
    Rules(String),

    /// Configuration error.
    #[error("{0}")]
    Config(#[from] ConfigError),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Run error.
    #[error("Run error: {0}")]
    Run(#[from] RunError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for sheet reads.
pub type SourceResult<T> = Result<T, SourceError>;

/// Result type for rule parsing and evaluation.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for whole runs.
pub type RunResult<T> = Result<T, RunError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
