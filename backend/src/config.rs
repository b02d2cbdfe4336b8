//! Server settings from the environment.
//!
//! `.env` is loaded by the binary before any of these are read.

use std::env;
use std::path::PathBuf;

use crate::error::{ServerError, ServerResult};

/// Port the HTTP server listens on.
pub const PORT_VAR: &str = "DMF_PORT";
/// Directory generated files are written to and served from.
pub const OUTPUT_DIR_VAR: &str = "DMF_OUTPUT_DIR";

pub const DEFAULT_PORT: u16 = 3000;
/// Sub-directory of the system temp dir used when no output dir is set.
pub const DEFAULT_OUTPUT_SUBDIR: &str = "dmf-validator";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub output_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            output_dir: env::temp_dir().join(DEFAULT_OUTPUT_SUBDIR),
        }
    }
}

impl ServerConfig {
    /// Read `DMF_PORT` and `DMF_OUTPUT_DIR`, falling back to defaults.
    pub fn from_env() -> ServerResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ServerResult<Self> {
        let mut config = Self::default();

        if let Some(port) = lookup(PORT_VAR).filter(|v| !v.trim().is_empty()) {
            config.port = port
                .trim()
                .parse()
                .map_err(|_| ServerError::Internal(format!("{} must be a port number (got '{}')", PORT_VAR, port)))?;
        }
        if let Some(dir) = lookup(OUTPUT_DIR_VAR).filter(|v| !v.trim().is_empty()) {
            config.output_dir = PathBuf::from(dir.trim());
        }

        Ok(config)
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}
