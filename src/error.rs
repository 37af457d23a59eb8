//! Startup errors for sqlite-delete-mcp.
//!
//! Errors raised by the delete engine itself live in
//! [`crate::delete::DeleteError`]; this module covers loading the config
//! file before the server starts. None of these ever reach an MCP client.

use std::path::PathBuf;

use thiserror::Error;

/// Why the configuration could not be loaded.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file exists but reading it failed.
    #[error("cannot read config {path}")]
    ReadError {
        /// File that was being read.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid JSON or has unknown keys.
    #[error("invalid JSON in config {path}")]
    ParseError {
        /// File that was being parsed.
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A path given with `--config` does not exist.
    #[error("config file not found: {path}")]
    NotFound {
        /// The path from the command line.
        path: PathBuf,
    },

    /// A setting is out of range, e.g. `database.busy_timeout_ms`.
    #[error("invalid config: {message}")]
    ValidationError {
        /// Which setting failed and why.
        message: String,
    },
}
