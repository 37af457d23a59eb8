//! sqlite-delete-mcp: MCP server for guarded row deletion in SQLite databases
//!
//! This library exposes a single tool, `delete_rows`, that removes rows from a
//! table in a SQLite database file using simple equality filters.
//!
//! # Architecture
//!
//! The MCP server is a thin adapter. All decisions live in the delete engine:
//!
//! - **Validation**: Required fields, file existence, filter shape
//! - **Safety gate**: Deleting every row needs an explicit `allow_full_table`
//! - **Safe SQL**: Column names are validated before being embedded, values
//!   are always bound as parameters
//! - **Error taxonomy**: Every failure maps to one fixed error code
//!
//! # Modules
//!
//! - [`config`] — Configuration loading and validation
//! - [`delete`] — The `delete_rows` engine
//! - [`error`] — Error types
//! - [`mcp`] — MCP protocol implementation

pub mod config;
pub mod delete;
pub mod error;
pub mod mcp;
