//! Error types for the `delete_rows` operation.

use std::fmt;

use thiserror::Error;

/// Result type for delete operations.
pub type DeleteResult<T> = Result<T, DeleteError>;

/// The closed set of failure classes a delete can end in.
///
/// Every kind is terminal: nothing is retried internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Required identifying fields are missing or malformed.
    InvalidInput,
    /// The database path does not resolve to an accessible file.
    DbNotFound,
    /// An unconditional delete was attempted without `allow_full_table`.
    ForbiddenFullTableDelete,
    /// Filters are malformed, not a mapping, or name an unsafe column.
    InvalidFilters,
    /// The named table is absent from the database.
    TableNotFound,
    /// Any other failure reported by SQLite.
    SqlExecutionError,
}

impl ErrorKind {
    /// Returns the wire code for this kind.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::InvalidInput => "INVALID_INPUT",
            Self::DbNotFound => "DB_NOT_FOUND",
            Self::ForbiddenFullTableDelete => "FORBIDDEN_FULL_TABLE_DELETE",
            Self::InvalidFilters => "INVALID_FILTERS",
            Self::TableNotFound => "TABLE_NOT_FOUND",
            Self::SqlExecutionError => "SQL_EXECUTION_ERROR",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A failed delete: an error kind plus a human-readable message.
///
/// Displays as `"<CODE>: <message>"`, which is exactly what the MCP
/// adapter hands back to the client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct DeleteError {
    kind: ErrorKind,
    message: String,
}

impl DeleteError {
    /// Creates a new error of the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Shorthand for [`ErrorKind::InvalidInput`].
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    /// Shorthand for [`ErrorKind::InvalidFilters`].
    #[must_use]
    pub fn invalid_filters(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidFilters, message)
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the wire code of the error kind.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Returns the message without the code prefix.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<rusqlite::Error> for DeleteError {
    fn from(e: rusqlite::Error) -> Self {
        Self::new(
            ErrorKind::SqlExecutionError,
            format!("failed to execute delete: {e}"),
        )
    }
}
