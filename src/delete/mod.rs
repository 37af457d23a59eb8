//! Guarded row deletion on SQLite database files.
//!
//! This is the engine behind the `delete_rows` tool. A call runs as one
//! synchronous unit of work:
//!
//! 1. **Validate** the request (in a fixed order, first failure wins)
//! 2. **Open** a connection to the database file
//! 3. **Check** that the table exists
//! 4. **Build** a parameterised `DELETE` from the filters
//! 5. **Execute and commit** inside a single transaction
//! 6. **Close** the connection, whatever happened in 3-5
//!
//! Nothing is kept between calls.
//!
//! # Example
//!
//! ```no_run
//! use sqlite_delete_mcp::delete::{DeleteEngine, DeleteRequest};
//!
//! let engine = DeleteEngine::default();
//! let request = DeleteRequest::new("/data/app.db", "todos").filter("done", 1);
//! let outcome = engine.execute(&request)?;
//! println!("deleted {} rows", outcome.deleted_count);
//! # Ok::<(), sqlite_delete_mcp::delete::DeleteError>(())
//! ```

mod error;
mod request;
pub mod statement;

pub use error::{DeleteError, DeleteResult, ErrorKind};
pub use request::{DeleteRequest, FilterValue, Filters};

use std::path::{Path, PathBuf};
use std::time::Duration;

use indexmap::IndexMap;
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use serde::Serialize;

/// Default time to wait for a locked database before giving up.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Result of a successful delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    /// Number of rows removed (zero is a valid outcome).
    pub deleted_count: usize,
    /// Table the rows were removed from.
    pub table: String,
    /// Database file that was modified.
    pub db_path: String,
}

/// Executes `delete_rows` requests.
///
/// The engine only carries settings; each call opens and closes its own
/// connection, so one engine can be shared by concurrent callers.
#[derive(Debug, Clone)]
pub struct DeleteEngine {
    busy_timeout: Duration,
    allowed_paths: Vec<PathBuf>,
}

impl Default for DeleteEngine {
    fn default() -> Self {
        Self::new(DEFAULT_BUSY_TIMEOUT, Vec::new())
    }
}

impl DeleteEngine {
    /// Creates an engine.
    ///
    /// An empty `allowed_paths` permits any database path.
    #[must_use]
    pub const fn new(busy_timeout: Duration, allowed_paths: Vec<PathBuf>) -> Self {
        Self {
            busy_timeout,
            allowed_paths,
        }
    }

    /// Returns the configured busy timeout.
    #[must_use]
    pub const fn busy_timeout(&self) -> Duration {
        self.busy_timeout
    }

    /// Validates and executes a delete request.
    ///
    /// # Errors
    ///
    /// Returns a [`DeleteError`] whose [`ErrorKind`] classifies the failure.
    /// Validation errors are raised before the database is opened, so they
    /// never leave a partial effect.
    pub fn execute(&self, request: &DeleteRequest) -> DeleteResult<DeleteOutcome> {
        tracing::debug!(
            db_path = %request.db_path,
            table = %request.table,
            allow_full_table = request.allow_full_table,
            "delete_rows requested"
        );

        let result = self.validate(request).and_then(|conditions| {
            let mut conn = self.open(&request.db_path)?;
            let result = delete_in(&mut conn, &request.table, conditions);
            close(conn);
            result
        });

        match result {
            Ok(deleted_count) => {
                tracing::info!(
                    db_path = %request.db_path,
                    table = %request.table,
                    deleted_count,
                    "Rows deleted"
                );
                Ok(DeleteOutcome {
                    deleted_count,
                    table: request.table.clone(),
                    db_path: request.db_path.clone(),
                })
            }
            Err(e) => {
                tracing::warn!(
                    code = e.code(),
                    reason = %e.message(),
                    "delete_rows failed"
                );
                Err(e)
            }
        }
    }

    /// Runs the ordered pre-connection checks and returns the conditions.
    fn validate<'a>(
        &self,
        request: &'a DeleteRequest,
    ) -> DeleteResult<Option<&'a IndexMap<String, FilterValue>>> {
        if request.db_path.is_empty() || request.table.is_empty() {
            return Err(DeleteError::invalid_input(
                "missing required parameter: db_path or table",
            ));
        }

        self.check_database_path(&request.db_path)?;

        if request.filters.is_empty() && !request.allow_full_table {
            return Err(DeleteError::new(
                ErrorKind::ForbiddenFullTableDelete,
                "no filters given and full-table delete not explicitly allowed \
                 (set allow_full_table = true)",
            ));
        }

        match &request.filters {
            Filters::Absent => Ok(None),
            Filters::Conditions(conditions) => Ok(Some(conditions)),
            Filters::Malformed { reason } => Err(DeleteError::invalid_filters(reason.clone())),
        }
    }

    /// Checks the path names an existing file inside the allowed directories.
    fn check_database_path(&self, db_path: &str) -> DeleteResult<()> {
        let not_found = || {
            DeleteError::new(
                ErrorKind::DbNotFound,
                format!("database file does not exist or is not accessible: {db_path}"),
            )
        };

        let path = Path::new(db_path);
        let is_file = std::fs::metadata(path).is_ok_and(|m| m.is_file());
        if !is_file {
            return Err(not_found());
        }

        if self.allowed_paths.is_empty() {
            return Ok(());
        }

        let canonical = path.canonicalize().map_err(|_| not_found())?;
        let allowed = self.allowed_paths.iter().any(|dir| {
            dir.canonicalize()
                .is_ok_and(|dir| canonical.starts_with(dir))
        });

        if allowed {
            Ok(())
        } else {
            // Don't echo the configured directories back to the client
            Err(DeleteError::new(
                ErrorKind::DbNotFound,
                format!("database file is outside the allowed directories: {db_path}"),
            ))
        }
    }

    /// Opens an existing database read-write; never creates a file.
    fn open(&self, db_path: &str) -> DeleteResult<Connection> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(db_path, flags)?;
        conn.busy_timeout(self.busy_timeout)?;
        Ok(conn)
    }
}

/// Confirms the table exists, then deletes and commits.
fn delete_in(
    conn: &mut Connection,
    table: &str,
    conditions: Option<&IndexMap<String, FilterValue>>,
) -> DeleteResult<usize> {
    let exists = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get::<_, String>(0),
        )
        .optional()?
        .is_some();

    if !exists {
        return Err(DeleteError::new(
            ErrorKind::TableNotFound,
            format!("table does not exist: {table}"),
        ));
    }

    let empty = IndexMap::new();
    let statement = statement::build(table, conditions.unwrap_or(&empty))?;
    tracing::trace!(sql = %statement.sql, params = statement.values.len(), "Executing delete");

    // Rolled back on drop if anything below fails
    let tx = conn.transaction()?;
    let deleted = tx.execute(
        &statement.sql,
        rusqlite::params_from_iter(statement.values.iter()),
    )?;
    tx.commit()?;

    Ok(deleted)
}

/// Closes the connection, logging rather than masking the call's result.
fn close(conn: Connection) {
    if let Err((_conn, e)) = conn.close() {
        tracing::warn!(error = %e, "Failed to close database connection");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_engine() {
        let engine = DeleteEngine::default();
        assert_eq!(engine.busy_timeout(), DEFAULT_BUSY_TIMEOUT);
        assert!(engine.allowed_paths.is_empty());
    }

    #[test]
    fn empty_identifiers_fail_before_filesystem() {
        let engine = DeleteEngine::default();

        let err = engine
            .execute(&DeleteRequest::new("", "todos"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err = engine
            .execute(&DeleteRequest::new("/definitely/missing.db", ""))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn missing_file_is_db_not_found() {
        let err = DeleteEngine::default()
            .execute(&DeleteRequest::new("/definitely/missing.db", "todos").filter("id", 1))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DbNotFound);
        assert!(err.message().contains("/definitely/missing.db"));
    }

    #[test]
    fn outcome_serialises_with_wire_names() {
        let outcome = DeleteOutcome {
            deleted_count: 2,
            table: "todos".to_string(),
            db_path: "/tmp/app.db".to_string(),
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"deleted_count": 2, "table": "todos", "db_path": "/tmp/app.db"})
        );
    }
}
