//! Integration tests for the `delete_rows` engine.
//!
//! Each test seeds a throwaway SQLite file, runs the engine against it and
//! then inspects the file with an independent connection.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::Connection;
use serde_json::json;
use sqlite_delete_mcp::delete::{DeleteEngine, DeleteRequest, ErrorKind, FilterValue};
use tempfile::TempDir;

/// Creates `todos.db` with three rows, two of them done.
fn todos_db(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("todos.db");
    let conn = Connection::open(&path).expect("Failed to create test database");
    conn.execute_batch(
        "CREATE TABLE todos (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             title TEXT NOT NULL,
             done INTEGER NOT NULL DEFAULT 0,
             owner TEXT
         );
         INSERT INTO todos (title, done, owner) VALUES
             ('task 1', 0, 'ana'),
             ('task 2', 1, 'ana'),
             ('task 3', 1, NULL);",
    )
    .expect("Failed to seed test database");
    path
}

fn row_count(path: &Path, table: &str) -> i64 {
    let conn = Connection::open(path).unwrap();
    conn.query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |row| {
        row.get(0)
    })
    .unwrap()
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

// =============================================================================
// End-to-end scenarios
// =============================================================================

#[test]
fn filtered_delete_removes_matching_rows() {
    let dir = tempfile::tempdir().unwrap();
    let db = todos_db(&dir);

    let outcome = DeleteEngine::default()
        .execute(&DeleteRequest::new(path_str(&db), "todos").filter("done", 1))
        .unwrap();

    assert_eq!(outcome.deleted_count, 2);
    assert_eq!(outcome.table, "todos");
    assert_eq!(outcome.db_path, path_str(&db));
    assert_eq!(row_count(&db, "todos"), 1);
}

#[test]
fn empty_filters_without_opt_in_are_forbidden() {
    let dir = tempfile::tempdir().unwrap();
    let db = todos_db(&dir);

    let request = DeleteRequest::from_arguments(&json!({
        "db_path": path_str(&db),
        "table": "todos",
        "filters": {},
        "allow_full_table": false
    }))
    .unwrap();

    let err = DeleteEngine::default().execute(&request).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ForbiddenFullTableDelete);
    assert_eq!(row_count(&db, "todos"), 3);
}

#[test]
fn full_table_delete_with_opt_in() {
    let dir = tempfile::tempdir().unwrap();
    let db = todos_db(&dir);

    let request = DeleteRequest::from_arguments(&json!({
        "db_path": path_str(&db),
        "table": "todos",
        "filters": null,
        "allow_full_table": true
    }))
    .unwrap();

    let outcome = DeleteEngine::default().execute(&request).unwrap();
    assert_eq!(outcome.deleted_count, 3);
    assert_eq!(row_count(&db, "todos"), 0);
}

#[test]
fn repeated_delete_is_zero_not_error() {
    let dir = tempfile::tempdir().unwrap();
    let db = todos_db(&dir);
    let engine = DeleteEngine::default();
    let request = DeleteRequest::new(path_str(&db), "todos").filter("done", 1);

    assert_eq!(engine.execute(&request).unwrap().deleted_count, 2);
    assert_eq!(engine.execute(&request).unwrap().deleted_count, 0);
    assert_eq!(row_count(&db, "todos"), 1);
}

// =============================================================================
// Validation order
// =============================================================================

#[test]
fn missing_identifiers_are_invalid_input() {
    let dir = tempfile::tempdir().unwrap();
    let db = todos_db(&dir);
    let engine = DeleteEngine::default();

    for request in [
        DeleteRequest::new("", "todos").filter("done", 1),
        DeleteRequest::new(path_str(&db), "").filter("done", 1),
        DeleteRequest::new("", ""),
    ] {
        let err = engine.execute(&request).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(err.code(), "INVALID_INPUT");
    }
    assert_eq!(row_count(&db, "todos"), 3);
}

#[test]
fn invalid_input_wins_over_missing_file() {
    let err = DeleteEngine::default()
        .execute(&DeleteRequest::new("/no/such/file.db", ""))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[test]
fn missing_database_file() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.db");

    let err = DeleteEngine::default()
        .execute(&DeleteRequest::new(path_str(&missing), "todos").allow_full_table(true))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DbNotFound);
    assert!(!missing.exists(), "the engine must never create the file");
}

#[test]
fn directory_is_not_a_database_file() {
    let dir = tempfile::tempdir().unwrap();

    let err = DeleteEngine::default()
        .execute(&DeleteRequest::new(path_str(dir.path()), "todos").filter("id", 1))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DbNotFound);
}

#[test]
fn missing_file_wins_over_forbidden_delete() {
    let err = DeleteEngine::default()
        .execute(&DeleteRequest::new("/no/such/file.db", "todos"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DbNotFound);
}

#[test]
fn forbidden_regardless_of_table() {
    let dir = tempfile::tempdir().unwrap();
    let db = todos_db(&dir);

    let err = DeleteEngine::default()
        .execute(&DeleteRequest::new(path_str(&db), "no_such_table"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ForbiddenFullTableDelete);
}

#[test]
fn non_mapping_filters_are_not_treated_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let db = todos_db(&dir);

    // A non-mapping value is not "no filters": it is reported as malformed.
    let request = DeleteRequest::from_arguments(&json!({
        "db_path": path_str(&db),
        "table": "todos",
        "filters": "done = 1"
    }))
    .unwrap();

    let err = DeleteEngine::default().execute(&request).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidFilters);
}

// =============================================================================
// Filters
// =============================================================================

#[test]
fn non_mapping_filters_are_invalid() {
    let dir = tempfile::tempdir().unwrap();
    let db = todos_db(&dir);
    let engine = DeleteEngine::default();

    for filters in [json!([["done", 1]]), json!(1), json!("done"), json!(true)] {
        let request = DeleteRequest::from_arguments(&json!({
            "db_path": path_str(&db),
            "table": "todos",
            "filters": filters.clone(),
            "allow_full_table": true
        }))
        .unwrap();

        let err = engine.execute(&request).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFilters, "filters: {filters}");
    }
    assert_eq!(row_count(&db, "todos"), 3);
}

#[test]
fn nested_filter_values_are_invalid() {
    let dir = tempfile::tempdir().unwrap();
    let db = todos_db(&dir);

    let request = DeleteRequest::from_arguments(&json!({
        "db_path": path_str(&db),
        "table": "todos",
        "filters": {"done": [0, 1]}
    }))
    .unwrap();

    let err = DeleteEngine::default().execute(&request).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidFilters);
    assert!(err.message().contains("done"));
    assert_eq!(row_count(&db, "todos"), 3);
}

#[test]
fn unsafe_column_names_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let db = todos_db(&dir);
    let engine = DeleteEngine::default();

    for column in [
        "done\" = 1 OR \"1",
        "done'",
        "done; DROP TABLE todos",
        "",
    ] {
        let err = engine
            .execute(&DeleteRequest::new(path_str(&db), "todos").filter(column, 1))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFilters, "column: {column:?}");
    }
    assert_eq!(row_count(&db, "todos"), 3);
}

#[test]
fn table_check_precedes_column_check() {
    let dir = tempfile::tempdir().unwrap();
    let db = todos_db(&dir);

    let err = DeleteEngine::default()
        .execute(&DeleteRequest::new(path_str(&db), "ghosts").filter("x;y", 1))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TableNotFound);
}

#[test]
fn values_are_bound_not_embedded() {
    let dir = tempfile::tempdir().unwrap();
    let db = todos_db(&dir);

    let outcome = DeleteEngine::default()
        .execute(&DeleteRequest::new(path_str(&db), "todos").filter("title", "x' OR '1'='1"))
        .unwrap();

    assert_eq!(outcome.deleted_count, 0);
    assert_eq!(row_count(&db, "todos"), 3);
}

#[test]
fn multiple_filters_are_anded() {
    let dir = tempfile::tempdir().unwrap();
    let db = todos_db(&dir);

    let outcome = DeleteEngine::default()
        .execute(
            &DeleteRequest::new(path_str(&db), "todos")
                .filter("done", 1)
                .filter("owner", "ana"),
        )
        .unwrap();

    assert_eq!(outcome.deleted_count, 1);
    assert_eq!(row_count(&db, "todos"), 2);
}

#[test]
fn null_filter_matches_no_rows() {
    let dir = tempfile::tempdir().unwrap();
    let db = todos_db(&dir);

    // `owner = NULL` is never true, even for the row whose owner is NULL
    let request = DeleteRequest::from_arguments(&json!({
        "db_path": path_str(&db),
        "table": "todos",
        "filters": {"owner": null}
    }))
    .unwrap();
    let outcome = DeleteEngine::default().execute(&request).unwrap();

    assert_eq!(outcome.deleted_count, 0);
    assert_eq!(row_count(&db, "todos"), 3);

    let outcome = DeleteEngine::default()
        .execute(
            &DeleteRequest::new(path_str(&db), "todos")
                .filter("done", 1)
                .filter("owner", FilterValue::Null),
        )
        .unwrap();
    assert_eq!(outcome.deleted_count, 0);
}

#[test]
fn out_of_range_integer_is_invalid_filter() {
    let dir = tempfile::tempdir().unwrap();
    let db = todos_db(&dir);

    let request = DeleteRequest::from_arguments(&json!({
        "db_path": path_str(&db),
        "table": "todos",
        "filters": {"id": 18_446_744_073_709_551_615_u64}
    }))
    .unwrap();

    let err = DeleteEngine::default().execute(&request).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidFilters);
    assert_eq!(row_count(&db, "todos"), 3);
}

#[test]
fn boolean_filter_binds_as_integer() {
    let dir = tempfile::tempdir().unwrap();
    let db = todos_db(&dir);

    let outcome = DeleteEngine::default()
        .execute(&DeleteRequest::new(path_str(&db), "todos").filter("done", false))
        .unwrap();

    assert_eq!(outcome.deleted_count, 1);
}

#[test]
fn unknown_column_is_sql_execution_error() {
    let dir = tempfile::tempdir().unwrap();
    let db = todos_db(&dir);

    let err = DeleteEngine::default()
        .execute(&DeleteRequest::new(path_str(&db), "todos").filter("priority", 1))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SqlExecutionError);
    assert!(err.message().contains("priority"));
    assert_eq!(row_count(&db, "todos"), 3);
}

// =============================================================================
// Storage
// =============================================================================

#[test]
fn missing_table() {
    let dir = tempfile::tempdir().unwrap();
    let db = todos_db(&dir);

    let err = DeleteEngine::default()
        .execute(&DeleteRequest::new(path_str(&db), "ghosts").filter("id", 1))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TableNotFound);
    assert!(err.to_string().starts_with("TABLE_NOT_FOUND: "));
}

#[test]
fn views_are_not_tables() {
    let dir = tempfile::tempdir().unwrap();
    let db = todos_db(&dir);
    Connection::open(&db)
        .unwrap()
        .execute_batch("CREATE VIEW open_todos AS SELECT * FROM todos WHERE done = 0;")
        .unwrap();

    let err = DeleteEngine::default()
        .execute(&DeleteRequest::new(path_str(&db), "open_todos").allow_full_table(true))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TableNotFound);
}

#[test]
fn table_names_with_quotes_are_quoted() {
    let dir = tempfile::tempdir().unwrap();
    let db = todos_db(&dir);
    Connection::open(&db)
        .unwrap()
        .execute_batch(
            r#"CREATE TABLE "odd""name" (v INTEGER);
               INSERT INTO "odd""name" VALUES (1), (2);"#,
        )
        .unwrap();

    let outcome = DeleteEngine::default()
        .execute(&DeleteRequest::new(path_str(&db), "odd\"name").filter("v", 2))
        .unwrap();
    assert_eq!(outcome.deleted_count, 1);
}

#[test]
fn file_that_is_not_a_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, "definitely not sqlite, just some plain text to fill a page").unwrap();

    let err = DeleteEngine::default()
        .execute(&DeleteRequest::new(path_str(&path), "todos").filter("id", 1))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SqlExecutionError);
}

#[test]
fn locked_database_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let db = todos_db(&dir);

    let holder = Connection::open(&db).unwrap();
    holder.execute_batch("BEGIN EXCLUSIVE;").unwrap();

    let engine = DeleteEngine::new(Duration::from_millis(50), Vec::new());
    let err = engine
        .execute(&DeleteRequest::new(path_str(&db), "todos").filter("done", 1))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SqlExecutionError);

    holder.execute_batch("ROLLBACK;").unwrap();
    assert_eq!(row_count(&db, "todos"), 3);
}

/// Counts this process's open file descriptors that point at `path`.
#[cfg(target_os = "linux")]
fn open_handles(path: &Path) -> usize {
    let target = std::fs::canonicalize(path).unwrap();
    std::fs::read_dir("/proc/self/fd")
        .unwrap()
        .filter_map(Result::ok)
        .filter_map(|entry| std::fs::read_link(entry.path()).ok())
        .filter(|link| *link == target)
        .count()
}

#[cfg(target_os = "linux")]
#[test]
fn connection_is_released_after_each_call() {
    let dir = tempfile::tempdir().unwrap();
    let db = todos_db(&dir);
    let engine = DeleteEngine::default();
    assert_eq!(open_handles(&db), 0);

    // Fails after the connection is opened
    let err = engine
        .execute(&DeleteRequest::new(path_str(&db), "ghosts").filter("id", 1))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TableNotFound);
    assert_eq!(open_handles(&db), 0);

    let err = engine
        .execute(&DeleteRequest::new(path_str(&db), "todos").filter("priority", 1))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SqlExecutionError);
    assert_eq!(open_handles(&db), 0);

    engine
        .execute(&DeleteRequest::new(path_str(&db), "todos").filter("done", 0))
        .unwrap();
    assert_eq!(open_handles(&db), 0);
}

// =============================================================================
// Allowed paths
// =============================================================================

#[test]
fn allowed_paths_permit_contained_files() {
    let dir = tempfile::tempdir().unwrap();
    let db = todos_db(&dir);

    let engine = DeleteEngine::new(Duration::from_secs(1), vec![dir.path().to_path_buf()]);
    let outcome = engine
        .execute(&DeleteRequest::new(path_str(&db), "todos").filter("done", 1))
        .unwrap();
    assert_eq!(outcome.deleted_count, 2);
}

#[test]
fn allowed_paths_reject_outside_files() {
    let dir = tempfile::tempdir().unwrap();
    let other = tempfile::tempdir().unwrap();
    let db = todos_db(&dir);

    let engine = DeleteEngine::new(Duration::from_secs(1), vec![other.path().to_path_buf()]);
    let err = engine
        .execute(&DeleteRequest::new(path_str(&db), "todos").filter("done", 1))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DbNotFound);
    assert!(!err.message().contains(&path_str(other.path())));
    assert_eq!(row_count(&db, "todos"), 3);
}
