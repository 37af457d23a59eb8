//! Typed `delete_rows` requests and their parsing from tool arguments.

use indexmap::IndexMap;
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};
use serde_json::{Map, Value};

use super::error::{DeleteError, DeleteResult};

/// Argument keys accepted by `delete_rows`.
const KNOWN_FIELDS: [&str; 4] = ["db_path", "table", "filters", "allow_full_table"];

/// A scalar value matched by equality against a column.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// Bound as NULL. `col = NULL` is never true, so this matches no row.
    Null,
    /// Bound as INTEGER 1 or 0.
    Bool(bool),
    /// Bound as INTEGER.
    Integer(i64),
    /// Bound as REAL.
    Real(f64),
    /// Bound as TEXT.
    Text(String),
}

impl FilterValue {
    /// Converts a JSON value.
    ///
    /// Returns `None` for arrays, objects and integers outside the `i64`
    /// range. Only numbers written as floats become [`FilterValue::Real`].
    #[must_use]
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Self::Null),
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Self::Integer(i)),
                None if n.is_f64() => n.as_f64().map(Self::Real),
                None => None,
            },
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }
}

impl ToSql for FilterValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Null => ToSqlOutput::Owned(SqlValue::Null),
            Self::Bool(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
            Self::Integer(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Self::Real(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            Self::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

impl From<bool> for FilterValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for FilterValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<i32> for FilterValue {
    fn from(i: i32) -> Self {
        Self::Integer(i64::from(i))
    }
}

impl From<f64> for FilterValue {
    fn from(f: f64) -> Self {
        Self::Real(f)
    }
}

impl From<&str> for FilterValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// The `filters` argument as received.
///
/// A malformed value is kept rather than rejected on parse so that the
/// engine can report it in its fixed validation order.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Filters {
    /// Absent or `null`.
    #[default]
    Absent,
    /// Equality conditions in caller order.
    Conditions(IndexMap<String, FilterValue>),
    /// Not a flat mapping of column names to scalars.
    Malformed {
        /// Why the value was rejected.
        reason: String,
    },
}

impl Filters {
    /// Returns `true` when no condition would restrict the delete.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Absent => true,
            Self::Conditions(conditions) => conditions.is_empty(),
            Self::Malformed { .. } => false,
        }
    }

    /// Parses a JSON `filters` value.
    #[must_use]
    pub fn from_json(value: &Value) -> Self {
        let Value::Object(object) = value else {
            if value.is_null() {
                return Self::Absent;
            }
            return Self::Malformed {
                reason: "filters must be an object mapping column names to values".to_string(),
            };
        };

        let mut conditions = IndexMap::with_capacity(object.len());
        for (column, raw) in object {
            let Some(value) = FilterValue::from_json(raw) else {
                let reason = if raw.is_number() {
                    format!("filter value for column {column:?} is out of range: {raw}")
                } else {
                    format!(
                        "filter value for column {column:?} must be a string, number, boolean or null"
                    )
                };
                return Self::Malformed { reason };
            };
            conditions.insert(column.clone(), value);
        }
        Self::Conditions(conditions)
    }
}

/// A request to delete rows from one table of a SQLite database file.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteRequest {
    /// Path to the database file.
    pub db_path: String,
    /// Table to delete from.
    pub table: String,
    /// Equality conditions, AND-ed together.
    pub filters: Filters,
    /// Must be `true` for a delete without conditions.
    pub allow_full_table: bool,
}

impl DeleteRequest {
    /// Creates a request with no filters and full-table deletes disallowed.
    #[must_use]
    pub fn new(db_path: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            table: table.into(),
            filters: Filters::Absent,
            allow_full_table: false,
        }
    }

    /// Adds an equality condition, replacing any malformed filters.
    #[must_use]
    pub fn filter(mut self, column: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        if let Filters::Conditions(conditions) = &mut self.filters {
            conditions.insert(column.into(), value.into());
        } else {
            let mut conditions = IndexMap::new();
            conditions.insert(column.into(), value.into());
            self.filters = Filters::Conditions(conditions);
        }
        self
    }

    /// Sets the full-table opt-in flag.
    #[must_use]
    pub fn allow_full_table(mut self, allow: bool) -> Self {
        self.allow_full_table = allow;
        self
    }

    /// Parses the untyped `delete_rows` tool arguments.
    ///
    /// Only the shape of the arguments is checked here. Emptiness, file
    /// existence and filter validity are left to the engine.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidInput`](super::ErrorKind::InvalidInput) if
    /// the arguments are not an object, contain unknown keys, or carry a
    /// field of the wrong type.
    pub fn from_arguments(arguments: &Value) -> DeleteResult<Self> {
        let empty = Map::new();
        let object = match arguments {
            Value::Object(object) => object,
            Value::Null => &empty,
            _ => {
                return Err(DeleteError::invalid_input(
                    "tool arguments must be an object",
                ))
            }
        };

        if let Some(unknown) = object
            .keys()
            .find(|key| !KNOWN_FIELDS.contains(&key.as_str()))
        {
            return Err(DeleteError::invalid_input(format!(
                "unknown parameter: {unknown}"
            )));
        }

        let allow_full_table = match object.get("allow_full_table") {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(_) => {
                return Err(DeleteError::invalid_input(
                    "allow_full_table must be a boolean",
                ))
            }
        };

        Ok(Self {
            db_path: string_field(object, "db_path")?,
            table: string_field(object, "table")?,
            filters: object
                .get("filters")
                .map_or(Filters::Absent, Filters::from_json),
            allow_full_table,
        })
    }
}

/// Reads an optional string field, treating absent and `null` as empty.
fn string_field(object: &Map<String, Value>, name: &str) -> DeleteResult<String> {
    match object.get(name) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(DeleteError::invalid_input(format!(
            "{name} must be a string"
        ))),
    }
}
