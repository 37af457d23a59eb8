//! Construction of parameterised `DELETE` statements.
//!
//! Column names cannot be bound as parameters, so they are validated here
//! and only then embedded as quoted identifiers. Values are never embedded:
//! each one gets a `?` placeholder and travels in [`DeleteStatement::values`].

use indexmap::IndexMap;

use super::error::{DeleteError, DeleteResult};
use super::request::FilterValue;

/// Characters never allowed in a column name.
const FORBIDDEN_CHARS: [char; 3] = ['"', '\'', ';'];

/// A `DELETE` statement ready to execute.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStatement<'a> {
    /// SQL text with one placeholder per value.
    pub sql: String,
    /// Bound values in placeholder order.
    pub values: Vec<&'a FilterValue>,
}

/// Checks that a column name is safe to embed as a quoted identifier.
///
/// # Errors
///
/// Returns [`ErrorKind::InvalidFilters`](super::ErrorKind::InvalidFilters)
/// naming the column if it is empty or contains a quote, a semicolon or a
/// control character.
pub fn validate_column(column: &str) -> DeleteResult<()> {
    let unsafe_char = column
        .chars()
        .any(|c| FORBIDDEN_CHARS.contains(&c) || c.is_control());

    if column.is_empty() || unsafe_char {
        return Err(DeleteError::invalid_filters(format!(
            "invalid column name: {column:?}"
        )));
    }
    Ok(())
}

/// Quotes an identifier, doubling any embedded double quotes.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Builds the statement for `table` with `filters` AND-ed in order.
///
/// Every column is validated before any SQL text is assembled.
///
/// # Errors
///
/// Returns the first column validation failure.
pub fn build<'a>(
    table: &str,
    filters: &'a IndexMap<String, FilterValue>,
) -> DeleteResult<DeleteStatement<'a>> {
    for column in filters.keys() {
        validate_column(column)?;
    }

    let mut sql = format!("DELETE FROM {}", quote_identifier(table));
    let mut values = Vec::with_capacity(filters.len());

    if !filters.is_empty() {
        let conditions: Vec<String> = filters
            .iter()
            .map(|(column, value)| {
                values.push(value);
                format!("{} = ?", quote_identifier(column))
            })
            .collect();
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }

    Ok(DeleteStatement { sql, values })
}
