//! Row-to-entity parsing helpers and value encoders.
//!
//! Every repo converts `libsql::Row` (column-indexed) into typed entities and
//! back. Timestamps are written as fixed-width RFC 3339 with microseconds and
//! a `Z` suffix so lexical order in SQL equals chronological order.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;

use case_core::entities::Metadata;

use crate::error::DatabaseError;

/// Encode a timestamp for storage.
#[must_use]
pub fn fmt_ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Encode an optional timestamp for storage.
#[must_use]
pub fn fmt_opt_ts(at: Option<DateTime<Utc>>) -> Option<String> {
    at.map(fmt_ts)
}

/// Parse a required TEXT column as `DateTime<Utc>`.
///
/// Handles both RFC 3339 and `SQLite`'s default `datetime('now')` format, so
/// rows written by hand in a shell still load.
///
/// # Errors
///
/// Returns `DatabaseError::Query` if the string cannot be parsed as either format.
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|e| DatabaseError::Query(format!("Failed to parse datetime '{s}': {e}")))
}

/// Parse an optional TEXT column as `Option<DateTime<Utc>>`.
///
/// # Errors
///
/// Returns `DatabaseError::Query` if a non-empty string cannot be parsed.
pub fn parse_optional_datetime(s: Option<&str>) -> Result<Option<DateTime<Utc>>, DatabaseError> {
    match s {
        Some(s) if !s.is_empty() => Ok(Some(parse_datetime(s)?)),
        _ => Ok(None),
    }
}

/// Read a required timestamp column.
///
/// # Errors
///
/// Returns `DatabaseError` if the column is NULL or unparseable.
pub fn get_datetime(row: &libsql::Row, idx: i32) -> Result<DateTime<Utc>, DatabaseError> {
    parse_datetime(&row.get::<String>(idx)?)
}

/// Read a nullable timestamp column.
///
/// # Errors
///
/// Returns `DatabaseError` if a present value is unparseable.
pub fn get_opt_datetime(
    row: &libsql::Row,
    idx: i32,
) -> Result<Option<DateTime<Utc>>, DatabaseError> {
    parse_optional_datetime(get_opt_string(row, idx)?.as_deref())
}

/// Parse a TEXT column into one of the case-core enums.
///
/// # Errors
///
/// Returns `DatabaseError::Query` if the string does not match any variant.
pub fn parse_enum<T: DeserializeOwned>(s: &str) -> Result<T, DatabaseError> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .map_err(|e| DatabaseError::Query(format!("Failed to parse enum from '{s}': {e}")))
}

/// Read a nullable TEXT column. Returns `None` for both SQL NULL and empty string.
///
/// `row.get::<String>(idx)` on a NULL column returns an error, not `""`.
///
/// # Errors
///
/// Returns `DatabaseError` if the column read fails.
pub fn get_opt_string(row: &libsql::Row, idx: i32) -> Result<Option<String>, DatabaseError> {
    match row.get::<Option<String>>(idx)? {
        Some(s) if s.is_empty() => Ok(None),
        other => Ok(other),
    }
}

/// Read a non-negative INTEGER column as `u32`.
///
/// # Errors
///
/// Returns `DatabaseError::InvalidState` for negative or oversized values.
pub fn get_u32(row: &libsql::Row, idx: i32) -> Result<u32, DatabaseError> {
    let raw = row.get::<i64>(idx)?;
    u32::try_from(raw)
        .map_err(|_| DatabaseError::InvalidState(format!("column {idx} out of range: {raw}")))
}

/// Read a non-negative INTEGER column as `u64`.
///
/// # Errors
///
/// Returns `DatabaseError::InvalidState` for negative values.
pub fn get_u64(row: &libsql::Row, idx: i32) -> Result<u64, DatabaseError> {
    to_u64(row.get::<i64>(idx)?)
}

/// Read a nullable non-negative INTEGER column as `u64`.
///
/// # Errors
///
/// Returns `DatabaseError::InvalidState` for negative values.
pub fn get_opt_u64(row: &libsql::Row, idx: i32) -> Result<Option<u64>, DatabaseError> {
    row.get::<Option<i64>>(idx)?.map(to_u64).transpose()
}

fn to_u64(raw: i64) -> Result<u64, DatabaseError> {
    u64::try_from(raw).map_err(|_| DatabaseError::InvalidState(format!("negative count: {raw}")))
}

/// Encode a `u64` for an INTEGER column.
///
/// # Errors
///
/// Returns `DatabaseError::InvalidState` if the value exceeds `i64::MAX`.
pub fn to_sql_int(value: u64) -> Result<i64, DatabaseError> {
    i64::try_from(value).map_err(|_| DatabaseError::InvalidState(format!("value too large: {value}")))
}

/// Parse a required JSON TEXT column.
///
/// # Errors
///
/// Returns `DatabaseError::Query` for invalid JSON.
pub fn get_json(row: &libsql::Row, idx: i32) -> Result<serde_json::Value, DatabaseError> {
    Ok(serde_json::from_str(&row.get::<String>(idx)?)?)
}

/// Parse a nullable JSON TEXT column.
///
/// # Errors
///
/// Returns `DatabaseError::Query` if a non-empty string contains invalid JSON.
pub fn get_opt_json(
    row: &libsql::Row,
    idx: i32,
) -> Result<Option<serde_json::Value>, DatabaseError> {
    match get_opt_string(row, idx)? {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

/// Parse a metadata column. Anything but an object is corrupt data.
///
/// # Errors
///
/// Returns `DatabaseError::InvalidState` if the column is not a JSON object.
pub fn get_metadata(row: &libsql::Row, idx: i32) -> Result<Metadata, DatabaseError> {
    match get_json(row, idx)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(DatabaseError::InvalidState(format!(
            "metadata column holds non-object: {other}"
        ))),
    }
}

/// Encode a metadata bag.
///
/// # Errors
///
/// Returns `DatabaseError::Query` if serialization fails.
pub fn metadata_json(metadata: &Metadata) -> Result<String, DatabaseError> {
    Ok(serde_json::to_string(metadata)?)
}

/// Encode an optional JSON value.
///
/// # Errors
///
/// Returns `DatabaseError::Query` if serialization fails.
pub fn opt_json(value: Option<&serde_json::Value>) -> Result<Option<String>, DatabaseError> {
    value.map(serde_json::to_string).transpose().map_err(Into::into)
}

/// Turn free text into an FTS5 query that matches every word literally.
///
/// Each whitespace-separated token is double-quoted (inner quotes doubled),
/// so operators and punctuation in user input never reach the FTS parser.
#[must_use]
pub fn fts_query(input: &str) -> Option<String> {
    let terms: Vec<String> = input
        .split_whitespace()
        .map(|t| format!("\"{}\"", t.replace('"', "\"\"")))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}
