//! Case tag rows.

use chrono::{DateTime, Utc};

use crate::error::DatabaseError;
use crate::helpers::fmt_ts;

/// Add a tag. Returns false if the case already carried it.
pub(crate) async fn add(
    conn: &libsql::Connection,
    case_id: &str,
    tag: &str,
    at: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    let inserted = conn
        .execute(
            "INSERT INTO case_tags (case_id, tag, created_at) VALUES (?1, ?2, ?3) \
             ON CONFLICT(case_id, tag) DO NOTHING",
            libsql::params![case_id, tag, fmt_ts(at)],
        )
        .await?;
    Ok(inserted > 0)
}

/// Remove a tag. Returns false if the case did not carry it.
pub(crate) async fn remove(
    conn: &libsql::Connection,
    case_id: &str,
    tag: &str,
) -> Result<bool, DatabaseError> {
    let removed = conn
        .execute(
            "DELETE FROM case_tags WHERE case_id = ?1 AND tag = ?2",
            [case_id, tag],
        )
        .await?;
    Ok(removed > 0)
}

pub(crate) async fn load_for_case(
    conn: &libsql::Connection,
    case_id: &str,
) -> Result<Vec<String>, DatabaseError> {
    let mut rows = conn
        .query(
            "SELECT tag FROM case_tags WHERE case_id = ?1 ORDER BY tag",
            [case_id],
        )
        .await?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().await? {
        out.push(row.get::<String>(0)?);
    }
    Ok(out)
}
