//! Evidence rows.

use case_core::entities::Evidence;

use crate::error::DatabaseError;
use crate::helpers::{
    fmt_ts, get_datetime, get_metadata, get_opt_string, get_opt_u64, metadata_json, parse_enum,
    to_sql_int,
};

pub(crate) const SELECT_COLS: &str = "id, case_id, category, summary, preprocessed_content, \
     content_ref, filename, file_size, uploaded_at, metadata";

const INSERT_SQL: &str = "INSERT INTO evidence (id, case_id, category, summary, preprocessed_content, \
     content_ref, filename, file_size, uploaded_at, metadata) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)";

const UPSERT_TAIL: &str = "ON CONFLICT(id) DO UPDATE SET \
     category = excluded.category, summary = excluded.summary, \
     preprocessed_content = excluded.preprocessed_content, content_ref = excluded.content_ref, \
     filename = excluded.filename, file_size = excluded.file_size, metadata = excluded.metadata \
     WHERE evidence.case_id = excluded.case_id";

pub(crate) fn row_to_evidence(row: &libsql::Row) -> Result<Evidence, DatabaseError> {
    Ok(Evidence {
        id: row.get::<String>(0)?,
        case_id: row.get::<String>(1)?,
        category: parse_enum(&row.get::<String>(2)?)?,
        summary: row.get::<String>(3)?,
        preprocessed_content: row.get::<String>(4)?,
        content_ref: get_opt_string(row, 5)?,
        filename: get_opt_string(row, 6)?,
        file_size: get_opt_u64(row, 7)?,
        uploaded_at: get_datetime(row, 8)?,
        metadata: get_metadata(row, 9)?,
    })
}

async fn write(conn: &libsql::Connection, sql: &str, e: &Evidence) -> Result<(), DatabaseError> {
    let file_size = e.file_size.map(to_sql_int).transpose()?;
    conn.execute(
        sql,
        libsql::params![
            e.id.as_str(),
            e.case_id.as_str(),
            e.category.as_str(),
            e.summary.as_str(),
            e.preprocessed_content.as_str(),
            e.content_ref.as_deref(),
            e.filename.as_deref(),
            file_size,
            fmt_ts(e.uploaded_at),
            metadata_json(&e.metadata)?
        ],
    )
    .await?;
    Ok(())
}

/// Insert a new row. A duplicate id is a constraint violation.
pub(crate) async fn insert(conn: &libsql::Connection, e: &Evidence) -> Result<(), DatabaseError> {
    write(conn, INSERT_SQL, e).await
}

/// Insert or refresh a row of the same case.
pub(crate) async fn upsert(conn: &libsql::Connection, e: &Evidence) -> Result<(), DatabaseError> {
    write(conn, &format!("{INSERT_SQL} {UPSERT_TAIL}"), e).await
}

pub(crate) async fn load_for_case(
    conn: &libsql::Connection,
    case_id: &str,
) -> Result<Vec<Evidence>, DatabaseError> {
    let sql =
        format!("SELECT {SELECT_COLS} FROM evidence WHERE case_id = ?1 ORDER BY uploaded_at, rowid");
    let mut rows = conn.query(&sql, [case_id]).await?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().await? {
        out.push(row_to_evidence(&row)?);
    }
    Ok(out)
}

pub(crate) async fn load_one(
    conn: &libsql::Connection,
    case_id: &str,
    id: &str,
) -> Result<Option<Evidence>, DatabaseError> {
    let sql = format!("SELECT {SELECT_COLS} FROM evidence WHERE case_id = ?1 AND id = ?2");
    let mut rows = conn.query(&sql, [case_id, id]).await?;
    rows.next().await?.map(|row| row_to_evidence(&row)).transpose()
}

/// Full-text search within one case, best match first.
pub(crate) async fn search(
    conn: &libsql::Connection,
    case_id: &str,
    fts: &str,
    limit: u32,
) -> Result<Vec<Evidence>, DatabaseError> {
    let sql = format!(
        "SELECT {} FROM evidence_fts JOIN evidence e ON e.rowid = evidence_fts.rowid \
         WHERE evidence_fts MATCH ?1 AND e.case_id = ?2 ORDER BY rank LIMIT ?3",
        prefixed("e")
    );
    let mut rows = conn
        .query(&sql, libsql::params![fts, case_id, i64::from(limit)])
        .await?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().await? {
        out.push(row_to_evidence(&row)?);
    }
    Ok(out)
}

fn prefixed(alias: &str) -> String {
    SELECT_COLS
        .split(", ")
        .map(|c| format!("{alias}.{}", c.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}
