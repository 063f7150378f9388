//! Uploaded file metadata rows.

use case_core::entities::UploadedFile;

use crate::error::DatabaseError;
use crate::helpers::{
    fmt_opt_ts, fmt_ts, get_datetime, get_metadata, get_opt_datetime, get_opt_string, get_u64,
    metadata_json, parse_enum, to_sql_int,
};

const SELECT_COLS: &str = "id, case_id, filename, file_size, content_type, storage_path, \
     processing_status, processing_error, uploaded_at, processed_at, metadata";

const INSERT_SQL: &str = "INSERT INTO uploaded_files (id, case_id, filename, file_size, \
     content_type, storage_path, processing_status, processing_error, uploaded_at, \
     processed_at, metadata) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)";

const UPSERT_TAIL: &str = "ON CONFLICT(id) DO UPDATE SET \
     content_type = excluded.content_type, storage_path = excluded.storage_path, \
     processing_status = excluded.processing_status, \
     processing_error = excluded.processing_error, processed_at = excluded.processed_at, \
     metadata = excluded.metadata \
     WHERE uploaded_files.case_id = excluded.case_id";

fn row_to_file(row: &libsql::Row) -> Result<UploadedFile, DatabaseError> {
    Ok(UploadedFile {
        id: row.get::<String>(0)?,
        case_id: row.get::<String>(1)?,
        filename: row.get::<String>(2)?,
        file_size: get_u64(row, 3)?,
        content_type: get_opt_string(row, 4)?,
        storage_path: get_opt_string(row, 5)?,
        processing_status: parse_enum(&row.get::<String>(6)?)?,
        processing_error: get_opt_string(row, 7)?,
        uploaded_at: get_datetime(row, 8)?,
        processed_at: get_opt_datetime(row, 9)?,
        metadata: get_metadata(row, 10)?,
    })
}

async fn write(conn: &libsql::Connection, sql: &str, f: &UploadedFile) -> Result<(), DatabaseError> {
    conn.execute(
        sql,
        libsql::params![
            f.id.as_str(),
            f.case_id.as_str(),
            f.filename.as_str(),
            to_sql_int(f.file_size)?,
            f.content_type.as_deref(),
            f.storage_path.as_deref(),
            f.processing_status.as_str(),
            f.processing_error.as_deref(),
            fmt_ts(f.uploaded_at),
            fmt_opt_ts(f.processed_at),
            metadata_json(&f.metadata)?
        ],
    )
    .await?;
    Ok(())
}

pub(crate) async fn insert(conn: &libsql::Connection, f: &UploadedFile) -> Result<(), DatabaseError> {
    write(conn, INSERT_SQL, f).await
}

pub(crate) async fn upsert(conn: &libsql::Connection, f: &UploadedFile) -> Result<(), DatabaseError> {
    write(conn, &format!("{INSERT_SQL} {UPSERT_TAIL}"), f).await
}

pub(crate) async fn load_for_case(
    conn: &libsql::Connection,
    case_id: &str,
) -> Result<Vec<UploadedFile>, DatabaseError> {
    let sql = format!(
        "SELECT {SELECT_COLS} FROM uploaded_files WHERE case_id = ?1 ORDER BY uploaded_at, rowid"
    );
    let mut rows = conn.query(&sql, [case_id]).await?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().await? {
        out.push(row_to_file(&row)?);
    }
    Ok(out)
}

pub(crate) async fn load_one(
    conn: &libsql::Connection,
    case_id: &str,
    id: &str,
) -> Result<Option<UploadedFile>, DatabaseError> {
    let sql = format!("SELECT {SELECT_COLS} FROM uploaded_files WHERE case_id = ?1 AND id = ?2");
    let mut rows = conn.query(&sql, [case_id, id]).await?;
    rows.next().await?.map(|row| row_to_file(&row)).transpose()
}
