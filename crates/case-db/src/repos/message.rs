//! Conversation message rows. Append-only: never updated, never deleted
//! except by case cascade.

use case_core::entities::CaseMessage;

use crate::error::DatabaseError;
use crate::helpers::{fmt_ts, get_datetime, get_metadata, metadata_json, parse_enum};

const SELECT_COLS: &str = "id, case_id, role, content, timestamp, metadata";

const INSERT_SQL: &str = "INSERT INTO case_messages (id, case_id, role, content, timestamp, metadata) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)";

fn row_to_message(row: &libsql::Row) -> Result<CaseMessage, DatabaseError> {
    Ok(CaseMessage {
        id: row.get::<String>(0)?,
        case_id: row.get::<String>(1)?,
        role: parse_enum(&row.get::<String>(2)?)?,
        content: row.get::<String>(3)?,
        timestamp: get_datetime(row, 4)?,
        metadata: get_metadata(row, 5)?,
    })
}

async fn write(conn: &libsql::Connection, sql: &str, m: &CaseMessage) -> Result<(), DatabaseError> {
    conn.execute(
        sql,
        libsql::params![
            m.id.as_str(),
            m.case_id.as_str(),
            m.role.as_str(),
            m.content.as_str(),
            fmt_ts(m.timestamp),
            metadata_json(&m.metadata)?
        ],
    )
    .await?;
    Ok(())
}

pub(crate) async fn insert(conn: &libsql::Connection, m: &CaseMessage) -> Result<(), DatabaseError> {
    write(conn, INSERT_SQL, m).await
}

/// Insert unless a message with this id already exists. Stored messages are
/// never rewritten.
pub(crate) async fn insert_new(
    conn: &libsql::Connection,
    m: &CaseMessage,
) -> Result<(), DatabaseError> {
    write(conn, &format!("{INSERT_SQL} ON CONFLICT(id) DO NOTHING"), m).await
}

pub(crate) async fn load_for_case(
    conn: &libsql::Connection,
    case_id: &str,
) -> Result<Vec<CaseMessage>, DatabaseError> {
    let sql = format!(
        "SELECT {SELECT_COLS} FROM case_messages WHERE case_id = ?1 ORDER BY timestamp, rowid"
    );
    let mut rows = conn.query(&sql, [case_id]).await?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().await? {
        out.push(row_to_message(&row)?);
    }
    Ok(out)
}

pub(crate) async fn list_page(
    conn: &libsql::Connection,
    case_id: &str,
    limit: u32,
    offset: u32,
) -> Result<Vec<CaseMessage>, DatabaseError> {
    let sql = format!(
        "SELECT {SELECT_COLS} FROM case_messages WHERE case_id = ?1 \
         ORDER BY timestamp, rowid LIMIT ?2 OFFSET ?3"
    );
    let mut rows = conn
        .query(
            &sql,
            libsql::params![case_id, i64::from(limit), i64::from(offset)],
        )
        .await?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().await? {
        out.push(row_to_message(&row)?);
    }
    Ok(out)
}
