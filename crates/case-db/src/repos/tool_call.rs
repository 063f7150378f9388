//! Agent tool call rows.

use case_core::entities::ToolCall;

use crate::error::DatabaseError;
use crate::helpers::{
    fmt_opt_ts, fmt_ts, get_datetime, get_json, get_metadata, get_opt_datetime, get_opt_json,
    get_opt_string, get_opt_u64, metadata_json, opt_json, parse_enum, to_sql_int,
};

const SELECT_COLS: &str = "id, case_id, tool_name, input, output, status, error_message, \
     duration_ms, started_at, completed_at, metadata";

const INSERT_SQL: &str = "INSERT INTO agent_tool_calls (id, case_id, tool_name, input, output, \
     status, error_message, duration_ms, started_at, completed_at, metadata) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)";

const UPSERT_TAIL: &str = "ON CONFLICT(id) DO UPDATE SET \
     output = excluded.output, status = excluded.status, \
     error_message = excluded.error_message, duration_ms = excluded.duration_ms, \
     completed_at = excluded.completed_at, metadata = excluded.metadata \
     WHERE agent_tool_calls.case_id = excluded.case_id";

fn row_to_tool_call(row: &libsql::Row) -> Result<ToolCall, DatabaseError> {
    Ok(ToolCall {
        id: row.get::<String>(0)?,
        case_id: row.get::<String>(1)?,
        tool_name: row.get::<String>(2)?,
        input: get_json(row, 3)?,
        output: get_opt_json(row, 4)?,
        status: parse_enum(&row.get::<String>(5)?)?,
        error_message: get_opt_string(row, 6)?,
        duration_ms: get_opt_u64(row, 7)?,
        started_at: get_datetime(row, 8)?,
        completed_at: get_opt_datetime(row, 9)?,
        metadata: get_metadata(row, 10)?,
    })
}

async fn write(conn: &libsql::Connection, sql: &str, c: &ToolCall) -> Result<(), DatabaseError> {
    let duration = c.duration_ms.map(to_sql_int).transpose()?;
    conn.execute(
        sql,
        libsql::params![
            c.id.as_str(),
            c.case_id.as_str(),
            c.tool_name.as_str(),
            serde_json::to_string(&c.input)?,
            opt_json(c.output.as_ref())?,
            c.status.as_str(),
            c.error_message.as_deref(),
            duration,
            fmt_ts(c.started_at),
            fmt_opt_ts(c.completed_at),
            metadata_json(&c.metadata)?
        ],
    )
    .await?;
    Ok(())
}

pub(crate) async fn insert(conn: &libsql::Connection, c: &ToolCall) -> Result<(), DatabaseError> {
    write(conn, INSERT_SQL, c).await
}

pub(crate) async fn upsert(conn: &libsql::Connection, c: &ToolCall) -> Result<(), DatabaseError> {
    write(conn, &format!("{INSERT_SQL} {UPSERT_TAIL}"), c).await
}

pub(crate) async fn load_for_case(
    conn: &libsql::Connection,
    case_id: &str,
) -> Result<Vec<ToolCall>, DatabaseError> {
    let sql = format!(
        "SELECT {SELECT_COLS} FROM agent_tool_calls WHERE case_id = ?1 ORDER BY started_at, rowid"
    );
    let mut rows = conn.query(&sql, [case_id]).await?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().await? {
        out.push(row_to_tool_call(&row)?);
    }
    Ok(out)
}

pub(crate) async fn load_one(
    conn: &libsql::Connection,
    case_id: &str,
    id: &str,
) -> Result<Option<ToolCall>, DatabaseError> {
    let sql = format!("SELECT {SELECT_COLS} FROM agent_tool_calls WHERE case_id = ?1 AND id = ?2");
    let mut rows = conn.query(&sql, [case_id, id]).await?;
    rows.next().await?.map(|row| row_to_tool_call(&row)).transpose()
}
