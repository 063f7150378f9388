//! Solution rows.

use case_core::entities::Solution;

use crate::error::DatabaseError;
use crate::helpers::{
    fmt_opt_ts, fmt_ts, get_datetime, get_metadata, get_opt_datetime, get_opt_string,
    metadata_json, parse_enum,
};

const SELECT_COLS: &str = "id, case_id, description, status, implementation_steps, risk_level, \
     estimated_effort, verification_result, verified_at, proposed_at, implemented_at, \
     updated_at, metadata";

const INSERT_SQL: &str = "INSERT INTO solutions (id, case_id, description, status, \
     implementation_steps, risk_level, estimated_effort, verification_result, verified_at, \
     proposed_at, implemented_at, updated_at, metadata) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)";

const UPSERT_TAIL: &str = "ON CONFLICT(id) DO UPDATE SET \
     description = excluded.description, status = excluded.status, \
     implementation_steps = excluded.implementation_steps, risk_level = excluded.risk_level, \
     estimated_effort = excluded.estimated_effort, \
     verification_result = excluded.verification_result, verified_at = excluded.verified_at, \
     implemented_at = excluded.implemented_at, updated_at = excluded.updated_at, \
     metadata = excluded.metadata \
     WHERE solutions.case_id = excluded.case_id";

fn row_to_solution(row: &libsql::Row) -> Result<Solution, DatabaseError> {
    Ok(Solution {
        id: row.get::<String>(0)?,
        case_id: row.get::<String>(1)?,
        description: row.get::<String>(2)?,
        status: parse_enum(&row.get::<String>(3)?)?,
        implementation_steps: serde_json::from_str(&row.get::<String>(4)?)?,
        risk_level: get_opt_string(row, 5)?
            .map(|s| parse_enum(&s))
            .transpose()?,
        estimated_effort: get_opt_string(row, 6)?,
        verification_result: get_opt_string(row, 7)?,
        verified_at: get_opt_datetime(row, 8)?,
        proposed_at: get_datetime(row, 9)?,
        implemented_at: get_opt_datetime(row, 10)?,
        updated_at: get_datetime(row, 11)?,
        metadata: get_metadata(row, 12)?,
    })
}

async fn write(conn: &libsql::Connection, sql: &str, s: &Solution) -> Result<(), DatabaseError> {
    conn.execute(
        sql,
        libsql::params![
            s.id.as_str(),
            s.case_id.as_str(),
            s.description.as_str(),
            s.status.as_str(),
            serde_json::to_string(&s.implementation_steps)?,
            s.risk_level.map(|r| r.as_str()),
            s.estimated_effort.as_deref(),
            s.verification_result.as_deref(),
            fmt_opt_ts(s.verified_at),
            fmt_ts(s.proposed_at),
            fmt_opt_ts(s.implemented_at),
            fmt_ts(s.updated_at),
            metadata_json(&s.metadata)?
        ],
    )
    .await?;
    Ok(())
}

pub(crate) async fn insert(conn: &libsql::Connection, s: &Solution) -> Result<(), DatabaseError> {
    write(conn, INSERT_SQL, s).await
}

pub(crate) async fn upsert(conn: &libsql::Connection, s: &Solution) -> Result<(), DatabaseError> {
    write(conn, &format!("{INSERT_SQL} {UPSERT_TAIL}"), s).await
}

pub(crate) async fn load_for_case(
    conn: &libsql::Connection,
    case_id: &str,
) -> Result<Vec<Solution>, DatabaseError> {
    let sql = format!(
        "SELECT {SELECT_COLS} FROM solutions WHERE case_id = ?1 ORDER BY proposed_at, rowid"
    );
    let mut rows = conn.query(&sql, [case_id]).await?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().await? {
        out.push(row_to_solution(&row)?);
    }
    Ok(out)
}

pub(crate) async fn load_one(
    conn: &libsql::Connection,
    case_id: &str,
    id: &str,
) -> Result<Option<Solution>, DatabaseError> {
    let sql = format!("SELECT {SELECT_COLS} FROM solutions WHERE case_id = ?1 AND id = ?2");
    let mut rows = conn.query(&sql, [case_id, id]).await?;
    rows.next().await?.map(|row| row_to_solution(&row)).transpose()
}
