//! Status transition audit rows. Identifiers come from `AUTOINCREMENT`, so
//! sequence order is id order.

use case_core::entities::{PendingTransition, StatusTransition};

use crate::error::DatabaseError;
use crate::helpers::{fmt_ts, get_datetime, get_metadata, get_opt_string, metadata_json, parse_enum};

const SELECT_COLS: &str = "id, case_id, from_status, to_status, reason, transitioned_at, metadata";

fn row_to_transition(row: &libsql::Row) -> Result<StatusTransition, DatabaseError> {
    Ok(StatusTransition {
        id: row.get::<i64>(0)?,
        case_id: row.get::<String>(1)?,
        from_status: get_opt_string(row, 2)?
            .map(|s| parse_enum(&s))
            .transpose()?,
        to_status: parse_enum(&row.get::<String>(3)?)?,
        reason: get_opt_string(row, 4)?,
        transitioned_at: get_datetime(row, 5)?,
        metadata: get_metadata(row, 6)?,
    })
}

/// Append one queued transition and return it with its assigned id.
pub(crate) async fn append(
    conn: &libsql::Connection,
    pending: &PendingTransition,
) -> Result<StatusTransition, DatabaseError> {
    conn.execute(
        "INSERT INTO case_status_transitions \
         (case_id, from_status, to_status, reason, transitioned_at, metadata) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        libsql::params![
            pending.case_id.as_str(),
            pending.from_status.map(|s| s.as_str()),
            pending.to_status.as_str(),
            pending.reason.as_deref(),
            fmt_ts(pending.transitioned_at),
            metadata_json(&pending.metadata)?
        ],
    )
    .await?;
    Ok(pending.clone().into_recorded(conn.last_insert_rowid()))
}

pub(crate) async fn load_for_case(
    conn: &libsql::Connection,
    case_id: &str,
) -> Result<Vec<StatusTransition>, DatabaseError> {
    let sql =
        format!("SELECT {SELECT_COLS} FROM case_status_transitions WHERE case_id = ?1 ORDER BY id");
    let mut rows = conn.query(&sql, [case_id]).await?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().await? {
        out.push(row_to_transition(&row)?);
    }
    Ok(out)
}
