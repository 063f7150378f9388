//! Hypothesis rows and their ordered links to evidence.

use std::collections::HashMap;

use case_core::entities::Hypothesis;

use crate::error::DatabaseError;
use crate::helpers::{
    fmt_opt_ts, fmt_ts, get_datetime, get_metadata, get_opt_datetime, get_opt_string,
    metadata_json, parse_enum,
};

const SELECT_COLS: &str = "id, case_id, description, status, confidence, validation_result, \
     validated_at, proposed_at, updated_at, metadata";

const INSERT_SQL: &str = "INSERT INTO hypotheses (id, case_id, description, status, confidence, \
     validation_result, validated_at, proposed_at, updated_at, metadata) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)";

const UPSERT_TAIL: &str = "ON CONFLICT(id) DO UPDATE SET \
     description = excluded.description, status = excluded.status, \
     confidence = excluded.confidence, validation_result = excluded.validation_result, \
     validated_at = excluded.validated_at, updated_at = excluded.updated_at, \
     metadata = excluded.metadata \
     WHERE hypotheses.case_id = excluded.case_id";

/// Links are filled in separately by [`load_links`].
fn row_to_hypothesis(row: &libsql::Row) -> Result<Hypothesis, DatabaseError> {
    Ok(Hypothesis {
        id: row.get::<String>(0)?,
        case_id: row.get::<String>(1)?,
        description: row.get::<String>(2)?,
        status: parse_enum(&row.get::<String>(3)?)?,
        confidence: row.get::<Option<f64>>(4)?,
        supporting_evidence_ids: Vec::new(),
        validation_result: get_opt_string(row, 5)?,
        validated_at: get_opt_datetime(row, 6)?,
        proposed_at: get_datetime(row, 7)?,
        updated_at: get_datetime(row, 8)?,
        metadata: get_metadata(row, 9)?,
    })
}

async fn write(conn: &libsql::Connection, sql: &str, h: &Hypothesis) -> Result<(), DatabaseError> {
    conn.execute(
        sql,
        libsql::params![
            h.id.as_str(),
            h.case_id.as_str(),
            h.description.as_str(),
            h.status.as_str(),
            h.confidence,
            h.validation_result.as_deref(),
            fmt_opt_ts(h.validated_at),
            fmt_ts(h.proposed_at),
            fmt_ts(h.updated_at),
            metadata_json(&h.metadata)?
        ],
    )
    .await?;
    write_links(conn, h).await
}

/// Replace the evidence links of one hypothesis. The composite foreign key
/// rejects evidence that is missing or belongs to another case.
async fn write_links(conn: &libsql::Connection, h: &Hypothesis) -> Result<(), DatabaseError> {
    conn.execute(
        "DELETE FROM hypothesis_evidence WHERE case_id = ?1 AND hypothesis_id = ?2",
        [h.case_id.as_str(), h.id.as_str()],
    )
    .await?;
    for (position, evidence_id) in (0_i64..).zip(&h.supporting_evidence_ids) {
        conn.execute(
            "INSERT INTO hypothesis_evidence (hypothesis_id, case_id, evidence_id, position) \
             VALUES (?1, ?2, ?3, ?4)",
            libsql::params![
                h.id.as_str(),
                h.case_id.as_str(),
                evidence_id.as_str(),
                position
            ],
        )
        .await?;
    }
    Ok(())
}

pub(crate) async fn insert(conn: &libsql::Connection, h: &Hypothesis) -> Result<(), DatabaseError> {
    write(conn, INSERT_SQL, h).await
}

pub(crate) async fn upsert(conn: &libsql::Connection, h: &Hypothesis) -> Result<(), DatabaseError> {
    write(conn, &format!("{INSERT_SQL} {UPSERT_TAIL}"), h).await
}

/// Evidence ids per hypothesis of one case, in link order.
async fn load_links(
    conn: &libsql::Connection,
    case_id: &str,
) -> Result<HashMap<String, Vec<String>>, DatabaseError> {
    let mut rows = conn
        .query(
            "SELECT hypothesis_id, evidence_id FROM hypothesis_evidence \
             WHERE case_id = ?1 ORDER BY hypothesis_id, position",
            [case_id],
        )
        .await?;
    let mut links: HashMap<String, Vec<String>> = HashMap::new();
    while let Some(row) = rows.next().await? {
        links
            .entry(row.get::<String>(0)?)
            .or_default()
            .push(row.get::<String>(1)?);
    }
    Ok(links)
}

pub(crate) async fn load_for_case(
    conn: &libsql::Connection,
    case_id: &str,
) -> Result<Vec<Hypothesis>, DatabaseError> {
    let sql = format!(
        "SELECT {SELECT_COLS} FROM hypotheses WHERE case_id = ?1 ORDER BY proposed_at, rowid"
    );
    let mut rows = conn.query(&sql, [case_id]).await?;
    let mut links = load_links(conn, case_id).await?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().await? {
        let mut hyp = row_to_hypothesis(&row)?;
        hyp.supporting_evidence_ids = links.remove(&hyp.id).unwrap_or_default();
        out.push(hyp);
    }
    Ok(out)
}

pub(crate) async fn load_one(
    conn: &libsql::Connection,
    case_id: &str,
    id: &str,
) -> Result<Option<Hypothesis>, DatabaseError> {
    let sql = format!("SELECT {SELECT_COLS} FROM hypotheses WHERE case_id = ?1 AND id = ?2");
    let mut rows = conn.query(&sql, [case_id, id]).await?;
    let Some(row) = rows.next().await? else {
        return Ok(None);
    };
    let mut hyp = row_to_hypothesis(&row)?;
    let mut link_rows = conn
        .query(
            "SELECT evidence_id FROM hypothesis_evidence WHERE hypothesis_id = ?1 ORDER BY position",
            [id],
        )
        .await?;
    while let Some(link) = link_rows.next().await? {
        hyp.supporting_evidence_ids.push(link.get::<String>(0)?);
    }
    Ok(Some(hyp))
}
