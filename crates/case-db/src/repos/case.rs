//! The core case row and whole-aggregate reads and writes.
//!
//! Functions here run on a connection that already holds the unit-of-work
//! transaction; see [`super::LibSqlCaseRepository`].

use chrono::{DateTime, Utc};
use serde_json::Value;

use case_core::entities::{Case, ChildKind, StatusTransition};
use case_core::enums::{CaseStatus, PhaseKind};
use case_core::errors::CaseError;
use case_core::phases::{PhaseDocuments, check_phase};

use super::{evidence, hypothesis, message, solution, tag, tool_call, transition, uploaded_file};
use crate::error::DatabaseError;
use crate::helpers::{
    fmt_opt_ts, fmt_ts, get_datetime, get_json, get_metadata, get_opt_datetime, get_opt_json,
    get_u32, get_u64, metadata_json, opt_json, parse_enum, to_sql_int,
};
use crate::repository::{CaseFilter, CasePage};

const CASE_COLS: &str = "id, owner_id, org_id, title, description, status, current_turn, \
     turns_without_progress, consulting, problem_verification, working_conclusion, \
     root_cause_conclusion, path_selection, degraded_mode, escalation_state, documentation, \
     progress, metadata, version, created_at, updated_at, last_activity_at, resolved_at, closed_at";

/// Core fields only; child collections are left empty.
fn row_to_case(row: &libsql::Row) -> Result<Case, DatabaseError> {
    Ok(Case {
        id: row.get::<String>(0)?,
        owner_id: row.get::<String>(1)?,
        org_id: row.get::<String>(2)?,
        title: row.get::<String>(3)?,
        description: row.get::<String>(4)?,
        status: parse_enum(&row.get::<String>(5)?)?,
        current_turn: get_u32(row, 6)?,
        turns_without_progress: get_u32(row, 7)?,
        phases: PhaseDocuments {
            consulting: get_json(row, 8)?,
            problem_verification: get_opt_json(row, 9)?,
            working_conclusion: get_opt_json(row, 10)?,
            root_cause_conclusion: get_opt_json(row, 11)?,
            path_selection: get_opt_json(row, 12)?,
            degraded_mode: get_opt_json(row, 13)?,
            escalation_state: get_opt_json(row, 14)?,
            documentation: get_json(row, 15)?,
            progress: get_json(row, 16)?,
        },
        metadata: get_metadata(row, 17)?,
        version: get_u64(row, 18)?,
        created_at: get_datetime(row, 19)?,
        updated_at: get_datetime(row, 20)?,
        last_activity_at: get_datetime(row, 21)?,
        resolved_at: get_opt_datetime(row, 22)?,
        closed_at: get_opt_datetime(row, 23)?,
        evidence: Vec::new(),
        hypotheses: Vec::new(),
        solutions: Vec::new(),
        uploaded_files: Vec::new(),
        messages: Vec::new(),
        status_history: Vec::new(),
        tags: Vec::new(),
        tool_calls: Vec::new(),
        pending_transitions: Vec::new(),
    })
}

async fn insert_core(conn: &libsql::Connection, case: &Case) -> Result<(), DatabaseError> {
    let p = &case.phases;
    conn.execute(
        "INSERT INTO cases (id, owner_id, org_id, title, description, status, current_turn, \
         turns_without_progress, consulting, problem_verification, working_conclusion, \
         root_cause_conclusion, path_selection, degraded_mode, escalation_state, documentation, \
         progress, metadata, version, created_at, updated_at, last_activity_at, resolved_at, \
         closed_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, \
         ?18, 1, ?19, ?20, ?21, ?22, ?23)",
        libsql::params![
            case.id.as_str(),
            case.owner_id.as_str(),
            case.org_id.as_str(),
            case.title.as_str(),
            case.description.as_str(),
            case.status.as_str(),
            i64::from(case.current_turn),
            i64::from(case.turns_without_progress),
            serde_json::to_string(&p.consulting)?,
            opt_json(p.problem_verification.as_ref())?,
            opt_json(p.working_conclusion.as_ref())?,
            opt_json(p.root_cause_conclusion.as_ref())?,
            opt_json(p.path_selection.as_ref())?,
            opt_json(p.degraded_mode.as_ref())?,
            opt_json(p.escalation_state.as_ref())?,
            serde_json::to_string(&p.documentation)?,
            serde_json::to_string(&p.progress)?,
            metadata_json(&case.metadata)?,
            fmt_ts(case.created_at),
            fmt_ts(case.updated_at),
            fmt_ts(case.last_activity_at),
            fmt_opt_ts(case.resolved_at),
            fmt_opt_ts(case.closed_at)
        ],
    )
    .await?;
    Ok(())
}

/// Compare-and-swap the core row on `case.version`. Returns false if the
/// stored version moved on.
async fn update_core(conn: &libsql::Connection, case: &Case) -> Result<bool, DatabaseError> {
    let p = &case.phases;
    let updated = conn
        .execute(
            "UPDATE cases SET org_id = ?1, title = ?2, description = ?3, status = ?4, \
             current_turn = ?5, turns_without_progress = ?6, consulting = ?7, \
             problem_verification = ?8, working_conclusion = ?9, root_cause_conclusion = ?10, \
             path_selection = ?11, degraded_mode = ?12, escalation_state = ?13, \
             documentation = ?14, progress = ?15, metadata = ?16, updated_at = ?17, \
             last_activity_at = MAX(last_activity_at, ?18), resolved_at = ?19, closed_at = ?20, \
             version = version + 1 \
             WHERE id = ?21 AND version = ?22",
            libsql::params![
                case.org_id.as_str(),
                case.title.as_str(),
                case.description.as_str(),
                case.status.as_str(),
                i64::from(case.current_turn),
                i64::from(case.turns_without_progress),
                serde_json::to_string(&p.consulting)?,
                opt_json(p.problem_verification.as_ref())?,
                opt_json(p.working_conclusion.as_ref())?,
                opt_json(p.root_cause_conclusion.as_ref())?,
                opt_json(p.path_selection.as_ref())?,
                opt_json(p.degraded_mode.as_ref())?,
                opt_json(p.escalation_state.as_ref())?,
                serde_json::to_string(&p.documentation)?,
                serde_json::to_string(&p.progress)?,
                metadata_json(&case.metadata)?,
                fmt_ts(case.updated_at),
                fmt_ts(case.last_activity_at),
                fmt_opt_ts(case.resolved_at),
                fmt_opt_ts(case.closed_at),
                case.id.as_str(),
                to_sql_int(case.version)?
            ],
        )
        .await?;
    Ok(updated > 0)
}

/// Load the core row and every child collection.
pub(crate) async fn load(
    conn: &libsql::Connection,
    case_id: &str,
) -> Result<Option<Case>, DatabaseError> {
    let sql = format!("SELECT {CASE_COLS} FROM cases WHERE id = ?1");
    let mut rows = conn.query(&sql, [case_id]).await?;
    let Some(row) = rows.next().await? else {
        return Ok(None);
    };
    let mut case = row_to_case(&row)?;
    drop(rows);

    case.evidence = evidence::load_for_case(conn, case_id).await?;
    case.hypotheses = hypothesis::load_for_case(conn, case_id).await?;
    case.solutions = solution::load_for_case(conn, case_id).await?;
    case.uploaded_files = uploaded_file::load_for_case(conn, case_id).await?;
    case.messages = message::load_for_case(conn, case_id).await?;
    case.status_history = transition::load_for_case(conn, case_id).await?;
    case.tags = tag::load_for_case(conn, case_id).await?;
    case.tool_calls = tool_call::load_for_case(conn, case_id).await?;
    Ok(Some(case))
}

pub(crate) async fn load_required(
    conn: &libsql::Connection,
    case_id: &str,
) -> Result<Case, DatabaseError> {
    load(conn, case_id)
        .await?
        .ok_or_else(|| CaseError::case_not_found(case_id).into())
}

/// Fail with `NotFound` unless the case row exists.
pub(crate) async fn ensure_exists(
    conn: &libsql::Connection,
    case_id: &str,
) -> Result<(), DatabaseError> {
    let mut rows = conn
        .query("SELECT 1 FROM cases WHERE id = ?1", [case_id])
        .await?;
    if rows.next().await?.is_some() {
        Ok(())
    } else {
        Err(CaseError::case_not_found(case_id).into())
    }
}

pub(crate) async fn owner_of(
    conn: &libsql::Connection,
    case_id: &str,
) -> Result<String, DatabaseError> {
    let mut rows = conn
        .query("SELECT owner_id FROM cases WHERE id = ?1", [case_id])
        .await?;
    match rows.next().await? {
        Some(row) => Ok(row.get::<String>(0)?),
        None => Err(CaseError::case_not_found(case_id).into()),
    }
}

async fn append_transitions(
    conn: &libsql::Connection,
    case: &Case,
) -> Result<Vec<StatusTransition>, DatabaseError> {
    let mut recorded = Vec::with_capacity(case.pending_transitions.len());
    for pending in &case.pending_transitions {
        recorded.push(transition::append(conn, pending).await?);
    }
    Ok(recorded)
}

/// Insert a new case with every child and its queued initial transition.
pub(crate) async fn create(conn: &libsql::Connection, case: &Case) -> Result<Case, DatabaseError> {
    case.validate()?;
    match case.pending_transitions.first() {
        Some(first) if first.from_status.is_none() => {}
        _ => {
            return Err(CaseError::Validation(format!(
                "case {} must be created with its initial transition queued",
                case.id
            ))
            .into());
        }
    }

    insert_core(conn, case).await?;
    for ev in &case.evidence {
        evidence::insert(conn, ev).await?;
    }
    for hyp in &case.hypotheses {
        hypothesis::insert(conn, hyp).await?;
    }
    for sol in &case.solutions {
        solution::insert(conn, sol).await?;
    }
    for file in &case.uploaded_files {
        uploaded_file::insert(conn, file).await?;
    }
    for msg in &case.messages {
        message::insert(conn, msg).await?;
    }
    for call in &case.tool_calls {
        tool_call::insert(conn, call).await?;
    }
    for t in &case.tags {
        tag::add(conn, &case.id, t, case.created_at).await?;
    }
    append_transitions(conn, case).await?;

    load_required(conn, &case.id).await
}

/// Write the full state of a loaded case, checking its version first.
pub(crate) async fn save(
    conn: &libsql::Connection,
    case: &Case,
    now: DateTime<Utc>,
) -> Result<Case, DatabaseError> {
    case.validate()?;

    let mut rows = conn
        .query("SELECT version, status FROM cases WHERE id = ?1", [case.id.as_str()])
        .await?;
    let Some(row) = rows.next().await? else {
        return Err(CaseError::case_not_found(&case.id).into());
    };
    let stored_version = get_u64(&row, 0)?;
    let stored_status: CaseStatus = parse_enum(&row.get::<String>(1)?)?;
    drop(rows);

    if stored_version != case.version {
        return Err(stale(case, stored_version).into());
    }
    match case.pending_transitions.first() {
        None if stored_status != case.status => {
            return Err(CaseError::Validation(format!(
                "case {} status changed from {stored_status} to {} without a transition",
                case.id, case.status
            ))
            .into());
        }
        Some(first) if first.from_status != Some(stored_status) => {
            return Err(CaseError::Conflict(format!(
                "case {} is {stored_status}, transition expected it to be {}",
                case.id,
                first
                    .from_status
                    .map_or_else(|| "new".to_string(), |s| s.to_string())
            ))
            .into());
        }
        _ => {}
    }

    if !update_core(conn, case).await? {
        return Err(stale(case, stored_version).into());
    }
    append_transitions(conn, case).await?;

    for ev in &case.evidence {
        check_child_owner(conn, ChildKind::Evidence, &ev.id, &case.id).await?;
        evidence::upsert(conn, ev).await?;
    }
    for hyp in &case.hypotheses {
        check_child_owner(conn, ChildKind::Hypothesis, &hyp.id, &case.id).await?;
        hypothesis::upsert(conn, hyp).await?;
    }
    for sol in &case.solutions {
        check_child_owner(conn, ChildKind::Solution, &sol.id, &case.id).await?;
        solution::upsert(conn, sol).await?;
    }
    for file in &case.uploaded_files {
        check_child_owner(conn, ChildKind::UploadedFile, &file.id, &case.id).await?;
        uploaded_file::upsert(conn, file).await?;
    }
    for msg in &case.messages {
        check_child_owner(conn, ChildKind::Message, &msg.id, &case.id).await?;
        message::insert_new(conn, msg).await?;
    }
    for call in &case.tool_calls {
        check_child_owner(conn, ChildKind::ToolCall, &call.id, &case.id).await?;
        tool_call::upsert(conn, call).await?;
    }
    for t in &case.tags {
        tag::add(conn, &case.id, t, now).await?;
    }

    load_required(conn, &case.id).await
}

/// Child ids are unique per table across cases; a snapshot child whose id
/// is already taken by another case is a collision, not an upsert.
async fn check_child_owner(
    conn: &libsql::Connection,
    kind: ChildKind,
    id: &str,
    case_id: &str,
) -> Result<(), DatabaseError> {
    // Table names come from the fixed `ChildKind` mapping.
    let sql = format!("SELECT case_id FROM {} WHERE id = ?1", kind.table());
    let mut rows = conn.query(&sql, [id]).await?;
    if let Some(row) = rows.next().await? {
        let owner = row.get::<String>(0)?;
        if owner != case_id {
            return Err(CaseError::Conflict(format!(
                "{kind} {id} already belongs to another case"
            ))
            .into());
        }
    }
    Ok(())
}

fn stale(case: &Case, stored_version: u64) -> CaseError {
    CaseError::Conflict(format!(
        "case {} was modified concurrently (have version {}, stored version {stored_version})",
        case.id, case.version
    ))
}

pub(crate) async fn delete(conn: &libsql::Connection, case_id: &str) -> Result<(), DatabaseError> {
    let removed = conn
        .execute("DELETE FROM cases WHERE id = ?1", [case_id])
        .await?;
    if removed == 0 {
        return Err(CaseError::case_not_found(case_id).into());
    }
    Ok(())
}

pub(crate) async fn update_phase(
    conn: &libsql::Connection,
    case_id: &str,
    phase: PhaseKind,
    document: Option<&Value>,
    now: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    check_phase(phase, document)?;
    // Column names are the fixed `PhaseKind` identifiers, never user input.
    let sql = format!(
        "UPDATE cases SET {} = ?1, updated_at = ?2, version = version + 1 WHERE id = ?3",
        phase.as_str()
    );
    let updated = conn
        .execute(
            &sql,
            libsql::params![opt_json(document)?, fmt_ts(now), case_id],
        )
        .await?;
    if updated == 0 {
        return Err(CaseError::case_not_found(case_id).into());
    }
    Ok(())
}

/// Move the version of a case whose children were changed in place, so
/// snapshots loaded before the change can no longer be saved over it.
pub(crate) async fn bump_version(
    conn: &libsql::Connection,
    case_id: &str,
    now: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let updated = conn
        .execute(
            "UPDATE cases SET version = version + 1, updated_at = ?1 WHERE id = ?2",
            libsql::params![fmt_ts(now), case_id],
        )
        .await?;
    if updated == 0 {
        return Err(CaseError::case_not_found(case_id).into());
    }
    Ok(())
}

pub(crate) async fn touch_activity(
    conn: &libsql::Connection,
    case_id: &str,
    at: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let updated = conn
        .execute(
            "UPDATE cases SET last_activity_at = MAX(last_activity_at, ?1) WHERE id = ?2",
            libsql::params![fmt_ts(at), case_id],
        )
        .await?;
    if updated == 0 {
        return Err(CaseError::case_not_found(case_id).into());
    }
    Ok(())
}

pub(crate) async fn count_created_since(
    conn: &libsql::Connection,
    owner_id: &str,
    since: DateTime<Utc>,
) -> Result<u64, DatabaseError> {
    let mut rows = conn
        .query(
            "SELECT COUNT(*) FROM cases WHERE owner_id = ?1 AND created_at >= ?2",
            libsql::params![owner_id, fmt_ts(since)],
        )
        .await?;
    let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
    get_u64(&row, 0)
}

async fn load_all(
    conn: &libsql::Connection,
    ids: &[String],
) -> Result<Vec<Case>, DatabaseError> {
    let mut cases = Vec::with_capacity(ids.len());
    for id in ids {
        // A row deleted between the id scan and the load simply drops out.
        if let Some(case) = load(conn, id).await? {
            cases.push(case);
        }
    }
    Ok(cases)
}

pub(crate) async fn list_by_owner(
    conn: &libsql::Connection,
    owner_id: &str,
    filter: &CaseFilter,
) -> Result<CasePage, DatabaseError> {
    let mut clauses = vec!["owner_id = ?1".to_string()];
    let mut params: Vec<libsql::Value> = vec![owner_id.into()];
    if let Some(status) = filter.status {
        params.push(status.as_str().into());
        clauses.push(format!("status = ?{}", params.len()));
    }
    if let Some(org_id) = &filter.org_id {
        params.push(org_id.as_str().into());
        clauses.push(format!("org_id = ?{}", params.len()));
    }
    if let Some(tag) = &filter.tag {
        params.push(tag.as_str().into());
        clauses.push(format!(
            "EXISTS (SELECT 1 FROM case_tags t WHERE t.case_id = cases.id AND t.tag = ?{})",
            params.len()
        ));
    }
    let where_sql = clauses.join(" AND ");

    let mut rows = conn
        .query(
            &format!("SELECT COUNT(*) FROM cases WHERE {where_sql}"),
            libsql::params_from_iter(params.clone()),
        )
        .await?;
    let total = get_u64(&rows.next().await?.ok_or(DatabaseError::NoResult)?, 0)?;
    drop(rows);

    // LIMIT -1 means no limit in SQLite.
    params.push(filter.limit.map_or(-1, i64::from).into());
    params.push(i64::from(filter.offset).into());
    let sql = format!(
        "SELECT id FROM cases WHERE {where_sql} ORDER BY updated_at DESC, id LIMIT ?{} OFFSET ?{}",
        params.len() - 1,
        params.len()
    );
    let mut rows = conn.query(&sql, libsql::params_from_iter(params)).await?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next().await? {
        ids.push(row.get::<String>(0)?);
    }
    drop(rows);

    Ok(CasePage {
        cases: load_all(conn, &ids).await?,
        total,
    })
}

/// Cases of `owner_id` whose title, description, or any evidence matches
/// every term of `fts`.
pub(crate) async fn search(
    conn: &libsql::Connection,
    owner_id: &str,
    fts: &str,
    limit: u32,
) -> Result<CasePage, DatabaseError> {
    let mut rows = conn
        .query(
            "SELECT id FROM cases WHERE owner_id = ?2 AND id IN ( \
                 SELECT c.id FROM cases_fts JOIN cases c ON c.rowid = cases_fts.rowid \
                 WHERE cases_fts MATCH ?1 \
                 UNION \
                 SELECT e.case_id FROM evidence_fts JOIN evidence e ON e.rowid = evidence_fts.rowid \
                 WHERE evidence_fts MATCH ?1) \
             ORDER BY updated_at DESC, id",
            libsql::params![fts, owner_id],
        )
        .await?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next().await? {
        ids.push(row.get::<String>(0)?);
    }
    drop(rows);

    let total = u64::try_from(ids.len()).unwrap_or(u64::MAX);
    ids.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
    Ok(CasePage {
        cases: load_all(conn, &ids).await?,
        total,
    })
}

pub(crate) async fn cleanup_expired(
    conn: &libsql::Connection,
    cutoff: DateTime<Utc>,
    batch_size: u32,
) -> Result<u64, DatabaseError> {
    let removed = conn
        .execute(
            "DELETE FROM cases WHERE id IN ( \
                 SELECT id FROM cases WHERE status = 'closed' AND closed_at < ?1 \
                 ORDER BY closed_at LIMIT ?2)",
            libsql::params![fmt_ts(cutoff), i64::from(batch_size)],
        )
        .await?;
    Ok(removed)
}
