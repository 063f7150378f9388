//! libSQL implementation of [`CaseRepository`].
//!
//! One module per table. Each exposes plain async functions over a
//! `libsql::Connection`; [`LibSqlCaseRepository`] wraps them in transactions
//! and maps errors at the boundary.

mod case;
mod evidence;
mod hypothesis;
mod message;
mod solution;
mod tag;
mod tool_call;
mod transition;
mod uploaded_file;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::{Mutex, MutexGuard};

use case_config::DatabaseConfig;
use case_core::entities::{Case, CaseChild, CaseMessage, ChildKind, Evidence, StatusTransition};
use case_core::enums::PhaseKind;
use case_core::errors::CaseError;
use case_core::timestamps::now;

use crate::CaseDb;
use crate::error::DatabaseError;
use crate::helpers::fts_query;
use crate::repository::{CaseFilter, CasePage, CaseRepository};
use crate::updates::ChildPatch;

/// Case store on a single libSQL connection.
///
/// Units of work are serialized through one async mutex; each holds the
/// connection for exactly one transaction. If a caller's future is dropped
/// mid-transaction, the next unit rolls the leftover transaction back before
/// starting its own.
pub struct LibSqlCaseRepository {
    db: Mutex<CaseDb>,
}

impl LibSqlCaseRepository {
    #[must_use]
    pub fn new(db: CaseDb) -> Self {
        Self { db: Mutex::new(db) }
    }

    /// Open (and migrate) the store described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `CaseError::StorageUnavailable` if the database cannot be
    /// opened or migrated.
    pub async fn open(config: &DatabaseConfig) -> Result<Self, CaseError> {
        let db = CaseDb::open(config).await.map_err(|e| match e {
            DatabaseError::Case(inner) => inner,
            other => CaseError::StorageUnavailable(other.to_string()),
        })?;
        Ok(Self::new(db))
    }

    /// A private in-memory store, mostly for tests.
    ///
    /// # Errors
    ///
    /// Returns `CaseError::StorageUnavailable` if the schema cannot be created.
    pub async fn open_in_memory() -> Result<Self, CaseError> {
        Self::open(&DatabaseConfig::in_memory()).await
    }

    async fn lock(&self) -> Result<MutexGuard<'_, CaseDb>, CaseError> {
        let db = self.db.lock().await;
        if !db.conn().is_autocommit() {
            tracing::warn!("rolling back a transaction left open by a cancelled unit of work");
            db.conn()
                .execute("ROLLBACK", ())
                .await
                .map_err(DatabaseError::from)?;
        }
        Ok(db)
    }
}

/// Start a write transaction. Takes the write lock up front so two writers
/// never both read a version and then race on the update.
async fn begin(conn: &libsql::Connection) -> Result<(), CaseError> {
    conn.execute("BEGIN IMMEDIATE", ())
        .await
        .map_err(DatabaseError::from)?;
    Ok(())
}

/// Start a read transaction so multi-statement reads see one snapshot.
async fn begin_read(conn: &libsql::Connection) -> Result<(), CaseError> {
    conn.execute("BEGIN", ()).await.map_err(DatabaseError::from)?;
    Ok(())
}

/// Commit on success, roll back on any failure.
async fn finish<T>(
    conn: &libsql::Connection,
    result: Result<T, DatabaseError>,
) -> Result<T, CaseError> {
    match result {
        Ok(value) => match conn.execute("COMMIT", ()).await {
            Ok(_) => Ok(value),
            Err(err) => {
                rollback(conn).await;
                Err(DatabaseError::from(err).into())
            }
        },
        Err(err) => {
            rollback(conn).await;
            Err(err.into())
        }
    }
}

async fn rollback(conn: &libsql::Connection) {
    if let Err(err) = conn.execute("ROLLBACK", ()).await {
        tracing::warn!(error = %err, "rollback failed");
    }
}

async fn load_child(
    conn: &libsql::Connection,
    case_id: &str,
    kind: ChildKind,
    id: &str,
) -> Result<Option<CaseChild>, DatabaseError> {
    Ok(match kind {
        ChildKind::Evidence => evidence::load_one(conn, case_id, id)
            .await?
            .map(CaseChild::Evidence),
        ChildKind::Hypothesis => hypothesis::load_one(conn, case_id, id)
            .await?
            .map(CaseChild::Hypothesis),
        ChildKind::Solution => solution::load_one(conn, case_id, id)
            .await?
            .map(CaseChild::Solution),
        ChildKind::UploadedFile => uploaded_file::load_one(conn, case_id, id)
            .await?
            .map(CaseChild::UploadedFile),
        ChildKind::ToolCall => tool_call::load_one(conn, case_id, id)
            .await?
            .map(CaseChild::ToolCall),
        ChildKind::Message => {
            return Err(CaseError::Validation("messages are append-only".to_string()).into());
        }
    })
}

async fn insert_child(conn: &libsql::Connection, child: &CaseChild) -> Result<(), DatabaseError> {
    match child {
        CaseChild::Evidence(e) => evidence::insert(conn, e).await,
        CaseChild::Hypothesis(h) => hypothesis::insert(conn, h).await,
        CaseChild::Solution(s) => solution::insert(conn, s).await,
        CaseChild::UploadedFile(f) => uploaded_file::insert(conn, f).await,
        CaseChild::Message(m) => message::insert(conn, m).await,
        CaseChild::ToolCall(c) => tool_call::insert(conn, c).await,
    }
}

async fn upsert_child(conn: &libsql::Connection, child: &CaseChild) -> Result<(), DatabaseError> {
    match child {
        CaseChild::Evidence(e) => evidence::upsert(conn, e).await,
        CaseChild::Hypothesis(h) => hypothesis::upsert(conn, h).await,
        CaseChild::Solution(s) => solution::upsert(conn, s).await,
        CaseChild::UploadedFile(f) => uploaded_file::upsert(conn, f).await,
        CaseChild::ToolCall(c) => tool_call::upsert(conn, c).await,
        CaseChild::Message(_) => {
            Err(CaseError::Validation("messages are append-only".to_string()).into())
        }
    }
}

fn not_found(kind: ChildKind, id: &str) -> CaseError {
    CaseError::NotFound {
        entity_type: kind.as_str().to_string(),
        id: id.to_string(),
    }
}

fn empty_query() -> CaseError {
    CaseError::Validation("search query must contain at least one term".to_string())
}

#[async_trait]
impl CaseRepository for LibSqlCaseRepository {
    async fn create(&self, case: &Case) -> Result<Case, CaseError> {
        let db = self.lock().await?;
        let conn = db.conn();
        begin(conn).await?;
        let stored = finish(conn, case::create(conn, case).await).await?;
        tracing::info!(case_id = %stored.id, owner_id = %stored.owner_id, "case created");
        Ok(stored)
    }

    async fn get(&self, case_id: &str) -> Result<Case, CaseError> {
        let db = self.lock().await?;
        let conn = db.conn();
        begin_read(conn).await?;
        finish(conn, case::load_required(conn, case_id).await).await
    }

    async fn owner_of(&self, case_id: &str) -> Result<String, CaseError> {
        let db = self.lock().await?;
        Ok(case::owner_of(db.conn(), case_id).await?)
    }

    async fn save(&self, case: &Case) -> Result<Case, CaseError> {
        let db = self.lock().await?;
        let conn = db.conn();
        begin(conn).await?;
        let stored = finish(conn, case::save(conn, case, now()).await).await?;
        for t in &case.pending_transitions {
            tracing::info!(
                case_id = %case.id,
                from = ?t.from_status,
                to = %t.to_status,
                "case status changed"
            );
        }
        tracing::debug!(case_id = %stored.id, version = stored.version, "case saved");
        Ok(stored)
    }

    async fn delete(&self, case_id: &str) -> Result<(), CaseError> {
        let db = self.lock().await?;
        let conn = db.conn();
        begin(conn).await?;
        finish(conn, case::delete(conn, case_id).await).await?;
        tracing::info!(case_id, "case deleted");
        Ok(())
    }

    async fn list_by_owner(
        &self,
        owner_id: &str,
        filter: &CaseFilter,
    ) -> Result<CasePage, CaseError> {
        let db = self.lock().await?;
        let conn = db.conn();
        begin_read(conn).await?;
        finish(conn, case::list_by_owner(conn, owner_id, filter).await).await
    }

    async fn transitions(&self, case_id: &str) -> Result<Vec<StatusTransition>, CaseError> {
        let db = self.lock().await?;
        let conn = db.conn();
        begin_read(conn).await?;
        let result: Result<_, DatabaseError> = async {
            case::ensure_exists(conn, case_id).await?;
            transition::load_for_case(conn, case_id).await
        }
        .await;
        finish(conn, result).await
    }

    async fn add_child(&self, case_id: &str, child: CaseChild) -> Result<CaseChild, CaseError> {
        if child.case_id() != case_id {
            return Err(CaseError::Validation(format!(
                "{} {} belongs to case {}, not {case_id}",
                child.kind(),
                child.id(),
                child.case_id()
            )));
        }
        child.validate()?;

        let db = self.lock().await?;
        let conn = db.conn();
        begin(conn).await?;
        let result: Result<_, DatabaseError> = async {
            case::ensure_exists(conn, case_id).await?;
            insert_child(conn, &child).await
        }
        .await;
        finish(conn, result).await?;
        tracing::debug!(case_id, kind = %child.kind(), child_id = %child.id(), "child added");
        Ok(child)
    }

    async fn update_child(
        &self,
        case_id: &str,
        child_id: &str,
        patch: &ChildPatch,
    ) -> Result<CaseChild, CaseError> {
        let kind = patch.kind();
        let db = self.lock().await?;
        let conn = db.conn();
        begin(conn).await?;
        let result: Result<_, DatabaseError> = async {
            let mut child = load_child(conn, case_id, kind, child_id)
                .await?
                .ok_or_else(|| not_found(kind, child_id))?;
            let at = now();
            patch.apply(&mut child, at)?;
            upsert_child(conn, &child).await?;
            case::bump_version(conn, case_id, at).await?;
            Ok(child)
        }
        .await;
        let child = finish(conn, result).await?;
        tracing::debug!(case_id, child_id, patch = %patch.describe(), "child updated");
        Ok(child)
    }

    async fn delete_child(
        &self,
        case_id: &str,
        kind: ChildKind,
        child_id: &str,
    ) -> Result<(), CaseError> {
        if kind == ChildKind::Message {
            return Err(CaseError::Validation(
                "messages are append-only and cannot be deleted".to_string(),
            ));
        }
        let db = self.lock().await?;
        let conn = db.conn();
        begin(conn).await?;
        // Table names come from the fixed `ChildKind` mapping.
        let sql = format!("DELETE FROM {} WHERE case_id = ?1 AND id = ?2", kind.table());
        let result: Result<_, DatabaseError> = async {
            let removed = conn.execute(&sql, [case_id, child_id]).await?;
            if removed == 0 {
                return Err(not_found(kind, child_id).into());
            }
            case::bump_version(conn, case_id, now()).await
        }
        .await;
        finish(conn, result).await?;
        tracing::debug!(case_id, %kind, child_id, "child deleted");
        Ok(())
    }

    async fn update_phase(
        &self,
        case_id: &str,
        phase: PhaseKind,
        document: Option<Value>,
    ) -> Result<(), CaseError> {
        let db = self.lock().await?;
        let conn = db.conn();
        begin(conn).await?;
        let result = case::update_phase(conn, case_id, phase, document.as_ref(), now()).await;
        finish(conn, result).await?;
        tracing::debug!(case_id, %phase, "phase document replaced");
        Ok(())
    }

    async fn list_messages(
        &self,
        case_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<CaseMessage>, CaseError> {
        let db = self.lock().await?;
        let conn = db.conn();
        begin_read(conn).await?;
        let result: Result<_, DatabaseError> = async {
            case::ensure_exists(conn, case_id).await?;
            message::list_page(conn, case_id, limit, offset).await
        }
        .await;
        finish(conn, result).await
    }

    async fn touch_activity(&self, case_id: &str, at: DateTime<Utc>) -> Result<(), CaseError> {
        let db = self.lock().await?;
        Ok(case::touch_activity(db.conn(), case_id, at).await?)
    }

    async fn add_tag(&self, case_id: &str, tag: &str) -> Result<(), CaseError> {
        let tag = tag.trim();
        case_core::validation::require_non_empty("tag", tag)?;
        let db = self.lock().await?;
        let conn = db.conn();
        begin(conn).await?;
        let result: Result<_, DatabaseError> = async {
            case::ensure_exists(conn, case_id).await?;
            tag::add(conn, case_id, tag, now()).await
        }
        .await;
        if finish(conn, result).await? {
            tracing::debug!(case_id, tag, "tag added");
        }
        Ok(())
    }

    async fn remove_tag(&self, case_id: &str, tag: &str) -> Result<(), CaseError> {
        let db = self.lock().await?;
        let conn = db.conn();
        begin(conn).await?;
        let result: Result<_, DatabaseError> = async {
            case::ensure_exists(conn, case_id).await?;
            if tag::remove(conn, case_id, tag).await? {
                case::bump_version(conn, case_id, now()).await
            } else {
                Err(CaseError::NotFound {
                    entity_type: "tag".to_string(),
                    id: tag.to_string(),
                }
                .into())
            }
        }
        .await;
        finish(conn, result).await
    }

    async fn count_created_since(
        &self,
        owner_id: &str,
        since: DateTime<Utc>,
    ) -> Result<u64, CaseError> {
        let db = self.lock().await?;
        Ok(case::count_created_since(db.conn(), owner_id, since).await?)
    }

    async fn search(
        &self,
        owner_id: &str,
        query: &str,
        limit: u32,
    ) -> Result<CasePage, CaseError> {
        let fts = fts_query(query).ok_or_else(empty_query)?;
        let db = self.lock().await?;
        let conn = db.conn();
        begin_read(conn).await?;
        finish(conn, case::search(conn, owner_id, &fts, limit).await).await
    }

    async fn search_evidence(
        &self,
        case_id: &str,
        query: &str,
        limit: u32,
    ) -> Result<Vec<Evidence>, CaseError> {
        let fts = fts_query(query).ok_or_else(empty_query)?;
        let db = self.lock().await?;
        Ok(evidence::search(db.conn(), case_id, &fts, limit).await?)
    }

    async fn cleanup_expired(
        &self,
        cutoff: DateTime<Utc>,
        batch_size: u32,
    ) -> Result<u64, CaseError> {
        let db = self.lock().await?;
        let conn = db.conn();
        begin(conn).await?;
        let removed = finish(conn, case::cleanup_expired(conn, cutoff, batch_size).await).await?;
        if removed > 0 {
            tracing::info!(removed, cutoff = %cutoff, "expired closed cases removed");
        }
        Ok(removed)
    }
}
