//! The backend-agnostic unit-of-work contract for cases.
//!
//! Implementations are identity-agnostic: they take case and user
//! identifiers as plain parameters and never check ownership. That is the
//! job of [`crate::manager::CaseManager`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use case_core::entities::{Case, CaseChild, CaseMessage, ChildKind, Evidence, StatusTransition};
use case_core::enums::{CaseStatus, PhaseKind};
use case_core::errors::CaseError;

use crate::updates::ChildPatch;

/// Filters for [`CaseRepository::list_by_owner`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaseFilter {
    pub status: Option<CaseStatus>,
    pub tag: Option<String>,
    pub org_id: Option<String>,
    /// `None` returns every match.
    pub limit: Option<u32>,
    pub offset: u32,
}

impl CaseFilter {
    #[must_use]
    pub const fn with_status(mut self, status: CaseStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    #[must_use]
    pub fn with_org(mut self, org_id: impl Into<String>) -> Self {
        self.org_id = Some(org_id.into());
        self
    }

    #[must_use]
    pub const fn page(mut self, limit: u32, offset: u32) -> Self {
        self.limit = Some(limit);
        self.offset = offset;
        self
    }
}

/// One page of cases plus the number of matches ignoring pagination.
#[derive(Debug, Clone, PartialEq)]
pub struct CasePage {
    pub cases: Vec<Case>,
    pub total: u64,
}

/// Storage backend for the case aggregate.
///
/// Every method is a single short unit of work. Multi-row writes are
/// all-or-nothing; nothing is retried automatically.
#[async_trait]
pub trait CaseRepository: Send + Sync {
    /// Persist a new case, its children, and its queued initial transition.
    ///
    /// Returns the stored case (version 1, transition ids assigned).
    /// `Conflict` if the identifier already exists.
    async fn create(&self, case: &Case) -> Result<Case, CaseError>;

    /// Load a complete case with every child collection. `NotFound` if absent.
    async fn get(&self, case_id: &str) -> Result<Case, CaseError>;

    /// Owning user of a case, without loading the aggregate.
    async fn owner_of(&self, case_id: &str) -> Result<String, CaseError>;

    /// Persist the full state of a loaded case atomically.
    ///
    /// Core fields and phase documents are compared-and-swapped on
    /// `case.version`; a stale snapshot yields `Conflict`. Queued transitions
    /// are appended. Children are reconciled by identifier: new rows are
    /// inserted, known rows updated (messages are never rewritten), and rows
    /// missing from `case` are left alone. A child whose id already belongs
    /// to another case is a `Conflict`.
    async fn save(&self, case: &Case) -> Result<Case, CaseError>;

    /// Remove a case and, by cascade, every child row.
    async fn delete(&self, case_id: &str) -> Result<(), CaseError>;

    /// Cases of one owner, most recently updated first.
    async fn list_by_owner(&self, owner_id: &str, filter: &CaseFilter)
    -> Result<CasePage, CaseError>;

    /// Transition history in sequence order.
    async fn transitions(&self, case_id: &str) -> Result<Vec<StatusTransition>, CaseError>;

    /// Insert one child row without touching the case row or its version.
    async fn add_child(&self, case_id: &str, child: CaseChild) -> Result<CaseChild, CaseError>;

    /// Apply a partial update to one child row. Bumps the case version.
    async fn update_child(
        &self,
        case_id: &str,
        child_id: &str,
        patch: &ChildPatch,
    ) -> Result<CaseChild, CaseError>;

    /// Delete one child row and bump the case version. Messages are
    /// append-only and cannot be deleted.
    async fn delete_child(&self, case_id: &str, kind: ChildKind, child_id: &str)
    -> Result<(), CaseError>;

    /// Replace a single phase document. Bumps the case version.
    async fn update_phase(
        &self,
        case_id: &str,
        phase: PhaseKind,
        document: Option<Value>,
    ) -> Result<(), CaseError>;

    /// Messages ordered by timestamp, ties broken by insertion order.
    async fn list_messages(
        &self,
        case_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<CaseMessage>, CaseError>;

    /// Move `last_activity_at` forward to `at`. Never moves it backwards and
    /// does not bump the version.
    async fn touch_activity(&self, case_id: &str, at: DateTime<Utc>) -> Result<(), CaseError>;

    /// Tag a case. Adding an existing tag is a no-op.
    async fn add_tag(&self, case_id: &str, tag: &str) -> Result<(), CaseError>;

    /// Remove a tag and bump the case version. `NotFound` if the case does
    /// not carry it.
    async fn remove_tag(&self, case_id: &str, tag: &str) -> Result<(), CaseError>;

    /// Number of cases `owner_id` created at or after `since`.
    async fn count_created_since(
        &self,
        owner_id: &str,
        since: DateTime<Utc>,
    ) -> Result<u64, CaseError>;

    /// Full-text search over case title/description and evidence content,
    /// restricted to one owner.
    async fn search(&self, owner_id: &str, query: &str, limit: u32)
    -> Result<CasePage, CaseError>;

    /// Full-text search over the evidence of one case.
    async fn search_evidence(
        &self,
        case_id: &str,
        query: &str,
        limit: u32,
    ) -> Result<Vec<Evidence>, CaseError>;

    /// Delete up to `batch_size` closed cases whose `closed_at` is before
    /// `cutoff`. Returns the number removed.
    async fn cleanup_expired(
        &self,
        cutoff: DateTime<Utc>,
        batch_size: u32,
    ) -> Result<u64, CaseError>;
}
