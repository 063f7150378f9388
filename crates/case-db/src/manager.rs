//! Authorization-aware façade over a [`CaseRepository`].
//!
//! Every method that names an existing case checks that the caller owns it.
//! A case owned by someone else is reported exactly like a missing one, so
//! callers cannot probe for other users' identifiers.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use case_config::{CasebookConfig, ListingConfig, RetentionConfig};
use case_core::audit_detail::TransitionDetail;
use case_core::entities::{
    Case, CaseChild, CaseMessage, ChildKind, Evidence, Hypothesis, Metadata, Solution,
    StatusTransition, ToolCall, UploadedFile,
};
use case_core::enums::{CaseStatus, PhaseKind};
use case_core::errors::CaseError;
use case_core::identity::CallerIdentity;
use case_core::ids::{PREFIX_CASE, generate_id};
use case_core::legacy::{CaseSummaryView, LegacyClassification};
use case_core::timestamps::{now, start_of_day};

use crate::repository::{CaseFilter, CasePage, CaseRepository};
use crate::updates::{CaseUpdate, ChildPatch};

/// Input for [`CaseManager::create_case`]. Everything is optional.
#[derive(Debug, Clone, Default)]
pub struct NewCase {
    /// Defaults to `Case-MMDD-N` when absent or blank.
    pub title: Option<String>,
    pub description: Option<String>,
    pub metadata: Metadata,
    pub tags: Vec<String>,
    pub classification: Option<LegacyClassification>,
}

impl NewCase {
    #[must_use]
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }
}

pub struct CaseManager<R: CaseRepository> {
    repo: R,
    listing: ListingConfig,
    retention: RetentionConfig,
    default_org_id: String,
}

impl<R: CaseRepository> CaseManager<R> {
    #[must_use]
    pub fn new(repo: R, config: &CasebookConfig) -> Self {
        Self {
            repo,
            listing: config.listing.clone(),
            retention: config.retention.clone(),
            default_org_id: config.general.default_org_id.clone(),
        }
    }

    /// The wrapped repository, for identity-agnostic access.
    #[must_use]
    pub const fn repository(&self) -> &R {
        &self.repo
    }

    fn deny(case_id: &str, caller_id: &str) -> CaseError {
        tracing::warn!(case_id, caller_id, "case access denied: caller is not the owner");
        CaseError::case_not_found(case_id)
    }

    /// Ownership check without loading the aggregate.
    async fn check_owner(&self, case_id: &str, caller_id: &str) -> Result<(), CaseError> {
        if self.repo.owner_of(case_id).await? == caller_id {
            Ok(())
        } else {
            Err(Self::deny(case_id, caller_id))
        }
    }

    async fn default_title(&self, owner_id: &str, at: DateTime<Utc>) -> Result<String, CaseError> {
        let today = self
            .repo
            .count_created_since(owner_id, start_of_day(at))
            .await?;
        Ok(format!("Case-{}-{}", at.format("%m%d"), today + 1))
    }

    /// Create a case in `consulting` for the caller.
    ///
    /// The organization comes from the caller identity, falling back to the
    /// configured default when it is blank.
    ///
    /// # Errors
    ///
    /// `Validation` for malformed input, `Conflict` on an identifier
    /// collision, `StorageUnavailable` if the store is down.
    pub async fn create_case(
        &self,
        caller: &CallerIdentity,
        new: NewCase,
    ) -> Result<Case, CaseError> {
        let at = now();
        let org_id = if caller.org_id.trim().is_empty() {
            self.default_org_id.clone()
        } else {
            caller.org_id.clone()
        };
        let title = match new.title.filter(|t| !t.trim().is_empty()) {
            Some(title) => title,
            None => self.default_title(&caller.user_id, at).await?,
        };

        let mut case = Case::new(
            generate_id(PREFIX_CASE)?,
            &caller.user_id,
            org_id,
            title,
            new.description.unwrap_or_default(),
            at,
        )?;
        case.metadata = new.metadata;
        if let Some(classification) = new.classification {
            classification.apply_to(&mut case.metadata);
        }
        let mut tags: Vec<String> = new
            .tags
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        tags.sort();
        tags.dedup();
        case.tags = tags;
        let detail = TransitionDetail::by(&caller.user_id).to_metadata()?;
        if let Some(initial) = case.pending_transitions.first_mut() {
            initial.metadata = detail;
        }

        self.repo.create(&case).await
    }

    /// Load a case the caller owns.
    ///
    /// # Errors
    ///
    /// `NotFound` if the case is absent or owned by someone else.
    pub async fn get_case(&self, case_id: &str, caller_id: &str) -> Result<Case, CaseError> {
        let case = self.repo.get(case_id).await?;
        if case.owner_id != caller_id {
            return Err(Self::deny(case_id, caller_id));
        }
        Ok(case)
    }

    /// API-facing projection with the legacy classification fields.
    ///
    /// # Errors
    ///
    /// `NotFound` as for [`Self::get_case`]; `Validation` if the stored
    /// classification keys are corrupt.
    pub async fn case_summary(
        &self,
        case_id: &str,
        caller_id: &str,
    ) -> Result<CaseSummaryView, CaseError> {
        CaseSummaryView::from_case(&self.get_case(case_id, caller_id).await?)
    }

    /// Apply a partial update to the mutable core fields and save.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Validation`, or `Conflict` if the case changed since it
    /// was loaded.
    pub async fn update_case(
        &self,
        case_id: &str,
        caller_id: &str,
        update: &CaseUpdate,
    ) -> Result<Case, CaseError> {
        let mut case = self.get_case(case_id, caller_id).await?;
        update.apply(&mut case, now())?;
        self.repo.save(&case).await
    }

    /// Move the case to `new_status` and record the transition.
    ///
    /// The status string is checked before anything is loaded. A concurrent
    /// change is reported as `Conflict` and not retried.
    ///
    /// # Errors
    ///
    /// `Validation` for an unknown status or a self-transition, `NotFound`,
    /// `Conflict`.
    pub async fn transition_status(
        &self,
        case_id: &str,
        caller_id: &str,
        new_status: &str,
        reason: Option<String>,
    ) -> Result<Case, CaseError> {
        let to: CaseStatus = new_status.parse()?;
        let mut case = self.get_case(case_id, caller_id).await?;
        let detail = TransitionDetail::by(caller_id).to_metadata()?;
        case.transition_to(to, reason, detail, now())?;
        self.repo.save(&case).await
    }

    /// Advance the turn counters after one agent turn.
    ///
    /// # Errors
    ///
    /// `NotFound` or `Conflict`.
    pub async fn record_turn(
        &self,
        case_id: &str,
        caller_id: &str,
        progress_made: bool,
    ) -> Result<Case, CaseError> {
        let mut case = self.get_case(case_id, caller_id).await?;
        case.record_turn(progress_made, now());
        self.repo.save(&case).await
    }

    /// Irreversibly delete a case and all of its children.
    ///
    /// # Errors
    ///
    /// `NotFound` if absent or not owned by the caller.
    pub async fn delete_case(&self, case_id: &str, caller_id: &str) -> Result<(), CaseError> {
        self.check_owner(case_id, caller_id).await?;
        self.repo.delete(case_id).await
    }

    /// The caller's cases, newest activity first. The page size is clamped to
    /// the configured bounds.
    ///
    /// # Errors
    ///
    /// `StorageUnavailable` if the store is down.
    pub async fn list_cases(
        &self,
        caller_id: &str,
        mut filter: CaseFilter,
    ) -> Result<CasePage, CaseError> {
        filter.limit = Some(self.listing.clamp(filter.limit));
        self.repo.list_by_owner(caller_id, &filter).await
    }

    /// Full-text search over the caller's cases.
    ///
    /// # Errors
    ///
    /// `Validation` for a query without terms.
    pub async fn search_cases(
        &self,
        caller_id: &str,
        query: &str,
        limit: Option<u32>,
    ) -> Result<CasePage, CaseError> {
        self.repo
            .search(caller_id, query, self.listing.clamp(limit))
            .await
    }

    /// # Errors
    ///
    /// `NotFound` or `Validation` for a query without terms.
    pub async fn search_evidence(
        &self,
        case_id: &str,
        caller_id: &str,
        query: &str,
        limit: Option<u32>,
    ) -> Result<Vec<Evidence>, CaseError> {
        self.check_owner(case_id, caller_id).await?;
        self.repo
            .search_evidence(case_id, query, self.listing.clamp(limit))
            .await
    }

    async fn append(&self, caller_id: &str, child: CaseChild) -> Result<(), CaseError> {
        let case_id = child.case_id().to_string();
        self.check_owner(&case_id, caller_id).await?;
        self.repo.add_child(&case_id, child).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// `NotFound`, `Validation`, or `Conflict` for a duplicate identifier.
    pub async fn add_evidence(
        &self,
        caller_id: &str,
        evidence: Evidence,
    ) -> Result<Evidence, CaseError> {
        self.append(caller_id, CaseChild::Evidence(evidence.clone()))
            .await?;
        Ok(evidence)
    }

    /// Supporting evidence must already belong to the same case.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Validation`, or `Conflict`.
    pub async fn add_hypothesis(
        &self,
        caller_id: &str,
        hypothesis: Hypothesis,
    ) -> Result<Hypothesis, CaseError> {
        self.append(caller_id, CaseChild::Hypothesis(hypothesis.clone()))
            .await?;
        Ok(hypothesis)
    }

    /// # Errors
    ///
    /// `NotFound`, `Validation`, or `Conflict`.
    pub async fn add_solution(
        &self,
        caller_id: &str,
        solution: Solution,
    ) -> Result<Solution, CaseError> {
        self.append(caller_id, CaseChild::Solution(solution.clone()))
            .await?;
        Ok(solution)
    }

    /// # Errors
    ///
    /// `NotFound`, `Validation`, or `Conflict`.
    pub async fn add_uploaded_file(
        &self,
        caller_id: &str,
        file: UploadedFile,
    ) -> Result<UploadedFile, CaseError> {
        self.append(caller_id, CaseChild::UploadedFile(file.clone()))
            .await?;
        Ok(file)
    }

    /// Append a message and move the case's activity clock forward.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Validation`, or `Conflict`.
    pub async fn add_message(
        &self,
        caller_id: &str,
        message: CaseMessage,
    ) -> Result<CaseMessage, CaseError> {
        self.append(caller_id, CaseChild::Message(message.clone()))
            .await?;
        self.repo
            .touch_activity(&message.case_id, message.timestamp)
            .await?;
        Ok(message)
    }

    /// # Errors
    ///
    /// `NotFound`, `Validation`, or `Conflict`.
    pub async fn record_tool_call(
        &self,
        caller_id: &str,
        call: ToolCall,
    ) -> Result<ToolCall, CaseError> {
        self.append(caller_id, CaseChild::ToolCall(call.clone()))
            .await?;
        Ok(call)
    }

    /// # Errors
    ///
    /// `NotFound` for the case or the child, `Validation` if the patched
    /// child is invalid.
    pub async fn update_child(
        &self,
        case_id: &str,
        caller_id: &str,
        child_id: &str,
        patch: &ChildPatch,
    ) -> Result<CaseChild, CaseError> {
        self.check_owner(case_id, caller_id).await?;
        self.repo.update_child(case_id, child_id, patch).await
    }

    /// Messages cannot be deleted.
    ///
    /// # Errors
    ///
    /// `NotFound` or `Validation`.
    pub async fn delete_child(
        &self,
        case_id: &str,
        caller_id: &str,
        kind: ChildKind,
        child_id: &str,
    ) -> Result<(), CaseError> {
        self.check_owner(case_id, caller_id).await?;
        self.repo.delete_child(case_id, kind, child_id).await
    }

    /// Replace one phase document without rewriting the rest of the case.
    ///
    /// # Errors
    ///
    /// `NotFound`, or `Validation` for a non-object document or a cleared
    /// required phase.
    pub async fn update_phase(
        &self,
        case_id: &str,
        caller_id: &str,
        phase: PhaseKind,
        document: Option<Value>,
    ) -> Result<(), CaseError> {
        self.check_owner(case_id, caller_id).await?;
        self.repo.update_phase(case_id, phase, document).await
    }

    /// # Errors
    ///
    /// `NotFound`.
    pub async fn list_messages(
        &self,
        case_id: &str,
        caller_id: &str,
        limit: Option<u32>,
        offset: u32,
    ) -> Result<Vec<CaseMessage>, CaseError> {
        self.check_owner(case_id, caller_id).await?;
        self.repo
            .list_messages(case_id, self.listing.clamp(limit), offset)
            .await
    }

    /// # Errors
    ///
    /// `NotFound`.
    pub async fn transitions(
        &self,
        case_id: &str,
        caller_id: &str,
    ) -> Result<Vec<StatusTransition>, CaseError> {
        self.check_owner(case_id, caller_id).await?;
        self.repo.transitions(case_id).await
    }

    /// # Errors
    ///
    /// `NotFound` or `Validation` for a blank tag.
    pub async fn add_tag(&self, case_id: &str, caller_id: &str, tag: &str) -> Result<(), CaseError> {
        self.check_owner(case_id, caller_id).await?;
        self.repo.add_tag(case_id, tag).await
    }

    /// # Errors
    ///
    /// `NotFound` if the case or the tag is absent.
    pub async fn remove_tag(
        &self,
        case_id: &str,
        caller_id: &str,
        tag: &str,
    ) -> Result<(), CaseError> {
        self.check_owner(case_id, caller_id).await?;
        self.repo.remove_tag(case_id, tag).await
    }

    /// Delete one batch of closed cases older than the configured retention.
    ///
    /// # Errors
    ///
    /// `StorageUnavailable` if the store is down.
    pub async fn cleanup_expired(&self) -> Result<u64, CaseError> {
        self.cleanup_closed_before(
            self.retention.closed_max_age_days,
            self.retention.cleanup_batch_size,
        )
        .await
    }

    /// Delete up to `batch_size` cases closed more than `max_age_days` ago.
    ///
    /// # Errors
    ///
    /// `StorageUnavailable` if the store is down.
    pub async fn cleanup_closed_before(
        &self,
        max_age_days: u32,
        batch_size: u32,
    ) -> Result<u64, CaseError> {
        let cutoff = now() - Duration::days(i64::from(max_age_days));
        self.repo.cleanup_expired(cutoff, batch_size).await
    }
}
