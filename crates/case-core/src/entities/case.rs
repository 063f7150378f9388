use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::entities::{
    CaseMessage, Evidence, Hypothesis, Metadata, PendingTransition, Solution, StatusTransition,
    ToolCall, UploadedFile,
};
use crate::enums::CaseStatus;
use crate::errors::CaseError;
use crate::phases::PhaseDocuments;
use crate::validation::{require_non_empty, require_same_case};

/// A long-lived troubleshooting investigation and everything attached to it.
///
/// Core fields and phase documents live on one row; every collection below is
/// a normalized child table assembled on load.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Case {
    pub id: String,
    pub owner_id: String,
    pub org_id: String,
    pub title: String,
    pub description: String,
    pub status: CaseStatus,
    pub current_turn: u32,
    pub turns_without_progress: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub phases: PhaseDocuments,
    #[serde(default)]
    pub metadata: Metadata,
    /// Optimistic concurrency token, bumped by the store on every core-row
    /// write. Zero for a case that has not been persisted yet.
    #[serde(default)]
    pub version: u64,

    #[serde(default)]
    pub evidence: Vec<Evidence>,
    #[serde(default)]
    pub hypotheses: Vec<Hypothesis>,
    #[serde(default)]
    pub solutions: Vec<Solution>,
    #[serde(default)]
    pub uploaded_files: Vec<UploadedFile>,
    #[serde(default)]
    pub messages: Vec<CaseMessage>,
    #[serde(default)]
    pub status_history: Vec<StatusTransition>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,

    /// Transitions applied in memory but not yet written.
    #[serde(skip)]
    #[schemars(skip)]
    pub pending_transitions: Vec<PendingTransition>,
}

impl Case {
    /// Build a new case in `consulting` with default phase documents and the
    /// initial transition (no prior status) queued for the first write.
    ///
    /// # Errors
    ///
    /// Returns `CaseError::Validation` if the title or owning identifiers are
    /// empty.
    pub fn new(
        id: impl Into<String>,
        owner_id: impl Into<String>,
        org_id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, CaseError> {
        let id = id.into();
        let case = Self {
            pending_transitions: vec![PendingTransition {
                case_id: id.clone(),
                from_status: None,
                to_status: CaseStatus::Consulting,
                reason: None,
                transitioned_at: now,
                metadata: Metadata::new(),
            }],
            id,
            owner_id: owner_id.into(),
            org_id: org_id.into(),
            title: title.into().trim().to_string(),
            description: description.into(),
            status: CaseStatus::Consulting,
            current_turn: 0,
            turns_without_progress: 0,
            created_at: now,
            updated_at: now,
            last_activity_at: now,
            resolved_at: None,
            closed_at: None,
            phases: PhaseDocuments::default(),
            metadata: Metadata::new(),
            version: 0,
            evidence: Vec::new(),
            hypotheses: Vec::new(),
            solutions: Vec::new(),
            uploaded_files: Vec::new(),
            messages: Vec::new(),
            status_history: Vec::new(),
            tags: Vec::new(),
            tool_calls: Vec::new(),
        };
        case.validate()?;
        Ok(case)
    }

    /// Move the case to `to`, updating lifecycle timestamps and queueing the
    /// audit record. Nothing is written until the case is saved.
    ///
    /// # Errors
    ///
    /// Returns `CaseError::Validation` for a self-transition.
    pub fn transition_to(
        &mut self,
        to: CaseStatus,
        reason: Option<String>,
        metadata: Metadata,
        now: DateTime<Utc>,
    ) -> Result<(), CaseError> {
        let from = self.status;
        if !from.can_transition_to(to) {
            return Err(CaseError::Validation(format!(
                "case {} is already {to}",
                self.id
            )));
        }

        self.status = to;
        self.updated_at = now;
        self.last_activity_at = now;
        match to {
            CaseStatus::Resolved => self.resolved_at = Some(now),
            CaseStatus::Closed => {
                self.closed_at = Some(now);
                self.resolved_at.get_or_insert(now);
            }
            CaseStatus::Consulting | CaseStatus::Investigating => {}
        }

        self.pending_transitions.push(PendingTransition {
            case_id: self.id.clone(),
            from_status: Some(from),
            to_status: to,
            reason: reason.filter(|r| !r.trim().is_empty()),
            transitioned_at: now,
            metadata,
        });
        Ok(())
    }

    /// Advance the turn counters. A turn without progress extends the stall
    /// streak; a productive turn resets it.
    pub fn record_turn(&mut self, progress_made: bool, now: DateTime<Utc>) {
        self.current_turn = self.current_turn.saturating_add(1);
        if progress_made {
            self.turns_without_progress = 0;
        } else {
            self.turns_without_progress = self.turns_without_progress.saturating_add(1);
        }
        self.updated_at = now;
        self.last_activity_at = now;
    }

    /// Status this case had when it was last loaded or written.
    #[must_use]
    pub fn persisted_status(&self) -> Option<CaseStatus> {
        match self.pending_transitions.first() {
            Some(first) => first.from_status,
            None => Some(self.status),
        }
    }

    /// Check every invariant of the case and its children.
    ///
    /// # Errors
    ///
    /// Returns the first `CaseError::Validation` encountered.
    pub fn validate(&self) -> Result<(), CaseError> {
        require_non_empty("case id", &self.id)?;
        require_non_empty("title", &self.title)?;
        require_non_empty("owner_id", &self.owner_id)?;
        require_non_empty("org_id", &self.org_id)?;
        self.phases.validate()?;

        if let Some(last) = self.pending_transitions.last() {
            if last.to_status != self.status {
                return Err(CaseError::Validation(format!(
                    "case {} status {} does not match its last transition to {}",
                    self.id, self.status, last.to_status
                )));
            }
        }

        for ev in &self.evidence {
            require_same_case("evidence", &ev.case_id, &self.id)?;
            ev.validate()?;
        }
        for hyp in &self.hypotheses {
            require_same_case("hypothesis", &hyp.case_id, &self.id)?;
            hyp.validate()?;
            for ev_id in &hyp.supporting_evidence_ids {
                if !self.evidence.iter().any(|ev| &ev.id == ev_id) {
                    return Err(CaseError::Validation(format!(
                        "hypothesis {} references evidence {ev_id} which is not part of case {}",
                        hyp.id, self.id
                    )));
                }
            }
        }
        for sol in &self.solutions {
            require_same_case("solution", &sol.case_id, &self.id)?;
            sol.validate()?;
        }
        for file in &self.uploaded_files {
            require_same_case("uploaded file", &file.case_id, &self.id)?;
            file.validate()?;
        }
        for msg in &self.messages {
            require_same_case("message", &msg.case_id, &self.id)?;
            msg.validate()?;
        }
        for call in &self.tool_calls {
            require_same_case("tool call", &call.case_id, &self.id)?;
            call.validate()?;
        }
        for tag in &self.tags {
            require_non_empty("tag", tag)?;
        }
        Ok(())
    }
}
