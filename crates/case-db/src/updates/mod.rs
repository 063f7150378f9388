//! Partial-update builders for the case row and its children.
//!
//! Each builder produces an update struct with `Option` fields; only `Some`
//! fields change the target. Double `Option`s distinguish "leave alone"
//! (`None`) from "clear" (`Some(None)`). Both backends apply a patch to the
//! loaded entity and re-validate it before writing, so the rules live here
//! once.

pub mod case;
pub mod evidence;
pub mod hypothesis;
pub mod solution;
pub mod tool_call;
pub mod uploaded_file;

use chrono::{DateTime, Utc};
use serde::Serialize;

use case_core::entities::{CaseChild, ChildKind};
use case_core::errors::CaseError;

pub use case::{CaseUpdate, CaseUpdateBuilder};
pub use evidence::{EvidenceUpdate, EvidenceUpdateBuilder};
pub use hypothesis::{HypothesisUpdate, HypothesisUpdateBuilder};
pub use solution::{SolutionUpdate, SolutionUpdateBuilder};
pub use tool_call::{ToolCallUpdate, ToolCallUpdateBuilder};
pub use uploaded_file::{UploadedFileUpdate, UploadedFileUpdateBuilder};

/// A patch for one child row. Messages are append-only and have none.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChildPatch {
    Evidence(EvidenceUpdate),
    Hypothesis(HypothesisUpdate),
    Solution(SolutionUpdate),
    UploadedFile(UploadedFileUpdate),
    ToolCall(ToolCallUpdate),
}

impl ChildPatch {
    #[must_use]
    pub const fn kind(&self) -> ChildKind {
        match self {
            Self::Evidence(_) => ChildKind::Evidence,
            Self::Hypothesis(_) => ChildKind::Hypothesis,
            Self::Solution(_) => ChildKind::Solution,
            Self::UploadedFile(_) => ChildKind::UploadedFile,
            Self::ToolCall(_) => ChildKind::ToolCall,
        }
    }

    /// Apply to a loaded child of the same kind and re-validate its fields.
    ///
    /// # Errors
    ///
    /// Returns `CaseError::Validation` on a kind mismatch or if the patched
    /// child is invalid.
    pub fn apply(&self, child: &mut CaseChild, now: DateTime<Utc>) -> Result<(), CaseError> {
        match (self, &mut *child) {
            (Self::Evidence(u), CaseChild::Evidence(e)) => u.apply(e),
            (Self::Hypothesis(u), CaseChild::Hypothesis(h)) => u.apply(h, now),
            (Self::Solution(u), CaseChild::Solution(s)) => u.apply(s, now),
            (Self::UploadedFile(u), CaseChild::UploadedFile(f)) => u.apply(f, now),
            (Self::ToolCall(u), CaseChild::ToolCall(c)) => u.apply(c, now),
            (patch, target) => {
                return Err(CaseError::Validation(format!(
                    "cannot apply a {} patch to a {}",
                    patch.kind(),
                    target.kind()
                )));
            }
        }
        child.validate()
    }

    /// Serialized changed fields, for logging.
    #[must_use]
    pub fn describe(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
