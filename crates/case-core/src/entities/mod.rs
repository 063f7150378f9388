//! Entity structs for the case aggregate.
//!
//! `Case` is the root; every other type here is a child row owned by exactly
//! one case and removed with it.

mod case;
mod evidence;
mod hypothesis;
mod message;
mod solution;
mod tool_call;
mod transition;
mod uploaded_file;

pub use case::Case;
pub use evidence::Evidence;
pub use hypothesis::Hypothesis;
pub use message::CaseMessage;
pub use solution::Solution;
pub use tool_call::ToolCall;
pub use transition::{PendingTransition, StatusTransition};
pub use uploaded_file::UploadedFile;

use std::fmt;

use crate::errors::CaseError;

/// Free-form key/value annotations carried by the case and most children.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Collections that can be mutated independently of the case row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChildKind {
    Evidence,
    Hypothesis,
    Solution,
    UploadedFile,
    Message,
    ToolCall,
}

impl ChildKind {
    /// Storage table holding this collection.
    #[must_use]
    pub const fn table(self) -> &'static str {
        match self {
            Self::Evidence => "evidence",
            Self::Hypothesis => "hypotheses",
            Self::Solution => "solutions",
            Self::UploadedFile => "uploaded_files",
            Self::Message => "case_messages",
            Self::ToolCall => "agent_tool_calls",
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Evidence => "evidence",
            Self::Hypothesis => "hypothesis",
            Self::Solution => "solution",
            Self::UploadedFile => "uploaded_file",
            Self::Message => "message",
            Self::ToolCall => "tool_call",
        }
    }
}

impl fmt::Display for ChildKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One child row headed for a single-collection insert.
#[derive(Debug, Clone, PartialEq)]
pub enum CaseChild {
    Evidence(Evidence),
    Hypothesis(Hypothesis),
    Solution(Solution),
    UploadedFile(UploadedFile),
    Message(CaseMessage),
    ToolCall(ToolCall),
}

impl CaseChild {
    #[must_use]
    pub const fn kind(&self) -> ChildKind {
        match self {
            Self::Evidence(_) => ChildKind::Evidence,
            Self::Hypothesis(_) => ChildKind::Hypothesis,
            Self::Solution(_) => ChildKind::Solution,
            Self::UploadedFile(_) => ChildKind::UploadedFile,
            Self::Message(_) => ChildKind::Message,
            Self::ToolCall(_) => ChildKind::ToolCall,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Evidence(e) => &e.id,
            Self::Hypothesis(h) => &h.id,
            Self::Solution(s) => &s.id,
            Self::UploadedFile(f) => &f.id,
            Self::Message(m) => &m.id,
            Self::ToolCall(c) => &c.id,
        }
    }

    #[must_use]
    pub fn case_id(&self) -> &str {
        match self {
            Self::Evidence(e) => &e.case_id,
            Self::Hypothesis(h) => &h.case_id,
            Self::Solution(s) => &s.case_id,
            Self::UploadedFile(f) => &f.case_id,
            Self::Message(m) => &m.case_id,
            Self::ToolCall(c) => &c.case_id,
        }
    }

    /// Field-level checks only. Cross-row checks (such as evidence references)
    /// need the stored case and are done by the repository.
    ///
    /// # Errors
    ///
    /// Returns `CaseError::Validation` if the child is malformed.
    pub fn validate(&self) -> Result<(), CaseError> {
        match self {
            Self::Evidence(e) => e.validate(),
            Self::Hypothesis(h) => h.validate(),
            Self::Solution(s) => s.validate(),
            Self::UploadedFile(f) => f.validate(),
            Self::Message(m) => m.validate(),
            Self::ToolCall(c) => c.validate(),
        }
    }
}
