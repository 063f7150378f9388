//! Status enums, categories, and phase kinds for Casebook.
//!
//! Lifecycle enums serialize as `snake_case`; evidence categories keep their
//! historical `SCREAMING_SNAKE_CASE` wire form. Every enum exposes `as_str()`
//! returning the exact value stored in (and CHECK-constrained by) the schema.

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::CaseError;

/// Parse a stored or caller-supplied string into one of the enums below.
///
/// # Errors
///
/// Returns `CaseError::Validation` naming the rejected value.
pub fn parse_value<T: DeserializeOwned>(kind: &str, s: &str) -> Result<T, CaseError> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .map_err(|_| CaseError::Validation(format!("unknown {kind} value '{s}'")))
}

// ---------------------------------------------------------------------------
// CaseStatus
// ---------------------------------------------------------------------------

/// Lifecycle state of a case.
///
/// ```text
/// consulting ⇄ investigating ⇄ resolved ⇄ closed
/// ```
///
/// Every state may move to every other state (resolved and closed cases
/// reopen). Self-transitions are rejected because they would record a change
/// that did not happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Consulting,
    Investigating,
    Resolved,
    Closed,
}

impl CaseStatus {
    pub const ALL: [Self; 4] = [
        Self::Consulting,
        Self::Investigating,
        Self::Resolved,
        Self::Closed,
    ];

    /// Valid next states from the current state.
    #[must_use]
    pub const fn allowed_next_states(self) -> &'static [Self] {
        match self {
            Self::Consulting => &[Self::Investigating, Self::Resolved, Self::Closed],
            Self::Investigating => &[Self::Consulting, Self::Resolved, Self::Closed],
            Self::Resolved => &[Self::Consulting, Self::Investigating, Self::Closed],
            Self::Closed => &[Self::Consulting, Self::Investigating, Self::Resolved],
        }
    }

    /// Check whether transitioning to `next` is allowed.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_next_states().contains(&next)
    }

    /// Resolved and closed cases are terminal for reporting purposes only;
    /// they still accept further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::Closed)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Consulting => "consulting",
            Self::Investigating => "investigating",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaseStatus {
    type Err = CaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                CaseError::Validation(format!(
                    "unknown case status '{s}' (expected one of consulting, investigating, resolved, closed)"
                ))
            })
    }
}

// ---------------------------------------------------------------------------
// EvidenceCategory
// ---------------------------------------------------------------------------

/// Classification of an evidence artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvidenceCategory {
    LogsAndErrors,
    StructuredConfig,
    MetricsAndPerformance,
    UnstructuredText,
    SourceCode,
    VisualEvidence,
    Unknown,
}

impl EvidenceCategory {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LogsAndErrors => "LOGS_AND_ERRORS",
            Self::StructuredConfig => "STRUCTURED_CONFIG",
            Self::MetricsAndPerformance => "METRICS_AND_PERFORMANCE",
            Self::UnstructuredText => "UNSTRUCTURED_TEXT",
            Self::SourceCode => "SOURCE_CODE",
            Self::VisualEvidence => "VISUAL_EVIDENCE",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for EvidenceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// HypothesisStatus
// ---------------------------------------------------------------------------

/// Validation lifecycle of a hypothesis.
///
/// ```text
/// proposed → testing → validated
///                    → invalidated
///          → deferred → testing
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum HypothesisStatus {
    Proposed,
    Testing,
    Validated,
    Invalidated,
    Deferred,
}

impl HypothesisStatus {
    /// Validated and invalidated hypotheses carry a validation result.
    #[must_use]
    pub const fn is_concluded(self) -> bool {
        matches!(self, Self::Validated | Self::Invalidated)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Proposed => "proposed",
            Self::Testing => "testing",
            Self::Validated => "validated",
            Self::Invalidated => "invalidated",
            Self::Deferred => "deferred",
        }
    }
}

impl fmt::Display for HypothesisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// SolutionStatus
// ---------------------------------------------------------------------------

/// Implementation lifecycle of a solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SolutionStatus {
    Proposed,
    InProgress,
    Implemented,
    Verified,
    Rejected,
}

impl SolutionStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Proposed => "proposed",
            Self::InProgress => "in_progress",
            Self::Implemented => "implemented",
            Self::Verified => "verified",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for SolutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RiskLevel
// ---------------------------------------------------------------------------

/// Risk of applying a solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// FileProcessingStatus
// ---------------------------------------------------------------------------

/// Processing state of an uploaded file's metadata record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FileProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl FileProcessingStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for FileProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// MessageRole
// ---------------------------------------------------------------------------

/// Author of a conversational message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl MessageRole {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ToolCallStatus
// ---------------------------------------------------------------------------

/// Execution state of an agent tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    Pending,
    Running,
    Success,
    Error,
}

impl ToolCallStatus {
    #[must_use]
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ToolCallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// PhaseKind
// ---------------------------------------------------------------------------

/// One of the schema-flexible phase documents stored on the case row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    Consulting,
    ProblemVerification,
    WorkingConclusion,
    RootCauseConclusion,
    PathSelection,
    DegradedMode,
    EscalationState,
    Documentation,
    Progress,
}

impl PhaseKind {
    pub const ALL: [Self; 9] = [
        Self::Consulting,
        Self::ProblemVerification,
        Self::WorkingConclusion,
        Self::RootCauseConclusion,
        Self::PathSelection,
        Self::DegradedMode,
        Self::EscalationState,
        Self::Documentation,
        Self::Progress,
    ];

    /// Consulting, documentation, and progress always exist.
    #[must_use]
    pub const fn is_required(self) -> bool {
        matches!(self, Self::Consulting | Self::Documentation | Self::Progress)
    }

    /// Column name on the `cases` table. Identical to the serialized name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Consulting => "consulting",
            Self::ProblemVerification => "problem_verification",
            Self::WorkingConclusion => "working_conclusion",
            Self::RootCauseConclusion => "root_cause_conclusion",
            Self::PathSelection => "path_selection",
            Self::DegradedMode => "degraded_mode",
            Self::EscalationState => "escalation_state",
            Self::Documentation => "documentation",
            Self::Progress => "progress",
        }
    }
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn case_status_moves_between_any_distinct_states() {
        for from in CaseStatus::ALL {
            for to in CaseStatus::ALL {
                assert_eq!(from.can_transition_to(to), from != to, "{from} -> {to}");
            }
        }
    }

    #[test]
    fn resolved_case_can_reopen() {
        assert!(CaseStatus::Resolved.can_transition_to(CaseStatus::Investigating));
        assert!(CaseStatus::Closed.can_transition_to(CaseStatus::Consulting));
        assert!(CaseStatus::Closed.is_terminal());
        assert!(!CaseStatus::Investigating.is_terminal());
    }

    #[rstest]
    #[case("consulting", CaseStatus::Consulting)]
    #[case("investigating", CaseStatus::Investigating)]
    #[case("resolved", CaseStatus::Resolved)]
    #[case("closed", CaseStatus::Closed)]
    fn case_status_parses_known_values(#[case] raw: &str, #[case] expected: CaseStatus) {
        assert_eq!(raw.parse::<CaseStatus>().unwrap(), expected);
    }

    #[rstest]
    #[case("active")]
    #[case("archived")]
    #[case("Consulting")]
    #[case("")]
    fn case_status_rejects_unknown_values(#[case] raw: &str) {
        let err = raw.parse::<CaseStatus>().unwrap_err();
        assert!(err.is_validation(), "{raw}: {err}");
    }

    #[test]
    fn evidence_category_uses_screaming_case() {
        let json = serde_json::to_string(&EvidenceCategory::LogsAndErrors).unwrap();
        assert_eq!(json, "\"LOGS_AND_ERRORS\"");
        let parsed: EvidenceCategory = parse_value("evidence category", "SOURCE_CODE").unwrap();
        assert_eq!(parsed, EvidenceCategory::SourceCode);
    }

    #[test]
    fn as_str_matches_serde_name() {
        for kind in PhaseKind::ALL {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json.as_str(), Some(kind.as_str()));
        }
        let json = serde_json::to_value(SolutionStatus::InProgress).unwrap();
        assert_eq!(json.as_str(), Some(SolutionStatus::InProgress.as_str()));
    }

    #[test]
    fn required_phases() {
        let required: Vec<_> = PhaseKind::ALL.into_iter().filter(|k| k.is_required()).collect();
        assert_eq!(
            required,
            vec![PhaseKind::Consulting, PhaseKind::Documentation, PhaseKind::Progress]
        );
    }

    #[test]
    fn parse_value_rejects_unknown() {
        let result: Result<HypothesisStatus, _> = parse_value("hypothesis status", "maybe");
        assert!(matches!(result, Err(CaseError::Validation(_))));
    }
}
