//! Behavior every `CaseRepository` backend must share.
//!
//! Each test runs once against the libSQL store and once against the
//! in-memory store.

use chrono::Duration;
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::json;

use case_core::entities::{
    Case, CaseChild, CaseMessage, ChildKind, Evidence, Hypothesis, Metadata, ToolCall,
};
use case_core::enums::{
    CaseStatus, EvidenceCategory, HypothesisStatus, MessageRole, PhaseKind, ToolCallStatus,
};
use case_core::errors::CaseError;
use case_core::ids::{PREFIX_CASE, generate_id};
use case_core::timestamps::now;
use case_db::memory::InMemoryCaseRepository;
use case_db::repos::LibSqlCaseRepository;
use case_db::repository::{CaseFilter, CaseRepository};
use case_db::updates::{ChildPatch, HypothesisUpdateBuilder, ToolCallUpdateBuilder};

#[derive(Debug, Clone, Copy)]
enum Backend {
    LibSql,
    Memory,
}

async fn open(backend: Backend) -> Box<dyn CaseRepository> {
    match backend {
        Backend::LibSql => Box::new(LibSqlCaseRepository::open_in_memory().await.unwrap()),
        Backend::Memory => Box::new(InMemoryCaseRepository::new()),
    }
}

fn new_case(owner: &str, title: &str) -> Case {
    Case::new(generate_id(PREFIX_CASE).unwrap(), owner, "default", title, "", now()).unwrap()
}

fn evidence(case_id: &str, summary: &str, content: &str) -> Evidence {
    Evidence::new(case_id, EvidenceCategory::LogsAndErrors, summary, content, now()).unwrap()
}

async fn created(repo: &dyn CaseRepository, owner: &str, title: &str) -> Case {
    repo.create(&new_case(owner, title)).await.unwrap()
}

// ---------------------------------------------------------------------------
// Create / get
// ---------------------------------------------------------------------------

#[rstest]
#[tokio::test]
async fn create_then_get_starts_consulting(
    #[values(Backend::LibSql, Backend::Memory)] backend: Backend,
) {
    let repo = open(backend).await;
    let case = created(repo.as_ref(), "u1", "checkout latency").await;

    let loaded = repo.get(&case.id).await.unwrap();
    assert_eq!(loaded.status, CaseStatus::Consulting);
    assert_eq!(loaded.version, 1);
    assert_eq!(loaded.status_history.len(), 1);
    assert_eq!(loaded.status_history[0].from_status, None);
    assert_eq!(loaded.status_history[0].to_status, CaseStatus::Consulting);
    assert!(loaded.pending_transitions.is_empty());
    assert_eq!(loaded, case);
}

#[rstest]
#[tokio::test]
async fn get_is_idempotent(#[values(Backend::LibSql, Backend::Memory)] backend: Backend) {
    let repo = open(backend).await;
    let case = created(repo.as_ref(), "u1", "t").await;
    repo.add_child(&case.id, CaseChild::Evidence(evidence(&case.id, "db timeout", "pool exhausted")))
        .await
        .unwrap();

    let first = repo.get(&case.id).await.unwrap();
    let second = repo.get(&case.id).await.unwrap();
    assert_eq!(first, second);
}

#[rstest]
#[tokio::test]
async fn create_with_children_persists_them(
    #[values(Backend::LibSql, Backend::Memory)] backend: Backend,
) {
    let repo = open(backend).await;
    let mut case = new_case("u1", "t");
    let ev = evidence(&case.id, "db timeout", "connection pool exhausted");
    let hyp = Hypothesis::new(&case.id, "pool too small", now())
        .unwrap()
        .with_supporting_evidence(vec![ev.id.clone()]);
    case.evidence.push(ev.clone());
    case.hypotheses.push(hyp);
    case.tags = vec!["db".into(), "api".into()];

    let stored = repo.create(&case).await.unwrap();
    assert_eq!(stored.evidence, vec![ev.clone()]);
    assert_eq!(stored.hypotheses[0].supporting_evidence_ids, vec![ev.id]);
    assert_eq!(stored.tags, vec!["api".to_string(), "db".to_string()]);
}

#[rstest]
#[tokio::test]
async fn duplicate_create_conflicts(#[values(Backend::LibSql, Backend::Memory)] backend: Backend) {
    let repo = open(backend).await;
    let case = new_case("u1", "t");
    repo.create(&case).await.unwrap();
    assert!(repo.create(&case).await.unwrap_err().is_conflict());
}

#[rstest]
#[tokio::test]
async fn create_requires_initial_transition(
    #[values(Backend::LibSql, Backend::Memory)] backend: Backend,
) {
    let repo = open(backend).await;
    let mut case = new_case("u1", "t");
    case.pending_transitions.clear();
    assert!(repo.create(&case).await.unwrap_err().is_validation());
    assert!(repo.get(&case.id).await.unwrap_err().is_not_found());
}

#[rstest]
#[tokio::test]
async fn missing_case_is_not_found(#[values(Backend::LibSql, Backend::Memory)] backend: Backend) {
    let repo = open(backend).await;
    assert!(repo.get("case_000000000000").await.unwrap_err().is_not_found());
    assert!(repo.delete("case_000000000000").await.unwrap_err().is_not_found());
    assert!(repo.transitions("case_000000000000").await.unwrap_err().is_not_found());
    let err = repo
        .touch_activity("case_000000000000", now())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

// ---------------------------------------------------------------------------
// Save and transitions
// ---------------------------------------------------------------------------

#[rstest]
#[tokio::test]
async fn n_transitions_yield_n_plus_one_records(
    #[values(Backend::LibSql, Backend::Memory)] backend: Backend,
    #[values(1, 4)] n: usize,
) {
    let repo = open(backend).await;
    let mut case = created(repo.as_ref(), "u1", "t").await;
    let cycle = [
        CaseStatus::Investigating,
        CaseStatus::Resolved,
        CaseStatus::Investigating,
        CaseStatus::Closed,
    ];
    for to in cycle.iter().take(n) {
        case.transition_to(*to, Some(format!("to {to}")), Metadata::new(), now())
            .unwrap();
        case = repo.save(&case).await.unwrap();
    }

    let history = repo.transitions(&case.id).await.unwrap();
    assert_eq!(history.len(), n + 1);
    assert!(history.windows(2).all(|w| w[0].id < w[1].id));
    assert!(history.windows(2).all(|w| w[1].from_status == Some(w[0].to_status)));
    assert_eq!(history.last().unwrap().to_status, case.status);
    assert_eq!(case.version, 1 + n as u64);
}

#[rstest]
#[tokio::test]
async fn stale_snapshot_conflicts(#[values(Backend::LibSql, Backend::Memory)] backend: Backend) {
    let repo = open(backend).await;
    let case = created(repo.as_ref(), "u1", "t").await;

    let mut a = repo.get(&case.id).await.unwrap();
    let mut b = repo.get(&case.id).await.unwrap();
    a.transition_to(CaseStatus::Investigating, None, Metadata::new(), now())
        .unwrap();
    b.transition_to(CaseStatus::Closed, None, Metadata::new(), now())
        .unwrap();

    repo.save(&a).await.unwrap();
    let err = repo.save(&b).await.unwrap_err();
    assert!(err.is_conflict(), "{err}");

    let stored = repo.get(&case.id).await.unwrap();
    assert_eq!(stored.status, CaseStatus::Investigating);
    assert_eq!(stored.status_history.len(), 2);
}

#[rstest]
#[tokio::test]
async fn status_change_without_transition_rejected(
    #[values(Backend::LibSql, Backend::Memory)] backend: Backend,
) {
    let repo = open(backend).await;
    let mut case = created(repo.as_ref(), "u1", "t").await;
    case.status = CaseStatus::Resolved;
    assert!(repo.save(&case).await.unwrap_err().is_validation());
    assert_eq!(repo.get(&case.id).await.unwrap().status, CaseStatus::Consulting);
}

#[rstest]
#[tokio::test]
async fn save_reconciles_children_additively(
    #[values(Backend::LibSql, Backend::Memory)] backend: Backend,
) {
    let repo = open(backend).await;
    let snapshot = created(repo.as_ref(), "u1", "t").await;

    // Appended behind the snapshot's back.
    let side = evidence(&snapshot.id, "side channel", "added independently");
    repo.add_child(&snapshot.id, CaseChild::Evidence(side.clone()))
        .await
        .unwrap();

    let mut case = snapshot;
    let ev = evidence(&case.id, "db timeout", "pool exhausted");
    case.evidence.push(ev.clone());
    case.title = "renamed".into();
    let saved = repo.save(&case).await.unwrap();

    assert_eq!(saved.title, "renamed");
    let ids: Vec<&str> = saved.evidence.iter().map(|e| e.id.as_str()).collect();
    assert!(ids.contains(&side.id.as_str()), "rows missing from the snapshot survive");
    assert!(ids.contains(&ev.id.as_str()));

    // Modified known rows are updated in place.
    let mut again = saved;
    again.evidence.iter_mut().find(|e| e.id == ev.id).unwrap().summary = "db timeout (p99)".into();
    let saved = repo.save(&again).await.unwrap();
    let updated = saved.evidence.iter().find(|e| e.id == ev.id).unwrap();
    assert_eq!(updated.summary, "db timeout (p99)");
    assert_eq!(saved.evidence.len(), 2);
}

#[rstest]
#[tokio::test]
async fn save_never_rewrites_messages(
    #[values(Backend::LibSql, Backend::Memory)] backend: Backend,
) {
    let repo = open(backend).await;
    let case = created(repo.as_ref(), "u1", "t").await;
    let msg = CaseMessage::new(&case.id, MessageRole::User, "original", now()).unwrap();
    repo.add_child(&case.id, CaseChild::Message(msg.clone()))
        .await
        .unwrap();

    let mut case = repo.get(&case.id).await.unwrap();
    case.messages[0].content = "edited".into();
    let saved = repo.save(&case).await.unwrap();
    assert_eq!(saved.messages, vec![msg]);
}

#[rstest]
#[tokio::test]
async fn failed_save_leaves_case_unchanged(
    #[values(Backend::LibSql, Backend::Memory)] backend: Backend,
) {
    let repo = open(backend).await;
    let case = created(repo.as_ref(), "u1", "t").await;

    let mut bad = case.clone();
    bad.transition_to(CaseStatus::Investigating, None, Metadata::new(), now())
        .unwrap();
    bad.hypotheses.push(
        Hypothesis::new(&bad.id, "dangling", now())
            .unwrap()
            .with_supporting_evidence(vec!["ev_000000000000".into()]),
    );
    assert!(repo.save(&bad).await.unwrap_err().is_validation());
    assert_eq!(repo.get(&case.id).await.unwrap(), case);
}

// ---------------------------------------------------------------------------
// Child operations
// ---------------------------------------------------------------------------

#[rstest]
#[tokio::test]
async fn hypothesis_needs_evidence_from_same_case(
    #[values(Backend::LibSql, Backend::Memory)] backend: Backend,
) {
    let repo = open(backend).await;
    let a = created(repo.as_ref(), "u1", "a").await;
    let b = created(repo.as_ref(), "u1", "b").await;
    let foreign = evidence(&b.id, "other case", "belongs to b");
    repo.add_child(&b.id, CaseChild::Evidence(foreign.clone()))
        .await
        .unwrap();

    let hyp = Hypothesis::new(&a.id, "borrowed evidence", now())
        .unwrap()
        .with_supporting_evidence(vec![foreign.id]);
    let err = repo
        .add_child(&a.id, CaseChild::Hypothesis(hyp))
        .await
        .unwrap_err();
    assert!(err.is_validation(), "{err}");
    assert!(repo.get(&a.id).await.unwrap().hypotheses.is_empty());
}

#[rstest]
#[tokio::test]
async fn child_for_other_case_rejected(
    #[values(Backend::LibSql, Backend::Memory)] backend: Backend,
) {
    let repo = open(backend).await;
    let a = created(repo.as_ref(), "u1", "a").await;
    let b = created(repo.as_ref(), "u1", "b").await;
    let err = repo
        .add_child(&a.id, CaseChild::Evidence(evidence(&b.id, "s", "c")))
        .await
        .unwrap_err();
    assert!(err.is_validation());
}

#[rstest]
#[tokio::test]
async fn duplicate_child_id_conflicts(
    #[values(Backend::LibSql, Backend::Memory)] backend: Backend,
) {
    let repo = open(backend).await;
    let case = created(repo.as_ref(), "u1", "t").await;
    let ev = evidence(&case.id, "s", "c");
    repo.add_child(&case.id, CaseChild::Evidence(ev.clone()))
        .await
        .unwrap();
    let err = repo
        .add_child(&case.id, CaseChild::Evidence(ev))
        .await
        .unwrap_err();
    assert!(err.is_conflict(), "{err}");
}

#[rstest]
#[tokio::test]
async fn add_child_to_missing_case(#[values(Backend::LibSql, Backend::Memory)] backend: Backend) {
    let repo = open(backend).await;
    let err = repo
        .add_child(
            "case_000000000000",
            CaseChild::Evidence(evidence("case_000000000000", "s", "c")),
        )
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[rstest]
#[tokio::test]
async fn deleting_evidence_prunes_references(
    #[values(Backend::LibSql, Backend::Memory)] backend: Backend,
) {
    let repo = open(backend).await;
    let case = created(repo.as_ref(), "u1", "t").await;
    let keep = evidence(&case.id, "keep", "stays");
    let drop = evidence(&case.id, "drop", "goes");
    for ev in [&keep, &drop] {
        repo.add_child(&case.id, CaseChild::Evidence(ev.clone()))
            .await
            .unwrap();
    }
    let hyp = Hypothesis::new(&case.id, "both matter", now())
        .unwrap()
        .with_supporting_evidence(vec![drop.id.clone(), keep.id.clone()]);
    repo.add_child(&case.id, CaseChild::Hypothesis(hyp.clone()))
        .await
        .unwrap();

    repo.delete_child(&case.id, ChildKind::Evidence, &drop.id)
        .await
        .unwrap();

    let loaded = repo.get(&case.id).await.unwrap();
    assert_eq!(loaded.hypotheses.len(), 1, "the hypothesis survives");
    assert_eq!(loaded.hypotheses[0].supporting_evidence_ids, vec![keep.id]);
}

#[rstest]
#[tokio::test]
async fn update_child_applies_patch(#[values(Backend::LibSql, Backend::Memory)] backend: Backend) {
    let repo = open(backend).await;
    let case = created(repo.as_ref(), "u1", "t").await;
    let ev = evidence(&case.id, "s", "c");
    repo.add_child(&case.id, CaseChild::Evidence(ev.clone()))
        .await
        .unwrap();
    let hyp = Hypothesis::new(&case.id, "pool too small", now()).unwrap();
    repo.add_child(&case.id, CaseChild::Hypothesis(hyp.clone()))
        .await
        .unwrap();

    let patch = ChildPatch::Hypothesis(
        HypothesisUpdateBuilder::new()
            .status(HypothesisStatus::Validated)
            .confidence(Some(0.9))
            .supporting_evidence(vec![ev.id.clone()])
            .build(),
    );
    let CaseChild::Hypothesis(updated) = repo.update_child(&case.id, &hyp.id, &patch).await.unwrap()
    else {
        panic!("expected a hypothesis");
    };
    assert_eq!(updated.status, HypothesisStatus::Validated);
    assert!(updated.validated_at.is_some());

    let loaded = repo.get(&case.id).await.unwrap();
    assert_eq!(loaded.hypotheses, vec![updated]);
    assert_eq!(loaded.hypotheses[0].supporting_evidence_ids, vec![ev.id]);
}

#[rstest]
#[tokio::test]
async fn update_child_rejects_invalid_patch(
    #[values(Backend::LibSql, Backend::Memory)] backend: Backend,
) {
    let repo = open(backend).await;
    let case = created(repo.as_ref(), "u1", "t").await;
    let hyp = Hypothesis::new(&case.id, "h", now()).unwrap();
    repo.add_child(&case.id, CaseChild::Hypothesis(hyp.clone()))
        .await
        .unwrap();

    let out_of_range = ChildPatch::Hypothesis(HypothesisUpdateBuilder::new().confidence(Some(1.5)).build());
    assert!(repo
        .update_child(&case.id, &hyp.id, &out_of_range)
        .await
        .unwrap_err()
        .is_validation());

    let dangling = ChildPatch::Hypothesis(
        HypothesisUpdateBuilder::new()
            .supporting_evidence(vec!["ev_000000000000".into()])
            .build(),
    );
    assert!(repo
        .update_child(&case.id, &hyp.id, &dangling)
        .await
        .unwrap_err()
        .is_validation());
    assert_eq!(repo.get(&case.id).await.unwrap().hypotheses, vec![hyp]);
}

#[rstest]
#[tokio::test]
async fn update_missing_child_is_not_found(
    #[values(Backend::LibSql, Backend::Memory)] backend: Backend,
) {
    let repo = open(backend).await;
    let case = created(repo.as_ref(), "u1", "t").await;
    let patch = ChildPatch::ToolCall(
        ToolCallUpdateBuilder::new()
            .status(ToolCallStatus::Success)
            .build(),
    );
    match repo.update_child(&case.id, "call_0000000000000000", &patch).await {
        Err(CaseError::NotFound { entity_type, .. }) => assert_eq!(entity_type, "tool_call"),
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[rstest]
#[tokio::test]
async fn tool_call_completion_recorded(
    #[values(Backend::LibSql, Backend::Memory)] backend: Backend,
) {
    let repo = open(backend).await;
    let case = created(repo.as_ref(), "u1", "t").await;
    let call = ToolCall::new(&case.id, "query_logs", json!({"service": "checkout"}), now()).unwrap();
    repo.add_child(&case.id, CaseChild::ToolCall(call.clone()))
        .await
        .unwrap();

    let patch = ChildPatch::ToolCall(
        ToolCallUpdateBuilder::new()
            .status(ToolCallStatus::Success)
            .output(Some(json!({"lines": 42})))
            .build(),
    );
    repo.update_child(&case.id, &call.id, &patch).await.unwrap();

    let stored = &repo.get(&case.id).await.unwrap().tool_calls[0];
    assert_eq!(stored.status, ToolCallStatus::Success);
    assert_eq!(stored.output, Some(json!({"lines": 42})));
    assert!(stored.completed_at.is_some());
}

#[rstest]
#[tokio::test]
async fn messages_are_append_only(#[values(Backend::LibSql, Backend::Memory)] backend: Backend) {
    let repo = open(backend).await;
    let case = created(repo.as_ref(), "u1", "t").await;
    let msg = CaseMessage::new(&case.id, MessageRole::User, "hi", now()).unwrap();
    repo.add_child(&case.id, CaseChild::Message(msg.clone()))
        .await
        .unwrap();
    let err = repo
        .delete_child(&case.id, ChildKind::Message, &msg.id)
        .await
        .unwrap_err();
    assert!(err.is_validation());
    assert_eq!(repo.list_messages(&case.id, 10, 0).await.unwrap(), vec![msg]);
}

#[rstest]
#[tokio::test]
async fn messages_order_by_timestamp_then_insertion(
    #[values(Backend::LibSql, Backend::Memory)] backend: Backend,
) {
    let repo = open(backend).await;
    let case = created(repo.as_ref(), "u1", "t").await;
    let at = now();
    let first = CaseMessage::new(&case.id, MessageRole::User, "first", at).unwrap();
    let second = CaseMessage::new(&case.id, MessageRole::Assistant, "second", at).unwrap();
    let earlier =
        CaseMessage::new(&case.id, MessageRole::System, "earlier", at - Duration::seconds(1))
            .unwrap();
    for msg in [&first, &second, &earlier] {
        repo.add_child(&case.id, CaseChild::Message(msg.clone()))
            .await
            .unwrap();
    }

    let all = repo.list_messages(&case.id, 10, 0).await.unwrap();
    assert_eq!(all, vec![earlier.clone(), first.clone(), second.clone()]);
    assert_eq!(repo.get(&case.id).await.unwrap().messages, all);
    assert_eq!(repo.list_messages(&case.id, 1, 1).await.unwrap(), vec![first]);
}

#[rstest]
#[tokio::test]
async fn delete_missing_child_is_not_found(
    #[values(Backend::LibSql, Backend::Memory)] backend: Backend,
) {
    let repo = open(backend).await;
    let case = created(repo.as_ref(), "u1", "t").await;
    let err = repo
        .delete_child(&case.id, ChildKind::Solution, "sol_000000000000")
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

// ---------------------------------------------------------------------------
// Save against concurrent child changes
// ---------------------------------------------------------------------------

#[rstest]
#[tokio::test]
async fn stale_save_cannot_undo_child_update(
    #[values(Backend::LibSql, Backend::Memory)] backend: Backend,
) {
    let repo = open(backend).await;
    let case = created(repo.as_ref(), "u1", "t").await;
    let hyp = Hypothesis::new(&case.id, "pool too small", now()).unwrap();
    repo.add_child(&case.id, CaseChild::Hypothesis(hyp.clone()))
        .await
        .unwrap();

    let mut snapshot = repo.get(&case.id).await.unwrap();
    let patch = ChildPatch::Hypothesis(
        HypothesisUpdateBuilder::new()
            .status(HypothesisStatus::Validated)
            .build(),
    );
    repo.update_child(&case.id, &hyp.id, &patch).await.unwrap();

    snapshot
        .transition_to(CaseStatus::Investigating, None, Metadata::new(), now())
        .unwrap();
    let err = repo.save(&snapshot).await.unwrap_err();
    assert!(err.is_conflict(), "{err}");

    let mut fresh = repo.get(&case.id).await.unwrap();
    assert_eq!(fresh.hypotheses[0].status, HypothesisStatus::Validated);
    fresh
        .transition_to(CaseStatus::Investigating, None, Metadata::new(), now())
        .unwrap();
    let saved = repo.save(&fresh).await.unwrap();
    assert_eq!(saved.hypotheses[0].status, HypothesisStatus::Validated);
}

#[rstest]
#[tokio::test]
async fn stale_save_cannot_restore_removed_child_or_tag(
    #[values(Backend::LibSql, Backend::Memory)] backend: Backend,
) {
    let repo = open(backend).await;
    let case = created(repo.as_ref(), "u1", "t").await;
    let ev = evidence(&case.id, "s", "c");
    repo.add_child(&case.id, CaseChild::Evidence(ev.clone()))
        .await
        .unwrap();
    repo.add_tag(&case.id, "db").await.unwrap();

    let mut before_delete = repo.get(&case.id).await.unwrap();
    repo.delete_child(&case.id, ChildKind::Evidence, &ev.id)
        .await
        .unwrap();
    before_delete.title = "renamed".into();
    assert!(repo.save(&before_delete).await.unwrap_err().is_conflict());

    let mut before_untag = repo.get(&case.id).await.unwrap();
    repo.remove_tag(&case.id, "db").await.unwrap();
    before_untag.title = "renamed".into();
    assert!(repo.save(&before_untag).await.unwrap_err().is_conflict());

    let loaded = repo.get(&case.id).await.unwrap();
    assert!(loaded.evidence.is_empty());
    assert!(loaded.tags.is_empty());
    assert_eq!(loaded.title, "t");
}

#[rstest]
#[tokio::test]
async fn appends_keep_earlier_snapshot_saveable(
    #[values(Backend::LibSql, Backend::Memory)] backend: Backend,
) {
    let repo = open(backend).await;
    let case = created(repo.as_ref(), "u1", "t").await;

    let mut snapshot = repo.get(&case.id).await.unwrap();
    repo.add_child(&case.id, CaseChild::Evidence(evidence(&case.id, "s", "c")))
        .await
        .unwrap();
    repo.add_tag(&case.id, "db").await.unwrap();

    snapshot.title = "renamed".into();
    let saved = repo.save(&snapshot).await.unwrap();
    assert_eq!(saved.title, "renamed");
    assert_eq!(saved.evidence.len(), 1);
    assert_eq!(saved.tags, vec!["db".to_string()]);
}

#[rstest]
#[tokio::test]
async fn save_rejects_hypothesis_id_of_other_case(
    #[values(Backend::LibSql, Backend::Memory)] backend: Backend,
) {
    let repo = open(backend).await;
    let a = created(repo.as_ref(), "u1", "a").await;
    let b = created(repo.as_ref(), "u1", "b").await;
    let b_ev = evidence(&b.id, "s", "c");
    repo.add_child(&b.id, CaseChild::Evidence(b_ev.clone()))
        .await
        .unwrap();
    let b_hyp = Hypothesis::new(&b.id, "belongs to b", now())
        .unwrap()
        .with_supporting_evidence(vec![b_ev.id.clone()]);
    repo.add_child(&b.id, CaseChild::Hypothesis(b_hyp.clone()))
        .await
        .unwrap();

    let mut a_snapshot = repo.get(&a.id).await.unwrap();
    let mut reused = Hypothesis::new(&a.id, "same id, other case", now()).unwrap();
    reused.id.clone_from(&b_hyp.id);
    a_snapshot.hypotheses.push(reused);

    let err = repo.save(&a_snapshot).await.unwrap_err();
    assert!(err.is_conflict(), "{err}");

    assert_eq!(repo.get(&a.id).await.unwrap(), a);
    let b_loaded = repo.get(&b.id).await.unwrap();
    assert_eq!(b_loaded.hypotheses, vec![b_hyp]);
    assert_eq!(b_loaded.hypotheses[0].supporting_evidence_ids, vec![b_ev.id]);
}

#[rstest]
#[tokio::test]
async fn save_rejects_message_id_of_other_case(
    #[values(Backend::LibSql, Backend::Memory)] backend: Backend,
) {
    let repo = open(backend).await;
    let a = created(repo.as_ref(), "u1", "a").await;
    let b = created(repo.as_ref(), "u1", "b").await;
    let b_msg = CaseMessage::new(&b.id, MessageRole::User, "from b", now()).unwrap();
    repo.add_child(&b.id, CaseChild::Message(b_msg.clone()))
        .await
        .unwrap();

    let mut a_snapshot = repo.get(&a.id).await.unwrap();
    let mut reused = CaseMessage::new(&a.id, MessageRole::User, "from a", now()).unwrap();
    reused.id.clone_from(&b_msg.id);
    a_snapshot.messages.push(reused);

    assert!(repo.save(&a_snapshot).await.unwrap_err().is_conflict());
    assert!(repo.get(&a.id).await.unwrap().messages.is_empty());
    assert_eq!(repo.list_messages(&b.id, 10, 0).await.unwrap(), vec![b_msg]);
}

// ---------------------------------------------------------------------------
// Phases, activity, tags
// ---------------------------------------------------------------------------

#[rstest]
#[tokio::test]
async fn update_phase_writes_one_document(
    #[values(Backend::LibSql, Backend::Memory)] backend: Backend,
) {
    let repo = open(backend).await;
    let case = created(repo.as_ref(), "u1", "t").await;
    let doc = json!({"statement": "pool exhaustion", "confidence": 0.7});

    repo.update_phase(&case.id, PhaseKind::WorkingConclusion, Some(doc.clone()))
        .await
        .unwrap();
    let loaded = repo.get(&case.id).await.unwrap();
    assert_eq!(loaded.phases.working_conclusion, Some(doc));
    assert_eq!(loaded.phases.progress, case.phases.progress);
    assert_eq!(loaded.version, case.version + 1);

    let err = repo
        .update_phase(&case.id, PhaseKind::Progress, None)
        .await
        .unwrap_err();
    assert!(err.is_validation());
    let err = repo
        .update_phase(&case.id, PhaseKind::DegradedMode, Some(json!([1, 2])))
        .await
        .unwrap_err();
    assert!(err.is_validation());

    // The phase write moved the version, so the old snapshot is stale.
    let mut stale = case;
    stale.title = "late".into();
    assert!(repo.save(&stale).await.unwrap_err().is_conflict());
}

#[rstest]
#[tokio::test]
async fn touch_activity_only_moves_forward(
    #[values(Backend::LibSql, Backend::Memory)] backend: Backend,
) {
    let repo = open(backend).await;
    let case = created(repo.as_ref(), "u1", "t").await;
    let later = case.last_activity_at + Duration::minutes(10);

    repo.touch_activity(&case.id, later).await.unwrap();
    repo.touch_activity(&case.id, case.last_activity_at - Duration::hours(1))
        .await
        .unwrap();

    let loaded = repo.get(&case.id).await.unwrap();
    assert_eq!(loaded.last_activity_at, later);
    assert_eq!(loaded.version, case.version);
}

#[rstest]
#[tokio::test]
async fn tags_are_idempotent_and_sorted(
    #[values(Backend::LibSql, Backend::Memory)] backend: Backend,
) {
    let repo = open(backend).await;
    let case = created(repo.as_ref(), "u1", "t").await;
    for tag in ["db", "api", "db"] {
        repo.add_tag(&case.id, tag).await.unwrap();
    }
    assert_eq!(repo.get(&case.id).await.unwrap().tags, vec!["api", "db"]);

    assert!(repo.add_tag(&case.id, "  ").await.unwrap_err().is_validation());
    repo.remove_tag(&case.id, "api").await.unwrap();
    assert!(repo.remove_tag(&case.id, "api").await.unwrap_err().is_not_found());
    assert_eq!(repo.get(&case.id).await.unwrap().tags, vec!["db"]);
}

// ---------------------------------------------------------------------------
// Listing, search, retention
// ---------------------------------------------------------------------------

#[rstest]
#[tokio::test]
async fn list_by_owner_filters_and_counts(
    #[values(Backend::LibSql, Backend::Memory)] backend: Backend,
) {
    let repo = open(backend).await;
    created(repo.as_ref(), "u1", "a").await;
    let b = created(repo.as_ref(), "u1", "b").await;
    let c = created(repo.as_ref(), "u1", "c").await;
    created(repo.as_ref(), "u2", "not mine").await;

    let mut b = b;
    b.transition_to(CaseStatus::Investigating, None, Metadata::new(), now())
        .unwrap();
    let b = repo.save(&b).await.unwrap();
    repo.add_tag(&c.id, "db").await.unwrap();

    let all = repo.list_by_owner("u1", &CaseFilter::default()).await.unwrap();
    assert_eq!(all.total, 3);
    assert!(all.cases.iter().all(|case| case.owner_id == "u1"));
    assert_eq!(all.cases[0].id, b.id, "most recently updated first");

    let investigating = repo
        .list_by_owner("u1", &CaseFilter::default().with_status(CaseStatus::Investigating))
        .await
        .unwrap();
    assert_eq!(investigating.total, 1);
    assert_eq!(investigating.cases[0].id, b.id);

    let tagged = repo
        .list_by_owner("u1", &CaseFilter::default().with_tag("db"))
        .await
        .unwrap();
    assert_eq!(tagged.cases.len(), 1);
    assert_eq!(tagged.cases[0].id, c.id);

    let paged = repo
        .list_by_owner("u1", &CaseFilter::default().page(2, 2))
        .await
        .unwrap();
    assert_eq!(paged.total, 3);
    assert_eq!(paged.cases.len(), 1);

    let other_org = repo
        .list_by_owner("u1", &CaseFilter::default().with_org("acme"))
        .await
        .unwrap();
    assert_eq!(other_org.total, 0);
}

#[rstest]
#[tokio::test]
async fn count_created_since_is_per_owner(
    #[values(Backend::LibSql, Backend::Memory)] backend: Backend,
) {
    let repo = open(backend).await;
    let before = now() - Duration::seconds(1);
    created(repo.as_ref(), "u1", "a").await;
    created(repo.as_ref(), "u1", "b").await;
    created(repo.as_ref(), "u2", "c").await;
    assert_eq!(repo.count_created_since("u1", before).await.unwrap(), 2);
    assert_eq!(
        repo.count_created_since("u1", now() + Duration::seconds(1))
            .await
            .unwrap(),
        0
    );
}

#[rstest]
#[tokio::test]
async fn search_covers_title_and_evidence(
    #[values(Backend::LibSql, Backend::Memory)] backend: Backend,
) {
    let repo = open(backend).await;
    let titled = created(repo.as_ref(), "u1", "checkout latency spike").await;
    let via_evidence = created(repo.as_ref(), "u1", "nightly batch").await;
    repo.add_child(
        &via_evidence.id,
        CaseChild::Evidence(evidence(&via_evidence.id, "job log", "connection timeout to warehouse")),
    )
    .await
    .unwrap();
    created(repo.as_ref(), "u2", "checkout latency elsewhere").await;

    let by_title = repo.search("u1", "checkout latency", 10).await.unwrap();
    assert_eq!(by_title.total, 1);
    assert_eq!(by_title.cases[0].id, titled.id);

    let by_content = repo.search("u1", "warehouse", 10).await.unwrap();
    assert_eq!(by_content.total, 1);
    assert_eq!(by_content.cases[0].id, via_evidence.id);

    let in_case = repo
        .search_evidence(&via_evidence.id, "timeout", 10)
        .await
        .unwrap();
    assert_eq!(in_case.len(), 1);

    assert!(repo.search("u1", "   ", 10).await.unwrap_err().is_validation());
}

#[rstest]
#[tokio::test]
async fn search_tolerates_query_syntax(
    #[values(Backend::LibSql, Backend::Memory)] backend: Backend,
) {
    let repo = open(backend).await;
    created(repo.as_ref(), "u1", "checkout latency").await;
    let page = repo.search("u1", "checkout OR (nonexistent", 10).await.unwrap();
    assert_eq!(page.total, 0);
}

#[rstest]
#[tokio::test]
async fn cleanup_removes_old_closed_cases_in_batches(
    #[values(Backend::LibSql, Backend::Memory)] backend: Backend,
) {
    let repo = open(backend).await;
    let long_ago = now() - Duration::days(120);
    let mut old_ids = Vec::new();
    for i in 0..3 {
        let mut case = created(repo.as_ref(), "u1", &format!("old {i}")).await;
        case.transition_to(CaseStatus::Closed, None, Metadata::new(), long_ago)
            .unwrap();
        old_ids.push(repo.save(&case).await.unwrap().id);
    }
    let open_case = created(repo.as_ref(), "u1", "still open").await;

    let cutoff = now() - Duration::days(90);
    assert_eq!(repo.cleanup_expired(cutoff, 2).await.unwrap(), 2);
    assert_eq!(repo.cleanup_expired(cutoff, 2).await.unwrap(), 1);
    assert_eq!(repo.cleanup_expired(cutoff, 2).await.unwrap(), 0);

    for id in &old_ids {
        assert!(repo.get(id).await.unwrap_err().is_not_found());
    }
    repo.get(&open_case.id).await.unwrap();
}

#[rstest]
#[tokio::test]
async fn delete_removes_case(#[values(Backend::LibSql, Backend::Memory)] backend: Backend) {
    let repo = open(backend).await;
    let case = created(repo.as_ref(), "u1", "t").await;
    repo.add_child(&case.id, CaseChild::Evidence(evidence(&case.id, "s", "c")))
        .await
        .unwrap();
    repo.delete(&case.id).await.unwrap();
    assert!(repo.get(&case.id).await.unwrap_err().is_not_found());
    assert_eq!(repo.list_by_owner("u1", &CaseFilter::default()).await.unwrap().total, 0);
}
