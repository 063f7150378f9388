//! Optimistic concurrency: racing writers never both commit against the
//! same prior state.

use std::sync::Arc;

use pretty_assertions::assert_eq;

use case_config::{CasebookConfig, DatabaseConfig};
use case_core::entities::{Case, Metadata, StatusTransition};
use case_core::enums::CaseStatus;
use case_core::errors::CaseError;
use case_core::identity::CallerIdentity;
use case_core::timestamps::now;
use case_db::manager::{CaseManager, NewCase};
use case_db::repos::LibSqlCaseRepository;
use case_db::repository::CaseRepository;

/// Every recorded transition starts where the previous one ended.
fn assert_chain(history: &[StatusTransition]) {
    assert_eq!(history[0].from_status, None);
    for pair in history.windows(2) {
        assert_eq!(pair[1].from_status, Some(pair[0].to_status), "{history:#?}");
    }
}

fn is_expected_race_loss(err: &CaseError) -> bool {
    // A loser either saw a stale version or, having reloaded after the
    // winner, asked for the status the case already has.
    err.is_conflict() || err.is_validation()
}

#[tokio::test]
async fn stale_snapshot_is_rejected() {
    let repo = LibSqlCaseRepository::open_in_memory().await.unwrap();
    let manager = CaseManager::new(repo, &CasebookConfig::default());
    let caller = CallerIdentity::new("u1", "default");
    let case = manager
        .create_case(&caller, NewCase::titled("race"))
        .await
        .unwrap();

    let mut snapshot = manager.get_case(&case.id, "u1").await.unwrap();
    manager
        .transition_status(&case.id, "u1", "investigating", None)
        .await
        .unwrap();

    snapshot
        .transition_to(CaseStatus::Resolved, None, Metadata::new(), now())
        .unwrap();
    let err = manager.repository().save(&snapshot).await.unwrap_err();
    assert!(err.is_conflict(), "{err}");

    let history = manager.transitions(&case.id, "u1").await.unwrap();
    assert_eq!(history.len(), 2);
    assert_chain(&history);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_transitions_keep_a_consistent_history() {
    let repo = LibSqlCaseRepository::open_in_memory().await.unwrap();
    let manager = Arc::new(CaseManager::new(repo, &CasebookConfig::default()));
    let caller = CallerIdentity::new("u1", "default");
    let case = manager
        .create_case(&caller, NewCase::titled("race"))
        .await
        .unwrap();

    let targets = ["investigating", "resolved", "closed", "consulting"];
    let mut handles = Vec::new();
    for round in 0..4 {
        for target in targets {
            let manager = Arc::clone(&manager);
            let case_id = case.id.clone();
            handles.push(tokio::spawn(async move {
                manager
                    .transition_status(&case_id, "u1", target, Some(format!("round {round}")))
                    .await
            }));
        }
    }

    let mut committed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => committed += 1,
            Err(err) => assert!(is_expected_race_loss(&err), "{err}"),
        }
    }

    let history = manager.transitions(&case.id, "u1").await.unwrap();
    assert_eq!(history.len(), committed + 1);
    assert_chain(&history);

    let stored = manager.get_case(&case.id, "u1").await.unwrap();
    assert_eq!(stored.status, history.last().unwrap().to_status);
}

#[tokio::test]
async fn joined_transitions_from_same_snapshot() {
    let repo = Arc::new(LibSqlCaseRepository::open_in_memory().await.unwrap());
    let mut case = Case::new("case_000000000042", "u1", "default", "t", "", now()).unwrap();
    case = repo.create(&case).await.unwrap();

    let mut a = case.clone();
    a.transition_to(CaseStatus::Investigating, None, Metadata::new(), now())
        .unwrap();
    let mut b = case;
    b.transition_to(CaseStatus::Closed, None, Metadata::new(), now())
        .unwrap();

    let (ra, rb) = tokio::join!(repo.save(&a), repo.save(&b));
    assert!(ra.is_ok() != rb.is_ok(), "exactly one writer wins: {ra:?} / {rb:?}");
    let loser = ra.err().or(rb.err()).unwrap();
    assert!(loser.is_conflict(), "{loser}");

    let history = repo.transitions("case_000000000042").await.unwrap();
    assert_eq!(history.len(), 2);
    assert_chain(&history);
}

#[tokio::test]
async fn two_handles_on_one_file_detect_each_other() {
    let dir = tempfile::tempdir().unwrap();
    let config = DatabaseConfig {
        path: dir.path().join("cases.db").to_string_lossy().into_owned(),
        ..DatabaseConfig::default()
    };
    let first = LibSqlCaseRepository::open(&config).await.unwrap();
    let second = LibSqlCaseRepository::open(&config).await.unwrap();

    let created = first
        .create(&Case::new("case_0000000000aa", "u1", "default", "shared", "", now()).unwrap())
        .await
        .unwrap();
    let mut via_first = first.get(&created.id).await.unwrap();
    let mut via_second = second.get(&created.id).await.unwrap();
    assert_eq!(via_first, via_second);

    via_first
        .transition_to(CaseStatus::Investigating, None, Metadata::new(), now())
        .unwrap();
    first.save(&via_first).await.unwrap();

    via_second.title = "renamed elsewhere".into();
    let err = second.save(&via_second).await.unwrap_err();
    assert!(err.is_conflict(), "{err}");

    let reloaded = second.get(&created.id).await.unwrap();
    assert_eq!(reloaded.status, CaseStatus::Investigating);
    assert_eq!(reloaded.title, "shared");
}
