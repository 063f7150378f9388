//! Shared test utilities for case-db unit tests.

#[cfg(test)]
pub(crate) mod helpers {
    use case_config::CasebookConfig;
    use case_core::entities::{Case, Evidence};
    use case_core::enums::EvidenceCategory;
    use case_core::ids::{PREFIX_CASE, generate_id};
    use case_core::timestamps::now;

    use crate::manager::CaseManager;
    use crate::memory::InMemoryCaseRepository;
    use crate::repos::LibSqlCaseRepository;

    /// Fresh in-memory libSQL store with the schema applied.
    pub async fn libsql_repo() -> LibSqlCaseRepository {
        LibSqlCaseRepository::open_in_memory().await.unwrap()
    }

    pub fn memory_repo() -> InMemoryCaseRepository {
        InMemoryCaseRepository::new()
    }

    pub async fn libsql_manager() -> CaseManager<LibSqlCaseRepository> {
        CaseManager::new(libsql_repo().await, &CasebookConfig::default())
    }

    /// An unsaved case owned by `owner` in the default organization.
    pub fn new_case(owner: &str, title: &str) -> Case {
        Case::new(
            generate_id(PREFIX_CASE).unwrap(),
            owner,
            "default",
            title,
            "",
            now(),
        )
        .unwrap()
    }

    pub fn log_evidence(case_id: &str, summary: &str) -> Evidence {
        Evidence::new(
            case_id,
            EvidenceCategory::LogsAndErrors,
            summary,
            format!("{summary} (preprocessed)"),
            now(),
        )
        .unwrap()
    }
}
