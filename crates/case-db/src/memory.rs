//! In-process [`CaseRepository`] for tests and embedding.
//!
//! Mirrors the libSQL backend's observable behavior: version checks,
//! global child identifiers, evidence reference checks, child ordering, and
//! cascade on delete. Every operation works on a copy of the stored case and
//! swaps it in only when the whole unit succeeds.
//!
//! Search is a case-insensitive substring match on every query term, without
//! stemming.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::Mutex;

use case_core::entities::{Case, CaseChild, CaseMessage, ChildKind, Evidence, StatusTransition};
use case_core::enums::{CaseStatus, PhaseKind};
use case_core::errors::CaseError;
use case_core::timestamps::now;
use case_core::validation::require_non_empty;

use crate::repository::{CaseFilter, CasePage, CaseRepository};
use crate::updates::ChildPatch;

#[derive(Default)]
struct MemoryState {
    cases: HashMap<String, Case>,
    next_transition_id: i64,
}

impl MemoryState {
    fn case(&self, case_id: &str) -> Result<&Case, CaseError> {
        self.cases
            .get(case_id)
            .ok_or_else(|| CaseError::case_not_found(case_id))
    }

    fn case_mut(&mut self, case_id: &str) -> Result<&mut Case, CaseError> {
        self.cases
            .get_mut(case_id)
            .ok_or_else(|| CaseError::case_not_found(case_id))
    }

    /// Child identifiers are unique per table across all cases.
    fn child_owner(&self, kind: ChildKind, id: &str) -> Option<&str> {
        self.cases
            .values()
            .find(|c| child_ids(c, kind).any(|existing| existing == id))
            .map(|c| c.id.as_str())
    }

    fn record(&mut self, case: &mut Case) {
        for pending in std::mem::take(&mut case.pending_transitions) {
            self.next_transition_id += 1;
            case.status_history
                .push(pending.into_recorded(self.next_transition_id));
        }
    }
}

/// Case store held in process memory.
#[derive(Default)]
pub struct InMemoryCaseRepository {
    state: Mutex<MemoryState>,
}

impl InMemoryCaseRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn child_ids(case: &Case, kind: ChildKind) -> Box<dyn Iterator<Item = &str> + '_> {
    match kind {
        ChildKind::Evidence => Box::new(case.evidence.iter().map(|c| c.id.as_str())),
        ChildKind::Hypothesis => Box::new(case.hypotheses.iter().map(|c| c.id.as_str())),
        ChildKind::Solution => Box::new(case.solutions.iter().map(|c| c.id.as_str())),
        ChildKind::UploadedFile => Box::new(case.uploaded_files.iter().map(|c| c.id.as_str())),
        ChildKind::Message => Box::new(case.messages.iter().map(|c| c.id.as_str())),
        ChildKind::ToolCall => Box::new(case.tool_calls.iter().map(|c| c.id.as_str())),
    }
}

fn find_child(case: &Case, kind: ChildKind, id: &str) -> Option<CaseChild> {
    match kind {
        ChildKind::Evidence => case
            .evidence
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .map(CaseChild::Evidence),
        ChildKind::Hypothesis => case
            .hypotheses
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .map(CaseChild::Hypothesis),
        ChildKind::Solution => case
            .solutions
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .map(CaseChild::Solution),
        ChildKind::UploadedFile => case
            .uploaded_files
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .map(CaseChild::UploadedFile),
        ChildKind::Message => case
            .messages
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .map(CaseChild::Message),
        ChildKind::ToolCall => case
            .tool_calls
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .map(CaseChild::ToolCall),
    }
}

/// Replace the child with the same id, or append it.
fn put_child(case: &mut Case, child: CaseChild) {
    fn put<T>(items: &mut Vec<T>, item: T, same: impl Fn(&T) -> bool) {
        match items.iter_mut().find(|existing| same(existing)) {
            Some(slot) => *slot = item,
            None => items.push(item),
        }
    }
    match child {
        CaseChild::Evidence(e) => {
            let id = e.id.clone();
            put(&mut case.evidence, e, |x| x.id == id);
        }
        CaseChild::Hypothesis(h) => {
            let id = h.id.clone();
            put(&mut case.hypotheses, h, |x| x.id == id);
        }
        CaseChild::Solution(s) => {
            let id = s.id.clone();
            put(&mut case.solutions, s, |x| x.id == id);
        }
        CaseChild::UploadedFile(f) => {
            let id = f.id.clone();
            put(&mut case.uploaded_files, f, |x| x.id == id);
        }
        CaseChild::Message(m) => {
            let id = m.id.clone();
            put(&mut case.messages, m, |x| x.id == id);
        }
        CaseChild::ToolCall(c) => {
            let id = c.id.clone();
            put(&mut case.tool_calls, c, |x| x.id == id);
        }
    }
}

fn remove_child(case: &mut Case, kind: ChildKind, id: &str) -> bool {
    fn remove<T>(items: &mut Vec<T>, same: impl Fn(&T) -> bool) -> bool {
        let before = items.len();
        items.retain(|item| !same(item));
        items.len() != before
    }
    let removed = match kind {
        ChildKind::Evidence => remove(&mut case.evidence, |x| x.id == id),
        ChildKind::Hypothesis => remove(&mut case.hypotheses, |x| x.id == id),
        ChildKind::Solution => remove(&mut case.solutions, |x| x.id == id),
        ChildKind::UploadedFile => remove(&mut case.uploaded_files, |x| x.id == id),
        ChildKind::Message => remove(&mut case.messages, |x| x.id == id),
        ChildKind::ToolCall => remove(&mut case.tool_calls, |x| x.id == id),
    };
    if removed && kind == ChildKind::Evidence {
        for hyp in &mut case.hypotheses {
            hyp.supporting_evidence_ids.retain(|ev| ev != id);
        }
    }
    removed
}

/// Every evidence reference must resolve within the same case.
fn check_references(case: &Case, child: &CaseChild) -> Result<(), CaseError> {
    if let CaseChild::Hypothesis(hyp) = child {
        for ev_id in &hyp.supporting_evidence_ids {
            if !case.evidence.iter().any(|ev| &ev.id == ev_id) {
                return Err(CaseError::Validation(format!(
                    "hypothesis {} references evidence {ev_id} which is not part of case {}",
                    hyp.id, case.id
                )));
            }
        }
    }
    Ok(())
}

/// In-place child changes invalidate earlier snapshots.
fn bump_version(case: &mut Case, at: DateTime<Utc>) {
    case.version += 1;
    case.updated_at = at;
}

fn duplicate(kind: ChildKind, id: &str) -> CaseError {
    CaseError::Conflict(format!("{kind} {id} already exists"))
}

/// A copy with children in the order both backends return them.
fn ordered(case: &Case) -> Case {
    let mut out = case.clone();
    out.evidence.sort_by_key(|e| e.uploaded_at);
    out.hypotheses.sort_by_key(|h| h.proposed_at);
    out.solutions.sort_by_key(|s| s.proposed_at);
    out.uploaded_files.sort_by_key(|f| f.uploaded_at);
    out.messages.sort_by_key(|m| m.timestamp);
    out.tool_calls.sort_by_key(|c| c.started_at);
    out.status_history.sort_by_key(|t| t.id);
    out.tags.sort();
    out.pending_transitions.clear();
    out
}

fn children_of(case: &Case) -> Vec<CaseChild> {
    let mut out = Vec::new();
    out.extend(case.evidence.iter().cloned().map(CaseChild::Evidence));
    out.extend(case.hypotheses.iter().cloned().map(CaseChild::Hypothesis));
    out.extend(case.solutions.iter().cloned().map(CaseChild::Solution));
    out.extend(case.uploaded_files.iter().cloned().map(CaseChild::UploadedFile));
    out.extend(case.messages.iter().cloned().map(CaseChild::Message));
    out.extend(case.tool_calls.iter().cloned().map(CaseChild::ToolCall));
    out
}

fn terms(query: &str) -> Result<Vec<String>, CaseError> {
    let terms: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
    if terms.is_empty() {
        return Err(CaseError::Validation(
            "search query must contain at least one term".to_string(),
        ));
    }
    Ok(terms)
}

fn matches_all(terms: &[String], fields: &[&str]) -> bool {
    let haystack = fields.join(" ").to_lowercase();
    terms.iter().all(|t| haystack.contains(t.as_str()))
}

fn evidence_matches(terms: &[String], ev: &Evidence) -> bool {
    matches_all(terms, &[&ev.summary, &ev.preprocessed_content])
}

fn page(mut cases: Vec<Case>, offset: u32, limit: Option<u32>) -> CasePage {
    cases.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
    let total = u64::try_from(cases.len()).unwrap_or(u64::MAX);
    let offset = usize::try_from(offset).unwrap_or(usize::MAX);
    let limit = limit.map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));
    CasePage {
        cases: cases
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|c| ordered(&c))
            .collect(),
        total,
    }
}

#[async_trait]
impl CaseRepository for InMemoryCaseRepository {
    async fn create(&self, case: &Case) -> Result<Case, CaseError> {
        case.validate()?;
        match case.pending_transitions.first() {
            Some(first) if first.from_status.is_none() => {}
            _ => {
                return Err(CaseError::Validation(format!(
                    "case {} must be created with its initial transition queued",
                    case.id
                )));
            }
        }

        let mut state = self.state.lock().await;
        if state.cases.contains_key(&case.id) {
            return Err(CaseError::Conflict(format!("case {} already exists", case.id)));
        }
        let mut stored = case.clone();
        stored.evidence.clear();
        stored.hypotheses.clear();
        stored.solutions.clear();
        stored.uploaded_files.clear();
        stored.messages.clear();
        stored.tool_calls.clear();
        stored.status_history.clear();
        for child in children_of(case) {
            if state.child_owner(child.kind(), child.id()).is_some()
                || find_child(&stored, child.kind(), child.id()).is_some()
            {
                return Err(duplicate(child.kind(), child.id()));
            }
            put_child(&mut stored, child);
        }
        stored.tags.sort();
        stored.tags.dedup();
        stored.version = 1;
        state.record(&mut stored);

        let out = ordered(&stored);
        state.cases.insert(stored.id.clone(), stored);
        drop(state);
        tracing::info!(case_id = %out.id, owner_id = %out.owner_id, "case created");
        Ok(out)
    }

    async fn get(&self, case_id: &str) -> Result<Case, CaseError> {
        let state = self.state.lock().await;
        Ok(ordered(state.case(case_id)?))
    }

    async fn owner_of(&self, case_id: &str) -> Result<String, CaseError> {
        let state = self.state.lock().await;
        Ok(state.case(case_id)?.owner_id.clone())
    }

    async fn save(&self, case: &Case) -> Result<Case, CaseError> {
        case.validate()?;
        let mut state = self.state.lock().await;
        let stored = state.case(&case.id)?;

        if stored.version != case.version {
            return Err(CaseError::Conflict(format!(
                "case {} was modified concurrently (have version {}, stored version {})",
                case.id, case.version, stored.version
            )));
        }
        match case.pending_transitions.first() {
            None if stored.status != case.status => {
                return Err(CaseError::Validation(format!(
                    "case {} status changed from {} to {} without a transition",
                    case.id, stored.status, case.status
                )));
            }
            Some(first) if first.from_status != Some(stored.status) => {
                return Err(CaseError::Conflict(format!(
                    "case {} is {}, transition expected it to be {}",
                    case.id,
                    stored.status,
                    first
                        .from_status
                        .map_or_else(|| "new".to_string(), |s| s.to_string())
                )));
            }
            _ => {}
        }

        let mut next = stored.clone();
        next.org_id.clone_from(&case.org_id);
        next.title.clone_from(&case.title);
        next.description.clone_from(&case.description);
        next.status = case.status;
        next.current_turn = case.current_turn;
        next.turns_without_progress = case.turns_without_progress;
        next.phases = case.phases.clone();
        next.metadata = case.metadata.clone();
        next.updated_at = case.updated_at;
        next.last_activity_at = next.last_activity_at.max(case.last_activity_at);
        next.resolved_at = case.resolved_at;
        next.closed_at = case.closed_at;
        next.version += 1;
        next.pending_transitions = case.pending_transitions.clone();

        for child in children_of(case) {
            let kind = child.kind();
            match state.child_owner(kind, child.id()) {
                Some(owner) if owner != case.id => {
                    return Err(CaseError::Conflict(format!(
                        "{kind} {} already belongs to another case",
                        child.id()
                    )));
                }
                // Stored messages are never rewritten.
                Some(_) if kind == ChildKind::Message => {}
                _ => put_child(&mut next, child),
            }
        }
        for child in children_of(&next)
            .iter()
            .filter(|c| c.kind() == ChildKind::Hypothesis)
        {
            check_references(&next, child)?;
        }
        for tag in &case.tags {
            if !next.tags.contains(tag) {
                next.tags.push(tag.clone());
            }
        }

        state.record(&mut next);
        for t in &case.pending_transitions {
            tracing::info!(
                case_id = %case.id,
                from = ?t.from_status,
                to = %t.to_status,
                "case status changed"
            );
        }
        let out = ordered(&next);
        state.cases.insert(next.id.clone(), next);
        drop(state);
        tracing::debug!(case_id = %out.id, version = out.version, "case saved");
        Ok(out)
    }

    async fn delete(&self, case_id: &str) -> Result<(), CaseError> {
        let mut state = self.state.lock().await;
        if state.cases.remove(case_id).is_none() {
            return Err(CaseError::case_not_found(case_id));
        }
        drop(state);
        tracing::info!(case_id, "case deleted");
        Ok(())
    }

    async fn list_by_owner(
        &self,
        owner_id: &str,
        filter: &CaseFilter,
    ) -> Result<CasePage, CaseError> {
        let state = self.state.lock().await;
        let matching = state
            .cases
            .values()
            .filter(|c| c.owner_id == owner_id)
            .filter(|c| filter.status.is_none_or(|s| c.status == s))
            .filter(|c| filter.org_id.as_ref().is_none_or(|o| &c.org_id == o))
            .filter(|c| filter.tag.as_ref().is_none_or(|t| c.tags.contains(t)))
            .cloned()
            .collect();
        Ok(page(matching, filter.offset, filter.limit))
    }

    async fn transitions(&self, case_id: &str) -> Result<Vec<StatusTransition>, CaseError> {
        let state = self.state.lock().await;
        Ok(ordered(state.case(case_id)?).status_history)
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

        let mut state = self.state.lock().await;
        state.case(case_id)?;
        if state.child_owner(child.kind(), child.id()).is_some() {
            return Err(duplicate(child.kind(), child.id()));
        }
        let case = state.case_mut(case_id)?;
        check_references(case, &child)?;
        put_child(case, child.clone());
        drop(state);
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
        let mut state = self.state.lock().await;
        let case = state.case_mut(case_id)?;
        let mut child = find_child(case, kind, child_id).ok_or_else(|| CaseError::NotFound {
            entity_type: kind.as_str().to_string(),
            id: child_id.to_string(),
        })?;
        let at = now();
        patch.apply(&mut child, at)?;
        check_references(case, &child)?;
        put_child(case, child.clone());
        bump_version(case, at);
        drop(state);
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
        let mut state = self.state.lock().await;
        let case = state.case_mut(case_id)?;
        if !remove_child(case, kind, child_id) {
            return Err(CaseError::NotFound {
                entity_type: kind.as_str().to_string(),
                id: child_id.to_string(),
            });
        }
        bump_version(case, now());
        drop(state);
        tracing::debug!(case_id, %kind, child_id, "child deleted");
        Ok(())
    }

    async fn update_phase(
        &self,
        case_id: &str,
        phase: PhaseKind,
        document: Option<Value>,
    ) -> Result<(), CaseError> {
        let mut state = self.state.lock().await;
        let case = state.case_mut(case_id)?;
        case.phases.set(phase, document)?;
        case.updated_at = now();
        case.version += 1;
        drop(state);
        tracing::debug!(case_id, %phase, "phase document replaced");
        Ok(())
    }

    async fn list_messages(
        &self,
        case_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<CaseMessage>, CaseError> {
        let state = self.state.lock().await;
        let messages = ordered(state.case(case_id)?).messages;
        Ok(messages
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .collect())
    }

    async fn touch_activity(&self, case_id: &str, at: DateTime<Utc>) -> Result<(), CaseError> {
        let mut state = self.state.lock().await;
        let case = state.case_mut(case_id)?;
        case.last_activity_at = case.last_activity_at.max(at);
        Ok(())
    }

    async fn add_tag(&self, case_id: &str, tag: &str) -> Result<(), CaseError> {
        let tag = tag.trim();
        require_non_empty("tag", tag)?;
        let mut state = self.state.lock().await;
        let case = state.case_mut(case_id)?;
        if !case.tags.iter().any(|t| t == tag) {
            case.tags.push(tag.to_string());
            drop(state);
            tracing::debug!(case_id, tag, "tag added");
        }
        Ok(())
    }

    async fn remove_tag(&self, case_id: &str, tag: &str) -> Result<(), CaseError> {
        let mut state = self.state.lock().await;
        let case = state.case_mut(case_id)?;
        let before = case.tags.len();
        case.tags.retain(|t| t != tag);
        if case.tags.len() == before {
            return Err(CaseError::NotFound {
                entity_type: "tag".to_string(),
                id: tag.to_string(),
            });
        }
        bump_version(case, now());
        Ok(())
    }

    async fn count_created_since(
        &self,
        owner_id: &str,
        since: DateTime<Utc>,
    ) -> Result<u64, CaseError> {
        let state = self.state.lock().await;
        let count = state
            .cases
            .values()
            .filter(|c| c.owner_id == owner_id && c.created_at >= since)
            .count();
        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }

    async fn search(
        &self,
        owner_id: &str,
        query: &str,
        limit: u32,
    ) -> Result<CasePage, CaseError> {
        let terms = terms(query)?;
        let state = self.state.lock().await;
        let matching = state
            .cases
            .values()
            .filter(|c| c.owner_id == owner_id)
            .filter(|c| {
                matches_all(&terms, &[&c.title, &c.description])
                    || c.evidence.iter().any(|ev| evidence_matches(&terms, ev))
            })
            .cloned()
            .collect();
        Ok(page(matching, 0, Some(limit)))
    }

    async fn search_evidence(
        &self,
        case_id: &str,
        query: &str,
        limit: u32,
    ) -> Result<Vec<Evidence>, CaseError> {
        let terms = terms(query)?;
        let state = self.state.lock().await;
        let Some(case) = state.cases.get(case_id) else {
            return Ok(Vec::new());
        };
        Ok(ordered(case)
            .evidence
            .into_iter()
            .filter(|ev| evidence_matches(&terms, ev))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .collect())
    }

    async fn cleanup_expired(
        &self,
        cutoff: DateTime<Utc>,
        batch_size: u32,
    ) -> Result<u64, CaseError> {
        let mut state = self.state.lock().await;
        let mut expired: Vec<(DateTime<Utc>, String)> = state
            .cases
            .values()
            .filter(|c| c.status == CaseStatus::Closed)
            .filter_map(|c| c.closed_at.filter(|at| *at < cutoff).map(|at| (at, c.id.clone())))
            .collect();
        expired.sort();
        expired.truncate(usize::try_from(batch_size).unwrap_or(usize::MAX));
        for (_, id) in &expired {
            state.cases.remove(id);
        }
        drop(state);
        let removed = u64::try_from(expired.len()).unwrap_or(u64::MAX);
        if removed > 0 {
            tracing::info!(removed, cutoff = %cutoff, "expired closed cases removed");
        }
        Ok(removed)
    }
}
