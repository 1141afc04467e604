//! Identity-based reconciliation of phase outputs.
//!
//! Everything here is pure: no reasoning calls, no persistence.

use uuid::Uuid;

use crate::planner::types::{Decisions, GeneratedIssue, Issue, Task};

/// Replace-by-uuid-or-append.
///
/// Each patch entry overwrites the entry with the same uuid in place, or is
/// appended when no such entry exists. Unmatched originals keep their
/// relative order, appended entries follow patch order.
pub fn merge(mut original: Vec<Task>, patch: Vec<Task>) -> Vec<Task> {
    merge_into(&mut original, patch);
    original
}

/// In-place form of [`merge`]
pub fn merge_into(tasks: &mut Vec<Task>, patch: Vec<Task>) {
    for revised in patch {
        match tasks.iter().position(|t| t.uuid == revised.uuid) {
            Some(index) => tasks[index] = revised,
            None => tasks.push(revised),
        }
    }
}

/// Tasks whose decision is present and negative, in task order
pub fn select_audited(tasks: &[Task], decisions: &Decisions) -> Vec<Task> {
    tasks
        .iter()
        .filter(|task| {
            decisions
                .get(&task.uuid)
                .map(|d| !d.decision)
                .unwrap_or(false)
        })
        .cloned()
        .collect()
}

/// Persistence gate: a decision entry must exist and be positive
pub fn is_approved(decisions: &Decisions, uuid: &Uuid) -> bool {
    decisions.get(uuid).map(|d| d.decision).unwrap_or(false)
}

/// Tasks eligible for persistence, in task order
pub fn approved_tasks<'a>(tasks: &'a [Task], decisions: &'a Decisions) -> impl Iterator<Item = &'a Task> {
    tasks.iter().filter(move |task| is_approved(decisions, &task.uuid))
}

/// Link generated issues into a chain in generation order
pub fn chain_issues(
    generated: Vec<GeneratedIssue>,
    repo_owner: &str,
    repo_name: &str,
    bounty_id: &str,
    fork_owner: &str,
    fork_url: &str,
) -> Vec<Issue> {
    let mut predecessor: Option<Uuid> = None;

    generated
        .into_iter()
        .map(|issue| {
            let linked = Issue {
                uuid: issue.uuid,
                title: issue.title,
                description: issue.description,
                repo_owner: repo_owner.to_string(),
                repo_name: repo_name.to_string(),
                bounty_id: bounty_id.to_string(),
                fork_owner: fork_owner.to_string(),
                fork_url: fork_url.to_string(),
                predecessor_uuid: predecessor,
            };
            predecessor = Some(linked.uuid);
            linked
        })
        .collect()
}

/// Normalize a dependency list: drop self references and duplicates
pub fn clean_dependencies(task_uuid: &Uuid, dependencies: Vec<Uuid>) -> Vec<Uuid> {
    let mut cleaned: Vec<Uuid> = Vec::with_capacity(dependencies.len());
    for dep in dependencies {
        if dep != *task_uuid && !cleaned.contains(&dep) {
            cleaned.push(dep);
        }
    }
    cleaned
}
