//! Data types for the planning pipeline.
//!
//! 1. **Plan input** - what a caller asks the planner to do
//! 2. **Issues** - generated requirement units, chained in generation order
//! 3. **Tasks** - decomposed work items belonging to one issue
//! 4. **Decisions** - per-task validation outcome, computed once
//! 5. **Records** - the shapes handed to the persistence sink
//! 6. **Reports** - per-issue and per-run results

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

// ============================================================================
// Plan Input
// ============================================================================

/// Everything a single pipeline run needs from its caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanInput {
    /// Repository the backlog is planned against, e.g. `https://github.com/owner/repo`
    pub source_url: String,

    /// Fork that will receive the work
    pub fork_url: String,

    /// Free-form feature specification
    pub issue_spec: String,

    /// Opaque billing identifier attached to every record
    pub bounty_id: String,
}

// ============================================================================
// Issue Types
// ============================================================================

/// Issue as produced by the issue-generation phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedIssue {
    pub uuid: Uuid,
    pub title: String,
    pub description: String,
}

/// Issue with repository scope and its place in the chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub uuid: Uuid,
    pub title: String,
    pub description: String,
    pub repo_owner: String,
    pub repo_name: String,
    pub bounty_id: String,
    pub fork_owner: String,
    pub fork_url: String,

    /// Issue generated immediately before this one; `None` for the first
    pub predecessor_uuid: Option<Uuid>,
}

// ============================================================================
// Task Types
// ============================================================================

/// Task content as returned by decomposition or regeneration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDraft {
    /// Required when rewriting an existing task; assigned when absent on decomposition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<Uuid>,

    pub title: String,

    pub description: String,

    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
}

/// Repository scope stamped onto every task of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskScope {
    pub repo_owner: String,
    pub repo_name: String,
    pub bounty_id: String,
    pub issue_uuid: Uuid,
}

/// Decomposed unit of work belonging to one issue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub uuid: Uuid,
    pub title: String,
    pub description: String,

    /// Ordered acceptance criteria
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,

    /// Tasks that must land first; filled by dependency resolution
    #[serde(default)]
    pub dependency_tasks: Vec<Uuid>,

    pub repo_owner: String,
    pub repo_name: String,
    pub issue_uuid: Uuid,
    pub bounty_id: String,
}

impl Task {
    /// Build a task from reply content under the given scope
    pub fn from_draft(uuid: Uuid, draft: TaskDraft, scope: &TaskScope) -> Self {
        Self {
            uuid,
            title: draft.title,
            description: draft.description,
            acceptance_criteria: draft.acceptance_criteria,
            dependency_tasks: Vec::new(),
            repo_owner: scope.repo_owner.clone(),
            repo_name: scope.repo_name.clone(),
            issue_uuid: scope.issue_uuid,
            bounty_id: scope.bounty_id.clone(),
        }
    }
}

// ============================================================================
// Validation Types
// ============================================================================

/// Validation outcome for one task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub decision: bool,

    /// Reviewer feedback; shape is up to the reasoning backend
    #[serde(default)]
    pub feedback: Value,
}

/// Decisions keyed by task uuid
pub type Decisions = HashMap<Uuid, Decision>;

// ============================================================================
// System Prompt
// ============================================================================

/// Aggregate prompt derived from every issue and task of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemPrompt {
    pub prompt: String,
    pub bounty_id: String,
}

// ============================================================================
// Persistence Records
// ============================================================================

/// Issues are persisted as-is
pub type IssueRecord = Issue;

/// System prompts are persisted as-is
pub type SystemPromptRecord = SystemPrompt;

/// Task as stored by the persistence sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub uuid: Uuid,
    pub title: String,
    pub description: String,

    /// Acceptance criteria joined with newlines
    pub acceptance_criteria: String,

    pub repo_owner: String,
    pub repo_name: String,
    pub dependency_tasks: Vec<Uuid>,
    pub issue_uuid: Uuid,
    pub bounty_id: String,
}

impl From<&Task> for TaskRecord {
    fn from(task: &Task) -> Self {
        Self {
            uuid: task.uuid,
            title: task.title.clone(),
            description: task.description.clone(),
            acceptance_criteria: task.acceptance_criteria.join("\n"),
            repo_owner: task.repo_owner.clone(),
            repo_name: task.repo_name.clone(),
            dependency_tasks: task.dependency_tasks.clone(),
            issue_uuid: task.issue_uuid,
            bounty_id: task.bounty_id.clone(),
        }
    }
}

// ============================================================================
// Reports
// ============================================================================

/// Result of planning tasks for a single issue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueTasksResult {
    pub success: bool,
    pub message: String,
    pub tasks: Vec<Task>,
    pub task_count: usize,
}

/// Final result of one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub success: bool,
    pub message: String,
    pub issues: Vec<Issue>,

    /// One task list per issue whose branch completed
    pub tasks: Vec<Vec<Task>>,

    pub system_prompt: Option<String>,
    pub issue_spec: String,
    pub repo_owner: String,
    pub repo_name: String,
}

impl PipelineReport {
    /// Report for a run that stopped before any task work
    pub fn failure(message: impl Into<String>, issue_spec: &str, repo_owner: &str, repo_name: &str) -> Self {
        Self {
            success: false,
            message: message.into(),
            issues: Vec::new(),
            tasks: Vec::new(),
            system_prompt: None,
            issue_spec: issue_spec.to_string(),
            repo_owner: repo_owner.to_string(),
            repo_name: repo_name.to_string(),
        }
    }

    /// Total number of tasks across all issues
    pub fn task_total(&self) -> usize {
        self.tasks.iter().map(Vec::len).sum()
    }
}
