//! Typed state threaded through one pipeline run.
//!
//! Phases only ever see `&WorkflowContext`; the orchestrator is the single
//! writer. Fields are grouped by who fills them: setup, the per-issue branch,
//! and the end-of-run aggregate.

use uuid::Uuid;

use crate::planner::phase::PhaseError;
use crate::planner::types::{Decisions, Issue, PlanInput, Task, TaskScope};
use crate::planner::utils::parse_repo_url;
use crate::repository::DEFAULT_BASE_BRANCH;

#[derive(Debug, Clone, Default)]
pub struct WorkflowContext {
    // --- setup ---
    pub repo_url: String,
    pub repo_owner: String,
    pub repo_name: String,
    pub fork_url: String,
    pub fork_owner: String,
    /// Branch new work is based on, from the checkout
    pub base_branch: String,
    pub bounty_id: String,
    pub issue_spec: String,
    /// Tracked files of the checkout, relative to its root
    pub current_files: Vec<String>,

    // --- per issue ---
    /// Issue currently being decomposed
    pub feature_spec: Option<Issue>,
    /// Task list of the current issue
    pub subtasks: Vec<Task>,
    /// Tasks rejected by validation, input to regeneration
    pub audited_subtasks: Vec<Task>,
    /// Validation decisions of the current issue
    pub feedbacks: Decisions,
    /// Task whose dependencies are being resolved
    pub target_task: Option<Task>,

    // --- aggregate ---
    pub issues: Vec<Issue>,
    pub task_lists: Vec<Vec<Task>>,
}

impl WorkflowContext {
    /// Build the setup section from a plan input
    pub fn from_input(input: &PlanInput) -> anyhow::Result<Self> {
        let (repo_owner, repo_name) = parse_repo_url(&input.source_url)?;
        let (fork_owner, _) = parse_repo_url(&input.fork_url)?;

        Ok(Self {
            repo_url: input.source_url.clone(),
            repo_owner,
            repo_name,
            fork_url: input.fork_url.clone(),
            fork_owner,
            base_branch: DEFAULT_BASE_BRANCH.to_string(),
            bounty_id: input.bounty_id.clone(),
            issue_spec: input.issue_spec.clone(),
            ..Default::default()
        })
    }

    pub fn current_issue(&self) -> Result<&Issue, PhaseError> {
        self.feature_spec
            .as_ref()
            .ok_or(PhaseError::MissingContext("feature_spec"))
    }

    pub fn target_task(&self) -> Result<&Task, PhaseError> {
        self.target_task
            .as_ref()
            .ok_or(PhaseError::MissingContext("target_task"))
    }

    /// Scope applied to tasks generated for the given issue
    pub fn task_scope(&self, issue_uuid: Uuid) -> TaskScope {
        TaskScope {
            repo_owner: self.repo_owner.clone(),
            repo_name: self.repo_name.clone(),
            bounty_id: self.bounty_id.clone(),
            issue_uuid,
        }
    }

    /// Forget everything written by the previous issue's branch
    pub fn begin_issue(&mut self, issue: Issue) {
        self.feature_spec = Some(issue);
        self.subtasks.clear();
        self.audited_subtasks.clear();
        self.feedbacks.clear();
        self.target_task = None;
    }
}
