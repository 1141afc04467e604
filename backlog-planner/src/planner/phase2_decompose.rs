//! Phase 2: Decompose the current issue into tasks

use serde::Deserialize;
use uuid::Uuid;

use crate::planner::context::WorkflowContext;
use crate::planner::phase::{Phase, PhaseError, PhaseKind};
use crate::planner::types::{Task, TaskDraft};
use crate::planner::utils::parse_reply;
use crate::reasoning::ReasoningRequest;

const SYSTEM_PROMPT: &str = r#"You are a technical lead breaking one issue into engineering tasks.

Each task must be small enough for one developer to finish in a single sitting,
must be independently testable, and must carry concrete acceptance criteria.

Output ONLY valid JSON with this exact structure:
{
  "tasks": [
    {
      "title": "<short imperative title>",
      "description": "<what to change and where>",
      "acceptance_criteria": ["<verifiable criterion>", "..."]
    }
  ]
}

IMPORTANT:
- Output ONLY the JSON object, no commentary
- Do not include tasks that belong to other issues"#;

/// Tasks of one issue and the count reported alongside them
#[derive(Debug, Clone, PartialEq)]
pub struct DecomposedTasks {
    pub tasks: Vec<Task>,
    pub task_count: usize,
}

#[derive(Debug, Deserialize)]
struct TasksReply {
    tasks: Vec<TaskDraft>,
    #[serde(default)]
    task_count: Option<usize>,
}

pub struct TaskDecompositionPhase;

impl Phase for TaskDecompositionPhase {
    type Output = DecomposedTasks;

    fn kind(&self) -> PhaseKind {
        PhaseKind::TaskDecomposition
    }

    fn instruction(&self, ctx: &WorkflowContext) -> Result<ReasoningRequest, PhaseError> {
        let issue = ctx.current_issue()?;

        let prompt = format!(
            r#"Decompose this issue into tasks.

## Repository
{}/{}

## Overall feature request
{}

## Issue: {}
{}"#,
            ctx.repo_owner, ctx.repo_name, ctx.issue_spec, issue.title, issue.description
        );

        Ok(ReasoningRequest::new(self.kind(), SYSTEM_PROMPT, prompt))
    }

    fn parse(&self, reply: &str, ctx: &WorkflowContext) -> Result<Self::Output, PhaseError> {
        let issue = ctx.current_issue()?;
        let scope = ctx.task_scope(issue.uuid);
        let reply: TasksReply = parse_reply(reply)?;

        let mut tasks: Vec<Task> = Vec::with_capacity(reply.tasks.len());
        for draft in reply.tasks {
            let uuid = match draft.uuid {
                Some(uuid) if !tasks.iter().any(|t| t.uuid == uuid) => uuid,
                _ => Uuid::new_v4(),
            };
            tasks.push(Task::from_draft(uuid, draft, &scope));
        }

        let task_count = reply.task_count.unwrap_or(tasks.len());
        Ok(DecomposedTasks { tasks, task_count })
    }
}
