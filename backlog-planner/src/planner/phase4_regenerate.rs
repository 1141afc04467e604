//! Phase 4: Rewrite rejected tasks from reviewer feedback
//!
//! Rewritten tasks keep the uuid of the task they replace so the orchestrator
//! can merge them back by identity.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::planner::context::WorkflowContext;
use crate::planner::phase::{Phase, PhaseError, PhaseKind};
use crate::planner::types::{Task, TaskDraft};
use crate::planner::utils::parse_reply;
use crate::reasoning::ReasoningRequest;

const SYSTEM_PROMPT: &str = r#"You are fixing engineering tasks that failed review.

For every task you receive, rewrite it so that it addresses the reviewer
feedback. Keep the task's uuid unchanged. Do not merge or split tasks.

Output ONLY valid JSON with this exact structure:
{
  "tasks": [
    {
      "uuid": "<uuid of the task being rewritten>",
      "title": "<short imperative title>",
      "description": "<what to change and where>",
      "acceptance_criteria": ["<verifiable criterion>", "..."]
    }
  ]
}

IMPORTANT:
- Every task MUST carry its original uuid
- Output ONLY the JSON object, no commentary"#;

static NO_FEEDBACK: Value = Value::Null;

#[derive(Debug, Deserialize)]
struct RegeneratedReply {
    tasks: Vec<TaskDraft>,
}

/// A rejected task together with the feedback it received
#[derive(Serialize)]
struct RevisionItem<'a> {
    uuid: &'a Uuid,
    title: &'a str,
    description: &'a str,
    acceptance_criteria: &'a [String],
    feedback: &'a Value,
}

pub struct TaskRegenerationPhase;

impl Phase for TaskRegenerationPhase {
    type Output = Vec<Task>;

    fn kind(&self) -> PhaseKind {
        PhaseKind::TaskRegeneration
    }

    fn instruction(&self, ctx: &WorkflowContext) -> Result<ReasoningRequest, PhaseError> {
        let issue = ctx.current_issue()?;
        if ctx.audited_subtasks.is_empty() {
            return Err(PhaseError::MissingContext("audited_subtasks"));
        }

        let items: Vec<RevisionItem> = ctx
            .audited_subtasks
            .iter()
            .map(|task| RevisionItem {
                uuid: &task.uuid,
                title: &task.title,
                description: &task.description,
                acceptance_criteria: &task.acceptance_criteria,
                feedback: ctx
                    .feedbacks
                    .get(&task.uuid)
                    .map(|d| &d.feedback)
                    .unwrap_or(&NO_FEEDBACK),
            })
            .collect();
        let tasks_json = serde_json::to_string_pretty(&items)?;

        let prompt = format!(
            r#"Rewrite these rejected tasks.

## Issue: {}
{}

## Rejected tasks with feedback
```json
{}
```"#,
            issue.title, issue.description, tasks_json
        );

        Ok(ReasoningRequest::new(self.kind(), SYSTEM_PROMPT, prompt))
    }

    fn parse(&self, reply: &str, ctx: &WorkflowContext) -> Result<Self::Output, PhaseError> {
        let issue = ctx.current_issue()?;
        let scope = ctx.task_scope(issue.uuid);
        let reply: RegeneratedReply = parse_reply(reply)?;

        reply
            .tasks
            .into_iter()
            .map(|draft| match draft.uuid {
                Some(uuid) => Ok(Task::from_draft(uuid, draft, &scope)),
                None => Err(PhaseError::Invalid(format!(
                    "regenerated task '{}' has no uuid",
                    draft.title
                ))),
            })
            .collect()
    }
}
