//! Phase 3: Approve or reject every task of the current issue
//!
//! Decisions are computed once per issue and are never revisited.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::planner::context::WorkflowContext;
use crate::planner::phase::{Phase, PhaseError, PhaseKind};
use crate::planner::types::{Decisions, Task};
use crate::planner::utils::parse_reply;
use crate::reasoning::ReasoningRequest;

const SYSTEM_PROMPT: &str = r#"You are reviewing engineering tasks before they enter a backlog.

Check every task for:
1. Scope: the task fits the issue and nothing else
2. Clarity: a developer can start without asking questions
3. Testability: acceptance criteria are concrete and verifiable
4. Size: the task is small enough for a single pull request

Output ONLY valid JSON with this exact structure:
{
  "decisions": {
    "<task uuid>": { "decision": <true|false>, "feedback": "<what to fix, or empty>" }
  }
}

IMPORTANT:
- Include one entry per task uuid you were given
- Output ONLY the JSON object, no commentary"#;

#[derive(Debug, Deserialize)]
struct DecisionsReply {
    decisions: Decisions,
}

/// Task fields shown to the reviewer
#[derive(Serialize)]
struct ReviewItem<'a> {
    uuid: &'a Uuid,
    title: &'a str,
    description: &'a str,
    acceptance_criteria: &'a [String],
}

impl<'a> From<&'a Task> for ReviewItem<'a> {
    fn from(task: &'a Task) -> Self {
        Self {
            uuid: &task.uuid,
            title: &task.title,
            description: &task.description,
            acceptance_criteria: &task.acceptance_criteria,
        }
    }
}

pub struct TaskValidationPhase;

impl Phase for TaskValidationPhase {
    type Output = Decisions;

    fn kind(&self) -> PhaseKind {
        PhaseKind::TaskValidation
    }

    fn instruction(&self, ctx: &WorkflowContext) -> Result<ReasoningRequest, PhaseError> {
        let issue = ctx.current_issue()?;
        let items: Vec<ReviewItem> = ctx.subtasks.iter().map(ReviewItem::from).collect();
        let tasks_json = serde_json::to_string_pretty(&items)?;

        let prompt = format!(
            r#"Review these tasks for the issue below.

## Issue: {}
{}

## Tasks
```json
{}
```"#,
            issue.title, issue.description, tasks_json
        );

        Ok(ReasoningRequest::new(self.kind(), SYSTEM_PROMPT, prompt))
    }

    fn parse(&self, reply: &str, _ctx: &WorkflowContext) -> Result<Self::Output, PhaseError> {
        let reply: DecisionsReply = parse_reply(reply)?;
        Ok(reply.decisions)
    }
}
