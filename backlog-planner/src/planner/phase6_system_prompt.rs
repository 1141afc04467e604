//! Phase 6: Build one system prompt for every issue and task of the run

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::planner::context::WorkflowContext;
use crate::planner::phase::{Phase, PhaseError, PhaseKind};
use crate::planner::utils::parse_reply;
use crate::reasoning::ReasoningRequest;

const SYSTEM_PROMPT: &str = r#"You are writing the system prompt for coding agents.

The agents will implement the issues and tasks below, one task at a time,
against the given repository. Write a single system prompt that gives them the
shared context they need: the goal of the feature, the conventions of the
repository, and the constraints that apply to every task.

Output ONLY valid JSON with this exact structure:
{
  "prompt": "<the system prompt>"
}"#;

#[derive(Debug, Deserialize)]
struct PromptReply {
    prompt: String,
}

#[derive(Serialize)]
struct IssueOutline<'a> {
    uuid: &'a Uuid,
    title: &'a str,
    description: &'a str,
    tasks: Vec<&'a str>,
}

pub struct SystemPromptPhase;

impl Phase for SystemPromptPhase {
    type Output = String;

    fn kind(&self) -> PhaseKind {
        PhaseKind::SystemPromptGeneration
    }

    fn instruction(&self, ctx: &WorkflowContext) -> Result<ReasoningRequest, PhaseError> {
        // Task lists only exist for issues whose branch completed, so match by issue uuid
        let outline: Vec<IssueOutline> = ctx
            .issues
            .iter()
            .map(|issue| IssueOutline {
                uuid: &issue.uuid,
                title: &issue.title,
                description: &issue.description,
                tasks: ctx
                    .task_lists
                    .iter()
                    .flatten()
                    .filter(|task| task.issue_uuid == issue.uuid)
                    .map(|task| task.title.as_str())
                    .collect(),
            })
            .collect();
        let outline_json = serde_json::to_string_pretty(&outline)?;

        let prompt = format!(
            r#"Write the system prompt for this backlog.

## Repository
{}/{}

## Feature request
{}

## Issues and tasks
```json
{}
```"#,
            ctx.repo_owner, ctx.repo_name, ctx.issue_spec, outline_json
        );

        Ok(ReasoningRequest::new(self.kind(), SYSTEM_PROMPT, prompt))
    }

    fn parse(&self, reply: &str, _ctx: &WorkflowContext) -> Result<Self::Output, PhaseError> {
        let reply: PromptReply = parse_reply(reply)?;
        if reply.prompt.trim().is_empty() {
            return Err(PhaseError::Invalid("system prompt is empty".to_string()));
        }
        Ok(reply.prompt)
    }
}
