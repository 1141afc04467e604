//! Phase 1: Generate the issue chain from the feature specification
//!
//! The reply is a flat, ordered list of issues. Ordering matters: the
//! orchestrator links each issue to the one generated before it.

use serde::Deserialize;
use uuid::Uuid;

use crate::planner::context::WorkflowContext;
use crate::planner::phase::{Phase, PhaseError, PhaseKind};
use crate::planner::types::GeneratedIssue;
use crate::planner::utils::parse_reply;
use crate::reasoning::ReasoningRequest;

const SYSTEM_PROMPT: &str = r#"You are a senior engineer splitting a feature request into issues.

Each issue must be a self-contained, reviewable unit of work that can be
implemented as a single pull request against the repository. Order the issues
so that every issue only builds on issues listed before it.

Output ONLY valid JSON with this exact structure:
{
  "issues": [
    { "title": "<short imperative title>", "description": "<what and why, in markdown>" }
  ]
}

IMPORTANT:
- Output ONLY the JSON object, no commentary
- Use the repository file list to ground your issues in the existing code"#;

/// Maximum number of tracked files quoted in the prompt
const MAX_LISTED_FILES: usize = 400;

#[derive(Debug, Deserialize)]
struct IssueReply {
    issues: Vec<IssueDraft>,
}

#[derive(Debug, Deserialize)]
struct IssueDraft {
    #[serde(default)]
    uuid: Option<Uuid>,
    title: String,
    #[serde(default)]
    description: String,
}

pub struct IssueGenerationPhase;

impl Phase for IssueGenerationPhase {
    type Output = Vec<GeneratedIssue>;

    fn kind(&self) -> PhaseKind {
        PhaseKind::IssueGeneration
    }

    fn instruction(&self, ctx: &WorkflowContext) -> Result<ReasoningRequest, PhaseError> {
        if ctx.issue_spec.trim().is_empty() {
            return Err(PhaseError::MissingContext("issue_spec"));
        }

        let files = list_files(&ctx.current_files);
        let prompt = format!(
            r#"Split this feature request into ordered issues.

## Repository
{}/{} (base branch `{}`)

## Tracked files
```
{}
```

## Feature request
{}"#,
            ctx.repo_owner, ctx.repo_name, ctx.base_branch, files, ctx.issue_spec
        );

        Ok(ReasoningRequest::new(self.kind(), SYSTEM_PROMPT, prompt))
    }

    fn parse(&self, reply: &str, _ctx: &WorkflowContext) -> Result<Self::Output, PhaseError> {
        let reply: IssueReply = parse_reply(reply)?;

        let mut seen: Vec<Uuid> = Vec::with_capacity(reply.issues.len());
        let mut issues = Vec::with_capacity(reply.issues.len());
        for draft in reply.issues {
            // Reused uuids would break the chain; mint a fresh one instead
            let uuid = match draft.uuid {
                Some(uuid) if !seen.contains(&uuid) => uuid,
                _ => Uuid::new_v4(),
            };
            seen.push(uuid);
            issues.push(GeneratedIssue {
                uuid,
                title: draft.title,
                description: draft.description,
            });
        }

        Ok(issues)
    }
}

fn list_files(files: &[String]) -> String {
    if files.is_empty() {
        return "(no files)".to_string();
    }
    let mut listed = files
        .iter()
        .take(MAX_LISTED_FILES)
        .cloned()
        .collect::<Vec<_>>()
        .join("\n");
    if files.len() > MAX_LISTED_FILES {
        listed.push_str(&format!("\n... and {} more", files.len() - MAX_LISTED_FILES));
    }
    listed
}
