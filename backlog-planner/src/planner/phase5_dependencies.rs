//! Phase 5: Resolve which sibling tasks the target task depends on
//!
//! Runs once per task. The reply is a map keyed by task uuid; the resolver
//! picks the entry of the target task out of it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::planner::context::WorkflowContext;
use crate::planner::phase::{Phase, PhaseError, PhaseKind};
use crate::planner::utils::parse_reply;
use crate::reasoning::ReasoningRequest;

/// Dependency lists keyed by task uuid
pub type DependencyMap = HashMap<Uuid, Vec<Uuid>>;

const SYSTEM_PROMPT: &str = r#"You are ordering engineering tasks inside one issue.

Given a target task and its sibling tasks, list the siblings that must be
completed before the target task can start. Only list direct prerequisites.
A task never depends on itself.

Output ONLY valid JSON with this exact structure:
{
  "<target task uuid>": ["<sibling uuid>", "..."]
}

IMPORTANT:
- Use an empty array when the target task has no prerequisites
- Output ONLY the JSON object, no commentary"#;

/// Either reply shape the backend is allowed to use
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DependencyReply {
    Target { dependency_tasks: Vec<Uuid> },
    Keyed(DependencyMap),
}

#[derive(Serialize)]
struct Sibling<'a> {
    uuid: &'a Uuid,
    title: &'a str,
    description: &'a str,
}

pub struct TaskDependencyPhase;

impl Phase for TaskDependencyPhase {
    type Output = DependencyMap;

    fn kind(&self) -> PhaseKind {
        PhaseKind::TaskDependency
    }

    fn instruction(&self, ctx: &WorkflowContext) -> Result<ReasoningRequest, PhaseError> {
        let target = ctx.target_task()?;

        let siblings: Vec<Sibling> = ctx
            .subtasks
            .iter()
            .filter(|task| task.uuid != target.uuid)
            .map(|task| Sibling {
                uuid: &task.uuid,
                title: &task.title,
                description: &task.description,
            })
            .collect();
        let siblings_json = serde_json::to_string_pretty(&siblings)?;

        let prompt = format!(
            r#"Find the prerequisites of the target task.

## Target task ({})
{}

{}

## Sibling tasks
```json
{}
```"#,
            target.uuid, target.title, target.description, siblings_json
        );

        Ok(ReasoningRequest::new(self.kind(), SYSTEM_PROMPT, prompt))
    }

    fn parse(&self, reply: &str, ctx: &WorkflowContext) -> Result<Self::Output, PhaseError> {
        match parse_reply::<DependencyReply>(reply)? {
            DependencyReply::Keyed(map) => Ok(map),
            DependencyReply::Target { dependency_tasks } => {
                let target = ctx.target_task()?;
                Ok(HashMap::from([(target.uuid, dependency_tasks)]))
            }
        }
    }
}
