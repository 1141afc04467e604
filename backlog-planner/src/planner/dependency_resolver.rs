//! Per-task dependency resolution.
//!
//! Every task of the current issue gets its own reasoning call. A failed call
//! only ever touches the task it was made for: that task ends up with an empty
//! dependency list and the loop moves on.

use uuid::Uuid;

use crate::planner::context::WorkflowContext;
use crate::planner::phase::{Phase, PhaseKind, PhaseOutcome};
use crate::planner::phase5_dependencies::TaskDependencyPhase;
use crate::planner::reconcile::clean_dependencies;
use crate::reasoning::ReasoningClient;
use backlog_planner_sdk::{
    log_phase_complete, log_phase_start, log_task_complete, log_task_failed, log_task_progress,
    log_task_start, log_warning,
};

/// Counts reported after resolving one issue's tasks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolutionSummary {
    /// Tasks whose dependency list came from the backend
    pub resolved: usize,
    /// Tasks that fell back to an empty list
    pub degraded: usize,
}

/// Resolve dependencies for every task in `ctx.subtasks`, in order.
///
/// Writes `ctx.target_task` before each call and each task's
/// `dependency_tasks` after it. Nothing else in the context changes.
pub async fn resolve_dependencies(
    reasoner: &dyn ReasoningClient,
    ctx: &mut WorkflowContext,
) -> ResolutionSummary {
    let kind = PhaseKind::TaskDependency;
    let total = ctx.subtasks.len();
    let phase = TaskDependencyPhase;
    let mut summary = ResolutionSummary::default();

    log_phase_start!(kind.number(), kind.name(), PhaseKind::TOTAL);

    for index in 0..total {
        let task = ctx.subtasks[index].clone();
        log_task_start!(kind.number(), task.uuid, &task.title, total);
        log_task_progress!(task.uuid, index + 1, total, "Resolving dependencies");
        ctx.target_task = Some(task.clone());

        let dependencies = match phase.execute(reasoner, ctx).await {
            PhaseOutcome::Success { data } => match data.get(&task.uuid) {
                Some(list) => {
                    summary.resolved += 1;
                    log_task_complete!(task.uuid, format!("{} dependencies", list.len()));
                    clean_dependencies(&task.uuid, list.clone())
                }
                None => {
                    summary.degraded += 1;
                    log_warning!("No dependency entry for task {}; using none", task.uuid);
                    log_task_failed!(task.uuid, "reply has no entry for this task");
                    Vec::new()
                }
            },
            PhaseOutcome::Failure { error } => {
                summary.degraded += 1;
                log_warning!("Dependency resolution failed for task {}: {}", task.uuid, error);
                log_task_failed!(task.uuid, error);
                Vec::new()
            }
        };

        ctx.subtasks[index].dependency_tasks = dependencies;
    }

    ctx.target_task = None;
    log_phase_complete!(kind.number(), kind.name());

    summary
}

/// Uuids of tasks whose dependency list is empty
pub fn without_dependencies(ctx: &WorkflowContext) -> Vec<Uuid> {
    ctx.subtasks
        .iter()
        .filter(|task| task.dependency_tasks.is_empty())
        .map(|task| task.uuid)
        .collect()
}
