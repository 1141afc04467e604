//! The phase contract shared by every reasoning step.
//!
//! A phase builds one request from the context, sends it to the reasoning
//! backend and parses the reply into its own output type. It never writes to
//! the context; any failure along the way becomes [`PhaseOutcome::Failure`].

use async_trait::async_trait;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::planner::context::WorkflowContext;
use crate::reasoning::{ReasoningClient, ReasoningRequest};
use backlog_planner_sdk::{log_error, log_phase_complete, log_phase_failed, log_phase_start};

/// Every phase of the pipeline, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    IssueGeneration,
    TaskDecomposition,
    TaskValidation,
    TaskRegeneration,
    TaskDependency,
    SystemPromptGeneration,
}

impl PhaseKind {
    pub const TOTAL: usize = 6;

    pub fn number(&self) -> usize {
        match self {
            PhaseKind::IssueGeneration => 1,
            PhaseKind::TaskDecomposition => 2,
            PhaseKind::TaskValidation => 3,
            PhaseKind::TaskRegeneration => 4,
            PhaseKind::TaskDependency => 5,
            PhaseKind::SystemPromptGeneration => 6,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PhaseKind::IssueGeneration => "Issue Generation",
            PhaseKind::TaskDecomposition => "Task Decomposition",
            PhaseKind::TaskValidation => "Task Validation",
            PhaseKind::TaskRegeneration => "Task Regeneration",
            PhaseKind::TaskDependency => "Task Dependency",
            PhaseKind::SystemPromptGeneration => "System Prompt Generation",
        }
    }
}

impl std::fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a phase could not produce its output
#[derive(Debug, Error)]
pub enum PhaseError {
    #[error("reasoning call failed: {0}")]
    Reasoning(String),

    #[error("reasoning backend returned an empty reply")]
    EmptyReply,

    #[error("malformed reply: {0}")]
    MalformedReply(String),

    #[error("context field `{0}` has not been set")]
    MissingContext(&'static str),

    #[error("{0}")]
    Invalid(String),
}

impl From<serde_json::Error> for PhaseError {
    fn from(e: serde_json::Error) -> Self {
        PhaseError::MalformedReply(e.to_string())
    }
}

/// Tagged result of a phase
#[derive(Debug, Clone, PartialEq)]
pub enum PhaseOutcome<T> {
    Success { data: T },
    Failure { error: String },
}

impl<T> PhaseOutcome<T> {
    pub fn failure(error: impl std::fmt::Display) -> Self {
        PhaseOutcome::Failure {
            error: error.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PhaseOutcome::Success { .. })
    }

    pub fn into_result(self) -> Result<T, String> {
        match self {
            PhaseOutcome::Success { data } => Ok(data),
            PhaseOutcome::Failure { error } => Err(error),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> PhaseOutcome<U> {
        match self {
            PhaseOutcome::Success { data } => PhaseOutcome::Success { data: f(data) },
            PhaseOutcome::Failure { error } => PhaseOutcome::Failure { error },
        }
    }
}

/// Serializes as `{success, data}` or `{success, error}`
impl<T: Serialize> Serialize for PhaseOutcome<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("PhaseOutcome", 2)?;
        match self {
            PhaseOutcome::Success { data } => {
                state.serialize_field("success", &true)?;
                state.serialize_field("data", data)?;
            }
            PhaseOutcome::Failure { error } => {
                state.serialize_field("success", &false)?;
                state.serialize_field("error", error)?;
            }
        }
        state.end()
    }
}

/// One reasoning step of the pipeline
#[async_trait]
pub trait Phase: Send + Sync {
    /// Payload produced on success
    type Output: Send;

    fn kind(&self) -> PhaseKind;

    /// Build the request from fields written by earlier phases or setup
    fn instruction(&self, ctx: &WorkflowContext) -> Result<ReasoningRequest, PhaseError>;

    /// Turn the raw reply into this phase's output
    fn parse(&self, reply: &str, ctx: &WorkflowContext) -> Result<Self::Output, PhaseError>;

    async fn execute(
        &self,
        reasoner: &dyn ReasoningClient,
        ctx: &WorkflowContext,
    ) -> PhaseOutcome<Self::Output> {
        let request = match self.instruction(ctx) {
            Ok(request) => request,
            Err(e) => return PhaseOutcome::failure(e),
        };

        let reply = match reasoner.complete(&request).await {
            Ok(reply) => reply,
            Err(e) => return PhaseOutcome::failure(PhaseError::Reasoning(format!("{:#}", e))),
        };

        if reply.trim().is_empty() {
            return PhaseOutcome::failure(PhaseError::EmptyReply);
        }

        match self.parse(&reply, ctx) {
            Ok(data) => PhaseOutcome::Success { data },
            Err(e) => PhaseOutcome::failure(e),
        }
    }
}

/// Execute a phase with start/complete/failed events around it
pub async fn run_phase<P: Phase>(
    phase: &P,
    reasoner: &dyn ReasoningClient,
    ctx: &WorkflowContext,
) -> PhaseOutcome<P::Output> {
    let kind = phase.kind();
    log_phase_start!(kind.number(), kind.name(), PhaseKind::TOTAL);

    let outcome = phase.execute(reasoner, ctx).await;

    match &outcome {
        PhaseOutcome::Success { .. } => {
            log_phase_complete!(kind.number(), kind.name());
        }
        PhaseOutcome::Failure { error } => {
            log_phase_failed!(kind.number(), kind.name(), error);
            log_error!(error, format!("{} failed", kind.name()));
        }
    }

    outcome
}
