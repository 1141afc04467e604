//! Bounded background queue for plan requests
//!
//! Requests are validated up front and acknowledged immediately. The runs
//! themselves happen in the background, at most [`DEFAULT_CAPACITY`] at a
//! time; their reports are only logged.

use futures::future::{join_all, BoxFuture};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::planner::types::{PipelineReport, PlanInput};
use crate::planner::workflow::{run_plan, PlannerServices};
use backlog_planner_sdk::{log_error, log_info, log_key_value};

/// Concurrent runs allowed per queue
pub const DEFAULT_CAPACITY: usize = 2;

pub const SUBMITTED_MESSAGE: &str = "Task submitted for processing";

/// Raw request as received at the boundary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRequest {
    pub source_url: Option<String>,
    pub fork_url: Option<String>,
    /// Free text or a structured document
    pub issue_spec: Option<Value>,
    pub bounty_id: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("Missing data: {0}")]
    MissingField(&'static str),
}

/// Request with every field present
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedPlanRequest(PlanInput);

impl ValidatedPlanRequest {
    pub fn input(&self) -> &PlanInput {
        &self.0
    }

    pub fn into_input(self) -> PlanInput {
        self.0
    }
}

impl PlanRequest {
    /// Check that all four fields are present
    pub fn validate(self) -> Result<ValidatedPlanRequest, RequestError> {
        let source_url = self.source_url.ok_or(RequestError::MissingField("sourceUrl"))?;
        let fork_url = self.fork_url.ok_or(RequestError::MissingField("forkUrl"))?;
        let issue_spec = match self.issue_spec {
            None | Some(Value::Null) => return Err(RequestError::MissingField("issueSpec")),
            Some(Value::String(text)) => text,
            Some(other) => serde_json::to_string_pretty(&other).unwrap_or_else(|_| other.to_string()),
        };
        let bounty_id = self.bounty_id.ok_or(RequestError::MissingField("bountyId"))?;

        Ok(ValidatedPlanRequest(PlanInput {
            source_url,
            fork_url,
            issue_spec,
            bounty_id,
        }))
    }
}

/// Immediate answer to a submitted request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Acknowledgement {
    pub success: bool,
    pub message: String,
}

/// Runs one plan input to completion
pub type PlanRunner = Arc<dyn Fn(PlanInput) -> BoxFuture<'static, PipelineReport> + Send + Sync>;

pub struct PlanQueue {
    permits: Arc<Semaphore>,
    runner: PlanRunner,
    handles: Mutex<Vec<JoinHandle<PipelineReport>>>,
}

impl PlanQueue {
    pub fn new(runner: PlanRunner, capacity: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(capacity.max(1))),
            runner,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Queue running the full pipeline with the given services
    pub fn with_services(services: PlannerServices) -> Self {
        let runner: PlanRunner = Arc::new(move |input: PlanInput| -> BoxFuture<'static, PipelineReport> {
            Box::pin(run_plan(input, services.clone()))
        });
        Self::new(runner, DEFAULT_CAPACITY)
    }

    /// Validate and enqueue a request; must be called inside a tokio runtime
    pub fn submit(&self, request: PlanRequest) -> Result<Acknowledgement, RequestError> {
        let input = request.validate()?.into_input();
        log_info!("Queued plan for {} (bounty {})", input.source_url, input.bounty_id);

        let permits = self.permits.clone();
        let runner = self.runner.clone();
        let handle = tokio::spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => Some(permit),
                Err(e) => {
                    log_error!(e, "Plan queue closed");
                    None
                }
            };

            let bounty_id = input.bounty_id.clone();
            let report = runner(input).await;
            if report.success {
                log_info!("Plan for bounty {} completed", bounty_id);
                log_key_value!("Issues", report.issues.len());
                log_key_value!("Tasks", report.task_total());
            } else {
                log_error!(report.message, format!("Plan for bounty {} failed", bounty_id));
            }
            report
        });

        self.handles
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(handle);

        Ok(Acknowledgement {
            success: true,
            message: SUBMITTED_MESSAGE.to_string(),
        })
    }

    /// Wait for every run submitted so far
    pub async fn drain(&self) -> Vec<PipelineReport> {
        let handles: Vec<_> = self
            .handles
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .drain(..)
            .collect();

        join_all(handles)
            .await
            .into_iter()
            .filter_map(|joined| match joined {
                Ok(report) => Some(report),
                Err(e) => {
                    log_error!(e, "Plan run panicked");
                    None
                }
            })
            .collect()
    }

    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }
}
