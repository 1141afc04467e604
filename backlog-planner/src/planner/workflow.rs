//! Main workflow orchestration for the backlog planner.
//!
//! One run goes through:
//! 1. Check out the repository (held for the whole run, removed on drop)
//! 2. Generate the issue chain and persist every issue
//! 3. For each issue: decompose, validate, regenerate rejected tasks once,
//!    resolve dependencies per task, persist approved tasks
//! 4. Generate and persist one system prompt for the whole run
//!
//! Only this module writes to the [`WorkflowContext`]. Phases receive it
//! read-only and hand their output back here.

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use crate::database::{Database, PersistenceSink};
use crate::planner::{
    cli::Args,
    context::WorkflowContext,
    dependency_resolver::{resolve_dependencies, without_dependencies},
    phase::{run_phase, PhaseOutcome},
    phase1_issues::IssueGenerationPhase,
    phase2_decompose::TaskDecompositionPhase,
    phase3_validate::TaskValidationPhase,
    phase4_regenerate::TaskRegenerationPhase,
    phase6_system_prompt::SystemPromptPhase,
    reconcile::{approved_tasks, chain_issues, merge_into, select_audited},
    types::{Issue, IssueTasksResult, PipelineReport, PlanInput, SystemPrompt, Task, TaskRecord},
};
use crate::queue::{PlanQueue, PlanRequest};
use crate::reasoning::{AnthropicClient, ReasoningClient, DEFAULT_MAX_TOKENS, DEFAULT_MODEL};
use crate::repository::{Checkout, CheckoutRequest, GitCheckout, GitCredentials, RepositoryProvider};
use backlog_planner_sdk::{
    log_error, log_found, log_info, log_key_value, log_persist_failed, log_phase_complete_console,
    log_phase_start_console, log_progress, log_record_persisted, log_review_issue,
    log_review_summary, log_warning, RecordKind,
};

pub const COMPLETED_MESSAGE: &str = "Issue generation workflow completed";

/// Planner configuration derived from CLI arguments
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    pub source_url: String,
    pub fork_url: String,

    /// Inline specification, if given
    pub issue_spec: Option<String>,

    /// File holding the specification, if given
    pub issue_spec_file: Option<PathBuf>,

    pub bounty_id: String,

    /// SQLite database path
    pub db_path: PathBuf,

    /// Directory under which checkouts are created; system temp when unset
    pub work_dir: Option<PathBuf>,

    pub model: String,
    pub max_tokens: u32,

    /// Where to write the JSON report
    pub report_path: Option<PathBuf>,

    /// Enable debug output
    pub debug: bool,
}

impl From<Args> for PlannerConfig {
    fn from(args: Args) -> Self {
        let db_path = args.db.map(PathBuf::from).unwrap_or_else(default_db_path);

        PlannerConfig {
            source_url: args.source_url,
            fork_url: args.fork_url,
            issue_spec: args.issue_spec,
            issue_spec_file: args.issue_spec_file.map(PathBuf::from),
            bounty_id: args.bounty_id,
            db_path,
            work_dir: args.work_dir.map(PathBuf::from),
            model: args.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: args.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            report_path: args.report.map(PathBuf::from),
            debug: args.debug,
        }
    }
}

impl PlannerConfig {
    /// Resolve the specification source into a plan input
    pub fn plan_input(&self) -> Result<PlanInput> {
        let issue_spec = match (&self.issue_spec, &self.issue_spec_file) {
            (Some(spec), _) => spec.clone(),
            (None, Some(path)) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read issue spec from {}", path.display()))?,
            (None, None) => anyhow::bail!("No issue spec given"),
        };

        Ok(PlanInput {
            source_url: self.source_url.clone(),
            fork_url: self.fork_url.clone(),
            issue_spec,
            bounty_id: self.bounty_id.clone(),
        })
    }

    /// Checkout provider rooted at `work_dir`
    pub fn repositories(&self) -> GitCheckout {
        match &self.work_dir {
            Some(dir) => GitCheckout::new(dir.clone()),
            None => GitCheckout::in_temp_dir(),
        }
    }
}

/// `~/.backlog-planner/backlog.db`, or the current directory when there is no home
pub fn default_db_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".backlog-planner")
        .join("backlog.db")
}

/// External collaborators of a run
#[derive(Clone)]
pub struct PlannerServices {
    pub reasoner: Arc<dyn ReasoningClient>,
    pub sink: Arc<dyn PersistenceSink>,
    pub repositories: Arc<dyn RepositoryProvider>,
    pub credentials: Option<GitCredentials>,
}

/// One pipeline run over one plan input
pub struct PlannerWorkflow {
    services: PlannerServices,
    ctx: WorkflowContext,
}

impl PlannerWorkflow {
    pub fn new(input: &PlanInput, services: PlannerServices) -> Result<Self> {
        let ctx = WorkflowContext::from_input(input)?;
        Ok(Self { services, ctx })
    }

    pub fn context(&self) -> &WorkflowContext {
        &self.ctx
    }

    /// Run every step and assemble the report
    pub async fn run(&mut self) -> PipelineReport {
        // Dropped on every return path below, which removes the clone
        let _checkout = match self.setup().await {
            Ok(checkout) => checkout,
            Err(e) => {
                log_error!(format!("{:#}", e), "Repository setup failed");
                return self.failure_report(format!("Repository setup failed: {:#}", e));
            }
        };

        let Some(issues) = self.generate_issues().await else {
            return self.failure_report("Issue generation failed");
        };

        let mut tasks: Vec<Vec<Task>> = Vec::with_capacity(issues.len());
        for (index, issue) in issues.iter().enumerate() {
            log_progress!(index + 1, issues.len(), "issues");
            match self.generate_tasks(issue.uuid).await {
                Some(result) => tasks.push(result.tasks),
                None => {
                    log_warning!("No tasks for issue '{}'; continuing with the next issue", issue.title);
                }
            }
        }

        let system_prompt = self.generate_system_prompts(&issues, &tasks).await;

        let report = PipelineReport {
            success: true,
            message: COMPLETED_MESSAGE.to_string(),
            issues,
            tasks,
            system_prompt,
            issue_spec: self.ctx.issue_spec.clone(),
            repo_owner: self.ctx.repo_owner.clone(),
            repo_name: self.ctx.repo_name.clone(),
        };

        log_key_value!("Issues", report.issues.len());
        log_key_value!("Tasks", report.task_total());

        report
    }

    async fn setup(&mut self) -> Result<Checkout> {
        let request = CheckoutRequest {
            repo_url: self.ctx.repo_url.clone(),
            fork_url: self.ctx.fork_url.clone(),
            credentials: self.services.credentials.clone(),
        };

        let checkout = self.services.repositories.checkout(&request).await?;

        self.ctx.fork_owner = checkout.fork_owner.clone();
        self.ctx.base_branch = checkout.base_branch.clone();
        self.ctx.current_files = checkout.current_files.clone();
        log_key_value!("Base branch", &self.ctx.base_branch);
        log_found!(self.ctx.current_files.len(), "tracked files");

        Ok(checkout)
    }

    /// Generate, chain and persist the issues of this run
    ///
    /// `None` when the phase fails; persistence failures are only logged.
    pub async fn generate_issues(&mut self) -> Option<Vec<Issue>> {
        log_phase_start_console!(1, "Issue Generation", "Split the feature request into ordered issues");

        let reasoner = self.services.reasoner.clone();
        let generated = match run_phase(&IssueGenerationPhase, reasoner.as_ref(), &self.ctx).await {
            PhaseOutcome::Success { data } => data,
            PhaseOutcome::Failure { .. } => return None,
        };

        let issues = chain_issues(
            generated,
            &self.ctx.repo_owner,
            &self.ctx.repo_name,
            &self.ctx.bounty_id,
            &self.ctx.fork_owner,
            &self.ctx.fork_url,
        );

        for issue in &issues {
            match self.services.sink.insert_issue(issue) {
                Ok(()) => {
                    log_record_persisted!(RecordKind::Issue, issue.uuid);
                }
                Err(e) => {
                    log_persist_failed!(RecordKind::Issue, issue.uuid, e);
                    log_error!(e, format!("Failed to insert issue {}", issue.uuid));
                }
            }
        }

        log_found!(issues.len(), "issues");
        log_phase_complete_console!(1);

        self.ctx.issues = issues.clone();
        Some(issues)
    }

    /// Decompose, validate, regenerate, resolve and persist one issue's tasks
    ///
    /// `None` when the issue is unknown, decomposition fails or yields no
    /// tasks, or validation fails. The returned tasks are the reconciled
    /// list, including tasks that were not persisted.
    pub async fn generate_tasks(&mut self, issue_uuid: Uuid) -> Option<IssueTasksResult> {
        let Some(issue) = self.ctx.issues.iter().find(|i| i.uuid == issue_uuid).cloned() else {
            log_error!(issue_uuid, "Unknown issue");
            return None;
        };
        log_info!("Planning tasks for issue '{}'", issue.title);
        self.ctx.begin_issue(issue);

        let reasoner = self.services.reasoner.clone();
        let reasoner = reasoner.as_ref();

        // Decompose
        let mut tasks_data = match run_phase(&TaskDecompositionPhase, reasoner, &self.ctx).await {
            PhaseOutcome::Success { data } => data.tasks,
            PhaseOutcome::Failure { .. } => return None,
        };
        if tasks_data.is_empty() {
            log_error!("decomposition returned no tasks", format!("Issue {}", issue_uuid));
            return None;
        }
        self.ctx.subtasks = tasks_data.clone();

        // Validate
        let decisions = match run_phase(&TaskValidationPhase, reasoner, &self.ctx).await {
            PhaseOutcome::Success { data } => data,
            PhaseOutcome::Failure { .. } => return None,
        };

        let audited = select_audited(&tasks_data, &decisions);
        let approved = approved_tasks(&tasks_data, &decisions).count();
        log_review_summary!(approved, audited.len(), tasks_data.len());
        for task in &audited {
            log_review_issue!(task.uuid, &task.title);
        }

        // Regenerate rejected tasks, once
        if !audited.is_empty() {
            self.ctx.audited_subtasks = audited;
            self.ctx.feedbacks = decisions.clone();

            match run_phase(&TaskRegenerationPhase, reasoner, &self.ctx).await {
                PhaseOutcome::Success { data } => merge_into(&mut tasks_data, data),
                PhaseOutcome::Failure { error } => {
                    log_warning!("Keeping rejected tasks as they are: {}", error);
                }
            }
        }

        // Resolve dependencies per task
        self.ctx.subtasks = tasks_data;
        let summary = resolve_dependencies(reasoner, &mut self.ctx).await;
        if summary.degraded > 0 {
            log_warning!(
                "{} of {} tasks have no resolved dependencies",
                summary.degraded,
                self.ctx.subtasks.len()
            );
        }
        log_key_value!("Tasks without dependencies", without_dependencies(&self.ctx).len());
        let tasks_data = self.ctx.subtasks.clone();

        // Persist approved tasks
        let mut persisted = 0;
        for task in approved_tasks(&tasks_data, &decisions) {
            match self.services.sink.insert_task(&TaskRecord::from(task)) {
                Ok(()) => {
                    persisted += 1;
                    log_record_persisted!(RecordKind::Task, task.uuid);
                }
                Err(e) => {
                    log_persist_failed!(RecordKind::Task, task.uuid, e);
                    log_error!(e, format!("Failed to insert task {}", task.uuid));
                }
            }
        }
        log_key_value!("Tasks persisted", persisted);

        let task_count = tasks_data.len();
        Some(IssueTasksResult {
            success: true,
            message: format!("Generated {} tasks", task_count),
            tasks: tasks_data,
            task_count,
        })
    }

    /// Build and persist one prompt for the whole run
    ///
    /// `None` when the phase fails; a persistence failure keeps the prompt.
    pub async fn generate_system_prompts(&mut self, issues: &[Issue], tasks: &[Vec<Task>]) -> Option<String> {
        log_phase_start_console!(6, "System Prompt Generation", "Summarize the backlog for coding agents");

        self.ctx.issues = issues.to_vec();
        self.ctx.task_lists = tasks.to_vec();

        let reasoner = self.services.reasoner.clone();
        let prompt = match run_phase(&SystemPromptPhase, reasoner.as_ref(), &self.ctx).await {
            PhaseOutcome::Success { data } => data,
            PhaseOutcome::Failure { .. } => return None,
        };

        let record = SystemPrompt {
            prompt: prompt.clone(),
            bounty_id: self.ctx.bounty_id.clone(),
        };
        match self.services.sink.insert_system_prompt(&record) {
            Ok(()) => {
                log_record_persisted!(RecordKind::SystemPrompt, &self.ctx.bounty_id);
            }
            Err(e) => {
                log_persist_failed!(RecordKind::SystemPrompt, &self.ctx.bounty_id, e);
                log_error!(e, "Failed to insert system prompt");
            }
        }

        log_phase_complete_console!(6);
        Some(prompt)
    }

    fn failure_report(&self, message: impl Into<String>) -> PipelineReport {
        PipelineReport::failure(
            message,
            &self.ctx.issue_spec,
            &self.ctx.repo_owner,
            &self.ctx.repo_name,
        )
    }
}

/// Run the planner from CLI arguments
///
/// Goes through the same bounded queue as any other submitter, waits for the
/// run and writes the JSON report when `--report` is given.
pub async fn run_workflow(args: Args) -> Result<PipelineReport> {
    args.validate()?;
    let config = PlannerConfig::from(args);
    let input = config.plan_input()?;

    let db = Database::new(config.db_path.clone())
        .with_context(|| format!("Failed to open database at {}", config.db_path.display()))?;
    db.initialize_schema()?;

    let reasoner = AnthropicClient::from_env(&config.model)?
        .with_max_tokens(config.max_tokens)
        .with_debug(config.debug);

    log_key_value!("Repository", &input.source_url);
    log_key_value!("Model", reasoner.model());
    log_key_value!("Database", config.db_path.display());

    let services = PlannerServices {
        reasoner: Arc::new(reasoner),
        sink: Arc::new(db),
        repositories: Arc::new(config.repositories()),
        credentials: GitCredentials::from_env(),
    };

    let queue = PlanQueue::with_services(services);
    let ack = queue.submit(PlanRequest {
        source_url: Some(input.source_url),
        fork_url: Some(input.fork_url),
        issue_spec: Some(Value::String(input.issue_spec)),
        bounty_id: Some(input.bounty_id),
    })?;
    log_info!(ack.message);

    let report = queue
        .drain()
        .await
        .pop()
        .context("Planner run ended without a report")?;

    if let Some(path) = &config.report_path {
        let json = serde_json::to_string_pretty(&report)?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        log_key_value!("Report", path.display());
    }

    Ok(report)
}

/// Build a workflow for `input` and run it to completion
pub async fn run_plan(input: PlanInput, services: PlannerServices) -> PipelineReport {
    match PlannerWorkflow::new(&input, services) {
        Ok(mut workflow) => workflow.run().await,
        Err(e) => {
            log_error!(format!("{:#}", e), "Invalid plan input");
            PipelineReport::failure(format!("Invalid plan input: {:#}", e), &input.issue_spec, "", "")
        }
    }
}
