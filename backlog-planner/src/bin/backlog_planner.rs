use clap::Parser;
use backlog_planner::planner::{cli::Args, run_workflow};
use backlog_planner_sdk::task_events::{ResultStatus, CALLBACK_URL_ENV};
use backlog_planner_sdk::{log_error, log_info, log_key_value, TaskEventClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    // Only report to a parent node when running as a worker
    let events = std::env::var(CALLBACK_URL_ENV)
        .is_ok()
        .then(TaskEventClient::from_env);

    if let Some(events) = &events {
        events.send_status_update("Planning started", Some(0)).await;
    }

    let report = match run_workflow(args).await {
        Ok(report) => report,
        Err(e) => {
            if let Some(events) = &events {
                events.send_task_error(&format!("{:#}", e), None, None).await;
            }
            return Err(e);
        }
    };

    if let Some(events) = &events {
        let status = if report.success {
            ResultStatus::Completed
        } else {
            ResultStatus::Failed
        };
        let error_message = (!report.success).then(|| report.message.clone());
        events
            .send_task_result(status, serde_json::to_value(&report).ok(), error_message)
            .await;
    }

    if !report.success {
        log_error!(report.message, "Planning failed");
        std::process::exit(1);
    }

    log_info!(report.message);
    log_key_value!("Issues", report.issues.len());
    log_key_value!("Tasks", report.task_total());
    log_key_value!(
        "System prompt",
        if report.system_prompt.is_some() { "generated" } else { "missing" }
    );

    Ok(())
}
