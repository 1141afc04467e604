//! Tests for pipeline orchestration
//!
//! Every test scripts the reasoning replies phase by phase and inspects the
//! report, the recorded persistence calls and the requests that were sent.

use super::common::*;
use backlog_planner::planner::phase::PhaseKind;
use backlog_planner::planner::types::{PlanInput, Task};
use backlog_planner::planner::workflow::{run_plan, PlannerWorkflow, COMPLETED_MESSAGE};
use backlog_planner::queue::{PlanQueue, PlanRequest};
use uuid::Uuid;

fn task<'a>(tasks: &'a [Task], uuid: &Uuid) -> &'a Task {
    tasks.iter().find(|t| &t.uuid == uuid).unwrap()
}

// ============================================================================
// Happy path
// ============================================================================

#[tokio::test]
async fn test_full_run_single_issue() {
    let h = Harness::new();
    let issue = Uuid::new_v4();
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

    h.reasoner
        .reply(PhaseKind::IssueGeneration, issues_reply(&[(issue, "Export spans")]))
        .reply(PhaseKind::TaskDecomposition, tasks_reply(&[(a, "Add exporter"), (b, "Wire config")]))
        .reply(PhaseKind::TaskValidation, decisions_reply(&[(a, true), (b, true)]))
        .reply(PhaseKind::TaskDependency, dependencies_reply(a, &[]))
        .reply(PhaseKind::TaskDependency, dependencies_reply(b, &[a]))
        .reply(PhaseKind::SystemPromptGeneration, prompt_reply("You are shipping telemetry."));

    let report = run_plan(plan_input(), h.services()).await;

    assert!(report.success);
    assert_eq!(report.message, COMPLETED_MESSAGE);
    assert_eq!(report.repo_owner, "acme");
    assert_eq!(report.repo_name, "rocket");
    assert_eq!(report.issue_spec, ISSUE_SPEC);
    assert_eq!(report.issues.len(), 1);
    assert_eq!(report.issues[0].fork_owner, "forker");
    assert_eq!(report.tasks.len(), 1);
    assert_eq!(titles(&report.tasks[0]), vec!["Add exporter", "Wire config"]);
    assert!(task(&report.tasks[0], &a).dependency_tasks.is_empty());
    assert_eq!(task(&report.tasks[0], &b).dependency_tasks, vec![a]);
    assert_eq!(report.system_prompt.as_deref(), Some("You are shipping telemetry."));

    // Everything approved is persisted, in order
    assert_eq!(h.sink.issues().len(), 1);
    assert_eq!(h.sink.task_uuids(), vec![a, b]);
    let stored_b = &h.sink.tasks()[1];
    assert_eq!(stored_b.issue_uuid, issue);
    assert_eq!(stored_b.bounty_id, BOUNTY_ID);
    assert_eq!(stored_b.acceptance_criteria, "Wire config works\ncovered by tests");
    assert_eq!(h.sink.prompts()[0].bounty_id, BOUNTY_ID);

    // No regeneration when everything passes
    assert!(h.reasoner.calls_for(PhaseKind::TaskRegeneration).is_empty());
    assert_eq!(h.reasoner.calls_for(PhaseKind::TaskDependency).len(), 2);
}

#[tokio::test]
async fn test_checkout_removed_after_run() {
    let h = Harness::new();
    h.reasoner.fail(PhaseKind::IssueGeneration, "model overloaded");

    run_plan(plan_input(), h.services()).await;

    let checkouts = h.repositories.checkouts();
    assert_eq!(checkouts.len(), 1);
    assert!(!checkouts[0].exists());
}

#[tokio::test]
async fn test_phases_see_checkout_files() {
    let h = Harness::new();
    h.reasoner.fail(PhaseKind::IssueGeneration, "stop here");

    run_plan(plan_input(), h.services()).await;

    let calls = h.reasoner.calls_for(PhaseKind::IssueGeneration);
    assert_eq!(calls.len(), 1);
    assert!(calls[0].prompt.contains("src/lib.rs"));
    assert!(calls[0].prompt.contains(ISSUE_SPEC));
}

#[tokio::test]
async fn test_base_branch_comes_from_checkout() {
    let h = Harness::with_repositories(FakeRepositories::new().with_branch("develop"));
    h.reasoner.fail(PhaseKind::IssueGeneration, "stop here");

    let mut workflow = PlannerWorkflow::new(&plan_input(), h.services()).unwrap();
    assert_eq!(workflow.context().base_branch, "main");

    workflow.run().await;

    assert_eq!(workflow.context().base_branch, "develop");
    let calls = h.reasoner.calls_for(PhaseKind::IssueGeneration);
    assert!(calls[0].prompt.contains("base branch `develop`"));
}

// ============================================================================
// Regeneration
// ============================================================================

#[tokio::test]
async fn test_regenerated_task_replaces_in_place_but_is_not_persisted() {
    let h = Harness::new();
    let issue = Uuid::new_v4();
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

    h.reasoner
        .reply(PhaseKind::IssueGeneration, issues_reply(&[(issue, "Export spans")]))
        .reply(PhaseKind::TaskDecomposition, tasks_reply(&[(a, "A"), (b, "B")]))
        .reply(PhaseKind::TaskValidation, decisions_reply(&[(a, false), (b, true)]))
        .reply(PhaseKind::TaskRegeneration, tasks_reply(&[(a, "A prime")]))
        .reply(PhaseKind::TaskDependency, dependencies_reply(a, &[]))
        .reply(PhaseKind::TaskDependency, dependencies_reply(b, &[]))
        .reply(PhaseKind::SystemPromptGeneration, prompt_reply("p"));

    let report = run_plan(plan_input(), h.services()).await;

    assert!(report.success);
    assert_eq!(titles(&report.tasks[0]), vec!["A prime", "B"]);
    assert_eq!(report.tasks[0][0].uuid, a);

    // Decisions are never recomputed: A was rejected, so only B is stored
    assert_eq!(h.sink.task_uuids(), vec![b]);

    // Only the rejected task and its feedback went to regeneration
    let regen = h.reasoner.calls_for(PhaseKind::TaskRegeneration);
    assert_eq!(regen.len(), 1);
    assert!(regen[0].prompt.contains(&a.to_string()));
    assert!(!regen[0].prompt.contains(&b.to_string()));
    assert!(regen[0].prompt.contains("acceptance criteria are vague"));

    // Dependency resolution saw the regenerated content
    let deps = h.reasoner.calls_for(PhaseKind::TaskDependency);
    assert!(deps[0].prompt.contains("A prime"));
}

#[tokio::test]
async fn test_regeneration_appends_unknown_uuid() {
    let h = Harness::new();
    let (a, b, extra) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    h.reasoner
        .reply(PhaseKind::IssueGeneration, issues_reply(&[(Uuid::new_v4(), "Export spans")]))
        .reply(PhaseKind::TaskDecomposition, tasks_reply(&[(a, "A"), (b, "B")]))
        .reply(PhaseKind::TaskValidation, decisions_reply(&[(a, false), (b, true)]))
        .reply(PhaseKind::TaskRegeneration, tasks_reply(&[(extra, "Split out"), (a, "A prime")]))
        .reply(PhaseKind::TaskDependency, dependencies_reply(a, &[]))
        .reply(PhaseKind::TaskDependency, dependencies_reply(b, &[]))
        .reply(PhaseKind::TaskDependency, dependencies_reply(extra, &[b]))
        .reply(PhaseKind::SystemPromptGeneration, prompt_reply("p"));

    let report = run_plan(plan_input(), h.services()).await;

    assert_eq!(titles(&report.tasks[0]), vec!["A prime", "B", "Split out"]);
    assert_eq!(report.tasks[0][2].dependency_tasks, vec![b]);
    // The appended task has no decision entry
    assert_eq!(h.sink.task_uuids(), vec![b]);
}

#[tokio::test]
async fn test_regeneration_failure_keeps_original_tasks() {
    let h = Harness::new();
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

    h.reasoner
        .reply(PhaseKind::IssueGeneration, issues_reply(&[(Uuid::new_v4(), "Export spans")]))
        .reply(PhaseKind::TaskDecomposition, tasks_reply(&[(a, "A"), (b, "B")]))
        .reply(PhaseKind::TaskValidation, decisions_reply(&[(a, false), (b, true)]))
        .fail(PhaseKind::TaskRegeneration, "timeout")
        .reply(PhaseKind::TaskDependency, dependencies_reply(a, &[]))
        .reply(PhaseKind::TaskDependency, dependencies_reply(b, &[a]))
        .reply(PhaseKind::SystemPromptGeneration, prompt_reply("p"));

    let report = run_plan(plan_input(), h.services()).await;

    assert!(report.success);
    assert_eq!(titles(&report.tasks[0]), vec!["A", "B"]);
    assert_eq!(report.tasks[0][1].dependency_tasks, vec![a]);
    assert_eq!(h.sink.task_uuids(), vec![b]);
}

#[tokio::test]
async fn test_regeneration_reply_without_uuid_is_a_failure() {
    let h = Harness::new();
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

    h.reasoner
        .reply(PhaseKind::IssueGeneration, issues_reply(&[(Uuid::new_v4(), "Export spans")]))
        .reply(PhaseKind::TaskDecomposition, tasks_reply(&[(a, "A"), (b, "B")]))
        .reply(PhaseKind::TaskValidation, decisions_reply(&[(a, false), (b, true)]))
        .reply(
            PhaseKind::TaskRegeneration,
            r#"{"tasks": [{"title": "Anonymous", "description": "d"}]}"#,
        )
        .reply(PhaseKind::TaskDependency, dependencies_reply(a, &[]))
        .reply(PhaseKind::TaskDependency, dependencies_reply(b, &[]))
        .reply(PhaseKind::SystemPromptGeneration, prompt_reply("p"));

    let report = run_plan(plan_input(), h.services()).await;

    assert_eq!(titles(&report.tasks[0]), vec!["A", "B"]);
}

// ============================================================================
// Dependency resolution
// ============================================================================

#[tokio::test]
async fn test_dependency_failure_is_isolated() {
    let h = Harness::new();
    let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    h.reasoner
        .reply(PhaseKind::IssueGeneration, issues_reply(&[(Uuid::new_v4(), "Export spans")]))
        .reply(PhaseKind::TaskDecomposition, tasks_reply(&[(a, "A"), (b, "B"), (c, "C")]))
        .reply(PhaseKind::TaskValidation, decisions_reply(&[(a, true), (b, true), (c, true)]))
        .reply(PhaseKind::TaskDependency, dependencies_reply(a, &[c]))
        .fail(PhaseKind::TaskDependency, "connection reset")
        .reply(PhaseKind::TaskDependency, dependencies_reply(c, &[a, b]))
        .reply(PhaseKind::SystemPromptGeneration, prompt_reply("p"));

    let report = run_plan(plan_input(), h.services()).await;

    assert!(report.success);
    let tasks = &report.tasks[0];
    assert_eq!(tasks[0].dependency_tasks, vec![c]);
    assert!(tasks[1].dependency_tasks.is_empty());
    assert_eq!(tasks[1].title, "B");
    assert_eq!(tasks[2].dependency_tasks, vec![a, b]);

    // B is still persisted, with no dependencies
    assert_eq!(h.sink.task_uuids(), vec![a, b, c]);
    assert!(h.sink.tasks()[1].dependency_tasks.is_empty());
}

#[tokio::test]
async fn test_dependency_reply_for_other_task_degrades() {
    let h = Harness::new();
    let a = Uuid::new_v4();

    h.reasoner
        .reply(PhaseKind::IssueGeneration, issues_reply(&[(Uuid::new_v4(), "Export spans")]))
        .reply(PhaseKind::TaskDecomposition, tasks_reply(&[(a, "A")]))
        .reply(PhaseKind::TaskValidation, decisions_reply(&[(a, true)]))
        .reply(PhaseKind::TaskDependency, dependencies_reply(Uuid::new_v4(), &[a]))
        .reply(PhaseKind::SystemPromptGeneration, prompt_reply("p"));

    let report = run_plan(plan_input(), h.services()).await;

    assert!(report.success);
    assert!(report.tasks[0][0].dependency_tasks.is_empty());
}

// ============================================================================
// Persistence gate
// ============================================================================

#[tokio::test]
async fn test_tasks_without_decision_are_not_persisted() {
    let h = Harness::new();
    let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    h.reasoner
        .reply(PhaseKind::IssueGeneration, issues_reply(&[(Uuid::new_v4(), "Export spans")]))
        .reply(PhaseKind::TaskDecomposition, tasks_reply(&[(a, "A"), (b, "B"), (c, "C")]))
        // No entry for C
        .reply(PhaseKind::TaskValidation, decisions_reply(&[(a, true), (b, true)]))
        .reply(PhaseKind::TaskDependency, dependencies_reply(a, &[]))
        .reply(PhaseKind::TaskDependency, dependencies_reply(b, &[]))
        .reply(PhaseKind::TaskDependency, dependencies_reply(c, &[]))
        .reply(PhaseKind::SystemPromptGeneration, prompt_reply("p"));

    let report = run_plan(plan_input(), h.services()).await;

    // C is neither rejected nor regenerated, but stays in the report
    assert!(h.reasoner.calls_for(PhaseKind::TaskRegeneration).is_empty());
    assert_eq!(report.tasks[0].len(), 3);
    assert_eq!(h.sink.task_uuids(), vec![a, b]);
}

#[tokio::test]
async fn test_task_persistence_failure_does_not_stop_siblings() {
    let h = Harness::new();
    let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    h.sink.fail_on(b);

    h.reasoner
        .reply(PhaseKind::IssueGeneration, issues_reply(&[(Uuid::new_v4(), "Export spans")]))
        .reply(PhaseKind::TaskDecomposition, tasks_reply(&[(a, "A"), (b, "B"), (c, "C")]))
        .reply(PhaseKind::TaskValidation, decisions_reply(&[(a, true), (b, true), (c, true)]))
        .reply(PhaseKind::TaskDependency, dependencies_reply(a, &[]))
        .reply(PhaseKind::TaskDependency, dependencies_reply(b, &[]))
        .reply(PhaseKind::TaskDependency, dependencies_reply(c, &[]))
        .reply(PhaseKind::SystemPromptGeneration, prompt_reply("p"));

    let report = run_plan(plan_input(), h.services()).await;

    assert!(report.success);
    assert_eq!(report.tasks[0].len(), 3);
    assert_eq!(h.sink.task_uuids(), vec![a, c]);
}

// ============================================================================
// Issue handling
// ============================================================================

#[tokio::test]
async fn test_issue_generation_failure_aborts_run() {
    let h = Harness::new();
    h.reasoner.fail(PhaseKind::IssueGeneration, "model overloaded");

    let report = run_plan(plan_input(), h.services()).await;

    assert!(!report.success);
    assert!(report.issues.is_empty());
    assert!(report.tasks.is_empty());
    assert!(report.system_prompt.is_none());
    assert!(h.sink.issues().is_empty());
    assert!(h.sink.tasks().is_empty());
    assert!(h.sink.prompts().is_empty());

    // No task work was attempted
    assert_eq!(h.reasoner.calls().len(), 1);
}

#[tokio::test]
async fn test_malformed_issue_reply_aborts_run() {
    let h = Harness::new();
    h.reasoner.reply(PhaseKind::IssueGeneration, "I could not find any issues, sorry.");

    let report = run_plan(plan_input(), h.services()).await;

    assert!(!report.success);
    assert!(h.sink.issues().is_empty());
}

#[tokio::test]
async fn test_issue_chain_invariant() {
    let h = Harness::new();
    let issues = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];

    h.reasoner.reply(
        PhaseKind::IssueGeneration,
        issues_reply(&[(issues[0], "First"), (issues[1], "Second"), (issues[2], "Third")]),
    );
    for _ in 0..3 {
        h.reasoner.fail(PhaseKind::TaskDecomposition, "skip");
    }
    h.reasoner.reply(PhaseKind::SystemPromptGeneration, prompt_reply("p"));

    let report = run_plan(plan_input(), h.services()).await;

    assert!(report.success);
    assert!(report.tasks.is_empty());
    assert_eq!(report.issues[0].predecessor_uuid, None);
    assert_eq!(report.issues[1].predecessor_uuid, Some(issues[0]));
    assert_eq!(report.issues[2].predecessor_uuid, Some(issues[1]));

    // Issues are stored one by one, in generation order
    let stored: Vec<Uuid> = h.sink.issues().iter().map(|i| i.uuid).collect();
    assert_eq!(stored, issues.to_vec());
}

#[tokio::test]
async fn test_decomposition_failure_skips_only_that_issue() {
    let h = Harness::new();
    let (first, second) = (Uuid::new_v4(), Uuid::new_v4());
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

    h.reasoner
        .reply(PhaseKind::IssueGeneration, issues_reply(&[(first, "First"), (second, "Second")]))
        .fail(PhaseKind::TaskDecomposition, "rate limited")
        .reply(PhaseKind::TaskDecomposition, tasks_reply(&[(a, "A"), (b, "B")]))
        .reply(PhaseKind::TaskValidation, decisions_reply(&[(a, true), (b, true)]))
        .reply(PhaseKind::TaskDependency, dependencies_reply(a, &[]))
        .reply(PhaseKind::TaskDependency, dependencies_reply(b, &[]))
        .reply(PhaseKind::SystemPromptGeneration, prompt_reply("p"));

    let report = run_plan(plan_input(), h.services()).await;

    assert!(report.success);
    assert_eq!(report.issues.len(), 2);
    assert_eq!(report.tasks.len(), 1);
    assert!(report.tasks[0].iter().all(|t| t.issue_uuid == second));
    assert_eq!(h.sink.task_uuids(), vec![a, b]);

    // The system prompt covers both issues
    let prompt_call = &h.reasoner.calls_for(PhaseKind::SystemPromptGeneration)[0];
    assert!(prompt_call.prompt.contains("First"));
    assert!(prompt_call.prompt.contains("Second"));
}

#[tokio::test]
async fn test_decomposition_with_code_fence_in_description() {
    let h = Harness::new();
    let a = Uuid::new_v4();
    let description = "Add the exporter:\n```rust\npub fn export(span: &Span) {}\n```\nKeep it behind a feature flag.";
    let reply = serde_json::json!({
        "tasks": [{
            "uuid": a,
            "title": "Add exporter",
            "description": description,
            "acceptance_criteria": ["```cargo test``` passes"]
        }]
    });

    h.reasoner
        .reply(PhaseKind::IssueGeneration, issues_reply(&[(Uuid::new_v4(), "Only")]))
        .reply(PhaseKind::TaskDecomposition, format!("```json\n{}\n```", reply))
        .reply(PhaseKind::TaskValidation, decisions_reply(&[(a, true)]))
        .reply(PhaseKind::TaskDependency, dependencies_reply(a, &[]))
        .reply(
            PhaseKind::SystemPromptGeneration,
            prompt_reply("Use:\n```rust\nexport(&span);\n```"),
        );

    let report = run_plan(plan_input(), h.services()).await;

    assert!(report.success);
    assert_eq!(report.tasks.len(), 1);
    assert_eq!(report.tasks[0][0].description, description);
    assert_eq!(h.sink.task_uuids(), vec![a]);
    assert_eq!(report.system_prompt.as_deref(), Some("Use:\n```rust\nexport(&span);\n```"));
}

#[tokio::test]
async fn test_empty_decomposition_skips_issue() {
    let h = Harness::new();

    h.reasoner
        .reply(PhaseKind::IssueGeneration, issues_reply(&[(Uuid::new_v4(), "Only")]))
        .reply(PhaseKind::TaskDecomposition, r#"{"tasks": []}"#)
        .reply(PhaseKind::SystemPromptGeneration, prompt_reply("p"));

    let report = run_plan(plan_input(), h.services()).await;

    assert!(report.success);
    assert!(report.tasks.is_empty());
    assert!(h.reasoner.calls_for(PhaseKind::TaskValidation).is_empty());
}

#[tokio::test]
async fn test_validation_failure_skips_issue() {
    let h = Harness::new();
    let a = Uuid::new_v4();

    h.reasoner
        .reply(PhaseKind::IssueGeneration, issues_reply(&[(Uuid::new_v4(), "Only")]))
        .reply(PhaseKind::TaskDecomposition, tasks_reply(&[(a, "A")]))
        .reply(PhaseKind::TaskValidation, "")
        .reply(PhaseKind::SystemPromptGeneration, prompt_reply("p"));

    let report = run_plan(plan_input(), h.services()).await;

    assert!(report.success);
    assert!(report.tasks.is_empty());
    assert!(h.sink.tasks().is_empty());
    assert!(h.reasoner.calls_for(PhaseKind::TaskDependency).is_empty());
}

#[tokio::test]
async fn test_issue_persistence_failure_is_not_fatal() {
    let h = Harness::new();
    let (first, second) = (Uuid::new_v4(), Uuid::new_v4());
    h.sink.fail_on(first);

    h.reasoner
        .reply(PhaseKind::IssueGeneration, issues_reply(&[(first, "First"), (second, "Second")]))
        .fail(PhaseKind::TaskDecomposition, "skip")
        .fail(PhaseKind::TaskDecomposition, "skip")
        .reply(PhaseKind::SystemPromptGeneration, prompt_reply("p"));

    let report = run_plan(plan_input(), h.services()).await;

    assert!(report.success);
    assert_eq!(report.issues.len(), 2);
    let stored: Vec<Uuid> = h.sink.issues().iter().map(|i| i.uuid).collect();
    assert_eq!(stored, vec![second]);
}

#[tokio::test]
async fn test_no_issues_is_a_successful_empty_run() {
    let h = Harness::new();
    h.reasoner
        .reply(PhaseKind::IssueGeneration, r#"{"issues": []}"#)
        .reply(PhaseKind::SystemPromptGeneration, prompt_reply("nothing to do"));

    let report = run_plan(plan_input(), h.services()).await;

    assert!(report.success);
    assert!(report.issues.is_empty());
    assert_eq!(report.task_total(), 0);
}

// ============================================================================
// System prompt
// ============================================================================

#[tokio::test]
async fn test_system_prompt_failure_leaves_prompt_empty() {
    let h = Harness::new();
    let a = Uuid::new_v4();

    h.reasoner
        .reply(PhaseKind::IssueGeneration, issues_reply(&[(Uuid::new_v4(), "Only")]))
        .reply(PhaseKind::TaskDecomposition, tasks_reply(&[(a, "A")]))
        .reply(PhaseKind::TaskValidation, decisions_reply(&[(a, true)]))
        .reply(PhaseKind::TaskDependency, dependencies_reply(a, &[]))
        .fail(PhaseKind::SystemPromptGeneration, "context window exceeded");

    let report = run_plan(plan_input(), h.services()).await;

    assert!(report.success);
    assert!(report.system_prompt.is_none());
    assert_eq!(report.task_total(), 1);
    assert!(h.sink.prompts().is_empty());
}

#[tokio::test]
async fn test_system_prompt_persistence_failure_keeps_prompt() {
    let h = Harness::new();
    h.sink.fail_prompts();
    h.reasoner
        .reply(PhaseKind::IssueGeneration, r#"{"issues": []}"#)
        .reply(PhaseKind::SystemPromptGeneration, prompt_reply("keep me"));

    let report = run_plan(plan_input(), h.services()).await;

    assert_eq!(report.system_prompt.as_deref(), Some("keep me"));
}

// ============================================================================
// Setup and input
// ============================================================================

#[tokio::test]
async fn test_setup_failure_aborts_before_reasoning() {
    let h = Harness::with_repositories(FakeRepositories::failing());

    let report = run_plan(plan_input(), h.services()).await;

    assert!(!report.success);
    assert!(report.message.contains("Repository setup failed"));
    assert!(h.reasoner.calls().is_empty());
}

#[tokio::test]
async fn test_invalid_source_url_is_reported() {
    let h = Harness::new();
    let input = PlanInput {
        source_url: "acme/rocket".to_string(),
        ..plan_input()
    };

    let report = run_plan(input, h.services()).await;

    assert!(!report.success);
    assert!(report.message.contains("Invalid plan input"));
    assert!(h.repositories.checkouts().is_empty());
}

#[tokio::test]
async fn test_generate_tasks_for_unknown_issue() {
    let h = Harness::new();
    let mut workflow = PlannerWorkflow::new(&plan_input(), h.services()).unwrap();

    assert!(workflow.generate_tasks(Uuid::new_v4()).await.is_none());
    assert!(h.reasoner.calls().is_empty());
    assert!(workflow.context().feature_spec.is_none());
}

#[tokio::test]
async fn test_generate_tasks_result_shape() {
    let h = Harness::new();
    let issue = Uuid::new_v4();
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

    h.reasoner
        .reply(PhaseKind::IssueGeneration, issues_reply(&[(issue, "Only")]))
        .reply(PhaseKind::TaskDecomposition, tasks_reply(&[(a, "A"), (b, "B")]))
        .reply(PhaseKind::TaskValidation, decisions_reply(&[(a, true), (b, false)]))
        .fail(PhaseKind::TaskRegeneration, "skip")
        .reply(PhaseKind::TaskDependency, dependencies_reply(a, &[]))
        .reply(PhaseKind::TaskDependency, dependencies_reply(b, &[a]));

    let mut workflow = PlannerWorkflow::new(&plan_input(), h.services()).unwrap();
    let issues = workflow.generate_issues().await.unwrap();
    let result = workflow.generate_tasks(issues[0].uuid).await.unwrap();

    assert!(result.success);
    assert_eq!(result.task_count, 2);
    assert_eq!(result.tasks.len(), 2);
    assert_eq!(workflow.context().feedbacks.len(), 2);
    assert!(workflow.context().target_task.is_none());
}

// ============================================================================
// Queue boundary
// ============================================================================

#[tokio::test]
async fn test_queue_runs_submitted_plan() {
    let h = Harness::new();
    h.reasoner.fail(PhaseKind::IssueGeneration, "stop");

    let queue = PlanQueue::with_services(h.services());
    let ack = queue
        .submit(PlanRequest {
            source_url: Some(SOURCE_URL.to_string()),
            fork_url: Some(FORK_URL.to_string()),
            issue_spec: Some(serde_json::json!(ISSUE_SPEC)),
            bounty_id: Some(BOUNTY_ID.to_string()),
        })
        .unwrap();
    assert!(ack.success);

    let reports = queue.drain().await;
    assert_eq!(reports.len(), 1);
    assert!(!reports[0].success);
    assert_eq!(h.reasoner.calls().len(), 1);
}
