//! Backlog planning pipeline.
//!
//! Turns a free-form feature specification into a chain of issues, each
//! decomposed into validated, dependency-annotated tasks, plus one aggregate
//! system prompt for the whole run.
//!
//! ## Module Structure
//!
//! - `types` - Issues, tasks, decisions, records and reports
//! - `context` - Typed state threaded through one run
//! - `phase` - Phase contract, tagged outcomes and the phase runner
//! - `phase1_issues` - Generate the issue chain from the specification
//! - `phase2_decompose` - Decompose one issue into tasks
//! - `phase3_validate` - Approve or reject each task
//! - `phase4_regenerate` - Rewrite rejected tasks from feedback
//! - `phase5_dependencies` - Resolve dependencies of a single task
//! - `phase6_system_prompt` - Build the aggregate system prompt
//! - `reconcile` - Merge-by-uuid and the persistence gate
//! - `dependency_resolver` - Per-task dependency resolution with failure isolation
//! - `workflow` - Main workflow orchestration
//! - `cli` - Command-line argument definitions
//! - `utils` - Reply parsing and URL helpers

pub mod cli;
pub mod context;
pub mod dependency_resolver;
pub mod phase;
pub mod phase1_issues;
pub mod phase2_decompose;
pub mod phase3_validate;
pub mod phase4_regenerate;
pub mod phase5_dependencies;
pub mod phase6_system_prompt;
pub mod reconcile;
pub mod types;
pub mod utils;
pub mod workflow;

pub use workflow::run_workflow;
