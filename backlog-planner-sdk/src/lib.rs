//! Shared logging and worker-reporting primitives for backlog-planner.
//!
//! - [`WorkflowLog`]: structured events emitted on stderr for supervisors
//! - console macros: colored human-readable output
//! - [`task_events`]: callback client used by worker processes

pub mod task_events;

pub use task_events::{EventType, TaskEventClient, TaskEventMessage};

use serde::{Deserialize, Serialize};

/// Prefix marking a structured event line on stderr
pub const EVENT_PREFIX: &str = "__WF_EVENT__:";

/// Kind of record handed to the persistence sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Issue,
    Task,
    SystemPrompt,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKind::Issue => write!(f, "issue"),
            RecordKind::Task => write!(f, "task"),
            RecordKind::SystemPrompt => write!(f, "system prompt"),
        }
    }
}

/// Structured logging events emitted by the planner pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowLog {
    /// Phase started
    PhaseStarted {
        phase: usize,
        name: String,
        total_phases: usize,
    },
    /// Phase completed
    PhaseCompleted {
        phase: usize,
        name: String,
    },
    /// Phase failed
    PhaseFailed {
        phase: usize,
        name: String,
        error: String,
    },
    /// Work item started (an issue branch or a single task)
    TaskStarted {
        phase: usize,
        task_id: String,
        description: String,
        total_tasks: Option<usize>,
    },
    /// Position of a work item within its phase
    TaskProgress {
        task_id: String,
        current: usize,
        total: usize,
        message: String,
    },
    /// Work item completed
    TaskCompleted {
        task_id: String,
        result: Option<String>,
    },
    /// Work item failed
    TaskFailed {
        task_id: String,
        error: String,
    },
    /// Record written to the persistence sink
    RecordPersisted {
        kind: RecordKind,
        uuid: String,
    },
    /// Record rejected by the persistence sink
    PersistFailed {
        kind: RecordKind,
        uuid: String,
        error: String,
    },
}

impl WorkflowLog {
    /// Render this event as a single prefixed line
    pub fn to_line(&self) -> Option<String> {
        serde_json::to_string(self)
            .ok()
            .map(|json| format!("{}{}", EVENT_PREFIX, json))
    }

    /// Parse a line produced by [`WorkflowLog::to_line`]
    pub fn from_line(line: &str) -> Option<Self> {
        let json = line.strip_prefix(EVENT_PREFIX)?;
        serde_json::from_str(json).ok()
    }

    /// Emit this log event to stderr for supervisor parsing
    pub fn emit(&self) {
        if let Some(line) = self.to_line() {
            use std::io::Write;
            eprintln!("{}", line);
            let _ = std::io::stderr().flush();
        }
    }
}

/// Helper macros for workflow logging
#[macro_export]
macro_rules! log_phase_start {
    ($phase:expr, $name:expr, $total:expr) => {
        $crate::WorkflowLog::PhaseStarted {
            phase: $phase,
            name: $name.to_string(),
            total_phases: $total,
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_phase_complete {
    ($phase:expr, $name:expr) => {
        $crate::WorkflowLog::PhaseCompleted {
            phase: $phase,
            name: $name.to_string(),
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_phase_failed {
    ($phase:expr, $name:expr, $error:expr) => {
        $crate::WorkflowLog::PhaseFailed {
            phase: $phase,
            name: $name.to_string(),
            error: $error.to_string(),
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_task_start {
    ($phase:expr, $task_id:expr, $desc:expr) => {
        $crate::WorkflowLog::TaskStarted {
            phase: $phase,
            task_id: $task_id.to_string(),
            description: $desc.to_string(),
            total_tasks: None,
        }
        .emit();
    };
    ($phase:expr, $task_id:expr, $desc:expr, $total:expr) => {
        $crate::WorkflowLog::TaskStarted {
            phase: $phase,
            task_id: $task_id.to_string(),
            description: $desc.to_string(),
            total_tasks: Some($total),
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_task_progress {
    ($task_id:expr, $current:expr, $total:expr, $msg:expr) => {
        $crate::WorkflowLog::TaskProgress {
            task_id: $task_id.to_string(),
            current: $current,
            total: $total,
            message: $msg.to_string(),
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_task_complete {
    ($task_id:expr) => {
        $crate::WorkflowLog::TaskCompleted {
            task_id: $task_id.to_string(),
            result: None,
        }
        .emit();
    };
    ($task_id:expr, $result:expr) => {
        $crate::WorkflowLog::TaskCompleted {
            task_id: $task_id.to_string(),
            result: Some($result.to_string()),
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_task_failed {
    ($task_id:expr, $error:expr) => {
        $crate::WorkflowLog::TaskFailed {
            task_id: $task_id.to_string(),
            error: $error.to_string(),
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_record_persisted {
    ($kind:expr, $uuid:expr) => {
        $crate::WorkflowLog::RecordPersisted {
            kind: $kind,
            uuid: $uuid.to_string(),
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_persist_failed {
    ($kind:expr, $uuid:expr, $error:expr) => {
        $crate::WorkflowLog::PersistFailed {
            kind: $kind,
            uuid: $uuid.to_string(),
            error: $error.to_string(),
        }
        .emit();
    };
}

// ============================================================================
// Console Logging Macros
// ============================================================================
// Colored console output for human-readable logs, complementing the
// structured WorkflowLog events above.
// ============================================================================

/// Logs the start of a pipeline phase with a header and description.
///
/// # Example
/// ```
/// use backlog_planner_sdk::log_phase_start_console;
/// log_phase_start_console!(1, "Issue Generation", "Split the spec into issues");
/// ```
///
/// Outputs:
/// ```text
/// ═══ PHASE 1: Issue Generation ═══
/// Split the spec into issues
/// ```
#[macro_export]
macro_rules! log_phase_start_console {
    ($phase:expr, $title:expr, $description:expr) => {
        println!("\x1b[1;36m═══ PHASE {}: {} ═══\x1b[0m", $phase, $title);
        println!("\x1b[36m{}\x1b[0m", $description);
    };
}

/// Logs the completion of a pipeline phase.
#[macro_export]
macro_rules! log_phase_complete_console {
    ($phase:expr) => {
        println!("\x1b[32m✓ Phase {} complete\x1b[0m", $phase);
    };
}

/// Logs progress of an operation.
///
/// Outputs:
/// ```text
/// Progress: 3/5 issues
/// ```
#[macro_export]
macro_rules! log_progress {
    ($current:expr, $total:expr, $item_type:expr) => {
        println!(
            "\x1b[36mProgress: {}/{} {}\x1b[0m",
            $current, $total, $item_type
        );
    };
}

/// Logs the number of items found.
#[macro_export]
macro_rules! log_found {
    ($count:expr, $item_type:expr) => {
        println!("\x1b[36mFound {} {}\x1b[0m", $count, $item_type);
    };
}

/// Logs a labelled value.
///
/// # Example
/// ```
/// use backlog_planner_sdk::log_key_value;
/// log_key_value!("Tasks created", 4);
/// ```
///
/// Outputs:
/// ```text
/// Tasks created: 4
/// ```
#[macro_export]
macro_rules! log_key_value {
    ($key:expr, $value:expr) => {
        println!("\x1b[1m{}:\x1b[0m {}", $key, $value);
    };
}

/// Logs a validation summary with approval counts.
///
/// Outputs:
/// ```text
/// Validation: ✓ 8 approved, ✗ 2 need revision (10 total)
/// ```
#[macro_export]
macro_rules! log_review_summary {
    ($approved:expr, $needs_revision:expr, $total:expr) => {
        println!(
            "\x1b[1mValidation: \x1b[32m✓ {} approved\x1b[0m, \x1b[31m✗ {} need revision\x1b[0m ({} total)",
            $approved, $needs_revision, $total
        );
    };
}

/// Logs a rejected task with its title.
#[macro_export]
macro_rules! log_review_issue {
    ($task_id:expr, $issue_text:expr) => {
        println!("\x1b[31m  ✗ Task {}: {}\x1b[0m", $task_id, $issue_text);
    };
}

/// Logs an informational message.
///
/// # Example
/// ```
/// use backlog_planner_sdk::log_info;
/// log_info!("Cloning repository...");
/// let count = 3;
/// log_info!("Generated {} issues", count);
/// ```
#[macro_export]
macro_rules! log_info {
    ($message:expr) => {
        println!("\x1b[36mℹ {}\x1b[0m", $message);
    };
    ($fmt:expr, $($arg:tt)*) => {
        println!("\x1b[36mℹ {}\x1b[0m", format!($fmt, $($arg)*));
    };
}

/// Logs a warning message.
#[macro_export]
macro_rules! log_warning {
    ($message:expr) => {
        println!("\x1b[33m⚠ Warning: {}\x1b[0m", $message);
    };
    ($fmt:expr, $($arg:tt)*) => {
        println!("\x1b[33m⚠ Warning: {}\x1b[0m", format!($fmt, $($arg)*));
    };
}

/// Logs an error together with the operation it interrupted.
///
/// # Example
/// ```
/// use backlog_planner_sdk::log_error;
/// let err = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
/// log_error!(err, "Failed to insert task");
/// ```
///
/// Outputs (stderr):
/// ```text
/// ✗ Failed to insert task: disk full
/// ```
#[macro_export]
macro_rules! log_error {
    ($error:expr, $context:expr) => {
        eprintln!("\x1b[31m✗ {}: {}\x1b[0m", $context, $error);
    };
}

/// Logs a debug message (intended to be used conditionally).
#[macro_export]
macro_rules! log_debug {
    ($message:expr) => {
        println!("\x1b[2m[DEBUG] {}\x1b[0m", $message);
    };
    ($fmt:expr, $($arg:tt)*) => {
        println!("\x1b[2m[DEBUG] {}\x1b[0m", format!($fmt, $($arg)*));
    };
}
