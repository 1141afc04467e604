//! SQLite persistence for planned backlogs
//!
//! The pipeline only knows the [`PersistenceSink`] insert contract; [`Database`]
//! is the SQLite implementation used by the binary.
//!
//! # Database Schema
//!
//! 1. **issues** - Generated issues with their repository scope and chain link
//! 2. **tasks** - Approved tasks (criteria joined by newlines, dependencies as a JSON array)
//! 3. **system_prompts** - One aggregate prompt per run
//! 4. **schema_version** - Database schema version for migrations
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use backlog_planner::database::{Database, PersistenceSink};
//! use backlog_planner::planner::types::SystemPrompt;
//!
//! # fn main() -> anyhow::Result<()> {
//! let db_path = dirs::home_dir()
//!     .unwrap()
//!     .join(".backlog-planner")
//!     .join("backlog.db");
//! let db = Database::new(db_path)?;
//! db.initialize_schema()?;
//!
//! db.insert_system_prompt(&SystemPrompt {
//!     prompt: "You are implementing telemetry export.".to_string(),
//!     bounty_id: "bounty-42".to_string(),
//! })?;
//!
//! let prompt = db.get_system_prompt("bounty-42")?;
//! # Ok(())
//! # }
//! ```
//!
//! Every insert is a single statement. There is no transaction spanning
//! several records, so a failed insert leaves earlier ones in place.

use anyhow::{anyhow, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::planner::types::{IssueRecord, SystemPromptRecord, TaskRecord};

/// Receives finalized records from the pipeline
///
/// Errors are reported back to the caller, which logs them and moves on.
pub trait PersistenceSink: Send + Sync {
    fn insert_issue(&self, issue: &IssueRecord) -> Result<()>;

    fn insert_task(&self, task: &TaskRecord) -> Result<()>;

    fn insert_system_prompt(&self, prompt: &SystemPromptRecord) -> Result<()>;
}

/// Database wrapper for backlog persistence
///
/// The connection sits behind a mutex so one database can serve several
/// pipeline runs at once.
pub struct Database {
    conn: Mutex<Connection>,
}

/// Row counts across all tables
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BacklogStats {
    pub issues: usize,
    pub tasks: usize,
    pub system_prompts: usize,
}

impl Database {
    /// Create a new database connection at the specified path
    pub fn new(path: PathBuf) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent access
        conn.pragma_update(None, "journal_mode", "WAL")?;

        // Enable foreign key constraints
        conn.pragma_update(None, "foreign_keys", "ON")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database connection lock poisoned"))
    }

    /// Initialize database schema with all tables and indexes
    pub fn initialize_schema(&self) -> Result<()> {
        let conn = self.conn()?;

        // Create issues table
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS issues (
                uuid TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT NOT NULL,

                -- Repository scope
                repo_owner TEXT NOT NULL,
                repo_name TEXT NOT NULL,
                fork_owner TEXT NOT NULL,
                fork_url TEXT NOT NULL,
                bounty_id TEXT NOT NULL,

                -- Chain link; NULL for the first issue of a run
                predecessor_uuid TEXT,

                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_issues_bounty_id ON issues(bounty_id);
            "#,
        )?;

        // Create tasks table
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                uuid TEXT PRIMARY KEY,
                issue_uuid TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                acceptance_criteria TEXT NOT NULL,
                dependency_tasks TEXT NOT NULL,
                repo_owner TEXT NOT NULL,
                repo_name TEXT NOT NULL,
                bounty_id TEXT NOT NULL,
                created_at TEXT NOT NULL,

                FOREIGN KEY(issue_uuid) REFERENCES issues(uuid) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_issue_uuid ON tasks(issue_uuid);
            "#,
        )?;

        // Create system_prompts table
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS system_prompts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                bounty_id TEXT NOT NULL,
                prompt TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_system_prompts_bounty_id ON system_prompts(bounty_id);
            "#,
        )?;

        // Create schema_version table
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            "#,
        )?;

        conn.execute(
            "INSERT OR IGNORE INTO schema_version (version) VALUES (1)",
            [],
        )?;

        Ok(())
    }

    /// Get current schema version
    pub fn get_schema_version(&self) -> Result<i32> {
        let version: i32 =
            self.conn()?
                .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
                    row.get(0)
                })?;
        Ok(version)
    }

    /// Issues of a bounty in insertion order
    pub fn list_issues_for_bounty(&self, bounty_id: &str) -> Result<Vec<IssueRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT uuid, title, description, repo_owner, repo_name, bounty_id,
                   fork_owner, fork_url, predecessor_uuid
            FROM issues
            WHERE bounty_id = ?1
            ORDER BY rowid
            "#,
        )?;

        let issues = stmt
            .query_map(params![bounty_id], map_issue_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(issues)
    }

    /// Tasks of an issue in insertion order
    pub fn list_tasks_for_issue(&self, issue_uuid: &Uuid) -> Result<Vec<TaskRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT uuid, title, description, acceptance_criteria, repo_owner, repo_name,
                   dependency_tasks, issue_uuid, bounty_id
            FROM tasks
            WHERE issue_uuid = ?1
            ORDER BY rowid
            "#,
        )?;

        let tasks = stmt
            .query_map(params![issue_uuid.to_string()], map_task_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tasks)
    }

    /// Most recent system prompt stored for a bounty
    pub fn get_system_prompt(&self, bounty_id: &str) -> Result<Option<SystemPromptRecord>> {
        let prompt = self
            .conn()?
            .query_row(
                "SELECT prompt, bounty_id FROM system_prompts WHERE bounty_id = ?1 ORDER BY id DESC LIMIT 1",
                params![bounty_id],
                |row| {
                    Ok(SystemPromptRecord {
                        prompt: row.get(0)?,
                        bounty_id: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(prompt)
    }

    /// Count rows in every backlog table
    pub fn get_stats(&self) -> Result<BacklogStats> {
        let conn = self.conn()?;
        let count = |table: &str| -> Result<usize> {
            let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                row.get(0)
            })?;
            Ok(n as usize)
        };

        Ok(BacklogStats {
            issues: count("issues")?,
            tasks: count("tasks")?,
            system_prompts: count("system_prompts")?,
        })
    }
}

impl PersistenceSink for Database {
    fn insert_issue(&self, issue: &IssueRecord) -> Result<()> {
        self.conn()?.execute(
            r#"
            INSERT INTO issues (
                uuid, title, description, repo_owner, repo_name, fork_owner,
                fork_url, bounty_id, predecessor_uuid, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                issue.uuid.to_string(),
                issue.title,
                issue.description,
                issue.repo_owner,
                issue.repo_name,
                issue.fork_owner,
                issue.fork_url,
                issue.bounty_id,
                issue.predecessor_uuid.map(|u| u.to_string()),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn insert_task(&self, task: &TaskRecord) -> Result<()> {
        let dependencies = serde_json::to_string(&task.dependency_tasks)?;

        self.conn()?.execute(
            r#"
            INSERT INTO tasks (
                uuid, issue_uuid, title, description, acceptance_criteria,
                dependency_tasks, repo_owner, repo_name, bounty_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                task.uuid.to_string(),
                task.issue_uuid.to_string(),
                task.title,
                task.description,
                task.acceptance_criteria,
                dependencies,
                task.repo_owner,
                task.repo_name,
                task.bounty_id,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn insert_system_prompt(&self, prompt: &SystemPromptRecord) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO system_prompts (bounty_id, prompt, created_at) VALUES (?1, ?2, ?3)",
            params![prompt.bounty_id, prompt.prompt, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

// ============================================================================
// Row mapping
// ============================================================================

fn parse_uuid(index: usize, value: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Map a database row to IssueRecord
fn map_issue_row(row: &Row) -> rusqlite::Result<IssueRecord> {
    let uuid_str: String = row.get(0)?;
    let predecessor_str: Option<String> = row.get(8)?;

    Ok(IssueRecord {
        uuid: parse_uuid(0, &uuid_str)?,
        title: row.get(1)?,
        description: row.get(2)?,
        repo_owner: row.get(3)?,
        repo_name: row.get(4)?,
        bounty_id: row.get(5)?,
        fork_owner: row.get(6)?,
        fork_url: row.get(7)?,
        predecessor_uuid: predecessor_str
            .map(|s| parse_uuid(8, &s))
            .transpose()?,
    })
}

/// Map a database row to TaskRecord
fn map_task_row(row: &Row) -> rusqlite::Result<TaskRecord> {
    let uuid_str: String = row.get(0)?;
    let dependencies_str: String = row.get(6)?;
    let issue_uuid_str: String = row.get(7)?;

    let dependency_tasks: Vec<Uuid> = serde_json::from_str(&dependencies_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(TaskRecord {
        uuid: parse_uuid(0, &uuid_str)?,
        title: row.get(1)?,
        description: row.get(2)?,
        acceptance_criteria: row.get(3)?,
        repo_owner: row.get(4)?,
        repo_name: row.get(5)?,
        dependency_tasks,
        issue_uuid: parse_uuid(7, &issue_uuid_str)?,
        bounty_id: row.get(8)?,
    })
}
