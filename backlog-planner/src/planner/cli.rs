//! CLI argument definitions for the backlog planner.

use anyhow::Result;
use clap::Parser;

/// Backlog planner
///
/// Turns a feature specification into a persisted backlog for a repository:
///
/// - Phase 1: Split the specification into ordered issues
/// - Phases 2-5: Decompose, validate, regenerate and link each issue's tasks
/// - Phase 6: Write one system prompt for the whole backlog
#[derive(Parser, Debug, Clone)]
#[command(name = "backlog-planner")]
#[command(about = "Plan a validated task backlog from a feature specification")]
#[command(version)]
pub struct Args {
    /// Repository to plan against, e.g. https://github.com/owner/repo
    #[arg(long, value_name = "URL")]
    pub source_url: String,

    /// Fork that will receive the work
    #[arg(long, value_name = "URL")]
    pub fork_url: String,

    /// Feature specification text
    #[arg(long, value_name = "TEXT")]
    pub issue_spec: Option<String>,

    /// Read the feature specification from a file
    #[arg(long, value_name = "PATH")]
    pub issue_spec_file: Option<String>,

    /// Bounty identifier attached to every record
    #[arg(long, value_name = "ID")]
    pub bounty_id: String,

    /// SQLite database path
    ///
    /// Defaults to ~/.backlog-planner/backlog.db
    #[arg(long, value_name = "PATH")]
    pub db: Option<String>,

    /// Directory for temporary repository checkouts
    #[arg(long, value_name = "DIR")]
    pub work_dir: Option<String>,

    /// Model used for every phase
    #[arg(long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Maximum tokens per reply
    #[arg(long, value_name = "N")]
    pub max_tokens: Option<u32>,

    /// Write the final report as JSON to this path
    #[arg(long, value_name = "PATH")]
    pub report: Option<String>,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,
}

impl Args {
    /// Exactly one of `--issue-spec` and `--issue-spec-file` must be given
    pub fn validate(&self) -> Result<()> {
        match (&self.issue_spec, &self.issue_spec_file) {
            (Some(_), Some(_)) => {
                anyhow::bail!("Use either --issue-spec or --issue-spec-file, not both")
            }
            (None, None) => anyhow::bail!("One of --issue-spec or --issue-spec-file is required"),
            (Some(spec), None) if spec.trim().is_empty() => {
                anyhow::bail!("--issue-spec must not be empty")
            }
            _ => Ok(()),
        }
    }
}
