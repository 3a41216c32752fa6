//! Capability traits for external collaborators.
//!
//! The core depends on these narrow seams instead of concrete tools, so the
//! orchestrator, triage engine and fixer can be unit-tested against the
//! in-memory implementations in [`crate::testing`]. Concrete adapters over
//! `curl`, `git` and `gh` subprocesses live in [`crate::adapters`].

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Issue fields fetched from the tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskData {
    pub key: String,
    pub summary: String,
    pub description: String,
    pub acceptance_criteria: Vec<String>,
    pub issue_type: String,
    pub priority: String,
    pub url: String,
}

impl TaskData {
    /// Synthesize a local task record when tracker calls are skipped.
    pub fn synthetic(key: &str) -> Self {
        Self {
            key: key.to_string(),
            summary: format!("Local task {key}"),
            description: String::new(),
            acceptance_criteria: Vec::new(),
            issue_type: "Story".to_string(),
            priority: "Medium".to_string(),
            url: String::new(),
        }
    }
}

/// Issue tracker client (Jira or compatible).
///
/// Status names are passed through as opaque configured strings.
pub trait TrackerClient {
    /// Fetch issue fields for a task key.
    ///
    /// # Errors
    ///
    /// `TaskNotFound` if the key does not resolve; `ExternalService` on
    /// auth/network failures.
    fn fetch_task(&self, key: &str) -> Result<TaskData>;

    /// Transition the issue to the named status.
    ///
    /// Returns `false` when the transition is not available in the tracker
    /// workflow (reported, not fatal).
    ///
    /// # Errors
    ///
    /// `ExternalService` on auth/network failures.
    fn update_status(&self, key: &str, status: &str) -> Result<bool>;
}

/// An open pull request on the repository host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestInfo {
    pub number: u64,
    pub title: String,
    pub url: String,
    pub head_branch: String,
}

/// One raw review comment as fetched from the host, before normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawComment {
    pub id: u64,
    pub author: String,
    pub body: String,
    /// File path for inline comments; `None` for general PR comments.
    pub path: Option<String>,
    /// Anchored line for inline comments.
    pub line: Option<u64>,
    pub diff_hunk: Option<String>,
    /// Bodies of replies already posted in this comment's thread.
    pub replies: Vec<String>,
}

/// Repository host client (git plus the hosting service).
pub trait HostClient {
    /// Current checked-out branch.
    fn current_branch(&self) -> Result<String>;

    /// Default branch of the repository (base for new branches and PRs).
    fn default_branch(&self) -> Result<String>;

    /// Whether a local or remote branch with this name exists.
    fn branch_exists(&self, name: &str) -> Result<bool>;

    /// Create the branch off the default branch and check it out.
    fn create_branch(&self, name: &str) -> Result<()>;

    /// Check out an existing branch.
    fn checkout_branch(&self, name: &str) -> Result<()>;

    /// Whether the working tree has uncommitted changes.
    fn has_uncommitted_changes(&self) -> Result<bool>;

    /// Stage everything and commit; returns the short commit hash.
    fn commit_all(&self, message: &str) -> Result<String>;

    /// Push the branch to the configured remote.
    fn push(&self, branch: &str) -> Result<()>;

    /// Open a pull request; returns its URL.
    fn create_pr(&self, branch: &str, title: &str, body: &str, draft: bool) -> Result<String>;

    /// Find an open PR whose head is the given branch.
    fn find_open_pr(&self, branch: &str) -> Result<Option<PullRequestInfo>>;

    /// Look up an open PR by number.
    fn find_pr_by_number(&self, number: u64) -> Result<Option<PullRequestInfo>>;

    /// Fetch inline and general comments for a PR. Replies are folded into
    /// their parent comment.
    fn list_comments(&self, number: u64) -> Result<Vec<RawComment>>;

    /// Reply in an inline comment's thread.
    fn reply_to_comment(&self, number: u64, comment_id: u64, body: &str) -> Result<()>;
}

/// AI assistant invocation. Fire-and-forget: the core never awaits or
/// parses assistant output.
pub trait Assistant {
    /// Launch the assistant with the given prompt.
    ///
    /// # Errors
    ///
    /// `ExternalService` if the assistant binary cannot be spawned.
    fn launch(&self, prompt: &str) -> Result<()>;
}
