//! Mock implementations of the port traits.
//!
//! Builder-style test doubles with controllable responses and recorded
//! calls, enabling deterministic unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{DevflowError, Result};
use crate::ports::{Assistant, HostClient, PullRequestInfo, RawComment, TaskData, TrackerClient};

/// Mock issue tracker.
///
/// Serves tasks registered with [`with_task`](Self::with_task) and records
/// every status update.
#[derive(Debug, Default)]
pub struct MockTrackerClient {
    tasks: HashMap<String, TaskData>,
    fetch_error: Option<String>,
    transition_available: Option<bool>,
    status_updates: Mutex<Vec<(String, String)>>,
}

impl MockTrackerClient {
    #[must_use]
    pub fn new() -> Self {
        Self {
            transition_available: Some(true),
            ..Self::default()
        }
    }

    /// Register a task the mock will serve.
    #[must_use]
    pub fn with_task(mut self, task: TaskData) -> Self {
        self.tasks.insert(task.key.clone(), task);
        self
    }

    /// Make every fetch fail with an external service error.
    #[must_use]
    pub fn with_fetch_error(mut self, message: &str) -> Self {
        self.fetch_error = Some(message.to_string());
        self
    }

    /// Make status transitions report as unavailable in the workflow.
    #[must_use]
    pub fn with_unavailable_transition(mut self) -> Self {
        self.transition_available = Some(false);
        self
    }

    /// Status updates recorded so far, as `(key, status)` pairs.
    pub fn status_updates(&self) -> Vec<(String, String)> {
        self.status_updates
            .lock()
            .map(|g| g.clone())
            .unwrap_or_default()
    }
}

impl TrackerClient for MockTrackerClient {
    fn fetch_task(&self, key: &str) -> Result<TaskData> {
        if let Some(message) = &self.fetch_error {
            return Err(DevflowError::external("jira", format!("fetch {key}"), message));
        }
        self.tasks
            .get(key)
            .cloned()
            .ok_or_else(|| DevflowError::task_not_found(key))
    }

    fn update_status(&self, key: &str, status: &str) -> Result<bool> {
        if let Ok(mut guard) = self.status_updates.lock() {
            guard.push((key.to_string(), status.to_string()));
        }
        Ok(self.transition_available.unwrap_or(true))
    }
}

/// Mock repository host.
///
/// Tracks branches, commits, pushes, pull requests and replies in memory.
#[derive(Debug)]
pub struct MockHostClient {
    default_branch: String,
    commit_hash: String,
    current_branch: Mutex<String>,
    branches: Mutex<Vec<String>>,
    dirty: Mutex<bool>,
    commits: Mutex<Vec<String>>,
    pushes: Mutex<Vec<String>>,
    prs: Mutex<Vec<PullRequestInfo>>,
    next_pr_number: Mutex<u64>,
    comments: HashMap<u64, Vec<RawComment>>,
    replies: Mutex<Vec<(u64, u64, String)>>,
}

impl Default for MockHostClient {
    fn default() -> Self {
        Self {
            default_branch: "main".to_string(),
            commit_hash: "abc1234".to_string(),
            current_branch: Mutex::new("main".to_string()),
            branches: Mutex::new(vec!["main".to_string()]),
            dirty: Mutex::new(false),
            commits: Mutex::new(Vec::new()),
            pushes: Mutex::new(Vec::new()),
            prs: Mutex::new(Vec::new()),
            next_pr_number: Mutex::new(1),
            comments: HashMap::new(),
            replies: Mutex::new(Vec::new()),
        }
    }
}

impl MockHostClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the checked-out branch.
    #[must_use]
    pub fn with_branch(self, branch: &str) -> Self {
        if let Ok(mut guard) = self.current_branch.lock() {
            *guard = branch.to_string();
        }
        if let Ok(mut guard) = self.branches.lock() {
            if !guard.iter().any(|b| b == branch) {
                guard.push(branch.to_string());
            }
        }
        self
    }

    /// Pre-create a branch (without checking it out).
    #[must_use]
    pub fn with_existing_branch(self, branch: &str) -> Self {
        if let Ok(mut guard) = self.branches.lock() {
            guard.push(branch.to_string());
        }
        self
    }

    /// Mark the working tree dirty.
    #[must_use]
    pub fn with_uncommitted_changes(self) -> Self {
        self.mark_dirty();
        self
    }

    /// Dirty the working tree mid-scenario, as if edits happened.
    pub fn mark_dirty(&self) {
        if let Ok(mut guard) = self.dirty.lock() {
            *guard = true;
        }
    }

    /// Set the short hash returned by commits.
    #[must_use]
    pub fn with_commit_hash(mut self, hash: &str) -> Self {
        self.commit_hash = hash.to_string();
        self
    }

    /// Pre-register an open pull request.
    #[must_use]
    pub fn with_open_pr(self, pr: PullRequestInfo) -> Self {
        if let Ok(mut next) = self.next_pr_number.lock() {
            *next = (*next).max(pr.number + 1);
        }
        if let Ok(mut guard) = self.prs.lock() {
            guard.push(pr);
        }
        self
    }

    /// Serve these review comments for a PR number.
    #[must_use]
    pub fn with_comments(mut self, number: u64, comments: Vec<RawComment>) -> Self {
        self.comments.insert(number, comments);
        self
    }

    pub fn commits(&self) -> Vec<String> {
        self.commits.lock().map(|g| g.clone()).unwrap_or_default()
    }

    pub fn pushes(&self) -> Vec<String> {
        self.pushes.lock().map(|g| g.clone()).unwrap_or_default()
    }

    pub fn open_prs(&self) -> Vec<PullRequestInfo> {
        self.prs.lock().map(|g| g.clone()).unwrap_or_default()
    }

    /// Replies recorded so far, as `(pr, comment_id, body)` triples.
    pub fn replies(&self) -> Vec<(u64, u64, String)> {
        self.replies.lock().map(|g| g.clone()).unwrap_or_default()
    }

    fn lock_err(what: &str) -> DevflowError {
        DevflowError::external("mock", what, "poisoned lock")
    }
}

impl HostClient for MockHostClient {
    fn current_branch(&self) -> Result<String> {
        Ok(self
            .current_branch
            .lock()
            .map_err(|_| Self::lock_err("current_branch"))?
            .clone())
    }

    fn default_branch(&self) -> Result<String> {
        Ok(self.default_branch.clone())
    }

    fn branch_exists(&self, name: &str) -> Result<bool> {
        Ok(self
            .branches
            .lock()
            .map_err(|_| Self::lock_err("branch_exists"))?
            .iter()
            .any(|b| b == name))
    }

    fn create_branch(&self, name: &str) -> Result<()> {
        self.branches
            .lock()
            .map_err(|_| Self::lock_err("create_branch"))?
            .push(name.to_string());
        *self
            .current_branch
            .lock()
            .map_err(|_| Self::lock_err("create_branch"))? = name.to_string();
        Ok(())
    }

    fn checkout_branch(&self, name: &str) -> Result<()> {
        if !self.branch_exists(name)? {
            return Err(DevflowError::external(
                "git",
                "checkout",
                format!("no such branch: {name}"),
            ));
        }
        *self
            .current_branch
            .lock()
            .map_err(|_| Self::lock_err("checkout_branch"))? = name.to_string();
        Ok(())
    }

    fn has_uncommitted_changes(&self) -> Result<bool> {
        Ok(*self.dirty.lock().map_err(|_| Self::lock_err("status"))?)
    }

    fn commit_all(&self, message: &str) -> Result<String> {
        self.commits
            .lock()
            .map_err(|_| Self::lock_err("commit"))?
            .push(message.to_string());
        *self.dirty.lock().map_err(|_| Self::lock_err("commit"))? = false;
        Ok(self.commit_hash.clone())
    }

    fn push(&self, branch: &str) -> Result<()> {
        self.pushes
            .lock()
            .map_err(|_| Self::lock_err("push"))?
            .push(branch.to_string());
        Ok(())
    }

    fn create_pr(&self, branch: &str, title: &str, _body: &str, _draft: bool) -> Result<String> {
        let mut next = self
            .next_pr_number
            .lock()
            .map_err(|_| Self::lock_err("create_pr"))?;
        let number = *next;
        *next += 1;
        let url = format!("https://example.test/pull/{number}");
        self.prs
            .lock()
            .map_err(|_| Self::lock_err("create_pr"))?
            .push(PullRequestInfo {
                number,
                title: title.to_string(),
                url: url.clone(),
                head_branch: branch.to_string(),
            });
        Ok(url)
    }

    fn find_open_pr(&self, branch: &str) -> Result<Option<PullRequestInfo>> {
        Ok(self
            .prs
            .lock()
            .map_err(|_| Self::lock_err("find_open_pr"))?
            .iter()
            .find(|pr| pr.head_branch == branch)
            .cloned())
    }

    fn find_pr_by_number(&self, number: u64) -> Result<Option<PullRequestInfo>> {
        Ok(self
            .prs
            .lock()
            .map_err(|_| Self::lock_err("find_pr_by_number"))?
            .iter()
            .find(|pr| pr.number == number)
            .cloned())
    }

    fn list_comments(&self, number: u64) -> Result<Vec<RawComment>> {
        Ok(self.comments.get(&number).cloned().unwrap_or_default())
    }

    fn reply_to_comment(&self, number: u64, comment_id: u64, body: &str) -> Result<()> {
        self.replies
            .lock()
            .map_err(|_| Self::lock_err("reply"))?
            .push((number, comment_id, body.to_string()));
        Ok(())
    }
}

/// Mock assistant that records launch prompts.
#[derive(Debug, Default)]
pub struct MockAssistant {
    error: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl MockAssistant {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make launches fail with a spawn error.
    #[must_use]
    pub fn with_error(mut self, message: &str) -> Self {
        self.error = Some(message.to_string());
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|g| g.clone()).unwrap_or_default()
    }
}

impl Assistant for MockAssistant {
    fn launch(&self, prompt: &str) -> Result<()> {
        if let Some(message) = &self.error {
            return Err(DevflowError::external("assistant", "launch", message));
        }
        if let Ok(mut guard) = self.prompts.lock() {
            guard.push(prompt.to_string());
        }
        Ok(())
    }
}
