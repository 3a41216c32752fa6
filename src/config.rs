//! Configuration loading and validation.
//!
//! Configuration is merged from three layers, lowest priority first:
//! built-in defaults, `~/.devflow/config.toml`, then
//! `<project>/.devflow/config.toml`. Tracker credentials and status names
//! can additionally be overridden through environment variables so secrets
//! never need to live in a checked-in file.

use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DevflowError, Result};

/// Directory (relative to the project root) holding all devflow state.
pub const STATE_DIR: &str = ".devflow";

/// Config file name inside the state directory.
const CONFIG_FILE: &str = "config.toml";

/// Issue tracker connection and workflow-status configuration.
///
/// Status names are opaque configured strings; the engine never hardcodes
/// a tracker workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Base URL of the Jira server, e.g. `https://example.atlassian.net`
    pub server: String,
    /// Account email for basic auth
    pub email: String,
    /// API token for basic auth
    pub api_token: String,
    /// Status the task starts in
    pub status_todo: String,
    /// Status set when the branch is created
    pub status_in_progress: String,
    /// Status set when the PR is opened
    pub status_in_review: String,
    /// Status for finished work
    pub status_done: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            server: String::new(),
            email: String::new(),
            api_token: String::new(),
            status_todo: "To Do".to_string(),
            status_in_progress: "In Progress".to_string(),
            status_in_review: "In Review".to_string(),
            status_done: "Done".to_string(),
        }
    }
}

impl TrackerConfig {
    /// Check that the credentials needed for live tracker calls are present.
    pub fn has_credentials(&self) -> bool {
        !self.server.is_empty() && !self.email.is_empty() && !self.api_token.is_empty()
    }
}

/// Git and repository host configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    /// Prefix for derived branch names (`<prefix>/<task-key>`)
    pub branch_prefix: String,
    /// Remote name used for push
    pub remote: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            branch_prefix: "feature".to_string(),
            remote: "origin".to_string(),
        }
    }
}

/// Review triage and auto-fix configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Risk threshold between auto-fixable and simple: a suggestion block
    /// with more replacement lines than this is demoted to a manual fix.
    pub auto_fix_max_lines: usize,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            auto_fix_max_lines: 1,
        }
    }
}

/// Top-level devflow configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tracker: TrackerConfig,
    pub git: GitConfig,
    pub review: ReviewConfig,
}

/// One config file's contents. Sections absent from the file parse as
/// `None` so lower layers survive the merge.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigLayer {
    tracker: Option<TrackerConfig>,
    git: Option<GitConfig>,
    review: Option<ReviewConfig>,
}

impl Config {
    /// Load configuration for a project directory.
    ///
    /// Merge order: defaults, then `~/.devflow/config.toml`, then
    /// `<project>/.devflow/config.toml`, then environment overrides.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a config file exists but cannot be
    /// read or parsed. A missing file is not an error.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let mut config = Self::default();

        if let Some(home) = dirs::home_dir() {
            config.merge_file(&home.join(STATE_DIR).join(CONFIG_FILE))?;
        }
        config.merge_file(&project_dir.join(STATE_DIR).join(CONFIG_FILE))?;
        config.apply_env_overrides();

        Ok(config)
    }

    /// Paths that `load` consults, for `devflow config paths`.
    pub fn candidate_paths(project_dir: &Path) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(STATE_DIR).join(CONFIG_FILE));
        }
        paths.push(project_dir.join(STATE_DIR).join(CONFIG_FILE));
        paths
    }

    fn merge_file(&mut self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }
        let raw = std::fs::read_to_string(path).map_err(|e| {
            DevflowError::config_with_path(format!("cannot read config: {e}"), path.to_path_buf())
        })?;
        let layer: ConfigLayer = toml::from_str(&raw).map_err(|e| {
            DevflowError::config_with_path(format!("invalid config: {e}"), path.to_path_buf())
        })?;
        // A layer overrides only the sections it actually defines; sections
        // it omits keep whatever the lower layers set.
        if let Some(tracker) = layer.tracker {
            self.tracker = tracker;
        }
        if let Some(git) = layer.git {
            self.git = git;
        }
        if let Some(review) = layer.review {
            self.review = review;
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = env::var("JIRA_SERVER") {
            self.tracker.server = v;
        }
        if let Ok(v) = env::var("JIRA_EMAIL") {
            self.tracker.email = v;
        }
        if let Ok(v) = env::var("JIRA_API_TOKEN") {
            self.tracker.api_token = v;
        }
        if let Ok(v) = env::var("JIRA_STATUS_TODO") {
            self.tracker.status_todo = v;
        }
        if let Ok(v) = env::var("JIRA_STATUS_IN_PROGRESS") {
            self.tracker.status_in_progress = v;
        }
        if let Ok(v) = env::var("JIRA_STATUS_IN_REVIEW") {
            self.tracker.status_in_review = v;
        }
        if let Ok(v) = env::var("JIRA_STATUS_DONE") {
            self.tracker.status_done = v;
        }
    }

    /// Derive the deterministic branch name for a task key.
    ///
    /// The same key always yields the same name, so resume and duplicate
    /// invocation detection stay reliable. Non-alphanumeric characters are
    /// mapped to `-`.
    pub fn branch_for_key(&self, key: &str) -> String {
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
            .collect();
        format!("{}/{}", self.git.branch_prefix, safe)
    }

    /// Directory holding generated context artifacts for a task.
    pub fn context_dir(&self, project_dir: &Path, key: &str) -> PathBuf {
        project_dir.join(STATE_DIR).join("context").join(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.tracker.status_todo, "To Do");
        assert_eq!(config.tracker.status_in_review, "In Review");
        assert_eq!(config.git.branch_prefix, "feature");
        assert_eq!(config.review.auto_fix_max_lines, 1);
        assert!(!config.tracker.has_credentials());
    }

    #[test]
    fn test_branch_for_key_is_deterministic_and_sanitized() {
        let config = Config::default();
        assert_eq!(config.branch_for_key("PBI-123"), "feature/PBI-123");
        assert_eq!(config.branch_for_key("PBI-123"), config.branch_for_key("PBI-123"));
        assert_eq!(config.branch_for_key("A B/c"), "feature/A-B-c");
    }

    #[test]
    fn test_parse_partial_toml_keeps_defaults() {
        let layer: Config = toml::from_str(
            r#"
            [git]
            branch_prefix = "task"

            [review]
            auto_fix_max_lines = 3
            "#,
        )
        .unwrap();
        assert_eq!(layer.git.branch_prefix, "task");
        assert_eq!(layer.git.remote, "origin");
        assert_eq!(layer.review.auto_fix_max_lines, 3);
        assert_eq!(layer.tracker.status_todo, "To Do");
    }

    #[test]
    fn test_layered_merge_keeps_sections_from_lower_layers() {
        let temp = tempfile::TempDir::new().unwrap();
        let home_file = temp.path().join("home.toml");
        let project_file = temp.path().join("project.toml");
        std::fs::write(
            &home_file,
            r#"
            [tracker]
            server = "https://jira.example.com"
            email = "dev@example.com"
            api_token = "token"
            "#,
        )
        .unwrap();
        std::fs::write(&project_file, "[git]\nbranch_prefix = \"task\"\n").unwrap();

        let mut config = Config::default();
        config.merge_file(&home_file).unwrap();
        config.merge_file(&project_file).unwrap();

        // The project layer defines only [git]; the home-layer credentials
        // must survive.
        assert!(config.tracker.has_credentials());
        assert_eq!(config.tracker.server, "https://jira.example.com");
        assert_eq!(config.git.branch_prefix, "task");
        assert_eq!(config.review.auto_fix_max_lines, 1);
    }

    #[test]
    fn test_load_reports_invalid_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let dir = temp.path().join(STATE_DIR);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("config.toml"), "not [valid toml").unwrap();

        let err = Config::load(temp.path()).unwrap_err();
        assert_eq!(err.exit_code(), 7);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let temp = tempfile::TempDir::new().unwrap();
        let config = Config::load(temp.path()).unwrap();
        assert_eq!(config.git.remote, "origin");
    }
}
