//! Devflow - Development Workflow Automation
//!
//! Drives a development task from issue tracker to review remediation:
//! fetch the work item, prepare a branch and context artifacts, pause for
//! implementation, open the pull request, then triage and auto-fix review
//! feedback.
//!
//! # Architecture
//!
//! - [`workflow`] - forward-only phase state machine with idempotent resume
//! - [`todo`] - per-task subtask tracking with start/done/undo semantics
//! - [`review`] - review-comment triage and the auto-fix applier
//! - [`ports`] - capability traits for the tracker, host and assistant
//! - [`adapters`] - concrete adapters over `curl`, `git` and `gh`
//! - [`store`] - atomic JSON persistence under `.devflow/`
//! - [`config`] - layered configuration with environment overrides
//! - [`testing`] - in-memory port implementations for tests
//!
//! # Example
//!
//! ```rust,ignore
//! use devflow::{Config, Orchestrator, RunOptions};
//! use devflow::testing::{MockAssistant, MockHostClient, MockTrackerClient};
//!
//! let config = Config::load(project_dir)?;
//! let orchestrator = Orchestrator::new(&tracker, &host, &assistant, &config, project_dir);
//! let outcome = orchestrator.run("PBI-123", &RunOptions::default())?;
//! ```

pub mod adapters;
pub mod config;
pub mod context;
pub mod error;
pub mod ports;
pub mod review;
pub mod store;
pub mod testing;
pub mod todo;
pub mod workflow;

// Re-export commonly used types
pub use error::{DevflowError, Result, EXIT_PARTIAL};

pub use config::{Config, GitConfig, ReviewConfig, TrackerConfig, STATE_DIR};

pub use ports::{Assistant, HostClient, PullRequestInfo, RawComment, TaskData, TrackerClient};

pub use workflow::{Orchestrator, Phase, RunOptions, RunOutcome, TaskRecord};

pub use todo::{
    CommandSource, ScriptedSource, StdinSource, TodoCommand, TodoItem, TodoList, TodoSession,
    TodoStatus,
};

pub use review::{
    Classification, FixOptions, FixOutcome, FixReport, Fixer, TriageEngine, TriageReport,
};

pub use store::StateStore;
