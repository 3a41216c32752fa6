//! Task lifecycle state machine.
//!
//! A task moves through a fixed sequence of phases, each recorded in the
//! persisted [`TaskRecord`] after its side effects complete. Re-running the
//! workflow resumes from the recorded phase instead of repeating completed
//! steps, which is what makes every command safe to invoke twice.

pub mod orchestrator;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DevflowError, Result};
use crate::ports::TaskData;
use crate::todo::TodoList;

pub use orchestrator::{Orchestrator, RunOptions, RunOutcome};

/// Milestones of the task workflow, in order. A record's phase is the last
/// milestone whose side effects are known to have completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Record created, nothing fetched yet
    New,
    /// Task data retrieved from the tracker (or synthesized)
    Fetched,
    /// Work branch created and checked out
    Branched,
    /// Context artifacts written, subtasks seeded
    ContextReady,
    /// Paused for implementation work
    AwaitingImplementation,
    /// Pull request opened
    PrCreated,
    /// Tracker moved to the in-review status
    StatusUpdated,
}

impl Phase {
    /// The phase that follows this one, if any.
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::New => Some(Phase::Fetched),
            Phase::Fetched => Some(Phase::Branched),
            Phase::Branched => Some(Phase::ContextReady),
            Phase::ContextReady => Some(Phase::AwaitingImplementation),
            Phase::AwaitingImplementation => Some(Phase::PrCreated),
            Phase::PrCreated => Some(Phase::StatusUpdated),
            Phase::StatusUpdated => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == Phase::StatusUpdated
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::New => "new",
            Phase::Fetched => "fetched",
            Phase::Branched => "branched",
            Phase::ContextReady => "context ready",
            Phase::AwaitingImplementation => "awaiting implementation",
            Phase::PrCreated => "pr created",
            Phase::StatusUpdated => "status updated",
        };
        write!(f, "{name}")
    }
}

/// Persisted per-task state, one JSON document per task key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub key: String,
    pub phase: Phase,
    /// Deterministic branch derived from the key; recorded so a later
    /// invocation can tell its own branch from an unrelated one.
    pub branch: String,
    pub task: TaskData,
    pub pr_number: Option<u64>,
    pub pr_url: Option<String>,
    /// Whether the last tracker transition was actually applied.
    pub tracker_updated: bool,
    pub todo: TodoList,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskRecord {
    pub fn new(task: TaskData, branch: String) -> Self {
        let now = Utc::now();
        Self {
            key: task.key.clone(),
            phase: Phase::New,
            branch,
            task,
            pr_number: None,
            pr_url: None,
            tracker_updated: false,
            todo: TodoList::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Seed the subtask list from the task's acceptance criteria.
    pub fn seed_subtasks(&mut self) {
        self.todo = TodoList::from_criteria(&self.task.acceptance_criteria);
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Advance to the next phase. Transitions are forward-only and
    /// single-step; anything else is an invariant violation.
    ///
    /// # Errors
    ///
    /// `InvalidPhase` when `to` is not the immediate successor.
    pub fn advance(&mut self, to: Phase) -> Result<()> {
        if self.phase.next() != Some(to) {
            return Err(DevflowError::InvalidPhase {
                key: self.key.clone(),
                from: self.phase.to_string(),
                to: to.to_string(),
            });
        }
        self.phase = to;
        self.touch();
        Ok(())
    }
}
