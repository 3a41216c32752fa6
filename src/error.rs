//! Custom error types for devflow.
//!
//! This module provides structured error types that enable better
//! error handling, reporting, and recovery throughout the workflow engine.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for devflow operations
#[derive(Error, Debug)]
pub enum DevflowError {
    // =========================================================================
    // Not-found errors
    // =========================================================================
    /// Task key could not be resolved by the issue tracker
    #[error("Task not found: {key}")]
    TaskNotFound { key: String },

    /// No persisted state exists for a task key
    #[error("No local state for task {key} - run `devflow run {key}` first")]
    TaskStateMissing { key: String },

    /// Subtask identifier does not exist or is not in the expected status
    #[error("Subtask #{id} not found or not pending for task {key}")]
    SubtaskNotFound { key: String, id: u32 },

    /// No open pull request matches the given number
    #[error("No open pull request #{number}")]
    PrNotFound { number: u64 },

    // =========================================================================
    // Conflict errors
    // =========================================================================
    /// Branch exists but was not created by this tool for this task
    #[error("Branch '{branch}' already exists with unrelated content (task {key})")]
    BranchConflict { key: String, branch: String },

    /// Could not resolve the branch for a review request
    #[error("Cannot resolve branch for pull request #{number}: {reason}")]
    BranchResolution { number: u64, reason: String },

    // =========================================================================
    // Review remediation errors
    // =========================================================================
    /// Comment anchor no longer matches the source file
    #[error("Stale anchor for comment {comment_id}: {path}:{line} changed since triage")]
    StaleAnchor {
        comment_id: u64,
        path: String,
        line: u64,
    },

    // =========================================================================
    // External service errors
    // =========================================================================
    /// A call to an external collaborator failed
    #[error("{service} call failed during {operation}: {message}")]
    ExternalService {
        service: String,
        operation: String,
        message: String,
    },

    /// Missing required tool on PATH
    #[error("Missing required tool: {tool}")]
    MissingTool { tool: String },

    // =========================================================================
    // Invariant violations
    // =========================================================================
    /// A second subtask cannot be started while one is in progress
    #[error("Subtask #{active} is already in progress for task {key} - finish or undo it first")]
    SubtaskAlreadyActive { key: String, active: u32 },

    /// An operation required an in-progress subtask but none exists
    #[error("No subtask in progress for task {key}")]
    NoActiveSubtask { key: String },

    /// Undo requested with an empty undo history
    #[error("Nothing to undo for task {key}")]
    EmptyHistory { key: String },

    /// A phase transition was attempted out of order
    #[error("Invalid phase transition for task {key}: {from} -> {to}")]
    InvalidPhase {
        key: String,
        from: String,
        to: String,
    },

    // =========================================================================
    // Configuration errors
    // =========================================================================
    /// Failed to load or parse configuration
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        path: Option<PathBuf>,
    },

    // =========================================================================
    // Wrapped errors
    // =========================================================================
    /// IO error wrapper
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON error wrapper
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DevflowError {
    // =========================================================================
    // Constructor helpers
    // =========================================================================

    /// Create a task-not-found error
    pub fn task_not_found(key: impl Into<String>) -> Self {
        Self::TaskNotFound { key: key.into() }
    }

    /// Create an external service error
    pub fn external(
        service: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::ExternalService {
            service: service.into(),
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            path: None,
        }
    }

    /// Create a configuration error with the offending path
    pub fn config_with_path(message: impl Into<String>, path: PathBuf) -> Self {
        Self::Config {
            message: message.into(),
            path: Some(path),
        }
    }

    // =========================================================================
    // Classification helpers
    // =========================================================================

    /// Check if this error is recovered locally within a batch (skip + report).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::StaleAnchor { .. })
    }

    /// Check if re-invoking the same command is expected to succeed.
    ///
    /// External service failures halt the current phase without corrupting
    /// persisted state, so a retry resumes from the failed step.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ExternalService { .. } | Self::Io(_) | Self::MissingTool { .. }
        )
    }

    /// Get error code for exit status
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::TaskNotFound { .. }
            | Self::TaskStateMissing { .. }
            | Self::SubtaskNotFound { .. }
            | Self::PrNotFound { .. } => 4,
            Self::BranchConflict { .. } | Self::BranchResolution { .. } => 5,
            Self::ExternalService { .. } | Self::MissingTool { .. } => 6,
            Self::SubtaskAlreadyActive { .. }
            | Self::NoActiveSubtask { .. }
            | Self::EmptyHistory { .. }
            | Self::InvalidPhase { .. } => 3,
            Self::Config { .. } => 7,
            _ => 1,
        }
    }
}

/// Type alias for devflow results
pub type Result<T> = std::result::Result<T, DevflowError>;

/// Exit code for partial success (some fixes applied, some skipped).
pub const EXIT_PARTIAL: i32 = 2;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_names_key_and_step() {
        let err = DevflowError::external("jira", "fetch PBI-123", "401 Unauthorized");
        let msg = err.to_string();
        assert!(msg.contains("jira"));
        assert!(msg.contains("fetch PBI-123"));
        assert!(msg.contains("401"));
    }

    #[test]
    fn test_stale_anchor_is_recoverable() {
        let err = DevflowError::StaleAnchor {
            comment_id: 9,
            path: "src/lib.rs".into(),
            line: 10,
        };
        assert!(err.is_recoverable());
        assert!(!DevflowError::task_not_found("PBI-1").is_recoverable());
    }

    #[test]
    fn test_external_errors_are_retryable() {
        assert!(DevflowError::external("gh", "push", "network").is_retryable());
        assert!(!DevflowError::EmptyHistory { key: "PBI-1".into() }.is_retryable());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(DevflowError::task_not_found("PBI-1").exit_code(), 4);
        assert_eq!(
            DevflowError::BranchConflict {
                key: "PBI-1".into(),
                branch: "feature/PBI-1".into()
            }
            .exit_code(),
            5
        );
        assert_eq!(DevflowError::external("jira", "fetch", "x").exit_code(), 6);
        assert_eq!(
            DevflowError::EmptyHistory { key: "PBI-1".into() }.exit_code(),
            3
        );
        assert_eq!(DevflowError::config("bad toml").exit_code(), 7);
    }

    #[test]
    fn test_invariant_messages_name_the_task() {
        let err = DevflowError::SubtaskAlreadyActive {
            key: "SCRUM-7".into(),
            active: 2,
        };
        assert!(err.to_string().contains("SCRUM-7"));
        assert!(err.to_string().contains("#2"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: DevflowError = io_err.into();
        assert!(matches!(err, DevflowError::Io(_)));
        assert!(err.to_string().contains("access denied"));
    }
}
