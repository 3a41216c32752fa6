//! Concrete adapters for the port traits.
//!
//! Each adapter shells out to a standard tool instead of linking a client
//! library: `curl` for the Jira REST API, `git` and `gh` for the repository
//! host, and the assistant binary for handoff. All calls are blocking with
//! no internal retry; failures surface as `ExternalService` errors and the
//! caller re-invokes to retry the failed step.

pub mod assistant;
pub mod gh;
pub mod jira;

use std::path::Path;
use std::process::Command;

use crate::error::{DevflowError, Result};

pub use assistant::AssistantLauncher;
pub use gh::GhClient;
pub use jira::{JiraClient, NullTracker};

/// Fail fast with `MissingTool` when a required binary is not on PATH.
pub(crate) fn ensure_tool(tool: &str) -> Result<()> {
    which::which(tool).map_err(|_| DevflowError::MissingTool {
        tool: tool.to_string(),
    })?;
    Ok(())
}

/// Run a tool and return trimmed stdout, mapping spawn failures and
/// non-zero exits to `ExternalService`.
pub(crate) fn run_tool(
    program: &str,
    args: &[&str],
    dir: Option<&Path>,
    operation: &str,
) -> Result<String> {
    let mut command = Command::new(program);
    command.args(args);
    if let Some(dir) = dir {
        command.current_dir(dir);
    }

    let output = command.output().map_err(|e| {
        DevflowError::external(program, operation, format!("failed to execute: {e}"))
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(DevflowError::external(
            program,
            operation,
            stderr.trim().to_string(),
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Run a tool where a non-zero exit is an expected answer, not a failure.
pub(crate) fn run_tool_status(
    program: &str,
    args: &[&str],
    dir: Option<&Path>,
    operation: &str,
) -> Result<(bool, String)> {
    let mut command = Command::new(program);
    command.args(args);
    if let Some(dir) = dir {
        command.current_dir(dir);
    }

    let output = command.output().map_err(|e| {
        DevflowError::external(program, operation, format!("failed to execute: {e}"))
    })?;

    Ok((
        output.status.success(),
        String::from_utf8_lossy(&output.stdout).trim().to_string(),
    ))
}
