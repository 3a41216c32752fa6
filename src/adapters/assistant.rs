//! Assistant handoff.
//!
//! Fire-and-forget launch of an AI coding assistant with a prepared prompt.
//! The first known assistant binary found on PATH is used; the core never
//! awaits or parses its output.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::info;

use crate::error::{DevflowError, Result};
use crate::ports::Assistant;

/// Assistant binaries probed in preference order.
const CANDIDATES: &[&str] = &["claude", "copilot", "aider"];

pub struct AssistantLauncher {
    project_dir: PathBuf,
}

impl AssistantLauncher {
    pub fn new(project_dir: &Path) -> Self {
        Self {
            project_dir: project_dir.to_path_buf(),
        }
    }

    fn find_assistant() -> Result<String> {
        CANDIDATES
            .iter()
            .find(|candidate| which::which(candidate).is_ok())
            .map(|s| s.to_string())
            .ok_or(DevflowError::MissingTool {
                tool: "assistant (claude, copilot or aider)".to_string(),
            })
    }
}

impl Assistant for AssistantLauncher {
    fn launch(&self, prompt: &str) -> Result<()> {
        let program = Self::find_assistant()?;
        Command::new(&program)
            .arg(prompt)
            .current_dir(&self.project_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                DevflowError::external(&program, "launch", format!("failed to spawn: {e}"))
            })?;
        info!(program = %program, "assistant launched");
        Ok(())
    }
}
