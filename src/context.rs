//! Context artifact generation.
//!
//! Materializes the fetched task into markdown files under
//! `.devflow/context/<KEY>/` so both the developer and the assistant start
//! from the same requirements. Regeneration is a pure function of the task
//! record; re-running overwrites the artifacts with identical content.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::workflow::TaskRecord;

/// Write `requirements.md` and `todo.md` for a task. Returns the context
/// directory.
pub fn generate(config: &Config, project_dir: &Path, record: &TaskRecord) -> Result<PathBuf> {
    let dir = config.context_dir(project_dir, &record.key);
    fs::create_dir_all(&dir)?;

    fs::write(dir.join("requirements.md"), render_requirements(record))?;
    fs::write(
        dir.join("todo.md"),
        record.todo.render_markdown(&record.key, &record.task.summary),
    )?;

    info!(key = %record.key, dir = %dir.display(), "context artifacts written");
    Ok(dir)
}

fn render_requirements(record: &TaskRecord) -> String {
    let task = &record.task;
    let mut lines = vec![
        format!("# {}: {}", task.key, task.summary),
        String::new(),
        format!("- **Type:** {}", task.issue_type),
        format!("- **Priority:** {}", task.priority),
        format!("- **Branch:** `{}`", record.branch),
    ];
    if !task.url.is_empty() {
        lines.push(format!("- **Tracker:** {}", task.url));
    }
    lines.push(String::new());
    lines.push("## Description".to_string());
    lines.push(String::new());
    lines.push(if task.description.is_empty() {
        "_No description provided._".to_string()
    } else {
        task.description.clone()
    });
    lines.push(String::new());
    lines.push("## Acceptance Criteria".to_string());
    lines.push(String::new());
    if task.acceptance_criteria.is_empty() {
        lines.push("_None listed._".to_string());
    } else {
        for (i, criterion) in task.acceptance_criteria.iter().enumerate() {
            lines.push(format!("{}. {criterion}", i + 1));
        }
    }
    lines.push(String::new());
    lines.join("\n")
}

/// Prompt handed to the assistant when it is launched at the pause point.
pub fn assistant_prompt(record: &TaskRecord, context_dir: &Path) -> String {
    format!(
        "Implement task {} ({}). Requirements and the subtask list are in {}. \
         Work through the subtasks in order and keep changes on branch {}.",
        record.key,
        record.task.summary,
        context_dir.display(),
        record.branch,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::TaskData;
    use tempfile::TempDir;

    fn record() -> TaskRecord {
        let mut task = TaskData::synthetic("PBI-7");
        task.summary = "Add rate limiting".into();
        task.description = "Throttle the public API.".into();
        task.acceptance_criteria = vec!["Limit is configurable".into(), "429 on breach".into()];
        task.url = "https://example.atlassian.net/browse/PBI-7".into();
        let mut record = TaskRecord::new(task, "feature/PBI-7".into());
        record.seed_subtasks();
        record
    }

    #[test]
    fn test_generate_writes_both_artifacts() {
        let temp = TempDir::new().unwrap();
        let config = Config::default();
        let dir = generate(&config, temp.path(), &record()).unwrap();

        let requirements = fs::read_to_string(dir.join("requirements.md")).unwrap();
        assert!(requirements.contains("# PBI-7: Add rate limiting"));
        assert!(requirements.contains("Throttle the public API."));
        assert!(requirements.contains("1. Limit is configurable"));
        assert!(requirements.contains("2. 429 on breach"));

        let todo = fs::read_to_string(dir.join("todo.md")).unwrap();
        assert!(todo.contains("- [ ] Limit is configurable"));
    }

    #[test]
    fn test_generate_is_stable_across_reruns() {
        let temp = TempDir::new().unwrap();
        let config = Config::default();
        let record = record();

        generate(&config, temp.path(), &record).unwrap();
        let first = fs::read_to_string(
            config.context_dir(temp.path(), "PBI-7").join("requirements.md"),
        )
        .unwrap();

        generate(&config, temp.path(), &record).unwrap();
        let second = fs::read_to_string(
            config.context_dir(temp.path(), "PBI-7").join("requirements.md"),
        )
        .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_sections_render_placeholders() {
        let temp = TempDir::new().unwrap();
        let config = Config::default();
        let record = TaskRecord::new(TaskData::synthetic("PBI-8"), "feature/PBI-8".into());

        let dir = generate(&config, temp.path(), &record).unwrap();
        let requirements = fs::read_to_string(dir.join("requirements.md")).unwrap();
        assert!(requirements.contains("_No description provided._"));
        assert!(requirements.contains("_None listed._"));
    }

    #[test]
    fn test_assistant_prompt_names_key_and_branch() {
        let record = record();
        let prompt = assistant_prompt(&record, Path::new("/tmp/ctx"));
        assert!(prompt.contains("PBI-7"));
        assert!(prompt.contains("feature/PBI-7"));
    }
}
