//! Workflow orchestration.
//!
//! Drives a task through its phases against the port traits, persisting the
//! record after every completed phase. The first invocation stops at the
//! implementation pause; invoking the same command again is the signal that
//! implementation is done and the run continues through PR creation and the
//! final tracker transition. Every step consults persisted state before
//! acting, so duplicate invocations repeat no side effects.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::context;
use crate::error::{DevflowError, Result};
use crate::ports::{Assistant, HostClient, TaskData, TrackerClient};
use crate::store::StateStore;
use crate::todo::TodoStatus;
use crate::workflow::{Phase, TaskRecord};

/// Options for a workflow run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Skip all tracker calls and synthesize the task locally.
    pub skip_tracker: bool,
    /// Open the pull request as a draft.
    pub draft: bool,
    /// Launch the assistant with the task context at the pause point.
    pub launch_assistant: bool,
}

/// What a run ended with.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// Setup is complete; control returns for implementation work.
    Paused {
        key: String,
        branch: String,
        context_dir: PathBuf,
    },
    /// The PR exists and the tracker transition was attempted.
    Completed {
        pr_url: String,
        tracker_updated: bool,
    },
}

/// Drives the task workflow against abstract collaborators.
pub struct Orchestrator<'a, T, H, A> {
    tracker: &'a T,
    host: &'a H,
    assistant: &'a A,
    config: &'a Config,
    project_dir: PathBuf,
    store: StateStore,
}

impl<'a, T, H, A> Orchestrator<'a, T, H, A>
where
    T: TrackerClient,
    H: HostClient,
    A: Assistant,
{
    pub fn new(
        tracker: &'a T,
        host: &'a H,
        assistant: &'a A,
        config: &'a Config,
        project_dir: &Path,
    ) -> Self {
        Self {
            tracker,
            host,
            assistant,
            config,
            project_dir: project_dir.to_path_buf(),
            store: StateStore::new(project_dir),
        }
    }

    /// Run the workflow for a task key, resuming from persisted state.
    pub fn run(&self, key: &str, options: &RunOptions) -> Result<RunOutcome> {
        let path = self.store.task_path(key);
        let mut record = match self.store.load::<TaskRecord>(&path)? {
            Some(record) => {
                info!(key, phase = %record.phase, "resuming from persisted state");
                record
            }
            None => TaskRecord::new(TaskData::synthetic(key), self.config.branch_for_key(key)),
        };

        loop {
            debug!(key, phase = %record.phase, "running phase");
            match record.phase {
                Phase::New => {
                    record.task = self.fetch_task(key, options)?;
                    record.advance(Phase::Fetched)?;
                    self.save(&record)?;
                }
                Phase::Fetched => {
                    self.ensure_branch(&record)?;
                    record.advance(Phase::Branched)?;
                    self.save(&record)?;
                }
                Phase::Branched => {
                    record.tracker_updated = self.update_tracker(
                        key,
                        &self.config.tracker.status_in_progress,
                        options,
                    )?;
                    record.seed_subtasks();
                    context::generate(self.config, &self.project_dir, &record)?;
                    record.advance(Phase::ContextReady)?;
                    self.save(&record)?;
                }
                Phase::ContextReady => {
                    record.advance(Phase::AwaitingImplementation)?;
                    self.save(&record)?;
                    let context_dir = self.config.context_dir(&self.project_dir, key);
                    if options.launch_assistant {
                        self.assistant
                            .launch(&context::assistant_prompt(&record, &context_dir))?;
                    }
                    info!(key, branch = %record.branch, "paused for implementation");
                    return Ok(RunOutcome::Paused {
                        key: key.to_string(),
                        branch: record.branch.clone(),
                        context_dir,
                    });
                }
                Phase::AwaitingImplementation => {
                    self.open_pull_request(&mut record, options)?;
                    record.advance(Phase::PrCreated)?;
                    self.save(&record)?;
                }
                Phase::PrCreated => {
                    record.tracker_updated = self.update_tracker(
                        key,
                        &self.config.tracker.status_in_review,
                        options,
                    )?;
                    record.advance(Phase::StatusUpdated)?;
                    self.save(&record)?;
                }
                Phase::StatusUpdated => {
                    return Ok(RunOutcome::Completed {
                        pr_url: record.pr_url.clone().unwrap_or_default(),
                        tracker_updated: record.tracker_updated,
                    });
                }
            }
        }
    }

    fn save(&self, record: &TaskRecord) -> Result<()> {
        self.store.save(&self.store.task_path(&record.key), record)
    }

    fn fetch_task(&self, key: &str, options: &RunOptions) -> Result<TaskData> {
        if options.skip_tracker {
            debug!(key, "tracker skipped, synthesizing task");
            return Ok(TaskData::synthetic(key));
        }
        self.tracker.fetch_task(key)
    }

    /// Create the work branch, refusing to adopt a same-named branch this
    /// tool did not create.
    fn ensure_branch(&self, record: &TaskRecord) -> Result<()> {
        let branch = &record.branch;
        if self.host.current_branch()? == *branch {
            return Ok(());
        }
        if self.host.branch_exists(branch)? {
            return Err(DevflowError::BranchConflict {
                key: record.key.clone(),
                branch: branch.clone(),
            });
        }
        self.host.create_branch(branch)?;
        info!(key = %record.key, branch = %branch, "created work branch");
        Ok(())
    }

    fn update_tracker(&self, key: &str, status: &str, options: &RunOptions) -> Result<bool> {
        if options.skip_tracker {
            debug!(key, status, "tracker skipped, not transitioning");
            return Ok(false);
        }
        if !self.config.tracker.has_credentials() {
            warn!(key, "tracker credentials not configured, skipping status update");
            return Ok(false);
        }
        if self.tracker.update_status(key, status)? {
            info!(key, status, "tracker status updated");
            Ok(true)
        } else {
            warn!(key, status, "transition not available in tracker workflow");
            Ok(false)
        }
    }

    /// Commit outstanding work, push the branch and open (or reuse) the PR.
    fn open_pull_request(&self, record: &mut TaskRecord, options: &RunOptions) -> Result<()> {
        let branch = record.branch.clone();
        if self.host.current_branch()? != branch {
            self.host.checkout_branch(&branch)?;
        }

        if self.host.has_uncommitted_changes()? {
            let message = format!("{}: {}", record.key, record.task.summary);
            let hash = self.host.commit_all(&message)?;
            info!(key = %record.key, hash = %hash, "committed outstanding work");
        }

        self.host.push(&branch)?;

        if let Some(existing) = self.host.find_open_pr(&branch)? {
            info!(key = %record.key, number = existing.number, "reusing open pull request");
            record.pr_number = Some(existing.number);
            record.pr_url = Some(existing.url);
            return Ok(());
        }

        let title = format!("{}: {}", record.key, record.task.summary);
        let body = pr_body(record);
        let url = self.host.create_pr(&branch, &title, &body, options.draft)?;
        info!(key = %record.key, url = %url, "pull request opened");

        record.pr_number = self.host.find_open_pr(&branch)?.map(|pr| pr.number);
        record.pr_url = Some(url);
        Ok(())
    }
}

/// PR body: description plus an acceptance-criteria checklist reflecting
/// subtask completion.
fn pr_body(record: &TaskRecord) -> String {
    let task = &record.task;
    let mut lines = vec!["## Summary".to_string(), String::new()];
    lines.push(if task.description.is_empty() {
        task.summary.clone()
    } else {
        task.description.clone()
    });
    lines.push(String::new());
    lines.push("## Acceptance Criteria".to_string());
    lines.push(String::new());
    if record.todo.is_empty() {
        for criterion in &task.acceptance_criteria {
            lines.push(format!("- [ ] {criterion}"));
        }
    } else {
        for item in record.todo.items() {
            let check = if item.status == TodoStatus::Done { "x" } else { " " };
            lines.push(format!("- [{check}] {}", item.title));
        }
    }
    if !task.url.is_empty() {
        lines.push(String::new());
        lines.push(format!("Tracker: {}", task.url));
    }
    lines.push(String::new());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockAssistant, MockHostClient, MockTrackerClient};
    use tempfile::TempDir;

    fn config_with_credentials() -> Config {
        let mut config = Config::default();
        config.tracker.server = "https://example.atlassian.net".into();
        config.tracker.email = "dev@example.com".into();
        config.tracker.api_token = "token".into();
        config
    }

    fn sample_task(key: &str) -> TaskData {
        let mut task = TaskData::synthetic(key);
        task.summary = "Add rate limiting".into();
        task.description = "Throttle the public API.".into();
        task.acceptance_criteria = vec!["Limit is configurable".into(), "429 on breach".into()];
        task
    }

    struct Harness {
        temp: TempDir,
        config: Config,
        tracker: MockTrackerClient,
        host: MockHostClient,
        assistant: MockAssistant,
    }

    impl Harness {
        fn new(key: &str) -> Self {
            Self {
                temp: TempDir::new().unwrap(),
                config: config_with_credentials(),
                tracker: MockTrackerClient::new().with_task(sample_task(key)),
                host: MockHostClient::new(),
                assistant: MockAssistant::new(),
            }
        }

        fn orchestrator(&self) -> Orchestrator<'_, MockTrackerClient, MockHostClient, MockAssistant> {
            Orchestrator::new(
                &self.tracker,
                &self.host,
                &self.assistant,
                &self.config,
                self.temp.path(),
            )
        }

        fn load(&self, key: &str) -> TaskRecord {
            let store = StateStore::new(self.temp.path());
            store.load(&store.task_path(key)).unwrap().unwrap()
        }
    }

    #[test]
    fn test_first_run_pauses_after_setup() {
        let h = Harness::new("PBI-1");
        let outcome = h.orchestrator().run("PBI-1", &RunOptions::default()).unwrap();

        match outcome {
            RunOutcome::Paused { branch, context_dir, .. } => {
                assert_eq!(branch, "feature/PBI-1");
                assert!(context_dir.join("requirements.md").exists());
            }
            other => panic!("expected pause, got {other:?}"),
        }

        let record = h.load("PBI-1");
        assert_eq!(record.phase, Phase::AwaitingImplementation);
        assert_eq!(record.task.summary, "Add rate limiting");
        assert_eq!(record.todo.items().len(), 2);
        assert!(h.host.branch_exists("feature/PBI-1").unwrap());
        assert_eq!(
            h.tracker.status_updates(),
            vec![("PBI-1".to_string(), "In Progress".to_string())]
        );
        // Assistant only launches when asked
        assert!(h.assistant.prompts().is_empty());
    }

    #[test]
    fn test_second_run_opens_pr_and_moves_to_review() {
        let h = Harness::new("PBI-2");
        let orchestrator = h.orchestrator();
        orchestrator.run("PBI-2", &RunOptions::default()).unwrap();

        let outcome = orchestrator.run("PBI-2", &RunOptions::default()).unwrap();
        let RunOutcome::Completed { pr_url, tracker_updated } = outcome else {
            panic!("expected completion");
        };
        assert!(!pr_url.is_empty());
        assert!(tracker_updated);

        let record = h.load("PBI-2");
        assert!(record.phase.is_terminal());
        assert!(record.pr_number.is_some());
        assert_eq!(h.host.pushes(), vec!["feature/PBI-2".to_string()]);
        assert_eq!(
            h.tracker.status_updates().last().cloned(),
            Some(("PBI-2".to_string(), "In Review".to_string()))
        );
    }

    #[test]
    fn test_third_run_is_a_pure_no_op() {
        let h = Harness::new("PBI-3");
        let orchestrator = h.orchestrator();
        orchestrator.run("PBI-3", &RunOptions::default()).unwrap();
        orchestrator.run("PBI-3", &RunOptions::default()).unwrap();

        let pushes_before = h.host.pushes().len();
        let outcome = orchestrator.run("PBI-3", &RunOptions::default()).unwrap();

        assert!(matches!(outcome, RunOutcome::Completed { .. }));
        assert_eq!(h.host.open_prs().len(), 1);
        assert_eq!(h.host.pushes().len(), pushes_before);
    }

    #[test]
    fn test_resume_reuses_open_pr() {
        let h = Harness::new("PBI-4");
        let orchestrator = h.orchestrator();
        orchestrator.run("PBI-4", &RunOptions::default()).unwrap();

        // A PR for the branch already exists (opened manually).
        let url = h
            .host
            .create_pr("feature/PBI-4", "manual", "body", false)
            .unwrap();

        let outcome = orchestrator.run("PBI-4", &RunOptions::default()).unwrap();
        let RunOutcome::Completed { pr_url, .. } = outcome else {
            panic!("expected completion");
        };
        assert_eq!(pr_url, url);
        assert_eq!(h.host.open_prs().len(), 1);
    }

    #[test]
    fn test_unrelated_existing_branch_is_a_conflict() {
        let h = Harness::new("PBI-5");
        let host = MockHostClient::new().with_existing_branch("feature/PBI-5");
        let orchestrator = Orchestrator::new(
            &h.tracker,
            &host,
            &h.assistant,
            &h.config,
            h.temp.path(),
        );

        let err = orchestrator.run("PBI-5", &RunOptions::default()).unwrap_err();
        assert!(matches!(err, DevflowError::BranchConflict { .. }));
        assert_eq!(err.exit_code(), 5);
        // Fetch completed, branch creation did not
        assert_eq!(h.load("PBI-5").phase, Phase::Fetched);
    }

    #[test]
    fn test_skip_tracker_synthesizes_and_never_calls_tracker() {
        let h = Harness::new("PBI-6");
        let options = RunOptions {
            skip_tracker: true,
            ..RunOptions::default()
        };
        let orchestrator = h.orchestrator();
        orchestrator.run("PBI-6", &options).unwrap();
        orchestrator.run("PBI-6", &options).unwrap();

        assert!(h.tracker.status_updates().is_empty());
        let record = h.load("PBI-6");
        assert!(record.phase.is_terminal());
        assert!(!record.tracker_updated);
        assert_eq!(record.task.summary, "Local task PBI-6");
    }

    #[test]
    fn test_unavailable_transition_is_reported_not_fatal() {
        let h = Harness::new("PBI-7");
        let tracker = MockTrackerClient::new()
            .with_task(sample_task("PBI-7"))
            .with_unavailable_transition();
        let orchestrator = Orchestrator::new(
            &tracker,
            &h.host,
            &h.assistant,
            &h.config,
            h.temp.path(),
        );

        orchestrator.run("PBI-7", &RunOptions::default()).unwrap();
        assert!(!h.load("PBI-7").tracker_updated);
    }

    #[test]
    fn test_fetch_failure_leaves_no_partial_state() {
        let h = Harness::new("PBI-8");
        let tracker = MockTrackerClient::new().with_fetch_error("503 from upstream");
        let orchestrator = Orchestrator::new(
            &tracker,
            &h.host,
            &h.assistant,
            &h.config,
            h.temp.path(),
        );

        let err = orchestrator.run("PBI-8", &RunOptions::default()).unwrap_err();
        assert!(err.is_retryable());
        let store = StateStore::new(h.temp.path());
        assert!(!store.exists(&store.task_path("PBI-8")));
    }

    #[test]
    fn test_assistant_launch_at_pause() {
        let h = Harness::new("PBI-9");
        let options = RunOptions {
            launch_assistant: true,
            ..RunOptions::default()
        };
        h.orchestrator().run("PBI-9", &options).unwrap();

        let prompts = h.assistant.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("PBI-9"));
        assert!(prompts[0].contains("feature/PBI-9"));
    }

    #[test]
    fn test_assistant_spawn_failure_keeps_pause_state() {
        let h = Harness::new("PBI-11");
        let assistant = MockAssistant::new().with_error("binary not found");
        let orchestrator = Orchestrator::new(
            &h.tracker,
            &h.host,
            &assistant,
            &h.config,
            h.temp.path(),
        );
        let options = RunOptions {
            launch_assistant: true,
            ..RunOptions::default()
        };

        let err = orchestrator.run("PBI-11", &options).unwrap_err();
        assert!(err.is_retryable());
        // The pause was persisted before the launch, so the next run
        // proceeds straight to PR creation.
        assert_eq!(h.load("PBI-11").phase, Phase::AwaitingImplementation);
    }

    #[test]
    fn test_dirty_tree_is_committed_before_push() {
        let h = Harness::new("PBI-10");
        let host = MockHostClient::new().with_commit_hash("feedbee");
        let orchestrator = Orchestrator::new(
            &h.tracker,
            &host,
            &h.assistant,
            &h.config,
            h.temp.path(),
        );
        orchestrator.run("PBI-10", &RunOptions::default()).unwrap();

        // Implementation happened, tree is dirty at resume time.
        host.mark_dirty();
        orchestrator.run("PBI-10", &RunOptions::default()).unwrap();

        assert_eq!(host.commits(), vec!["PBI-10: Add rate limiting".to_string()]);
        assert!(!host.has_uncommitted_changes().unwrap());
    }
}
