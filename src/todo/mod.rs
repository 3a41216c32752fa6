//! Subtask tracking per task key.
//!
//! An ordered list of subtasks seeded from the task's acceptance criteria,
//! with start/done/undo semantics and a bounded undo history. At most one
//! subtask is in progress at any time; every operation preserves that
//! invariant, including failed attempts.
//!
//! # State transitions
//!
//! ```text
//! Pending ──start──> InProgress ──done──> Done
//!    ▲                                     │
//!    └───────────────undo──────────────────┘
//! ```

pub mod interactive;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{DevflowError, Result};

pub use interactive::{CommandSource, ScriptedSource, StdinSource, TodoCommand, TodoSession};

/// Status of a single subtask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    #[default]
    Pending,
    InProgress,
    Done,
}

impl fmt::Display for TodoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TodoStatus::Pending => write!(f, "pending"),
            TodoStatus::InProgress => write!(f, "in progress"),
            TodoStatus::Done => write!(f, "done"),
        }
    }
}

/// One acceptance-criterion-derived subtask.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoItem {
    /// Stable identifier: position in the originating acceptance criteria.
    pub id: u32,
    pub title: String,
    pub status: TodoStatus,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TodoItem {
    fn new(id: u32, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            status: TodoStatus::Pending,
            completed_at: None,
        }
    }
}

/// Per-status counts for display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TodoCounts {
    pub pending: usize,
    pub in_progress: usize,
    pub done: usize,
}

impl TodoCounts {
    pub fn total(&self) -> usize {
        self.pending + self.in_progress + self.done
    }
}

/// Ordered subtask list with undo history for one task key.
///
/// Subtasks are never deleted, only status-transitioned.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TodoList {
    items: Vec<TodoItem>,
    /// Identifiers most recently transitioned to done, newest last.
    undo_history: Vec<u32>,
}

impl TodoList {
    /// Seed one pending subtask per acceptance criterion, in criteria order.
    pub fn from_criteria(criteria: &[String]) -> Self {
        let items = criteria
            .iter()
            .enumerate()
            .map(|(i, title)| TodoItem::new(i as u32 + 1, title.clone()))
            .collect();
        Self {
            items,
            undo_history: Vec::new(),
        }
    }

    /// Subtasks in stored order.
    pub fn items(&self) -> &[TodoItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The subtask currently in progress, if any.
    pub fn active(&self) -> Option<&TodoItem> {
        self.items
            .iter()
            .find(|t| t.status == TodoStatus::InProgress)
    }

    /// Per-status counts.
    pub fn counts(&self) -> TodoCounts {
        let mut counts = TodoCounts::default();
        for item in &self.items {
            match item.status {
                TodoStatus::Pending => counts.pending += 1,
                TodoStatus::InProgress => counts.in_progress += 1,
                TodoStatus::Done => counts.done += 1,
            }
        }
        counts
    }

    fn ensure_none_active(&self, key: &str) -> Result<()> {
        if let Some(active) = self.active() {
            return Err(DevflowError::SubtaskAlreadyActive {
                key: key.to_string(),
                active: active.id,
            });
        }
        Ok(())
    }

    /// Start the first pending subtask in stored order.
    ///
    /// Returns the started id, or `None` when nothing is pending (a no-op,
    /// not an error).
    ///
    /// # Errors
    ///
    /// `SubtaskAlreadyActive` if another subtask is already in progress.
    pub fn start_next(&mut self, key: &str) -> Result<Option<u32>> {
        self.ensure_none_active(key)?;
        let Some(item) = self
            .items
            .iter_mut()
            .find(|t| t.status == TodoStatus::Pending)
        else {
            return Ok(None);
        };
        item.status = TodoStatus::InProgress;
        Ok(Some(item.id))
    }

    /// Start a specific pending subtask by id.
    ///
    /// # Errors
    ///
    /// `SubtaskAlreadyActive` if another subtask is in progress;
    /// `SubtaskNotFound` if the id does not exist or is not pending.
    pub fn start(&mut self, key: &str, id: u32) -> Result<()> {
        self.ensure_none_active(key)?;
        let item = self
            .items
            .iter_mut()
            .find(|t| t.id == id && t.status == TodoStatus::Pending)
            .ok_or(DevflowError::SubtaskNotFound {
                key: key.to_string(),
                id,
            })?;
        item.status = TodoStatus::InProgress;
        Ok(())
    }

    /// Mark the in-progress subtask done, stamping the completion time and
    /// pushing its id onto the undo history.
    ///
    /// # Errors
    ///
    /// `NoActiveSubtask` if nothing is in progress.
    pub fn mark_done(&mut self, key: &str) -> Result<u32> {
        let item = self
            .items
            .iter_mut()
            .find(|t| t.status == TodoStatus::InProgress)
            .ok_or(DevflowError::NoActiveSubtask {
                key: key.to_string(),
            })?;
        item.status = TodoStatus::Done;
        item.completed_at = Some(Utc::now());
        let id = item.id;
        self.undo_history.push(id);
        Ok(id)
    }

    /// Revert the most recently completed subtask back to pending, clearing
    /// its completion time. The reverted subtask does not resume
    /// in-progress state.
    ///
    /// # Errors
    ///
    /// `EmptyHistory` if nothing has been completed; state is unchanged.
    pub fn undo(&mut self, key: &str) -> Result<u32> {
        let Some(id) = self.undo_history.pop() else {
            return Err(DevflowError::EmptyHistory {
                key: key.to_string(),
            });
        };
        if let Some(item) = self.items.iter_mut().find(|t| t.id == id) {
            item.status = TodoStatus::Pending;
            item.completed_at = None;
        }
        Ok(id)
    }

    /// Title of a subtask, for messages.
    pub fn title_of(&self, id: u32) -> Option<&str> {
        self.items
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.title.as_str())
    }

    /// Render the markdown mirror kept next to the context artifacts.
    pub fn render_markdown(&self, key: &str, summary: &str) -> String {
        let counts = self.counts();
        let total = counts.total();
        let pct = if total > 0 {
            counts.done * 100 / total
        } else {
            0
        };

        let mut lines = vec![
            format!("# TODO: {key}"),
            String::new(),
            format!("> **{summary}**"),
            String::new(),
        ];
        for item in &self.items {
            let check = if item.status == TodoStatus::Done { "x" } else { " " };
            let marker = if item.status == TodoStatus::InProgress {
                "(in progress) "
            } else {
                ""
            };
            lines.push(format!("- [{check}] {marker}{}", item.title));
        }
        lines.push(String::new());
        lines.push("---".to_string());
        lines.push(format!("**Progress:** {}/{total} ({pct}%)", counts.done));
        lines.push(String::new());
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn criteria(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("AC {i}")).collect()
    }

    fn assert_at_most_one_active(list: &TodoList) {
        let active = list
            .items()
            .iter()
            .filter(|t| t.status == TodoStatus::InProgress)
            .count();
        assert!(active <= 1, "invariant violated: {active} active subtasks");
    }

    #[test]
    fn test_seeding_preserves_criteria_order() {
        let list = TodoList::from_criteria(&criteria(3));
        assert_eq!(list.items().len(), 3);
        for (i, item) in list.items().iter().enumerate() {
            assert_eq!(item.id, i as u32 + 1);
            assert_eq!(item.title, format!("AC {}", i + 1));
            assert_eq!(item.status, TodoStatus::Pending);
        }
    }

    #[test]
    fn test_start_next_picks_first_pending() {
        let mut list = TodoList::from_criteria(&criteria(3));
        let started = list.start_next("PBI-1").unwrap();
        assert_eq!(started, Some(1));
        assert_eq!(list.active().unwrap().id, 1);
        assert_at_most_one_active(&list);
    }

    #[test]
    fn test_start_next_fails_when_one_is_active() {
        let mut list = TodoList::from_criteria(&criteria(2));
        list.start_next("PBI-1").unwrap();
        let err = list.start_next("PBI-1").unwrap_err();
        assert!(matches!(
            err,
            DevflowError::SubtaskAlreadyActive { active: 1, .. }
        ));
        assert_at_most_one_active(&list);
    }

    #[test]
    fn test_start_next_with_nothing_pending_is_noop() {
        let mut list = TodoList::from_criteria(&criteria(1));
        list.start_next("PBI-1").unwrap();
        list.mark_done("PBI-1").unwrap();
        assert_eq!(list.start_next("PBI-1").unwrap(), None);
    }

    #[test]
    fn test_mark_done_stamps_time_and_records_history() {
        let mut list = TodoList::from_criteria(&criteria(2));
        list.start_next("PBI-1").unwrap();
        let done = list.mark_done("PBI-1").unwrap();
        assert_eq!(done, 1);
        let item = &list.items()[0];
        assert_eq!(item.status, TodoStatus::Done);
        assert!(item.completed_at.is_some());
    }

    #[test]
    fn test_mark_done_without_active_fails() {
        let mut list = TodoList::from_criteria(&criteria(2));
        let err = list.mark_done("PBI-1").unwrap_err();
        assert!(matches!(err, DevflowError::NoActiveSubtask { .. }));
    }

    #[test]
    fn test_start_specific_pending() {
        let mut list = TodoList::from_criteria(&criteria(3));
        list.start("PBI-1", 2).unwrap();
        assert_eq!(list.active().unwrap().id, 2);
    }

    #[test]
    fn test_start_specific_rejects_missing_or_done() {
        let mut list = TodoList::from_criteria(&criteria(2));
        assert!(matches!(
            list.start("PBI-1", 9).unwrap_err(),
            DevflowError::SubtaskNotFound { id: 9, .. }
        ));

        list.start("PBI-1", 1).unwrap();
        list.mark_done("PBI-1").unwrap();
        assert!(matches!(
            list.start("PBI-1", 1).unwrap_err(),
            DevflowError::SubtaskNotFound { id: 1, .. }
        ));
    }

    #[test]
    fn test_undo_restores_exact_subtask() {
        let mut list = TodoList::from_criteria(&criteria(3));
        list.start("PBI-1", 2).unwrap();
        list.mark_done("PBI-1").unwrap();

        let undone = list.undo("PBI-1").unwrap();
        assert_eq!(undone, 2);
        let item = &list.items()[1];
        assert_eq!(item.status, TodoStatus::Pending);
        assert!(item.completed_at.is_none());
    }

    #[test]
    fn test_undo_beyond_history_fails_and_leaves_state_unchanged() {
        let mut list = TodoList::from_criteria(&criteria(2));
        list.start_next("PBI-1").unwrap();
        list.mark_done("PBI-1").unwrap();
        list.undo("PBI-1").unwrap();

        let before = format!("{list:?}");
        let err = list.undo("PBI-1").unwrap_err();
        assert!(matches!(err, DevflowError::EmptyHistory { .. }));
        assert_eq!(format!("{list:?}"), before);
    }

    #[test]
    fn test_undo_is_lifo() {
        let mut list = TodoList::from_criteria(&criteria(3));
        for _ in 0..3 {
            list.start_next("PBI-1").unwrap();
            list.mark_done("PBI-1").unwrap();
        }
        assert_eq!(list.undo("PBI-1").unwrap(), 3);
        assert_eq!(list.undo("PBI-1").unwrap(), 2);
        assert_eq!(list.undo("PBI-1").unwrap(), 1);
    }

    #[test]
    fn test_invariant_holds_after_every_operation() {
        let mut list = TodoList::from_criteria(&criteria(3));
        let _ = list.start_next("PBI-1");
        assert_at_most_one_active(&list);
        let _ = list.start("PBI-1", 3);
        assert_at_most_one_active(&list);
        let _ = list.mark_done("PBI-1");
        assert_at_most_one_active(&list);
        let _ = list.undo("PBI-1");
        assert_at_most_one_active(&list);
        let _ = list.undo("PBI-1");
        assert_at_most_one_active(&list);
    }

    #[test]
    fn test_scenario_three_criteria_one_done() {
        // Context generation yields 3 pending subtasks; start + done leaves
        // 1 done and 2 pending in original order.
        let mut list = TodoList::from_criteria(&criteria(3));
        list.start_next("X-1").unwrap();
        list.mark_done("X-1").unwrap();

        let counts = list.counts();
        assert_eq!(counts.done, 1);
        assert_eq!(counts.pending, 2);
        let ids: Vec<u32> = list.items().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_render_markdown_shows_progress() {
        let mut list = TodoList::from_criteria(&criteria(2));
        list.start_next("PBI-1").unwrap();
        list.mark_done("PBI-1").unwrap();

        let md = list.render_markdown("PBI-1", "Do the thing");
        assert!(md.contains("# TODO: PBI-1"));
        assert!(md.contains("- [x] AC 1"));
        assert!(md.contains("- [ ] AC 2"));
        assert!(md.contains("1/2 (50%)"));
    }
}
