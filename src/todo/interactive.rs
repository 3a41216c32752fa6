//! Interactive subtask management.
//!
//! A single-threaded dispatch loop over an abstract command source. The
//! source abstraction decouples the loop from stdin so tests can feed a
//! scripted command sequence and assert on the resulting persisted state.
//! State is saved after every mutating command, so killing the process
//! mid-session loses at most the in-flight command.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use colored::Colorize;
use tracing::debug;

use crate::config::Config;
use crate::error::{DevflowError, Result};
use crate::store::StateStore;
use crate::todo::TodoStatus;
use crate::workflow::TaskRecord;

/// One discrete command for the subtask loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TodoCommand {
    /// Start the first pending subtask
    Next,
    /// Mark the in-progress subtask done
    Done,
    /// Start a specific pending subtask
    Start(u32),
    /// Revert the most recently completed subtask
    Undo,
    /// Re-render the list without mutating
    Show,
    /// Leave the loop
    Quit,
}

impl TodoCommand {
    /// Parse a command line. Single-letter aliases match the prompt hints.
    pub fn parse(input: &str) -> Option<Self> {
        let mut parts = input.split_whitespace();
        let word = parts.next()?.to_lowercase();
        match word.as_str() {
            "n" | "next" => Some(Self::Next),
            "d" | "done" => Some(Self::Done),
            "u" | "undo" => Some(Self::Undo),
            "l" | "list" | "show" => Some(Self::Show),
            "q" | "quit" | "exit" => Some(Self::Quit),
            "s" | "start" => parts.next()?.parse().ok().map(Self::Start),
            _ => None,
        }
    }
}

/// Abstract source of commands, one at a time. `None` means end of input.
pub trait CommandSource {
    fn next_command(&mut self) -> Option<TodoCommand>;
}

/// Reads commands from stdin, prompting and re-asking on unknown input.
#[derive(Debug, Default)]
pub struct StdinSource;

impl CommandSource for StdinSource {
    fn next_command(&mut self) -> Option<TodoCommand> {
        let stdin = io::stdin();
        loop {
            print!("{} ", "command>".bold());
            let _ = io::stdout().flush();
            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => return None,
                Ok(_) => {}
            }
            if line.trim().is_empty() {
                continue;
            }
            match TodoCommand::parse(&line) {
                Some(cmd) => return Some(cmd),
                None => println!("{} unknown command: {}", "!".yellow(), line.trim()),
            }
        }
    }
}

/// Fixed command sequence for deterministic tests.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    commands: VecDeque<TodoCommand>,
}

impl ScriptedSource {
    pub fn new(commands: impl IntoIterator<Item = TodoCommand>) -> Self {
        Self {
            commands: commands.into_iter().collect(),
        }
    }
}

impl CommandSource for ScriptedSource {
    fn next_command(&mut self) -> Option<TodoCommand> {
        self.commands.pop_front()
    }
}

/// One-shot listing and interactive session over the persisted subtask list.
pub struct TodoSession<'a> {
    store: StateStore,
    config: &'a Config,
    project_dir: PathBuf,
    key: String,
}

impl<'a> TodoSession<'a> {
    pub fn new(project_dir: &Path, config: &'a Config, key: &str) -> Self {
        Self {
            store: StateStore::new(project_dir),
            config,
            project_dir: project_dir.to_path_buf(),
            key: key.to_string(),
        }
    }

    fn load(&self) -> Result<TaskRecord> {
        self.store
            .load(&self.store.task_path(&self.key))?
            .ok_or_else(|| DevflowError::TaskStateMissing {
                key: self.key.clone(),
            })
    }

    fn save(&self, record: &mut TaskRecord) -> Result<()> {
        record.touch();
        self.store.save(&self.store.task_path(&self.key), record)?;
        // Keep the markdown mirror in the context dir current.
        let context_dir = self.config.context_dir(&self.project_dir, &self.key);
        std::fs::create_dir_all(&context_dir)?;
        std::fs::write(
            context_dir.join("todo.md"),
            record.todo.render_markdown(&self.key, &record.task.summary),
        )?;
        Ok(())
    }

    /// Print the ordered subtask list with status and progress. Pure read.
    pub fn list(&self) -> Result<()> {
        let record = self.load()?;
        render(&record);
        Ok(())
    }

    /// Run the dispatch loop until quit or end of input.
    pub fn run(&self, source: &mut dyn CommandSource) -> Result<()> {
        let mut record = self.load()?;
        render(&record);

        while let Some(command) = source.next_command() {
            debug!(?command, key = %self.key, "dispatching todo command");
            match self.dispatch(&mut record, command)? {
                Outcome::Quit => break,
                Outcome::Mutated => {
                    self.save(&mut record)?;
                    render(&record);
                }
                Outcome::Unchanged => {}
            }
        }
        Ok(())
    }

    fn dispatch(&self, record: &mut TaskRecord, command: TodoCommand) -> Result<Outcome> {
        let key = &self.key;
        let result: Result<Outcome> = match command {
            TodoCommand::Quit => return Ok(Outcome::Quit),
            TodoCommand::Show => {
                render(record);
                return Ok(Outcome::Unchanged);
            }
            TodoCommand::Next => record.todo.start_next(key).map(|started| match started {
                Some(id) => {
                    announce_started(record, id);
                    Outcome::Mutated
                }
                None => {
                    println!("{} nothing pending", "○".yellow());
                    Outcome::Unchanged
                }
            }),
            TodoCommand::Start(id) => record.todo.start(key, id).map(|()| {
                announce_started(record, id);
                Outcome::Mutated
            }),
            TodoCommand::Done => record.todo.mark_done(key).map(|id| {
                let title = record.todo.title_of(id).unwrap_or_default();
                println!("{} done: {title}", "✓".green());
                Outcome::Mutated
            }),
            TodoCommand::Undo => record.todo.undo(key).map(|id| {
                let title = record.todo.title_of(id).unwrap_or_default();
                println!("{} undone: {title}", "↩".yellow());
                Outcome::Mutated
            }),
        };

        // Invariant and not-found errors are reported and the loop continues;
        // anything else aborts the session.
        match result {
            Ok(outcome) => Ok(outcome),
            Err(e) if e.exit_code() == 3 || e.exit_code() == 4 => {
                println!("{} {e}", "✗".red());
                Ok(Outcome::Unchanged)
            }
            Err(e) => Err(e),
        }
    }
}

enum Outcome {
    Mutated,
    Unchanged,
    Quit,
}

fn announce_started(record: &TaskRecord, id: u32) {
    let title = record.todo.title_of(id).unwrap_or_default();
    println!("{} started: {title}", "▶".cyan());
}

/// Render the subtask table and progress bar.
fn render(record: &TaskRecord) {
    let key = &record.key;
    let summary = &record.task.summary;
    println!("\n{} {}", key.bold(), summary);

    if record.todo.is_empty() {
        println!("  {}", "no subtasks - run `devflow run` first".dimmed());
        return;
    }

    for item in record.todo.items() {
        let (icon, dim) = match item.status {
            TodoStatus::Pending => ("[ ]".to_string(), false),
            TodoStatus::InProgress => (format!("{}", "[>]".cyan()), false),
            TodoStatus::Done => (format!("{}", "[x]".green()), true),
        };
        let line = format!("  {icon} {:>2}. {}", item.id, item.title);
        if dim {
            println!("{}", line.dimmed());
        } else {
            println!("{line}");
        }
    }

    let counts = record.todo.counts();
    let total = counts.total();
    let pct = if total > 0 { counts.done * 100 / total } else { 0 };
    let filled = pct * 20 / 100;
    let bar = format!("{}{}", "█".repeat(filled), "░".repeat(20 - filled));
    println!("  [{bar}] {pct}% ({}/{total})", counts.done);
}
