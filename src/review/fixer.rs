//! Auto-fix application.
//!
//! Consumes the auto-fixable portion of a triage report: computes the
//! literal replacement at each comment's anchor, verifies the anchor still
//! matches the source, writes the surviving fixes, commits them as one
//! batch and replies to each originating thread with the commit hash.
//! Partial failure is the normal case; every item gets an outcome rather
//! than aborting the batch.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use colored::Colorize;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{DevflowError, Result, EXIT_PARTIAL};
use crate::ports::HostClient;
use crate::review::triage::TriageEngine;
use crate::review::{FixKind, TriagedComment};

/// Options for a fix run.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixOptions {
    /// Apply without per-item confirmation.
    pub auto: bool,
    /// Compute and report intended changes without writing, committing or
    /// replying.
    pub dry_run: bool,
}

/// Per-item result of a fix run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixOutcome {
    Applied {
        comment_id: u64,
        path: String,
        line: u64,
        description: String,
    },
    /// The anchored line changed since triage; never forced.
    SkippedStale {
        comment_id: u64,
        path: String,
        line: u64,
    },
    /// The fix could not be computed against the current content.
    SkippedNoMatch { comment_id: u64, reason: String },
    /// Declined in confirmation mode.
    SkippedRejected { comment_id: u64 },
}

impl FixOutcome {
    pub fn comment_id(&self) -> u64 {
        match self {
            FixOutcome::Applied { comment_id, .. }
            | FixOutcome::SkippedStale { comment_id, .. }
            | FixOutcome::SkippedNoMatch { comment_id, .. }
            | FixOutcome::SkippedRejected { comment_id } => *comment_id,
        }
    }

    fn label(&self) -> String {
        match self {
            FixOutcome::Applied { description, .. } => format!("applied ({description})"),
            FixOutcome::SkippedStale { path, line, .. } => {
                format!("skipped (stale anchor {path}:{line})")
            }
            FixOutcome::SkippedNoMatch { reason, .. } => format!("skipped (no match: {reason})"),
            FixOutcome::SkippedRejected { .. } => "skipped (rejected)".to_string(),
        }
    }
}

/// Summary of one fix run.
#[derive(Debug, Clone)]
pub struct FixReport {
    pub pr_number: u64,
    pub outcomes: Vec<FixOutcome>,
    /// Short hash of the batch commit, absent in dry-run or all-skipped runs.
    pub commit: Option<String>,
    /// Comments in the report that were not auto-fixable to begin with.
    pub untouched: usize,
    pub dry_run: bool,
}

impl FixReport {
    pub fn applied(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, FixOutcome::Applied { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes.len() - self.applied()
    }

    /// Exit contract: full success, partial success with skips, or hard
    /// failure when nothing could be applied despite candidates.
    pub fn exit_code(&self) -> i32 {
        if self.outcomes.is_empty() || self.skipped() == 0 {
            0
        } else if self.applied() > 0 {
            EXIT_PARTIAL
        } else {
            1
        }
    }

    /// Render the per-item outcome table.
    pub fn print(&self) {
        if self.outcomes.is_empty() {
            println!("{} no auto-fixable comments", "○".yellow());
        }
        for outcome in &self.outcomes {
            let line = format!("  #{} {}", outcome.comment_id(), outcome.label());
            match outcome {
                FixOutcome::Applied { .. } => println!("{} {}", "✓".green(), line),
                _ => println!("{} {}", "-".yellow(), line),
            }
        }
        let suffix = if self.dry_run { " (dry run)" } else { "" };
        println!(
            "{} applied, {} skipped, {} untouched{suffix}",
            self.applied(),
            self.skipped(),
            self.untouched
        );
        if let Some(hash) = &self.commit {
            println!("committed as {hash}");
        }
    }
}

/// Per-item accept/reject gate for confirmation mode.
pub trait Confirmer {
    fn confirm(&self, description: &str) -> bool;
}

/// Accepts everything; used with `--auto`.
pub struct AlwaysConfirm;

impl Confirmer for AlwaysConfirm {
    fn confirm(&self, _description: &str) -> bool {
        true
    }
}

/// Asks on stdin, defaulting to no.
pub struct StdinConfirm;

impl Confirmer for StdinConfirm {
    fn confirm(&self, description: &str) -> bool {
        print!("{} {description} [y/N] ", "?".cyan());
        let _ = io::stdout().flush();
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line).is_err() {
            return false;
        }
        matches!(line.trim().to_lowercase().as_str(), "y" | "yes")
    }
}

/// A computed, not-yet-written replacement.
struct PlannedFix {
    comment_id: u64,
    path: String,
    line: u64,
    new_content: String,
    description: String,
}

pub struct Fixer<'a, H> {
    host: &'a H,
    config: &'a Config,
    project_dir: PathBuf,
}

impl<'a, H: HostClient> Fixer<'a, H> {
    pub fn new(host: &'a H, config: &'a Config, project_dir: &Path) -> Self {
        Self {
            host,
            config,
            project_dir: project_dir.to_path_buf(),
        }
    }

    /// Apply the auto-fixable items for a pull request.
    ///
    /// Uses the cached triage report when one exists, otherwise triages
    /// fresh. Never fails on a per-item basis; see [`FixOutcome`].
    pub fn apply<C: Confirmer>(
        &self,
        number: u64,
        options: &FixOptions,
        confirmer: &C,
    ) -> Result<FixReport> {
        let engine = TriageEngine::new(self.host, self.config, &self.project_dir);
        let report = match engine.cached(number)? {
            Some(report) => {
                info!(number, "using cached triage report");
                report
            }
            None => engine.triage(number)?,
        };

        let pr = self
            .host
            .find_pr_by_number(number)?
            .ok_or(DevflowError::BranchResolution {
                number,
                reason: "no open pull request with that number".to_string(),
            })?;

        if !options.dry_run && self.host.current_branch()? != pr.head_branch {
            self.host.checkout_branch(&pr.head_branch)?;
        }

        let mut outcomes = Vec::new();
        for item in report.auto_fixable() {
            let planned = match self.plan_fix(item) {
                Ok(planned) => planned,
                Err(outcome) => {
                    outcomes.push(outcome);
                    continue;
                }
            };

            if !options.auto && !confirmer.confirm(&planned.description) {
                outcomes.push(FixOutcome::SkippedRejected {
                    comment_id: item.comment.id,
                });
                continue;
            }

            if !options.dry_run {
                self.write_fix(&planned)?;
            }
            outcomes.push(FixOutcome::Applied {
                comment_id: item.comment.id,
                path: planned.path,
                line: planned.line,
                description: planned.description,
            });
        }

        let commit = if options.dry_run {
            None
        } else {
            self.finalize(number, &pr.head_branch, &outcomes)?
        };

        Ok(FixReport {
            pr_number: number,
            untouched: report.counts().total() - report.auto_fixable().count(),
            outcomes,
            commit,
            dry_run: options.dry_run,
        })
    }

    /// Compute the replacement for one item, verifying the anchor against
    /// the content recorded at triage time.
    fn plan_fix(&self, item: &TriagedComment) -> std::result::Result<PlannedFix, FixOutcome> {
        let comment_id = item.comment.id;
        let no_match = |reason: &str| FixOutcome::SkippedNoMatch {
            comment_id,
            reason: reason.to_string(),
        };

        let (Some(path), Some(line)) = (item.comment.path.clone(), item.comment.line) else {
            return Err(no_match("comment has no file anchor"));
        };
        let Some(fix) = &item.fix else {
            return Err(no_match("no mechanical fix recorded"));
        };

        let stale = FixOutcome::SkippedStale {
            comment_id,
            path: path.clone(),
            line,
        };

        let Ok(contents) = fs::read_to_string(self.project_dir.join(&path)) else {
            return Err(stale);
        };
        let Some(index) = line.checked_sub(1) else {
            return Err(stale);
        };
        let Some(current) = contents.lines().nth(index as usize) else {
            return Err(stale);
        };
        if let Some(anchor) = &item.anchor_content {
            if current != anchor {
                warn!(comment_id, path = %path, line, "anchor changed since triage");
                return Err(stale);
            }
        }

        let new_content = match fix {
            FixKind::Suggestion { replacement } => replacement.clone(),
            FixKind::Typo { from, to } => {
                let replaced = current.replace(from.as_str(), to);
                if replaced == current {
                    return Err(no_match("typo target not on anchored line"));
                }
                replaced
            }
            FixKind::Whitespace => {
                let collapsed = collapse_whitespace(current);
                if collapsed == current {
                    return Err(no_match("no extra whitespace on anchored line"));
                }
                collapsed
            }
            FixKind::Semicolon => {
                let trimmed = current.trim_end();
                if trimmed.ends_with([';', '{', '}', ':']) {
                    return Err(no_match("line already terminated"));
                }
                format!("{trimmed};")
            }
        };

        Ok(PlannedFix {
            comment_id,
            path,
            line,
            new_content,
            description: fix.describe(),
        })
    }

    fn write_fix(&self, planned: &PlannedFix) -> Result<()> {
        let path = self.project_dir.join(&planned.path);
        let contents = fs::read_to_string(&path)?;
        let had_trailing_newline = contents.ends_with('\n');

        let mut lines: Vec<String> = contents.lines().map(str::to_string).collect();
        let index = (planned.line - 1) as usize;
        if index >= lines.len() {
            return Err(DevflowError::StaleAnchor {
                comment_id: planned.comment_id,
                path: planned.path.clone(),
                line: planned.line,
            });
        }
        lines[index] = planned.new_content.clone();

        let mut output = lines.join("\n");
        if had_trailing_newline {
            output.push('\n');
        }
        fs::write(&path, output)?;
        Ok(())
    }

    /// Commit the batch, push, and reply to every applied comment.
    fn finalize(
        &self,
        number: u64,
        branch: &str,
        outcomes: &[FixOutcome],
    ) -> Result<Option<String>> {
        let applied: Vec<&FixOutcome> = outcomes
            .iter()
            .filter(|o| matches!(o, FixOutcome::Applied { .. }))
            .collect();
        if applied.is_empty() {
            return Ok(None);
        }

        let message = match applied.as_slice() {
            [FixOutcome::Applied { description, .. }] => format!("fix: {description}"),
            _ => format!("fix: address {} review comments", applied.len()),
        };
        let hash = self.host.commit_all(&message)?;
        self.host.push(branch)?;
        info!(number, hash = %hash, count = applied.len(), "fix batch committed");

        for outcome in applied {
            self.host.reply_to_comment(
                number,
                outcome.comment_id(),
                &format!("Fixed in commit {hash}"),
            )?;
        }
        Ok(Some(hash))
    }
}

fn collapse_whitespace(line: &str) -> String {
    let mut collapsed = String::with_capacity(line.len());
    let mut in_leading = true;
    let mut prev_space = false;
    for ch in line.chars() {
        if ch == ' ' {
            if in_leading {
                collapsed.push(ch);
            } else if !prev_space {
                collapsed.push(' ');
            }
            prev_space = !in_leading;
        } else {
            in_leading = false;
            prev_space = false;
            collapsed.push(ch);
        }
    }
    collapsed.trim_end().to_string()
}
