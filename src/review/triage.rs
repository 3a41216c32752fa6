//! Review triage.
//!
//! Fetches and classifies the comments on a pull request, caches the
//! resulting report as JSON and renders three markdown artifacts: the full
//! report, a fix-prompt document for complex items and a reply-suggestion
//! document for discussions. Artifacts are write-once per run; re-running
//! overwrites them.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::Config;
use crate::error::{DevflowError, Result};
use crate::ports::HostClient;
use crate::review::{classify, Classification, ReviewComment, TriageReport, TriagedComment};
use crate::store::StateStore;

pub struct TriageEngine<'a, H> {
    host: &'a H,
    config: &'a Config,
    project_dir: PathBuf,
    store: StateStore,
}

impl<'a, H: HostClient> TriageEngine<'a, H> {
    pub fn new(host: &'a H, config: &'a Config, project_dir: &Path) -> Self {
        Self {
            host,
            config,
            project_dir: project_dir.to_path_buf(),
            store: StateStore::new(project_dir),
        }
    }

    /// Classify every comment on the pull request, cache the report and
    /// render the markdown artifacts.
    pub fn triage(&self, number: u64) -> Result<TriageReport> {
        let pr = self
            .host
            .find_pr_by_number(number)?
            .ok_or(DevflowError::PrNotFound { number })?;

        let raw = self.host.list_comments(number)?;
        info!(number, count = raw.len(), "fetched review comments");

        let mut comments = Vec::with_capacity(raw.len());
        for raw_comment in raw {
            let comment = ReviewComment::from_raw(raw_comment);
            let (classification, fix) = classify(&comment, &self.config.review);
            debug!(
                comment_id = comment.id,
                %classification,
                "classified comment"
            );

            let anchor_content = if classification == Classification::AutoFixable {
                self.read_anchor(&comment)
            } else {
                None
            };
            let draft_reply = (classification == Classification::Discussion)
                .then(|| draft_reply(&comment));

            comments.push(TriagedComment {
                comment,
                classification,
                fix,
                anchor_content,
                draft_reply,
            });
        }

        let report = TriageReport {
            pr_number: pr.number,
            pr_title: pr.title,
            pr_url: pr.url,
            head_branch: pr.head_branch,
            generated_at: chrono::Utc::now(),
            comments,
        };

        self.store.save(&self.store.review_path(number), &report)?;
        self.render_artifacts(&report)?;
        Ok(report)
    }

    /// Load the cached report from a previous triage run, if any.
    pub fn cached(&self, number: u64) -> Result<Option<TriageReport>> {
        self.store.load(&self.store.review_path(number))
    }

    /// Capture the anchored line as it reads right now, so the fixer can
    /// detect edits made after triage.
    fn read_anchor(&self, comment: &ReviewComment) -> Option<String> {
        let path = comment.path.as_deref()?;
        let line = comment.line?;
        let contents = fs::read_to_string(self.project_dir.join(path)).ok()?;
        contents
            .lines()
            .nth(line.checked_sub(1)? as usize)
            .map(str::to_string)
    }

    fn render_artifacts(&self, report: &TriageReport) -> Result<()> {
        let dir = self.store.review_artifact_dir(report.pr_number);
        fs::create_dir_all(&dir)?;

        fs::write(dir.join("review.md"), render_review(report))?;

        let counts = report.counts();
        if counts.auto_fixable + counts.simple + counts.complex > 0 {
            fs::write(dir.join("fixes.md"), render_fixes(report))?;
        }
        if counts.discussion > 0 {
            fs::write(dir.join("discussions.md"), render_discussions(report))?;
        }

        info!(number = report.pr_number, dir = %dir.display(), "triage artifacts written");
        Ok(())
    }
}

fn draft_reply(comment: &ReviewComment) -> String {
    let excerpt: String = comment.body.chars().take(100).collect();
    format!("> {excerpt}\n\n_[Write your reply here]_")
}

fn location(comment: &ReviewComment) -> String {
    match (&comment.path, comment.line) {
        (Some(path), Some(line)) => format!("`{path}:{line}`"),
        (Some(path), None) => format!("`{path}`"),
        _ => "general comment".to_string(),
    }
}

fn render_review(report: &TriageReport) -> String {
    let counts = report.counts();
    let mut lines = vec![
        format!("# Review: PR #{}", report.pr_number),
        String::new(),
        format!("**{}**", report.pr_title),
        String::new(),
        format!("[View PR]({})", report.pr_url),
        String::new(),
        "| Category | Count | Action |".to_string(),
        "|----------|-------|--------|".to_string(),
        format!(
            "| Auto-fixable | {} | `devflow pr fix {} --auto` |",
            counts.auto_fixable, report.pr_number
        ),
        format!("| Simple | {} | quick manual fixes |", counts.simple),
        format!("| Complex | {} | assistant prompts in fixes.md |", counts.complex),
        format!("| Discussion | {} | replies in discussions.md |", counts.discussion),
        String::new(),
        format!("**Total:** {} comments", counts.total()),
        String::new(),
    ];
    for item in &report.comments {
        lines.push(format!(
            "- [{}] {} by @{}: {}",
            item.classification,
            location(&item.comment),
            item.comment.author,
            first_line(&item.comment.body),
        ));
    }
    lines.push(String::new());
    lines.join("\n")
}

fn render_fixes(report: &TriageReport) -> String {
    let mut lines = vec![format!("# Fixes Needed: PR #{}", report.pr_number), String::new()];

    let section = |title: &str, classification: Classification, lines: &mut Vec<String>| {
        let items: Vec<&TriagedComment> = report
            .comments
            .iter()
            .filter(|c| c.classification == classification)
            .collect();
        if items.is_empty() {
            return;
        }
        lines.push(format!("## {title}"));
        lines.push(String::new());
        for item in items {
            lines.push(format!("### {} (@{})", location(&item.comment), item.comment.author));
            lines.push(String::new());
            lines.push(format!("> {}", first_line(&item.comment.body)));
            lines.push(String::new());
            if let Some(fix) = &item.fix {
                lines.push(format!("**Planned fix:** {}", fix.describe()));
                lines.push(String::new());
            }
            if classification == Classification::Complex {
                lines.push("**Assistant prompt:**".to_string());
                lines.push("```".to_string());
                lines.push(format!(
                    "Fix this review comment in {}: \"{}\"",
                    item.comment.path.as_deref().unwrap_or("the code"),
                    first_line(&item.comment.body),
                ));
                lines.push("```".to_string());
                lines.push(String::new());
            }
        }
    };

    section("Auto-fixable", Classification::AutoFixable, &mut lines);
    section("Simple", Classification::Simple, &mut lines);
    section("Complex", Classification::Complex, &mut lines);
    lines.join("\n")
}

fn render_discussions(report: &TriageReport) -> String {
    let mut lines = vec![
        format!("# Discussions: PR #{}", report.pr_number),
        String::new(),
        "_Review and customize replies before posting._".to_string(),
        String::new(),
    ];
    for item in report.discussions() {
        lines.push(format!("### @{}", item.comment.author));
        lines.push(String::new());
        lines.push(format!("> {}", first_line(&item.comment.body)));
        lines.push(String::new());
        if let Some(draft) = &item.draft_reply {
            lines.push(draft.clone());
            lines.push(String::new());
        }
    }
    lines.join("\n")
}

fn first_line(body: &str) -> &str {
    body.lines().next().unwrap_or_default()
}
