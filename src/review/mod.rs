//! Review-comment triage and remediation.
//!
//! [`triage`] fetches the comments on a pull request, classifies each by
//! remediation complexity and writes a cached report plus human-facing
//! markdown artifacts. [`fixer`] consumes the auto-fixable portion of that
//! report and applies the mechanical fixes in one batched commit.

pub mod classify;
pub mod fixer;
pub mod triage;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ports::RawComment;

pub use classify::classify;
pub use fixer::{AlwaysConfirm, Confirmer, FixOptions, FixOutcome, FixReport, Fixer, StdinConfirm};
pub use triage::TriageEngine;

/// Reply markers that indicate a comment thread is already settled.
const RESOLVED_MARKERS: &[&str] = &[
    "fixed in commit",
    "fixed in ",
    "done",
    "resolved",
    "applied",
    "\u{2705}",
];

/// Remediation category for one review comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Narrow mechanical change, safe to apply without judgment
    AutoFixable,
    /// Small well-scoped change that still needs a human
    Simple,
    /// Multi-file, design-level or ambiguous; routed to the assistant
    Complex,
    /// Question, approval or commentary; wants a reply, not a fix
    Discussion,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Classification::AutoFixable => "auto-fixable",
            Classification::Simple => "simple",
            Classification::Complex => "complex",
            Classification::Discussion => "discussion",
        };
        write!(f, "{name}")
    }
}

/// The mechanical change class detected for an auto-fixable comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum FixKind {
    /// Replace the anchored line with an explicit suggestion block.
    Suggestion { replacement: String },
    /// Replace one identifier with another on the anchored line.
    Typo { from: String, to: String },
    /// Collapse repeated spaces and trailing whitespace.
    Whitespace,
    /// Append a missing trailing semicolon.
    Semicolon,
}

impl FixKind {
    /// One-line description for confirmation prompts and outcome tables.
    pub fn describe(&self) -> String {
        match self {
            FixKind::Suggestion { .. } => "apply suggested replacement".to_string(),
            FixKind::Typo { from, to } => format!("fix typo: `{from}` -> `{to}`"),
            FixKind::Whitespace => "remove extra whitespace".to_string(),
            FixKind::Semicolon => "add missing semicolon".to_string(),
        }
    }
}

/// Normalized review comment, immutable within one triage run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewComment {
    pub id: u64,
    pub author: String,
    pub body: String,
    pub path: Option<String>,
    pub line: Option<u64>,
    pub replies: Vec<String>,
    /// Content fingerprint, stable across runs for identical comments.
    pub fingerprint: String,
}

impl ReviewComment {
    pub fn from_raw(raw: RawComment) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(raw.id.to_le_bytes());
        hasher.update(raw.body.as_bytes());
        let fingerprint = hex::encode(&hasher.finalize()[..8]);

        Self {
            id: raw.id,
            author: raw.author,
            body: raw.body,
            path: raw.path,
            line: raw.line,
            replies: raw.replies,
            fingerprint,
        }
    }

    /// Whether the comment is anchored to a file and line.
    pub fn is_inline(&self) -> bool {
        self.path.is_some() && self.line.is_some()
    }

    /// Whether a reply in the thread already marks this settled.
    pub fn has_resolved_reply(&self) -> bool {
        self.replies.iter().any(|reply| {
            let lower = reply.to_lowercase();
            RESOLVED_MARKERS.iter().any(|marker| lower.contains(marker))
        })
    }
}

/// One comment with its derived classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriagedComment {
    pub comment: ReviewComment,
    pub classification: Classification,
    /// Present only for auto-fixable comments.
    pub fix: Option<FixKind>,
    /// The anchored source line as it read at triage time. The fixer
    /// compares against this to detect stale anchors.
    pub anchor_content: Option<String>,
    /// Suggested reply for discussion items.
    pub draft_reply: Option<String>,
}

/// Per-category counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCounts {
    pub auto_fixable: usize,
    pub simple: usize,
    pub complex: usize,
    pub discussion: usize,
}

impl CategoryCounts {
    pub fn total(&self) -> usize {
        self.auto_fixable + self.simple + self.complex + self.discussion
    }
}

/// Classification report for one pull request, cached between `pr triage`
/// and `pr fix`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageReport {
    pub pr_number: u64,
    pub pr_title: String,
    pub pr_url: String,
    pub head_branch: String,
    pub generated_at: DateTime<Utc>,
    pub comments: Vec<TriagedComment>,
}

impl TriageReport {
    pub fn counts(&self) -> CategoryCounts {
        let mut counts = CategoryCounts::default();
        for item in &self.comments {
            match item.classification {
                Classification::AutoFixable => counts.auto_fixable += 1,
                Classification::Simple => counts.simple += 1,
                Classification::Complex => counts.complex += 1,
                Classification::Discussion => counts.discussion += 1,
            }
        }
        counts
    }

    pub fn auto_fixable(&self) -> impl Iterator<Item = &TriagedComment> {
        self.comments
            .iter()
            .filter(|c| c.classification == Classification::AutoFixable)
    }

    pub fn discussions(&self) -> impl Iterator<Item = &TriagedComment> {
        self.comments
            .iter()
            .filter(|c| c.classification == Classification::Discussion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(id: u64, body: &str) -> RawComment {
        RawComment {
            id,
            author: "reviewer".into(),
            body: body.into(),
            path: Some("src/lib.rs".into()),
            line: Some(10),
            diff_hunk: None,
            replies: Vec::new(),
        }
    }

    #[test]
    fn test_fingerprint_is_stable_and_content_sensitive() {
        let a = ReviewComment::from_raw(raw(1, "typo here"));
        let b = ReviewComment::from_raw(raw(1, "typo here"));
        let c = ReviewComment::from_raw(raw(1, "different"));
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_ne!(a.fingerprint, c.fingerprint);
    }

    #[test]
    fn test_resolved_reply_detection() {
        let mut comment = raw(1, "please fix");
        comment.replies = vec!["Fixed in commit abc1234".into()];
        assert!(ReviewComment::from_raw(comment).has_resolved_reply());

        let mut comment = raw(2, "please fix");
        comment.replies = vec!["still looking into it".into()];
        assert!(!ReviewComment::from_raw(comment).has_resolved_reply());
    }

    #[test]
    fn test_counts_by_category() {
        let make = |classification| TriagedComment {
            comment: ReviewComment::from_raw(raw(1, "x")),
            classification,
            fix: None,
            anchor_content: None,
            draft_reply: None,
        };
        let report = TriageReport {
            pr_number: 42,
            pr_title: "t".into(),
            pr_url: "u".into(),
            head_branch: "b".into(),
            generated_at: Utc::now(),
            comments: vec![
                make(Classification::AutoFixable),
                make(Classification::Discussion),
                make(Classification::Discussion),
                make(Classification::Complex),
            ],
        };
        let counts = report.counts();
        assert_eq!(counts.auto_fixable, 1);
        assert_eq!(counts.discussion, 2);
        assert_eq!(counts.complex, 1);
        assert_eq!(counts.total(), 4);
    }
}
