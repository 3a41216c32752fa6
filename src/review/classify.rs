//! Comment classification.
//!
//! An ordered set of pure predicates over the normalized comment, evaluated
//! first-match-wins: discussion, then auto-fixable, then simple, then
//! complex as the catch-all. Classification is a deterministic function of
//! the comment text and anchor, so two runs over unchanged input always
//! agree.
//!
//! The line between auto-fixable and simple for suggestion blocks is a risk
//! threshold, not a fixed rule: a block with more replacement lines than
//! `ReviewConfig::auto_fix_max_lines` is demoted to a manual fix.

use std::sync::OnceLock;

use regex::Regex;

use crate::config::ReviewConfig;
use crate::review::{Classification, FixKind, ReviewComment};

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("hardcoded pattern compiles"))
}

fn question_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(
        &RE,
        r"(?i)(\?\s*$|^(why|what|how|should)\b|^(can|could)\s+you\b|\bexplain\b)",
    )
}

fn approval_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(
        &RE,
        r"(?i)(\blgtm\b|\bapproved?\b|\bship\s?it\b|\blooks?\s+good\b)",
    )
}

fn commentary_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(
        &RE,
        r"(?i)\b(consider|maybe|optional|fyi|thoughts|might\s+want)\b",
    )
}

fn suggestion_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"(?s)```suggestion[ \t]*\r?\n(.*?)\r?\n?```")
}

fn code_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"(?s)```\w*[ \t]*\r?\n(.*?)\r?\n?```")
}

fn typo_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(
        &RE,
        r#"[`'"]([A-Za-z0-9_]+)[`'"]\s*(?:\u{2192}|->|to|should\s+be)\s*[`'"]([A-Za-z0-9_]+)[`'"]"#,
    )
}

/// Words that mark a change as small enough to hand-fix quickly.
const SIMPLE_INDICATORS: &[&str] = &[
    "rename",
    "typo",
    "import",
    "semicolon",
    "comma",
    "bracket",
    "guard",
    "missing",
    "check",
    "spacing",
    "whitespace",
];

/// Assign a category and, when auto-fixable, the mechanical change class.
pub fn classify(comment: &ReviewComment, config: &ReviewConfig) -> (Classification, Option<FixKind>) {
    if is_discussion(comment) {
        return (Classification::Discussion, None);
    }
    if let Some(kind) = detect_fix(comment, config) {
        return (Classification::AutoFixable, Some(kind));
    }
    if is_simple(comment) {
        return (Classification::Simple, None);
    }
    (Classification::Complex, None)
}

/// Questions, approvals, settled threads and commentary with no concrete
/// suggested change.
pub fn is_discussion(comment: &ReviewComment) -> bool {
    if comment.has_resolved_reply() {
        return true;
    }
    let body = comment.body.trim();
    if approval_re().is_match(body) || question_re().is_match(body) {
        return true;
    }
    commentary_re().is_match(body) && !suggestion_block_re().is_match(body)
}

/// Detect a mechanical change class. Only inline comments qualify; without
/// a file and line anchor there is nothing to apply the change to.
pub fn detect_fix(comment: &ReviewComment, config: &ReviewConfig) -> Option<FixKind> {
    if !comment.is_inline() {
        return None;
    }

    if let Some(captures) = suggestion_block_re().captures(&comment.body) {
        let replacement = captures.get(1).map(|m| m.as_str())?.to_string();
        if replacement.lines().count() <= config.auto_fix_max_lines {
            return Some(FixKind::Suggestion { replacement });
        }
        return None;
    }

    let lower = comment.body.to_lowercase();
    if lower.contains("typo") || lower.contains("spelling") {
        if let Some(captures) = typo_re().captures(&comment.body) {
            let (from, to) = (captures.get(1)?, captures.get(2)?);
            return Some(FixKind::Typo {
                from: from.as_str().to_string(),
                to: to.as_str().to_string(),
            });
        }
    }

    if lower.contains("extra") && (lower.contains("whitespace") || lower.contains("space")) {
        return Some(FixKind::Whitespace);
    }

    if lower.contains("missing") && lower.contains("semicolon") {
        return Some(FixKind::Semicolon);
    }

    None
}

/// Small, well-scoped change: a short code block or a one-liner indicator,
/// anchored to a single file.
pub fn is_simple(comment: &ReviewComment) -> bool {
    if comment.path.is_none() {
        return false;
    }
    if let Some(captures) = code_block_re().captures(&comment.body) {
        if let Some(block) = captures.get(1) {
            if block.as_str().lines().count() <= 3 {
                return true;
            }
        }
    }
    let lower = comment.body.to_lowercase();
    SIMPLE_INDICATORS.iter().any(|word| lower.contains(word))
}
