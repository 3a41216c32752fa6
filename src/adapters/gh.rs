//! Repository host adapter over `git` and `gh`.
//!
//! Plain subprocess wrappers; `gh` handles everything that needs the
//! hosting service (PR lookup and creation, review comments, replies) so no
//! tokens are managed here.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::adapters::{ensure_tool, run_tool, run_tool_status};
use crate::config::GitConfig;
use crate::error::{DevflowError, Result};
use crate::ports::{HostClient, PullRequestInfo, RawComment};

pub struct GhClient {
    project_dir: PathBuf,
    remote: String,
}

impl GhClient {
    pub fn new(project_dir: &Path, config: &GitConfig) -> Result<Self> {
        ensure_tool("git")?;
        ensure_tool("gh")?;
        Ok(Self {
            project_dir: project_dir.to_path_buf(),
            remote: config.remote.clone(),
        })
    }

    fn git(&self, args: &[&str], operation: &str) -> Result<String> {
        run_tool("git", args, Some(&self.project_dir), operation)
    }

    fn gh(&self, args: &[&str], operation: &str) -> Result<String> {
        run_tool("gh", args, Some(&self.project_dir), operation)
    }

    fn pr_view(&self, selector: &str) -> Result<Option<PullRequestInfo>> {
        let (ok, output) = run_tool_status(
            "gh",
            &[
                "pr",
                "view",
                selector,
                "--json",
                "number,title,url,state,headRefName",
            ],
            Some(&self.project_dir),
            "pr view",
        )?;
        if !ok {
            // gh exits non-zero when no PR matches the selector.
            return Ok(None);
        }
        parse_pr_view(&output)
    }
}

impl HostClient for GhClient {
    fn current_branch(&self) -> Result<String> {
        self.git(&["rev-parse", "--abbrev-ref", "HEAD"], "current branch")
    }

    fn default_branch(&self) -> Result<String> {
        let (ok, output) = run_tool_status(
            "git",
            &["symbolic-ref", "--short", "refs/remotes/origin/HEAD"],
            Some(&self.project_dir),
            "default branch",
        )?;
        if ok {
            if let Some(name) = output.strip_prefix("origin/") {
                return Ok(name.to_string());
            }
        }
        Ok("main".to_string())
    }

    fn branch_exists(&self, name: &str) -> Result<bool> {
        let (local, _) = run_tool_status(
            "git",
            &["rev-parse", "--verify", "--quiet", name],
            Some(&self.project_dir),
            "branch exists",
        )?;
        if local {
            return Ok(true);
        }
        let (_, remote) = run_tool_status(
            "git",
            &["ls-remote", "--heads", &self.remote, name],
            Some(&self.project_dir),
            "branch exists",
        )?;
        Ok(!remote.is_empty())
    }

    fn create_branch(&self, name: &str) -> Result<()> {
        self.git(&["checkout", "-b", name], "create branch")?;
        Ok(())
    }

    fn checkout_branch(&self, name: &str) -> Result<()> {
        self.git(&["checkout", name], "checkout branch")?;
        Ok(())
    }

    fn has_uncommitted_changes(&self) -> Result<bool> {
        let status = self.git(&["status", "--porcelain"], "status")?;
        Ok(!status.is_empty())
    }

    fn commit_all(&self, message: &str) -> Result<String> {
        self.git(&["add", "-A"], "stage changes")?;
        self.git(&["commit", "-m", message], "commit")?;
        self.git(&["rev-parse", "--short", "HEAD"], "commit hash")
    }

    fn push(&self, branch: &str) -> Result<()> {
        self.git(&["push", "-u", &self.remote, branch], "push")?;
        Ok(())
    }

    fn create_pr(&self, branch: &str, title: &str, body: &str, draft: bool) -> Result<String> {
        let mut args = vec![
            "pr", "create", "--head", branch, "--title", title, "--body", body,
        ];
        if draft {
            args.push("--draft");
        }
        let output = self.gh(&args, "pr create")?;
        // gh prints the PR url as the last output line.
        Ok(output.lines().last().unwrap_or_default().to_string())
    }

    fn find_open_pr(&self, branch: &str) -> Result<Option<PullRequestInfo>> {
        self.pr_view(branch)
    }

    fn find_pr_by_number(&self, number: u64) -> Result<Option<PullRequestInfo>> {
        self.pr_view(&number.to_string())
    }

    fn list_comments(&self, number: u64) -> Result<Vec<RawComment>> {
        let review_json = self.gh(
            &[
                "api",
                &format!("repos/{{owner}}/{{repo}}/pulls/{number}/comments"),
            ],
            "list review comments",
        )?;
        let issue_json = self.gh(
            &[
                "api",
                &format!("repos/{{owner}}/{{repo}}/issues/{number}/comments"),
            ],
            "list issue comments",
        )?;
        let comments = fold_comments(&review_json, &issue_json)?;
        debug!(number, count = comments.len(), "listed comments");
        Ok(comments)
    }

    fn reply_to_comment(&self, number: u64, comment_id: u64, body: &str) -> Result<()> {
        self.gh(
            &[
                "api",
                &format!("repos/{{owner}}/{{repo}}/pulls/{number}/comments/{comment_id}/replies"),
                "-f",
                &format!("body={body}"),
            ],
            "reply to comment",
        )?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct PrView {
    number: u64,
    title: String,
    url: String,
    state: String,
    #[serde(rename = "headRefName")]
    head_ref_name: String,
}

fn parse_pr_view(json: &str) -> Result<Option<PullRequestInfo>> {
    let view: PrView = serde_json::from_str(json)
        .map_err(|e| DevflowError::external("gh", "pr view", format!("unparseable output: {e}")))?;
    if view.state != "OPEN" {
        return Ok(None);
    }
    Ok(Some(PullRequestInfo {
        number: view.number,
        title: view.title,
        url: view.url,
        head_branch: view.head_ref_name,
    }))
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct ApiReviewComment {
    id: u64,
    user: ApiUser,
    body: String,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    line: Option<u64>,
    #[serde(default)]
    original_line: Option<u64>,
    #[serde(default)]
    diff_hunk: Option<String>,
    #[serde(default)]
    in_reply_to_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ApiIssueComment {
    id: u64,
    user: ApiUser,
    body: String,
}

/// Normalize the two comment feeds: inline review comments with replies
/// folded into their parent thread, then general PR comments.
fn fold_comments(review_json: &str, issue_json: &str) -> Result<Vec<RawComment>> {
    let parse_err =
        |e| DevflowError::external("gh", "list comments", format!("unparseable output: {e}"));
    let review: Vec<ApiReviewComment> = serde_json::from_str(review_json).map_err(parse_err)?;
    let issue: Vec<ApiIssueComment> = serde_json::from_str(issue_json).map_err(parse_err)?;

    let mut comments: Vec<RawComment> = review
        .iter()
        .filter(|c| c.in_reply_to_id.is_none())
        .map(|c| RawComment {
            id: c.id,
            author: c.user.login.clone(),
            body: c.body.clone(),
            path: c.path.clone(),
            line: c.line.or(c.original_line),
            diff_hunk: c.diff_hunk.clone(),
            replies: Vec::new(),
        })
        .collect();

    for reply in review.iter().filter(|c| c.in_reply_to_id.is_some()) {
        if let Some(parent) = comments
            .iter_mut()
            .find(|c| Some(c.id) == reply.in_reply_to_id)
        {
            parent.replies.push(reply.body.clone());
        }
    }

    comments.extend(issue.into_iter().map(|c| RawComment {
        id: c.id,
        author: c.user.login,
        body: c.body,
        path: None,
        line: None,
        diff_hunk: None,
        replies: Vec::new(),
    }));

    Ok(comments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pr_view_open() {
        let json = r#"{"number":42,"title":"PBI-1: rate limiting","url":"https://example.test/pull/42","state":"OPEN","headRefName":"feature/PBI-1"}"#;
        let pr = parse_pr_view(json).unwrap().unwrap();
        assert_eq!(pr.number, 42);
        assert_eq!(pr.head_branch, "feature/PBI-1");
    }

    #[test]
    fn test_parse_pr_view_closed_is_none() {
        let json = r#"{"number":42,"title":"t","url":"u","state":"MERGED","headRefName":"b"}"#;
        assert!(parse_pr_view(json).unwrap().is_none());
    }

    #[test]
    fn test_fold_comments_merges_replies_and_issue_comments() {
        let review = r#"[
            {"id":1,"user":{"login":"alice"},"body":"typo here","path":"src/a.rs","line":3,"diff_hunk":"@@"},
            {"id":2,"user":{"login":"bob"},"body":"Fixed in commit abc","in_reply_to_id":1},
            {"id":3,"user":{"login":"alice"},"body":"missing guard","path":"src/b.rs","original_line":9}
        ]"#;
        let issue = r#"[{"id":9,"user":{"login":"carol"},"body":"Overall looks fine"}]"#;

        let comments = fold_comments(review, issue).unwrap();
        assert_eq!(comments.len(), 3);
        assert_eq!(comments[0].replies, vec!["Fixed in commit abc".to_string()]);
        assert_eq!(comments[1].line, Some(9));
        assert_eq!(comments[2].author, "carol");
        assert!(comments[2].path.is_none());
    }

    #[test]
    fn test_fold_comments_empty_feeds() {
        assert!(fold_comments("[]", "[]").unwrap().is_empty());
    }
}
