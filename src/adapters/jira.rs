//! Jira adapter over `curl`.
//!
//! Talks to the REST v2 API with basic auth. Status names are matched
//! against the transitions the tracker actually offers, so any workflow
//! naming works as long as the configured strings line up.

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::adapters::{ensure_tool, run_tool};
use crate::config::TrackerConfig;
use crate::error::{DevflowError, Result};
use crate::ports::{TaskData, TrackerClient};

/// Stand-in tracker for runs with tracker calls disabled. The orchestrator
/// never calls it in that mode; it exists to satisfy the port.
pub struct NullTracker;

impl TrackerClient for NullTracker {
    fn fetch_task(&self, key: &str) -> Result<TaskData> {
        Ok(TaskData::synthetic(key))
    }

    fn update_status(&self, _key: &str, _status: &str) -> Result<bool> {
        Ok(false)
    }
}

pub struct JiraClient {
    config: TrackerConfig,
}

impl JiraClient {
    pub fn new(config: &TrackerConfig) -> Result<Self> {
        ensure_tool("curl")?;
        if !config.has_credentials() {
            return Err(DevflowError::config(
                "tracker credentials missing: set JIRA_SERVER, JIRA_EMAIL and JIRA_API_TOKEN",
            ));
        }
        Ok(Self {
            config: config.clone(),
        })
    }

    fn api_get(&self, path: &str, operation: &str) -> Result<Value> {
        let url = format!("{}/rest/api/2/{path}", self.config.server);
        let auth = format!("{}:{}", self.config.email, self.config.api_token);
        let output = run_tool(
            "curl",
            &["-s", "-u", &auth, "-H", "Accept: application/json", &url],
            None,
            operation,
        )?;
        serde_json::from_str(&output).map_err(|e| {
            DevflowError::external("jira", operation, format!("unparseable response: {e}"))
        })
    }

    fn api_post(&self, path: &str, body: &Value, operation: &str) -> Result<()> {
        let url = format!("{}/rest/api/2/{path}", self.config.server);
        let auth = format!("{}:{}", self.config.email, self.config.api_token);
        let payload = body.to_string();
        run_tool(
            "curl",
            &[
                "-s",
                "-u",
                &auth,
                "-X",
                "POST",
                "-H",
                "Content-Type: application/json",
                "-d",
                &payload,
                &url,
            ],
            None,
            operation,
        )?;
        Ok(())
    }
}

impl TrackerClient for JiraClient {
    fn fetch_task(&self, key: &str) -> Result<TaskData> {
        let operation = format!("fetch {key}");
        let response = self.api_get(
            &format!("issue/{key}?fields=summary,description,issuetype,priority"),
            &operation,
        )?;

        if response.get("errorMessages").is_some() {
            return Err(DevflowError::task_not_found(key));
        }

        let fields = response
            .get("fields")
            .ok_or_else(|| DevflowError::external("jira", &operation, "response has no fields"))?;

        let summary = str_field(fields, "summary").unwrap_or_default();
        let description = str_field(fields, "description").unwrap_or_default();
        let acceptance_criteria = parse_acceptance_criteria(&description);
        debug!(key, criteria = acceptance_criteria.len(), "fetched issue");

        Ok(TaskData {
            key: key.to_string(),
            summary,
            acceptance_criteria,
            description,
            issue_type: nested_name(fields, "issuetype").unwrap_or_else(|| "Story".to_string()),
            priority: nested_name(fields, "priority").unwrap_or_else(|| "Medium".to_string()),
            url: format!("{}/browse/{key}", self.config.server),
        })
    }

    fn update_status(&self, key: &str, status: &str) -> Result<bool> {
        let operation = format!("transition {key}");
        let response = self.api_get(&format!("issue/{key}/transitions"), &operation)?;
        if response.get("errorMessages").is_some() {
            return Err(DevflowError::task_not_found(key));
        }

        let Some(id) = find_transition(&response, status) else {
            warn!(key, status, "no matching transition offered by the tracker");
            return Ok(false);
        };

        self.api_post(
            &format!("issue/{key}/transitions"),
            &json!({ "transition": { "id": id } }),
            &operation,
        )?;
        Ok(true)
    }
}

fn str_field(fields: &Value, name: &str) -> Option<String> {
    fields.get(name)?.as_str().map(str::to_string)
}

fn nested_name(fields: &Value, name: &str) -> Option<String> {
    fields.get(name)?.get("name")?.as_str().map(str::to_string)
}

/// Pick the transition whose own name or target status matches, case
/// insensitively.
fn find_transition(response: &Value, status: &str) -> Option<String> {
    let transitions = response.get("transitions")?.as_array()?;
    for transition in transitions {
        let own = transition.get("name").and_then(Value::as_str);
        let target = transition
            .get("to")
            .and_then(|to| to.get("name"))
            .and_then(Value::as_str);
        if own.is_some_and(|n| n.eq_ignore_ascii_case(status))
            || target.is_some_and(|n| n.eq_ignore_ascii_case(status))
        {
            return transition
                .get("id")
                .and_then(Value::as_str)
                .map(str::to_string);
        }
    }
    None
}

/// Extract acceptance criteria from a description.
///
/// Prefers lines under an "Acceptance Criteria" style heading; falls back
/// to all bullet lines when no such section exists.
pub fn parse_acceptance_criteria(description: &str) -> Vec<String> {
    let mut criteria = Vec::new();
    let mut in_section = false;

    for line in description.lines() {
        let lower = line.trim().to_lowercase();
        if ["acceptance criteria", "ac:", "criteria:"]
            .iter()
            .any(|marker| lower.contains(marker))
        {
            in_section = true;
            continue;
        }

        // A new heading-like line ends the section.
        if in_section
            && !line.trim().is_empty()
            && !line.starts_with([' ', '-', '*', '\u{2022}', '\t'])
            && line.contains(':')
        {
            in_section = false;
            continue;
        }

        if in_section && !line.trim().is_empty() {
            let clean = clean_bullet(line);
            if !clean.is_empty() {
                criteria.push(clean);
            }
        }
    }

    if criteria.is_empty() {
        for line in description.lines() {
            let trimmed = line.trim();
            if trimmed.starts_with(['-', '*', '\u{2022}']) {
                let clean = clean_bullet(trimmed);
                if !clean.is_empty() {
                    criteria.push(clean);
                }
            }
        }
    }

    criteria
}

fn clean_bullet(line: &str) -> String {
    line.trim()
        .trim_start_matches(['-', '*', '\u{2022}'])
        .trim_start_matches(|c: char| c.is_ascii_digit() || c == '.')
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_criteria_from_section() {
        let description = "Some intro text\n\nAcceptance Criteria:\n- Limit is configurable\n- 429 on breach\n\nNotes:\nnot a criterion";
        assert_eq!(
            parse_acceptance_criteria(description),
            vec!["Limit is configurable".to_string(), "429 on breach".to_string()]
        );
    }

    #[test]
    fn test_parse_criteria_numbered_list() {
        let description = "AC:\n1. First thing\n2. Second thing";
        assert_eq!(
            parse_acceptance_criteria(description),
            vec!["First thing".to_string(), "Second thing".to_string()]
        );
    }

    #[test]
    fn test_parse_criteria_bullet_fallback() {
        let description = "No heading here\n- still a bullet\n* another one\nplain line";
        assert_eq!(
            parse_acceptance_criteria(description),
            vec!["still a bullet".to_string(), "another one".to_string()]
        );
    }

    #[test]
    fn test_parse_criteria_empty_description() {
        assert!(parse_acceptance_criteria("").is_empty());
    }

    #[test]
    fn test_find_transition_matches_name_or_target() {
        let response = json!({
            "transitions": [
                { "id": "11", "name": "Start Progress", "to": { "name": "In Progress" } },
                { "id": "21", "name": "In Review", "to": { "name": "In Review" } }
            ]
        });
        assert_eq!(find_transition(&response, "in progress"), Some("11".to_string()));
        assert_eq!(find_transition(&response, "In Review"), Some("21".to_string()));
        assert_eq!(find_transition(&response, "Done"), None);
    }
}
