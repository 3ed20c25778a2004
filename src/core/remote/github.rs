//! GitHub tracker backed by the `gh` CLI
//!
//! REST calls go through `gh api <path>` and Projects (v2) calls through
//! `gh api graphql`; request bodies are passed as JSON on stdin, so no user
//! text is ever interpolated into a command line. The token comes from the
//! configured environment variable and is handed to `gh` as `GH_TOKEN`.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{
    IssueDraft, IssueState, IssueTracker, PrState, PullRequestDraft, PullRequestInfo, RemoteIssue,
    TrackerError,
};
use crate::core::config::GitHubConfig;

/// Tracker client for a single GitHub repository
pub struct GhClient {
    owner: String,
    repo: String,
    token: Option<String>,
    repo_root: PathBuf,
}

impl GhClient {
    pub fn new(owner: &str, repo: &str, repo_root: &Path) -> Self {
        Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            token: None,
            repo_root: repo_root.to_path_buf(),
        }
    }

    /// Build a client from configuration
    pub fn from_config(config: &GitHubConfig, repo_root: &Path) -> Result<Self, TrackerError> {
        let (Some(owner), Some(repo)) = (&config.owner, &config.repo) else {
            return Err(TrackerError::NotConfigured(
                "set github.owner and github.repo in .spectrack/config.yaml".to_string(),
            ));
        };
        Ok(Self::new(owner, repo, repo_root).with_token(config.token()))
    }

    /// Use an explicit token instead of gh's stored credentials
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    fn repo_path(&self, rest: &str) -> String {
        format!("repos/{}/{}/{}", self.owner, self.repo, rest)
    }

    /// Run `gh api` with optional JSON body on stdin; returns stdout
    fn api(&self, method: &str, path: &str, body: Option<&Value>) -> Result<String, TrackerError> {
        let mut args = vec!["api", "-X", method, path, "-H", "Accept: application/vnd.github+json"];
        if body.is_some() {
            args.extend(["--input", "-"]);
        }
        debug!(method, path, "gh api");

        let mut cmd = Command::new("gh");
        cmd.args(&args)
            .current_dir(&self.repo_root)
            .stdin(if body.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(token) = &self.token {
            cmd.env("GH_TOKEN", token);
        }

        let mut child = cmd.spawn().map_err(launch_error)?;

        if let Some(body) = body {
            write_stdin(&mut child, body.to_string().as_bytes())?;
        }

        let output = child.wait_with_output()?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
            Err(TrackerError::CommandFailed {
                message: if stderr.is_empty() { stdout } else { stderr },
            })
        }
    }

    /// GET every page of a REST list endpoint
    fn api_paginated(&self, path: &str) -> Result<String, TrackerError> {
        debug!(path, "gh api --paginate");
        let mut cmd = Command::new("gh");
        cmd.args(["api", "--paginate", path, "-H", "Accept: application/vnd.github+json"])
            .current_dir(&self.repo_root);
        if let Some(token) = &self.token {
            cmd.env("GH_TOKEN", token);
        }
        let output = cmd.output().map_err(launch_error)?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Err(TrackerError::CommandFailed {
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    /// Run a GraphQL request and return its `data` object
    fn graphql(&self, query: &str, variables: Value) -> Result<Value, TrackerError> {
        let body = json!({ "query": query, "variables": variables });
        let out = self.api("POST", "graphql", Some(&body))?;
        graphql_data(&out)
    }

    /// Look up a board's id and its single-select fields
    fn project(&self, project_number: u64) -> Result<ProjectBoard, TrackerError> {
        let data = self.graphql(
            PROJECT_QUERY,
            json!({ "owner": self.owner, "number": project_number }),
        )?;
        parse_project(&data, project_number)
    }
}

fn launch_error(e: std::io::Error) -> TrackerError {
    match e.kind() {
        std::io::ErrorKind::NotFound => TrackerError::CliNotFound {
            cli: "gh".to_string(),
            install_url: "https://cli.github.com".to_string(),
        },
        _ => TrackerError::IoError(e),
    }
}

/// Send `data` to the child's stdin and close it
///
/// On a failed write the child is killed and reaped before the error is returned.
fn write_stdin(child: &mut Child, data: &[u8]) -> std::io::Result<()> {
    let Some(mut stdin) = child.stdin.take() else {
        return Ok(());
    };
    if let Err(e) = stdin.write_all(data) {
        drop(stdin);
        let _ = child.kill();
        let _ = child.wait();
        return Err(e);
    }
    Ok(())
}

const PROJECT_QUERY: &str = r#"query($owner: String!, $number: Int!) {
  repositoryOwner(login: $owner) {
    ... on ProjectV2Owner {
      projectV2(number: $number) {
        id
        fields(first: 50) {
          nodes {
            ... on ProjectV2SingleSelectField { id name options { id name } }
          }
        }
      }
    }
  }
}"#;

const ADD_ITEM_MUTATION: &str = r#"mutation($project: ID!, $content: ID!) {
  addProjectV2ItemById(input: {projectId: $project, contentId: $content}) { item { id } }
}"#;

const SET_FIELD_MUTATION: &str = r#"mutation($project: ID!, $item: ID!, $field: ID!, $option: String!) {
  updateProjectV2ItemFieldValue(input: {
    projectId: $project, itemId: $item, fieldId: $field,
    value: {singleSelectOptionId: $option}
  }) { projectV2Item { id } }
}"#;

impl IssueTracker for GhClient {
    fn create_issue(&self, draft: &IssueDraft) -> Result<RemoteIssue, TrackerError> {
        let body = json!({ "title": draft.title, "body": draft.body, "labels": draft.labels });
        let out = self.api("POST", &self.repo_path("issues"), Some(&body))?;
        parse_issue(&out)
    }

    fn update_issue(
        &self,
        number: u64,
        draft: &IssueDraft,
        state: IssueState,
    ) -> Result<RemoteIssue, TrackerError> {
        let body = json!({
            "title": draft.title,
            "body": draft.body,
            "labels": draft.labels,
            "state": state.as_str(),
        });
        let out = self.api(
            "PATCH",
            &self.repo_path(&format!("issues/{}", number)),
            Some(&body),
        )?;
        parse_issue(&out)
    }

    fn get_issue(&self, number: u64) -> Result<RemoteIssue, TrackerError> {
        let out = self.api("GET", &self.repo_path(&format!("issues/{}", number)), None)?;
        parse_issue(&out)
    }

    fn list_issues(&self, label: Option<&str>) -> Result<Vec<RemoteIssue>, TrackerError> {
        let mut path = self.repo_path("issues?state=all&per_page=100");
        if let Some(label) = label {
            path.push_str("&labels=");
            path.push_str(&label.replace(':', "%3A"));
        }
        let out = self.api_paginated(&path)?;
        parse_issue_list(&out)
    }

    fn create_comment(&self, number: u64, body: &str) -> Result<(), TrackerError> {
        self.api(
            "POST",
            &self.repo_path(&format!("issues/{}/comments", number)),
            Some(&json!({ "body": body })),
        )?;
        Ok(())
    }

    fn add_project_item(
        &self,
        project_number: u64,
        node_id: &str,
    ) -> Result<String, TrackerError> {
        let board = self.project(project_number)?;
        let data = self.graphql(
            ADD_ITEM_MUTATION,
            json!({ "project": board.id, "content": node_id }),
        )?;
        data.pointer("/addProjectV2ItemById/item/id")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| TrackerError::ParseError {
                message: "missing item id in addProjectV2ItemById response".to_string(),
            })
    }

    fn set_project_field(
        &self,
        project_number: u64,
        item_id: &str,
        field: &str,
        value: &str,
    ) -> Result<(), TrackerError> {
        let board = self.project(project_number)?;
        let (field_id, option_id) = board.option(field, value)?;
        self.graphql(
            SET_FIELD_MUTATION,
            json!({ "project": board.id, "item": item_id, "field": field_id, "option": option_id }),
        )?;
        Ok(())
    }

    fn create_pull_request(
        &self,
        draft: &PullRequestDraft,
    ) -> Result<PullRequestInfo, TrackerError> {
        let body = json!({
            "title": draft.title,
            "body": draft.body,
            "head": draft.head,
            "base": draft.base,
        });
        let out = self.api("POST", &self.repo_path("pulls"), Some(&body))?;
        parse_pull_request(&out)
    }

    fn get_pull_request(&self, number: u64) -> Result<PullRequestInfo, TrackerError> {
        let out = self.api("GET", &self.repo_path(&format!("pulls/{}", number)), None)?;
        parse_pull_request(&out)
    }
}

// =========================================================================
// Response parsing
// =========================================================================

#[derive(Deserialize)]
struct GhIssue {
    id: u64,
    node_id: String,
    number: u64,
    title: String,
    body: Option<String>,
    state: String,
    html_url: String,
    #[serde(default)]
    labels: Vec<GhLabel>,
    /// Present when the item is a pull request
    #[serde(default)]
    pull_request: Option<Value>,
}

#[derive(Deserialize)]
struct GhLabel {
    name: String,
}

impl From<GhIssue> for RemoteIssue {
    fn from(issue: GhIssue) -> Self {
        RemoteIssue {
            id: issue.id,
            node_id: issue.node_id,
            number: issue.number,
            title: issue.title,
            body: issue.body,
            state: if issue.state.eq_ignore_ascii_case("closed") {
                IssueState::Closed
            } else {
                IssueState::Open
            },
            url: issue.html_url,
            labels: issue.labels.into_iter().map(|l| l.name).collect(),
        }
    }
}

fn parse_error(e: serde_json::Error) -> TrackerError {
    TrackerError::ParseError {
        message: e.to_string(),
    }
}

fn parse_issue(json: &str) -> Result<RemoteIssue, TrackerError> {
    let issue: GhIssue = serde_json::from_str(json).map_err(parse_error)?;
    Ok(issue.into())
}

/// Parse issue list output, one JSON array per page, skipping pull requests
fn parse_issue_list(json: &str) -> Result<Vec<RemoteIssue>, TrackerError> {
    let mut issues = Vec::new();
    for page in serde_json::Deserializer::from_str(json).into_iter::<Vec<GhIssue>>() {
        issues.extend(
            page.map_err(parse_error)?
                .into_iter()
                .filter(|issue| issue.pull_request.is_none())
                .map(RemoteIssue::from),
        );
    }
    Ok(issues)
}

fn parse_pull_request(json: &str) -> Result<PullRequestInfo, TrackerError> {
    #[derive(Deserialize)]
    struct GhPull {
        number: u64,
        html_url: String,
        state: String,
        merged_at: Option<DateTime<Utc>>,
    }

    let pr: GhPull = serde_json::from_str(json).map_err(parse_error)?;
    let state = match (pr.merged_at.is_some(), pr.state.to_lowercase().as_str()) {
        (true, _) => PrState::Merged,
        (false, "closed") => PrState::Closed,
        _ => PrState::Open,
    };
    Ok(PullRequestInfo {
        number: pr.number,
        url: pr.html_url,
        state,
        merged_at: pr.merged_at,
    })
}

/// Extract `data` from a GraphQL response, surfacing `errors` as a failure
fn graphql_data(json: &str) -> Result<Value, TrackerError> {
    let mut value: Value = serde_json::from_str(json).map_err(parse_error)?;
    if let Some(errors) = value.get("errors").and_then(Value::as_array) {
        if !errors.is_empty() {
            let message = errors
                .iter()
                .filter_map(|e| e.get("message").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(TrackerError::CommandFailed { message });
        }
    }
    match value.get_mut("data").map(Value::take) {
        Some(data) if !data.is_null() => Ok(data),
        _ => Err(TrackerError::ParseError {
            message: "GraphQL response has no data".to_string(),
        }),
    }
}

struct ProjectBoard {
    id: String,
    fields: Vec<SelectField>,
}

struct SelectField {
    id: String,
    name: String,
    options: Vec<(String, String)>,
}

impl ProjectBoard {
    /// Resolve a single-select field and option by name (case-insensitive)
    fn option(&self, field: &str, value: &str) -> Result<(String, String), TrackerError> {
        let select = self
            .fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(field))
            .ok_or_else(|| TrackerError::NotConfigured(format!(
                "project board has no single-select field '{}'",
                field
            )))?;
        let (option_id, _) = select
            .options
            .iter()
            .find(|(_, name)| name.eq_ignore_ascii_case(value))
            .ok_or_else(|| TrackerError::NotConfigured(format!(
                "field '{}' has no option '{}'",
                select.name, value
            )))?;
        Ok((select.id.clone(), option_id.clone()))
    }
}

fn parse_project(data: &Value, project_number: u64) -> Result<ProjectBoard, TrackerError> {
    let project = data
        .pointer("/repositoryOwner/projectV2")
        .filter(|p| !p.is_null())
        .ok_or_else(|| TrackerError::NotConfigured(format!(
            "project board #{} not found",
            project_number
        )))?;

    let id = project
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| TrackerError::ParseError {
            message: "project board has no id".to_string(),
        })?
        .to_string();

    let fields = project
        .pointer("/fields/nodes")
        .and_then(Value::as_array)
        .map(|nodes| {
            nodes
                .iter()
                .filter_map(|node| {
                    let options = node
                        .get("options")?
                        .as_array()?
                        .iter()
                        .filter_map(|o| {
                            Some((
                                o.get("id")?.as_str()?.to_string(),
                                o.get("name")?.as_str()?.to_string(),
                            ))
                        })
                        .collect();
                    Some(SelectField {
                        id: node.get("id")?.as_str()?.to_string(),
                        name: node.get("name")?.as_str()?.to_string(),
                        options,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(ProjectBoard { id, fields })
}
