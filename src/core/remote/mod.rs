//! Remote issue tracker integration
//!
//! [`IssueTracker`] is the seam between the sync state machine in [`sync`]
//! and a concrete tracker. [`github::GhClient`] implements it by shelling out
//! to the GitHub CLI.

pub mod github;
pub mod sync;

#[cfg(test)]
pub(crate) mod memory;

pub use github::GhClient;
pub use sync::{BulkSyncOutcome, LinkRequest, PullOutcome, RemoteSync, RemoteSyncError};

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;

/// Open/closed state of a remote issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    Open,
    Closed,
}

impl IssueState {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueState::Open => "open",
            IssueState::Closed => "closed",
        }
    }
}

impl std::fmt::Display for IssueState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An issue as returned by the tracker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteIssue {
    /// Numeric REST id
    pub id: u64,
    /// Global node id (used by the Projects API)
    pub node_id: String,
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
    pub state: IssueState,
    pub url: String,
    pub labels: Vec<String>,
}

/// Title, body and labels to write to an issue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueDraft {
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
}

/// Pull request to open
#[derive(Debug, Clone)]
pub struct PullRequestDraft {
    pub title: String,
    pub body: String,
    pub head: String,
    pub base: String,
}

/// Pull request state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PrState {
    Open,
    Closed,
    Merged,
}

impl std::fmt::Display for PrState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrState::Open => write!(f, "open"),
            PrState::Closed => write!(f, "closed"),
            PrState::Merged => write!(f, "merged"),
        }
    }
}

/// Information about a pull request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequestInfo {
    pub number: u64,
    pub url: String,
    pub state: PrState,
    pub merged_at: Option<DateTime<Utc>>,
}

/// Errors from a tracker call
#[derive(Debug, Error, Diagnostic)]
pub enum TrackerError {
    #[error("remote not configured: {0}")]
    #[diagnostic(code(spectrack::remote::not_configured))]
    NotConfigured(String),

    #[error("{cli} CLI not found. Install it from {install_url}")]
    #[diagnostic(code(spectrack::remote::cli_missing))]
    CliNotFound { cli: String, install_url: String },

    #[error("Command failed: {message}")]
    CommandFailed { message: String },

    #[error("Failed to parse response: {message}")]
    ParseError { message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Operations the sync layer needs from an issue tracker
///
/// Every call is a single remote request (or a short fixed sequence) and is
/// never retried here; retry policy belongs to the caller.
pub trait IssueTracker {
    fn create_issue(&self, draft: &IssueDraft) -> Result<RemoteIssue, TrackerError>;

    /// Overwrite title, body and labels, and set the open/closed state
    fn update_issue(
        &self,
        number: u64,
        draft: &IssueDraft,
        state: IssueState,
    ) -> Result<RemoteIssue, TrackerError>;

    fn get_issue(&self, number: u64) -> Result<RemoteIssue, TrackerError>;

    /// Issues carrying `label` (all issues when `None`), open and closed
    fn list_issues(&self, label: Option<&str>) -> Result<Vec<RemoteIssue>, TrackerError>;

    fn create_comment(&self, number: u64, body: &str) -> Result<(), TrackerError>;

    /// Add an issue (by node id) to a project board; returns the board item id
    fn add_project_item(&self, project_number: u64, node_id: &str)
        -> Result<String, TrackerError>;

    /// Set a single-select field of a board item to the option named `value`
    fn set_project_field(
        &self,
        project_number: u64,
        item_id: &str,
        field: &str,
        value: &str,
    ) -> Result<(), TrackerError>;

    fn create_pull_request(&self, draft: &PullRequestDraft)
        -> Result<PullRequestInfo, TrackerError>;

    fn get_pull_request(&self, number: u64) -> Result<PullRequestInfo, TrackerError>;
}
