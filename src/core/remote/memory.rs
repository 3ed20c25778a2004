//! In-memory tracker for exercising the sync state machine

use std::cell::{Cell, RefCell};

use chrono::Utc;

use super::{
    IssueDraft, IssueState, IssueTracker, PrState, PullRequestDraft, PullRequestInfo, RemoteIssue,
    TrackerError,
};

#[derive(Default)]
pub struct MemoryTracker {
    pub issues: RefCell<Vec<RemoteIssue>>,
    pub comments: RefCell<Vec<(u64, String)>>,
    pub board: RefCell<Vec<(String, String)>>,
    pub pulls: RefCell<Vec<PullRequestInfo>>,
    /// Fail every issue write and read
    pub fail_issues: Cell<bool>,
    pub fail_comments: Cell<bool>,
    pub fail_board: Cell<bool>,
    pub calls: Cell<usize>,
}

impl MemoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn check(&self, fail: &Cell<bool>) -> Result<(), TrackerError> {
        self.calls.set(self.calls.get() + 1);
        if fail.get() {
            return Err(TrackerError::CommandFailed {
                message: "HTTP 502: Bad Gateway".to_string(),
            });
        }
        Ok(())
    }

    pub fn issue(&self, number: u64) -> Option<RemoteIssue> {
        self.issues
            .borrow()
            .iter()
            .find(|i| i.number == number)
            .cloned()
    }

    /// Simulate a change made directly on the remote
    pub fn edit(&self, number: u64, title: &str, state: IssueState) {
        if let Some(issue) = self.issues.borrow_mut().iter_mut().find(|i| i.number == number) {
            issue.title = title.to_string();
            issue.state = state;
        }
    }

    pub fn merge_pull(&self, number: u64) {
        if let Some(pr) = self.pulls.borrow_mut().iter_mut().find(|p| p.number == number) {
            pr.state = PrState::Merged;
            pr.merged_at = Some(Utc::now());
        }
    }

    fn next_number(&self) -> u64 {
        let issues = self.issues.borrow().len() as u64;
        let pulls = self.pulls.borrow().len() as u64;
        issues + pulls + 1
    }
}

impl IssueTracker for MemoryTracker {
    fn create_issue(&self, draft: &IssueDraft) -> Result<RemoteIssue, TrackerError> {
        self.check(&self.fail_issues)?;
        let number = self.next_number();
        let issue = RemoteIssue {
            id: 1000 + number,
            node_id: format!("I_node{}", number),
            number,
            title: draft.title.clone(),
            body: Some(draft.body.clone()),
            state: IssueState::Open,
            url: format!("https://github.com/acme/specs/issues/{}", number),
            labels: draft.labels.clone(),
        };
        self.issues.borrow_mut().push(issue.clone());
        Ok(issue)
    }

    fn update_issue(
        &self,
        number: u64,
        draft: &IssueDraft,
        state: IssueState,
    ) -> Result<RemoteIssue, TrackerError> {
        self.check(&self.fail_issues)?;
        let mut issues = self.issues.borrow_mut();
        let issue = issues
            .iter_mut()
            .find(|i| i.number == number)
            .ok_or_else(|| TrackerError::CommandFailed {
                message: "HTTP 404: Not Found".to_string(),
            })?;
        issue.title = draft.title.clone();
        issue.body = Some(draft.body.clone());
        issue.labels = draft.labels.clone();
        issue.state = state;
        Ok(issue.clone())
    }

    fn get_issue(&self, number: u64) -> Result<RemoteIssue, TrackerError> {
        self.check(&self.fail_issues)?;
        self.issue(number).ok_or_else(|| TrackerError::CommandFailed {
            message: "HTTP 404: Not Found".to_string(),
        })
    }

    fn list_issues(&self, label: Option<&str>) -> Result<Vec<RemoteIssue>, TrackerError> {
        self.check(&self.fail_issues)?;
        Ok(self
            .issues
            .borrow()
            .iter()
            .filter(|i| label.map_or(true, |l| i.labels.iter().any(|x| x == l)))
            .cloned()
            .collect())
    }

    fn create_comment(&self, number: u64, body: &str) -> Result<(), TrackerError> {
        self.check(&self.fail_comments)?;
        self.comments.borrow_mut().push((number, body.to_string()));
        Ok(())
    }

    fn add_project_item(
        &self,
        _project_number: u64,
        node_id: &str,
    ) -> Result<String, TrackerError> {
        self.check(&self.fail_board)?;
        Ok(format!("PVTI_{}", node_id))
    }

    fn set_project_field(
        &self,
        _project_number: u64,
        item_id: &str,
        _field: &str,
        value: &str,
    ) -> Result<(), TrackerError> {
        self.check(&self.fail_board)?;
        let mut board = self.board.borrow_mut();
        board.retain(|(item, _)| item != item_id);
        board.push((item_id.to_string(), value.to_string()));
        Ok(())
    }

    fn create_pull_request(
        &self,
        _draft: &PullRequestDraft,
    ) -> Result<PullRequestInfo, TrackerError> {
        self.check(&self.fail_issues)?;
        let number = self.next_number();
        let pr = PullRequestInfo {
            number,
            url: format!("https://github.com/acme/specs/pull/{}", number),
            state: PrState::Open,
            merged_at: None,
        };
        self.pulls.borrow_mut().push(pr.clone());
        Ok(pr)
    }

    fn get_pull_request(&self, number: u64) -> Result<PullRequestInfo, TrackerError> {
        self.check(&self.fail_issues)?;
        self.pulls
            .borrow()
            .iter()
            .find(|p| p.number == number)
            .cloned()
            .ok_or_else(|| TrackerError::CommandFailed {
                message: "HTTP 404: Not Found".to_string(),
            })
    }
}
