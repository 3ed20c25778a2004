//! Spec <-> remote issue synchronization
//!
//! From the remote side a spec is unlinked, linked to an open issue, or linked
//! to a closed issue. A link is established at most once per spec and is
//! only recorded after the tracker's response has been parsed; a failed
//! attempt leaves a `failed` bookkeeping row and no link.

use std::path::Path;

use chrono::Utc;
use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{
    IssueDraft, IssueState, IssueTracker, PullRequestDraft, PullRequestInfo, RemoteIssue,
    TrackerError,
};
use crate::core::document::{
    self, set_header_fields, truncate_to_seconds, DocumentError, HeaderUpdate, SpecDocument,
    SpecMetadata,
};
use crate::core::hash;
use crate::core::phase::Phase;
use crate::core::store::{EntityType, NewLink, SpecRecord, SpecStore, StoreError, SyncRecord};

#[derive(Debug, Error, Diagnostic)]
pub enum RemoteSyncError {
    #[error("spec '{spec_id}' is already linked to a remote issue")]
    #[diagnostic(
        code(spectrack::remote::duplicate_link),
        help("a spec links to at most one issue; use `spectrack remote push` to update it")
    )]
    DuplicateLink {
        spec_id: String,
        issue_number: Option<u64>,
    },

    #[error("spec '{spec_id}' is not linked to a remote issue")]
    #[diagnostic(
        code(spectrack::remote::not_linked),
        help("run `spectrack remote link {spec_id} --create` first")
    )]
    NotLinked { spec_id: String },

    #[error("spec '{spec_id}' has no pull request")]
    #[diagnostic(
        code(spectrack::remote::no_pull_request),
        help("open one with `spectrack remote pr {spec_id} --head <branch>`")
    )]
    NoPullRequest { spec_id: String },

    #[error("{0}")]
    #[diagnostic(code(spectrack::remote::invalid_request))]
    InvalidRequest(String),

    #[error("remote request failed: {message}")]
    #[diagnostic(
        code(spectrack::remote::api),
        help("nothing was retried; run the command again once the remote is reachable")
    )]
    ExternalApi { message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),
}

impl RemoteSyncError {
    /// Remote failures and store lock timeouts may succeed on a later attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteSyncError::ExternalApi { .. } => true,
            RemoteSyncError::Store(e) => e.is_retryable(),
            _ => false,
        }
    }
}

impl From<TrackerError> for RemoteSyncError {
    fn from(err: TrackerError) -> Self {
        RemoteSyncError::ExternalApi {
            message: err.to_string(),
        }
    }
}

/// How to establish a link
#[derive(Debug, Clone, Default)]
pub struct LinkRequest {
    /// Link this existing issue number
    pub existing_issue: Option<u64>,
    /// Create a new issue when no existing one is given
    pub create_if_not_exists: bool,
}

/// Project board that mirrors spec phases in a single-select field
#[derive(Debug, Clone)]
pub struct Board {
    pub project_number: u64,
    pub field: String,
}

/// Result of pulling remote state into a spec
#[derive(Debug, Clone, Serialize)]
pub struct PullOutcome {
    pub spec: SpecRecord,
    pub name_changed: bool,
    pub phase_changed: bool,
}

impl PullOutcome {
    pub fn changed(&self) -> bool {
        self.name_changed || self.phase_changed
    }
}

/// Result of pushing every linked spec
#[derive(Debug, Default, Serialize)]
pub struct BulkSyncOutcome {
    pub pushed: Vec<String>,
    /// (spec id, error message)
    pub failed: Vec<(String, String)>,
}

/// Issue title for a spec: `[{phase}] {name}`
pub fn title_for(meta: &SpecMetadata) -> String {
    format!("[{}] {}", meta.phase, meta.name)
}

/// Spec name from an issue title, dropping a leading `[...]` prefix
pub fn name_from_title(title: &str) -> &str {
    let trimmed = title.trim();
    if trimmed.starts_with('[') {
        if let Some(end) = trimmed.find(']') {
            return trimmed[end + 1..].trim();
        }
    }
    trimmed
}

/// Title, body and labels written to the remote for a document
pub fn issue_draft(doc: &SpecDocument) -> IssueDraft {
    IssueDraft {
        title: title_for(&doc.metadata),
        body: doc.content.clone(),
        labels: vec![doc.metadata.phase.label()],
    }
}

/// Remote issue state for a phase: closed iff completed
pub fn state_for(phase: Phase) -> IssueState {
    if phase == Phase::Completed {
        IssueState::Closed
    } else {
        IssueState::Open
    }
}

/// Sync service binding a store, a documents directory and a tracker
pub struct RemoteSync<'a> {
    store: &'a SpecStore,
    tracker: &'a dyn IssueTracker,
    documents_dir: &'a Path,
    board: Option<Board>,
}

impl<'a> RemoteSync<'a> {
    pub fn new(store: &'a SpecStore, tracker: &'a dyn IssueTracker, documents_dir: &'a Path) -> Self {
        Self {
            store,
            tracker,
            documents_dir,
            board: None,
        }
    }

    /// Mirror phases onto a project board
    pub fn with_board(mut self, board: Option<Board>) -> Self {
        self.board = board;
        self
    }

    fn require_link(&self, spec_id: &str) -> Result<(SyncRecord, u64), RemoteSyncError> {
        let link = self
            .store
            .active_link(EntityType::Spec, spec_id)?
            .ok_or_else(|| RemoteSyncError::NotLinked {
                spec_id: spec_id.to_string(),
            })?;
        let number = link
            .issue_number
            .or(link.external_number)
            .ok_or_else(|| RemoteSyncError::NotLinked {
                spec_id: spec_id.to_string(),
            })?;
        Ok((link, number))
    }

    /// Note a failed call on an existing link, then hand back the error
    fn link_error(&self, link: &SyncRecord, err: TrackerError) -> RemoteSyncError {
        let err = RemoteSyncError::from(err);
        if let Err(store_err) = self.store.set_sync_error(link.id, &err.to_string()) {
            warn!(spec_id = %link.entity_id, error = %store_err, "failed to record sync error");
        }
        err
    }

    /// Link a spec to an existing issue or a newly created one
    pub fn create_link(
        &self,
        spec_id: &str,
        request: &LinkRequest,
    ) -> Result<SyncRecord, RemoteSyncError> {
        if let Some(existing) = self.store.active_link(EntityType::Spec, spec_id)? {
            return Err(RemoteSyncError::DuplicateLink {
                spec_id: spec_id.to_string(),
                issue_number: existing.issue_number,
            });
        }

        let doc = SpecDocument::load_for_id(self.documents_dir, spec_id)?;

        let remote = match request.existing_issue {
            Some(number) => self.tracker.get_issue(number),
            None if request.create_if_not_exists => self.adopt_or_create(&doc),
            None => {
                return Err(RemoteSyncError::InvalidRequest(
                    "give an existing issue number or allow creating one".to_string(),
                ))
            }
        };

        let issue = match remote {
            Ok(issue) => issue,
            Err(e) => {
                let err = RemoteSyncError::from(e);
                self.store
                    .record_sync_failure(EntityType::Spec, spec_id, &err.to_string())?;
                warn!(spec_id, error = %err, "linking failed");
                return Err(err);
            }
        };

        let link = NewLink {
            entity_id: spec_id.to_string(),
            external_id: Some(issue.id.to_string()),
            node_id: Some(issue.node_id.clone()),
            issue_number: issue.number,
            issue_url: issue.url.clone(),
            checkbox_hash: Some(hash::checkbox_hash(&doc.content)),
            last_body_hash: Some(hash::body_hash(&doc.content)),
        };
        let record = match self.store.insert_link(EntityType::Spec, &link, Utc::now()) {
            Ok(record) => record,
            // Another process linked the spec between our check and insert
            Err(StoreError::Constraint { .. }) => {
                return Err(RemoteSyncError::DuplicateLink {
                    spec_id: spec_id.to_string(),
                    issue_number: self
                        .store
                        .active_link(EntityType::Spec, spec_id)?
                        .and_then(|l| l.issue_number),
                })
            }
            Err(e) => return Err(e.into()),
        };
        info!(spec_id, issue = issue.number, "spec linked");

        self.update_board(&issue, doc.metadata.phase);
        Ok(record)
    }

    /// Reuse an issue whose body already carries this spec's id, else create one
    ///
    /// An earlier run may have created the issue and died before recording
    /// the link; adopting it keeps the remote free of duplicates.
    fn adopt_or_create(&self, doc: &SpecDocument) -> Result<RemoteIssue, TrackerError> {
        let id = doc.metadata.id.as_str();
        let existing = self.tracker.list_issues(None)?.into_iter().find(|issue| {
            issue
                .body
                .as_deref()
                .and_then(|body| document::header_field(body, document::LABEL_ID))
                == Some(id)
        });
        match existing {
            Some(issue) => {
                info!(spec_id = %doc.metadata.id, issue = issue.number, "adopting existing issue");
                Ok(issue)
            }
            None => self.tracker.create_issue(&issue_draft(doc)),
        }
    }

    /// Push the document to its linked issue
    ///
    /// Title, labels and body are overwritten; the issue is closed iff the
    /// spec is completed. The follow-up comment and board update are best
    /// effort.
    pub fn sync_to_remote(&self, spec_id: &str) -> Result<SyncRecord, RemoteSyncError> {
        let (link, number) = self.require_link(spec_id)?;
        let doc = SpecDocument::load_for_id(self.documents_dir, spec_id)?;
        let phase = doc.metadata.phase;

        let issue = self
            .tracker
            .update_issue(number, &issue_draft(&doc), state_for(phase))
            .map_err(|e| self.link_error(&link, e))?;

        let comment = format!("Synced from spectrack: phase `{}`.", phase);
        if let Err(e) = self.tracker.create_comment(number, &comment) {
            warn!(spec_id, issue = number, error = %e, "failed to post sync comment");
        }
        self.update_board(&issue, phase);

        self.store.mark_synced(
            link.id,
            Utc::now(),
            &hash::body_hash(&doc.content),
            &hash::checkbox_hash(&doc.content),
        )?;
        info!(spec_id, issue = number, %phase, "pushed spec to remote");
        Ok(self.store.get_sync_record(link.id)?)
    }

    /// Pull remote title and state into the document and store
    ///
    /// A closed issue moves the spec to completed; an open one leaves the
    /// phase alone. Nothing is written when neither name nor phase changes.
    pub fn sync_from_remote(&self, spec_id: &str) -> Result<PullOutcome, RemoteSyncError> {
        let (link, number) = self.require_link(spec_id)?;
        let issue = self
            .tracker
            .get_issue(number)
            .map_err(|e| self.link_error(&link, e))?;
        let doc = SpecDocument::load_for_id(self.documents_dir, spec_id)?;

        let remote_name = name_from_title(&issue.title);
        let name_changed = !remote_name.is_empty() && remote_name != doc.metadata.name;
        let phase_changed =
            issue.state == IssueState::Closed && doc.metadata.phase != Phase::Completed;

        if !name_changed && !phase_changed {
            debug!(spec_id, "remote has no changes");
            return Ok(PullOutcome {
                spec: SpecRecord::from(&doc.metadata),
                name_changed,
                phase_changed,
            });
        }

        let update = HeaderUpdate {
            name: name_changed.then(|| remote_name.to_string()),
            phase: phase_changed.then_some(Phase::Completed),
            updated_at: Some(truncate_to_seconds(Utc::now())),
        };
        let text = set_header_fields(&doc.content, &update);
        let meta = document::parse(&text)?;
        document::write_text(&doc.path, &text)?;

        let record = SpecRecord::from(&meta);
        self.store.put_spec(&record)?;
        if meta.phase == Phase::Completed {
            self.store.delete_workflow_state(spec_id)?;
        }
        info!(spec_id, issue = number, name_changed, phase_changed, "pulled remote changes");

        Ok(PullOutcome {
            spec: record,
            name_changed,
            phase_changed,
        })
    }

    /// Push every linked spec; failures are collected, not fatal
    pub fn sync_all_to_remote(&self) -> Result<BulkSyncOutcome, RemoteSyncError> {
        let mut outcome = BulkSyncOutcome::default();
        for link in self.store.list_links(EntityType::Spec)? {
            match self.sync_to_remote(&link.entity_id) {
                Ok(_) => outcome.pushed.push(link.entity_id),
                Err(e) => {
                    warn!(spec_id = %link.entity_id, error = %e, "push failed");
                    outcome.failed.push((link.entity_id, e.to_string()));
                }
            }
        }
        Ok(outcome)
    }

    /// Open a pull request for a linked spec and record it on the link
    pub fn create_pull_request(
        &self,
        spec_id: &str,
        head: &str,
        base: &str,
    ) -> Result<PullRequestInfo, RemoteSyncError> {
        let (link, number) = self.require_link(spec_id)?;
        let doc = SpecDocument::load_for_id(self.documents_dir, spec_id)?;

        let draft = PullRequestDraft {
            title: doc.metadata.name.clone(),
            body: format!("Implements spec `{}`.\n\nCloses #{}", spec_id, number),
            head: head.to_string(),
            base: base.to_string(),
        };
        let pr = self
            .tracker
            .create_pull_request(&draft)
            .map_err(|e| self.link_error(&link, e))?;

        self.store.record_pull_request(link.id, pr.number, &pr.url)?;
        info!(spec_id, pr = pr.number, "pull request opened");
        Ok(pr)
    }

    /// Re-read the linked pull request and record its merge time
    pub fn refresh_pr_status(&self, spec_id: &str) -> Result<PullRequestInfo, RemoteSyncError> {
        let (link, _) = self.require_link(spec_id)?;
        let pr_number = link.pr_number.ok_or_else(|| RemoteSyncError::NoPullRequest {
            spec_id: spec_id.to_string(),
        })?;

        let pr = self
            .tracker
            .get_pull_request(pr_number)
            .map_err(|e| self.link_error(&link, e))?;
        if let Some(merged_at) = pr.merged_at {
            if link.pr_merged_at != Some(merged_at) {
                self.store.record_pr_merged(link.id, merged_at)?;
            }
        }
        Ok(pr)
    }

    fn update_board(&self, issue: &RemoteIssue, phase: Phase) {
        let Some(board) = &self.board else {
            return;
        };
        let result = self
            .tracker
            .add_project_item(board.project_number, &issue.node_id)
            .and_then(|item| {
                self.tracker.set_project_field(
                    board.project_number,
                    &item,
                    &board.field,
                    phase.as_str(),
                )
            });
        if let Err(e) = result {
            warn!(issue = issue.number, error = %e, "project board update failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::document::{document_path, render};
    use crate::core::remote::memory::MemoryTracker;
    use crate::core::remote::PrState;
    use crate::core::store::{NextAction, SyncStatus, WorkflowState};
    use chrono::TimeZone;
    use tempfile::{tempdir, TempDir};

    const ID: &str = "6f1c2a3b-4d5e-4f60-8a7b-9c0d1e2f3a4b";

    fn setup(phase: Phase) -> (TempDir, SpecStore, MemoryTracker) {
        let tmp = tempdir().unwrap();
        let meta = SpecMetadata {
            id: ID.to_string(),
            name: "User auth".to_string(),
            phase,
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2025, 1, 2, 9, 0, 0).unwrap(),
            description: None,
            branch_name: None,
        };
        std::fs::write(
            document_path(tmp.path(), ID),
            render(&meta, "## Tasks\n\n- [x] one\n- [ ] two"),
        )
        .unwrap();
        let store = SpecStore::open_in_memory().unwrap();
        store.put_spec(&SpecRecord::from(&meta)).unwrap();
        (tmp, store, MemoryTracker::new())
    }

    fn create() -> LinkRequest {
        LinkRequest {
            existing_issue: None,
            create_if_not_exists: true,
        }
    }

    #[test]
    fn test_create_link_creates_issue() {
        let (tmp, store, tracker) = setup(Phase::Design);
        let sync = RemoteSync::new(&store, &tracker, tmp.path());

        let record = sync.create_link(ID, &create()).unwrap();
        assert_eq!(record.sync_status, SyncStatus::Success);

        let issue = tracker.issue(record.issue_number.unwrap()).unwrap();
        assert_eq!(issue.title, "[design] User auth");
        assert_eq!(issue.labels, vec!["phase:design"]);
        assert!(issue.body.unwrap().contains("- [ ] two"));
        assert!(record.last_body_hash.is_some());
    }

    #[test]
    fn test_no_duplicate_links() {
        let (tmp, store, tracker) = setup(Phase::Design);
        let sync = RemoteSync::new(&store, &tracker, tmp.path());
        sync.create_link(ID, &create()).unwrap();
        let calls = tracker.calls.get();

        let err = sync.create_link(ID, &create()).unwrap_err();
        assert!(matches!(err, RemoteSyncError::DuplicateLink { issue_number: Some(1), .. }));
        // Fails fast without touching the remote
        assert_eq!(tracker.calls.get(), calls);
        assert_eq!(tracker.issues.borrow().len(), 1);
        assert_eq!(store.list_links(EntityType::Spec).unwrap().len(), 1);
    }

    #[test]
    fn test_link_existing_issue() {
        let (tmp, store, tracker) = setup(Phase::Design);
        let existing = tracker
            .create_issue(&IssueDraft {
                title: "Tracking".to_string(),
                body: String::new(),
                labels: vec![],
            })
            .unwrap();
        let sync = RemoteSync::new(&store, &tracker, tmp.path());

        let request = LinkRequest {
            existing_issue: Some(existing.number),
            create_if_not_exists: false,
        };
        let record = sync.create_link(ID, &request).unwrap();
        assert_eq!(record.issue_number, Some(existing.number));
        assert_eq!(tracker.issues.borrow().len(), 1);
    }

    #[test]
    fn test_create_adopts_unrecorded_issue() {
        let (tmp, store, tracker) = setup(Phase::Design);
        // Issue created by an earlier run that never recorded the link
        let doc = SpecDocument::load_for_id(tmp.path(), ID).unwrap();
        let orphan = tracker.create_issue(&issue_draft(&doc)).unwrap();

        let sync = RemoteSync::new(&store, &tracker, tmp.path());
        let record = sync.create_link(ID, &create()).unwrap();
        assert_eq!(record.issue_number, Some(orphan.number));
        assert_eq!(tracker.issues.borrow().len(), 1);
    }

    #[test]
    fn test_create_ignores_issue_for_longer_id() {
        let (tmp, store, tracker) = setup(Phase::Design);
        // Issue tracking another spec whose id starts with ours
        let other = tracker
            .create_issue(&IssueDraft {
                title: "[design] Other".to_string(),
                body: format!("# Other\n\n**Spec ID:** {}ff\n**Phase:** design\n", ID),
                labels: vec![],
            })
            .unwrap();

        let sync = RemoteSync::new(&store, &tracker, tmp.path());
        let record = sync.create_link(ID, &create()).unwrap();
        assert_ne!(record.issue_number, Some(other.number));
        assert_eq!(tracker.issues.borrow().len(), 2);
    }

    #[test]
    fn test_link_requires_issue_or_create() {
        let (tmp, store, tracker) = setup(Phase::Design);
        let sync = RemoteSync::new(&store, &tracker, tmp.path());
        assert!(matches!(
            sync.create_link(ID, &LinkRequest::default()),
            Err(RemoteSyncError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_failed_create_records_failure_not_link() {
        let (tmp, store, tracker) = setup(Phase::Design);
        tracker.fail_issues.set(true);
        let sync = RemoteSync::new(&store, &tracker, tmp.path());

        let err = sync.create_link(ID, &create()).unwrap_err();
        assert!(matches!(err, RemoteSyncError::ExternalApi { .. }));
        assert!(err.is_retryable());
        assert!(store.active_link(EntityType::Spec, ID).unwrap().is_none());

        let history = store.sync_history(EntityType::Spec, ID).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].sync_status, SyncStatus::Failed);

        // A later attempt can still link
        tracker.fail_issues.set(false);
        sync.create_link(ID, &create()).unwrap();
    }

    #[test]
    fn test_push_requires_link() {
        let (tmp, store, tracker) = setup(Phase::Design);
        let sync = RemoteSync::new(&store, &tracker, tmp.path());
        assert!(matches!(
            sync.sync_to_remote(ID),
            Err(RemoteSyncError::NotLinked { .. })
        ));
    }

    #[test]
    fn test_push_overwrites_and_closes_when_completed() {
        let (tmp, store, tracker) = setup(Phase::Review);
        let sync = RemoteSync::new(&store, &tracker, tmp.path());
        let link = sync.create_link(ID, &create()).unwrap();
        let number = link.issue_number.unwrap();
        tracker.edit(number, "edited remotely", IssueState::Open);

        let path = document_path(tmp.path(), ID);
        let text = std::fs::read_to_string(&path).unwrap();
        let text = set_header_fields(
            &text,
            &HeaderUpdate {
                phase: Some(Phase::Completed),
                ..Default::default()
            },
        );
        std::fs::write(&path, text).unwrap();

        let record = sync.sync_to_remote(ID).unwrap();
        let issue = tracker.issue(number).unwrap();
        assert_eq!(issue.title, "[completed] User auth");
        assert_eq!(issue.state, IssueState::Closed);
        assert_eq!(issue.labels, vec!["phase:completed"]);
        assert!(record.last_synced_at.is_some());
        assert_eq!(tracker.comments.borrow().len(), 1);
    }

    #[test]
    fn test_push_failure_keeps_link_and_records_error() {
        let (tmp, store, tracker) = setup(Phase::Design);
        let sync = RemoteSync::new(&store, &tracker, tmp.path());
        sync.create_link(ID, &create()).unwrap();

        tracker.fail_issues.set(true);
        assert!(sync.sync_to_remote(ID).is_err());

        let link = store.active_link(EntityType::Spec, ID).unwrap().unwrap();
        assert!(link.error_message.unwrap().contains("502"));
    }

    #[test]
    fn test_comment_and_board_failures_are_not_fatal() {
        let (tmp, store, tracker) = setup(Phase::Design);
        let sync = RemoteSync::new(&store, &tracker, tmp.path()).with_board(Some(Board {
            project_number: 1,
            field: "Status".to_string(),
        }));
        sync.create_link(ID, &create()).unwrap();
        assert_eq!(tracker.board.borrow()[0].1, "design");

        tracker.fail_comments.set(true);
        tracker.fail_board.set(true);
        assert!(sync.sync_to_remote(ID).is_ok());
    }

    #[test]
    fn test_pull_closed_issue_completes_spec() {
        let (tmp, store, tracker) = setup(Phase::Review);
        let sync = RemoteSync::new(&store, &tracker, tmp.path());
        let link = sync.create_link(ID, &create()).unwrap();
        store
            .save_workflow_state(&WorkflowState {
                spec_id: ID.to_string(),
                current_task_number: Some(2),
                current_task_title: None,
                next_action: NextAction::TaskDone,
                remote_issue_number: link.issue_number,
                saved_at: Utc::now(),
            })
            .unwrap();

        tracker.edit(
            link.issue_number.unwrap(),
            "[review] User authentication",
            IssueState::Closed,
        );
        let outcome = sync.sync_from_remote(ID).unwrap();
        assert!(outcome.name_changed && outcome.phase_changed);

        let doc = SpecDocument::load_for_id(tmp.path(), ID).unwrap();
        assert_eq!(doc.metadata.phase, Phase::Completed);
        assert_eq!(doc.metadata.name, "User authentication");
        assert!(doc.content.contains("- [ ] two"));
        assert_eq!(store.get_spec(ID).unwrap(), SpecRecord::from(&doc.metadata));
        assert!(store.get_workflow_state(ID).unwrap().is_none());
    }

    #[test]
    fn test_pull_open_issue_without_changes_writes_nothing() {
        let (tmp, store, tracker) = setup(Phase::Design);
        let sync = RemoteSync::new(&store, &tracker, tmp.path());
        sync.create_link(ID, &create()).unwrap();
        let before = std::fs::read_to_string(document_path(tmp.path(), ID)).unwrap();

        let outcome = sync.sync_from_remote(ID).unwrap();
        assert!(!outcome.changed());
        let after = std::fs::read_to_string(document_path(tmp.path(), ID)).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_sync_all_collects_failures() {
        let (tmp, store, tracker) = setup(Phase::Design);
        let sync = RemoteSync::new(&store, &tracker, tmp.path());
        sync.create_link(ID, &create()).unwrap();

        // A second linked spec whose document has gone missing
        store
            .insert_link(
                EntityType::Spec,
                &NewLink {
                    entity_id: "ghost".to_string(),
                    issue_number: 99,
                    issue_url: "u".to_string(),
                    ..Default::default()
                },
                Utc::now(),
            )
            .unwrap();

        let outcome = sync.sync_all_to_remote().unwrap();
        assert_eq!(outcome.pushed, vec![ID]);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].0, "ghost");
    }

    #[test]
    fn test_pull_request_lifecycle() {
        let (tmp, store, tracker) = setup(Phase::Implementation);
        let sync = RemoteSync::new(&store, &tracker, tmp.path());
        sync.create_link(ID, &create()).unwrap();

        assert!(matches!(
            sync.refresh_pr_status(ID),
            Err(RemoteSyncError::NoPullRequest { .. })
        ));

        let pr = sync.create_pull_request(ID, "feature/auth", "main").unwrap();
        assert_eq!(pr.state, PrState::Open);
        tracker.merge_pull(pr.number);

        let refreshed = sync.refresh_pr_status(ID).unwrap();
        assert_eq!(refreshed.state, PrState::Merged);
        let link = store.active_link(EntityType::Spec, ID).unwrap().unwrap();
        assert_eq!(link.pr_number, Some(pr.number));
        assert_eq!(link.pr_merged_at, refreshed.merged_at);
    }

    #[test]
    fn test_title_round_trip() {
        assert_eq!(name_from_title("[design] User auth"), "User auth");
        assert_eq!(name_from_title("  Plain title "), "Plain title");
        assert_eq!(name_from_title("[unterminated"), "[unterminated");
    }
}
