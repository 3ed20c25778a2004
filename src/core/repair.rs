//! Reconcile the store with the documents
//!
//! Documents are the source of truth: missing store records are imported and
//! mismatched ones are overwritten from the parsed document. Store records
//! with no document are only flagged; deleting them is a separate, explicitly
//! confirmed step ([`prune_orphans`]).

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::core::document::SpecDocument;
use crate::core::integrity::IntegrityReport;
use crate::core::store::{SpecRecord, SpecStore, StoreError};

/// A spec that could not be reconciled
#[derive(Debug, Clone, Serialize)]
pub struct RepairFailure {
    pub id: String,
    pub error: String,
}

/// What a repair pass did
#[derive(Debug, Clone, Default, Serialize)]
pub struct RepairOutcome {
    pub imported: Vec<String>,
    pub updated: Vec<String>,
    /// Mismatch entries whose store record already matched on re-read
    pub unchanged: Vec<String>,
    pub flagged_store_only: Vec<String>,
    pub failed: Vec<RepairFailure>,
}

impl RepairOutcome {
    /// Number of store writes performed
    pub fn writes(&self) -> usize {
        self.imported.len() + self.updated.len()
    }
}

/// Apply a report: import documents, overwrite mismatches, flag orphans
///
/// A document that cannot be parsed is recorded in `failed` and skipped.
/// Store errors abort the pass.
pub fn repair(
    store: &SpecStore,
    documents_dir: &Path,
    report: &IntegrityReport,
) -> Result<RepairOutcome, StoreError> {
    let mut outcome = RepairOutcome {
        flagged_store_only: report.store_only.clone(),
        ..Default::default()
    };

    for id in &report.files_only {
        let doc = match SpecDocument::load_for_id(documents_dir, id) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(spec_id = %id, error = %e, "cannot import spec document");
                outcome.failed.push(RepairFailure {
                    id: id.clone(),
                    error: e.to_string(),
                });
                continue;
            }
        };
        store.put_spec(&SpecRecord::from(&doc.metadata))?;
        info!(spec_id = %id, "imported spec from document");
        outcome.imported.push(id.clone());
    }

    for entry in &report.mismatch {
        let doc = match SpecDocument::load_for_id(documents_dir, &entry.id) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(spec_id = %entry.id, error = %e, "cannot repair spec");
                outcome.failed.push(RepairFailure {
                    id: entry.id.clone(),
                    error: e.to_string(),
                });
                continue;
            }
        };

        let unchanged = store
            .find_spec(&entry.id)?
            .is_some_and(|record| record.matches_document(&doc.metadata));
        if unchanged {
            outcome.unchanged.push(entry.id.clone());
            continue;
        }

        store.put_spec(&SpecRecord::from(&doc.metadata))?;
        info!(spec_id = %entry.id, "store record overwritten from document");
        outcome.updated.push(entry.id.clone());
    }

    for id in &outcome.flagged_store_only {
        warn!(spec_id = %id, "store record has no document");
    }

    Ok(outcome)
}

/// Delete store records that have no document
///
/// Ids already gone are skipped. Returns the ids actually deleted.
pub fn prune_orphans(store: &SpecStore, ids: &[String]) -> Result<Vec<String>, StoreError> {
    let mut removed = Vec::new();
    for id in ids {
        match store.delete_spec(id) {
            Ok(()) => {
                info!(spec_id = %id, "pruned orphaned store record");
                removed.push(id.clone());
            }
            Err(StoreError::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(removed)
}

/// Snapshot the store into `backup_dir` ahead of a repair
///
/// Failures are logged and reported as `None`; they never block the repair.
pub fn backup_before_repair(store: &SpecStore, backup_dir: &Path) -> Option<PathBuf> {
    let dest = backup_dir.join(format!("store-{}.db", Utc::now().format("%Y%m%dT%H%M%S")));
    match store.backup(&dest) {
        Ok(()) => {
            info!(path = %dest.display(), "store backed up");
            Some(dest)
        }
        Err(e) => {
            warn!(error = %e, "store backup failed; continuing without one");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::document::{document_path, render, SpecMetadata};
    use crate::core::integrity::check;
    use crate::core::phase::Phase;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn meta(id: &str, phase: Phase) -> SpecMetadata {
        SpecMetadata {
            id: id.to_string(),
            name: format!("Spec {}", id),
            phase,
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2025, 1, 2, 9, 0, 0).unwrap(),
            description: Some("from document".to_string()),
            branch_name: None,
        }
    }

    fn write_doc(dir: &Path, meta: &SpecMetadata) {
        std::fs::write(document_path(dir, &meta.id), render(meta, "")).unwrap();
    }

    #[test]
    fn test_document_wins() {
        let tmp = tempdir().unwrap();
        let store = SpecStore::open_in_memory().unwrap();
        write_doc(tmp.path(), &meta("abc123", Phase::Design));
        store
            .put_spec(&SpecRecord::from(&meta("abc123", Phase::Tasks)))
            .unwrap();

        let report = check(&store, tmp.path()).unwrap();
        let outcome = repair(&store, tmp.path(), &report).unwrap();

        assert_eq!(outcome.updated, vec!["abc123"]);
        assert_eq!(store.get_spec("abc123").unwrap().phase, Phase::Design);
        assert!(check(&store, tmp.path()).unwrap().is_consistent());
    }

    #[test]
    fn test_imports_and_flags_orphans() {
        let tmp = tempdir().unwrap();
        let store = SpecStore::open_in_memory().unwrap();
        write_doc(tmp.path(), &meta("new", Phase::Requirements));
        store
            .put_spec(&SpecRecord::from(&meta("orphan", Phase::Design)))
            .unwrap();

        let report = check(&store, tmp.path()).unwrap();
        let outcome = repair(&store, tmp.path(), &report).unwrap();

        assert_eq!(outcome.imported, vec!["new"]);
        assert_eq!(outcome.flagged_store_only, vec!["orphan"]);
        let imported = store.get_spec("new").unwrap();
        assert_eq!(imported.description.as_deref(), Some("from document"));
        // Orphans survive a repair
        assert!(store.find_spec("orphan").unwrap().is_some());
    }

    #[test]
    fn test_repair_is_idempotent() {
        let tmp = tempdir().unwrap();
        let store = SpecStore::open_in_memory().unwrap();
        write_doc(tmp.path(), &meta("a", Phase::Design));
        write_doc(tmp.path(), &meta("b", Phase::Review));
        store
            .put_spec(&SpecRecord::from(&meta("b", Phase::Implementation)))
            .unwrap();

        let first = repair(&store, tmp.path(), &check(&store, tmp.path()).unwrap()).unwrap();
        assert_eq!(first.writes(), 2);
        let snapshot = store.list_specs().unwrap();

        let second = repair(&store, tmp.path(), &check(&store, tmp.path()).unwrap()).unwrap();
        assert_eq!(second.writes(), 0);
        assert_eq!(store.list_specs().unwrap(), snapshot);

        // Replaying a stale report writes nothing either
        let stale = IntegrityReport {
            mismatch: vec![crate::core::integrity::MismatchEntry {
                id: "b".to_string(),
                differences: vec!["Phase mismatch".to_string()],
            }],
            ..Default::default()
        };
        let third = repair(&store, tmp.path(), &stale).unwrap();
        assert_eq!(third.unchanged, vec!["b"]);
        assert_eq!(third.writes(), 0);
    }

    #[test]
    fn test_unparseable_document_fails_without_aborting() {
        let tmp = tempdir().unwrap();
        let store = SpecStore::open_in_memory().unwrap();
        std::fs::write(document_path(tmp.path(), "bad"), "# Title only\n").unwrap();
        write_doc(tmp.path(), &meta("good", Phase::Design));

        let report = check(&store, tmp.path()).unwrap();
        let outcome = repair(&store, tmp.path(), &report).unwrap();

        assert_eq!(outcome.imported, vec!["good"]);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].id, "bad");
        assert!(store.find_spec("bad").unwrap().is_none());
    }

    #[test]
    fn test_prune_orphans() {
        let store = SpecStore::open_in_memory().unwrap();
        store
            .put_spec(&SpecRecord::from(&meta("orphan", Phase::Design)))
            .unwrap();

        let removed =
            prune_orphans(&store, &["orphan".to_string(), "gone".to_string()]).unwrap();
        assert_eq!(removed, vec!["orphan"]);
        assert!(store.spec_ids().unwrap().is_empty());
    }

    #[test]
    fn test_backup_before_repair() {
        let tmp = tempdir().unwrap();
        let store =
            SpecStore::open_path(&tmp.path().join("store.db"), crate::core::store::DEFAULT_BUSY_TIMEOUT)
                .unwrap();
        let dest = backup_before_repair(&store, &tmp.path().join("backups")).unwrap();
        assert!(dest.exists());
    }
}
