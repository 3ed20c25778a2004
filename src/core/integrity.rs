//! Document/store consistency checks
//!
//! Compares the set of spec documents on disk against the store and reports
//! which ids exist on only one side, which disagree on mirrored fields, and
//! which are in sync. Checking never writes; see [`crate::core::repair`] for
//! the reconciling side.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::core::document::{self, truncate_to_seconds, SpecDocument, SpecMetadata};
use crate::core::store::{SpecRecord, SpecStore, StoreError};

/// One spec whose document and store record disagree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MismatchEntry {
    pub id: String,
    pub differences: Vec<String>,
}

/// Result of a consistency check (never persisted)
#[derive(Debug, Clone, Default, Serialize)]
pub struct IntegrityReport {
    /// Documents with no store record
    pub files_only: Vec<String>,
    /// Store records with no document
    pub store_only: Vec<String>,
    pub mismatch: Vec<MismatchEntry>,
    pub synced: Vec<String>,
    /// Percentage of documents that are in sync, rounded
    pub sync_rate: u32,
}

impl IntegrityReport {
    pub fn is_consistent(&self) -> bool {
        self.files_only.is_empty() && self.store_only.is_empty() && self.mismatch.is_empty()
    }

    /// Number of ids needing attention
    pub fn problem_count(&self) -> usize {
        self.files_only.len() + self.store_only.len() + self.mismatch.len()
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum IntegrityError {
    #[error("failed to scan documents directory {}: {message}", path.display())]
    #[diagnostic(code(spectrack::integrity::scan))]
    Scan { path: PathBuf, message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),
}

/// Check documents under `documents_dir` against the store
pub fn check(store: &SpecStore, documents_dir: &Path) -> Result<IntegrityReport, IntegrityError> {
    let file_ids = document_ids(documents_dir)?;
    let store_ids = store.spec_ids()?;

    let mut report = IntegrityReport {
        files_only: file_ids.difference(&store_ids).cloned().collect(),
        store_only: store_ids.difference(&file_ids).cloned().collect(),
        ..Default::default()
    };

    for id in file_ids.intersection(&store_ids) {
        let record = store.get_spec(id)?;
        let path = document::document_path(documents_dir, id);
        let differences = match SpecDocument::load(&path) {
            Ok(doc) => {
                let mut diffs = Vec::new();
                if doc.metadata.id != *id {
                    diffs.push(format!(
                        "ID mismatch: file '{}' embeds '{}'",
                        id, doc.metadata.id
                    ));
                }
                diffs.extend(compare(&record, &doc.metadata));
                diffs
            }
            Err(e) => vec![format!("Parse error: {}", e)],
        };

        if differences.is_empty() {
            report.synced.push(id.clone());
        } else {
            debug!(spec_id = %id, ?differences, "spec out of sync");
            report.mismatch.push(MismatchEntry {
                id: id.clone(),
                differences,
            });
        }
    }

    report.sync_rate = sync_rate(report.synced.len(), file_ids.len());
    Ok(report)
}

/// Per-field differences between a store record and parsed document metadata
pub fn compare(record: &SpecRecord, meta: &SpecMetadata) -> Vec<String> {
    let mut diffs = Vec::new();
    if record.name != meta.name {
        diffs.push(format!(
            "Name mismatch: store '{}', document '{}'",
            record.name, meta.name
        ));
    }
    if record.phase != meta.phase {
        diffs.push(format!(
            "Phase mismatch: store '{}', document '{}'",
            record.phase, meta.phase
        ));
    }
    let store_updated = truncate_to_seconds(record.updated_at);
    let doc_updated = truncate_to_seconds(meta.updated_at);
    if store_updated != doc_updated {
        diffs.push(format!(
            "Updated mismatch: store '{}', document '{}'",
            document::format_timestamp(&store_updated),
            document::format_timestamp(&doc_updated)
        ));
    }
    diffs
}

/// Ids (file stems) of the `*.md` files directly inside `documents_dir`
///
/// A missing directory holds no documents.
pub fn document_ids(documents_dir: &Path) -> Result<BTreeSet<String>, IntegrityError> {
    let mut ids = BTreeSet::new();
    if !documents_dir.exists() {
        return Ok(ids);
    }

    for entry in WalkDir::new(documents_dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| IntegrityError::Scan {
            path: documents_dir.to_path_buf(),
            message: e.to_string(),
        })?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().and_then(|e| e.to_str()) != Some("md") {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            ids.insert(stem.to_string());
        }
    }
    Ok(ids)
}

/// round(synced / total * 100), 0 when there are no documents
pub fn sync_rate(synced: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((synced as f64 / total as f64) * 100.0).round() as u32
}

/// Run a check and only log what it finds
///
/// Used ahead of commands that read specs; neither problems nor a failing
/// check ever stop the command.
pub fn check_opportunistic(store: &SpecStore, documents_dir: &Path) -> Option<IntegrityReport> {
    match check(store, documents_dir) {
        Ok(report) => {
            if !report.is_consistent() {
                warn!(
                    files_only = report.files_only.len(),
                    store_only = report.store_only.len(),
                    mismatched = report.mismatch.len(),
                    "documents and store are out of sync; run `spectrack repair`"
                );
            }
            Some(report)
        }
        Err(e) => {
            warn!(error = %e, "integrity check failed");
            None
        }
    }
}
