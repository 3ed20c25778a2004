//! Spec documents: markdown files with a fixed metadata header
//!
//! A spec document lives at `{documents_dir}/{id}.md` and starts with:
//!
//! ```text
//! # Spec name
//!
//! **Spec ID:** 6f1c...
//! **Phase:** design
//! **Created:** 2025/01/15 10:30:00
//! **Updated:** 2025/01/16 09:00:00
//! ```
//!
//! followed by free-form sections. The document is the source of truth for
//! everything in its header; the store only mirrors it.

mod normalize;
mod validate;

pub use normalize::{normalize, NormalizeChange, NormalizeReport};
pub use validate::{validate, validate_file, ValidationIssue};

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use miette::Diagnostic;
use regex::Regex;
use thiserror::Error;

use crate::core::fsutil::atomic_write;
use crate::core::phase::Phase;

/// Timestamp pattern used in document headers (always UTC)
pub const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

pub const LABEL_ID: &str = "Spec ID";
pub const LABEL_PHASE: &str = "Phase";
pub const LABEL_CREATED: &str = "Created";
pub const LABEL_UPDATED: &str = "Updated";
pub const LABEL_DESCRIPTION: &str = "Description";
pub const LABEL_BRANCH: &str = "Branch";

/// Header labels in render order
pub const HEADER_LABELS: &[&str] = &[
    LABEL_ID,
    LABEL_PHASE,
    LABEL_CREATED,
    LABEL_UPDATED,
    LABEL_DESCRIPTION,
    LABEL_BRANCH,
];

static FIELD_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\*\*(?P<label>[^*]+?):\*\*\s?(?P<value>.*)$").expect("invalid field pattern")
});

/// Canonical metadata extracted from a spec document header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecMetadata {
    pub id: String,
    pub name: String,
    pub phase: Phase,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub description: Option<String>,
    pub branch_name: Option<String>,
}

/// Errors raised while reading a spec document
#[derive(Debug, Error, Diagnostic)]
pub enum DocumentError {
    #[error("missing title line")]
    #[diagnostic(
        code(spectrack::document::missing_title),
        help("the first heading of a spec document must be '# <spec name>'")
    )]
    MissingTitle,

    #[error("missing required field '**{label}:**'")]
    #[diagnostic(
        code(spectrack::document::missing_field),
        help("add a '**{label}:** <value>' line to the document header")
    )]
    MissingField { label: &'static str },

    #[error("invalid {label} timestamp '{value}'")]
    #[diagnostic(
        code(spectrack::document::timestamp),
        help("timestamps use the pattern YYYY/MM/DD HH:MM:SS; `spectrack normalize` can repair formatting drift")
    )]
    InvalidTimestamp { label: &'static str, value: String },

    #[error("unknown phase '{value}'")]
    #[diagnostic(
        code(spectrack::document::phase),
        help("valid phases: requirements, design, tasks, implementation, review, completed")
    )]
    UnknownPhase { value: String },

    #[error("embedded Spec ID '{embedded}' does not match file name '{expected}'")]
    #[diagnostic(code(spectrack::document::id_mismatch))]
    IdMismatch { embedded: String, expected: String },

    #[error("I/O error on {}: {source}", path.display())]
    #[diagnostic(code(spectrack::document::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DocumentError {
    /// Well-formed header with semantically invalid content
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            DocumentError::UnknownPhase { .. } | DocumentError::IdMismatch { .. }
        )
    }
}

/// A spec document loaded from disk
#[derive(Debug, Clone)]
pub struct SpecDocument {
    pub path: PathBuf,
    pub content: String,
    pub metadata: SpecMetadata,
}

impl SpecDocument {
    /// Read and parse the document at `path`
    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        let content = read_text(path)?;
        let metadata = parse(&content)?;
        Ok(Self {
            path: path.to_path_buf(),
            content,
            metadata,
        })
    }

    /// Read the document for `id` and check the embedded id against the file name
    pub fn load_for_id(documents_dir: &Path, id: &str) -> Result<Self, DocumentError> {
        let doc = Self::load(&document_path(documents_dir, id))?;
        if doc.metadata.id != id {
            return Err(DocumentError::IdMismatch {
                embedded: doc.metadata.id,
                expected: id.to_string(),
            });
        }
        Ok(doc)
    }
}

/// Path of the document for a spec id
pub fn document_path(documents_dir: &Path, id: &str) -> PathBuf {
    documents_dir.join(format!("{}.md", id))
}

/// Read a document as UTF-8 text
pub fn read_text(path: &Path) -> Result<String, DocumentError> {
    std::fs::read_to_string(path).map_err(|source| DocumentError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Write a document with write-temp-then-rename
pub fn write_text(path: &Path, text: &str) -> Result<(), DocumentError> {
    atomic_write(path, text.as_bytes()).map_err(|source| DocumentError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Extract the title (first `# ` line)
pub fn title(text: &str) -> Option<&str> {
    text.lines()
        .find_map(|line| line.strip_prefix("# "))
        .map(str::trim)
}

/// Value of the first `**label:**` line; later duplicates are ignored
pub fn header_field<'a>(text: &'a str, label: &str) -> Option<&'a str> {
    text.lines().find_map(|line| {
        let caps = FIELD_LINE.captures(line.trim_end())?;
        if caps.name("label")?.as_str().trim() == label {
            caps.name("value").map(|v| v.as_str().trim())
        } else {
            None
        }
    })
}

/// Parse the metadata header of a spec document
pub fn parse(text: &str) -> Result<SpecMetadata, DocumentError> {
    let name = title(text)
        .filter(|t| !t.is_empty())
        .ok_or(DocumentError::MissingTitle)?;
    let id = required(text, LABEL_ID)?;
    let phase_raw = required(text, LABEL_PHASE)?;
    let created_raw = required(text, LABEL_CREATED)?;
    let updated_raw = required(text, LABEL_UPDATED)?;

    let phase = phase_raw
        .parse::<Phase>()
        .map_err(|_| DocumentError::UnknownPhase {
            value: phase_raw.to_string(),
        })?;

    Ok(SpecMetadata {
        id: id.to_string(),
        name: name.to_string(),
        phase,
        created_at: parse_timestamp(LABEL_CREATED, created_raw)?,
        updated_at: parse_timestamp(LABEL_UPDATED, updated_raw)?,
        description: optional(text, LABEL_DESCRIPTION),
        branch_name: optional(text, LABEL_BRANCH),
    })
}

fn required<'a>(text: &'a str, label: &'static str) -> Result<&'a str, DocumentError> {
    header_field(text, label)
        .filter(|v| !v.is_empty())
        .ok_or(DocumentError::MissingField { label })
}

fn optional(text: &str, label: &str) -> Option<String> {
    header_field(text, label)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Convert a header timestamp to a UTC instant
pub fn parse_timestamp(label: &'static str, value: &str) -> Result<DateTime<Utc>, DocumentError> {
    NaiveDateTime::parse_from_str(value.trim(), TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| DocumentError::InvalidTimestamp {
            label,
            value: value.to_string(),
        })
}

/// Format an instant for a document header
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Drop sub-second precision; document timestamps carry whole seconds only
pub fn truncate_to_seconds(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.with_nanosecond(0).unwrap_or(ts)
}

/// Render a complete document from metadata and free-form body sections
pub fn render(meta: &SpecMetadata, body: &str) -> String {
    let mut out = format!("# {}\n\n", meta.name);
    out.push_str(&format!("**{}:** {}\n", LABEL_ID, meta.id));
    out.push_str(&format!("**{}:** {}\n", LABEL_PHASE, meta.phase));
    out.push_str(&format!(
        "**{}:** {}\n",
        LABEL_CREATED,
        format_timestamp(&meta.created_at)
    ));
    out.push_str(&format!(
        "**{}:** {}\n",
        LABEL_UPDATED,
        format_timestamp(&meta.updated_at)
    ));
    if let Some(description) = &meta.description {
        out.push_str(&format!("**{}:** {}\n", LABEL_DESCRIPTION, description));
    }
    if let Some(branch) = &meta.branch_name {
        out.push_str(&format!("**{}:** {}\n", LABEL_BRANCH, branch));
    }
    let body = body.trim_matches('\n');
    if !body.is_empty() {
        out.push('\n');
        out.push_str(body);
        out.push('\n');
    }
    out
}

/// Section skeleton for newly created specs
pub fn default_body() -> String {
    [
        "## Background\n\nTBD",
        "## Purpose\n\nTBD",
        "## Acceptance Criteria\n\n- [ ] TBD",
        "## Design Details\n\nTBD",
        "## Tasks\n\n- [ ] TBD",
        "## Review\n\nTBD",
    ]
    .join("\n\n")
}

/// Header fields to rewrite in place
#[derive(Debug, Default, Clone)]
pub struct HeaderUpdate {
    pub name: Option<String>,
    pub phase: Option<Phase>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Rewrite selected header lines, leaving every other line untouched
///
/// Only the first title line and the first occurrence of each field are
/// replaced, matching what [`parse`] reads. A field that is absent is
/// inserted after the last header field.
pub fn set_header_fields(text: &str, update: &HeaderUpdate) -> String {
    let mut lines: Vec<String> = text.lines().map(String::from).collect();

    if let Some(name) = &update.name {
        if let Some(idx) = lines.iter().position(|l| l.starts_with("# ")) {
            lines[idx] = format!("# {}", name);
        } else {
            lines.insert(0, format!("# {}", name));
        }
    }

    let mut replacements: Vec<(&str, String)> = Vec::new();
    if let Some(phase) = update.phase {
        replacements.push((LABEL_PHASE, phase.to_string()));
    }
    if let Some(updated) = &update.updated_at {
        replacements.push((LABEL_UPDATED, format_timestamp(updated)));
    }

    for (label, value) in replacements {
        let rendered = format!("**{}:** {}", label, value);
        match find_field_line(&lines, label) {
            Some(idx) => lines[idx] = rendered,
            None => {
                let after = last_header_line(&lines).map(|i| i + 1).unwrap_or(1);
                lines.insert(after.min(lines.len()), rendered);
            }
        }
    }

    let mut out = lines.join("\n");
    if text.ends_with('\n') {
        out.push('\n');
    }
    out
}

fn find_field_line(lines: &[String], label: &str) -> Option<usize> {
    lines.iter().position(|line| {
        FIELD_LINE
            .captures(line.trim_end())
            .and_then(|c| c.name("label"))
            .is_some_and(|l| l.as_str().trim() == label)
    })
}

fn last_header_line(lines: &[String]) -> Option<usize> {
    lines.iter().rposition(|line| {
        FIELD_LINE
            .captures(line.trim_end())
            .and_then(|c| c.name("label"))
            .is_some_and(|l| HEADER_LABELS.contains(&l.as_str().trim()))
    })
}
