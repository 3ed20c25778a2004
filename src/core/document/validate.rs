//! Strict header validation
//!
//! Parsing is lenient about formatting; this pass reports everything that a
//! well-kept document should satisfy without stopping at the first problem.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use super::{
    header_field, parse_timestamp, read_text, title, DocumentError, LABEL_CREATED, LABEL_ID,
    LABEL_PHASE, LABEL_UPDATED,
};
use crate::core::phase::Phase;

static UUID_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("invalid uuid pattern")
});

static EXACT_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}/\d{2}/\d{2} \d{2}:\d{2}:\d{2}$").expect("invalid timestamp pattern")
});

/// A single problem found in a document header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub field: &'static str,
    pub message: String,
}

impl ValidationIssue {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check id shape, phase membership and exact timestamp formatting
pub fn validate(text: &str) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if title(text).map_or(true, str::is_empty) {
        issues.push(ValidationIssue::new("Title", "missing '# <name>' line"));
    }

    match header_field(text, LABEL_ID) {
        None | Some("") => issues.push(ValidationIssue::new(LABEL_ID, "missing")),
        Some(id) if !UUID_SHAPE.is_match(id) => {
            issues.push(ValidationIssue::new(LABEL_ID, format!("'{}' is not a UUID", id)))
        }
        Some(_) => {}
    }

    match header_field(text, LABEL_PHASE) {
        None | Some("") => issues.push(ValidationIssue::new(LABEL_PHASE, "missing")),
        Some(phase) if phase.parse::<Phase>().is_err() => issues.push(ValidationIssue::new(
            LABEL_PHASE,
            format!("'{}' is not a known phase", phase),
        )),
        Some(_) => {}
    }

    let mut stamps = Vec::new();
    for label in [LABEL_CREATED, LABEL_UPDATED] {
        match header_field(text, label) {
            None | Some("") => issues.push(ValidationIssue::new(label, "missing")),
            Some(value) if !EXACT_TIMESTAMP.is_match(value) => issues.push(ValidationIssue::new(
                label,
                format!("'{}' is not formatted as YYYY/MM/DD HH:MM:SS", value),
            )),
            Some(value) => match parse_timestamp(label, value) {
                Ok(ts) => stamps.push(ts),
                Err(_) => issues.push(ValidationIssue::new(
                    label,
                    format!("'{}' is not a valid date/time", value),
                )),
            },
        }
    }

    if let [created, updated] = stamps.as_slice() {
        if updated < created {
            issues.push(ValidationIssue::new(
                LABEL_UPDATED,
                "is earlier than Created",
            ));
        }
    }

    issues
}

/// Validate a document file, including the file-name/embedded-id invariant
pub fn validate_file(path: &Path) -> Result<Vec<ValidationIssue>, DocumentError> {
    let text = read_text(path)?;
    let mut issues = validate(&text);

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    if let Some(id) = header_field(&text, LABEL_ID).filter(|id| !id.is_empty()) {
        if id != stem {
            issues.push(ValidationIssue::new(
                LABEL_ID,
                format!("'{}' does not match file name '{}'", id, stem),
            ));
        }
    }

    Ok(issues)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = "# Spec\n\n\
        **Spec ID:** 6f1c2a3b-4d5e-4f60-8a7b-9c0d1e2f3a4b\n\
        **Phase:** tasks\n\
        **Created:** 2025/01/05 08:00:00\n\
        **Updated:** 2025/01/06 08:00:00\n";

    #[test]
    fn test_valid_document_has_no_issues() {
        assert!(validate(VALID).is_empty());
    }

    #[test]
    fn test_reports_all_issues() {
        let text = "# Spec\n\
            **Spec ID:** abc123\n\
            **Phase:** shipping\n\
            **Created:** 2025/1/5 8:00:00\n\
            **Updated:** 2025/13/06 08:00:00\n";
        let issues = validate(text);
        let fields: Vec<_> = issues.iter().map(|i| i.field).collect();
        assert_eq!(
            fields,
            vec![LABEL_ID, LABEL_PHASE, LABEL_CREATED, LABEL_UPDATED]
        );
    }

    #[test]
    fn test_updated_before_created() {
        let text = VALID.replace("2025/01/06", "2025/01/01");
        let issues = validate(&text);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("earlier"));
    }

    #[test]
    fn test_validate_file_checks_name() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("not-the-id.md");
        std::fs::write(&path, VALID).unwrap();

        let issues = validate_file(&path).unwrap();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("does not match"));
    }
}
