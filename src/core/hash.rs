//! Content fingerprints for remote bodies
//!
//! The sync layer records these next to each link so a later pass can tell
//! whether the remote body or its checklist actually changed.

use sha2::{Digest, Sha256};

/// Compute SHA256 hash of content
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Hash a body after normalizing line endings and trailing whitespace
///
/// CRLF vs LF and trailing blanks are not content changes.
pub fn body_hash(body: &str) -> String {
    let canonical = body
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    compute_hash(canonical.trim_end())
}

/// Hash only the checklist state (`- [ ]` / `- [x]` lines) of a body
pub fn checkbox_hash(body: &str) -> String {
    let boxes = body
        .lines()
        .filter_map(parse_checkbox)
        .map(|(checked, text)| format!("{}:{}", if checked { 'x' } else { ' ' }, text))
        .collect::<Vec<_>>()
        .join("\n");
    compute_hash(&boxes)
}

/// Parse a markdown task-list line into (checked, text)
pub fn parse_checkbox(line: &str) -> Option<(bool, &str)> {
    let trimmed = line.trim_start();
    let rest = trimmed
        .strip_prefix("- ")
        .or_else(|| trimmed.strip_prefix("* "))?;
    if let Some(text) = rest.strip_prefix("[ ]") {
        Some((false, text.trim()))
    } else if let Some(text) = rest
        .strip_prefix("[x]")
        .or_else(|| rest.strip_prefix("[X]"))
    {
        Some((true, text.trim()))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_deterministic() {
        assert_eq!(compute_hash("hello"), compute_hash("hello"));
        assert_ne!(compute_hash("hello"), compute_hash("world"));
        assert_eq!(compute_hash("test").len(), 64);
    }

    #[test]
    fn test_body_hash_ignores_line_endings() {
        assert_eq!(body_hash("a\r\nb\r\n"), body_hash("a\nb"));
        assert_eq!(body_hash("a  \nb\n\n"), body_hash("a\nb"));
        assert_ne!(body_hash("a\nb"), body_hash("a\nc"));
    }

    #[test]
    fn test_checkbox_hash_tracks_only_checklist() {
        let before = "# Title\n- [ ] one\n- [x] two\nprose";
        let prose_edit = "# Other title\n- [ ] one\n- [x] two\nmore prose";
        let ticked = "# Title\n- [x] one\n- [x] two\nprose";

        assert_eq!(checkbox_hash(before), checkbox_hash(prose_edit));
        assert_ne!(checkbox_hash(before), checkbox_hash(ticked));
    }

    #[test]
    fn test_parse_checkbox() {
        assert_eq!(parse_checkbox("- [ ] write"), Some((false, "write")));
        assert_eq!(parse_checkbox("  * [X] done"), Some((true, "done")));
        assert_eq!(parse_checkbox("- plain item"), None);
    }
}
