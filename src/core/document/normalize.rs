//! Formatting-only repair of document headers
//!
//! Never called implicitly: reads go through [`super::parse`], which tolerates
//! nothing more than it documents. The caller decides whether to write the
//! normalized text back, based on the returned change list.

use std::sync::LazyLock;

use regex::Regex;

use super::{header_field, HEADER_LABELS, LABEL_CREATED, LABEL_UPDATED};

/// Bold label lines with drifted punctuation or spacing:
/// `**Label:**value`, `**Label**: value`, `**Label :** value`, `** Label:** value`
static LOOSE_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\*\*\s*(?P<label>[A-Za-z][A-Za-z ]*?)\s*(?::\s*\*\*|\*\*\s*:)\s*(?P<value>.*?)\s*$")
        .expect("invalid loose field pattern")
});

static LOOSE_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<y>\d{4})[/-](?P<mo>\d{1,2})[/-](?P<d>\d{1,2})(?:[ T]+(?P<h>\d{1,2}):(?P<mi>\d{1,2})(?::(?P<s>\d{1,2}))?)?$",
    )
    .expect("invalid loose timestamp pattern")
});

/// One rewritten line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizeChange {
    /// 1-based line number
    pub line: usize,
    pub before: String,
    pub after: String,
}

/// Result of a normalize pass
#[derive(Debug, Clone)]
pub struct NormalizeReport {
    pub changes: Vec<NormalizeChange>,
    /// Rewrites left undone because they would change a parsed field value
    pub skipped: Vec<NormalizeChange>,
    pub output: String,
}

impl NormalizeReport {
    /// True when the input was already canonical
    pub fn is_clean(&self) -> bool {
        self.changes.is_empty()
    }

    /// Unified-style listing of the changed lines
    pub fn diff(&self) -> String {
        self.changes
            .iter()
            .map(|c| format!("@@ line {} @@\n-{}\n+{}\n", c.line, c.before, c.after))
            .collect()
    }
}

/// Canonicalize header formatting without touching field values
///
/// A drifted line is only rewritten when the parsed value of its field stays
/// the same. A drifted first occurrence shadowed by a canonical duplicate
/// further down would otherwise become the value that wins; those lines are
/// reported in `skipped` and left as they are.
pub fn normalize(text: &str) -> NormalizeReport {
    let mut changes = Vec::new();
    let mut skipped = Vec::new();
    let mut out_lines: Vec<String> = text.lines().map(String::from).collect();

    for idx in 0..out_lines.len() {
        let line = out_lines[idx].clone();
        let Some((label, after)) = normalize_line(&line) else {
            continue;
        };
        if after == line {
            continue;
        }

        let before_value = header_field(&out_lines.join("\n"), label).map(String::from);
        out_lines[idx] = after.clone();
        let after_value = header_field(&out_lines.join("\n"), label).map(String::from);

        let change = NormalizeChange {
            line: idx + 1,
            before: line.clone(),
            after,
        };
        let preserved = match (&before_value, &after_value) {
            (None, _) => true,
            (Some(before), Some(after)) => same_value(label, before, after),
            (Some(_), None) => false,
        };
        if preserved {
            changes.push(change);
        } else {
            out_lines[idx] = line;
            skipped.push(change);
        }
    }

    let mut output = out_lines.join("\n");
    if text.ends_with('\n') {
        output.push('\n');
    }

    NormalizeReport {
        changes,
        skipped,
        output,
    }
}

/// Field values compare equal, treating timestamps by the instant they denote
fn same_value(label: &str, before: &str, after: &str) -> bool {
    if label == LABEL_CREATED || label == LABEL_UPDATED {
        let canonical = |v: &str| normalize_timestamp(v).unwrap_or_else(|| v.to_string());
        canonical(before) == canonical(after)
    } else {
        before == after
    }
}

fn normalize_line(line: &str) -> Option<(&'static str, String)> {
    let caps = LOOSE_FIELD.captures(line)?;
    let raw_label = caps.name("label")?.as_str();
    let label = HEADER_LABELS
        .iter()
        .find(|l| l.eq_ignore_ascii_case(raw_label))?;
    let value = caps.name("value")?.as_str();

    let value = if *label == LABEL_CREATED || *label == LABEL_UPDATED {
        normalize_timestamp(value).unwrap_or_else(|| value.to_string())
    } else {
        value.to_string()
    };

    Some((label, format!("**{}:** {}", label, value)))
}

/// Zero-pad date/time components and fill a missing time of day
///
/// The instant is unchanged: `2025/1/5` becomes `2025/01/05 00:00:00`.
fn normalize_timestamp(value: &str) -> Option<String> {
    let caps = LOOSE_TIMESTAMP.captures(value)?;
    let num = |name: &str| -> u32 {
        caps.name(name)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    };
    Some(format!(
        "{}/{:02}/{:02} {:02}:{:02}:{:02}",
        caps.name("y")?.as_str(),
        num("mo"),
        num("d"),
        num("h"),
        num("mi"),
        num("s"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::document::parse;

    #[test]
    fn test_canonical_document_is_clean() {
        let text = "# Spec\n\n**Spec ID:** abc\n**Phase:** design\n\
                    **Created:** 2025/01/05 08:00:00\n**Updated:** 2025/01/05 08:00:00\n";
        let report = normalize(text);
        assert!(report.is_clean());
        assert_eq!(report.output, text);
    }

    #[test]
    fn test_fixes_label_punctuation() {
        let text = "# Spec\n**Spec ID:**abc\n**Phase**: design\n**Created :** 2025/01/05 08:00:00\n";
        let report = normalize(text);
        assert_eq!(report.changes.len(), 3);
        assert!(report.output.contains("**Spec ID:** abc\n"));
        assert!(report.output.contains("**Phase:** design\n"));
        assert!(report.output.contains("**Created:** 2025/01/05 08:00:00\n"));
    }

    #[test]
    fn test_fills_missing_time_and_padding() {
        let text = "**Created:** 2025/1/5\n**Updated:** 2025/01/05 8:3\n";
        let report = normalize(text);
        assert_eq!(
            report.output,
            "**Created:** 2025/01/05 00:00:00\n**Updated:** 2025/01/05 08:03:00\n"
        );
    }

    #[test]
    fn test_values_are_preserved() {
        let text = "# Auth\n**spec id:**6f1c\n**Phase** : review\n\
                    **Created:** 2025/1/5 8:00:00\n**Updated:** 2025/01/06\n";
        let report = normalize(text);
        let meta = parse(&report.output).unwrap();
        assert_eq!(meta.id, "6f1c");
        assert_eq!(meta.phase.to_string(), "review");
        assert_eq!(
            crate::core::document::format_timestamp(&meta.created_at),
            "2025/01/05 08:00:00"
        );
    }

    #[test]
    fn test_unknown_labels_untouched() {
        let text = "**Note**: keep me\n";
        assert!(normalize(text).is_clean());
    }

    #[test]
    fn test_shadowed_drifted_line_is_skipped() {
        let text = "# Spec\n**Spec ID:** abc\n**Phase**: review\n**Phase:** design\n\
                    **Created:** 2025/01/05 08:00:00\n**Updated:** 2025/01/05 08:00:00\n";
        let before = parse(text).unwrap();
        let report = normalize(text);

        assert!(report.is_clean());
        assert_eq!(report.output, text);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].line, 3);
        assert_eq!(parse(&report.output).unwrap(), before);
    }

    #[test]
    fn test_drifted_duplicate_after_canonical_is_fixed() {
        let text = "**Phase:** design\n**Phase**: review\n";
        let report = normalize(text);
        assert_eq!(report.changes.len(), 1);
        assert!(report.skipped.is_empty());
        assert_eq!(report.output, "**Phase:** design\n**Phase:** review\n");
    }

    #[test]
    fn test_diff_lists_changes() {
        let report = normalize("**Phase**: design\n");
        let diff = report.diff();
        assert!(diff.contains("-**Phase**: design"));
        assert!(diff.contains("+**Phase:** design"));
    }
}
