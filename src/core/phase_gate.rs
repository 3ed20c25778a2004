//! Content checks that gate phase transitions
//!
//! Each rule inspects the document body for one `(from, to)` pair. Pairs with
//! no rule always pass, and `force` or test mode skip the checks entirely.

use serde::Serialize;

use crate::core::hash::parse_checkbox;
use crate::core::phase::Phase;

/// Outcome of a gate evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum GateResult {
    Allowed,
    /// Checks skipped by `force` or test mode
    Bypassed,
    NeedsCompletion {
        missing: Vec<String>,
        /// Sections that hold only placeholder text
        placeholders: Vec<String>,
    },
}

impl GateResult {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, GateResult::NeedsCompletion { .. })
    }
}

/// Problems found by one rule
#[derive(Debug, Default)]
struct Findings {
    missing: Vec<String>,
    placeholders: Vec<String>,
}

impl Findings {
    /// Require a section with real content under one of `names`
    fn require_section(&mut self, text: &str, names: &[&str]) {
        let shown = names.join("' or '");
        match names.iter().find_map(|name| section(text, name)) {
            None => self.missing.push(format!("Section '{}' is missing", shown)),
            Some(body) if body.trim().is_empty() => {
                self.missing.push(format!("Section '{}' is empty", shown))
            }
            Some(body) if is_placeholder(body) => {
                self.missing
                    .push(format!("Section '{}' still contains placeholder text", shown));
                self.placeholders.push(names[0].to_string());
            }
            Some(_) => {}
        }
    }
}

type RuleFn = fn(&str) -> Findings;

struct Rule {
    from: Phase,
    to: Phase,
    check: RuleFn,
}

/// Rule table keyed by transition
pub struct PhaseGate {
    rules: Vec<Rule>,
    test_mode: bool,
}

impl Default for PhaseGate {
    fn default() -> Self {
        Self::new(false)
    }
}

impl PhaseGate {
    pub fn new(test_mode: bool) -> Self {
        let rules = vec![
            Rule {
                from: Phase::Requirements,
                to: Phase::Design,
                check: requirements_complete,
            },
            Rule {
                from: Phase::Design,
                to: Phase::Tasks,
                check: design_complete,
            },
            Rule {
                from: Phase::Implementation,
                to: Phase::Review,
                check: tasks_done,
            },
            Rule {
                from: Phase::Review,
                to: Phase::Completed,
                check: review_written,
            },
        ];
        Self { rules, test_mode }
    }

    /// Evaluate the transition `from -> to` against a document's text
    pub fn evaluate(&self, from: Phase, to: Phase, text: &str, force: bool) -> GateResult {
        if force || self.test_mode {
            return GateResult::Bypassed;
        }
        let Some(rule) = self.rules.iter().find(|r| r.from == from && r.to == to) else {
            return GateResult::Allowed;
        };

        let findings = (rule.check)(text);
        if findings.missing.is_empty() {
            GateResult::Allowed
        } else {
            GateResult::NeedsCompletion {
                missing: findings.missing,
                placeholders: findings.placeholders,
            }
        }
    }
}

fn requirements_complete(text: &str) -> Findings {
    let mut findings = Findings::default();
    for name in ["Background", "Purpose", "Acceptance Criteria"] {
        findings.require_section(text, &[name]);
    }
    findings
}

fn design_complete(text: &str) -> Findings {
    let mut findings = Findings::default();
    findings.require_section(text, &["Design Details", "Architecture"]);
    findings
}

fn tasks_done(text: &str) -> Findings {
    let mut findings = Findings::default();
    match section(text, "Tasks") {
        None => findings.missing.push("Section 'Tasks' is missing".to_string()),
        Some(body) => {
            let open: Vec<&str> = body
                .lines()
                .filter_map(parse_checkbox)
                .filter(|(checked, _)| !checked)
                .map(|(_, task)| task)
                .collect();
            if !open.is_empty() {
                findings.missing.push(format!(
                    "{} unchecked task(s) in 'Tasks': {}",
                    open.len(),
                    open.join(", ")
                ));
            }
        }
    }
    findings
}

fn review_written(text: &str) -> Findings {
    let mut findings = Findings::default();
    findings.require_section(text, &["Review"]);
    findings
}

/// Body of the first `##` section titled `name` (case-insensitive), up to the
/// next heading of level 1 or 2
pub fn section<'a>(text: &'a str, name: &str) -> Option<&'a str> {
    let mut offset = 0;
    let mut start = None;
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim_end();
        let heading = trimmed
            .strip_prefix("## ")
            .or_else(|| trimmed.strip_prefix("# "));
        match (start, heading) {
            (None, Some(title)) if trimmed.starts_with("## ") && title.trim().eq_ignore_ascii_case(name) => {
                start = Some(offset + line.len());
            }
            (Some(begin), Some(_)) => return Some(&text[begin..offset]),
            _ => {}
        }
        offset += line.len();
    }
    start.map(|begin| &text[begin..])
}

/// True when every non-blank line is placeholder text (`TBD`, `TODO`, `<...>`)
pub fn is_placeholder(body: &str) -> bool {
    let mut lines = body
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .peekable();
    if lines.peek().is_none() {
        return false;
    }
    lines.all(|line| {
        let content = parse_checkbox(line)
            .map(|(_, text)| text)
            .or_else(|| line.strip_prefix("- "))
            .unwrap_or(line)
            .trim();
        let lower = content.to_ascii_lowercase();
        matches!(lower.as_str(), "tbd" | "todo" | "tba" | "..." | "n/a" | "")
            || (content.starts_with('<') && content.ends_with('>'))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPLETE: &str = "# Spec\n\n\
        ## Background\n\nUsers cannot log in.\n\n\
        ## Purpose\n\nAdd login.\n\n\
        ## Acceptance Criteria\n\n- [ ] User can log in\n\n\
        ## Design Details\n\nSession cookies.\n\n\
        ## Tasks\n\n- [x] Schema\n- [x] Endpoint\n\n\
        ## Review\n\nLooks good.\n";

    #[test]
    fn test_complete_document_passes_every_rule() {
        let gate = PhaseGate::default();
        for window in Phase::all().windows(2) {
            assert_eq!(
                gate.evaluate(window[0], window[1], COMPLETE, false),
                GateResult::Allowed,
                "{} -> {}",
                window[0],
                window[1]
            );
        }
    }

    #[test]
    fn test_placeholder_background_blocks_design() {
        let text = COMPLETE.replace("Users cannot log in.", "TBD");
        let result = PhaseGate::default().evaluate(Phase::Requirements, Phase::Design, &text, false);
        match result {
            GateResult::NeedsCompletion {
                missing,
                placeholders,
            } => {
                assert_eq!(placeholders, vec!["Background"]);
                assert_eq!(missing.len(), 1);
            }
            other => panic!("expected NeedsCompletion, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_and_empty_sections() {
        let text = "# Spec\n\n## Background\n\n## Purpose\nWhy\n";
        let result = PhaseGate::default().evaluate(Phase::Requirements, Phase::Design, text, false);
        let GateResult::NeedsCompletion { missing, placeholders } = result else {
            panic!("expected NeedsCompletion");
        };
        assert!(missing.iter().any(|m| m.contains("'Background' is empty")));
        assert!(missing.iter().any(|m| m.contains("'Acceptance Criteria' is missing")));
        assert!(placeholders.is_empty());
    }

    #[test]
    fn test_architecture_satisfies_design_rule() {
        let text = "# Spec\n\n## Architecture\n\nLayered.\n";
        assert!(PhaseGate::default()
            .evaluate(Phase::Design, Phase::Tasks, text, false)
            .is_allowed());
    }

    #[test]
    fn test_unchecked_tasks_block_review() {
        let text = COMPLETE.replace("- [x] Endpoint", "- [ ] Endpoint");
        let result =
            PhaseGate::default().evaluate(Phase::Implementation, Phase::Review, &text, false);
        let GateResult::NeedsCompletion { missing, .. } = result else {
            panic!("expected NeedsCompletion");
        };
        assert_eq!(missing, vec!["1 unchecked task(s) in 'Tasks': Endpoint"]);
    }

    #[test]
    fn test_unregistered_pair_passes() {
        let gate = PhaseGate::default();
        assert_eq!(
            gate.evaluate(Phase::Tasks, Phase::Implementation, "# Empty\n", false),
            GateResult::Allowed
        );
        assert_eq!(
            gate.evaluate(Phase::Requirements, Phase::Completed, "# Empty\n", false),
            GateResult::Allowed
        );
    }

    #[test]
    fn test_force_and_test_mode_bypass() {
        let empty = "# Empty\n";
        assert_eq!(
            PhaseGate::default().evaluate(Phase::Review, Phase::Completed, empty, true),
            GateResult::Bypassed
        );
        assert_eq!(
            PhaseGate::new(true).evaluate(Phase::Review, Phase::Completed, empty, false),
            GateResult::Bypassed
        );
    }

    #[test]
    fn test_section_extraction() {
        let text = "# T\n## One\nfirst\n### Sub\nnested\n## two\nsecond\n";
        assert_eq!(section(text, "one"), Some("first\n### Sub\nnested\n"));
        assert_eq!(section(text, "Two"), Some("second\n"));
        assert_eq!(section(text, "Three"), None);
    }

    #[test]
    fn test_is_placeholder() {
        assert!(is_placeholder("TBD"));
        assert!(is_placeholder("- [ ] TBD\n- <fill in>"));
        assert!(!is_placeholder("TBD\nActual text"));
        assert!(!is_placeholder("   "));
    }
}
