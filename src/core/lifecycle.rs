//! Spec creation and phase advancement
//!
//! Both write the document first and then mirror it into the store, so an
//! interruption in between leaves a state `repair` resolves in the document's
//! favour.

use chrono::Utc;
use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::core::context::AppContext;
use crate::core::document::{
    self, default_body, render, set_header_fields, truncate_to_seconds, DocumentError,
    HeaderUpdate, SpecDocument, SpecMetadata,
};
use crate::core::phase::Phase;
use crate::core::phase_gate::GateResult;
use crate::core::store::{SpecRecord, StoreError};

#[derive(Debug, Error, Diagnostic)]
pub enum LifecycleError {
    #[error("spec name must not be empty")]
    #[diagnostic(code(spectrack::lifecycle::name))]
    EmptyName,

    #[error("spec '{id}' is already in phase '{phase}'")]
    #[diagnostic(code(spectrack::lifecycle::same_phase))]
    AlreadyInPhase { id: String, phase: Phase },

    #[error("cannot move spec '{id}' from '{from}' to '{to}'")]
    #[diagnostic(
        code(spectrack::lifecycle::sequence),
        help("phases advance one step at a time; pass --force to jump")
    )]
    InvalidTransition { id: String, from: Phase, to: Phase },

    #[error("spec '{id}' is not ready for '{to}':\n  - {}", .missing.join("\n  - "))]
    #[diagnostic(
        code(spectrack::lifecycle::gate),
        help("complete the listed sections, or pass --force to skip the checks")
    )]
    NeedsCompletion {
        id: String,
        to: Phase,
        missing: Vec<String>,
        placeholders: Vec<String>,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AdvanceOptions {
    /// Skip the sequence check and the phase gate
    pub force: bool,
}

/// What an advance did
#[derive(Debug, Clone, Serialize)]
pub struct AdvanceOutcome {
    pub from: Phase,
    pub to: Phase,
    pub gate: GateResult,
    pub record: SpecRecord,
    pub workflow_cleared: bool,
}

/// Create a spec document with a fresh id and register it in the store
pub fn create_spec(
    ctx: &AppContext,
    name: &str,
    description: Option<&str>,
    branch: Option<&str>,
) -> Result<SpecDocument, LifecycleError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(LifecycleError::EmptyName);
    }

    let now = truncate_to_seconds(Utc::now());
    let metadata = SpecMetadata {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        phase: Phase::default(),
        created_at: now,
        updated_at: now,
        description: description.map(str::trim).filter(|d| !d.is_empty()).map(String::from),
        branch_name: branch.map(String::from),
    };

    let dir = ctx.documents_dir();
    std::fs::create_dir_all(dir).map_err(|source| DocumentError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let path = document::document_path(dir, &metadata.id);
    let content = render(&metadata, &default_body());
    document::write_text(&path, &content)?;

    ctx.store.put_spec(&SpecRecord::from(&metadata))?;
    info!(spec_id = %metadata.id, name = %metadata.name, "spec created");

    Ok(SpecDocument {
        path,
        content,
        metadata,
    })
}

/// Evaluate a transition without changing anything
pub fn check_transition(
    ctx: &AppContext,
    id: &str,
    target: Phase,
) -> Result<GateResult, LifecycleError> {
    let doc = SpecDocument::load_for_id(ctx.documents_dir(), id)?;
    Ok(ctx
        .phase_gate()
        .evaluate(doc.metadata.phase, target, &doc.content, false))
}

/// Move a spec to `target`
///
/// Only the next phase in sequence is accepted unless forced (or in test
/// mode). The phase gate must pass. The document header is rewritten, the
/// store record replaced from it, and the workflow cursor dropped once the
/// spec is completed.
pub fn advance_phase(
    ctx: &AppContext,
    id: &str,
    target: Phase,
    options: AdvanceOptions,
) -> Result<AdvanceOutcome, LifecycleError> {
    let doc = SpecDocument::load_for_id(ctx.documents_dir(), id)?;
    let from = doc.metadata.phase;

    if from == target {
        return Err(LifecycleError::AlreadyInPhase {
            id: id.to_string(),
            phase: from,
        });
    }
    let bypass = options.force || ctx.config.workflow.test_mode;
    if !bypass && !from.is_next_step(target) {
        return Err(LifecycleError::InvalidTransition {
            id: id.to_string(),
            from,
            to: target,
        });
    }

    let gate = ctx
        .phase_gate()
        .evaluate(from, target, &doc.content, options.force);
    if let GateResult::NeedsCompletion {
        missing,
        placeholders,
    } = gate
    {
        return Err(LifecycleError::NeedsCompletion {
            id: id.to_string(),
            to: target,
            missing,
            placeholders,
        });
    }

    let text = set_header_fields(
        &doc.content,
        &HeaderUpdate {
            phase: Some(target),
            updated_at: Some(truncate_to_seconds(Utc::now())),
            ..Default::default()
        },
    );
    let metadata = document::parse(&text)?;
    document::write_text(&doc.path, &text)?;

    let record = SpecRecord::from(&metadata);
    ctx.store.put_spec(&record)?;

    let workflow_cleared = if target == Phase::Completed {
        ctx.store.delete_workflow_state(id)?
    } else {
        false
    };
    info!(spec_id = id, %from, to = %target, "phase advanced");

    Ok(AdvanceOutcome {
        from,
        to: target,
        gate,
        record,
        workflow_cleared,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::core::project::Project;
    use crate::core::store::{NextAction, SpecStore, WorkflowState};
    use tempfile::{tempdir, TempDir};

    fn context(test_mode: bool) -> (TempDir, AppContext) {
        let tmp = tempdir().unwrap();
        let project = Project::init(tmp.path()).unwrap();
        let mut config = Config::default();
        config.workflow.test_mode = test_mode;
        let ctx = AppContext::from_parts(project, config, SpecStore::open_in_memory().unwrap());
        (tmp, ctx)
    }

    fn fill_requirements(ctx: &AppContext, id: &str) {
        let path = document::document_path(ctx.documents_dir(), id);
        let text = std::fs::read_to_string(&path)
            .unwrap()
            .replacen("## Background\n\nTBD", "## Background\n\nContext", 1)
            .replacen("## Purpose\n\nTBD", "## Purpose\n\nGoal", 1)
            .replacen("- [ ] TBD", "- [ ] Works", 1);
        std::fs::write(&path, text).unwrap();
    }

    #[test]
    fn test_create_spec() {
        let (_tmp, ctx) = context(false);
        let doc = create_spec(&ctx, "  User auth ", Some("Login flow"), None).unwrap();

        assert!(doc.path.exists());
        assert_eq!(doc.metadata.name, "User auth");
        assert_eq!(doc.metadata.phase, Phase::Requirements);
        assert!(uuid::Uuid::parse_str(&doc.metadata.id).is_ok());
        assert!(document::validate(&doc.content).is_empty());

        let record = ctx.store.get_spec(&doc.metadata.id).unwrap();
        assert!(record.matches_document(&doc.metadata));
        assert!(matches!(
            create_spec(&ctx, "   ", None, None),
            Err(LifecycleError::EmptyName)
        ));
    }

    #[test]
    fn test_gate_blocks_placeholder_requirements() {
        let (_tmp, ctx) = context(false);
        let doc = create_spec(&ctx, "Spec", None, None).unwrap();
        let id = &doc.metadata.id;

        let err = advance_phase(&ctx, id, Phase::Design, AdvanceOptions::default()).unwrap_err();
        let LifecycleError::NeedsCompletion { placeholders, .. } = err else {
            panic!("expected NeedsCompletion, got {:?}", err);
        };
        assert_eq!(placeholders, vec!["Background", "Purpose", "Acceptance Criteria"]);
        // Nothing was written
        assert_eq!(ctx.store.get_spec(id).unwrap().phase, Phase::Requirements);

        fill_requirements(&ctx, id);
        let outcome = advance_phase(&ctx, id, Phase::Design, AdvanceOptions::default()).unwrap();
        assert_eq!(outcome.gate, GateResult::Allowed);

        let reread = SpecDocument::load_for_id(ctx.documents_dir(), id).unwrap();
        assert_eq!(reread.metadata.phase, Phase::Design);
        assert_eq!(ctx.store.get_spec(id).unwrap().phase, Phase::Design);
    }

    #[test]
    fn test_sequence_is_enforced_unless_forced() {
        let (_tmp, ctx) = context(false);
        let id = create_spec(&ctx, "Spec", None, None).unwrap().metadata.id;

        assert!(matches!(
            advance_phase(&ctx, &id, Phase::Review, AdvanceOptions::default()),
            Err(LifecycleError::InvalidTransition { .. })
        ));
        assert!(matches!(
            advance_phase(&ctx, &id, Phase::Requirements, AdvanceOptions::default()),
            Err(LifecycleError::AlreadyInPhase { .. })
        ));

        let outcome = advance_phase(&ctx, &id, Phase::Review, AdvanceOptions { force: true }).unwrap();
        assert_eq!(outcome.gate, GateResult::Bypassed);
        assert_eq!(outcome.record.phase, Phase::Review);
    }

    #[test]
    fn test_test_mode_bypasses_checks() {
        let (_tmp, ctx) = context(true);
        let id = create_spec(&ctx, "Spec", None, None).unwrap().metadata.id;
        let outcome =
            advance_phase(&ctx, &id, Phase::Implementation, AdvanceOptions::default()).unwrap();
        assert_eq!(outcome.to, Phase::Implementation);
    }

    #[test]
    fn test_completion_clears_workflow_state() {
        let (_tmp, ctx) = context(true);
        let id = create_spec(&ctx, "Spec", None, None).unwrap().metadata.id;
        ctx.store
            .save_workflow_state(&WorkflowState {
                spec_id: id.clone(),
                current_task_number: Some(3),
                current_task_title: Some("Wire up".to_string()),
                next_action: NextAction::TaskDone,
                remote_issue_number: None,
                saved_at: Utc::now(),
            })
            .unwrap();

        let outcome =
            advance_phase(&ctx, &id, Phase::Completed, AdvanceOptions::default()).unwrap();
        assert!(outcome.workflow_cleared);
        assert!(ctx.store.get_workflow_state(&id).unwrap().is_none());
    }

    #[test]
    fn test_check_transition_is_read_only() {
        let (_tmp, ctx) = context(false);
        let doc = create_spec(&ctx, "Spec", None, None).unwrap();
        let result = check_transition(&ctx, &doc.metadata.id, Phase::Design).unwrap();
        assert!(!result.is_allowed());
        let reread = std::fs::read_to_string(&doc.path).unwrap();
        assert_eq!(reread, doc.content);
    }
}
