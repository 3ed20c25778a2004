//! Explicitly constructed application context
//!
//! Commands build one [`AppContext`] and pass it down; nothing in the core
//! reaches for process-wide state.

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use thiserror::Error;

use crate::core::config::Config;
use crate::core::integrity::{self, IntegrityReport};
use crate::core::phase_gate::PhaseGate;
use crate::core::project::{Project, ProjectError};
use crate::core::remote::sync::Board;
use crate::core::remote::{GhClient, IssueTracker, RemoteSync, TrackerError};
use crate::core::store::{SpecStore, StoreError};

#[derive(Debug, Error, Diagnostic)]
pub enum ContextError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Project(#[from] ProjectError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),
}

/// Project, configuration and open store for one command invocation
pub struct AppContext {
    pub project: Project,
    pub config: Config,
    pub store: SpecStore,
    documents_dir: PathBuf,
}

impl AppContext {
    /// Discover the project from the current directory and open its store
    pub fn discover() -> Result<Self, ContextError> {
        Self::open(Project::discover()?)
    }

    /// Load layered configuration for `project` and open its store
    pub fn open(project: Project) -> Result<Self, ContextError> {
        let config = Config::load(Some(&project));
        let store = SpecStore::open(&project, config.store.busy_timeout())?;
        Ok(Self::from_parts(project, config, store))
    }

    /// Assemble a context from already-built parts
    pub fn from_parts(project: Project, config: Config, store: SpecStore) -> Self {
        let documents_dir = project.documents_dir(&config.documents_dir);
        Self {
            project,
            config,
            store,
            documents_dir,
        }
    }

    pub fn documents_dir(&self) -> &Path {
        &self.documents_dir
    }

    pub fn phase_gate(&self) -> PhaseGate {
        PhaseGate::new(self.config.workflow.test_mode)
    }

    /// GitHub client from the `github` config section
    pub fn tracker(&self) -> Result<GhClient, TrackerError> {
        GhClient::from_config(&self.config.github, self.project.root())
    }

    /// Sync service over this context's store and documents
    pub fn remote<'a>(&'a self, tracker: &'a dyn IssueTracker) -> RemoteSync<'a> {
        let board = self.config.github.project_number.map(|project_number| Board {
            project_number,
            field: self.config.github.status_field.clone(),
        });
        RemoteSync::new(&self.store, tracker, &self.documents_dir).with_board(board)
    }

    /// Warn-only integrity check, when enabled in config
    pub fn auto_check(&self) -> Option<IntegrityReport> {
        if !self.config.integrity.auto_check {
            return None;
        }
        integrity::check_opportunistic(&self.store, &self.documents_dir)
    }
}
