//! Core module - documents, store, reconciliation and remote sync

pub mod config;
pub mod context;
pub mod document;
pub mod fsutil;
pub mod hash;
pub mod integrity;
pub mod lifecycle;
pub mod phase;
pub mod phase_gate;
pub mod project;
pub mod remote;
pub mod repair;
pub mod store;

pub use config::Config;
pub use context::{AppContext, ContextError};
pub use document::{DocumentError, SpecDocument, SpecMetadata};
pub use integrity::{IntegrityReport, MismatchEntry};
pub use lifecycle::{AdvanceOptions, LifecycleError};
pub use phase::Phase;
pub use phase_gate::{GateResult, PhaseGate};
pub use project::{Project, ProjectError};
pub use remote::{IssueTracker, RemoteSync, RemoteSyncError};
pub use repair::RepairOutcome;
pub use store::{SpecRecord, SpecStore, StoreError};
