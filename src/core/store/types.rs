//! Store record types
//!
//! Rows of the `specs`, `external_sync` and `workflow_state` tables.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::document::{truncate_to_seconds, SpecMetadata};
use crate::core::phase::Phase;

// =========================================================================
// Specs
// =========================================================================

/// Store projection of a spec
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpecRecord {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub phase: Phase,
    pub branch_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SpecRecord {
    /// True when every field mirrored from the document already matches
    pub fn matches_document(&self, meta: &SpecMetadata) -> bool {
        *self == SpecRecord::from(meta)
    }
}

impl From<&SpecMetadata> for SpecRecord {
    fn from(meta: &SpecMetadata) -> Self {
        Self {
            id: meta.id.clone(),
            name: meta.name.clone(),
            description: meta.description.clone(),
            phase: meta.phase,
            branch_name: meta.branch_name.clone(),
            created_at: truncate_to_seconds(meta.created_at),
            updated_at: truncate_to_seconds(meta.updated_at),
        }
    }
}

// =========================================================================
// External sync
// =========================================================================

/// Kind of local entity a sync record points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Spec,
    Task,
    Project,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Spec => "spec",
            EntityType::Task => "task",
            EntityType::Project => "project",
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "spec" => Ok(EntityType::Spec),
            "task" => Ok(EntityType::Task),
            "project" => Ok(EntityType::Project),
            _ => Err(format!("Unknown entity type: {}", s)),
        }
    }
}

/// Outcome of the last sync attempt recorded for a link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Success,
    Failed,
    Pending,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Success => "success",
            SyncStatus::Failed => "failed",
            SyncStatus::Pending => "pending",
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SyncStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(SyncStatus::Success),
            "failed" => Ok(SyncStatus::Failed),
            "pending" => Ok(SyncStatus::Pending),
            _ => Err(format!("Unknown sync status: {}", s)),
        }
    }
}

/// Bookkeeping row linking a local entity to a remote object
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncRecord {
    pub id: i64,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub external_id: Option<String>,
    pub external_number: Option<u64>,
    pub node_id: Option<String>,
    pub issue_number: Option<u64>,
    pub issue_url: Option<String>,
    pub pr_number: Option<u64>,
    pub pr_url: Option<String>,
    pub pr_merged_at: Option<DateTime<Utc>>,
    pub sync_status: SyncStatus,
    pub error_message: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub checkbox_hash: Option<String>,
    pub last_body_hash: Option<String>,
}

/// Fields known when a link is first established
#[derive(Debug, Clone, Default)]
pub struct NewLink {
    pub entity_id: String,
    pub external_id: Option<String>,
    pub node_id: Option<String>,
    pub issue_number: u64,
    pub issue_url: String,
    pub checkbox_hash: Option<String>,
    pub last_body_hash: Option<String>,
}

// =========================================================================
// Workflow state
// =========================================================================

/// What the resumable cursor expects to happen next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NextAction {
    TaskStart,
    TaskDone,
    #[default]
    None,
}

impl NextAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            NextAction::TaskStart => "task_start",
            NextAction::TaskDone => "task_done",
            NextAction::None => "none",
        }
    }
}

impl std::fmt::Display for NextAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NextAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "task_start" => Ok(NextAction::TaskStart),
            "task_done" => Ok(NextAction::TaskDone),
            "none" => Ok(NextAction::None),
            _ => Err(format!("Unknown next action: {}", s)),
        }
    }
}

impl clap::ValueEnum for NextAction {
    fn value_variants<'a>() -> &'a [Self] {
        &[NextAction::TaskStart, NextAction::TaskDone, NextAction::None]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(clap::builder::PossibleValue::new(self.as_str()))
    }
}

/// Resumable cursor into a spec's task list (one row per spec)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowState {
    pub spec_id: String,
    pub current_task_number: Option<u32>,
    pub current_task_title: Option<String>,
    pub next_action: NextAction,
    pub remote_issue_number: Option<u64>,
    pub saved_at: DateTime<Utc>,
}

// =========================================================================
// Statistics
// =========================================================================

/// Count for one group in a summary
#[derive(Debug, Clone, Serialize)]
pub struct GroupCount {
    pub group: String,
    pub count: usize,
}

/// Store statistics
#[derive(Debug, Default, Serialize)]
pub struct StoreStats {
    pub total_specs: usize,
    pub by_phase: Vec<GroupCount>,
    pub linked_specs: usize,
    pub failed_syncs: usize,
    pub workflow_states: usize,
    pub db_size_bytes: u64,
}
