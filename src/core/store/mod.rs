//! SQLite-backed spec store
//!
//! The store is a query-optimized projection of the spec documents plus the
//! bookkeeping that only exists here (remote links, workflow cursors):
//! - every operation is a single statement or transaction, so a reader never
//!   sees half a record
//! - WAL journaling keeps writes crash-safe
//! - lock contention waits up to the configured busy timeout, then surfaces
//!   as [`StoreError::Busy`]; retrying is the caller's decision

mod external_sync;
mod schema;
mod specs;
mod types;
mod workflow_state;

pub use types::*;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use miette::Diagnostic;
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode};
use thiserror::Error;

use crate::core::project::Project;

/// Store file location within a project
pub const STORE_FILE: &str = ".spectrack/store.db";

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

/// Default wait for a competing writer before giving up
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Errors raised by the local store
#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("store is locked by another process")]
    #[diagnostic(
        code(spectrack::store::busy),
        help("another spectrack command is writing to the store; retry in a moment")
    )]
    Busy,

    #[error("{kind} '{id}' not found in store")]
    #[diagnostic(code(spectrack::store::not_found))]
    NotFound { kind: &'static str, id: String },

    #[error("store constraint violated: {message}")]
    #[diagnostic(code(spectrack::store::constraint))]
    Constraint { message: String },

    #[error("store schema version {found} is not supported (expected {expected})")]
    #[diagnostic(
        code(spectrack::store::schema),
        help("this store was written by a different spectrack version; back it up and run `spectrack repair` on a fresh store")
    )]
    Schema { found: i32, expected: i32 },

    #[error("store I/O error: {0}")]
    #[diagnostic(code(spectrack::store::io))]
    Sqlite(#[source] rusqlite::Error),

    #[error("store I/O error: {0}")]
    #[diagnostic(code(spectrack::store::io))]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Lock timeouts may succeed on a later attempt; everything else will not
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Busy)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => StoreError::Busy,
            Some(ErrorCode::ConstraintViolation) => StoreError::Constraint {
                message: err.to_string(),
            },
            _ => StoreError::Sqlite(err),
        }
    }
}

/// The spec store backed by SQLite
pub struct SpecStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SpecStore {
    /// Open or create the store for a project
    pub fn open(project: &Project, busy_timeout: Duration) -> Result<Self, StoreError> {
        Self::open_path(&project.root().join(STORE_FILE), busy_timeout)
    }

    /// Open or create a store file at an explicit path
    pub fn open_path(path: &Path, busy_timeout: Duration) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        // WAL for crash safety and concurrent readers alongside a writer
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let store = Self {
            conn,
            path: Some(path.to_path_buf()),
        };
        store.ensure_schema()?;
        Ok(store)
    }

    /// Open a private in-memory store (for testing)
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let store = Self {
            conn: Connection::open_in_memory()?,
            path: None,
        };
        store.ensure_schema()?;
        Ok(store)
    }

    /// Location of the store file, if file-backed
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Copy the whole database to `dest` as a consistent snapshot
    pub fn backup(&self, dest: &Path) -> Result<(), StoreError> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        if dest.exists() {
            fs::remove_file(dest)?;
        }
        self.conn
            .execute("VACUUM INTO ?1", params![dest.to_string_lossy()])?;
        Ok(())
    }

    /// Get store statistics
    pub fn statistics(&self) -> Result<StoreStats, StoreError> {
        let total_specs: usize = self
            .conn
            .query_row("SELECT COUNT(*) FROM specs", [], |row| row.get(0))?;

        let mut by_phase = Vec::new();
        {
            let mut stmt = self
                .conn
                .prepare("SELECT phase, COUNT(*) FROM specs GROUP BY phase ORDER BY phase")?;
            let rows = stmt.query_map([], |row| {
                Ok(GroupCount {
                    group: row.get(0)?,
                    count: row.get::<_, i64>(1)? as usize,
                })
            })?;
            for row in rows {
                by_phase.push(row?);
            }
        }

        let linked_specs: usize = self.conn.query_row(
            "SELECT COUNT(*) FROM external_sync WHERE entity_type = 'spec' AND sync_status = 'success'",
            [],
            |row| row.get(0),
        )?;
        let failed_syncs: usize = self.conn.query_row(
            "SELECT COUNT(*) FROM external_sync WHERE sync_status = 'failed'",
            [],
            |row| row.get(0),
        )?;
        let workflow_states: usize =
            self.conn
                .query_row("SELECT COUNT(*) FROM workflow_state", [], |row| row.get(0))?;

        let db_size_bytes = self
            .path
            .as_ref()
            .and_then(|p| fs::metadata(p).ok())
            .map(|m| m.len())
            .unwrap_or(0);

        Ok(StoreStats {
            total_specs,
            by_phase,
            linked_specs,
            failed_syncs,
            workflow_states,
            db_size_bytes,
        })
    }
}

/// Format a timestamp for storage
fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Parse a stored timestamp inside a row mapper
fn parse_ts(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_opt_ts(idx: usize, s: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    s.map(|s| parse_ts(idx, &s)).transpose()
}

/// Parse a stored enum column inside a row mapper
fn parse_enum<T: std::str::FromStr<Err = String>>(idx: usize, s: &str) -> rusqlite::Result<T> {
    s.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}
