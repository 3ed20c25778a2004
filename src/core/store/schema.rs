//! Database schema initialization

use rusqlite::{params, OptionalExtension, Transaction, TransactionBehavior};

use super::{SpecStore, StoreError, SCHEMA_VERSION};

impl SpecStore {
    /// Create tables on a fresh database, or verify the version of an existing one
    ///
    /// Unlike a disposable cache the store holds sync links and workflow
    /// cursors that cannot be rebuilt from documents, so it is never dropped.
    pub(super) fn ensure_schema(&self) -> Result<(), StoreError> {
        let has_version_table: bool = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'",
                [],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);

        if has_version_table {
            let found: i32 = self
                .conn
                .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
                    row.get::<_, Option<i32>>(0)
                })?
                .unwrap_or(0);
            // Version table without a row: creation was interrupted
            if found == 0 {
                return self.init_schema();
            }
            if found != SCHEMA_VERSION {
                return Err(StoreError::Schema {
                    found,
                    expected: SCHEMA_VERSION,
                });
            }
            return Ok(());
        }

        self.init_schema()
    }

    /// Tables and the version row are written in one transaction
    fn init_schema(&self) -> Result<(), StoreError> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        tx.execute_batch(
            r#"
            -- Schema version tracking
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            );

            -- Spec projection (documents are authoritative)
            CREATE TABLE IF NOT EXISTS specs (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT,
                phase TEXT NOT NULL,
                branch_name TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_specs_phase ON specs(phase);

            -- Links between local entities and remote tracker objects
            CREATE TABLE IF NOT EXISTS external_sync (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                entity_type TEXT NOT NULL,
                entity_id TEXT NOT NULL,
                external_id TEXT,
                external_number INTEGER,
                node_id TEXT,
                issue_number INTEGER,
                issue_url TEXT,
                pr_number INTEGER,
                pr_url TEXT,
                pr_merged_at TEXT,
                sync_status TEXT NOT NULL,
                error_message TEXT,
                last_synced_at TEXT,
                checkbox_hash TEXT,
                last_body_hash TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_external_sync_entity
                ON external_sync(entity_type, entity_id);
            -- At most one active link per entity
            CREATE UNIQUE INDEX IF NOT EXISTS idx_external_sync_active
                ON external_sync(entity_type, entity_id)
                WHERE sync_status = 'success';

            -- Resumable task cursor, one row per spec
            CREATE TABLE IF NOT EXISTS workflow_state (
                spec_id TEXT NOT NULL UNIQUE,
                current_task_number INTEGER,
                current_task_title TEXT,
                next_action TEXT NOT NULL DEFAULT 'none',
                remote_issue_number INTEGER,
                saved_at TEXT NOT NULL
            );
            "#,
        )?;
        tx.execute(
            "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
            params![SCHEMA_VERSION],
        )?;
        tx.commit()?;

        Ok(())
    }
}
