//! Remote link bookkeeping in the `external_sync` table
//!
//! A link is a row with `sync_status = 'success'`; a partial unique index keeps
//! it to one per entity even across processes. The latest failed attempt is
//! kept as a history row per entity and never counts as a link.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row, Transaction, TransactionBehavior};

use super::{
    format_ts, parse_enum, parse_opt_ts, EntityType, NewLink, SpecStore, StoreError, SyncRecord,
    SyncStatus,
};

const SYNC_COLUMNS: &str = "id, entity_type, entity_id, external_id, external_number, node_id, \
     issue_number, issue_url, pr_number, pr_url, pr_merged_at, sync_status, error_message, \
     last_synced_at, checkbox_hash, last_body_hash";

fn sync_from_row(row: &Row<'_>) -> rusqlite::Result<SyncRecord> {
    Ok(SyncRecord {
        id: row.get(0)?,
        entity_type: parse_enum(1, &row.get::<_, String>(1)?)?,
        entity_id: row.get(2)?,
        external_id: row.get(3)?,
        external_number: row.get::<_, Option<i64>>(4)?.map(|n| n as u64),
        node_id: row.get(5)?,
        issue_number: row.get::<_, Option<i64>>(6)?.map(|n| n as u64),
        issue_url: row.get(7)?,
        pr_number: row.get::<_, Option<i64>>(8)?.map(|n| n as u64),
        pr_url: row.get(9)?,
        pr_merged_at: parse_opt_ts(10, row.get(10)?)?,
        sync_status: parse_enum(11, &row.get::<_, String>(11)?)?,
        error_message: row.get(12)?,
        last_synced_at: parse_opt_ts(13, row.get(13)?)?,
        checkbox_hash: row.get(14)?,
        last_body_hash: row.get(15)?,
    })
}

impl SpecStore {
    /// The active (success) link for an entity, if any
    pub fn active_link(
        &self,
        entity_type: EntityType,
        entity_id: &str,
    ) -> Result<Option<SyncRecord>, StoreError> {
        let record = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM external_sync
                     WHERE entity_type = ?1 AND entity_id = ?2 AND sync_status = 'success'
                     ORDER BY id DESC LIMIT 1",
                    SYNC_COLUMNS
                ),
                params![entity_type.as_str(), entity_id],
                sync_from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Record a newly established link
    ///
    /// Fails with [`StoreError::Constraint`] if another process recorded a link
    /// for the same entity in the meantime.
    pub fn insert_link(
        &self,
        entity_type: EntityType,
        link: &NewLink,
        synced_at: DateTime<Utc>,
    ) -> Result<SyncRecord, StoreError> {
        self.conn.execute(
            r#"INSERT INTO external_sync
               (entity_type, entity_id, external_id, external_number, node_id, issue_number,
                issue_url, sync_status, last_synced_at, checkbox_hash, last_body_hash)
               VALUES (?1, ?2, ?3, ?4, ?5, ?4, ?6, 'success', ?7, ?8, ?9)"#,
            params![
                entity_type.as_str(),
                link.entity_id,
                link.external_id,
                link.issue_number as i64,
                link.node_id,
                link.issue_url,
                format_ts(&synced_at),
                link.checkbox_hash,
                link.last_body_hash,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_sync_record(id)
    }

    /// Record a failed attempt to reach the remote for an entity
    ///
    /// Replaces any earlier failed row for the entity.
    pub fn record_sync_failure(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        message: &str,
    ) -> Result<(), StoreError> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "DELETE FROM external_sync
             WHERE entity_type = ?1 AND entity_id = ?2 AND sync_status = 'failed'",
            params![entity_type.as_str(), entity_id],
        )?;
        tx.execute(
            r#"INSERT INTO external_sync (entity_type, entity_id, sync_status, error_message)
               VALUES (?1, ?2, 'failed', ?3)"#,
            params![entity_type.as_str(), entity_id, message],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Get a sync record by row id
    pub fn get_sync_record(&self, id: i64) -> Result<SyncRecord, StoreError> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM external_sync WHERE id = ?1", SYNC_COLUMNS),
                params![id],
                sync_from_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound {
                kind: "sync record",
                id: id.to_string(),
            })
    }

    /// All active links of one entity type
    pub fn list_links(&self, entity_type: EntityType) -> Result<Vec<SyncRecord>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM external_sync
             WHERE entity_type = ?1 AND sync_status = 'success'
             ORDER BY id",
            SYNC_COLUMNS
        ))?;
        let rows = stmt.query_map(params![entity_type.as_str()], sync_from_row)?;
        let records = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// Every record (links and failed attempts) for an entity, newest first
    pub fn sync_history(
        &self,
        entity_type: EntityType,
        entity_id: &str,
    ) -> Result<Vec<SyncRecord>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM external_sync
             WHERE entity_type = ?1 AND entity_id = ?2
             ORDER BY id DESC",
            SYNC_COLUMNS
        ))?;
        let rows = stmt.query_map(params![entity_type.as_str(), entity_id], sync_from_row)?;
        let records = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// Stamp a successful push: sync time, body fingerprints, cleared error
    pub fn mark_synced(
        &self,
        record_id: i64,
        synced_at: DateTime<Utc>,
        body_hash: &str,
        checkbox_hash: &str,
    ) -> Result<(), StoreError> {
        self.update_sync_row(
            "UPDATE external_sync
             SET last_synced_at = ?2, last_body_hash = ?3, checkbox_hash = ?4, error_message = NULL
             WHERE id = ?1",
            params![record_id, format_ts(&synced_at), body_hash, checkbox_hash],
            record_id,
        )
    }

    /// Note the last error on a link without changing its status
    pub fn set_sync_error(&self, record_id: i64, message: &str) -> Result<(), StoreError> {
        self.update_sync_row(
            "UPDATE external_sync SET error_message = ?2 WHERE id = ?1",
            params![record_id, message],
            record_id,
        )
    }

    /// Attach a pull request to a link
    pub fn record_pull_request(
        &self,
        record_id: i64,
        pr_number: u64,
        pr_url: &str,
    ) -> Result<(), StoreError> {
        self.update_sync_row(
            "UPDATE external_sync SET pr_number = ?2, pr_url = ?3, pr_merged_at = NULL WHERE id = ?1",
            params![record_id, pr_number as i64, pr_url],
            record_id,
        )
    }

    /// Record when the linked pull request was merged
    pub fn record_pr_merged(
        &self,
        record_id: i64,
        merged_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.update_sync_row(
            "UPDATE external_sync SET pr_merged_at = ?2 WHERE id = ?1",
            params![record_id, format_ts(&merged_at)],
            record_id,
        )
    }

    fn update_sync_row(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
        record_id: i64,
    ) -> Result<(), StoreError> {
        let changed = self.conn.execute(sql, params)?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                kind: "sync record",
                id: record_id.to_string(),
            });
        }
        Ok(())
    }
}
