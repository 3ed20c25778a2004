//! put/get/list/delete over the `specs` table

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row, TransactionBehavior};

use super::{format_ts, parse_enum, parse_ts, SpecRecord, SpecStore, StoreError};
use crate::core::phase::Phase;

const SPEC_COLUMNS: &str =
    "id, name, description, phase, branch_name, created_at, updated_at";

fn spec_from_row(row: &Row<'_>) -> rusqlite::Result<SpecRecord> {
    Ok(SpecRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        phase: parse_enum(3, &row.get::<_, String>(3)?)?,
        branch_name: row.get(4)?,
        created_at: parse_ts(5, &row.get::<_, String>(5)?)?,
        updated_at: parse_ts(6, &row.get::<_, String>(6)?)?,
    })
}

impl SpecStore {
    /// Insert or replace a whole spec record
    pub fn put_spec(&self, spec: &SpecRecord) -> Result<(), StoreError> {
        self.conn.execute(
            r#"INSERT INTO specs (id, name, description, phase, branch_name, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
               ON CONFLICT(id) DO UPDATE SET
                   name = excluded.name,
                   description = excluded.description,
                   phase = excluded.phase,
                   branch_name = excluded.branch_name,
                   created_at = excluded.created_at,
                   updated_at = excluded.updated_at"#,
            params![
                spec.id,
                spec.name,
                spec.description,
                spec.phase.as_str(),
                spec.branch_name,
                format_ts(&spec.created_at),
                format_ts(&spec.updated_at),
            ],
        )?;
        Ok(())
    }

    /// Get a spec by id, failing with NotFound when absent
    pub fn get_spec(&self, id: &str) -> Result<SpecRecord, StoreError> {
        self.find_spec(id)?.ok_or_else(|| StoreError::NotFound {
            kind: "spec",
            id: id.to_string(),
        })
    }

    /// Get a spec by id if present
    pub fn find_spec(&self, id: &str) -> Result<Option<SpecRecord>, StoreError> {
        let spec = self
            .conn
            .query_row(
                &format!("SELECT {} FROM specs WHERE id = ?1", SPEC_COLUMNS),
                params![id],
                spec_from_row,
            )
            .optional()?;
        Ok(spec)
    }

    /// All specs, oldest first
    pub fn list_specs(&self) -> Result<Vec<SpecRecord>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM specs ORDER BY created_at, id",
            SPEC_COLUMNS
        ))?;
        let rows = stmt.query_map([], spec_from_row)?;
        let specs = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(specs)
    }

    /// Specs currently in the given phase
    pub fn list_specs_in_phase(&self, phase: Phase) -> Result<Vec<SpecRecord>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM specs WHERE phase = ?1 ORDER BY created_at, id",
            SPEC_COLUMNS
        ))?;
        let rows = stmt.query_map(params![phase.as_str()], spec_from_row)?;
        let specs = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(specs)
    }

    /// Ids of every spec in the store
    pub fn spec_ids(&self) -> Result<BTreeSet<String>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT id FROM specs")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let ids = rows.collect::<rusqlite::Result<BTreeSet<_>>>()?;
        Ok(ids)
    }

    /// Update only the phase and updated timestamp of a spec
    pub fn set_spec_phase(
        &self,
        id: &str,
        phase: Phase,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let changed = self.conn.execute(
            "UPDATE specs SET phase = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, phase.as_str(), format_ts(&updated_at)],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                kind: "spec",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    /// Delete a spec and its workflow cursor in one transaction
    ///
    /// Sync records are kept as history of what was linked remotely.
    pub fn delete_spec(&self, id: &str) -> Result<(), StoreError> {
        let tx = rusqlite::Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let removed = tx.execute("DELETE FROM specs WHERE id = ?1", params![id])?;
        if removed == 0 {
            return Err(StoreError::NotFound {
                kind: "spec",
                id: id.to_string(),
            });
        }
        tx.execute("DELETE FROM workflow_state WHERE spec_id = ?1", params![id])?;
        tx.commit()?;
        Ok(())
    }
}
