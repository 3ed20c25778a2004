//! Single-row-per-spec workflow cursor

use rusqlite::{params, OptionalExtension, Row};

use super::{format_ts, parse_enum, parse_ts, SpecStore, StoreError, WorkflowState};

fn state_from_row(row: &Row<'_>) -> rusqlite::Result<WorkflowState> {
    Ok(WorkflowState {
        spec_id: row.get(0)?,
        current_task_number: row.get(1)?,
        current_task_title: row.get(2)?,
        next_action: parse_enum(3, &row.get::<_, String>(3)?)?,
        remote_issue_number: row.get::<_, Option<i64>>(4)?.map(|n| n as u64),
        saved_at: parse_ts(5, &row.get::<_, String>(5)?)?,
    })
}

impl SpecStore {
    /// Insert or replace the cursor for a spec
    pub fn save_workflow_state(&self, state: &WorkflowState) -> Result<(), StoreError> {
        self.conn.execute(
            r#"INSERT INTO workflow_state
               (spec_id, current_task_number, current_task_title, next_action,
                remote_issue_number, saved_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)
               ON CONFLICT(spec_id) DO UPDATE SET
                   current_task_number = excluded.current_task_number,
                   current_task_title = excluded.current_task_title,
                   next_action = excluded.next_action,
                   remote_issue_number = excluded.remote_issue_number,
                   saved_at = excluded.saved_at"#,
            params![
                state.spec_id,
                state.current_task_number,
                state.current_task_title,
                state.next_action.as_str(),
                state.remote_issue_number.map(|n| n as i64),
                format_ts(&state.saved_at),
            ],
        )?;
        Ok(())
    }

    /// The saved cursor for a spec, if any
    pub fn get_workflow_state(&self, spec_id: &str) -> Result<Option<WorkflowState>, StoreError> {
        let state = self
            .conn
            .query_row(
                r#"SELECT spec_id, current_task_number, current_task_title, next_action,
                          remote_issue_number, saved_at
                   FROM workflow_state WHERE spec_id = ?1"#,
                params![spec_id],
                state_from_row,
            )
            .optional()?;
        Ok(state)
    }

    /// Remove the cursor for a spec; returns whether one existed
    pub fn delete_workflow_state(&self, spec_id: &str) -> Result<bool, StoreError> {
        let removed = self
            .conn
            .execute("DELETE FROM workflow_state WHERE spec_id = ?1", params![spec_id])?;
        Ok(removed > 0)
    }
}
