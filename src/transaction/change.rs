// ============================================================================
// Transaction Change Tracking
// ============================================================================
//
// Every mutation staged by a transaction is recorded as a `Change`. The list
// is what gets written to the WAL, and replaying it against the state the
// transaction started from reproduces the committed state exactly.
//
// ============================================================================

use crate::core::{DbError, Result, Row};
use crate::storage::{StoreState, TableId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Change {
    /// Insert a new row into a table
    Insert { table: TableId, row: Row },

    /// Replace the row with the same primary key
    Update {
        table: TableId,
        old_row: Row,
        new_row: Row,
    },

    /// Delete an existing row
    Delete { table: TableId, old_row: Row },

    /// Remove every row of a table
    Clear { table: TableId, removed: usize },
}

impl Change {
    pub fn table(&self) -> TableId {
        match self {
            Change::Insert { table, .. }
            | Change::Update { table, .. }
            | Change::Delete { table, .. }
            | Change::Clear { table, .. } => *table,
        }
    }

    /// Re-applies this change during WAL replay.
    pub fn apply(&self, state: &mut StoreState) -> Result<()> {
        let table = state.table_mut(self.table())?;
        match self {
            Change::Insert { row, .. } => {
                table.insert(row.clone())?;
            }
            Change::Update { new_row, .. } => {
                if table.update(new_row.clone())?.is_none() {
                    return Err(DbError::Corrupted(format!(
                        "WAL updates a missing row in '{}'",
                        table.name()
                    )));
                }
            }
            Change::Delete { old_row, .. } => {
                let key = table.primary_key_of(old_row)?;
                if table.delete(&key).is_none() {
                    return Err(DbError::Corrupted(format!(
                        "WAL deletes missing key {} from '{}'",
                        key,
                        table.name()
                    )));
                }
            }
            Change::Clear { .. } => {
                table.clear();
            }
        }
        Ok(())
    }
}
