// ============================================================================
// Transaction State
// ============================================================================
//
// A transaction owns a private copy of the committed `StoreState`. Every
// operation mutates that copy and records a `Change`. Nothing is visible to
// readers until the manager swaps the copy in; dropping the transaction
// instead discards everything it staged.
//
// ============================================================================

use super::Change;
use crate::core::{Result, Row, Value};
use crate::storage::{StoreState, TableId, TableSet};

/// Unique identifier for a transaction within one database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(pub u64);

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "txn_{}", self.0)
    }
}

#[derive(Debug)]
pub struct Transaction {
    id: TransactionId,

    /// Staged state. Starts as a clone of the committed state.
    working: StoreState,

    /// Changes made during this transaction, in execution order.
    changes: Vec<Change>,

    touched: TableSet,

    start_time: std::time::Instant,
}

impl Transaction {
    pub(crate) fn new(id: TransactionId, base: StoreState) -> Self {
        Self {
            id,
            working: base,
            changes: Vec::new(),
            touched: TableSet::empty(),
            start_time: std::time::Instant::now(),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// The staged state, including this transaction's own writes.
    pub fn view(&self) -> &StoreState {
        &self.working
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn change_count(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn touched(&self) -> TableSet {
        self.touched
    }

    pub fn duration(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }

    pub fn insert(&mut self, table: TableId, row: Row) -> Result<()> {
        self.working.table_mut(table)?.insert(row.clone())?;
        self.record(Change::Insert { table, row });
        Ok(())
    }

    /// Replaces the row with the same primary key. Returns `false` without
    /// recording anything when there is no such row.
    pub fn update(&mut self, table: TableId, row: Row) -> Result<bool> {
        let Some(old_row) = self.working.table_mut(table)?.update(row.clone())? else {
            return Ok(false);
        };
        self.record(Change::Update {
            table,
            old_row,
            new_row: row,
        });
        Ok(true)
    }

    /// Deletes by primary key. Unknown keys are skipped.
    pub fn delete(&mut self, table: TableId, key: &Value) -> Result<bool> {
        let Some(old_row) = self.working.table_mut(table)?.delete(key) else {
            return Ok(false);
        };
        self.record(Change::Delete { table, old_row });
        Ok(true)
    }

    pub fn delete_many<'a>(
        &mut self,
        table: TableId,
        keys: impl IntoIterator<Item = &'a Value>,
    ) -> Result<usize> {
        let mut deleted = 0;
        for key in keys {
            if self.delete(table, key)? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    /// Removes every row of one table. Other tables are left alone.
    pub fn clear(&mut self, table: TableId) -> Result<usize> {
        let removed = self.working.table_mut(table)?.clear().len();
        if removed > 0 {
            self.record(Change::Clear { table, removed });
        }
        Ok(removed)
    }

    fn record(&mut self, change: Change) {
        self.touched.insert(change.table());
        self.changes.push(change);
    }

    pub(crate) fn into_parts(self) -> (StoreState, Vec<Change>, TableSet) {
        (self.working, self.changes, self.touched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::migrations;

    fn txn() -> Transaction {
        let base = migrations::migrate(StoreState::new()).unwrap();
        Transaction::new(TransactionId(1), base)
    }

    fn grouping(id: &str) -> Row {
        vec![Value::from(id), Value::from("Office"), Value::Null, Value::Integer(0)]
    }

    #[test]
    fn test_writes_are_visible_inside_transaction() {
        let mut txn = txn();
        txn.insert(TableId::Groupings, grouping("g1")).unwrap();
        assert!(txn
            .view()
            .table(TableId::Groupings)
            .unwrap()
            .contains_key(&Value::from("g1")));
        assert_eq!(txn.touched(), TableSet::of(&[TableId::Groupings]));
    }

    #[test]
    fn test_noop_operations_record_nothing() {
        let mut txn = txn();
        assert!(!txn.update(TableId::Groupings, grouping("missing")).unwrap());
        assert!(!txn.delete(TableId::Groupings, &Value::from("missing")).unwrap());
        assert_eq!(txn.clear(TableId::Records).unwrap(), 0);
        assert!(txn.is_empty());
        assert!(txn.touched().is_empty());
    }

    #[test]
    fn test_failed_insert_leaves_working_copy_intact() {
        let mut txn = txn();
        txn.insert(TableId::Groupings, grouping("g1")).unwrap();
        assert!(txn.insert(TableId::Groupings, grouping("g1")).is_err());
        assert_eq!(txn.change_count(), 1);
        assert_eq!(txn.view().table(TableId::Groupings).unwrap().row_count(), 1);
    }
}
