use super::{Executor, check_parent};
use crate::core::{Result, Row};
use crate::model::RowCodec;
use crate::storage::TableId;
use crate::transaction::Transaction;

/// Inserts a batch of entities. A duplicate id or a parent reference to a
/// missing row anywhere in the batch fails the whole batch.
pub struct InsertExecutor<T> {
    entities: Vec<T>,
}

impl<T: RowCodec> InsertExecutor<T> {
    pub fn new(entities: Vec<T>) -> Self {
        Self { entities }
    }
}

impl<T: RowCodec + Send> Executor for InsertExecutor<T> {
    type Output = usize;

    fn name(&self) -> &'static str {
        "insert"
    }

    fn execute(self, txn: &mut Transaction) -> Result<usize> {
        for entity in &self.entities {
            check_parent(txn.view(), entity)?;
            let row: Row = entity.encode(txn.view().table(T::TABLE)?);
            txn.insert(T::TABLE, row)?;
        }
        Ok(self.entities.len())
    }
}

/// Empties one table. Child tables are not touched: rows that pointed into
/// the cleared table read as unassigned afterwards.
pub struct ClearExecutor {
    table: TableId,
}

impl ClearExecutor {
    pub fn new(table: TableId) -> Self {
        Self { table }
    }
}

impl Executor for ClearExecutor {
    type Output = usize;

    fn name(&self) -> &'static str {
        "clear"
    }

    fn execute(self, txn: &mut Transaction) -> Result<usize> {
        txn.clear(self.table)
    }
}
