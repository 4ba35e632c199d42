//! Write operations. Each executor runs inside one transaction, so a
//! multi-table operation such as a cascade delete commits or fails as a
//! whole.

pub mod delete;
pub mod dml;
pub mod update;

pub use delete::{CascadeReport, DeleteContainersExecutor, DeleteGroupingsExecutor, DeleteRecordsExecutor};
pub use dml::{ClearExecutor, InsertExecutor};
pub use update::{MoveRecordsExecutor, UpdateExecutor};

use crate::core::{DbError, Result, Value};
use crate::model::RowCodec;
use crate::storage::{StoreState, TableId};
use crate::transaction::Transaction;

pub trait Executor: Send {
    type Output: Send;

    /// Operation name for logs.
    fn name(&self) -> &'static str;

    fn execute(self, txn: &mut Transaction) -> Result<Self::Output>;
}

/// Fails with `ConstraintViolation` unless `key` is stored in `parent`.
pub(crate) fn require_parent(
    state: &StoreState,
    child: TableId,
    parent: TableId,
    key: &Value,
) -> Result<()> {
    if state.table(parent)?.contains_key(key) {
        Ok(())
    } else {
        Err(DbError::ConstraintViolation(format!(
            "{} row references {} {} which does not exist",
            child, parent, key
        )))
    }
}

pub(crate) fn check_parent<T: RowCodec>(state: &StoreState, entity: &T) -> Result<()> {
    match entity.parent() {
        Some((parent, key)) => require_parent(state, T::TABLE, parent, &key),
        None => Ok(()),
    }
}
