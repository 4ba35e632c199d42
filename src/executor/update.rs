use super::{Executor, check_parent, require_parent};
use crate::core::Result;
use crate::model::codec::timestamp_to_value;
use crate::model::entity::now_millis;
use crate::model::{ContainerId, Record, RecordId, RowCodec};
use crate::storage::{TableId, columns};
use crate::transaction::Transaction;

/// Overwrites the stored row that has the entity's id with the entity's own
/// fields. An id that is not stored is a no-op, never an insert. A parent
/// reference to a missing row is rejected.
pub struct UpdateExecutor<T> {
    entity: T,
}

impl<T: RowCodec> UpdateExecutor<T> {
    pub fn new(entity: T) -> Self {
        Self { entity }
    }
}

impl<T: RowCodec + Send> Executor for UpdateExecutor<T> {
    type Output = bool;

    fn name(&self) -> &'static str {
        "update"
    }

    fn execute(self, txn: &mut Transaction) -> Result<bool> {
        if !txn.view().table(T::TABLE)?.contains_key(&self.entity.primary_key()) {
            return Ok(false);
        }
        check_parent(txn.view(), &self.entity)?;
        let row = self.entity.encode(txn.view().table(T::TABLE)?);
        txn.update(T::TABLE, row)
    }
}

/// Re-parents records, or unassigns them with `None`. Moved records get a
/// fresh `last_modified`. Unknown record ids are skipped; an unknown target
/// container fails the move.
pub struct MoveRecordsExecutor {
    ids: Vec<RecordId>,
    container: Option<ContainerId>,
}

impl MoveRecordsExecutor {
    pub fn new(ids: Vec<RecordId>, container: Option<ContainerId>) -> Self {
        Self { ids, container }
    }
}

impl Executor for MoveRecordsExecutor {
    type Output = usize;

    fn name(&self) -> &'static str {
        "move_records"
    }

    fn execute(self, txn: &mut Transaction) -> Result<usize> {
        if let Some(container) = self.container {
            require_parent(txn.view(), Record::TABLE, TableId::Containers, &container.into())?;
        }
        let table = txn.view().table(Record::TABLE)?;
        let parent_idx = table.column_index(columns::CONTAINER_ID)?;
        let modified_idx = table.column_index(columns::LAST_MODIFIED)?;
        let now = timestamp_to_value(now_millis());

        let moved: Vec<_> = self
            .ids
            .iter()
            .filter_map(|id| table.get(&(*id).into()))
            .map(|(_, row)| {
                let mut row = row.clone();
                row[parent_idx] = self.container.into();
                row[modified_idx] = now.clone();
                row
            })
            .collect();

        let mut count = 0;
        for row in moved {
            if txn.update(TableId::Records, row)? {
                count += 1;
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DbError, Value};
    use crate::executor::InsertExecutor;
    use crate::model::{Container, Grouping, GroupingId};
    use crate::query::{RecordFilter, RecordQuery, Query};
    use crate::storage::{StoreState, migrations};
    use crate::transaction::TransactionId;

    fn txn() -> Transaction {
        Transaction::new(TransactionId(1), migrations::migrate(StoreState::new()).unwrap())
    }

    #[test]
    fn test_update_unknown_id_is_noop() {
        let mut txn = txn();
        let updated = UpdateExecutor::new(Grouping::new("Ghost")).execute(&mut txn).unwrap();
        assert!(!updated);
        assert!(txn.is_empty());
        assert_eq!(txn.view().table(TableId::Groupings).unwrap().row_count(), 0);
    }

    #[test]
    fn test_update_ignores_derived_fields() {
        let mut txn = txn();
        let mut grouping = Grouping::new("Attic");
        InsertExecutor::new(vec![grouping.clone()]).execute(&mut txn).unwrap();

        grouping.name = "Loft".to_string();
        grouping.aggregate_value = 999.0;
        assert!(UpdateExecutor::new(grouping.clone()).execute(&mut txn).unwrap());

        let table = txn.view().table(TableId::Groupings).unwrap();
        let (_, row) = table.get(&grouping.id.into()).unwrap();
        assert_eq!(row.len(), 4);
        assert_eq!(row[1], Value::from("Loft"));
    }

    #[test]
    fn test_move_records() {
        let mut txn = txn();
        let record = Record::new("Kettle");
        let target = Container::new("Box");
        InsertExecutor::new(vec![target.clone()]).execute(&mut txn).unwrap();
        InsertExecutor::new(vec![record.clone()]).execute(&mut txn).unwrap();

        let moved = MoveRecordsExecutor::new(vec![record.id, RecordId::new()], Some(target.id))
            .execute(&mut txn)
            .unwrap();
        assert_eq!(moved, 1);

        let table = txn.view().table(TableId::Records).unwrap();
        let (_, row) = table.get(&record.id.into()).unwrap();
        assert_eq!(
            row[table.column_index(columns::CONTAINER_ID).unwrap()],
            Value::from(target.id)
        );
        let records = RecordQuery(RecordFilter::ByParent(target.id)).evaluate(txn.view()).unwrap();
        assert_eq!(records.len(), 1);

        MoveRecordsExecutor::new(vec![record.id], None).execute(&mut txn).unwrap();
        let records = RecordQuery(RecordFilter::Unassigned).evaluate(txn.view()).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_move_to_missing_container_fails() {
        let mut txn = txn();
        let record = Record::new("Kettle");
        InsertExecutor::new(vec![record.clone()]).execute(&mut txn).unwrap();
        let before = txn.change_count();

        let result = MoveRecordsExecutor::new(vec![record.id], Some(ContainerId::new())).execute(&mut txn);
        assert!(matches!(result, Err(DbError::ConstraintViolation(_))));
        assert_eq!(txn.change_count(), before);
    }

    #[test]
    fn test_update_to_missing_parent_fails() {
        let mut txn = txn();
        let mut container = Container::new("Crate");
        InsertExecutor::new(vec![container.clone()]).execute(&mut txn).unwrap();

        container.grouping_id = Some(GroupingId::new());
        let result = UpdateExecutor::new(container.clone()).execute(&mut txn);
        assert!(matches!(result, Err(DbError::ConstraintViolation(_))));

        // An unknown id stays a no-op even with a bad parent.
        let stranger = Container::new("Stranger").in_grouping(GroupingId::new());
        assert!(!UpdateExecutor::new(stranger).execute(&mut txn).unwrap());
    }
}
