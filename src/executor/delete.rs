//! Deletes with cascade.
//!
//! Deleting a grouping removes the containers placed in it and the records
//! in those containers; deleting a container removes its records. The
//! descendant closure is computed first, then rows are removed leaves first
//! (records, containers, groupings) inside the caller's transaction, so the
//! cascade is never partially applied.

use super::Executor;
use crate::core::{Result, Value};
use crate::model::{ContainerId, GroupingId, RecordId};
use crate::storage::{StoreState, TableId, columns};
use crate::transaction::Transaction;
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

/// Rows removed per table by one delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeReport {
    pub groupings: usize,
    pub containers: usize,
    pub records: usize,
}

impl CascadeReport {
    pub fn total(&self) -> usize {
        self.groupings + self.containers + self.records
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

impl fmt::Display for CascadeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} groupings, {} containers, {} records",
            self.groupings, self.containers, self.records
        )
    }
}

/// Primary keys of rows in `table` whose `column` equals any of `parents`.
fn children_of(
    state: &StoreState,
    table: TableId,
    column: &str,
    parents: &BTreeSet<Value>,
) -> Result<BTreeSet<Value>> {
    let table = state.table(table)?;
    let id_idx = table.column_index(columns::ID)?;
    let mut children = BTreeSet::new();
    for parent in parents {
        for (_, row) in table.lookup(column, parent)? {
            children.insert(row[id_idx].clone());
        }
    }
    Ok(children)
}

/// The subset of `ids` stored in `table`. Children left behind by `clear`
/// still carry the old parent id; deleting that id must not reach them.
fn existing<I: Into<Value> + Copy>(
    state: &StoreState,
    table: TableId,
    ids: &[I],
) -> Result<BTreeSet<Value>> {
    let table = state.table(table)?;
    Ok(ids
        .iter()
        .map(|id| (*id).into())
        .filter(|id| table.contains_key(id))
        .collect())
}

fn remove(
    txn: &mut Transaction,
    records: &BTreeSet<Value>,
    containers: &BTreeSet<Value>,
    groupings: &BTreeSet<Value>,
) -> Result<CascadeReport> {
    let report = CascadeReport {
        records: txn.delete_many(TableId::Records, records)?,
        containers: txn.delete_many(TableId::Containers, containers)?,
        groupings: txn.delete_many(TableId::Groupings, groupings)?,
    };
    debug!(%report, "cascade delete staged");
    Ok(report)
}

pub struct DeleteGroupingsExecutor {
    ids: Vec<GroupingId>,
}

impl DeleteGroupingsExecutor {
    pub fn new(ids: Vec<GroupingId>) -> Self {
        Self { ids }
    }
}

impl Executor for DeleteGroupingsExecutor {
    type Output = CascadeReport;

    fn name(&self) -> &'static str {
        "delete_groupings"
    }

    fn execute(self, txn: &mut Transaction) -> Result<CascadeReport> {
        let groupings = existing(txn.view(), TableId::Groupings, &self.ids)?;
        let containers =
            children_of(txn.view(), TableId::Containers, columns::GROUPING_ID, &groupings)?;
        let records = children_of(txn.view(), TableId::Records, columns::CONTAINER_ID, &containers)?;
        remove(txn, &records, &containers, &groupings)
    }
}

pub struct DeleteContainersExecutor {
    ids: Vec<ContainerId>,
}

impl DeleteContainersExecutor {
    pub fn new(ids: Vec<ContainerId>) -> Self {
        Self { ids }
    }
}

impl Executor for DeleteContainersExecutor {
    type Output = CascadeReport;

    fn name(&self) -> &'static str {
        "delete_containers"
    }

    fn execute(self, txn: &mut Transaction) -> Result<CascadeReport> {
        let containers = existing(txn.view(), TableId::Containers, &self.ids)?;
        let records = children_of(txn.view(), TableId::Records, columns::CONTAINER_ID, &containers)?;
        remove(txn, &records, &containers, &BTreeSet::new())
    }
}

pub struct DeleteRecordsExecutor {
    ids: Vec<RecordId>,
}

impl DeleteRecordsExecutor {
    pub fn new(ids: Vec<RecordId>) -> Self {
        Self { ids }
    }
}

impl Executor for DeleteRecordsExecutor {
    type Output = CascadeReport;

    fn name(&self) -> &'static str {
        "delete_records"
    }

    fn execute(self, txn: &mut Transaction) -> Result<CascadeReport> {
        let records = existing(txn.view(), TableId::Records, &self.ids)?;
        remove(txn, &records, &BTreeSet::new(), &BTreeSet::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{ClearExecutor, InsertExecutor};
    use crate::model::{Container, Grouping, Record};
    use crate::storage::migrations;
    use crate::transaction::TransactionId;

    struct Fixture {
        txn: Transaction,
        g1: Grouping,
        g2: Grouping,
        c1: Container,
        c2: Container,
        c3: Container,
        loose: Record,
    }

    // g1 { c1 { r1, r2 }, c2 {} }, g2 { c3 { r3 } }, loose record.
    fn fixture() -> Fixture {
        let mut txn = Transaction::new(
            TransactionId(1),
            migrations::migrate(StoreState::new()).unwrap(),
        );
        let (g1, g2) = (Grouping::new("G1"), Grouping::new("G2"));
        let c1 = Container::new("C1").in_grouping(g1.id);
        let c2 = Container::new("C2").in_grouping(g1.id);
        let c3 = Container::new("C3").in_grouping(g2.id);
        let loose = Record::new("Loose");
        InsertExecutor::new(vec![g1.clone(), g2.clone()]).execute(&mut txn).unwrap();
        InsertExecutor::new(vec![c1.clone(), c2.clone(), c3.clone()])
            .execute(&mut txn)
            .unwrap();
        InsertExecutor::new(vec![
            Record::new("R1").in_container(c1.id),
            Record::new("R2").in_container(c1.id),
            Record::new("R3").in_container(c3.id),
            loose.clone(),
        ])
        .execute(&mut txn)
        .unwrap();
        Fixture { txn, g1, g2, c1, c2, c3, loose }
    }

    fn count(txn: &Transaction, table: TableId) -> usize {
        txn.view().table(table).unwrap().row_count()
    }

    #[test]
    fn test_grouping_cascade() {
        let mut f = fixture();
        let report = DeleteGroupingsExecutor::new(vec![f.g1.id]).execute(&mut f.txn).unwrap();
        assert_eq!(
            report,
            CascadeReport {
                groupings: 1,
                containers: 2,
                records: 2
            }
        );

        let view = f.txn.view();
        assert!(view.table(TableId::Groupings).unwrap().contains_key(&f.g2.id.into()));
        assert!(view.table(TableId::Containers).unwrap().contains_key(&f.c3.id.into()));
        assert!(!view.table(TableId::Containers).unwrap().contains_key(&f.c2.id.into()));
        let records = view.table(TableId::Records).unwrap();
        assert!(records.lookup(columns::CONTAINER_ID, &f.c1.id.into()).unwrap().is_empty());
        assert!(records.contains_key(&f.loose.id.into()));
        assert_eq!(records.row_count(), 2);
    }

    #[test]
    fn test_container_cascade_keeps_grouping() {
        let mut f = fixture();
        let report = DeleteContainersExecutor::new(vec![f.c1.id]).execute(&mut f.txn).unwrap();
        assert_eq!(report.records, 2);
        assert_eq!(report.containers, 1);
        assert_eq!(report.groupings, 0);
        assert_eq!(count(&f.txn, TableId::Groupings), 2);
    }

    #[test]
    fn test_unknown_ids_change_nothing() {
        let mut f = fixture();
        let before = f.txn.change_count();
        let report = DeleteGroupingsExecutor::new(vec![GroupingId::new()])
            .execute(&mut f.txn)
            .unwrap();
        assert!(report.is_empty());
        let report = DeleteRecordsExecutor::new(vec![RecordId::new()])
            .execute(&mut f.txn)
            .unwrap();
        assert!(report.is_empty());
        assert_eq!(f.txn.change_count(), before);
    }

    #[test]
    fn test_cleared_parent_id_does_not_reach_orphans() {
        let mut f = fixture();
        ClearExecutor::new(TableId::Groupings).execute(&mut f.txn).unwrap();
        let before = f.txn.change_count();

        let report = DeleteGroupingsExecutor::new(vec![f.g1.id]).execute(&mut f.txn).unwrap();
        assert!(report.is_empty());
        assert_eq!(count(&f.txn, TableId::Containers), 3);

        ClearExecutor::new(TableId::Containers).execute(&mut f.txn).unwrap();
        let report = DeleteContainersExecutor::new(vec![f.c1.id]).execute(&mut f.txn).unwrap();
        assert!(report.is_empty());
        assert_eq!(count(&f.txn, TableId::Records), 4);
        assert_eq!(f.txn.change_count(), before + 1);
    }

    #[test]
    fn test_record_delete_is_not_cascading() {
        let mut f = fixture();
        let report = DeleteRecordsExecutor::new(vec![f.loose.id, f.loose.id])
            .execute(&mut f.txn)
            .unwrap();
        assert_eq!(report.total(), 1);
        assert_eq!(count(&f.txn, TableId::Containers), 3);
    }
}
