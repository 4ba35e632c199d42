//! Read helpers for pickers and dashboards.

use super::relation::{Aggregate, Relation};
use super::rollup::round_cents;
use crate::core::{Result, Value};
use crate::model::{ContainerId, GroupingId, InventorySummary, NamedRef};
use crate::storage::{StoreState, Table, TableId, columns};

fn named_refs<Id>(table: &Table, parse: fn(&Value) -> Result<Id>) -> Result<Vec<NamedRef<Id>>> {
    let rel = Relation::scan(table, "t")
        .order_by(&["t.last_modified", "t._rowid"])?
        .project_as(&[("t.id", columns::ID), ("t.name", columns::NAME)])?;
    rel.iter()
        .map(|row| {
            Ok(NamedRef {
                id: parse(row.get(columns::ID)?)?,
                name: row.text(columns::NAME)?,
            })
        })
        .collect()
}

/// Every grouping as id + name, in rollup order.
pub fn grouping_options(state: &StoreState) -> Result<Vec<NamedRef<GroupingId>>> {
    named_refs(state.table(TableId::Groupings)?, GroupingId::from_value)
}

/// Every container as id + name, in rollup order.
pub fn container_options(state: &StoreState) -> Result<Vec<NamedRef<ContainerId>>> {
    named_refs(state.table(TableId::Containers)?, ContainerId::from_value)
}

fn count(value: &Value) -> usize {
    value.as_i64().and_then(|n| usize::try_from(n).ok()).unwrap_or(0)
}

/// Store-wide counts and totals. Dangling parent references count as
/// unassigned, like everywhere else.
pub fn inventory_summary(state: &StoreState) -> Result<InventorySummary> {
    let containers = Relation::scan(state.table(TableId::Containers)?, "c")
        .left_join(
            Relation::scan(state.table(TableId::Groupings)?, "g").project(&["g.id"])?,
            "c.grouping_id",
            "g.id",
        )?
        .group_by(
            &[],
            &[
                Aggregate::count("c.id", "containers"),
                Aggregate::count("g.id", "assigned"),
            ],
        )?;

    let records = Relation::scan(state.table(TableId::Records)?, "r")
        .left_join(
            Relation::scan(state.table(TableId::Containers)?, "c").project(&["c.id"])?,
            "r.container_id",
            "c.id",
        )?
        .group_by(
            &[],
            &[
                Aggregate::count("r.id", "records"),
                Aggregate::count("c.id", "assigned"),
                Aggregate::sum("r.numeric_value", "total_value"),
                Aggregate::max("r.is_sensitive", "any_sensitive"),
            ],
        )?;

    let (Some(c), Some(r)) = (containers.row(0), records.row(0)) else {
        return Ok(InventorySummary::default());
    };

    let container_count = count(c.get("containers")?);
    let record_count = count(r.get("records")?);
    Ok(InventorySummary {
        grouping_count: state.table(TableId::Groupings)?.row_count(),
        container_count,
        record_count,
        unassigned_container_count: container_count - count(c.get("assigned")?),
        unassigned_record_count: record_count - count(r.get("assigned")?),
        total_value: round_cents(r.get("total_value")?.as_f64().unwrap_or(0.0)),
        any_sensitive: r.get("any_sensitive")?.as_bool(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RecordId;
    use crate::storage::migrations;

    #[test]
    fn test_summary_of_empty_store() {
        let state = migrations::migrate(StoreState::new()).unwrap();
        assert_eq!(inventory_summary(&state).unwrap(), InventorySummary::default());
        assert!(grouping_options(&state).unwrap().is_empty());
    }

    #[test]
    fn test_summary_counts_orphans_as_unassigned() {
        let mut state = migrations::migrate(StoreState::new()).unwrap();
        let c = ContainerId::new();
        state
            .table_mut(TableId::Containers)
            .unwrap()
            .insert(vec![
                c.into(),
                Value::from("Box"),
                Value::Null,
                Value::Integer(0),
                GroupingId::new().into(),
            ])
            .unwrap();
        let records = state.table_mut(TableId::Records).unwrap();
        for (parent, value, sensitive) in [
            (Value::from(c), 10.25, false),
            (Value::from(ContainerId::new()), 4.0, true),
        ] {
            records
                .insert(vec![
                    RecordId::new().into(),
                    Value::from("Item"),
                    Value::Null,
                    Value::Float(value),
                    Value::Boolean(sensitive),
                    Value::Integer(0),
                    parent,
                    Value::Null,
                ])
                .unwrap();
        }

        let summary = inventory_summary(&state).unwrap();
        assert_eq!(summary.container_count, 1);
        assert_eq!(summary.unassigned_container_count, 1);
        assert_eq!(summary.record_count, 2);
        assert_eq!(summary.unassigned_record_count, 1);
        assert_eq!(summary.total_value, 14.25);
        assert!(summary.any_sensitive);

        let options = container_options(&state).unwrap();
        assert_eq!(options, vec![NamedRef { id: c, name: "Box".to_string() }]);
    }
}
