//! Derived attributes for containers and groupings, computed at read time.
//!
//! Container rollup:
//!
//! ```text
//! containers c
//!   LEFT JOIN groupings g ON c.grouping_id = g.id      -- dangling parent -> NULL
//!   LEFT JOIN records   r ON r.container_id = c.id
//! GROUP BY c.id
//!   ROUND(COALESCE(SUM(r.numeric_value), 0), 2)  AS aggregate_value
//!   COALESCE(MAX(r.is_sensitive), false)         AS aggregate_sensitive
//!   COUNT(r.id)                                  AS record_count
//! ORDER BY c.last_modified, c._rowid
//! ```
//!
//! Grouping rollup joins the container rollup onto groupings the same way and
//! rounds its own sum again. Rounding only ever happens on a finished sum.

use super::relation::{Aggregate, Relation};
use crate::core::{Result, Value};
use crate::model::{ContainerId, GroupingId, RecordId};
use crate::storage::{StoreState, TableId, columns};

/// Rounds to two decimal places, half away from zero.
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn rounded_sum(value: Value) -> Value {
    Value::Float(round_cents(value.as_f64().unwrap_or(0.0)))
}

fn flag(value: Value) -> Value {
    Value::Boolean(value.as_bool())
}

fn zero_if_null(value: Value) -> Value {
    if value.is_null() { Value::Integer(0) } else { value }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupingFilter {
    All,
    ById(GroupingId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFilter {
    All,
    ById(ContainerId),
    /// Containers placed in one grouping.
    ByParent(GroupingId),
    /// Containers with no grouping, including those whose grouping is gone.
    Unassigned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFilter {
    All,
    ById(RecordId),
    ByParent(ContainerId),
    Unassigned,
}

/// Ids of the rows currently in `table` as a one-column relation
/// `alias.id`. Joined against to detect dangling parent references.
fn existing_ids(state: &StoreState, table: TableId, alias: &str) -> Result<Relation> {
    let id = format!("{}.{}", alias, columns::ID);
    Relation::scan(state.table(table)?, alias).project(&[id.as_str()])
}

/// Container rollup relation. Output columns are unqualified: the container's
/// own columns, `grouping_id` (NULL when dangling) and the three derived
/// fields.
pub fn container_rollups(state: &StoreState, filter: ContainerFilter) -> Result<Relation> {
    let containers = state.table(TableId::Containers)?;
    let records = state.table(TableId::Records)?;

    let (base, children) = match filter {
        ContainerFilter::All | ContainerFilter::Unassigned => {
            (Relation::scan(containers, "c"), Relation::scan(records, "r"))
        }
        ContainerFilter::ById(id) => (
            Relation::scan_where(containers, "c", columns::ID, &id.into())?,
            Relation::scan_where(records, "r", columns::CONTAINER_ID, &id.into())?,
        ),
        ContainerFilter::ByParent(grouping_id) => {
            let base =
                Relation::scan_where(containers, "c", columns::GROUPING_ID, &grouping_id.into())?;
            let id_idx = base.column_index("c.id")?;
            let children = Relation::scan_where_any(
                records,
                "r",
                columns::CONTAINER_ID,
                base.rows().iter().map(|row| &row[id_idx]),
            )?;
            (base, children)
        }
    };

    let joined = base
        .left_join(existing_ids(state, TableId::Groupings, "g")?, "c.grouping_id", "g.id")?
        .left_join(children, "c.id", "r.container_id")?;

    let joined = match filter {
        ContainerFilter::Unassigned => joined.filter_null("g.id")?,
        ContainerFilter::ByParent(grouping_id) => joined.filter_eq("g.id", &grouping_id.into())?,
        ContainerFilter::All | ContainerFilter::ById(_) => joined,
    };

    joined
        .group_by(
            &["c.id"],
            &[
                Aggregate::first("c.name"),
                Aggregate::first("c.description"),
                Aggregate::first("c.last_modified"),
                Aggregate::first("c._rowid"),
                Aggregate::first("g.id"),
                Aggregate::sum("r.numeric_value", "aggregate_value"),
                Aggregate::max("r.is_sensitive", "aggregate_sensitive"),
                Aggregate::count("r.id", "record_count"),
            ],
        )?
        .map_column("aggregate_value", rounded_sum)?
        .map_column("aggregate_sensitive", flag)?
        .order_by(&["c.last_modified", "c._rowid"])?
        .project_as(&[
            ("c.id", columns::ID),
            ("c.name", columns::NAME),
            ("c.description", columns::DESCRIPTION),
            ("c.last_modified", columns::LAST_MODIFIED),
            ("g.id", columns::GROUPING_ID),
            ("aggregate_value", "aggregate_value"),
            ("aggregate_sensitive", "aggregate_sensitive"),
            ("record_count", "record_count"),
        ])
}

/// Grouping rollup relation, built on top of [`container_rollups`].
pub fn grouping_rollups(state: &StoreState, filter: GroupingFilter) -> Result<Relation> {
    let groupings = state.table(TableId::Groupings)?;

    let (base, containers) = match filter {
        GroupingFilter::All => (
            Relation::scan(groupings, "g"),
            container_rollups(state, ContainerFilter::All)?,
        ),
        GroupingFilter::ById(id) => (
            Relation::scan_where(groupings, "g", columns::ID, &id.into())?,
            container_rollups(state, ContainerFilter::ByParent(id))?,
        ),
    };

    base.left_join(containers.alias("c"), "g.id", "c.grouping_id")?
        .group_by(
            &["g.id"],
            &[
                Aggregate::first("g.name"),
                Aggregate::first("g.description"),
                Aggregate::first("g.last_modified"),
                Aggregate::first("g._rowid"),
                Aggregate::sum("c.aggregate_value", "aggregate_value"),
                Aggregate::max("c.aggregate_sensitive", "aggregate_sensitive"),
                Aggregate::count("c.id", "container_count"),
                Aggregate::sum("c.record_count", "record_count"),
            ],
        )?
        .map_column("aggregate_value", rounded_sum)?
        .map_column("aggregate_sensitive", flag)?
        .map_column("record_count", zero_if_null)?
        .order_by(&["g.last_modified", "g._rowid"])?
        .project_as(&[
            ("g.id", columns::ID),
            ("g.name", columns::NAME),
            ("g.description", columns::DESCRIPTION),
            ("g.last_modified", columns::LAST_MODIFIED),
            ("aggregate_value", "aggregate_value"),
            ("aggregate_sensitive", "aggregate_sensitive"),
            ("container_count", "container_count"),
            ("record_count", "record_count"),
        ])
}

/// Records with `container_id` resolved against existing containers: a
/// record whose container is gone comes back unassigned.
pub fn record_rows(state: &StoreState, filter: RecordFilter) -> Result<Relation> {
    let records = state.table(TableId::Records)?;
    let base = match filter {
        RecordFilter::All | RecordFilter::Unassigned => Relation::scan(records, "r"),
        RecordFilter::ById(id) => Relation::scan_where(records, "r", columns::ID, &id.into())?,
        RecordFilter::ByParent(container_id) => {
            Relation::scan_where(records, "r", columns::CONTAINER_ID, &container_id.into())?
        }
    };

    let joined = base.left_join(
        existing_ids(state, TableId::Containers, "c")?,
        "r.container_id",
        "c.id",
    )?;
    let joined = match filter {
        RecordFilter::Unassigned => joined.filter_null("c.id")?,
        RecordFilter::ByParent(container_id) => joined.filter_eq("c.id", &container_id.into())?,
        RecordFilter::All | RecordFilter::ById(_) => joined,
    };

    joined.order_by(&["r.last_modified", "r._rowid"])?.project_as(&[
        ("r.id", columns::ID),
        ("r.name", columns::NAME),
        ("r.description", columns::DESCRIPTION),
        ("r.numeric_value", columns::NUMERIC_VALUE),
        ("r.is_sensitive", columns::IS_SENSITIVE),
        ("r.last_modified", columns::LAST_MODIFIED),
        ("c.id", columns::CONTAINER_ID),
        ("r.image_reference", columns::IMAGE_REFERENCE),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Row;
    use crate::storage::migrations;

    fn state() -> StoreState {
        migrations::migrate(StoreState::new()).unwrap()
    }

    fn add(state: &mut StoreState, table: TableId, row: Row) {
        state.table_mut(table).unwrap().insert(row).unwrap();
    }

    fn grouping(id: GroupingId, modified: i64) -> Row {
        vec![id.into(), Value::from("G"), Value::Null, Value::Integer(modified)]
    }

    fn container(id: ContainerId, parent: Option<GroupingId>, modified: i64) -> Row {
        vec![id.into(), Value::from("C"), Value::Null, Value::Integer(modified), parent.into()]
    }

    fn record(parent: Option<ContainerId>, value: f64, sensitive: bool) -> Row {
        vec![
            RecordId::new().into(),
            Value::from("R"),
            Value::Null,
            Value::Float(value),
            Value::Boolean(sensitive),
            Value::Integer(0),
            parent.into(),
            Value::Null,
        ]
    }

    #[test]
    fn test_round_cents() {
        assert_eq!(round_cents(0.1 + 0.2), 0.3);
        assert_eq!(round_cents(10.006), 10.01);
        assert_eq!(round_cents(-2.346), -2.35);
    }

    #[test]
    fn test_empty_container_still_reported() {
        let mut s = state();
        let c = ContainerId::new();
        add(&mut s, TableId::Containers, container(c, None, 0));

        let rel = container_rollups(&s, ContainerFilter::All).unwrap();
        assert_eq!(rel.len(), 1);
        let row = rel.row(0).unwrap();
        assert_eq!(row.float("aggregate_value").unwrap(), 0.0);
        assert!(!row.boolean("aggregate_sensitive").unwrap());
        assert_eq!(row.integer("record_count").unwrap(), 0);
    }

    #[test]
    fn test_sum_is_rounded_once_per_level() {
        let mut s = state();
        let g = GroupingId::new();
        let (c1, c2) = (ContainerId::new(), ContainerId::new());
        add(&mut s, TableId::Groupings, grouping(g, 0));
        add(&mut s, TableId::Containers, container(c1, Some(g), 0));
        add(&mut s, TableId::Containers, container(c2, Some(g), 1));
        add(&mut s, TableId::Records, record(Some(c1), 0.1, false));
        add(&mut s, TableId::Records, record(Some(c1), 0.2, true));
        add(&mut s, TableId::Records, record(Some(c2), 1.004, false));

        let containers = container_rollups(&s, ContainerFilter::ByParent(g)).unwrap();
        assert_eq!(containers.row(0).unwrap().float("aggregate_value").unwrap(), 0.3);
        assert_eq!(containers.row(1).unwrap().float("aggregate_value").unwrap(), 1.0);

        let groupings = grouping_rollups(&s, GroupingFilter::ById(g)).unwrap();
        let row = groupings.row(0).unwrap();
        assert_eq!(row.float("aggregate_value").unwrap(), 1.3);
        assert!(row.boolean("aggregate_sensitive").unwrap());
        assert_eq!(row.integer("container_count").unwrap(), 2);
        assert_eq!(row.integer("record_count").unwrap(), 3);
    }

    #[test]
    fn test_by_parent_only_reads_its_own_records() {
        let mut s = state();
        let (g, other) = (GroupingId::new(), GroupingId::new());
        let (mine, theirs, empty) = (ContainerId::new(), ContainerId::new(), ContainerId::new());
        add(&mut s, TableId::Groupings, grouping(g, 0));
        add(&mut s, TableId::Groupings, grouping(other, 0));
        add(&mut s, TableId::Containers, container(mine, Some(g), 0));
        add(&mut s, TableId::Containers, container(empty, Some(g), 1));
        add(&mut s, TableId::Containers, container(theirs, Some(other), 0));
        add(&mut s, TableId::Records, record(Some(mine), 2.0, false));
        add(&mut s, TableId::Records, record(Some(theirs), 7.0, true));
        add(&mut s, TableId::Records, record(None, 1.0, true));

        let rel = container_rollups(&s, ContainerFilter::ByParent(g)).unwrap();
        assert_eq!(rel.len(), 2);
        let first = rel.row(0).unwrap();
        assert_eq!(first.get(columns::ID).unwrap(), &Value::from(mine));
        assert_eq!(first.integer("record_count").unwrap(), 1);
        assert!(!first.boolean("aggregate_sensitive").unwrap());
        assert_eq!(rel.row(1).unwrap().integer("record_count").unwrap(), 0);

        let row = grouping_rollups(&s, GroupingFilter::ById(g)).unwrap();
        assert_eq!(row.row(0).unwrap().float("aggregate_value").unwrap(), 2.0);
    }

    #[test]
    fn test_dangling_parents_read_as_unassigned() {
        let mut s = state();
        let c = ContainerId::new();
        add(&mut s, TableId::Containers, container(c, Some(GroupingId::new()), 0));
        add(&mut s, TableId::Records, record(Some(ContainerId::new()), 5.0, false));

        let unassigned = container_rollups(&s, ContainerFilter::Unassigned).unwrap();
        assert_eq!(unassigned.len(), 1);
        assert_eq!(unassigned.row(0).unwrap().get(columns::GROUPING_ID).unwrap(), &Value::Null);

        let records = record_rows(&s, RecordFilter::Unassigned).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records.row(0).unwrap().get(columns::CONTAINER_ID).unwrap(), &Value::Null);
    }

    #[test]
    fn test_ordering_by_last_modified_then_physical() {
        let mut s = state();
        let (late, tie_a, tie_b) = (GroupingId::new(), GroupingId::new(), GroupingId::new());
        add(&mut s, TableId::Groupings, grouping(late, 50));
        add(&mut s, TableId::Groupings, grouping(tie_a, 10));
        add(&mut s, TableId::Groupings, grouping(tie_b, 10));

        let rel = grouping_rollups(&s, GroupingFilter::All).unwrap();
        let ids: Vec<&Value> = rel.iter().map(|r| r.get(columns::ID).unwrap()).collect();
        let expected = [Value::from(tie_a), Value::from(tie_b), Value::from(late)];
        assert_eq!(ids, expected.iter().collect::<Vec<_>>());
    }

    #[test]
    fn test_unknown_id_yields_no_rows() {
        let s = state();
        assert!(grouping_rollups(&s, GroupingFilter::ById(GroupingId::new())).unwrap().is_empty());
        assert!(container_rollups(&s, ContainerFilter::ById(ContainerId::new())).unwrap().is_empty());
        assert!(record_rows(&s, RecordFilter::ById(RecordId::new())).unwrap().is_empty());
    }
}
