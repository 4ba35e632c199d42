//! Aggregation Query Layer.
//!
//! Queries are plain values evaluated against a `StoreState`. Each declares
//! the tables it reads, which is what a live projection checks a commit
//! against before re-running it.

pub mod lookup;
pub mod relation;
pub mod rollup;

pub use lookup::{container_options, grouping_options, inventory_summary};
pub use relation::{Aggregate, AggregateFn, ROW_ID, Relation, RelationRow};
pub use rollup::{
    ContainerFilter, GroupingFilter, RecordFilter, container_rollups, grouping_rollups,
    record_rows, round_cents,
};

use crate::core::Result;
use crate::model::{
    Container, ContainerId, Grouping, GroupingId, InventorySummary, NamedRef, Record, RowCodec,
};
use crate::storage::{StoreState, TableId, TableSet};

pub trait Query: Send + Sync + 'static {
    type Output: Send + 'static;

    /// Tables whose changes can alter the result.
    fn dependencies(&self) -> TableSet;

    fn evaluate(&self, state: &StoreState) -> Result<Self::Output>;
}

fn decode_all<T: RowCodec>(relation: &Relation) -> Result<Vec<T>> {
    relation.iter().map(|row| T::decode(&row)).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupingQuery(pub GroupingFilter);

impl Query for GroupingQuery {
    type Output = Vec<Grouping>;

    fn dependencies(&self) -> TableSet {
        TableSet::all()
    }

    fn evaluate(&self, state: &StoreState) -> Result<Vec<Grouping>> {
        decode_all(&grouping_rollups(state, self.0)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerQuery(pub ContainerFilter);

impl Query for ContainerQuery {
    type Output = Vec<Container>;

    // Groupings too: a container whose grouping is deleted reads as
    // unassigned.
    fn dependencies(&self) -> TableSet {
        TableSet::all()
    }

    fn evaluate(&self, state: &StoreState) -> Result<Vec<Container>> {
        decode_all(&container_rollups(state, self.0)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordQuery(pub RecordFilter);

impl Query for RecordQuery {
    type Output = Vec<Record>;

    fn dependencies(&self) -> TableSet {
        TableSet::of(&[TableId::Records, TableId::Containers])
    }

    fn evaluate(&self, state: &StoreState) -> Result<Vec<Record>> {
        decode_all(&record_rows(state, self.0)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupingOptions;

impl Query for GroupingOptions {
    type Output = Vec<NamedRef<GroupingId>>;

    fn dependencies(&self) -> TableSet {
        TableSet::of(&[TableId::Groupings])
    }

    fn evaluate(&self, state: &StoreState) -> Result<Self::Output> {
        grouping_options(state)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerOptions;

impl Query for ContainerOptions {
    type Output = Vec<NamedRef<ContainerId>>;

    fn dependencies(&self) -> TableSet {
        TableSet::of(&[TableId::Containers])
    }

    fn evaluate(&self, state: &StoreState) -> Result<Self::Output> {
        container_options(state)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryQuery;

impl Query for SummaryQuery {
    type Output = InventorySummary;

    fn dependencies(&self) -> TableSet {
        TableSet::all()
    }

    fn evaluate(&self, state: &StoreState) -> Result<InventorySummary> {
        inventory_summary(state)
    }
}
