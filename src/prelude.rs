//! Common imports grouped by abstraction level.
//!
//! `use packdb::prelude::*;` covers application code working through the
//! repositories. `advanced` adds the executor and query layer underneath.

pub use crate::{
    CascadeReport, Container, ContainerId, DbError, DurabilityMode, Entity, EntityKind, Grouping,
    GroupingId, InventorySummary, NamedRef, PackDb, Record, RecordId, Repository, Result,
    Snapshot, StoreConfig,
};
pub use futures::StreamExt;

pub mod advanced {
    //! Escape hatch for custom queries and write operations.
    //!
    //! Product code should normally stay on the repositories.
    pub use crate::executor::{
        ClearExecutor, DeleteContainersExecutor, DeleteGroupingsExecutor, DeleteRecordsExecutor,
        Executor, InsertExecutor, MoveRecordsExecutor, UpdateExecutor,
    };
    pub use crate::facade::Database;
    pub use crate::query::{
        ContainerFilter, ContainerOptions, ContainerQuery, GroupingFilter, GroupingOptions,
        GroupingQuery, Query, RecordFilter, RecordQuery, Relation, SummaryQuery,
    };
    pub use crate::storage::{StoreState, TableId, TableSet};
    pub use crate::transaction::Transaction;
}
