use super::{Repository, first, single};
use crate::core::Result;
use crate::executor::{
    CascadeReport, ClearExecutor, DeleteGroupingsExecutor, InsertExecutor, UpdateExecutor,
};
use crate::facade::Database;
use crate::model::{Grouping, GroupingId};
use crate::query::{GroupingFilter, GroupingQuery};
use crate::reactive::Snapshot;
use crate::storage::TableId;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Groupings with their rollups over containers and records.
#[derive(Debug, Clone)]
pub struct GroupingRepository {
    db: Database,
}

impl GroupingRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn list(&self) -> Result<Vec<Grouping>> {
        self.db.read(&GroupingQuery(GroupingFilter::All))
    }
}

#[async_trait]
impl Repository for GroupingRepository {
    type Entity = Grouping;
    type Id = GroupingId;

    async fn get(&self, id: GroupingId) -> Result<Option<Grouping>> {
        self.db.read(&GroupingQuery(GroupingFilter::ById(id))).map(first)
    }

    fn observe(&self, id: GroupingId) -> BoxStream<'static, Snapshot<Option<Grouping>>> {
        single(self.db.observe(GroupingQuery(GroupingFilter::ById(id))))
    }

    fn observe_all(&self) -> BoxStream<'static, Snapshot<Vec<Grouping>>> {
        self.db.observe(GroupingQuery(GroupingFilter::All))
    }

    async fn insert(&self, groupings: Vec<Grouping>) -> Result<usize> {
        self.db.execute(InsertExecutor::new(groupings)).await
    }

    async fn update(&self, grouping: Grouping) -> Result<bool> {
        self.db.execute(UpdateExecutor::new(grouping)).await
    }

    /// Also deletes the containers in these groupings and their records.
    async fn delete(&self, ids: Vec<GroupingId>) -> Result<CascadeReport> {
        self.db.execute(DeleteGroupingsExecutor::new(ids)).await
    }

    async fn clear(&self) -> Result<usize> {
        self.db.execute(ClearExecutor::new(TableId::Groupings)).await
    }
}
