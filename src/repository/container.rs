use super::{Repository, first, single};
use crate::core::Result;
use crate::executor::{
    CascadeReport, ClearExecutor, DeleteContainersExecutor, InsertExecutor, UpdateExecutor,
};
use crate::facade::Database;
use crate::model::{Container, ContainerId, GroupingId};
use crate::query::{ContainerFilter, ContainerQuery};
use crate::reactive::Snapshot;
use crate::storage::TableId;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Containers with their rollups over records.
#[derive(Debug, Clone)]
pub struct ContainerRepository {
    db: Database,
}

impl ContainerRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn list(&self) -> Result<Vec<Container>> {
        self.db.read(&ContainerQuery(ContainerFilter::All))
    }

    pub async fn list_in_grouping(&self, grouping_id: GroupingId) -> Result<Vec<Container>> {
        self.db.read(&ContainerQuery(ContainerFilter::ByParent(grouping_id)))
    }

    pub fn observe_in_grouping(
        &self,
        grouping_id: GroupingId,
    ) -> BoxStream<'static, Snapshot<Vec<Container>>> {
        self.db.observe(ContainerQuery(ContainerFilter::ByParent(grouping_id)))
    }

    /// Containers outside any existing grouping.
    pub fn observe_unassigned(&self) -> BoxStream<'static, Snapshot<Vec<Container>>> {
        self.db.observe(ContainerQuery(ContainerFilter::Unassigned))
    }
}

#[async_trait]
impl Repository for ContainerRepository {
    type Entity = Container;
    type Id = ContainerId;

    async fn get(&self, id: ContainerId) -> Result<Option<Container>> {
        self.db.read(&ContainerQuery(ContainerFilter::ById(id))).map(first)
    }

    fn observe(&self, id: ContainerId) -> BoxStream<'static, Snapshot<Option<Container>>> {
        single(self.db.observe(ContainerQuery(ContainerFilter::ById(id))))
    }

    fn observe_all(&self) -> BoxStream<'static, Snapshot<Vec<Container>>> {
        self.db.observe(ContainerQuery(ContainerFilter::All))
    }

    async fn insert(&self, containers: Vec<Container>) -> Result<usize> {
        self.db.execute(InsertExecutor::new(containers)).await
    }

    async fn update(&self, container: Container) -> Result<bool> {
        self.db.execute(UpdateExecutor::new(container)).await
    }

    /// Also deletes the records in these containers.
    async fn delete(&self, ids: Vec<ContainerId>) -> Result<CascadeReport> {
        self.db.execute(DeleteContainersExecutor::new(ids)).await
    }

    async fn clear(&self) -> Result<usize> {
        self.db.execute(ClearExecutor::new(TableId::Containers)).await
    }
}
