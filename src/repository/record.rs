use super::{Repository, first, single};
use crate::core::Result;
use crate::executor::{
    CascadeReport, ClearExecutor, DeleteRecordsExecutor, InsertExecutor, MoveRecordsExecutor,
    UpdateExecutor,
};
use crate::facade::Database;
use crate::model::{ContainerId, Record, RecordId};
use crate::query::{RecordFilter, RecordQuery};
use crate::reactive::Snapshot;
use crate::storage::TableId;
use async_trait::async_trait;
use futures::stream::BoxStream;

#[derive(Debug, Clone)]
pub struct RecordRepository {
    db: Database,
}

impl RecordRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn list(&self) -> Result<Vec<Record>> {
        self.db.read(&RecordQuery(RecordFilter::All))
    }

    pub async fn list_in_container(&self, container_id: ContainerId) -> Result<Vec<Record>> {
        self.db.read(&RecordQuery(RecordFilter::ByParent(container_id)))
    }

    pub fn observe_in_container(
        &self,
        container_id: ContainerId,
    ) -> BoxStream<'static, Snapshot<Vec<Record>>> {
        self.db.observe(RecordQuery(RecordFilter::ByParent(container_id)))
    }

    pub fn observe_unassigned(&self) -> BoxStream<'static, Snapshot<Vec<Record>>> {
        self.db.observe(RecordQuery(RecordFilter::Unassigned))
    }

    /// Puts records into `container`, or takes them out of any container
    /// with `None`. Returns how many records were moved.
    pub async fn move_to(&self, ids: Vec<RecordId>, container: Option<ContainerId>) -> Result<usize> {
        self.db.execute(MoveRecordsExecutor::new(ids, container)).await
    }
}

#[async_trait]
impl Repository for RecordRepository {
    type Entity = Record;
    type Id = RecordId;

    async fn get(&self, id: RecordId) -> Result<Option<Record>> {
        self.db.read(&RecordQuery(RecordFilter::ById(id))).map(first)
    }

    fn observe(&self, id: RecordId) -> BoxStream<'static, Snapshot<Option<Record>>> {
        single(self.db.observe(RecordQuery(RecordFilter::ById(id))))
    }

    fn observe_all(&self) -> BoxStream<'static, Snapshot<Vec<Record>>> {
        self.db.observe(RecordQuery(RecordFilter::All))
    }

    async fn insert(&self, records: Vec<Record>) -> Result<usize> {
        self.db.execute(InsertExecutor::new(records)).await
    }

    async fn update(&self, record: Record) -> Result<bool> {
        self.db.execute(UpdateExecutor::new(record)).await
    }

    async fn delete(&self, ids: Vec<RecordId>) -> Result<CascadeReport> {
        self.db.execute(DeleteRecordsExecutor::new(ids)).await
    }

    async fn clear(&self) -> Result<usize> {
        self.db.execute(ClearExecutor::new(TableId::Records)).await
    }
}
