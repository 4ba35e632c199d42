use crate::core::Result;
use crate::facade::Database;
use crate::model::{ContainerId, GroupingId, InventorySummary, NamedRef};
use crate::query::{ContainerOptions, GroupingOptions, SummaryQuery};
use crate::reactive::Snapshot;
use futures::stream::BoxStream;

/// Cross-cutting reads: picker options and the store-wide summary.
#[derive(Debug, Clone)]
pub struct LookupRepository {
    db: Database,
}

impl LookupRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn grouping_options(&self) -> Result<Vec<NamedRef<GroupingId>>> {
        self.db.read(&GroupingOptions)
    }

    pub fn observe_grouping_options(&self) -> BoxStream<'static, Snapshot<Vec<NamedRef<GroupingId>>>> {
        self.db.observe(GroupingOptions)
    }

    pub async fn container_options(&self) -> Result<Vec<NamedRef<ContainerId>>> {
        self.db.read(&ContainerOptions)
    }

    pub fn observe_container_options(
        &self,
    ) -> BoxStream<'static, Snapshot<Vec<NamedRef<ContainerId>>>> {
        self.db.observe(ContainerOptions)
    }

    pub async fn summary(&self) -> Result<InventorySummary> {
        self.db.read(&SummaryQuery)
    }

    pub fn observe_summary(&self) -> BoxStream<'static, Snapshot<InventorySummary>> {
        self.db.observe(SummaryQuery)
    }
}
