// ============================================================================
// PackDB Library
// ============================================================================

pub mod config;
pub mod core;
pub mod executor;
pub mod facade;
pub mod model;
pub mod prelude;
pub mod query;
pub mod reactive;
pub mod repository;
pub mod storage;
pub mod transaction;

// Re-export main types for convenience
pub use crate::config::StoreConfig;
pub use crate::core::{DbError, Result, Value};
pub use executor::CascadeReport;
pub use facade::Database;
pub use model::{
    Container, ContainerId, Entity, EntityKind, Grouping, GroupingId, InventorySummary, NamedRef,
    Record, RecordId,
};
pub use reactive::Snapshot;
pub use repository::{
    ContainerRepository, GroupingRepository, LookupRepository, RecordRepository, Repository,
};
pub use storage::DurabilityMode;

// ============================================================================
// High-level API
// ============================================================================

/// A store together with its repositories.
///
/// This is the recommended way to use PackDB in applications.
///
/// # Examples
///
/// ```
/// use packdb::{Container, Grouping, PackDb, Record, Repository};
///
/// # tokio_test::block_on(async {
/// let db = PackDb::in_memory();
///
/// let garage = Grouping::new("Garage");
/// let bin = Container::new("Bin A").in_grouping(garage.id);
/// db.groupings.insert(vec![garage.clone()]).await?;
/// db.containers.insert(vec![bin.clone()]).await?;
/// db.records
///     .insert(vec![Record::new("Drill").with_value(89.5).in_container(bin.id)])
///     .await?;
///
/// let garage = db.groupings.get(garage.id).await?.unwrap();
/// assert_eq!(garage.container_count, 1);
/// assert_eq!(garage.record_count, 1);
/// assert_eq!(garage.aggregate_value, 89.5);
/// # Ok::<(), packdb::DbError>(())
/// # }).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct PackDb {
    pub groupings: GroupingRepository,
    pub containers: ContainerRepository,
    pub records: RecordRepository,
    pub lookup: LookupRepository,
    database: Database,
}

impl PackDb {
    /// Fresh memory-only store. Every call returns an independent store.
    pub fn in_memory() -> Self {
        Self::from_database(Database::in_memory())
    }

    /// Opens (or creates) the store described by `config`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use packdb::{PackDb, StoreConfig};
    /// # fn main() -> packdb::Result<()> {
    /// let dir = tempfile::tempdir().unwrap();
    /// let db = PackDb::open(StoreConfig::durable(dir.path()))?;
    /// assert!(db.database().config().is_durable());
    /// # Ok(())
    /// # }
    /// ```
    pub fn open(config: StoreConfig) -> Result<Self> {
        Ok(Self::from_database(Database::open(config)?))
    }

    /// Opens the store configured by the `PACKDB_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::open(StoreConfig::from_env()?)
    }

    pub fn from_database(database: Database) -> Self {
        Self {
            groupings: GroupingRepository::new(database.clone()),
            containers: ContainerRepository::new(database.clone()),
            records: RecordRepository::new(database.clone()),
            lookup: LookupRepository::new(database.clone()),
            database,
        }
    }

    /// Low-level access: executors, queries and checkpoints.
    pub fn database(&self) -> &Database {
        &self.database
    }
}
