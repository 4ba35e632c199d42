use crate::config::StoreConfig;
use crate::core::Result;
use crate::executor::Executor;
use crate::query::Query;
use crate::reactive::{ChangeNotifier, Snapshot, observe};
use crate::storage::{DurabilityMode, PersistenceManager, StoreState, migrations};
use crate::transaction::TransactionManager;
use futures::stream::BoxStream;
use std::sync::Arc;
use tracing::{Level, event, info_span};

/// One store: committed state, write pipeline and change feed.
///
/// Cheap to clone; clones share the same store. Two `Database`s created
/// separately never share anything.
#[derive(Clone)]
pub struct Database {
    manager: Arc<TransactionManager>,
    config: Arc<StoreConfig>,
}

impl Database {
    /// Fresh, empty, memory-only store.
    pub fn in_memory() -> Self {
        let config = StoreConfig::in_memory();
        let state = StoreState::new();
        // An empty state always migrates; the fallback is never reached.
        let state = migrations::migrate(state.clone()).unwrap_or(state);
        Self::from_parts(state, None, config)
    }

    /// Opens the store described by `config`, recovering snapshot and WAL
    /// from its data directory and applying pending schema migrations.
    pub fn open(config: StoreConfig) -> Result<Self> {
        config.validate()?;

        let Some(data_dir) = config.data_dir.clone().filter(|_| config.is_durable()) else {
            let state = migrations::migrate(StoreState::new())?;
            return Ok(Self::from_parts(state, None, config));
        };

        let span = info_span!("packdb.open", data_dir = %data_dir.display());
        let _enter = span.enter();

        let mut persistence = PersistenceManager::new(&data_dir, config.durability)?;
        persistence
            .wal_mut()
            .set_checkpoint_threshold(config.checkpoint_threshold);

        let recovered = persistence.recover()?;
        let fresh = recovered.is_none();
        let state = recovered.unwrap_or_default();
        let before = state.schema_version();
        let state = migrations::migrate(state)?;

        // WAL frames are only replayable against the schema they were written
        // under, so a migrated schema is pinned with a snapshot right away.
        if fresh || state.schema_version() != before {
            persistence.checkpoint(&state)?;
        }

        event!(
            Level::INFO,
            version = state.version(),
            schema_version = state.schema_version(),
            rows = state.row_count(),
            fresh,
            "store opened"
        );
        Ok(Self::from_parts(state, Some(persistence), config))
    }

    fn from_parts(
        state: StoreState,
        persistence: Option<PersistenceManager>,
        config: StoreConfig,
    ) -> Self {
        let notifier = ChangeNotifier::new(config.notify_capacity);
        Self {
            manager: Arc::new(TransactionManager::new(state, persistence, notifier)),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn durability(&self) -> DurabilityMode {
        if self.config.is_durable() {
            self.config.durability
        } else {
            DurabilityMode::None
        }
    }

    /// Runs one write executor as a single transaction.
    pub async fn execute<E: Executor>(&self, executor: E) -> Result<E::Output> {
        let name = executor.name();
        let (output, _) = self.manager.write(name, move |txn| executor.execute(txn)).await?;
        Ok(output)
    }

    /// Evaluates `query` against the latest committed state.
    pub fn read<Q: Query>(&self, query: &Q) -> Result<Q::Output> {
        query.evaluate(&self.manager.snapshot()?)
    }

    /// Live results of `query`. See [`crate::reactive::observe`].
    pub fn observe<Q: Query>(&self, query: Q) -> BoxStream<'static, Snapshot<Q::Output>> {
        observe(&self.manager, query)
    }

    /// Copy of the committed state.
    pub fn snapshot(&self) -> Result<StoreState> {
        self.manager.snapshot()
    }

    /// Number of writes committed so far.
    pub fn version(&self) -> Result<u64> {
        self.manager.version()
    }

    /// Writes a snapshot and truncates the WAL. Returns `false` when the
    /// store is not durable.
    pub async fn checkpoint(&self) -> Result<bool> {
        self.manager.checkpoint().await
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::InsertExecutor;
    use crate::model::Grouping;
    use crate::query::{GroupingFilter, GroupingQuery};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_in_memory_stores_are_independent() {
        let a = Database::in_memory();
        let b = Database::in_memory();
        a.execute(InsertExecutor::new(vec![Grouping::new("Shed")]))
            .await
            .unwrap();
        assert_eq!(a.read(&GroupingQuery(GroupingFilter::All)).unwrap().len(), 1);
        assert!(b.read(&GroupingQuery(GroupingFilter::All)).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reopen_recovers_writes() {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig::durable(dir.path()).durability(DurabilityMode::Sync);
        let grouping = Grouping::new("Basement");
        {
            let db = Database::open(config.clone()).unwrap();
            db.execute(InsertExecutor::new(vec![grouping.clone()]))
                .await
                .unwrap();
        }

        let db = Database::open(config).unwrap();
        let groupings = db.read(&GroupingQuery(GroupingFilter::All)).unwrap();
        assert_eq!(groupings, vec![grouping]);
        assert_eq!(db.version().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_checkpoint_on_memory_store_is_noop() {
        let db = Database::in_memory();
        assert!(!db.checkpoint().await.unwrap());
        assert_eq!(db.durability(), DurabilityMode::None);
    }
}
