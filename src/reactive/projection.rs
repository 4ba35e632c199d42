//! Live query results.
//!
//! A projection is a stream that yields the query's result once up front and
//! again after every commit that touches one of the query's tables. The
//! re-evaluation runs against the state carried by the commit notification,
//! so a slow consumer still sees results in commit order.

use super::notifier::ChangeEvent;
use crate::core::{DbError, Result};
use crate::query::Query;
use crate::storage::StoreState;
use crate::transaction::TransactionManager;
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

/// One emission of a projection. An `Err` reports a failed re-evaluation;
/// the stream keeps going.
pub type Snapshot<T> = std::result::Result<T, DbError>;

struct ProjectionState<Q> {
    query: Q,
    manager: Arc<TransactionManager>,
    rx: broadcast::Receiver<ChangeEvent>,
    initial: Option<Result<StoreState>>,
    /// Version of the state the last emission was computed from.
    seen: u64,
}

impl<Q: Query> ProjectionState<Q> {
    fn evaluate(&mut self, state: &StoreState) -> Snapshot<Q::Output> {
        self.seen = state.version();
        self.query.evaluate(state)
    }

    async fn next(&mut self) -> Option<Snapshot<Q::Output>> {
        if let Some(initial) = self.initial.take() {
            return Some(initial.and_then(|state| self.evaluate(&state)));
        }

        loop {
            match self.rx.recv().await {
                Ok(event) => {
                    // Already reflected in the initial read.
                    if event.version <= self.seen {
                        continue;
                    }
                    if !event.tables.intersects(self.query.dependencies()) {
                        self.seen = event.version;
                        continue;
                    }
                    debug!(version = event.version, tables = %event.tables, "projection refresh");
                    return Some(self.evaluate(&event.state));
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "projection fell behind, re-reading latest state");
                    let latest = self.manager.snapshot();
                    return Some(latest.and_then(|state| self.evaluate(&state)));
                }
                // The sender lives in the manager this state holds on to.
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

/// Subscribes to `query`.
///
/// The subscription is taken before the initial read, so a write that
/// commits in between is either in the initial result or delivered after it.
pub fn observe<Q: Query>(
    manager: &Arc<TransactionManager>,
    query: Q,
) -> BoxStream<'static, Snapshot<Q::Output>> {
    let rx = manager.subscribe();
    let initial = manager.snapshot();
    let state = ProjectionState {
        query,
        manager: Arc::clone(manager),
        rx,
        initial: Some(initial),
        seen: 0,
    };

    stream::unfold(state, |mut state| async move {
        let item = state.next().await?;
        Some((item, state))
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Row, Value};
    use crate::query::{GroupingOptions, SummaryQuery};
    use crate::reactive::ChangeNotifier;
    use crate::storage::{TableId, migrations};

    fn manager() -> Arc<TransactionManager> {
        let state = migrations::migrate(StoreState::new()).unwrap();
        Arc::new(TransactionManager::new(state, None, ChangeNotifier::new(4)))
    }

    fn grouping(id: crate::model::GroupingId) -> Row {
        vec![id.into(), Value::from("Hall"), Value::Null, Value::Integer(0)]
    }

    fn record() -> Row {
        vec![
            crate::model::RecordId::new().into(),
            Value::from("Rug"),
            Value::Null,
            Value::Float(1.0),
            Value::Boolean(false),
            Value::Integer(0),
            Value::Null,
            Value::Null,
        ]
    }

    #[tokio::test]
    async fn test_initial_then_refresh() {
        let manager = manager();
        let mut options = observe(&manager, GroupingOptions);
        assert!(options.next().await.unwrap().unwrap().is_empty());

        let id = crate::model::GroupingId::new();
        manager
            .write("insert", |txn| txn.insert(TableId::Groupings, grouping(id)))
            .await
            .unwrap();
        let refreshed = options.next().await.unwrap().unwrap();
        assert_eq!(refreshed.len(), 1);
        assert_eq!(refreshed[0].id, id);
    }

    #[tokio::test]
    async fn test_unrelated_tables_do_not_refresh() {
        let manager = manager();
        let mut options = observe(&manager, GroupingOptions);
        options.next().await.unwrap().unwrap();

        manager
            .write("insert", |txn| txn.insert(TableId::Records, record()))
            .await
            .unwrap();
        let id = crate::model::GroupingId::new();
        manager
            .write("insert", |txn| txn.insert(TableId::Groupings, grouping(id)))
            .await
            .unwrap();

        // The record insert is skipped; the next emission is the grouping.
        assert_eq!(options.next().await.unwrap().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_lagging_subscriber_catches_up() {
        let manager = manager();
        let mut summary = observe(&manager, SummaryQuery);
        summary.next().await.unwrap().unwrap();

        for _ in 0..10 {
            manager
                .write("insert", |txn| txn.insert(TableId::Records, record()))
                .await
                .unwrap();
        }

        // Capacity is 4, so the receiver lagged and re-reads the latest state.
        let latest = summary.next().await.unwrap().unwrap();
        assert_eq!(latest.record_count, 10);
    }
}
