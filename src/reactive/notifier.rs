//! Commit notifications.
//!
//! Every non-empty commit publishes one `ChangeEvent` carrying the committed
//! state it produced. Subscribers re-run their queries against that state
//! rather than re-reading the database, so what they see follows commit order
//! even when they fall behind the writer.

use crate::storage::{StoreState, TableSet};
use tokio::sync::broadcast;

pub const DEFAULT_NOTIFY_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct ChangeEvent {
    /// State version produced by the write.
    pub version: u64,
    /// Tables the write changed.
    pub tables: TableSet,
    pub state: StoreState,
}

#[derive(Debug)]
pub struct ChangeNotifier {
    tx: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_NOTIFY_CAPACITY)
    }
}

impl ChangeNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes to current subscribers. Having none is not an error.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
