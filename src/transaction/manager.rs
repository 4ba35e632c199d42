// ============================================================================
// Transaction Manager
// ============================================================================
//
// Owns the committed `StoreState` and runs every write through the same
// pipeline:
//
//   1. take the writer lock (one writer at a time)
//   2. clone the committed state into a `Transaction` and run the operation
//   3. append one WAL frame with all of the transaction's changes
//   4. swap the working state in as the committed state
//   5. publish a `ChangeEvent` to observers
//
// Failing at 2 or 3 drops the working copy, so nothing of the write is
// visible or durable.
//
// ============================================================================

use super::{Transaction, TransactionId};
use crate::core::Result;
use crate::reactive::{ChangeEvent, ChangeNotifier};
use crate::storage::{PersistenceManager, StoreState};
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, broadcast};
use tracing::{Level, event, info_span};

/// What a finished write did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitInfo {
    pub txn_id: TransactionId,
    /// Committed version after the write. Unchanged for an empty write.
    pub version: u64,
    pub changes: usize,
}

pub struct TransactionManager {
    committed: RwLock<StoreState>,

    // Serializes writers. Holds the durable side, if any, so the WAL is only
    // ever touched by the current writer.
    writer: Mutex<Option<PersistenceManager>>,

    notifier: ChangeNotifier,

    next_txn_id: AtomicU64,
}

impl TransactionManager {
    pub fn new(
        state: StoreState,
        persistence: Option<PersistenceManager>,
        notifier: ChangeNotifier,
    ) -> Self {
        Self {
            committed: RwLock::new(state),
            writer: Mutex::new(persistence),
            notifier,
            next_txn_id: AtomicU64::new(1),
        }
    }

    /// O(1) copy of the committed state. Never blocks on a writer for longer
    /// than the pointer swap at the end of a commit.
    pub fn snapshot(&self) -> Result<StoreState> {
        Ok(self.committed.read()?.clone())
    }

    pub fn version(&self) -> Result<u64> {
        Ok(self.committed.read()?.version())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.notifier.subscribe()
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    fn next_id(&self) -> TransactionId {
        TransactionId(self.next_txn_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Runs `op` as one all-or-nothing write.
    ///
    /// The closure sees the latest committed state plus its own staged
    /// changes. If it returns an error, or the WAL append fails, the write is
    /// abandoned and the committed state is left exactly as it was.
    pub async fn write<T, F>(&self, operation: &'static str, op: F) -> Result<(T, CommitInfo)>
    where
        F: FnOnce(&mut Transaction) -> Result<T>,
    {
        let mut persistence = self.writer.lock().await;

        let txn_id = self.next_id();
        let span = info_span!("packdb.write", operation, txn = %txn_id);
        let _enter = span.enter();

        let base = self.snapshot()?;
        let base_version = base.version();
        let mut txn = Transaction::new(txn_id, base);

        let output = match op(&mut txn) {
            Ok(output) => output,
            Err(err) => {
                event!(Level::DEBUG, error = %err, "write rolled back");
                return Err(err);
            }
        };

        if txn.is_empty() {
            event!(Level::DEBUG, "write changed nothing");
            return Ok((
                output,
                CommitInfo {
                    txn_id,
                    version: base_version,
                    changes: 0,
                },
            ));
        }

        let duration = txn.duration();
        let (mut working, changes, tables) = txn.into_parts();
        let version = base_version + 1;
        working.set_version(version);

        if let Some(persistence) = persistence.as_mut() {
            if let Err(err) = persistence.log_commit(version, &changes) {
                event!(Level::ERROR, error = %err, "WAL append failed, write discarded");
                return Err(err);
            }
        }

        *self.committed.write()? = working.clone();

        event!(
            Level::DEBUG,
            version,
            changes = changes.len(),
            tables = %tables,
            elapsed_us = duration.as_micros() as u64,
            "write committed"
        );

        if let Some(persistence) = persistence.as_mut() {
            if persistence.needs_checkpoint() {
                // The write is already durable in the WAL; a failed checkpoint
                // only means recovery replays more frames.
                if let Err(err) = persistence.checkpoint(&working) {
                    event!(Level::ERROR, error = %err, "automatic checkpoint failed");
                }
            }
        }

        self.notifier.publish(ChangeEvent {
            version,
            tables,
            state: working,
        });

        Ok((
            output,
            CommitInfo {
                txn_id,
                version,
                changes: changes.len(),
            },
        ))
    }

    /// Writes a snapshot of the committed state and truncates the WAL.
    /// Returns `false` for an in-memory store.
    pub async fn checkpoint(&self) -> Result<bool> {
        let mut persistence = self.writer.lock().await;
        let Some(persistence) = persistence.as_mut() else {
            return Ok(false);
        };
        let state = self.snapshot()?;
        persistence.checkpoint(&state)?;
        event!(Level::INFO, version = state.version(), "checkpoint completed");
        Ok(true)
    }
}
