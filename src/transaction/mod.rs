// ============================================================================
// Transaction Management Module
// ============================================================================
//
// All-or-nothing writes over a copy-on-write `StoreState`. A transaction
// stages its changes on a private clone; the manager makes them durable and
// visible in one step, or not at all.
//
// ============================================================================

pub mod change;
pub mod manager;
pub mod state;

pub use change::Change;
pub use manager::{CommitInfo, TransactionManager};
pub use state::{Transaction, TransactionId};
