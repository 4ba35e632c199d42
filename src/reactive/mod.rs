//! Reactive Projection: commit notifications and the live query streams
//! built on them.

pub mod notifier;
pub mod projection;

pub use notifier::{ChangeEvent, ChangeNotifier, DEFAULT_NOTIFY_CAPACITY};
pub use projection::{Snapshot, observe};
