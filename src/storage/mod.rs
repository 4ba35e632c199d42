pub mod catalog;
pub mod memory;
pub mod migrations;
pub mod persistence;
pub mod table;

pub use catalog::{TableId, TableSet, columns};
pub use memory::StoreState;
pub use persistence::{DurabilityMode, PersistenceManager, WalEntry};
pub use table::{RowId, Table, TableSchema};
