pub mod codec;
pub mod entity;
pub mod ids;
pub mod summary;

pub use codec::RowCodec;
pub use entity::{Container, Entity, EntityKind, Grouping, Record};
pub use ids::{ContainerId, GroupingId, RecordId};
pub use summary::{InventorySummary, NamedRef};
