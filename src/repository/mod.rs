//! Repository Façade.
//!
//! One repository per entity kind, all with the same contract. Nothing
//! panics or leaks an error type other than `DbError` across this seam:
//! unknown ids read as `None`, and updating or deleting an unknown id
//! succeeds without changing anything.

pub mod container;
pub mod grouping;
pub mod lookup;
pub mod record;

pub use container::ContainerRepository;
pub use grouping::GroupingRepository;
pub use lookup::LookupRepository;
pub use record::RecordRepository;

use crate::core::Result;
use crate::executor::CascadeReport;
use crate::reactive::Snapshot;
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};

#[async_trait]
pub trait Repository: Send + Sync {
    type Entity: Send + Sync + 'static;
    type Id: Copy + Send + Sync + 'static;

    /// The entity with `id`, or `None` if there is none.
    async fn get(&self, id: Self::Id) -> Result<Option<Self::Entity>>;

    /// Live view of one entity. Emits `None` while it does not exist.
    fn observe(&self, id: Self::Id) -> BoxStream<'static, Snapshot<Option<Self::Entity>>>;

    /// Live view of every entity of this kind, oldest `last_modified` first.
    fn observe_all(&self) -> BoxStream<'static, Snapshot<Vec<Self::Entity>>>;

    /// Inserts a batch as one write. Returns how many rows were added.
    async fn insert(&self, entities: Vec<Self::Entity>) -> Result<usize>;

    /// Overwrites the stored entity's own fields. Returns `false`, with the
    /// store untouched, when no entity has this id.
    async fn update(&self, entity: Self::Entity) -> Result<bool>;

    /// Deletes the given ids and everything beneath them.
    async fn delete(&self, ids: Vec<Self::Id>) -> Result<CascadeReport>;

    /// Deletes every entity of this kind without cascading.
    async fn clear(&self) -> Result<usize>;
}

pub(crate) fn first<T>(all: Vec<T>) -> Option<T> {
    all.into_iter().next()
}

pub(crate) fn single<T: Send + 'static>(
    stream: BoxStream<'static, Snapshot<Vec<T>>>,
) -> BoxStream<'static, Snapshot<Option<T>>> {
    stream.map(|snapshot| snapshot.map(first)).boxed()
}
