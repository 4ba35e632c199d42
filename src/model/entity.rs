use super::ids::{ContainerId, GroupingId, RecordId};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Timestamps are stored with millisecond precision. Truncating at creation
/// keeps a freshly built entity equal to the one read back.
pub(crate) fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Top-level grouping (a room, a storage unit).
///
/// `aggregate_value`, `aggregate_sensitive`, `container_count` and
/// `record_count` are derived from the containers and records beneath it on
/// every read. Values set on an instance passed to `insert`/`update` are
/// ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grouping {
    pub id: GroupingId,
    pub name: String,
    pub description: Option<String>,
    pub last_modified: DateTime<Utc>,

    pub aggregate_value: f64,
    pub aggregate_sensitive: bool,
    pub container_count: usize,
    pub record_count: usize,
}

impl Grouping {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: GroupingId::new(),
            name: name.into(),
            description: None,
            last_modified: now_millis(),
            aggregate_value: 0.0,
            aggregate_sensitive: false,
            container_count: 0,
            record_count: 0,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn touch(&mut self) {
        self.last_modified = now_millis();
    }
}

/// A box or crate, optionally placed in a grouping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub id: ContainerId,
    pub name: String,
    pub description: Option<String>,
    pub last_modified: DateTime<Utc>,
    pub grouping_id: Option<GroupingId>,

    pub aggregate_value: f64,
    pub aggregate_sensitive: bool,
    pub record_count: usize,
}

impl Container {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ContainerId::new(),
            name: name.into(),
            description: None,
            last_modified: now_millis(),
            grouping_id: None,
            aggregate_value: 0.0,
            aggregate_sensitive: false,
            record_count: 0,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn in_grouping(mut self, grouping_id: GroupingId) -> Self {
        self.grouping_id = Some(grouping_id);
        self
    }

    pub fn touch(&mut self) {
        self.last_modified = now_millis();
    }
}

/// A single packed item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub name: String,
    pub description: Option<String>,
    /// Declared value in currency units.
    pub numeric_value: f64,
    /// Fragile.
    pub is_sensitive: bool,
    pub last_modified: DateTime<Utc>,
    pub container_id: Option<ContainerId>,
    pub image_reference: Option<String>,
}

impl Record {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: RecordId::new(),
            name: name.into(),
            description: None,
            numeric_value: 0.0,
            is_sensitive: false,
            last_modified: now_millis(),
            container_id: None,
            image_reference: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.numeric_value = value;
        self
    }

    pub fn sensitive(mut self, is_sensitive: bool) -> Self {
        self.is_sensitive = is_sensitive;
        self
    }

    pub fn in_container(mut self, container_id: ContainerId) -> Self {
        self.container_id = Some(container_id);
        self
    }

    pub fn with_image(mut self, reference: impl Into<String>) -> Self {
        self.image_reference = Some(reference.into());
        self
    }

    pub fn touch(&mut self) {
        self.last_modified = now_millis();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Grouping,
    Container,
    Record,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Grouping => "grouping",
            EntityKind::Container => "container",
            EntityKind::Record => "record",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Any of the three entity kinds, for code that handles them uniformly
/// (lists mixing levels, detail views).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entity {
    Grouping(Grouping),
    Container(Container),
    Record(Record),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Grouping(_) => EntityKind::Grouping,
            Entity::Container(_) => EntityKind::Container,
            Entity::Record(_) => EntityKind::Record,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Entity::Grouping(g) => &g.name,
            Entity::Container(c) => &c.name,
            Entity::Record(r) => &r.name,
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            Entity::Grouping(g) => g.description.as_deref(),
            Entity::Container(c) => c.description.as_deref(),
            Entity::Record(r) => r.description.as_deref(),
        }
    }

    pub fn last_modified(&self) -> DateTime<Utc> {
        match self {
            Entity::Grouping(g) => g.last_modified,
            Entity::Container(c) => c.last_modified,
            Entity::Record(r) => r.last_modified,
        }
    }

    /// Own value for a record, rolled-up value otherwise.
    pub fn value(&self) -> f64 {
        match self {
            Entity::Grouping(g) => g.aggregate_value,
            Entity::Container(c) => c.aggregate_value,
            Entity::Record(r) => r.numeric_value,
        }
    }

    pub fn is_sensitive(&self) -> bool {
        match self {
            Entity::Grouping(g) => g.aggregate_sensitive,
            Entity::Container(c) => c.aggregate_sensitive,
            Entity::Record(r) => r.is_sensitive,
        }
    }

    /// Number of direct children. Records have none.
    pub fn child_count(&self) -> usize {
        match self {
            Entity::Grouping(g) => g.container_count,
            Entity::Container(c) => c.record_count,
            Entity::Record(_) => 0,
        }
    }
}

impl From<Grouping> for Entity {
    fn from(g: Grouping) -> Self {
        Entity::Grouping(g)
    }
}

impl From<Container> for Entity {
    fn from(c: Container) -> Self {
        Entity::Container(c)
    }
}

impl From<Record> for Entity {
    fn from(r: Record) -> Self {
        Entity::Record(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_default_derived_fields() {
        let g = Grouping::new("Kitchen");
        assert_eq!(g.aggregate_value, 0.0);
        assert_eq!(g.container_count, 0);
        assert_eq!(g.last_modified.timestamp_subsec_nanos() % 1_000_000, 0);

        let r = Record::new("Vase").with_value(40.0).sensitive(true);
        assert!(r.is_sensitive);
        assert_eq!(r.numeric_value, 40.0);
    }

    #[test]
    fn test_entity_dispatch() {
        let container = Container::new("Box 1");
        let entity = Entity::from(container.clone());
        assert_eq!(entity.kind(), EntityKind::Container);
        assert_eq!(entity.name(), "Box 1");
        assert_eq!(entity.child_count(), 0);

        let record: Entity = Record::new("Lamp").with_value(12.5).into();
        assert_eq!(record.value(), 12.5);
        assert_eq!(record.kind().to_string(), "record");
    }

    #[test]
    fn test_entity_serializes_with_kind_tag() {
        let entity = Entity::from(Grouping::new("Garage"));
        let json = serde_json::to_value(&entity).unwrap();
        assert_eq!(json["kind"], "grouping");
        assert_eq!(json["name"], "Garage");
    }
}
