use serde::{Deserialize, Serialize};

/// An id and display name, for pickers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRef<Id> {
    pub id: Id,
    pub name: String,
}

/// Store-wide totals for dashboards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InventorySummary {
    pub grouping_count: usize,
    pub container_count: usize,
    pub record_count: usize,
    /// Containers with no grouping, or whose grouping no longer exists.
    pub unassigned_container_count: usize,
    /// Records with no container, or whose container no longer exists.
    pub unassigned_record_count: usize,
    /// Sum of every record's value, rounded to cents.
    pub total_value: f64,
    pub any_sensitive: bool,
}
