use super::catalog::TableId;
use super::table::Table;
use crate::core::{DbError, Result};
use im::OrdMap;
use serde::{Deserialize, Serialize};

/// The whole database as one immutable value.
///
/// Tables live in persistent maps, so cloning a `StoreState` is O(1) and a
/// writer can stage changes on its own copy while readers keep using the
/// committed one. Swapping the copy in is the commit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreState {
    tables: OrdMap<TableId, Table>,
    schema_version: u32,
    /// Number of committed writes that produced this state.
    version: u64,
}

impl StoreState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self, id: TableId) -> Result<&Table> {
        self.tables
            .get(&id)
            .ok_or_else(|| DbError::TableNotFound(id.name().to_string()))
    }

    pub fn table_mut(&mut self, id: TableId) -> Result<&mut Table> {
        self.tables
            .get_mut(&id)
            .ok_or_else(|| DbError::TableNotFound(id.name().to_string()))
    }

    pub fn has_table(&self, id: TableId) -> bool {
        self.tables.contains_key(&id)
    }

    pub(crate) fn create_table(&mut self, id: TableId, table: Table) -> Result<()> {
        if self.tables.contains_key(&id) {
            return Err(DbError::Migration(format!("Table '{}' already exists", id)));
        }
        self.tables.insert(id, table);
        Ok(())
    }

    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    pub(crate) fn set_schema_version(&mut self, version: u32) {
        self.schema_version = version;
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    pub fn row_count(&self) -> usize {
        self.tables.values().map(Table::row_count).sum()
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Indexes are skipped by serde; call after deserializing.
    pub(crate) fn rebuild_indexes(&mut self) {
        let ids: Vec<TableId> = self.tables.keys().copied().collect();
        for id in ids {
            if let Some(table) = self.tables.get_mut(&id) {
                table.rebuild_indexes();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Column, DataType, Value};
    use crate::storage::TableSchema;

    fn state_with_groupings() -> StoreState {
        let mut state = StoreState::new();
        let schema = TableSchema::new(
            "groupings",
            vec![Column::new("id", DataType::Text).primary_key()],
        );
        state.create_table(TableId::Groupings, Table::new(schema)).unwrap();
        state
    }

    #[test]
    fn test_clone_is_isolated() {
        let committed = state_with_groupings();
        let mut staged = committed.clone();
        staged
            .table_mut(TableId::Groupings)
            .unwrap()
            .insert(vec![Value::from("g1")])
            .unwrap();

        assert_eq!(staged.row_count(), 1);
        assert_eq!(committed.row_count(), 0);
    }

    #[test]
    fn test_missing_table() {
        let state = StoreState::new();
        assert!(matches!(
            state.table(TableId::Records),
            Err(DbError::TableNotFound(name)) if name == "records"
        ));
    }
}
