use crate::core::{Column, DbError, Result, Row, Schema, Value};
use im::{HashMap, OrdMap, OrdSet};
use serde::{Deserialize, Serialize};

/// Store-assigned physical position of a row. Never reused, and kept across
/// updates, so it doubles as the insertion-order tie breaker.
pub type RowId = u64;

type SecondaryIndex = OrdMap<Value, OrdSet<RowId>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    schema: TableSchema,
    rows: OrdMap<RowId, Row>,
    next_row_id: RowId,
    #[serde(skip)]
    primary: HashMap<Value, RowId>,
    #[serde(skip)]
    indexes: HashMap<String, SecondaryIndex>,
}

impl Table {
    pub fn new(schema: TableSchema) -> Self {
        let mut table = Self {
            schema,
            rows: OrdMap::new(),
            next_row_id: 0,
            primary: HashMap::new(),
            indexes: HashMap::new(),
        };
        table.rebuild_indexes();
        table
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn name(&self) -> &str {
        self.schema.name()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Result<usize> {
        self.schema
            .schema()
            .find_column_index(column)
            .ok_or_else(|| DbError::ColumnNotFound(column.to_string(), self.schema.name.clone()))
    }

    /// Rows in physical order.
    pub fn scan(&self) -> impl Iterator<Item = (RowId, &Row)> {
        self.rows.iter().map(|(id, row)| (*id, row))
    }

    pub fn get(&self, key: &Value) -> Option<(RowId, &Row)> {
        let row_id = *self.primary.get(key)?;
        self.rows.get(&row_id).map(|row| (row_id, row))
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        self.primary.contains_key(key)
    }

    /// Equality lookup on `column`, served from a secondary index when one
    /// exists. Results are in physical order either way.
    pub fn lookup(&self, column: &str, value: &Value) -> Result<Vec<(RowId, &Row)>> {
        let col_idx = self.column_index(column)?;

        if self.schema.schema().primary_key_index() == Some(col_idx) {
            return Ok(self.get(value).into_iter().collect());
        }

        if let Some(index) = self.indexes.get(column) {
            let Some(ids) = index.get(value) else {
                return Ok(Vec::new());
            };
            return Ok(ids
                .iter()
                .filter_map(|id| self.rows.get(id).map(|row| (*id, row)))
                .collect());
        }

        Ok(self
            .scan()
            .filter(|(_, row)| &row[col_idx] == value)
            .collect())
    }

    pub fn insert(&mut self, row: Row) -> Result<RowId> {
        self.validate_row(&row)?;

        let key = self.primary_key_of(&row)?;
        if self.primary.contains_key(&key) {
            return Err(DbError::ConstraintViolation(format!(
                "Duplicate primary key {} in table '{}'",
                key,
                self.name()
            )));
        }

        let id = self.next_row_id;
        self.next_row_id += 1;

        self.add_to_indexes(id, &row);
        self.primary.insert(key, id);
        self.rows.insert(id, row);
        Ok(id)
    }

    /// Replaces the row whose primary key matches `new_row` and returns the
    /// previous version. Returns `None` and leaves the table untouched when no
    /// such row exists.
    pub fn update(&mut self, new_row: Row) -> Result<Option<Row>> {
        self.validate_row(&new_row)?;

        let key = self.primary_key_of(&new_row)?;
        let Some(&id) = self.primary.get(&key) else {
            return Ok(None);
        };

        let old_row = match self.rows.get(&id) {
            Some(row) => row.clone(),
            None => {
                return Err(DbError::Corrupted(format!(
                    "Primary index of '{}' points at missing row {}",
                    self.name(),
                    id
                )));
            }
        };

        self.remove_from_indexes(id, &old_row);
        self.add_to_indexes(id, &new_row);
        self.rows.insert(id, new_row);
        Ok(Some(old_row))
    }

    pub fn delete(&mut self, key: &Value) -> Option<Row> {
        let id = self.primary.remove(key)?;
        let row = self.rows.remove(&id)?;
        self.remove_from_indexes(id, &row);
        Some(row)
    }

    /// Removes every row. Physical row ids keep counting up.
    pub fn clear(&mut self) -> Vec<Row> {
        let removed: Vec<Row> = self.rows.values().cloned().collect();
        self.rows = OrdMap::new();
        self.rebuild_indexes();
        removed
    }

    pub fn create_index(&mut self, column_name: &str) -> Result<()> {
        self.column_index(column_name)?;
        if !self.schema.is_indexed(column_name) {
            self.schema.indexes.push(column_name.to_string());
        }
        self.rebuild_indexes();
        Ok(())
    }

    pub fn is_indexed(&self, column_name: &str) -> bool {
        self.indexes.contains_key(column_name)
    }

    /// Appends a column and backfills existing rows with its default.
    pub fn add_column(&mut self, column: Column) -> Result<()> {
        if self.schema.schema().find_column_index(&column.name).is_some() {
            return Err(DbError::Migration(format!(
                "Column '{}' already exists in table '{}'",
                column.name,
                self.name()
            )));
        }
        column.validate(&column.default)?;

        let default = column.default.clone();
        self.rows = self
            .rows
            .iter()
            .map(|(id, row)| {
                let mut row = row.clone();
                row.push(default.clone());
                (*id, row)
            })
            .collect();
        self.schema.schema.push_column(column);
        Ok(())
    }

    /// Rebuilds the primary and secondary indexes from the rows. Indexes are
    /// not serialized, so this runs after every snapshot load.
    pub fn rebuild_indexes(&mut self) {
        self.primary = HashMap::new();
        self.indexes = HashMap::new();

        for column in self.schema.indexes.clone() {
            self.indexes.insert(column, OrdMap::new());
        }

        let rows: Vec<(RowId, Row)> = self.rows.iter().map(|(id, row)| (*id, row.clone())).collect();
        for (id, row) in rows {
            if let Ok(key) = self.primary_key_of(&row) {
                self.primary.insert(key, id);
            }
            self.add_to_indexes(id, &row);
        }
    }

    pub(crate) fn primary_key_of(&self, row: &Row) -> Result<Value> {
        let idx = self.schema.schema().primary_key_index().ok_or_else(|| {
            DbError::ExecutionError(format!("Table '{}' has no primary key", self.name()))
        })?;
        Ok(row[idx].clone())
    }

    fn validate_row(&self, row: &Row) -> Result<()> {
        let columns = self.schema.schema().columns();
        if row.len() != columns.len() {
            return Err(DbError::ExecutionError(format!(
                "Expected {} columns for '{}', got {}",
                columns.len(),
                self.name(),
                row.len()
            )));
        }
        for (column, value) in columns.iter().zip(row.iter()) {
            column.validate(value)?;
        }
        Ok(())
    }

    fn add_to_indexes(&mut self, id: RowId, row: &Row) {
        for col_name in &self.schema.indexes {
            let (Some(col_idx), Some(index)) = (
                self.schema.schema.find_column_index(col_name),
                self.indexes.get_mut(col_name),
            ) else {
                continue;
            };
            let value = row[col_idx].clone();
            let mut ids = index.get(&value).cloned().unwrap_or_default();
            ids.insert(id);
            index.insert(value, ids);
        }
    }

    fn remove_from_indexes(&mut self, id: RowId, row: &Row) {
        for col_name in &self.schema.indexes {
            let (Some(col_idx), Some(index)) = (
                self.schema.schema.find_column_index(col_name),
                self.indexes.get_mut(col_name),
            ) else {
                continue;
            };
            let value = &row[col_idx];
            if let Some(ids) = index.get(value) {
                let ids = ids.without(&id);
                if ids.is_empty() {
                    index.remove(value);
                } else {
                    index.insert(value.clone(), ids);
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    name: String,
    schema: Schema,
    pub indexes: Vec<String>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            schema: Schema::new(columns),
            indexes: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn is_indexed(&self, column: &str) -> bool {
        self.indexes.iter().any(|idx| idx == column)
    }
}
