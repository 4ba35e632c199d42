//! Mapping between entities and stored rows.
//!
//! Encoding walks the table's schema, so a row always has exactly the
//! table's columns in the table's order whatever migrations have run.
//! Decoding reads the unqualified output columns of a query relation.
//! Derived fields are never encoded.

use super::entity::{Container, Grouping, Record};
use super::ids::{ContainerId, GroupingId, RecordId};
use crate::core::{DbError, Result, Row, Value};
use crate::query::RelationRow;
use crate::storage::{Table, TableId, columns};
use chrono::{DateTime, Utc};

pub(crate) fn timestamp_to_value(ts: DateTime<Utc>) -> Value {
    Value::Integer(ts.timestamp_millis())
}

pub(crate) fn timestamp_from_value(value: &Value) -> Result<DateTime<Utc>> {
    let millis = value.as_i64().ok_or_else(|| {
        DbError::Corrupted(format!("Timestamp stored as {}", value.type_name()))
    })?;
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| DbError::Corrupted(format!("Timestamp {} out of range", millis)))
}

fn opt_id<T>(value: &Value, parse: fn(&Value) -> Result<T>) -> Result<Option<T>> {
    if value.is_null() { Ok(None) } else { parse(value).map(Some) }
}

/// An entity kind stored as one row of one table.
pub trait RowCodec: Sized {
    const TABLE: TableId;

    /// Stored value for `column`, or `None` for a column this type does not
    /// know about (it then gets the column default).
    fn field(&self, column: &str) -> Option<Value>;

    fn primary_key(&self) -> Value;

    /// The row this entity's parent reference points at, if it has one.
    fn parent(&self) -> Option<(TableId, Value)> {
        None
    }

    fn decode(row: &RelationRow<'_>) -> Result<Self>;

    fn encode(&self, table: &Table) -> Row {
        table
            .schema()
            .schema()
            .columns()
            .iter()
            .map(|c| self.field(&c.name).unwrap_or_else(|| c.default.clone()))
            .collect()
    }
}

impl RowCodec for Grouping {
    const TABLE: TableId = TableId::Groupings;

    fn field(&self, column: &str) -> Option<Value> {
        Some(match column {
            columns::ID => self.id.to_value(),
            columns::NAME => Value::from(self.name.as_str()),
            columns::DESCRIPTION => Value::from(self.description.clone()),
            columns::LAST_MODIFIED => timestamp_to_value(self.last_modified),
            _ => return None,
        })
    }

    fn primary_key(&self) -> Value {
        self.id.to_value()
    }

    fn decode(row: &RelationRow<'_>) -> Result<Self> {
        Ok(Self {
            id: GroupingId::from_value(row.get(columns::ID)?)?,
            name: row.text(columns::NAME)?,
            description: row.opt_text(columns::DESCRIPTION)?,
            last_modified: timestamp_from_value(row.get(columns::LAST_MODIFIED)?)?,
            aggregate_value: row.float("aggregate_value")?,
            aggregate_sensitive: row.boolean("aggregate_sensitive")?,
            container_count: count(row, "container_count")?,
            record_count: count(row, "record_count")?,
        })
    }
}

impl RowCodec for Container {
    const TABLE: TableId = TableId::Containers;

    fn field(&self, column: &str) -> Option<Value> {
        Some(match column {
            columns::ID => self.id.to_value(),
            columns::NAME => Value::from(self.name.as_str()),
            columns::DESCRIPTION => Value::from(self.description.clone()),
            columns::LAST_MODIFIED => timestamp_to_value(self.last_modified),
            columns::GROUPING_ID => Value::from(self.grouping_id),
            _ => return None,
        })
    }

    fn primary_key(&self) -> Value {
        self.id.to_value()
    }

    fn parent(&self) -> Option<(TableId, Value)> {
        self.grouping_id.map(|id| (TableId::Groupings, id.to_value()))
    }

    fn decode(row: &RelationRow<'_>) -> Result<Self> {
        Ok(Self {
            id: ContainerId::from_value(row.get(columns::ID)?)?,
            name: row.text(columns::NAME)?,
            description: row.opt_text(columns::DESCRIPTION)?,
            last_modified: timestamp_from_value(row.get(columns::LAST_MODIFIED)?)?,
            grouping_id: opt_id(row.get(columns::GROUPING_ID)?, GroupingId::from_value)?,
            aggregate_value: row.float("aggregate_value")?,
            aggregate_sensitive: row.boolean("aggregate_sensitive")?,
            record_count: count(row, "record_count")?,
        })
    }
}

impl RowCodec for Record {
    const TABLE: TableId = TableId::Records;

    fn field(&self, column: &str) -> Option<Value> {
        Some(match column {
            columns::ID => self.id.to_value(),
            columns::NAME => Value::from(self.name.as_str()),
            columns::DESCRIPTION => Value::from(self.description.clone()),
            columns::NUMERIC_VALUE => Value::Float(self.numeric_value),
            columns::IS_SENSITIVE => Value::Boolean(self.is_sensitive),
            columns::LAST_MODIFIED => timestamp_to_value(self.last_modified),
            columns::CONTAINER_ID => Value::from(self.container_id),
            columns::IMAGE_REFERENCE => Value::from(self.image_reference.clone()),
            _ => return None,
        })
    }

    fn primary_key(&self) -> Value {
        self.id.to_value()
    }

    fn parent(&self) -> Option<(TableId, Value)> {
        self.container_id.map(|id| (TableId::Containers, id.to_value()))
    }

    fn decode(row: &RelationRow<'_>) -> Result<Self> {
        Ok(Self {
            id: RecordId::from_value(row.get(columns::ID)?)?,
            name: row.text(columns::NAME)?,
            description: row.opt_text(columns::DESCRIPTION)?,
            numeric_value: row.float(columns::NUMERIC_VALUE)?,
            is_sensitive: row.boolean(columns::IS_SENSITIVE)?,
            last_modified: timestamp_from_value(row.get(columns::LAST_MODIFIED)?)?,
            container_id: opt_id(row.get(columns::CONTAINER_ID)?, ContainerId::from_value)?,
            image_reference: row.opt_text(columns::IMAGE_REFERENCE)?,
        })
    }
}

fn count(row: &RelationRow<'_>, column: &str) -> Result<usize> {
    let n = row.integer(column)?;
    usize::try_from(n).map_err(|_| DbError::Corrupted(format!("Negative {} {}", column, n)))
}
