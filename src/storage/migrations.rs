//! Versioned schema migrations.
//!
//! Each step moves a `StoreState` from `version - 1` to `version`. Steps run
//! in order on open, against a staged copy of the state; the migrated state
//! only replaces the loaded one if every pending step succeeds.

use super::catalog::{TableId, columns};
use super::memory::StoreState;
use super::table::{Table, TableSchema};
use crate::core::{Column, DataType, DbError, Result};
use tracing::info;

pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    apply: fn(&mut StoreState) -> Result<()>,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create groupings, containers and records",
        apply: create_base_tables,
    },
    Migration {
        version: 2,
        description: "add records.image_reference",
        apply: add_image_reference,
    },
    Migration {
        version: 3,
        description: "index foreign key columns",
        apply: index_foreign_keys,
    },
];

pub fn latest_version() -> u32 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

/// Brings `state` up to the latest schema version.
pub fn migrate(state: StoreState) -> Result<StoreState> {
    let current = state.schema_version();
    let latest = latest_version();

    if current > latest {
        return Err(DbError::Migration(format!(
            "Store schema version {} is newer than supported version {}",
            current, latest
        )));
    }

    let mut staged = state;
    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        (migration.apply)(&mut staged).map_err(|e| {
            DbError::Migration(format!(
                "Migration {} ({}) failed: {}",
                migration.version, migration.description, e
            ))
        })?;
        staged.set_schema_version(migration.version);
        info!(
            version = migration.version,
            description = migration.description,
            "schema migration applied"
        );
    }

    Ok(staged)
}

fn create_base_tables(state: &mut StoreState) -> Result<()> {
    let groupings = TableSchema::new(
        TableId::Groupings.name(),
        vec![
            Column::new(columns::ID, DataType::Text).primary_key(),
            Column::new(columns::NAME, DataType::Text).not_null(),
            Column::new(columns::DESCRIPTION, DataType::Text),
            Column::new(columns::LAST_MODIFIED, DataType::Integer).not_null(),
        ],
    );

    let containers = TableSchema::new(
        TableId::Containers.name(),
        vec![
            Column::new(columns::ID, DataType::Text).primary_key(),
            Column::new(columns::NAME, DataType::Text).not_null(),
            Column::new(columns::DESCRIPTION, DataType::Text),
            Column::new(columns::LAST_MODIFIED, DataType::Integer).not_null(),
            Column::new(columns::GROUPING_ID, DataType::Text),
        ],
    );

    let records = TableSchema::new(
        TableId::Records.name(),
        vec![
            Column::new(columns::ID, DataType::Text).primary_key(),
            Column::new(columns::NAME, DataType::Text).not_null(),
            Column::new(columns::DESCRIPTION, DataType::Text),
            Column::new(columns::NUMERIC_VALUE, DataType::Float)
                .not_null()
                .default_value(0.0),
            Column::new(columns::IS_SENSITIVE, DataType::Boolean)
                .not_null()
                .default_value(false),
            Column::new(columns::LAST_MODIFIED, DataType::Integer).not_null(),
            Column::new(columns::CONTAINER_ID, DataType::Text),
        ],
    );

    state.create_table(TableId::Groupings, Table::new(groupings))?;
    state.create_table(TableId::Containers, Table::new(containers))?;
    state.create_table(TableId::Records, Table::new(records))?;
    Ok(())
}

fn add_image_reference(state: &mut StoreState) -> Result<()> {
    state
        .table_mut(TableId::Records)?
        .add_column(Column::new(columns::IMAGE_REFERENCE, DataType::Text))
}

fn index_foreign_keys(state: &mut StoreState) -> Result<()> {
    state
        .table_mut(TableId::Containers)?
        .create_index(columns::GROUPING_ID)?;
    state
        .table_mut(TableId::Records)?
        .create_index(columns::CONTAINER_ID)
}
