//! Names of the tables and columns that make up the inventory schema, plus
//! the small set type used to describe which tables a write touched or a
//! query reads.

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod columns {
    pub const ID: &str = "id";
    pub const NAME: &str = "name";
    pub const DESCRIPTION: &str = "description";
    pub const LAST_MODIFIED: &str = "last_modified";
    pub const GROUPING_ID: &str = "grouping_id";
    pub const CONTAINER_ID: &str = "container_id";
    pub const NUMERIC_VALUE: &str = "numeric_value";
    pub const IS_SENSITIVE: &str = "is_sensitive";
    pub const IMAGE_REFERENCE: &str = "image_reference";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TableId {
    Groupings,
    Containers,
    Records,
}

impl TableId {
    pub const ALL: [TableId; 3] = [TableId::Groupings, TableId::Containers, TableId::Records];

    pub fn name(self) -> &'static str {
        match self {
            TableId::Groupings => "groupings",
            TableId::Containers => "containers",
            TableId::Records => "records",
        }
    }

    fn bit(self) -> u8 {
        match self {
            TableId::Groupings => 0b001,
            TableId::Containers => 0b010,
            TableId::Records => 0b100,
        }
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A set of tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableSet(u8);

impl TableSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn all() -> Self {
        TableId::ALL.into_iter().collect()
    }

    pub fn of(tables: &[TableId]) -> Self {
        tables.iter().copied().collect()
    }

    pub fn insert(&mut self, table: TableId) {
        self.0 |= table.bit();
    }

    pub fn contains(self, table: TableId) -> bool {
        self.0 & table.bit() != 0
    }

    pub fn intersects(self, other: TableSet) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(self) -> impl Iterator<Item = TableId> {
        TableId::ALL.into_iter().filter(move |t| self.contains(*t))
    }
}

impl FromIterator<TableId> for TableSet {
    fn from_iter<I: IntoIterator<Item = TableId>>(iter: I) -> Self {
        let mut set = TableSet::empty();
        for table in iter {
            set.insert(table);
        }
        set
    }
}

impl fmt::Display for TableSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(TableId::name).collect();
        write!(f, "[{}]", names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_set_membership() {
        let set = TableSet::of(&[TableId::Containers, TableId::Records]);
        assert!(set.contains(TableId::Records));
        assert!(!set.contains(TableId::Groupings));
        assert_eq!(set.len(), 2);
        assert!(set.intersects(TableSet::of(&[TableId::Records])));
        assert!(!set.intersects(TableSet::of(&[TableId::Groupings])));
        assert_eq!(set.to_string(), "[containers, records]");
    }
}
