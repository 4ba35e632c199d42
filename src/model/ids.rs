//! Identifier newtypes, one per entity kind, so a container id can never be
//! passed where a record id is expected.

use crate::core::{DbError, Result, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Fresh random id.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            pub(crate) fn to_value(self) -> Value {
                Value::Text(self.0.to_string())
            }

            pub(crate) fn from_value(value: &Value) -> Result<Self> {
                let text = value.as_str().ok_or_else(|| {
                    DbError::Corrupted(format!(
                        "{} stored as {}, expected TEXT",
                        stringify!($name),
                        value.type_name()
                    ))
                })?;
                text.parse()
                    .map_err(|e| DbError::Corrupted(format!("{}: {}", stringify!($name), e)))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl From<$name> for Value {
            fn from(id: $name) -> Self {
                id.to_value()
            }
        }
    };
}

entity_id!(
    /// Id of a top-level grouping.
    GroupingId
);
entity_id!(
    /// Id of a container.
    ContainerId
);
entity_id!(
    /// Id of a leaf record.
    RecordId
);
