use crate::core::{DbError, Result};
use crate::reactive::DEFAULT_NOTIFY_CAPACITY;
use crate::storage::DurabilityMode;
use std::path::{Path, PathBuf};

pub const ENV_DATA_DIR: &str = "PACKDB_DATA_DIR";
pub const ENV_DURABILITY: &str = "PACKDB_DURABILITY";
pub const ENV_CHECKPOINT_THRESHOLD: &str = "PACKDB_CHECKPOINT_THRESHOLD";

/// Store configuration
///
/// Without a data directory the store lives in memory only.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    /// Directory holding `packdb.wal` and `packdb.snapshot`
    pub data_dir: Option<PathBuf>,

    /// When WAL appends are synced to disk
    pub durability: DurabilityMode,

    /// WAL frames written before an automatic checkpoint
    pub checkpoint_threshold: usize,

    /// Commit notifications buffered per observer before it is considered
    /// lagging
    pub notify_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl StoreConfig {
    pub fn in_memory() -> Self {
        Self {
            data_dir: None,
            durability: DurabilityMode::None,
            checkpoint_threshold: 1000,
            notify_capacity: DEFAULT_NOTIFY_CAPACITY,
        }
    }

    /// Durable store in `dir` with the default durability mode
    pub fn durable(dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: Some(dir.as_ref().to_path_buf()),
            durability: DurabilityMode::default(),
            ..Self::in_memory()
        }
    }

    /// Set the durability mode
    pub fn durability(mut self, mode: DurabilityMode) -> Self {
        self.durability = mode;
        self
    }

    /// Set the automatic checkpoint threshold
    pub fn checkpoint_threshold(mut self, frames: usize) -> Self {
        self.checkpoint_threshold = frames;
        self
    }

    /// Set the per-observer notification buffer
    pub fn notify_capacity(mut self, capacity: usize) -> Self {
        self.notify_capacity = capacity;
        self
    }

    /// Reads `PACKDB_DATA_DIR`, `PACKDB_DURABILITY` and
    /// `PACKDB_CHECKPOINT_THRESHOLD`. Unset variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = match lookup(ENV_DATA_DIR).filter(|d| !d.trim().is_empty()) {
            Some(dir) => Self::durable(dir),
            None => Self::in_memory(),
        };
        if let Some(mode) = lookup(ENV_DURABILITY) {
            config.durability = mode.parse()?;
        }
        if let Some(threshold) = lookup(ENV_CHECKPOINT_THRESHOLD) {
            config.checkpoint_threshold = threshold.trim().parse().map_err(|_| {
                DbError::ExecutionError(format!(
                    "{} must be a positive integer, got '{}'",
                    ENV_CHECKPOINT_THRESHOLD, threshold
                ))
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.checkpoint_threshold == 0 {
            return Err(DbError::ExecutionError(
                "checkpoint_threshold must be greater than 0".to_string(),
            ));
        }
        if self.notify_capacity == 0 {
            return Err(DbError::ExecutionError(
                "notify_capacity must be greater than 0".to_string(),
            ));
        }
        if self.data_dir.is_none() && self.durability != DurabilityMode::None {
            return Err(DbError::ExecutionError(
                "durability requires a data directory".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_durable(&self) -> bool {
        self.data_dir.is_some() && self.durability != DurabilityMode::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.is_durable());
        assert_eq!(config.checkpoint_threshold, 1000);
    }

    #[test]
    fn test_builder() {
        let config = StoreConfig::durable("/tmp/packdb")
            .durability(DurabilityMode::Sync)
            .checkpoint_threshold(10)
            .notify_capacity(16);
        assert!(config.is_durable());
        assert_eq!(config.durability, DurabilityMode::Sync);
        assert_eq!(config.notify_capacity, 16);
    }

    #[test]
    fn test_from_env_vars() {
        let config = StoreConfig::from_lookup(lookup(&[
            (ENV_DATA_DIR, "/var/lib/packdb"),
            (ENV_DURABILITY, "sync"),
            (ENV_CHECKPOINT_THRESHOLD, "50"),
        ]))
        .unwrap();
        assert_eq!(config.data_dir, Some(PathBuf::from("/var/lib/packdb")));
        assert_eq!(config.durability, DurabilityMode::Sync);
        assert_eq!(config.checkpoint_threshold, 50);

        assert_eq!(StoreConfig::from_lookup(lookup(&[])).unwrap(), StoreConfig::in_memory());
    }

    #[test]
    fn test_invalid_settings() {
        assert!(StoreConfig::from_lookup(lookup(&[(ENV_CHECKPOINT_THRESHOLD, "soon")])).is_err());
        assert!(StoreConfig::from_lookup(lookup(&[(ENV_DURABILITY, "sync")])).is_err());
        assert!(StoreConfig::in_memory().checkpoint_threshold(0).validate().is_err());
    }
}
