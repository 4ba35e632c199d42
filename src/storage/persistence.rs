//! Write-ahead log and snapshot files.
//!
//! Every committed write is appended to the WAL as a single length-prefixed
//! MessagePack frame holding all of its row changes, so recovery either
//! replays a write completely or not at all. A checkpoint serializes the
//! whole `StoreState` into the snapshot file and truncates the WAL.

use crate::core::{DbError, Result};
use crate::storage::memory::StoreState;
use crate::transaction::Change;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

pub const WAL_FILE_NAME: &str = "packdb.wal";
pub const SNAPSHOT_FILE_NAME: &str = "packdb.snapshot";

const SNAPSHOT_FORMAT_VERSION: u32 = 1;

// ============================================================================
// WAL Entry Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WalEntry {
    /// One committed write. `version` is the state version it produced.
    Commit { version: u64, changes: Vec<Change> },
}

// ============================================================================
// Database Snapshot
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseSnapshot {
    pub format_version: u32,
    pub state: StoreState,
    pub metadata: SnapshotMetadata,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub row_count: usize,
    pub table_count: usize,
}

impl DatabaseSnapshot {
    pub fn new(state: StoreState) -> Self {
        let metadata = SnapshotMetadata {
            created_at: chrono::Utc::now(),
            row_count: state.row_count(),
            table_count: state.table_count(),
        };

        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            state,
            metadata,
        }
    }
}

// ============================================================================
// Durability Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurabilityMode {
    /// fsync after every WAL append.
    Sync,
    /// Flush to the OS after every append, leave syncing to it.
    #[default]
    Async,
    /// Nothing is written to disk.
    None,
}

impl std::str::FromStr for DurabilityMode {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sync" => Ok(Self::Sync),
            "async" => Ok(Self::Async),
            "none" => Ok(Self::None),
            other => Err(DbError::ExecutionError(format!(
                "Unknown durability mode '{}', expected sync, async or none",
                other
            ))),
        }
    }
}

// ============================================================================
// WAL Manager
// ============================================================================

pub struct WalManager {
    wal_path: PathBuf,
    wal_file: Option<BufWriter<File>>,
    durability_mode: DurabilityMode,
    entries_since_checkpoint: usize,
    checkpoint_threshold: usize,
    /// File length after the last frame that was written completely.
    committed_len: u64,
    /// Set when a failed append could not be cut back off the file.
    poisoned: bool,
    #[cfg(test)]
    fail_next_append: bool,
}

impl WalManager {
    pub fn new<P: AsRef<Path>>(wal_path: P, durability_mode: DurabilityMode) -> Result<Self> {
        let wal_path = wal_path.as_ref().to_path_buf();
        if let Some(parent) = wal_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let (wal_file, committed_len) = if durability_mode != DurabilityMode::None {
            let file = OpenOptions::new().create(true).append(true).open(&wal_path)?;
            let len = file.metadata()?.len();
            (Some(BufWriter::new(file)), len)
        } else {
            (None, 0)
        };

        Ok(Self {
            wal_path,
            wal_file,
            durability_mode,
            entries_since_checkpoint: 0,
            checkpoint_threshold: 1000,
            committed_len,
            poisoned: false,
            #[cfg(test)]
            fail_next_append: false,
        })
    }

    /// Appends one frame. If writing fails, whatever part of the frame was
    /// buffered or already reached the file is discarded, so the next append
    /// starts right after the last complete frame.
    pub fn append(&mut self, entry: &WalEntry) -> Result<()> {
        if self.durability_mode == DurabilityMode::None {
            return Ok(());
        }
        if self.poisoned {
            return Err(DbError::IoError(format!(
                "WAL {} could not be repaired after a failed write; reopen the store",
                self.wal_path.display()
            )));
        }

        let serialized = rmp_serde::to_vec(entry)?;
        let len = u32::try_from(serialized.len()).map_err(|_| {
            DbError::Serialization(format!("WAL frame of {} bytes is too large", serialized.len()))
        })?;
        let mut frame = Vec::with_capacity(4 + serialized.len());
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&serialized);

        match self.write_frame(&frame) {
            Ok(()) => {
                self.committed_len += frame.len() as u64;
                self.entries_since_checkpoint += 1;
                Ok(())
            }
            Err(err) => {
                self.discard_partial_frame();
                Err(err)
            }
        }
    }

    fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        #[cfg(test)]
        let inject_failure = std::mem::take(&mut self.fail_next_append);

        let file = self
            .wal_file
            .as_mut()
            .ok_or_else(|| DbError::ExecutionError("WAL file not initialized".to_string()))?;
        file.write_all(frame)?;

        // Half the frame reaches the file, the rest stays buffered.
        #[cfg(test)]
        if inject_failure {
            file.get_mut().write_all(&frame[..frame.len() / 2])?;
            return Err(DbError::IoError("injected WAL write failure".to_string()));
        }

        file.flush()?;
        if self.durability_mode == DurabilityMode::Sync {
            file.get_ref().sync_data()?;
        }
        Ok(())
    }

    fn discard_partial_frame(&mut self) {
        if let Some(writer) = self.wal_file.take() {
            // Dropping a BufWriter flushes it; the buffered tail of the
            // failed frame must not reach the file.
            let (_file, _unwritten) = writer.into_parts();
        }
        if let Err(err) = self.truncate_to(self.committed_len) {
            error!(
                wal = %self.wal_path.display(),
                error = %err,
                "failed to cut a partial frame off the WAL"
            );
            self.poisoned = true;
        }
    }

    /// Reads every complete frame. A frame cut short by a crash mid-append is
    /// dropped and the file is truncated back to the last complete frame, so
    /// later appends do not land behind garbage.
    pub fn recover_entries(&mut self) -> Result<Vec<WalEntry>> {
        if !self.wal_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.wal_path)?;
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);
        let mut entries = Vec::new();
        let mut valid_len: u64 = 0;

        loop {
            let mut len_bytes = [0u8; 4];
            match reader.read_exact(&mut len_bytes) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }
            let len = u32::from_le_bytes(len_bytes) as usize;
            let mut data = vec![0u8; len];
            match reader.read_exact(&mut data) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }
            let entry: WalEntry = rmp_serde::from_slice(&data)?;
            entries.push(entry);
            valid_len += 4 + len as u64;
        }

        if valid_len < file_len {
            warn!(
                wal = %self.wal_path.display(),
                discarded_bytes = file_len - valid_len,
                "discarding incomplete WAL tail"
            );
            self.truncate_to(valid_len)?;
        }
        self.committed_len = valid_len;

        self.entries_since_checkpoint = entries.len();
        Ok(entries)
    }

    pub fn clear(&mut self) -> Result<()> {
        if self.durability_mode == DurabilityMode::None {
            return Ok(());
        }
        self.truncate_to(0)?;
        self.entries_since_checkpoint = 0;
        Ok(())
    }

    fn truncate_to(&mut self, len: u64) -> Result<()> {
        self.wal_file = None;
        let file = OpenOptions::new().write(true).open(&self.wal_path)?;
        file.set_len(len)?;
        file.sync_all()?;
        drop(file);
        self.committed_len = len;

        if self.durability_mode != DurabilityMode::None {
            let file = OpenOptions::new().create(true).append(true).open(&self.wal_path)?;
            self.wal_file = Some(BufWriter::new(file));
        }
        Ok(())
    }

    pub fn needs_checkpoint(&self) -> bool {
        self.entries_since_checkpoint >= self.checkpoint_threshold
    }

    pub fn entries_since_checkpoint(&self) -> usize {
        self.entries_since_checkpoint
    }

    pub fn set_checkpoint_threshold(&mut self, threshold: usize) {
        self.checkpoint_threshold = threshold.max(1);
    }
}

// ============================================================================
// Snapshot Manager
// ============================================================================

pub struct SnapshotManager {
    snapshot_path: PathBuf,
}

impl SnapshotManager {
    pub fn new<P: AsRef<Path>>(snapshot_path: P) -> Self {
        Self {
            snapshot_path: snapshot_path.as_ref().to_path_buf(),
        }
    }

    /// Writes to a temp file in the same directory and renames it over the
    /// old snapshot, so a crash leaves either the old or the new file.
    pub fn save(&self, snapshot: &DatabaseSnapshot) -> Result<()> {
        let dir = self
            .snapshot_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;

        let serialized = rmp_serde::to_vec(snapshot)?;
        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        temp.write_all(&serialized)?;
        temp.as_file().sync_all()?;
        temp.persist(&self.snapshot_path)
            .map_err(|e| DbError::IoError(format!("Failed to replace snapshot: {}", e.error)))?;
        Ok(())
    }

    pub fn load(&self) -> Result<Option<DatabaseSnapshot>> {
        if !self.snapshot_path.exists() {
            return Ok(None);
        }
        let mut data = Vec::new();
        File::open(&self.snapshot_path)?.read_to_end(&mut data)?;
        let snapshot: DatabaseSnapshot = rmp_serde::from_slice(&data)?;
        if snapshot.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(DbError::Corrupted(format!(
                "Unsupported snapshot format {}",
                snapshot.format_version
            )));
        }
        Ok(Some(snapshot))
    }

    pub fn exists(&self) -> bool {
        self.snapshot_path.exists()
    }
}

// ============================================================================
// Persistence Manager
// ============================================================================

pub struct PersistenceManager {
    wal: WalManager,
    snapshot: SnapshotManager,
    durability_mode: DurabilityMode,
}

impl PersistenceManager {
    pub fn new<P: AsRef<Path>>(data_dir: P, durability_mode: DurabilityMode) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        let wal = WalManager::new(data_dir.join(WAL_FILE_NAME), durability_mode)?;
        let snapshot = SnapshotManager::new(data_dir.join(SNAPSHOT_FILE_NAME));
        Ok(Self {
            wal,
            snapshot,
            durability_mode,
        })
    }

    pub fn log_commit(&mut self, version: u64, changes: &[Change]) -> Result<()> {
        self.wal.append(&WalEntry::Commit {
            version,
            changes: changes.to_vec(),
        })
    }

    pub fn checkpoint(&mut self, state: &StoreState) -> Result<()> {
        if self.durability_mode == DurabilityMode::None {
            return Ok(());
        }
        let snapshot = DatabaseSnapshot::new(state.clone());
        self.snapshot.save(&snapshot)?;
        self.wal.clear()?;
        debug!(
            version = state.version(),
            rows = snapshot.metadata.row_count,
            "checkpoint written"
        );
        Ok(())
    }

    pub fn needs_checkpoint(&self) -> bool {
        self.wal.needs_checkpoint()
    }

    /// Loads the snapshot (if any) and replays the WAL on top of it.
    /// Returns `None` for a fresh data directory.
    pub fn recover(&mut self) -> Result<Option<StoreState>> {
        let snapshot = self.snapshot.load()?;
        let entries = self.wal.recover_entries()?;

        if snapshot.is_none() && entries.is_empty() {
            return Ok(None);
        }

        let mut state = match snapshot {
            Some(snapshot) => snapshot.state,
            None => StoreState::new(),
        };
        state.rebuild_indexes();

        let mut replayed = 0usize;
        for entry in entries {
            match entry {
                WalEntry::Commit { version, changes } => {
                    // Already folded into the snapshot.
                    if version <= state.version() {
                        continue;
                    }
                    for change in &changes {
                        change.apply(&mut state)?;
                    }
                    state.set_version(version);
                    replayed += 1;
                }
            }
        }

        info!(
            version = state.version(),
            replayed_commits = replayed,
            rows = state.row_count(),
            "store recovered from disk"
        );
        Ok(Some(state))
    }

    pub fn wal(&self) -> &WalManager {
        &self.wal
    }

    pub fn wal_mut(&mut self) -> &mut WalManager {
        &mut self.wal
    }

    pub fn snapshot(&self) -> &SnapshotManager {
        &self.snapshot
    }
}
