//! Durable scan progress, one JSON file per scan kind.
//!
//! A checkpoint is written after every state-changing event (with pure
//! skips batched by the driver) and deleted only when a scan is declared
//! fully complete. Writes go through a temp file + rename so a crash never
//! leaves a torn checkpoint behind.

use crate::error::{Result, ScanError};
use crate::types::ScanDirection;
use bazaar_core::ScanKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Monotonic counters carried across a scan's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanCounters {
    /// Records saved
    pub saved: u64,
    /// Targets skipped as already present
    pub skipped: u64,
    /// Targets absent on the site
    pub not_found: u64,
    /// Run length of sequential not-found outcomes
    pub consecutive_not_found: u32,
}

/// Durable snapshot of one scan's progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Scan kind discriminator
    pub kind: ScanKind,
    /// Next cursor to process (id, page number, or queue index)
    pub cursor: u64,
    /// Direction of travel over an id space
    pub direction: ScanDirection,
    /// Progress counters
    pub counters: ScanCounters,
    /// When this scan first started
    pub started_at: DateTime<Utc>,
    /// Last mutation time
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Fresh checkpoint at `cursor`.
    #[must_use]
    pub fn new(kind: ScanKind, cursor: u64, direction: ScanDirection) -> Self {
        let now = Utc::now();
        Self {
            kind,
            cursor,
            direction,
            counters: ScanCounters::default(),
            started_at: now,
            updated_at: now,
        }
    }

    /// Stamp the mutation time.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// File-backed checkpoint persistence. Single writer per scan kind.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    /// Store rooted at `dir`; the directory is created on first save.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the checkpoint file for `kind`.
    #[must_use]
    pub fn path(&self, kind: ScanKind) -> PathBuf {
        self.dir.join(format!("{}.json", kind.as_str()))
    }

    /// Load the checkpoint for `kind`, if one was persisted.
    pub fn load(&self, kind: ScanKind) -> Result<Option<Checkpoint>> {
        let path = self.path(kind);
        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&path)?;
        let checkpoint: Checkpoint = serde_json::from_str(&contents).map_err(|e| {
            ScanError::Checkpoint(format!("corrupt checkpoint {}: {e}", path.display()))
        })?;

        if checkpoint.kind != kind {
            return Err(ScanError::Checkpoint(format!(
                "checkpoint {} is for kind {}, expected {}",
                path.display(),
                checkpoint.kind,
                kind
            )));
        }

        Ok(Some(checkpoint))
    }

    /// Persist `checkpoint` atomically (write temp file, then rename).
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path(checkpoint.kind);
        let tmp = path.with_extension("json.tmp");

        let contents = serde_json::to_string_pretty(checkpoint)?;
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, &path)?;

        tracing::trace!(
            kind = %checkpoint.kind,
            cursor = checkpoint.cursor,
            "Checkpoint persisted"
        );
        Ok(())
    }

    /// Remove the checkpoint for `kind`, called when a scan completes.
    pub fn delete(&self, kind: ScanKind) -> Result<()> {
        let path = self.path(kind);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    /// The directory checkpoints live in.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, CheckpointStore) {
        let dir = TempDir::new().expect("tempdir");
        let store = CheckpointStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn test_round_trip() {
        let (_dir, store) = store();

        let mut cp = Checkpoint::new(ScanKind::AuctionHistory, 1_500, ScanDirection::Ascending);
        cp.counters.saved = 12;
        cp.counters.consecutive_not_found = 4;
        store.save(&cp).expect("save");

        let loaded = store
            .load(ScanKind::AuctionHistory)
            .expect("load")
            .expect("present");
        assert_eq!(loaded, cp);
    }

    #[test]
    fn test_missing_checkpoint_is_none() {
        let (_dir, store) = store();
        assert!(store.load(ScanKind::Highscores).expect("load").is_none());
    }

    #[test]
    fn test_delete_is_idempotent() {
        let (_dir, store) = store();
        let cp = Checkpoint::new(ScanKind::BanList, 0, ScanDirection::Ascending);
        store.save(&cp).expect("save");

        store.delete(ScanKind::BanList).expect("delete");
        store.delete(ScanKind::BanList).expect("delete again");
        assert!(store.load(ScanKind::BanList).expect("load").is_none());
    }

    #[test]
    fn test_kind_mismatch_is_rejected() {
        let (_dir, store) = store();
        let cp = Checkpoint::new(ScanKind::CurrentAuctions, 3, ScanDirection::Ascending);
        store.save(&cp).expect("save");

        // Simulate an operator copying a checkpoint over the wrong file
        std::fs::rename(
            store.path(ScanKind::CurrentAuctions),
            store.path(ScanKind::BanList),
        )
        .expect("rename");

        assert!(store.load(ScanKind::BanList).is_err());
    }

    #[test]
    fn test_save_overwrites_previous_snapshot() {
        let (_dir, store) = store();
        let mut cp = Checkpoint::new(ScanKind::AuctionHistory, 10, ScanDirection::Ascending);
        store.save(&cp).expect("save");

        cp.cursor = 60;
        cp.counters.not_found = 50;
        cp.touch();
        store.save(&cp).expect("save again");

        let loaded = store
            .load(ScanKind::AuctionHistory)
            .expect("load")
            .expect("present");
        assert_eq!(loaded.cursor, 60);
        assert_eq!(loaded.counters.not_found, 50);
    }
}
