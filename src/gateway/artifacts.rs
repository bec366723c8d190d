//! On-disk session artifacts and the corruption heuristics.
//!
//! The bridge persists its session under one directory:
//!
//! - `creds.json`   — credential base; losing it forces re-pairing
//! - `keys/`        — signal key store, one file per key
//! - `session.wal`  — transaction log, rebuildable from the base
//! - `*.lock`       — advisory locks left behind by ungraceful shutdowns
//!
//! The corruption check is deliberately narrow: only structural states the
//! bridge cannot recover from on its own count. Stale lock files are noise
//! from a crash, not corruption, and must never force a re-pair.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const CREDS_FILE: &str = "creds.json";
pub const WAL_FILE: &str = "session.wal";
pub const KEYS_DIR: &str = "keys";

/// Handle to a session artifact directory.
#[derive(Debug, Clone)]
pub struct SessionArtifacts {
    dir: PathBuf,
}

impl SessionArtifacts {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn creds_path(&self) -> PathBuf {
        self.dir.join(CREDS_FILE)
    }

    fn wal_path(&self) -> PathBuf {
        self.dir.join(WAL_FILE)
    }

    fn keys_path(&self) -> PathBuf {
        self.dir.join(KEYS_DIR)
    }

    /// Whether a prior session exists at all.
    pub fn exists(&self) -> bool {
        self.creds_path().is_file()
    }

    /// Structural corruption check. Exactly two conditions:
    ///
    /// 1. transaction log present without its credential base
    /// 2. key store directory present but empty
    pub fn is_corrupted(&self) -> bool {
        if self.wal_path().is_file() && !self.creds_path().is_file() {
            debug!(dir = %self.dir.display(), "WAL present without credential base");
            return true;
        }
        let keys = self.keys_path();
        if keys.is_dir() {
            let empty = fs::read_dir(&keys)
                .map(|mut entries| entries.next().is_none())
                .unwrap_or(false);
            if empty {
                debug!(dir = %self.dir.display(), "Key store directory present but empty");
                return true;
            }
        }
        false
    }

    /// Usable for a pairing-free start: present and not corrupted.
    pub fn usable(&self) -> bool {
        self.exists() && !self.is_corrupted()
    }

    /// Remove lock files and the transaction log. Credential base and key
    /// store survive, so the next connect reuses the pairing.
    pub fn wipe_ephemeral(&self) -> io::Result<()> {
        let wal = self.wal_path();
        if wal.is_file() {
            fs::remove_file(&wal)?;
        }
        if self.dir.is_dir() {
            for entry in fs::read_dir(&self.dir)? {
                let path = entry?.path();
                if path.extension().and_then(|e| e.to_str()) == Some("lock") {
                    fs::remove_file(&path)?;
                }
            }
        }
        info!(dir = %self.dir.display(), "Wiped ephemeral session artifacts");
        Ok(())
    }

    /// Full session invalidation. The next start must pair again.
    pub fn wipe_all(&self) -> io::Result<()> {
        if self.dir.is_dir() {
            fs::remove_dir_all(&self.dir)?;
        }
        fs::create_dir_all(&self.dir)?;
        info!(dir = %self.dir.display(), "Invalidated session, fresh pairing required");
        Ok(())
    }
}
