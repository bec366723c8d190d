//! Process lock file.
//!
//! The pipeline assumes a single active worker per host: the job map is in
//! process memory and the browsing/messaging sessions are single logical
//! connections. A second instance against the same data directory would also
//! collide on the sled lock. The PID lock file makes the double-start fail
//! fast with an actionable message.

use anyhow::{bail, Context, Result};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Process lock file manager.
#[derive(Debug)]
pub struct ProcessLock {
    lock_path: PathBuf,
    owned: bool,
}

impl ProcessLock {
    const LOCK_FILE_NAME: &'static str = ".claimsync.lock";

    /// Acquire a process lock for the given data directory.
    ///
    /// Returns an error if another instance is already running. A stale lock
    /// from a dead process is removed silently.
    pub fn acquire<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref();

        fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;

        let lock_path = data_dir.join(Self::LOCK_FILE_NAME);

        if lock_path.exists() {
            match Self::check_existing_lock(&lock_path) {
                Ok(Some(pid)) => {
                    bail!(
                        "Another claimsync instance is already running (PID: {})\n\
                         \n\
                         To resolve this:\n\
                         1. Stop the other instance, or\n\
                         2. If no other instance is running, remove the stale lock file:\n\
                            rm {:?}",
                        pid,
                        lock_path
                    );
                }
                Ok(None) => {
                    tracing::info!("Removing stale lock file from previous instance");
                    fs::remove_file(&lock_path).context("Failed to remove stale lock file")?;
                }
                Err(e) => {
                    tracing::warn!("Error checking existing lock: {}", e);
                    let _ = fs::remove_file(&lock_path);
                }
            }
        }

        let pid = std::process::id();
        let mut file = File::create(&lock_path)
            .with_context(|| format!("Failed to create lock file: {:?}", lock_path))?;
        writeln!(file, "{}", pid).context("Failed to write PID to lock file")?;

        tracing::debug!("Acquired process lock (PID: {}) at {:?}", pid, lock_path);

        Ok(Self {
            lock_path,
            owned: true,
        })
    }

    /// Check if an existing lock file is held by a running process.
    ///
    /// Returns `Ok(Some(pid))` if held, `Ok(None)` if stale.
    fn check_existing_lock(lock_path: &Path) -> Result<Option<u32>> {
        let mut file = File::open(lock_path).context("Failed to open existing lock file")?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .context("Failed to read lock file contents")?;

        let pid: u32 = contents
            .trim()
            .parse()
            .context("Failed to parse PID from lock file")?;

        if Self::is_process_running(pid) {
            Ok(Some(pid))
        } else {
            Ok(None)
        }
    }

    #[cfg(unix)]
    fn is_process_running(pid: u32) -> bool {
        // Verify via /proc that the PID belongs to a claimsync process and
        // not something that recycled the number.
        let proc_path = format!("/proc/{}/cmdline", pid);
        if let Ok(cmdline) = fs::read_to_string(&proc_path) {
            cmdline.contains("claimsync")
        } else {
            false
        }
    }

    #[cfg(not(unix))]
    fn is_process_running(_pid: u32) -> bool {
        // Conservative: assume the process might be running.
        true
    }

    /// Release the lock (called automatically on drop).
    pub fn release(&mut self) {
        if self.owned {
            if let Err(e) = fs::remove_file(&self.lock_path) {
                tracing::warn!("Failed to remove lock file: {}", e);
            } else {
                tracing::debug!("Released process lock at {:?}", self.lock_path);
            }
            self.owned = false;
        }
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for ProcessLock {
    fn drop(&mut self) {
        self.release();
    }
}
