//! Durable local storage.
//!
//! One sled database under the data directory holds every append-only tree:
//! the notification audit trail and the classification learning history.
//! The job map is deliberately *not* here — job state is process memory only
//! and lost on restart.
//!
//! Call `init()` once at startup; stores open their named trees from the
//! global Db. Tests open instance stores from a temp Db instead.

pub mod audit;
pub mod lockfile;

pub use audit::{ChannelKind, DeliveryOutcome, NotificationAudit, NotificationRecord};
pub use lockfile::ProcessLock;

use crate::error::StoreError;
use std::path::Path;
use std::sync::{Arc, OnceLock};

static DB: OnceLock<Arc<sled::Db>> = OnceLock::new();

/// Open the global sled database under `data_dir`.
///
/// Must be called once before any `open_global()` store constructor.
pub fn init<P: AsRef<Path>>(data_dir: P) -> Result<(), StoreError> {
    if DB.get().is_some() {
        return Ok(());
    }
    let path = data_dir.as_ref().join("claimsync.db");
    let db = sled::open(&path)?;
    tracing::info!(path = %path.display(), "Durable storage opened");
    let _ = DB.set(Arc::new(db));
    Ok(())
}

/// Get the global database.
pub fn db() -> Result<&'static Arc<sled::Db>, StoreError> {
    DB.get().ok_or(StoreError::NotInitialized)
}

/// Flush all pending writes. Called during graceful shutdown.
pub fn flush() {
    if let Some(db) = DB.get() {
        if let Err(e) = db.flush() {
            tracing::warn!(error = %e, "Failed to flush storage on shutdown");
        }
    }
}
