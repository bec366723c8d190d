//! Notification audit trail.
//!
//! Append-only record of every delivery attempt the router makes, persisted
//! regardless of channel outcome. Keys are timestamp nanoseconds big-endian,
//! so iteration order is chronological and `.rev()` yields newest first.

use crate::error::StoreError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sled::Tree;

const TREE_NAME: &str = "notification_audit";

/// Which routing-table channel a message went to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Office,
    Approval,
    Legal,
    RegionalPartner,
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelKind::Office => write!(f, "office"),
            ChannelKind::Approval => write!(f, "approval"),
            ChannelKind::Legal => write!(f, "legal"),
            ChannelKind::RegionalPartner => write!(f, "regional_partner"),
        }
    }
}

/// Per-destination delivery result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Sent,
    Failed { reason: String },
    /// Suppressed by duplicate detection before any send was attempted.
    Skipped { reason: String },
}

/// One audit entry: a message destined for one channel, with its outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub protocol: String,
    pub disposition: String,
    pub channel: ChannelKind,
    pub destination: String,
    pub body: String,
    pub outcome: DeliveryOutcome,
    pub timestamp: DateTime<Utc>,
}

/// Append-only notification audit over a named sled tree.
#[derive(Clone)]
pub struct NotificationAudit {
    tree: Tree,
}

impl NotificationAudit {
    /// Open the audit tree from a database handle.
    pub fn open(db: &sled::Db) -> Result<Self, StoreError> {
        let tree = db.open_tree(TREE_NAME)?;
        Ok(Self { tree })
    }

    /// Open from the global database (requires `storage::init()`).
    pub fn open_global() -> Result<Self, StoreError> {
        Self::open(super::db()?)
    }

    /// Append a record. Key: timestamp nanos big-endian, bumped on collision
    /// so two records in the same nanosecond both survive.
    pub fn append(&self, record: &NotificationRecord) -> Result<(), StoreError> {
        let mut key = record
            .timestamp
            .timestamp_nanos_opt()
            .unwrap_or_else(|| record.timestamp.timestamp() * 1_000_000_000)
            as u64;
        let value = serde_json::to_vec(record)?;
        while self.tree.get(key.to_be_bytes())?.is_some() {
            key += 1;
        }
        self.tree.insert(key.to_be_bytes(), value)?;
        Ok(())
    }

    /// Most recent N records, newest first.
    pub fn recent(&self, limit: usize) -> Vec<NotificationRecord> {
        let mut records = Vec::with_capacity(limit);
        for item in self.tree.iter().rev() {
            if records.len() >= limit {
                break;
            }
            if let Ok((_key, value)) = item {
                if let Ok(record) = serde_json::from_slice::<NotificationRecord>(&value) {
                    records.push(record);
                }
            }
        }
        records
    }

    /// Records for one protocol, newest first.
    pub fn for_protocol(&self, protocol: &str, limit: usize) -> Vec<NotificationRecord> {
        let mut records = Vec::new();
        for item in self.tree.iter().rev() {
            if records.len() >= limit {
                break;
            }
            if let Ok((_key, value)) = item {
                if let Ok(record) = serde_json::from_slice::<NotificationRecord>(&value) {
                    if record.protocol == protocol {
                        records.push(record);
                    }
                }
            }
        }
        records
    }

    /// Delete records older than `days`. Returns how many were removed.
    pub fn prune_older_than(&self, days: i64) -> Result<usize, StoreError> {
        let cutoff = Utc::now() - Duration::days(days);
        let cutoff_key = (cutoff
            .timestamp_nanos_opt()
            .unwrap_or_else(|| cutoff.timestamp() * 1_000_000_000) as u64)
            .to_be_bytes();

        let mut deleted = 0;
        let keys: Vec<_> = self
            .tree
            .iter()
            .filter_map(|item| {
                item.ok().and_then(|(key, _)| {
                    (key.as_ref() < cutoff_key.as_slice()).then(|| key.to_vec())
                })
            })
            .collect();

        for key in keys {
            self.tree.remove(key)?;
            deleted += 1;
        }
        if deleted > 0 {
            self.tree.flush()?;
        }
        Ok(deleted)
    }

    pub fn count(&self) -> usize {
        self.tree.len()
    }
}
