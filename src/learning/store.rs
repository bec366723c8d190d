//! Classification history persistence and retrieval.
//!
//! Append-only sled tree keyed by timestamp nanoseconds big-endian. The entry
//! id exposed to the API is the numeric key, so validation can address a
//! stored decision directly.

use super::tokens::keyword_tokens;
use crate::config::defaults::LEARNING_EXCERPT_CHARS;
use crate::error::StoreError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sled::Tree;
use tracing::{debug, warn};

const TREE_NAME: &str = "classification_history";

/// One stored classification decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Numeric id (equal to the tree key).
    pub id: u64,
    pub protocol: String,
    /// Source text, verbatim and untruncated.
    pub source_text: String,
    /// Routing label of the decision (REQUIREMENT, DENIED_ON_MERITS, ...).
    pub decision: String,
    pub confidence: f64,
    /// Whether a human has reviewed this decision.
    pub validated: bool,
    /// Reviewer verdict, present once validated.
    pub is_correct: Option<bool>,
    pub validator: Option<String>,
    #[serde(default)]
    pub notes: String,
    pub timestamp: DateTime<Utc>,
}

/// An entry returned by `retrieve_similar`, with a size-bounded excerpt
/// suitable for prompt inclusion.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedEntry {
    pub id: u64,
    pub decision: String,
    pub confidence: f64,
    pub validated: bool,
    pub is_correct: Option<bool>,
    pub excerpt: String,
}

/// Append-only classification history over a named sled tree.
#[derive(Clone)]
pub struct LearningStore {
    tree: Tree,
}

impl LearningStore {
    /// Open the history tree from a database handle.
    pub fn open(db: &sled::Db) -> Result<Self, StoreError> {
        let tree = db.open_tree(TREE_NAME)?;
        Ok(Self { tree })
    }

    /// Open from the global database (requires `storage::init()`).
    pub fn open_global() -> Result<Self, StoreError> {
        Self::open(crate::storage::db()?)
    }

    /// Persist a classification decision.
    ///
    /// Failures are logged and swallowed: the learning store is a side
    /// channel and must never fail the pipeline.
    pub fn record(&self, protocol: &str, source_text: &str, decision: &str, confidence: f64) {
        if let Err(e) = self.try_record(protocol, source_text, decision, confidence) {
            warn!(protocol = %protocol, error = %e, "Failed to record classification history");
        }
    }

    fn try_record(
        &self,
        protocol: &str,
        source_text: &str,
        decision: &str,
        confidence: f64,
    ) -> Result<u64, StoreError> {
        let now = Utc::now();
        let mut id = now
            .timestamp_nanos_opt()
            .unwrap_or_else(|| now.timestamp() * 1_000_000_000) as u64;
        while self.tree.get(id.to_be_bytes())?.is_some() {
            id += 1;
        }

        let entry = HistoryEntry {
            id,
            protocol: protocol.to_string(),
            source_text: source_text.to_string(),
            decision: decision.to_string(),
            confidence,
            validated: false,
            is_correct: None,
            validator: None,
            notes: String::new(),
            timestamp: now,
        };

        self.tree.insert(id.to_be_bytes(), serde_json::to_vec(&entry)?)?;
        debug!(protocol = %protocol, decision = %decision, id, "Classification decision recorded");
        Ok(id)
    }

    /// Rank stored entries by lexical relevance against the query keywords.
    ///
    /// Falls back to the most-confident, most-recent entries when nothing
    /// matches lexically. Returns up to `k` entries with excerpts capped for
    /// prompt inclusion.
    pub fn retrieve_similar(
        &self,
        query_text: &str,
        k: usize,
        min_confidence: f64,
    ) -> Vec<RetrievedEntry> {
        let query: Vec<String> = keyword_tokens(query_text);
        if k == 0 {
            return Vec::new();
        }

        let mut scored: Vec<(usize, HistoryEntry)> = Vec::new();
        for item in self.tree.iter() {
            let Ok((_key, value)) = item else { continue };
            let Ok(entry) = serde_json::from_slice::<HistoryEntry>(&value) else {
                continue;
            };
            if entry.confidence < min_confidence {
                continue;
            }
            let entry_tokens = keyword_tokens(&entry.source_text);
            let hits = query
                .iter()
                .filter(|q| entry_tokens.iter().any(|t| t == *q))
                .count();
            scored.push((hits, entry));
        }

        let any_lexical = scored.iter().any(|(hits, _)| *hits > 0);
        if any_lexical {
            scored.retain(|(hits, _)| *hits > 0);
            scored.sort_by(|a, b| {
                b.0.cmp(&a.0)
                    .then(b.1.timestamp.cmp(&a.1.timestamp))
            });
        } else {
            // No lexical match: most confident first, recency as tiebreak.
            scored.sort_by(|a, b| {
                b.1.confidence
                    .partial_cmp(&a.1.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(b.1.timestamp.cmp(&a.1.timestamp))
            });
        }

        scored
            .into_iter()
            .take(k)
            .map(|(_, e)| {
                let excerpt: String = e.source_text.chars().take(LEARNING_EXCERPT_CHARS).collect();
                RetrievedEntry {
                    id: e.id,
                    decision: e.decision,
                    confidence: e.confidence,
                    validated: e.validated,
                    is_correct: e.is_correct,
                    excerpt,
                }
            })
            .collect()
    }

    /// Record human feedback on a stored decision.
    pub fn validate(
        &self,
        entry_id: u64,
        is_correct: bool,
        validator: &str,
        notes: &str,
    ) -> Result<(), StoreError> {
        let key = entry_id.to_be_bytes();
        let value = self.tree.get(key)?.ok_or(StoreError::NotFound(entry_id))?;
        let mut entry: HistoryEntry = serde_json::from_slice(&value)?;

        entry.validated = true;
        entry.is_correct = Some(is_correct);
        entry.validator = Some(validator.to_string());
        entry.notes = notes.to_string();

        self.tree.insert(key, serde_json::to_vec(&entry)?)?;
        Ok(())
    }

    /// Fetch one entry by id.
    pub fn get(&self, entry_id: u64) -> Result<Option<HistoryEntry>, StoreError> {
        match self.tree.get(entry_id.to_be_bytes())? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    /// Delete entries older than `days`. Returns how many were removed.
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
        Ok(deleted)
    }

    pub fn count(&self) -> usize {
        self.tree.len()
    }
}
