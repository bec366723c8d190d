//! Learning feedback store.
//!
//! Persists every classification decision — verbatim, untruncated — for
//! future retrieval and human validation. A non-critical side channel: write
//! failures are logged and swallowed, never surfaced to the pipeline.

mod store;
mod tokens;

pub use store::{HistoryEntry, LearningStore, RetrievedEntry};
pub use tokens::keyword_tokens;
