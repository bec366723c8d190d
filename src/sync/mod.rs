//! Job orchestration: the daily sweep, its in-memory job store, and the
//! per-case processing loop.

pub mod orchestrator;
pub mod store;

pub use orchestrator::{JobTicket, Orchestrator};
pub use store::{JobStore, MemoryJobStore};
