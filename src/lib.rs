//! claimsync — synchronization and notification pipeline for INSS
//! benefit-claim tracking.
//!
//! A daily sweep pulls claim movements from the government portal, classifies
//! each case's disposition, reconciles machine tags onto the CRM record
//! without touching human annotations, mirrors the outcome as a case note,
//! and messages the responsible channel through a session-based gateway that
//! survives the faults such gateways throw.
//!
//! Module map:
//!
//! - [`sync`] — job orchestrator and in-memory job store
//! - [`classifier`] — disposition + deadline classification (AI and keyword)
//! - [`tags`] — system-tag registry and reconciliation engine
//! - [`notify`] — note mirroring, dedup, routing, delivery audit
//! - [`gateway`] — messaging session FSM, artifacts, transport
//! - [`learning`] — append-only classification history with human validation
//! - [`clients`] — portal / CRM / AI service clients behind traits
//! - [`storage`] — sled database, audit trail, process lock
//! - [`api`] — axum surface for polling clients

pub mod api;
pub mod classifier;
pub mod clients;
pub mod config;
pub mod error;
pub mod gateway;
pub mod learning;
pub mod notify;
pub mod storage;
pub mod sync;
pub mod tags;
pub mod types;

pub use error::PipelineError;
