//! Crate-wide fault taxonomy.
//!
//! Per-module errors (`PortalError`, `CrmError`, `ClassifierError`,
//! `GatewayError`, `StoreError`) convert into [`PipelineError`] at the
//! orchestrator boundary, so the sweep loop only has to reason about four
//! failure classes:
//!
//! - **Transient** — network/session faults; the case is skipped and the
//!   sweep continues.
//! - **Validation** — missing mandatory tag or credentials; hard stop for
//!   the whole job.
//! - **Conflict** — duplicate same-day job; rejected, never retried.
//! - **Data** — unparseable text or deadline; degrades to the documented
//!   default policy instead of failing.

use thiserror::Error;

/// Top-level fault taxonomy for the synchronization pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("transient external fault: {0}")]
    Transient(String),

    #[error("validation failure: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("data fault: {0}")]
    Data(String),
}

impl PipelineError {
    /// Whether this error aborts the whole job rather than a single case.
    pub fn is_job_fatal(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Government portal client errors.
#[derive(Debug, Error)]
pub enum PortalError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("portal returned status {0}")]
    ServerError(reqwest::StatusCode),
    #[error("portal session expired or credentials rejected")]
    Unauthorized,
    #[error("protocol {0} not found on portal")]
    ProtocolNotFound(String),
    #[error("malformed portal response: {0}")]
    Malformed(String),
}

/// External case-management system (CRM) errors.
#[derive(Debug, Error)]
pub enum CrmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("CRM returned status {0}")]
    ServerError(reqwest::StatusCode),
    #[error("case {0} not found in CRM")]
    CaseNotFound(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Classifier errors (AI service and fallback path).
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("AI service error: {0}")]
    Service(String),
    #[error("AI service returned an unusable verdict: {0}")]
    Unusable(String),
    #[error("no status entries available for protocol {0}")]
    EmptyHistory(String),
}

/// Messaging gateway errors.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("session is not ready (state: {0})")]
    NotReady(String),
    #[error("recipient {0} unknown to the gateway")]
    UnknownRecipient(String),
    #[error("destination number {0} is not a valid Brazilian phone number")]
    InvalidNumber(String),
    #[error("transport fault: {0}")]
    Transport(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("session degraded — manual re-pairing required")]
    Degraded,
}

impl GatewayError {
    /// Fixed signature set of recoverable runtime faults.
    ///
    /// Anything matching here triggers the recovery path (ephemeral wipe +
    /// backoff reconnect) instead of a full session invalidation.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(msg) => {
                let m = msg.to_lowercase();
                m.contains("stream errored")
                    || m.contains("timed out")
                    || m.contains("restart required")
                    || m.contains("internal failure")
                    || m.contains("connection reset")
            }
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

/// Durable store errors (sled-backed audit and history trees).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("entry {0} not found")]
    NotFound(u64),
    #[error("storage not initialized")]
    NotInitialized,
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<PortalError> for PipelineError {
    fn from(err: PortalError) -> Self {
        PipelineError::Transient(err.to_string())
    }
}

impl From<CrmError> for PipelineError {
    fn from(err: CrmError) -> Self {
        PipelineError::Transient(err.to_string())
    }
}

impl From<ClassifierError> for PipelineError {
    fn from(err: ClassifierError) -> Self {
        match err {
            ClassifierError::Service(_) => PipelineError::Transient(err.to_string()),
            _ => PipelineError::Data(err.to_string()),
        }
    }
}

impl From<GatewayError> for PipelineError {
    fn from(err: GatewayError) -> Self {
        PipelineError::Transient(err.to_string())
    }
}

impl From<StoreError> for PipelineError {
    fn from(err: StoreError) -> Self {
        PipelineError::Transient(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_fault_signatures() {
        assert!(GatewayError::Transport("Stream Errored (conflict)".into()).is_transient());
        assert!(GatewayError::Transport("request timed out".into()).is_transient());
        assert!(GatewayError::Transport("restart required".into()).is_transient());
        assert!(!GatewayError::Transport("logged out from phone".into()).is_transient());
        assert!(!GatewayError::Degraded.is_transient());
    }

    #[test]
    fn test_validation_is_job_fatal() {
        assert!(PipelineError::Validation("mandatory tag missing".into()).is_job_fatal());
        assert!(!PipelineError::Transient("socket closed".into()).is_job_fatal());
        assert!(!PipelineError::Data("no deadline".into()).is_job_fatal());
    }
}
