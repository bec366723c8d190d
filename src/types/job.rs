//! Sync job model.
//!
//! Jobs live in process memory only. A job is created per sweep, mutated by
//! the single task that owns it, and reaped by the 30-minute staleness sweep
//! if that task dies. Nothing here survives a restart.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a sync job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// Pending and Running jobs are "active": they block a new same-day run
    /// and are subject to the staleness sweep.
    pub fn is_active(self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Running)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "PENDING"),
            JobStatus::Running => write!(f, "RUNNING"),
            JobStatus::Completed => write!(f, "COMPLETED"),
            JobStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// What started the sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobTrigger {
    Manual,
    Scheduled,
}

/// Reporting window one sweep covers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SyncWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Aggregate per-case counters, merged incrementally by progress callbacks.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct JobProgress {
    pub total: u32,
    pub processed: u32,
    pub succeeded: u32,
    pub failed: u32,
}

/// One execution of the full synchronization sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncJob {
    pub id: Uuid,
    pub status: JobStatus,
    pub trigger: JobTrigger,
    pub owner: String,
    pub window: SyncWindow,
    pub progress: JobProgress,
    /// Protocols whose processing failed (skipped, sweep continued).
    pub failed_protocols: Vec<String>,
    /// Human-readable result summary, set on completion.
    pub summary: Option<String>,
    /// Terminal error message, set on failure.
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SyncJob {
    pub fn new(trigger: JobTrigger, owner: String, window: SyncWindow) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: JobStatus::Pending,
            trigger,
            owner,
            window,
            progress: JobProgress::default(),
            failed_protocols: Vec::new(),
            summary: None,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Minutes since the job was started.
    pub fn age_minutes(&self, now: DateTime<Utc>) -> i64 {
        (now - self.started_at).num_minutes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_states() {
        assert!(JobStatus::Pending.is_active());
        assert!(JobStatus::Running.is_active());
        assert!(!JobStatus::Completed.is_active());
        assert!(!JobStatus::Failed.is_active());
    }

    #[test]
    fn test_new_job_starts_pending() {
        let window = SyncWindow {
            start: Utc::now(),
            end: Utc::now(),
        };
        let job = SyncJob::new(JobTrigger::Manual, "ana".into(), window);
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress.total, 0);
        assert!(job.finished_at.is_none());
    }
}
