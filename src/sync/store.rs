//! Job store.
//!
//! Jobs live behind an explicit trait over an in-memory DashMap. The trait
//! exists so a distributed backend can slot in later without touching the
//! orchestrator; correctness of the one-job-per-day rule holds only for a
//! single process instance.

use crate::types::{JobStatus, SyncJob};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::warn;
use uuid::Uuid;

pub trait JobStore: Send + Sync {
    fn insert(&self, job: SyncJob);

    fn get(&self, id: &Uuid) -> Option<SyncJob>;

    /// Apply a mutation to one job. Single-writer per job key: the DashMap
    /// entry lock serializes concurrent callers.
    fn update(&self, id: &Uuid, mutate: &mut dyn FnMut(&mut SyncJob)) -> bool;

    /// Mark every Pending/Running job older than `stale_minutes` as Failed.
    /// Returns the number of jobs reclaimed.
    fn sweep(&self, now: DateTime<Utc>, stale_minutes: i64) -> usize;

    /// A job from `today` that blocks a new run: Pending, Running, or
    /// Completed. Failed jobs do not block a retry.
    fn blocking_job_for_day(&self, today: chrono::NaiveDate) -> Option<SyncJob>;

    /// All jobs, newest first.
    fn list(&self) -> Vec<SyncJob>;
}

#[derive(Default)]
pub struct MemoryJobStore {
    jobs: DashMap<Uuid, SyncJob>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobStore for MemoryJobStore {
    fn insert(&self, job: SyncJob) {
        self.jobs.insert(job.id, job);
    }

    fn get(&self, id: &Uuid) -> Option<SyncJob> {
        self.jobs.get(id).map(|j| j.clone())
    }

    fn update(&self, id: &Uuid, mutate: &mut dyn FnMut(&mut SyncJob)) -> bool {
        match self.jobs.get_mut(id) {
            Some(mut job) => {
                mutate(&mut job);
                true
            }
            None => false,
        }
    }

    fn sweep(&self, now: DateTime<Utc>, stale_minutes: i64) -> usize {
        let mut reclaimed = 0;
        for mut entry in self.jobs.iter_mut() {
            if entry.status.is_active() && entry.age_minutes(now) > stale_minutes {
                let age = entry.age_minutes(now);
                warn!(job_id = %entry.id, age_minutes = age, "Reclaiming stale job");
                let stuck_in = entry.status;
                entry.status = JobStatus::Failed;
                entry.error = Some(format!("timed out: still {} after {} minutes", stuck_in, age));
                entry.finished_at = Some(now);
                reclaimed += 1;
            }
        }
        reclaimed
    }

    fn blocking_job_for_day(&self, today: chrono::NaiveDate) -> Option<SyncJob> {
        self.jobs
            .iter()
            .filter(|j| j.started_at.date_naive() == today)
            .find(|j| j.status != JobStatus::Failed)
            .map(|j| j.clone())
    }

    fn list(&self) -> Vec<SyncJob> {
        let mut jobs: Vec<SyncJob> = self.jobs.iter().map(|j| j.clone()).collect();
        jobs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        jobs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{JobTrigger, SyncWindow};
    use chrono::Duration;

    fn job() -> SyncJob {
        let now = Utc::now();
        SyncJob::new(
            JobTrigger::Manual,
            "ana".into(),
            SyncWindow {
                start: now - Duration::days(40),
                end: now,
            },
        )
    }

    #[test]
    fn test_sweep_reclaims_only_stale_active_jobs() {
        let store = MemoryJobStore::new();

        let mut stale = job();
        stale.status = JobStatus::Running;
        stale.started_at = Utc::now() - Duration::minutes(45);
        let stale_id = stale.id;
        store.insert(stale);

        let fresh = job();
        let fresh_id = fresh.id;
        store.insert(fresh);

        let mut done = job();
        done.status = JobStatus::Completed;
        done.started_at = Utc::now() - Duration::minutes(90);
        let done_id = done.id;
        store.insert(done);

        assert_eq!(store.sweep(Utc::now(), 30), 1);
        assert_eq!(store.get(&stale_id).unwrap().status, JobStatus::Failed);
        assert!(store.get(&stale_id).unwrap().error.is_some());
        assert_eq!(store.get(&fresh_id).unwrap().status, JobStatus::Pending);
        assert_eq!(store.get(&done_id).unwrap().status, JobStatus::Completed);
    }

    #[test]
    fn test_failed_job_does_not_block_the_day() {
        let store = MemoryJobStore::new();

        let mut failed = job();
        failed.status = JobStatus::Failed;
        store.insert(failed);

        assert!(store.blocking_job_for_day(Utc::now().date_naive()).is_none());

        let mut completed = job();
        completed.status = JobStatus::Completed;
        let completed_id = completed.id;
        store.insert(completed);

        let blocking = store.blocking_job_for_day(Utc::now().date_naive()).unwrap();
        assert_eq!(blocking.id, completed_id);
    }

    #[test]
    fn test_update_is_a_no_op_for_unknown_job() {
        let store = MemoryJobStore::new();
        let updated = store.update(&Uuid::new_v4(), &mut |j| {
            j.status = JobStatus::Completed;
        });
        assert!(!updated);
    }

    #[test]
    fn test_list_is_newest_first() {
        let store = MemoryJobStore::new();
        let mut old = job();
        old.started_at = Utc::now() - Duration::hours(2);
        let new = job();
        let new_id = new.id;
        store.insert(old);
        store.insert(new);

        let listed = store.list();
        assert_eq!(listed[0].id, new_id);
    }
}
