//! Job orchestrator.
//!
//! One sweep per calendar day: list protocols with movement in the reporting
//! window, then per case classify, reconcile tags, route notifications, and
//! record the decision. Cases run strictly sequentially (one browsing
//! session, one messaging session) with a fixed delay between them.
//!
//! Per-case failures are counted and skipped; only a Validation failure
//! (missing credentials, lost mandatory tag) aborts the whole job.

use crate::classifier::Classifier;
use crate::clients::{CaseManager, CasePortal, PortalCredentials};
use crate::config;
use crate::error::PipelineError;
use crate::learning::LearningStore;
use crate::notify::NotificationRouter;
use crate::sync::store::JobStore;
use crate::tags::{system_tags_for, TagReconciler};
use crate::types::{
    CaseContext, CaseRecord, JobStatus, JobTrigger, SyncJob, SyncWindow,
};
use chrono::{Duration, Utc};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Ticket returned by `start`: enough for the caller to poll the job.
#[derive(Debug, Clone, serde::Serialize)]
pub struct JobTicket {
    pub job_id: Uuid,
    pub window_start: chrono::DateTime<Utc>,
    pub window_end: chrono::DateTime<Utc>,
}

pub struct Orchestrator {
    portal: Arc<dyn CasePortal>,
    crm: Arc<dyn CaseManager>,
    classifier: Arc<dyn Classifier>,
    reconciler: Arc<TagReconciler>,
    router: Arc<NotificationRouter>,
    learning: LearningStore,
    jobs: Arc<dyn JobStore>,
}

impl Orchestrator {
    pub fn new(
        portal: Arc<dyn CasePortal>,
        crm: Arc<dyn CaseManager>,
        classifier: Arc<dyn Classifier>,
        reconciler: Arc<TagReconciler>,
        router: Arc<NotificationRouter>,
        learning: LearningStore,
        jobs: Arc<dyn JobStore>,
    ) -> Arc<Self> {
        Arc::new(Self {
            portal,
            crm,
            classifier,
            reconciler,
            router,
            learning,
            jobs,
        })
    }

    /// Start a sweep. Reclaims stale jobs first, enforces the one-job-per-day
    /// rule, then launches processing on a spawned task and returns without
    /// blocking.
    pub fn start(
        self: &Arc<Self>,
        trigger: JobTrigger,
        force: bool,
        owner: String,
        credentials: PortalCredentials,
    ) -> Result<JobTicket, PipelineError> {
        if credentials.cpf.is_empty() || credentials.password.is_empty() {
            return Err(PipelineError::Validation(
                "portal credentials are required to start a job".into(),
            ));
        }

        let cfg = &config::get().pipeline;
        let now = Utc::now();

        let reclaimed = self.jobs.sweep(now, cfg.stale_job_minutes);
        if reclaimed > 0 {
            warn!(reclaimed, "Stale jobs reclaimed before start");
        }

        if !force {
            if let Some(existing) = self.jobs.blocking_job_for_day(now.date_naive()) {
                return Err(PipelineError::Conflict(format!(
                    "job {} already {} today; pass force to rerun",
                    existing.id, existing.status
                )));
            }
        }

        let window = SyncWindow {
            start: now - Duration::days(cfg.report_window_days as i64),
            end: now,
        };
        let job = SyncJob::new(trigger, owner, window);
        let ticket = JobTicket {
            job_id: job.id,
            window_start: window.start,
            window_end: window.end,
        };
        self.jobs.insert(job);
        self.jobs.update(&ticket.job_id, &mut |j| {
            j.status = JobStatus::Running;
        });

        info!(
            job_id = %ticket.job_id,
            window_start = %window.start,
            window_end = %window.end,
            ?trigger,
            "Sync job started"
        );

        let orch = Arc::clone(self);
        let job_id = ticket.job_id;
        tokio::spawn(async move {
            match orch.run_job(job_id, &credentials, &window).await {
                Ok(summary) => {
                    orch.jobs.update(&job_id, &mut |j| {
                        j.status = JobStatus::Completed;
                        j.summary = Some(summary.clone());
                        j.finished_at = Some(Utc::now());
                    });
                    info!(job_id = %job_id, "Sync job completed");
                }
                Err(e) => {
                    orch.jobs.update(&job_id, &mut |j| {
                        j.status = JobStatus::Failed;
                        j.error = Some(e.to_string());
                        j.finished_at = Some(Utc::now());
                    });
                    error!(job_id = %job_id, error = %e, "Sync job failed");
                }
            }
        });

        Ok(ticket)
    }

    /// Snapshot of one job.
    pub fn status(&self, job_id: &Uuid) -> Option<SyncJob> {
        self.jobs.get(job_id)
    }

    /// Recent jobs, newest first.
    pub fn list_jobs(&self) -> Vec<SyncJob> {
        self.jobs.list()
    }

    async fn run_job(
        &self,
        job_id: Uuid,
        credentials: &PortalCredentials,
        window: &SyncWindow,
    ) -> Result<String, PipelineError> {
        let cfg = &config::get().pipeline;

        let protocols = self.portal.list_protocols(credentials, window).await?;
        info!(job_id = %job_id, protocols = protocols.len(), "Reporting window listed");

        self.jobs.update(&job_id, &mut |j| {
            j.progress.total = protocols.len() as u32;
        });

        let delay = StdDuration::from_millis(cfg.inter_case_delay_ms);
        let mut succeeded = 0u32;
        let mut failed = 0u32;

        for (i, protocol) in protocols.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(delay).await;
            }

            match self.process_case(credentials, protocol).await {
                Ok(()) => succeeded += 1,
                Err(e) if e.is_job_fatal() => {
                    error!(job_id = %job_id, protocol = %protocol, error = %e, "Fatal case failure, aborting job");
                    return Err(e);
                }
                Err(e) => {
                    warn!(job_id = %job_id, protocol = %protocol, error = %e, "Case failed, continuing");
                    failed += 1;
                    let p = protocol.clone();
                    self.jobs.update(&job_id, &mut |j| {
                        j.failed_protocols.push(p.clone());
                    });
                }
            }

            self.jobs.update(&job_id, &mut |j| {
                j.progress.processed = (i + 1) as u32;
                j.progress.succeeded = succeeded;
                j.progress.failed = failed;
            });
        }

        Ok(format!(
            "{} protocols: {} succeeded, {} failed",
            protocols.len(),
            succeeded,
            failed
        ))
    }

    /// One case end to end: fetch, resolve the CRM record, classify,
    /// reconcile tags, route notifications, record the decision.
    async fn process_case(
        &self,
        credentials: &PortalCredentials,
        protocol: &str,
    ) -> Result<(), PipelineError> {
        let cfg = &config::get().pipeline;

        let portal_case = self.portal.fetch_case(credentials, protocol).await?;
        let record = self.resolve_case_record(&portal_case).await?;

        let context = CaseContext {
            protocol: protocol.to_string(),
            birth_date: portal_case.birth_date,
            current_phase: record.phase,
            entries: portal_case
                .entries
                .iter()
                .take(cfg.history_entries)
                .cloned()
                .collect(),
        };

        let outcome = self.classifier.classify(&context).await?;
        info!(
            protocol = %protocol,
            disposition = %outcome.routing_label(),
            confidence = outcome.confidence,
            deadline = %outcome.deadline,
            "Case classified"
        );

        let system_tags = system_tags_for(&outcome, record.benefit);
        let written = self.reconciler.reconcile(&record.crm_id, &system_tags).await?;

        // Route against the post-reconciliation tag set so a manual region
        // tag placed today already redirects today's notification.
        let routed = CaseRecord {
            tags: written,
            phase: outcome.phase,
            ..record
        };
        self.router.route(&routed, &outcome, &[]).await?;

        self.learning.record(
            protocol,
            &context.full_text(),
            &outcome.routing_label(),
            outcome.confidence,
        );

        Ok(())
    }

    /// Find the CRM record by national id, creating it on first contact.
    async fn resolve_case_record(
        &self,
        portal_case: &crate::clients::PortalCase,
    ) -> Result<CaseRecord, PipelineError> {
        if let Some(record) = self
            .crm
            .find_case_by_national_id(&portal_case.national_id)
            .await
            .map_err(PipelineError::from)?
        {
            return Ok(record);
        }

        info!(
            protocol = %portal_case.protocol,
            "No CRM record for claimant, creating one"
        );
        self.crm
            .create_case(
                &portal_case.claimant_name,
                &portal_case.national_id,
                &portal_case.protocol,
                portal_case.benefit,
            )
            .await
            .map_err(PipelineError::from)
    }
}
