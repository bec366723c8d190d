//! End-to-end pipeline tests.
//!
//! Exercises a full sweep through the orchestrator with scripted portal, CRM,
//! AI, and messaging stubs: fetch, classify (keyword fallback), reconcile
//! tags, note, message, learning record. No network, no binary spawn.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use claimsync::classifier::{Classifier, CompositeClassifier};
use claimsync::clients::{
    AiService, AiVerdict, CaseManager, CaseNote, CasePortal, NoteSeverity, PortalCase,
    PortalCredentials,
};
use claimsync::error::{ClassifierError, CrmError, GatewayError, PipelineError, PortalError};
use claimsync::learning::LearningStore;
use claimsync::notify::{MessageSender, NotificationRouter};
use claimsync::storage::NotificationAudit;
use claimsync::sync::{JobStore, MemoryJobStore, Orchestrator};
use claimsync::tags::TagReconciler;
use claimsync::types::{
    BenefitKind, CaseRecord, CasePhase, JobStatus, JobTrigger, StatusEntry, SyncJob, SyncWindow,
};

// ============================================================================
// Stubs
// ============================================================================

struct ScriptedPortal {
    cases: HashMap<String, PortalCase>,
}

#[async_trait]
impl CasePortal for ScriptedPortal {
    async fn list_protocols(
        &self,
        _credentials: &PortalCredentials,
        _window: &SyncWindow,
    ) -> Result<Vec<String>, PortalError> {
        let mut protocols: Vec<String> = self.cases.keys().cloned().collect();
        protocols.sort();
        Ok(protocols)
    }

    async fn fetch_case(
        &self,
        _credentials: &PortalCredentials,
        protocol: &str,
    ) -> Result<PortalCase, PortalError> {
        self.cases
            .get(protocol)
            .cloned()
            .ok_or_else(|| PortalError::ProtocolNotFound(protocol.to_string()))
    }
}

/// Events appended by the CRM and sender stubs, in call order.
type EventLog = Arc<Mutex<Vec<&'static str>>>;

struct RecordingCrm {
    records: Mutex<HashMap<String, CaseRecord>>,
    notes: Mutex<Vec<(String, CaseNote, NoteSeverity)>>,
    events: EventLog,
}

impl RecordingCrm {
    fn seeded(record: CaseRecord, events: EventLog) -> Self {
        let mut records = HashMap::new();
        records.insert(record.crm_id.clone(), record);
        Self {
            records: Mutex::new(records),
            notes: Mutex::new(Vec::new()),
            events,
        }
    }

    fn tags_of(&self, crm_id: &str) -> Vec<String> {
        self.records.lock().unwrap()[crm_id].tags.clone()
    }
}

#[async_trait]
impl CaseManager for RecordingCrm {
    async fn find_case_by_national_id(
        &self,
        national_id: &str,
    ) -> Result<Option<CaseRecord>, CrmError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .find(|r| r.national_id == national_id)
            .cloned())
    }

    async fn get_case(&self, crm_id: &str) -> Result<CaseRecord, CrmError> {
        self.records
            .lock()
            .unwrap()
            .get(crm_id)
            .cloned()
            .ok_or_else(|| CrmError::CaseNotFound(crm_id.to_string()))
    }

    async fn create_case(
        &self,
        claimant_name: &str,
        national_id: &str,
        protocol: &str,
        benefit: BenefitKind,
    ) -> Result<CaseRecord, CrmError> {
        let record = CaseRecord {
            crm_id: format!("crm-{}", protocol),
            protocol: protocol.to_string(),
            national_id: national_id.to_string(),
            claimant_name: claimant_name.to_string(),
            benefit,
            phase: CasePhase::Administrative,
            tags: Vec::new(),
            deadline: None,
            birth_date: None,
        };
        self.records
            .lock()
            .unwrap()
            .insert(record.crm_id.clone(), record.clone());
        Ok(record)
    }

    async fn replace_tags(&self, crm_id: &str, tags: &[String]) -> Result<(), CrmError> {
        match self.records.lock().unwrap().get_mut(crm_id) {
            Some(record) => {
                record.tags = tags.to_vec();
                Ok(())
            }
            None => Err(CrmError::CaseNotFound(crm_id.to_string())),
        }
    }

    async fn create_note(
        &self,
        crm_id: &str,
        title: &str,
        body: &str,
        severity: NoteSeverity,
    ) -> Result<(), CrmError> {
        self.events.lock().unwrap().push("note");
        self.notes.lock().unwrap().push((
            crm_id.to_string(),
            CaseNote {
                title: title.to_string(),
                body: body.to_string(),
                created_at: Utc::now(),
            },
            severity,
        ));
        Ok(())
    }

    async fn list_notes(&self, crm_id: &str) -> Result<Vec<CaseNote>, CrmError> {
        // Newest first, as the production client returns them.
        Ok(self
            .notes
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|(id, _, _)| id == crm_id)
            .map(|(_, note, _)| note.clone())
            .collect())
    }
}

struct RecordingSender {
    sent: Mutex<Vec<(String, String)>>,
    events: EventLog,
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send(&self, destination: &str, text: &str) -> Result<(), GatewayError> {
        self.events.lock().unwrap().push("message");
        self.sent
            .lock()
            .unwrap()
            .push((destination.to_string(), text.to_string()));
        Ok(())
    }
}

/// AI service that is always down, forcing the keyword fallback path.
struct DownAi;

#[async_trait]
impl AiService for DownAi {
    async fn classify(
        &self,
        _entries: &[StatusEntry],
        _protocol: &str,
        _birth_date: Option<NaiveDate>,
    ) -> Result<AiVerdict, ClassifierError> {
        Err(ClassifierError::Service("connection refused".into()))
    }
}

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    orchestrator: Arc<Orchestrator>,
    crm: Arc<RecordingCrm>,
    sender: Arc<RecordingSender>,
    jobs: Arc<MemoryJobStore>,
    events: EventLog,
    _tmp: tempfile::TempDir,
}

fn requirement_case() -> PortalCase {
    PortalCase {
        protocol: "700123456789".into(),
        claimant_name: "Maria da Silva".into(),
        national_id: "12345678901".into(),
        birth_date: NaiveDate::from_ymd_opt(1960, 3, 15),
        benefit: BenefitKind::DisabilityAid,
        entries: vec![StatusEntry {
            date: NaiveDate::from_ymd_opt(2025, 11, 1).unwrap(),
            title: "Exigência".into(),
            body: "Cumprir exigência: enviar laudo médico, prazo até 01/12/2025".into(),
        }],
    }
}

fn seeded_record() -> CaseRecord {
    CaseRecord {
        crm_id: "crm-1".into(),
        protocol: "700123456789".into(),
        national_id: "12345678901".into(),
        claimant_name: "Maria da Silva".into(),
        benefit: BenefitKind::DisabilityAid,
        phase: CasePhase::Administrative,
        tags: vec!["cliente-vip".into(), "INSS-MONITORADO".into()],
        deadline: None,
        birth_date: NaiveDate::from_ymd_opt(1960, 3, 15),
    }
}

fn harness(cases: Vec<PortalCase>, record: CaseRecord) -> Harness {
    let tmp = tempfile::tempdir().unwrap();
    let db = sled::Config::new()
        .path(tmp.path().join("db"))
        .temporary(true)
        .open()
        .unwrap();
    let audit = NotificationAudit::open(&db).unwrap();
    let learning = LearningStore::open(&db).unwrap();

    let events: EventLog = Arc::new(Mutex::new(Vec::new()));
    let crm = Arc::new(RecordingCrm::seeded(record, events.clone()));
    let sender = Arc::new(RecordingSender {
        sent: Mutex::new(Vec::new()),
        events: events.clone(),
    });
    let jobs = Arc::new(MemoryJobStore::new());

    let crm_dyn: Arc<dyn CaseManager> = crm.clone();
    let classifier: Arc<dyn Classifier> =
        Arc::new(CompositeClassifier::from_config(Arc::new(DownAi)));
    let router = Arc::new(NotificationRouter::new(
        crm_dyn.clone(),
        sender.clone(),
        audit,
    ));
    let portal = Arc::new(ScriptedPortal {
        cases: cases.into_iter().map(|c| (c.protocol.clone(), c)).collect(),
    });
    let orchestrator = Orchestrator::new(
        portal,
        crm_dyn.clone(),
        classifier,
        Arc::new(TagReconciler::new(crm_dyn)),
        router,
        learning,
        jobs.clone(),
    );

    Harness {
        orchestrator,
        crm,
        sender,
        jobs,
        events,
        _tmp: tmp,
    }
}

fn credentials() -> PortalCredentials {
    PortalCredentials {
        cpf: "98765432100".into(),
        password: "portal-pass".into(),
    }
}

async fn wait_for_terminal(h: &Harness, job_id: &uuid::Uuid) -> SyncJob {
    for _ in 0..500 {
        if let Some(job) = h.orchestrator.status(job_id) {
            if !job.status.is_active() {
                return job;
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("job {} never reached a terminal state", job_id);
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_requirement_sweep_end_to_end() {
    let h = harness(vec![requirement_case()], seeded_record());

    let ticket = h
        .orchestrator
        .start(JobTrigger::Manual, false, "e2e".into(), credentials())
        .unwrap();
    let job = wait_for_terminal(&h, &ticket.job_id).await;

    assert_eq!(job.status, JobStatus::Completed, "error: {:?}", job.error);
    assert_eq!(job.progress.succeeded, 1);
    assert_eq!(job.progress.failed, 0);

    // Tags: system set written, manual annotations survive.
    let tags = h.crm.tags_of("crm-1");
    assert!(tags.contains(&"cliente-vip".to_string()));
    assert!(tags.contains(&"INSS-MONITORADO".to_string()));
    assert!(tags.contains(&"FASE-ADMINISTRATIVA".to_string()));
    assert!(tags.contains(&"STATUS-EXIGENCIA".to_string()));
    assert!(tags.contains(&"BENEFICIO-AUXILIO-DOENCA".to_string()));

    // Exactly one note, one message, note first.
    let notes = h.crm.notes.lock().unwrap();
    assert_eq!(notes.len(), 1);
    let (_, note, severity) = &notes[0];
    assert_eq!(*severity, NoteSeverity::Warning);
    assert!(note.title.contains("700123456789"));
    assert!(note.body.contains("laudo médico"));
    assert!(note.body.contains("01/12/2025"));

    let sent = h.sender.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    let (_, text) = &sent[0];
    assert!(text.contains("123******01"), "CPF must be masked: {}", text);
    assert!(!text.contains("12345678901"), "full CPF leaked: {}", text);
    assert!(text.contains("laudo médico"));

    assert_eq!(*h.events.lock().unwrap(), vec!["note", "message"]);
}

#[tokio::test]
async fn test_repeat_sweep_suppresses_duplicate_notification() {
    let h = harness(vec![requirement_case()], seeded_record());

    let first = h
        .orchestrator
        .start(JobTrigger::Manual, false, "e2e".into(), credentials())
        .unwrap();
    wait_for_terminal(&h, &first.job_id).await;

    // Same portal state again; force past the one-job-per-day rule.
    let second = h
        .orchestrator
        .start(JobTrigger::Manual, true, "e2e".into(), credentials())
        .unwrap();
    let job = wait_for_terminal(&h, &second.job_id).await;
    assert_eq!(job.status, JobStatus::Completed);

    // Nothing new: the identical update was deduplicated.
    assert_eq!(h.crm.notes.lock().unwrap().len(), 1);
    assert_eq!(h.sender.sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_second_same_day_job_is_rejected() {
    let h = harness(vec![requirement_case()], seeded_record());

    let first = h
        .orchestrator
        .start(JobTrigger::Manual, false, "e2e".into(), credentials())
        .unwrap();
    wait_for_terminal(&h, &first.job_id).await;

    let err = h
        .orchestrator
        .start(JobTrigger::Scheduled, false, "cron".into(), credentials())
        .unwrap_err();
    assert!(matches!(err, PipelineError::Conflict(_)));
}

#[tokio::test]
async fn test_stale_running_job_is_reclaimed_on_next_start() {
    let h = harness(vec![requirement_case()], seeded_record());

    // A job whose worker died two hours ago, still marked Running.
    let mut stale = SyncJob::new(
        JobTrigger::Scheduled,
        "cron".into(),
        SyncWindow {
            start: Utc::now() - Duration::days(40),
            end: Utc::now(),
        },
    );
    stale.status = JobStatus::Running;
    stale.started_at = Utc::now() - Duration::hours(2);
    let stale_id = stale.id;
    h.jobs.insert(stale);

    // The sweep reclaims it, so a new job starts despite the same-day rule.
    let ticket = h
        .orchestrator
        .start(JobTrigger::Manual, false, "e2e".into(), credentials())
        .unwrap();
    wait_for_terminal(&h, &ticket.job_id).await;

    let reclaimed = h.orchestrator.status(&stale_id).unwrap();
    assert_eq!(reclaimed.status, JobStatus::Failed);
    assert!(reclaimed.error.unwrap_or_default().contains("timed out"));
}

#[tokio::test]
async fn test_missing_credentials_are_rejected() {
    let h = harness(vec![], seeded_record());

    let err = h
        .orchestrator
        .start(
            JobTrigger::Manual,
            false,
            "e2e".into(),
            PortalCredentials {
                cpf: String::new(),
                password: String::new(),
            },
        )
        .unwrap_err();
    assert!(matches!(err, PipelineError::Validation(_)));
    assert!(h.orchestrator.list_jobs().is_empty());
}

#[tokio::test]
async fn test_first_contact_creates_crm_record() {
    let mut case = requirement_case();
    case.protocol = "700999999999".into();
    case.national_id = "55544433322".into();
    case.entries[0].body = "Benefício concedido, deferido em 10/11/2025".into();

    // Seeded record belongs to someone else entirely.
    let mut unrelated = seeded_record();
    unrelated.national_id = "00000000000".into();
    unrelated.protocol = "1".into();

    let h = harness(vec![case], unrelated);
    let ticket = h
        .orchestrator
        .start(JobTrigger::Manual, false, "e2e".into(), credentials())
        .unwrap();
    let job = wait_for_terminal(&h, &ticket.job_id).await;
    assert_eq!(job.status, JobStatus::Completed, "error: {:?}", job.error);

    let tags = h.crm.tags_of("crm-700999999999");
    assert!(tags.contains(&"RESULTADO-DEFERIDO".to_string()));
    assert!(tags.contains(&"INSS-MONITORADO".to_string()));
}
