//! External case-management system (CRM) client.
//!
//! The CRM owns the case record; this pipeline only reads and writes tags
//! and notes on it. `replace_tags` has full-replace semantics on the wire —
//! the caller must pre-merge (the reconciliation engine does). All payloads
//! are typed serde structs; no ad hoc query-string assembly.

use crate::error::CrmError;
use crate::types::{BenefitKind, CaseRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity the CRM displays next to a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteSeverity {
    Info,
    Warning,
    Critical,
}

/// A note as stored on a CRM case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseNote {
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Operations this pipeline performs against the CRM.
#[async_trait]
pub trait CaseManager: Send + Sync {
    async fn find_case_by_national_id(
        &self,
        national_id: &str,
    ) -> Result<Option<CaseRecord>, CrmError>;

    async fn get_case(&self, crm_id: &str) -> Result<CaseRecord, CrmError>;

    async fn create_case(
        &self,
        claimant_name: &str,
        national_id: &str,
        protocol: &str,
        benefit: BenefitKind,
    ) -> Result<CaseRecord, CrmError>;

    /// Replace the full tag array. The CRM drops anything not in `tags`.
    async fn replace_tags(&self, crm_id: &str, tags: &[String]) -> Result<(), CrmError>;

    async fn create_note(
        &self,
        crm_id: &str,
        title: &str,
        body: &str,
        severity: NoteSeverity,
    ) -> Result<(), CrmError>;

    /// Notes on the case, newest first.
    async fn list_notes(&self, crm_id: &str) -> Result<Vec<CaseNote>, CrmError>;
}

// ============================================================================
// HTTP implementation
// ============================================================================

#[derive(Serialize)]
struct CreateCaseRequest<'a> {
    name: &'a str,
    national_id: &'a str,
    protocol: &'a str,
    benefit: BenefitKind,
}

#[derive(Serialize)]
struct ReplaceTagsRequest<'a> {
    tags: &'a [String],
}

#[derive(Serialize)]
struct CreateNoteRequest<'a> {
    title: &'a str,
    body: &'a str,
    severity: NoteSeverity,
}

#[derive(Deserialize)]
struct NotesResponse {
    notes: Vec<CaseNote>,
}

/// Production CRM client.
#[derive(Clone)]
pub struct CrmClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl CrmClient {
    pub fn new(base_url: &str, api_key: &str, timeout_secs: u64) -> Result<Self, CrmError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn from_config() -> Result<Self, CrmError> {
        let cfg = &crate::config::get().crm;
        Self::new(&cfg.base_url, &cfg.api_key, cfg.timeout_secs)
    }

    fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("Authorization", format!("Bearer {}", self.api_key))
    }
}

#[async_trait]
impl CaseManager for CrmClient {
    async fn find_case_by_national_id(
        &self,
        national_id: &str,
    ) -> Result<Option<CaseRecord>, CrmError> {
        let resp = self
            .auth(
                self.http
                    .get(format!("{}/api/cases", self.base_url))
                    .query(&[("national_id", national_id)]),
            )
            .send()
            .await?;

        match resp.status() {
            reqwest::StatusCode::OK => Ok(Some(resp.json().await?)),
            reqwest::StatusCode::NOT_FOUND => Ok(None),
            status => Err(CrmError::ServerError(status)),
        }
    }

    async fn get_case(&self, crm_id: &str) -> Result<CaseRecord, CrmError> {
        let resp = self
            .auth(
                self.http
                    .get(format!("{}/api/cases/{}", self.base_url, crm_id)),
            )
            .send()
            .await?;

        match resp.status() {
            reqwest::StatusCode::OK => Ok(resp.json().await?),
            reqwest::StatusCode::NOT_FOUND => Err(CrmError::CaseNotFound(crm_id.to_string())),
            status => Err(CrmError::ServerError(status)),
        }
    }

    async fn create_case(
        &self,
        claimant_name: &str,
        national_id: &str,
        protocol: &str,
        benefit: BenefitKind,
    ) -> Result<CaseRecord, CrmError> {
        let body = CreateCaseRequest {
            name: claimant_name,
            national_id,
            protocol,
            benefit,
        };

        let resp = self
            .auth(self.http.post(format!("{}/api/cases", self.base_url)))
            .json(&body)
            .send()
            .await?;

        if resp.status().is_success() {
            Ok(resp.json().await?)
        } else {
            Err(CrmError::ServerError(resp.status()))
        }
    }

    async fn replace_tags(&self, crm_id: &str, tags: &[String]) -> Result<(), CrmError> {
        let body = ReplaceTagsRequest { tags };

        let resp = self
            .auth(
                self.http
                    .patch(format!("{}/api/cases/{}/tags", self.base_url, crm_id)),
            )
            .json(&body)
            .send()
            .await?;

        match resp.status() {
            s if s.is_success() => Ok(()),
            reqwest::StatusCode::NOT_FOUND => Err(CrmError::CaseNotFound(crm_id.to_string())),
            status => Err(CrmError::ServerError(status)),
        }
    }

    async fn create_note(
        &self,
        crm_id: &str,
        title: &str,
        body: &str,
        severity: NoteSeverity,
    ) -> Result<(), CrmError> {
        let payload = CreateNoteRequest {
            title,
            body,
            severity,
        };

        let resp = self
            .auth(
                self.http
                    .post(format!("{}/api/cases/{}/notes", self.base_url, crm_id)),
            )
            .json(&payload)
            .send()
            .await?;

        match resp.status() {
            s if s.is_success() => Ok(()),
            reqwest::StatusCode::NOT_FOUND => Err(CrmError::CaseNotFound(crm_id.to_string())),
            status => Err(CrmError::ServerError(status)),
        }
    }

    async fn list_notes(&self, crm_id: &str) -> Result<Vec<CaseNote>, CrmError> {
        let resp = self
            .auth(
                self.http
                    .get(format!("{}/api/cases/{}/notes", self.base_url, crm_id)),
            )
            .send()
            .await?;

        match resp.status() {
            reqwest::StatusCode::OK => {
                let parsed: NotesResponse = resp.json().await?;
                Ok(parsed.notes)
            }
            reqwest::StatusCode::NOT_FOUND => Err(CrmError::CaseNotFound(crm_id.to_string())),
            status => Err(CrmError::ServerError(status)),
        }
    }
}
