//! Government case-status portal client.
//!
//! The portal is reached through a scraper service that drives the actual
//! browser session; this client only speaks its JSON API. Scraping selectors
//! live upstream and are out of scope here. Timeouts are generous because
//! every call hides a browser-mediated page load.

use crate::error::PortalError;
use crate::types::{BenefitKind, StatusEntry, SyncWindow};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Scoped portal credentials, passed per job and never persisted.
#[derive(Clone, Serialize)]
pub struct PortalCredentials {
    pub cpf: String,
    pub password: String,
}

impl std::fmt::Debug for PortalCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never let credentials leak into logs or job snapshots.
        f.debug_struct("PortalCredentials")
            .field("cpf", &self.cpf)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A case as scraped from the portal.
#[derive(Debug, Clone, Deserialize)]
pub struct PortalCase {
    pub protocol: String,
    pub claimant_name: String,
    pub national_id: String,
    pub birth_date: Option<NaiveDate>,
    pub benefit: BenefitKind,
    /// Status movements, newest first.
    pub entries: Vec<StatusEntry>,
}

/// Access to the government portal.
#[async_trait]
pub trait CasePortal: Send + Sync {
    /// Protocols with movements inside the reporting window.
    async fn list_protocols(
        &self,
        credentials: &PortalCredentials,
        window: &SyncWindow,
    ) -> Result<Vec<String>, PortalError>;

    /// Full status history and claimant metadata for one protocol.
    async fn fetch_case(
        &self,
        credentials: &PortalCredentials,
        protocol: &str,
    ) -> Result<PortalCase, PortalError>;
}

// ============================================================================
// HTTP implementation
// ============================================================================

#[derive(Serialize)]
struct ListRequest<'a> {
    credentials: &'a PortalCredentials,
    window_start: String,
    window_end: String,
}

#[derive(Serialize)]
struct FetchRequest<'a> {
    credentials: &'a PortalCredentials,
    protocol: &'a str,
}

#[derive(Deserialize)]
struct ListResponse {
    protocols: Vec<String>,
}

/// Production portal client over the scraper service's JSON API.
#[derive(Clone)]
pub struct PortalClient {
    http: reqwest::Client,
    base_url: String,
}

impl PortalClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, PortalError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config() -> Result<Self, PortalError> {
        let cfg = &crate::config::get().portal;
        Self::new(&cfg.base_url, cfg.timeout_secs)
    }
}

#[async_trait]
impl CasePortal for PortalClient {
    async fn list_protocols(
        &self,
        credentials: &PortalCredentials,
        window: &SyncWindow,
    ) -> Result<Vec<String>, PortalError> {
        let body = ListRequest {
            credentials,
            window_start: window.start.to_rfc3339(),
            window_end: window.end.to_rfc3339(),
        };

        let resp = self
            .http
            .post(format!("{}/api/protocols/list", self.base_url))
            .json(&body)
            .send()
            .await?;

        match resp.status() {
            reqwest::StatusCode::OK => {
                let parsed: ListResponse = resp
                    .json()
                    .await
                    .map_err(|e| PortalError::Malformed(e.to_string()))?;
                Ok(parsed.protocols)
            }
            reqwest::StatusCode::UNAUTHORIZED => Err(PortalError::Unauthorized),
            status => Err(PortalError::ServerError(status)),
        }
    }

    async fn fetch_case(
        &self,
        credentials: &PortalCredentials,
        protocol: &str,
    ) -> Result<PortalCase, PortalError> {
        let body = FetchRequest {
            credentials,
            protocol,
        };

        let resp = self
            .http
            .post(format!("{}/api/protocols/fetch", self.base_url))
            .json(&body)
            .send()
            .await?;

        match resp.status() {
            reqwest::StatusCode::OK => resp
                .json()
                .await
                .map_err(|e| PortalError::Malformed(e.to_string())),
            reqwest::StatusCode::NOT_FOUND => {
                Err(PortalError::ProtocolNotFound(protocol.to_string()))
            }
            reqwest::StatusCode::UNAUTHORIZED => Err(PortalError::Unauthorized),
            status => Err(PortalError::ServerError(status)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = PortalCredentials {
            cpf: "12345678901".into(),
            password: "hunter2".into(),
        };
        let debug = format!("{:?}", creds);
        assert!(debug.contains("12345678901"));
        assert!(!debug.contains("hunter2"));
    }
}
