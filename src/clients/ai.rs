//! AI classification service client.
//!
//! Sends the case's recent status entries plus identity context, receives a
//! disposition verdict. Prompt construction happens inside the service; this
//! side only owns the input/output contract. Response parsing is tolerant:
//! the service's labels drift between releases (English/Portuguese variants)
//! and confidence occasionally comes back outside 0..1.

use crate::error::ClassifierError;
use crate::types::{DenialSubtype, Disposition, StatusEntry};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The service's verdict for one case, normalized.
#[derive(Debug, Clone)]
pub struct AiVerdict {
    pub disposition: Disposition,
    pub denial_subtype: Option<DenialSubtype>,
    pub required_documents: Vec<String>,
    pub reasoning: String,
    /// Date of the movement the verdict is anchored on, when the service
    /// identified one.
    pub event_date: Option<NaiveDate>,
    pub confidence: f64,
}

/// Remote text-classification service.
#[async_trait]
pub trait AiService: Send + Sync {
    async fn classify(
        &self,
        entries: &[StatusEntry],
        protocol: &str,
        birth_date: Option<NaiveDate>,
    ) -> Result<AiVerdict, ClassifierError>;
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
struct SourceCard<'a> {
    date: NaiveDate,
    title: &'a str,
    body: &'a str,
}

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    source_cards: Vec<SourceCard<'a>>,
    protocol_id: &'a str,
    birth_date: Option<NaiveDate>,
}

#[derive(Deserialize)]
struct ClassifyResponse {
    disposition_class: String,
    #[serde(default)]
    required_documents: Vec<String>,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    event_date: Option<NaiveDate>,
    #[serde(default)]
    denial_subtype: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
}

// ============================================================================
// Label normalization
// ============================================================================

/// Map a disposition label to the domain enum, accepting known variants.
fn parse_disposition(label: &str) -> Result<Disposition, ClassifierError> {
    let normalized = label.trim().to_uppercase().replace(['-', ' '], "_");
    match normalized.as_str() {
        "REQUIREMENT" | "EXIGENCIA" | "EXIGÊNCIA" | "PENDING_DOCUMENTS" => {
            Ok(Disposition::Requirement)
        }
        "APPROVED" | "DEFERIDO" | "CONCEDIDO" | "GRANTED" => Ok(Disposition::Approved),
        "DENIED" | "INDEFERIDO" | "NEGADO" | "REJECTED" => Ok(Disposition::Denied),
        other => Err(ClassifierError::Unusable(format!(
            "unknown disposition label '{}'",
            other
        ))),
    }
}

fn parse_subtype(label: &str) -> Option<DenialSubtype> {
    let normalized = label.trim().to_uppercase().replace(['-', ' '], "_");
    match normalized.as_str() {
        "DENIED_FOR_CAUSE" | "FOR_CAUSE" | "PROCEDURAL" => Some(DenialSubtype::ForCause),
        "DENIED_ON_MERITS" | "ON_MERITS" | "MERITS" => Some(DenialSubtype::OnMerits),
        _ => None,
    }
}

// ============================================================================
// HTTP implementation
// ============================================================================

/// Production client for the classification service.
#[derive(Clone)]
pub struct AiServiceClient {
    http: reqwest::Client,
    base_url: String,
}

impl AiServiceClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, ClassifierError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ClassifierError::Service(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config() -> Result<Self, ClassifierError> {
        let cfg = &crate::config::get().classifier;
        Self::new(&cfg.ai_url, cfg.ai_timeout_secs)
    }
}

#[async_trait]
impl AiService for AiServiceClient {
    async fn classify(
        &self,
        entries: &[StatusEntry],
        protocol: &str,
        birth_date: Option<NaiveDate>,
    ) -> Result<AiVerdict, ClassifierError> {
        let body = ClassifyRequest {
            source_cards: entries
                .iter()
                .map(|e| SourceCard {
                    date: e.date,
                    title: &e.title,
                    body: &e.body,
                })
                .collect(),
            protocol_id: protocol,
            birth_date,
        };

        let resp = self
            .http
            .post(format!("{}/api/classify", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| ClassifierError::Service(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(ClassifierError::Service(format!(
                "service returned status {}",
                resp.status()
            )));
        }

        let parsed: ClassifyResponse = resp
            .json()
            .await
            .map_err(|e| ClassifierError::Unusable(e.to_string()))?;

        let disposition = parse_disposition(&parsed.disposition_class)?;
        let denial_subtype = parsed.denial_subtype.as_deref().and_then(parse_subtype);

        Ok(AiVerdict {
            disposition,
            denial_subtype,
            required_documents: parsed.required_documents,
            reasoning: parsed.reasoning,
            event_date: parsed.event_date,
            confidence: parsed.confidence.unwrap_or(0.0).clamp(0.0, 1.0),
        })
    }
}
