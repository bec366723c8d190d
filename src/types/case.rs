//! Case, tag, and classification types.
//!
//! A `CaseRecord` mirrors the slice of the external CRM record this pipeline
//! reads and writes: identity fields, the tag set, and the current deadline.
//! The CRM owns the full record; nothing here is persisted locally.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Dispositions
// ============================================================================

/// Classified outcome of a case's latest status movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// The office must submit documents or fulfil an exigency.
    Requirement,
    /// The claim was granted.
    Approved,
    /// The claim was denied; see [`DenialSubtype`].
    Denied,
}

impl std::fmt::Display for Disposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Disposition::Requirement => write!(f, "REQUIREMENT"),
            Disposition::Approved => write!(f, "APPROVED"),
            Disposition::Denied => write!(f, "DENIED"),
        }
    }
}

/// Why a claim was denied. Drives escalation routing: merits denials go to
/// judicial review, procedural denials stay administrative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialSubtype {
    /// Procedural failure: missed appointment, missing documents, expired
    /// deadline. Recoverable through a new administrative filing.
    ForCause,
    /// Substantive denial on eligibility criteria or income thresholds.
    /// Only a judicial appeal can reverse it.
    OnMerits,
}

impl std::fmt::Display for DenialSubtype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DenialSubtype::ForCause => write!(f, "DENIED_FOR_CAUSE"),
            DenialSubtype::OnMerits => write!(f, "DENIED_ON_MERITS"),
        }
    }
}

/// Procedural phase the case is being handled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CasePhase {
    Administrative,
    Judicial,
}

impl std::fmt::Display for CasePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CasePhase::Administrative => write!(f, "ADMINISTRATIVA"),
            CasePhase::Judicial => write!(f, "JUDICIAL"),
        }
    }
}

/// Benefit category being claimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BenefitKind {
    DisabilityAid,
    RetirementByAge,
    RetirementByContribution,
    ContinuousCashBenefit,
    MaternityPay,
    DeathPension,
    Other,
}

impl std::fmt::Display for BenefitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BenefitKind::DisabilityAid => "AUXILIO-DOENCA",
            BenefitKind::RetirementByAge => "APOSENTADORIA-IDADE",
            BenefitKind::RetirementByContribution => "APOSENTADORIA-CONTRIBUICAO",
            BenefitKind::ContinuousCashBenefit => "BPC-LOAS",
            BenefitKind::MaternityPay => "SALARIO-MATERNIDADE",
            BenefitKind::DeathPension => "PENSAO-MORTE",
            BenefitKind::Other => "OUTRO",
        };
        write!(f, "{}", s)
    }
}

// ============================================================================
// Tags
// ============================================================================

/// Who maintains a tag on the CRM record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagOrigin {
    /// Machine-maintained; fully owned by the reconciliation engine.
    System,
    /// Human-entered annotation; must survive every reconciliation pass.
    Manual,
}

/// A tag name together with its classified origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub origin: TagOrigin,
}

// ============================================================================
// Case record and status history
// ============================================================================

/// One status movement on the government portal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEntry {
    /// Date the movement was recorded on the portal.
    pub date: NaiveDate,
    /// Movement title as shown on the portal ("Exigência", "Concluída"...).
    pub title: String,
    /// Full movement text, verbatim.
    pub body: String,
}

/// The slice of a CRM case record this pipeline operates on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseRecord {
    /// CRM-internal record id.
    pub crm_id: String,
    /// Government claim protocol number.
    pub protocol: String,
    /// Claimant national id (CPF), digits only.
    pub national_id: String,
    /// Claimant full name.
    pub claimant_name: String,
    pub benefit: BenefitKind,
    pub phase: CasePhase,
    /// Full tag set as stored in the CRM (system and manual mixed).
    pub tags: Vec<String>,
    /// Current deadline recorded on the case, if any.
    pub deadline: Option<NaiveDate>,
    pub birth_date: Option<NaiveDate>,
}

/// Everything the classifier needs to judge one case.
#[derive(Debug, Clone)]
pub struct CaseContext {
    pub protocol: String,
    pub birth_date: Option<NaiveDate>,
    pub current_phase: CasePhase,
    /// Most recent portal entries, newest first.
    pub entries: Vec<StatusEntry>,
}

impl CaseContext {
    /// The newest status entry, if any.
    pub fn latest(&self) -> Option<&StatusEntry> {
        self.entries.first()
    }

    /// Concatenated text of all entries, newest first. Used for keyword
    /// scoring and the learning store's verbatim record.
    pub fn full_text(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("{} — {}", e.title, e.body))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ============================================================================
// Classification outcome
// ============================================================================

/// The classifier's verdict for one case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationOutcome {
    pub disposition: Disposition,
    /// Present only when `disposition` is `Denied`.
    pub denial_subtype: Option<DenialSubtype>,
    /// Phase after applying the escalation rules: denial-on-merits forces
    /// Judicial, denial-for-cause forces Administrative, anything else
    /// keeps the case's current phase.
    pub phase: CasePhase,
    /// Documents the requirement text asks for.
    pub required_documents: Vec<String>,
    pub deadline: NaiveDate,
    /// Date of the entry the deadline was derived from.
    pub deadline_source: NaiveDate,
    pub confidence: f64,
    pub reasoning: String,
}

impl ClassificationOutcome {
    /// Days left until the deadline, counted from today (clamped at zero).
    pub fn days_remaining(&self) -> i64 {
        (self.deadline - Utc::now().date_naive()).num_days().max(0)
    }

    /// Effective disposition label for routing and audit records.
    pub fn routing_label(&self) -> String {
        match (self.disposition, self.denial_subtype) {
            (Disposition::Denied, Some(sub)) => sub.to_string(),
            (d, _) => d.to_string(),
        }
    }
}
