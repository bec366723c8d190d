//! Protocol disposition classifier.
//!
//! Determines what happened to a case from its recent status movements:
//! disposition, denial subtype, escalation phase, required documents, and
//! deadline. AI-first with a deterministic keyword fallback behind a common
//! [`Classifier`] trait:
//!
//! - [`AiClassifier`] — remote classification service, text-derived deadline.
//! - [`KeywordClassifier`] — pure scoring over fixed phrase lists; fully
//!   unit-testable, no I/O.
//! - [`CompositeClassifier`] — production wiring: AI verdict preferred,
//!   keyword fallback on failure or low confidence, keyword subtype fill-in
//!   when the AI omits one.

pub mod deadline;
pub mod keywords;

pub use keywords::KeywordClassifier;

use crate::clients::ai::AiService;
use crate::error::ClassifierError;
use crate::types::{CaseContext, CasePhase, ClassificationOutcome, DenialSubtype, Disposition};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// A disposition classifier for one case.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, ctx: &CaseContext) -> Result<ClassificationOutcome, ClassifierError>;
}

/// Escalation rules: denial-on-merits forces the judicial phase,
/// denial-for-cause forces administrative (a new filing is possible),
/// anything else keeps the case where it is.
pub fn resolve_phase(
    current: CasePhase,
    disposition: Disposition,
    subtype: Option<DenialSubtype>,
) -> CasePhase {
    match (disposition, subtype) {
        (Disposition::Denied, Some(DenialSubtype::OnMerits)) => CasePhase::Judicial,
        (Disposition::Denied, Some(DenialSubtype::ForCause)) => CasePhase::Administrative,
        _ => current,
    }
}

// ============================================================================
// AI classifier
// ============================================================================

/// Classifier backed by the remote AI service.
///
/// The deadline always comes from the text via [`deadline::derive_deadline`]:
/// a parseable explicit deadline is never replaced by a service guess or the
/// global default.
pub struct AiClassifier {
    service: Arc<dyn AiService>,
    default_deadline_days: i64,
}

impl AiClassifier {
    pub fn new(service: Arc<dyn AiService>, default_deadline_days: i64) -> Self {
        Self {
            service,
            default_deadline_days,
        }
    }
}

#[async_trait]
impl Classifier for AiClassifier {
    async fn classify(&self, ctx: &CaseContext) -> Result<ClassificationOutcome, ClassifierError> {
        if ctx.entries.is_empty() {
            return Err(ClassifierError::EmptyHistory(ctx.protocol.clone()));
        }

        let verdict = self
            .service
            .classify(&ctx.entries, &ctx.protocol, ctx.birth_date)
            .await?;

        let resolution =
            deadline::derive_deadline(&ctx.entries, self.default_deadline_days);

        Ok(ClassificationOutcome {
            disposition: verdict.disposition,
            denial_subtype: verdict.denial_subtype,
            phase: resolve_phase(ctx.current_phase, verdict.disposition, verdict.denial_subtype),
            required_documents: verdict.required_documents,
            deadline: resolution.deadline,
            deadline_source: resolution.source_date,
            confidence: verdict.confidence,
            reasoning: verdict.reasoning,
        })
    }
}

// ============================================================================
// Composite classifier
// ============================================================================

/// Production classifier: AI verdict preferred, keyword fallback otherwise.
pub struct CompositeClassifier {
    ai: AiClassifier,
    keyword: KeywordClassifier,
    min_ai_confidence: f64,
}

impl CompositeClassifier {
    pub fn new(ai: AiClassifier, keyword: KeywordClassifier, min_ai_confidence: f64) -> Self {
        Self {
            ai,
            keyword,
            min_ai_confidence,
        }
    }

    /// Wire up from the global config.
    pub fn from_config(service: Arc<dyn AiService>) -> Self {
        let cfg = &crate::config::get().classifier;
        Self::new(
            AiClassifier::new(service, cfg.default_deadline_days),
            KeywordClassifier::new(cfg.denial_default, cfg.default_deadline_days),
            cfg.min_ai_confidence,
        )
    }
}

#[async_trait]
impl Classifier for CompositeClassifier {
    async fn classify(&self, ctx: &CaseContext) -> Result<ClassificationOutcome, ClassifierError> {
        match self.ai.classify(ctx).await {
            Ok(mut outcome) if outcome.confidence >= self.min_ai_confidence => {
                // The service sometimes omits the denial subtype; the keyword
                // scorer fills it in so routing is never ambiguous.
                if outcome.disposition == Disposition::Denied && outcome.denial_subtype.is_none() {
                    let subtype = self.keyword.denial_subtype(&ctx.full_text());
                    debug!(
                        protocol = %ctx.protocol,
                        subtype = %subtype,
                        "AI omitted denial subtype — keyword fill-in"
                    );
                    outcome.denial_subtype = Some(subtype);
                    outcome.phase =
                        resolve_phase(ctx.current_phase, outcome.disposition, outcome.denial_subtype);
                }
                Ok(outcome)
            }
            Ok(outcome) => {
                debug!(
                    protocol = %ctx.protocol,
                    confidence = outcome.confidence,
                    min = self.min_ai_confidence,
                    "AI verdict below confidence floor — keyword fallback"
                );
                self.keyword.classify(ctx).await
            }
            Err(e) => {
                warn!(protocol = %ctx.protocol, error = %e, "AI classification failed — keyword fallback");
                self.keyword.classify(ctx).await
            }
        }
    }
}
