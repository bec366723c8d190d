//! Deterministic keyword classifier.
//!
//! Pure scoring over fixed Portuguese phrase lists — no I/O, fully
//! unit-testable. Used standalone when the AI service is unreachable and as
//! the subtype fill-in inside the composite classifier.

use super::deadline;
use super::{resolve_phase, Classifier};
use crate::config::DenialDefault;
use crate::error::ClassifierError;
use crate::types::{CaseContext, ClassificationOutcome, DenialSubtype, Disposition};
use async_trait::async_trait;

// ============================================================================
// Phrase lists
// ============================================================================

/// Phrases indicating a procedural (for-cause) denial.
const CAUSE_PHRASES: &[&str] = &[
    "não compareceu",
    "falta de comparecimento",
    "não comparecimento",
    "não apresentou a documentação",
    "documentação não enviada",
    "não cumpriu a exigência",
    "exigência não cumprida",
    "prazo expirado",
    "perda do prazo",
    "fora do prazo",
];

/// Phrases indicating a substantive (on-merits) denial.
const MERIT_PHRASES: &[&str] = &[
    "não atende aos requisitos",
    "requisitos legais",
    "critérios de elegibilidade",
    "não preenche os requisitos",
    "renda superior",
    "renda per capita",
    "carência não cumprida",
    "falta de carência",
    "qualidade de segurado",
    "parecer contrário",
];

/// Disposition markers, checked in order. Denial markers are checked first:
/// denial texts often quote the original requirement they stem from.
const DENIED_MARKERS: &[&str] = &["indeferido", "indeferimento", "negado", "não concedido"];
const APPROVED_MARKERS: &[&str] = &["deferido", "deferimento", "concedido", "aprovado"];
const REQUIREMENT_MARKERS: &[&str] = &["exigência", "exigencia", "cumprir exig", "apresentar documento"];

/// Document catalog matched against requirement text.
const DOCUMENT_CATALOG: &[&str] = &[
    "laudo médico",
    "laudo pericial",
    "atestado médico",
    "comprovante de residência",
    "comprovante de renda",
    "documento de identidade",
    "carteira de trabalho",
    "certidão de nascimento",
    "certidão de casamento",
    "certidão de óbito",
    "extrato do cnis",
    "procuração",
    "autodeclaração rural",
];

// ============================================================================
// Pure scoring functions
// ============================================================================

/// Count hits from each denial phrase list. Case-insensitive, substring.
pub fn score_denial(text: &str) -> (usize, usize) {
    let lower = text.to_lowercase();
    let cause = CAUSE_PHRASES.iter().filter(|p| lower.contains(*p)).count();
    let merit = MERIT_PHRASES.iter().filter(|p| lower.contains(*p)).count();
    (cause, merit)
}

/// Detect the disposition from the raw text, if any marker matches.
pub fn detect_disposition(text: &str) -> Option<Disposition> {
    let lower = text.to_lowercase();
    if DENIED_MARKERS.iter().any(|m| lower.contains(m)) {
        return Some(Disposition::Denied);
    }
    if APPROVED_MARKERS.iter().any(|m| lower.contains(m)) {
        return Some(Disposition::Approved);
    }
    if REQUIREMENT_MARKERS.iter().any(|m| lower.contains(m)) {
        return Some(Disposition::Requirement);
    }
    None
}

/// Documents from the fixed catalog mentioned in the text.
pub fn extract_documents(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    DOCUMENT_CATALOG
        .iter()
        .filter(|d| lower.contains(*d))
        .map(|d| (*d).to_string())
        .collect()
}

// ============================================================================
// Classifier
// ============================================================================

/// Keyword-list classifier with the configured ambiguity policy.
pub struct KeywordClassifier {
    denial_default: DenialDefault,
    default_deadline_days: i64,
}

impl KeywordClassifier {
    pub fn new(denial_default: DenialDefault, default_deadline_days: i64) -> Self {
        Self {
            denial_default,
            default_deadline_days,
        }
    }

    /// Subtype from scoring: strictly more hits wins, at least one hit
    /// required. Tied or zero-zero falls back to the configured policy —
    /// shipped as on-merits, which routes ambiguous denials to judicial
    /// escalation.
    pub fn denial_subtype(&self, text: &str) -> DenialSubtype {
        let (cause, merit) = score_denial(text);
        if cause > merit && cause >= 1 {
            DenialSubtype::ForCause
        } else if merit > cause && merit >= 1 {
            DenialSubtype::OnMerits
        } else {
            match self.denial_default {
                DenialDefault::ForCause => DenialSubtype::ForCause,
                DenialDefault::OnMerits => DenialSubtype::OnMerits,
            }
        }
    }

    /// Full deterministic evaluation of one case.
    pub fn evaluate(&self, ctx: &CaseContext) -> Result<ClassificationOutcome, ClassifierError> {
        if ctx.entries.is_empty() {
            return Err(ClassifierError::EmptyHistory(ctx.protocol.clone()));
        }

        let text = ctx.full_text();
        // Requirement is the safe reading for unrecognized movements: it asks
        // a human to look rather than asserting an outcome.
        let disposition = detect_disposition(&text).unwrap_or(Disposition::Requirement);

        let denial_subtype = (disposition == Disposition::Denied)
            .then(|| self.denial_subtype(&text));

        let resolution = deadline::derive_deadline(&ctx.entries, self.default_deadline_days);

        let (cause, merit) = score_denial(&text);
        let reasoning = match disposition {
            Disposition::Denied => format!(
                "keyword score: {} cause / {} merit phrase(s)",
                cause, merit
            ),
            _ => format!("keyword marker match for {}", disposition),
        };

        Ok(ClassificationOutcome {
            disposition,
            denial_subtype,
            phase: resolve_phase(ctx.current_phase, disposition, denial_subtype),
            required_documents: extract_documents(&text),
            deadline: resolution.deadline,
            deadline_source: resolution.source_date,
            confidence: 0.6,
            reasoning,
        })
    }
}

#[async_trait]
impl Classifier for KeywordClassifier {
    async fn classify(&self, ctx: &CaseContext) -> Result<ClassificationOutcome, ClassifierError> {
        self.evaluate(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CasePhase, StatusEntry};
    use chrono::NaiveDate;

    fn classifier() -> KeywordClassifier {
        KeywordClassifier::new(DenialDefault::OnMerits, 30)
    }

    fn ctx(body: &str) -> CaseContext {
        CaseContext {
            protocol: "5555".into(),
            birth_date: None,
            current_phase: CasePhase::Administrative,
            entries: vec![StatusEntry {
                date: NaiveDate::from_ymd_opt(2025, 10, 15).unwrap(),
                title: "Concluída".into(),
                body: body.into(),
            }],
        }
    }

    #[test]
    fn test_cause_phrases_only_is_for_cause() {
        let subtype = classifier()
            .denial_subtype("indeferido: o requerente não compareceu à perícia, prazo expirado");
        assert_eq!(subtype, DenialSubtype::ForCause);
    }

    #[test]
    fn test_merit_phrases_only_is_on_merits() {
        let subtype = classifier()
            .denial_subtype("indeferido: renda per capita superior, não atende aos requisitos");
        assert_eq!(subtype, DenialSubtype::OnMerits);
    }

    #[test]
    fn test_zero_hits_falls_back_to_configured_default() {
        let subtype = classifier().denial_subtype("indeferido sem justificativa detalhada");
        assert_eq!(subtype, DenialSubtype::OnMerits);

        let for_cause = KeywordClassifier::new(DenialDefault::ForCause, 30);
        assert_eq!(
            for_cause.denial_subtype("indeferido sem justificativa detalhada"),
            DenialSubtype::ForCause
        );
    }

    #[test]
    fn test_tied_hits_falls_back_to_default() {
        let subtype = classifier()
            .denial_subtype("não compareceu à perícia e renda superior ao limite");
        assert_eq!(subtype, DenialSubtype::OnMerits);
    }

    #[test]
    fn test_disposition_detection() {
        assert_eq!(
            detect_disposition("benefício concedido ao requerente"),
            Some(Disposition::Approved)
        );
        assert_eq!(
            detect_disposition("cumprir exigência até 10/10/2025"),
            Some(Disposition::Requirement)
        );
        // Denial marker wins even when the text quotes the old requirement.
        assert_eq!(
            detect_disposition("indeferido: exigência não cumprida"),
            Some(Disposition::Denied)
        );
        assert_eq!(detect_disposition("movimentação interna"), None);
    }

    #[test]
    fn test_document_extraction() {
        let docs = extract_documents(
            "cumprir exigência: enviar laudo médico e comprovante de residência atualizado",
        );
        assert_eq!(docs, vec!["laudo médico", "comprovante de residência"]);
    }

    #[test]
    fn test_evaluate_requirement_end_to_end() {
        let outcome = classifier()
            .evaluate(&ctx("cumprir exigência: enviar laudo médico, prazo até 01/12/2025"))
            .unwrap();
        assert_eq!(outcome.disposition, Disposition::Requirement);
        assert_eq!(outcome.deadline, NaiveDate::from_ymd_opt(2025, 12, 1).unwrap());
        assert_eq!(outcome.required_documents, vec!["laudo médico"]);
        assert_eq!(outcome.phase, CasePhase::Administrative);
    }

    #[test]
    fn test_evaluate_merits_denial_forces_judicial() {
        let outcome = classifier()
            .evaluate(&ctx("indeferido: não atende aos requisitos legais"))
            .unwrap();
        assert_eq!(outcome.disposition, Disposition::Denied);
        assert_eq!(outcome.denial_subtype, Some(DenialSubtype::OnMerits));
        assert_eq!(outcome.phase, CasePhase::Judicial);
    }

    #[test]
    fn test_evaluate_empty_history_errors() {
        let empty = CaseContext {
            protocol: "1".into(),
            birth_date: None,
            current_phase: CasePhase::Administrative,
            entries: vec![],
        };
        assert!(matches!(
            classifier().evaluate(&empty),
            Err(ClassifierError::EmptyHistory(_))
        ));
    }
}
