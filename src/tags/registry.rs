//! Closed registry of system tag patterns.
//!
//! Everything the reconciler writes matches one of these patterns; anything
//! else on the record is treated as a manual annotation and left untouched.
//! Region tags (`REGIAO-*`) are deliberately manual: they are set by the
//! office and only read by the notification router for partner routing.

use crate::types::{BenefitKind, ClassificationOutcome, Disposition};

/// Baseline tag marking a case as pipeline-managed. Must be present before
/// any message is sent about the case.
pub const MANDATORY_TAG: &str = "INSS-MONITORADO";

/// Manual routing prefix read (never written) by the notification router.
pub const REGION_TAG_PREFIX: &str = "REGIAO-";

/// Prefixes owned by the reconciler. A tag beginning with one of these is
/// replaced wholesale on every pass.
const SYSTEM_PREFIXES: &[&str] = &["FASE-", "STATUS-", "RESULTADO-", "BENEFICIO-"];

/// Control tags with no prefix family.
const CONTROL_TAGS: &[&str] = &[MANDATORY_TAG];

/// Whether the reconciler owns this tag.
pub fn is_system_tag(tag: &str) -> bool {
    CONTROL_TAGS.contains(&tag) || SYSTEM_PREFIXES.iter().any(|p| tag.starts_with(p))
}

/// System tag set describing a classification outcome.
pub fn system_tags_for(outcome: &ClassificationOutcome, benefit: BenefitKind) -> Vec<String> {
    let mut tags = vec![
        format!("FASE-{}", outcome.phase),
        format!("BENEFICIO-{}", benefit),
        MANDATORY_TAG.to_string(),
    ];

    match outcome.disposition {
        Disposition::Requirement => {
            tags.push("STATUS-EXIGENCIA".to_string());
        }
        Disposition::Approved => {
            tags.push("STATUS-CONCLUIDO".to_string());
            tags.push("RESULTADO-DEFERIDO".to_string());
        }
        Disposition::Denied => {
            tags.push("STATUS-CONCLUIDO".to_string());
            // Subtype is resolved upstream; an unresolved denial still gets
            // the generic outcome tag.
            let suffix = match outcome.denial_subtype {
                Some(crate::types::DenialSubtype::OnMerits) => "INDEFERIDO-MERITO",
                Some(crate::types::DenialSubtype::ForCause) => "INDEFERIDO-CAUSA",
                None => "INDEFERIDO",
            };
            tags.push(format!("RESULTADO-{}", suffix));
        }
    }

    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CasePhase, DenialSubtype};
    use chrono::Utc;

    fn outcome(disposition: Disposition, subtype: Option<DenialSubtype>) -> ClassificationOutcome {
        ClassificationOutcome {
            disposition,
            denial_subtype: subtype,
            phase: match subtype {
                Some(DenialSubtype::OnMerits) => CasePhase::Judicial,
                _ => CasePhase::Administrative,
            },
            required_documents: vec![],
            deadline: Utc::now().date_naive(),
            deadline_source: Utc::now().date_naive(),
            confidence: 0.9,
            reasoning: String::new(),
        }
    }

    #[test]
    fn test_region_tags_are_manual() {
        assert!(!is_system_tag("REGIAO-SP"));
        assert!(is_system_tag("FASE-JUDICIAL"));
        assert!(is_system_tag(MANDATORY_TAG));
        assert!(!is_system_tag("cliente-vip"));
    }

    #[test]
    fn test_requirement_tags() {
        let tags = system_tags_for(
            &outcome(Disposition::Requirement, None),
            BenefitKind::DisabilityAid,
        );
        assert!(tags.contains(&"FASE-ADMINISTRATIVA".to_string()));
        assert!(tags.contains(&"STATUS-EXIGENCIA".to_string()));
        assert!(tags.contains(&"BENEFICIO-AUXILIO-DOENCA".to_string()));
        assert!(tags.contains(&MANDATORY_TAG.to_string()));
    }

    #[test]
    fn test_merits_denial_tags_flag_judicial_phase() {
        let tags = system_tags_for(
            &outcome(Disposition::Denied, Some(DenialSubtype::OnMerits)),
            BenefitKind::ContinuousCashBenefit,
        );
        assert!(tags.contains(&"FASE-JUDICIAL".to_string()));
        assert!(tags.contains(&"RESULTADO-INDEFERIDO-MERITO".to_string()));
    }

    #[test]
    fn test_every_generated_tag_is_system() {
        let tags = system_tags_for(
            &outcome(Disposition::Approved, None),
            BenefitKind::MaternityPay,
        );
        assert!(tags.iter().all(|t| is_system_tag(t)));
    }
}
