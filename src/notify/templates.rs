//! Disposition-specific message templates.
//!
//! Notes and outbound messages share the same body so dedup comparisons and
//! the audit trail see exactly what was delivered.

use crate::types::{CaseRecord, ClassificationOutcome, DenialSubtype, Disposition};

/// Mask a national id (CPF): keep the first 3 and last 2 digits.
/// `12345678901` becomes `123******01`. Inputs shorter than 6 characters are
/// fully masked.
pub fn mask_national_id(id: &str) -> String {
    let chars: Vec<char> = id.chars().collect();
    if chars.len() < 6 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{}{}{}", head, "*".repeat(chars.len() - 5), tail)
}

/// Title line for the mirrored case note.
pub fn note_title(outcome: &ClassificationOutcome, case: &CaseRecord) -> String {
    let label = match (outcome.disposition, outcome.denial_subtype) {
        (Disposition::Requirement, _) => "EXIGÊNCIA",
        (Disposition::Approved, _) => "BENEFÍCIO DEFERIDO",
        (Disposition::Denied, Some(DenialSubtype::ForCause)) => "INDEFERIDO (CAUSA PROCESSUAL)",
        (Disposition::Denied, Some(DenialSubtype::OnMerits)) => "INDEFERIDO (MÉRITO)",
        (Disposition::Denied, None) => "INDEFERIDO",
    };
    format!("{} — Protocolo {}", label, case.protocol)
}

/// Full message body: shared by the case note and the outbound messages.
pub fn message_body(
    outcome: &ClassificationOutcome,
    case: &CaseRecord,
    evidence_links: &[String],
) -> String {
    let mut lines = Vec::new();

    lines.push(format!("Protocolo: {}", case.protocol));
    lines.push(format!("Segurado: {}", case.claimant_name));
    lines.push(format!("CPF: {}", mask_national_id(&case.national_id)));
    lines.push(format!("Benefício: {}", case.benefit));
    lines.push(format!("Fase: {}", outcome.phase));

    match outcome.disposition {
        Disposition::Requirement => {
            lines.push("Situação: exigência pendente.".to_string());
            if !outcome.required_documents.is_empty() {
                lines.push(format!(
                    "Documentos exigidos: {}.",
                    outcome.required_documents.join(", ")
                ));
            }
            lines.push(format!(
                "Prazo: {} ({} dias restantes).",
                outcome.deadline.format("%d/%m/%Y"),
                outcome.days_remaining()
            ));
        }
        Disposition::Approved => {
            lines.push("Situação: benefício deferido.".to_string());
        }
        Disposition::Denied => {
            let detail = match outcome.denial_subtype {
                Some(DenialSubtype::ForCause) => {
                    "indeferido por causa processual; novo requerimento administrativo possível"
                }
                Some(DenialSubtype::OnMerits) => {
                    "indeferido no mérito; avaliar ajuizamento"
                }
                None => "indeferido",
            };
            lines.push(format!("Situação: {}.", detail));
            lines.push(format!(
                "Prazo para providências: {} ({} dias restantes).",
                outcome.deadline.format("%d/%m/%Y"),
                outcome.days_remaining()
            ));
        }
    }

    if !outcome.reasoning.is_empty() {
        lines.push(format!("Análise: {}", outcome.reasoning));
    }

    if !evidence_links.is_empty() {
        lines.push("Comprovantes:".to_string());
        for link in evidence_links {
            lines.push(format!("  {}", link));
        }
    }

    lines.join("\n")
}
