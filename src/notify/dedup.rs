//! Duplicate suppression for case notes.
//!
//! The portal re-serves the same status movement for days, so a naive
//! mirror would write near-identical notes on every sync. A candidate note
//! is a duplicate when a recent note on the same case references the same
//! protocol and shares enough of its keyword set.

use crate::clients::CaseNote;
use crate::learning::keyword_tokens;
use chrono::{Duration, Utc};
use std::collections::HashSet;

/// Token-overlap ratio between two texts: `|A ∩ B| / min(|A|, |B|)`.
/// Returns 0.0 when either side has no keywords.
pub fn overlap_ratio(a: &str, b: &str) -> f64 {
    let set_a: HashSet<String> = keyword_tokens(a).into_iter().collect();
    let set_b: HashSet<String> = keyword_tokens(b).into_iter().collect();
    let min_len = set_a.len().min(set_b.len());
    if min_len == 0 {
        return 0.0;
    }
    let shared = set_a.intersection(&set_b).count();
    shared as f64 / min_len as f64
}

/// Whether `candidate_body` duplicates any of the case's recent notes.
///
/// Only the newest `recent_notes` notes are considered, and among those only
/// the ones that mention `protocol` and were created within
/// `window_days`. Returns the title of the matching note for the audit
/// record.
pub fn find_duplicate(
    candidate_body: &str,
    protocol: &str,
    existing: &[CaseNote],
    recent_notes: usize,
    window_days: i64,
    overlap_threshold: f64,
) -> Option<String> {
    let cutoff = Utc::now() - Duration::days(window_days);

    existing
        .iter()
        .take(recent_notes)
        .filter(|note| note.created_at >= cutoff)
        .filter(|note| note.title.contains(protocol) || note.body.contains(protocol))
        .find(|note| overlap_ratio(candidate_body, &note.body) >= overlap_threshold)
        .map(|note| note.title.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(title: &str, body: &str, age_days: i64) -> CaseNote {
        CaseNote {
            title: title.to_string(),
            body: body.to_string(),
            created_at: Utc::now() - Duration::days(age_days),
        }
    }

    const BODY: &str = "Protocolo: 555\nSituação: exigência pendente.\nDocumentos exigidos: laudo médico.\nPrazo: 20/12/2025";

    #[test]
    fn test_identical_recent_note_is_duplicate() {
        let existing = vec![note("EXIGÊNCIA — Protocolo 555", BODY, 1)];
        let hit = find_duplicate(BODY, "555", &existing, 10, 7, 0.7);
        assert_eq!(hit.as_deref(), Some("EXIGÊNCIA — Protocolo 555"));
    }

    #[test]
    fn test_old_note_outside_window_is_not_duplicate() {
        let existing = vec![note("EXIGÊNCIA — Protocolo 555", BODY, 30)];
        assert!(find_duplicate(BODY, "555", &existing, 10, 7, 0.7).is_none());
    }

    #[test]
    fn test_other_protocol_is_not_duplicate() {
        let existing = vec![note("EXIGÊNCIA — Protocolo 999", BODY.replace("555", "999").as_str(), 1)];
        assert!(find_duplicate(BODY, "555", &existing, 10, 7, 0.7).is_none());
    }

    #[test]
    fn test_dissimilar_note_on_same_protocol_passes() {
        let other = "Protocolo: 555\nSituação: benefício deferido.\nNenhuma providência necessária.";
        let existing = vec![note("DEFERIDO — Protocolo 555", other, 1)];
        assert!(find_duplicate(BODY, "555", &existing, 10, 7, 0.7).is_none());
    }

    #[test]
    fn test_only_recent_notes_are_compared() {
        let mut existing: Vec<CaseNote> = (0..10)
            .map(|i| note("ruído", "texto sem relação nenhuma", i))
            .collect();
        existing.push(note("EXIGÊNCIA — Protocolo 555", BODY, 1));
        // The matching note is 11th from the top and outside the window of 10.
        assert!(find_duplicate(BODY, "555", &existing, 10, 7, 0.7).is_none());
    }

    #[test]
    fn test_overlap_ratio_bounds() {
        assert_eq!(overlap_ratio("", ""), 0.0);
        let full = overlap_ratio("exigência laudo médico prazo", "exigência laudo médico prazo");
        assert!((full - 1.0).abs() < f64::EPSILON);
    }
}
