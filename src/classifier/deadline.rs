//! Deadline derivation from status text.
//!
//! Resolution order, per entry from newest to oldest:
//!
//! 1. An explicit date (`"até 20/12/2025"`) — used exactly.
//! 2. A day count (`"120 dias"`) — added to the date of the entry that
//!    declared it.
//! 3. Otherwise, scan backward skipping administrative notices (transfers,
//!    scheduling) to the entry that states a genuine requirement, and use
//!    its date plus the configured default.
//!
//! The deadline is always anchored to the specific fragment that declared
//! it; a parseable explicit deadline is never replaced by the default.

use crate::types::StatusEntry;
use chrono::{Duration, NaiveDate};
use regex::Regex;
use std::sync::OnceLock;

/// Administrative notice phrasing that never carries a deadline.
const ADMIN_NOTICE_PHRASES: &[&str] = &[
    "tarefa transferida",
    "tarefa encaminhada",
    "perícia agendada",
    "atendimento agendado",
    "agendamento realizado",
    "análise iniciada",
];

fn explicit_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)at[eé]\s+(?:o\s+dia\s+)?(\d{1,2})/(\d{1,2})/(\d{4})")
            .unwrap_or_else(|e| unreachable!("static regex: {e}"))
    })
}

fn day_count_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:prazo\s+de\s+)?(\d{1,3})\s+dias")
            .unwrap_or_else(|e| unreachable!("static regex: {e}"))
    })
}

/// Resolved deadline with the date of the entry it derives from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlineResolution {
    pub deadline: NaiveDate,
    pub source_date: NaiveDate,
}

/// Parse an explicit `até DD/MM/YYYY` date from text.
pub fn parse_explicit_date(text: &str) -> Option<NaiveDate> {
    let caps = explicit_date_re().captures(text)?;
    let day: u32 = caps.get(1)?.as_str().parse().ok()?;
    let month: u32 = caps.get(2)?.as_str().parse().ok()?;
    let year: i32 = caps.get(3)?.as_str().parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Parse an `N dias` day count from text.
pub fn parse_day_count(text: &str) -> Option<i64> {
    let caps = day_count_re().captures(text)?;
    caps.get(1)?.as_str().parse().ok()
}

/// Whether the entry is an administrative notice (transfer/scheduling).
pub fn is_admin_notice(entry: &StatusEntry) -> bool {
    let lower = format!("{} {}", entry.title, entry.body).to_lowercase();
    ADMIN_NOTICE_PHRASES.iter().any(|p| lower.contains(p))
}

/// Derive the deadline from the status history, newest entry first.
///
/// `entries` must be non-empty; the caller guards this.
pub fn derive_deadline(entries: &[StatusEntry], default_days: i64) -> DeadlineResolution {
    // Pass 1: an entry that states its own deadline wins, newest first.
    for entry in entries {
        let text = format!("{} {}", entry.title, entry.body);
        if let Some(date) = parse_explicit_date(&text) {
            return DeadlineResolution {
                deadline: date,
                source_date: entry.date,
            };
        }
        if let Some(days) = parse_day_count(&text) {
            return DeadlineResolution {
                deadline: entry.date + Duration::days(days),
                source_date: entry.date,
            };
        }
    }

    // Pass 2: no stated deadline anywhere — anchor the default on the newest
    // entry that is a genuine requirement, not an administrative notice.
    let source = entries
        .iter()
        .find(|e| !is_admin_notice(e))
        .or_else(|| entries.first());

    let source_date = source.map(|e| e.date).unwrap_or_default();
    DeadlineResolution {
        deadline: source_date + Duration::days(default_days),
        source_date,
    }
}
