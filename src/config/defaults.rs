//! System-wide default constants.
//!
//! Centralises the pipeline's magic numbers. Grouped by subsystem for easy
//! discovery; the `settings` structs reference these for their serde defaults.

// ============================================================================
// Sweep / Job lifecycle
// ============================================================================

/// Reporting window covered by one sweep (days before now).
pub const REPORT_WINDOW_DAYS: u32 = 7;

/// Fixed delay between cases (milliseconds).
///
/// Throttles load on the scraped portal and the messaging gateway; both sit
/// behind single logical connections that must never see parallel traffic.
pub const INTER_CASE_DELAY_MS: u64 = 2_000;

/// Recent portal entries the classifier reads per case.
pub const CLASSIFIER_HISTORY_ENTRIES: usize = 5;

/// Minutes a job may sit in PENDING/RUNNING before the sweep reaps it.
///
/// This is the only mechanism that reclaims a crashed run; there is no live
/// cancellation.
pub const STALE_JOB_MINUTES: i64 = 30;

// ============================================================================
// External clients
// ============================================================================

/// Portal request timeout (seconds). Browser-mediated upstream, so generous.
pub const PORTAL_TIMEOUT_SECS: u64 = 60;

/// CRM request timeout (seconds).
pub const CRM_TIMEOUT_SECS: u64 = 30;

/// AI classification service timeout (seconds).
pub const AI_TIMEOUT_SECS: u64 = 45;

/// AI verdicts below this confidence fall through to the keyword classifier.
pub const MIN_AI_CONFIDENCE: f64 = 0.5;

// ============================================================================
// Deadlines
// ============================================================================

/// Days added to the source-entry date when the text states no deadline.
pub const DEFAULT_DEADLINE_DAYS: i64 = 30;

// ============================================================================
// Notification dedup
// ============================================================================

/// Token-overlap ratio at or above which two notes are the same event.
pub const DEDUP_OVERLAP_RATIO: f64 = 0.7;

/// Notes older than this many days never suppress a new one.
pub const DEDUP_WINDOW_DAYS: i64 = 7;

/// Recent notes per case compared during dedup.
pub const DEDUP_RECENT_NOTES: usize = 10;

// ============================================================================
// Messaging gateway
// ============================================================================

/// Gateway bridge request timeout (seconds).
pub const GATEWAY_TIMEOUT_SECS: u64 = 30;

/// Base of the exponential recovery backoff (seconds). Doubles per attempt.
pub const RECOVERY_BACKOFF_BASE_SECS: u64 = 3;

/// Recovery attempts before the session is declared degraded.
pub const MAX_RECOVERY_ATTEMPTS: u32 = 3;

/// Fixed reconnect delay after a disconnect without logout (seconds).
pub const RECONNECT_DELAY_SECS: u64 = 5;

/// Grace delay flushed before closing the session handle on shutdown (ms).
///
/// Prevents the mid-write artifact corruption that would otherwise force a
/// re-pairing on next start.
pub const SHUTDOWN_GRACE_MS: u64 = 1_500;

/// Pairing code time-to-live (seconds).
pub const PAIRING_CODE_TTL_SECS: u64 = 60;

// ============================================================================
// Durable storage
// ============================================================================

/// Audit/history retention (days); older entries are pruned at startup.
pub const STORAGE_RETENTION_DAYS: i64 = 180;

// ============================================================================
// Learning store retrieval
// ============================================================================

/// Minimum token length kept after stopword stripping.
pub const LEARNING_MIN_TOKEN_LEN: usize = 3;

/// Excerpt cap (characters) when entries are returned for prompt inclusion.
pub const LEARNING_EXCERPT_CHARS: usize = 400;
