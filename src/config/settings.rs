//! Configuration sections — every knob of the pipeline as an operator-tunable
//! TOML value.
//!
//! Each struct implements `Default` with the shipped values, so a missing or
//! partial config file never changes behavior silently: absent keys fall back
//! to the same constants the code would otherwise carry.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for a claimsync deployment.
///
/// Load with `ClaimsyncConfig::load()` which searches:
/// 1. `$CLAIMSYNC_CONFIG` env var
/// 2. `./claimsync.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClaimsyncConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub portal: PortalConfig,

    #[serde(default)]
    pub crm: CrmConfig,

    #[serde(default)]
    pub classifier: ClassifierConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub channels: ChannelConfig,

    #[serde(default)]
    pub notify: NotifyConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

impl ClaimsyncConfig {
    /// Load configuration using the standard search order:
    /// 1. `$CLAIMSYNC_CONFIG` environment variable
    /// 2. `./claimsync.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("CLAIMSYNC_CONFIG") {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded config from CLAIMSYNC_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from CLAIMSYNC_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "CLAIMSYNC_CONFIG points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from("claimsync.toml");
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded config from ./claimsync.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./claimsync.toml, using defaults");
                }
            }
        }

        info!("No claimsync.toml found — using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;

        // Unknown-key pass first: warnings only, never fatal.
        for w in super::validation::validate_unknown_keys(&contents) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(&contents)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Range checks on thresholds. A config that passes `validate()` can be
    /// installed without further defensive checks downstream.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.notify.dedup_overlap) {
            return Err(ConfigError::Invalid(format!(
                "notify.dedup_overlap must be within 0.0..=1.0 (got {})",
                self.notify.dedup_overlap
            )));
        }
        if self.notify.dedup_window_days == 0 {
            return Err(ConfigError::Invalid(
                "notify.dedup_window_days must be at least 1".to_string(),
            ));
        }
        if self.gateway.max_recovery_attempts == 0 {
            return Err(ConfigError::Invalid(
                "gateway.max_recovery_attempts must be at least 1".to_string(),
            ));
        }
        if self.pipeline.report_window_days == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.report_window_days must be at least 1".to_string(),
            ));
        }
        if self.classifier.default_deadline_days == 0 {
            return Err(ConfigError::Invalid(
                "classifier.default_deadline_days must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration load/validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    Io(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    Parse(PathBuf, toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// Sections
// ============================================================================

/// HTTP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_addr")]
    pub addr: String,
}

fn default_addr() -> String {
    "0.0.0.0:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
        }
    }
}

/// Sweep loop tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Reporting window: sweep covers now minus this many days, to now.
    #[serde(default = "default_report_window_days")]
    pub report_window_days: u32,

    /// Fixed delay between cases; throttles the portal and the gateway.
    #[serde(default = "default_inter_case_delay_ms")]
    pub inter_case_delay_ms: u64,

    /// How many recent portal entries the classifier reads per case.
    #[serde(default = "default_history_entries")]
    pub history_entries: usize,

    /// Jobs idle in PENDING/RUNNING longer than this are reaped as failed.
    #[serde(default = "default_stale_job_minutes")]
    pub stale_job_minutes: i64,
}

fn default_report_window_days() -> u32 {
    defaults::REPORT_WINDOW_DAYS
}
fn default_inter_case_delay_ms() -> u64 {
    defaults::INTER_CASE_DELAY_MS
}
fn default_history_entries() -> usize {
    defaults::CLASSIFIER_HISTORY_ENTRIES
}
fn default_stale_job_minutes() -> i64 {
    defaults::STALE_JOB_MINUTES
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            report_window_days: default_report_window_days(),
            inter_case_delay_ms: default_inter_case_delay_ms(),
            history_entries: default_history_entries(),
            stale_job_minutes: default_stale_job_minutes(),
        }
    }
}

/// Government portal access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    #[serde(default = "default_portal_url")]
    pub base_url: String,

    /// Portal steps are browser-mediated upstream; timeouts are sized in
    /// tens of seconds accordingly.
    #[serde(default = "default_portal_timeout")]
    pub timeout_secs: u64,
}

fn default_portal_url() -> String {
    "http://localhost:9100".to_string()
}
fn default_portal_timeout() -> u64 {
    defaults::PORTAL_TIMEOUT_SECS
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: default_portal_url(),
            timeout_secs: default_portal_timeout(),
        }
    }
}

/// External case-management system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrmConfig {
    #[serde(default = "default_crm_url")]
    pub base_url: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_crm_timeout")]
    pub timeout_secs: u64,
}

fn default_crm_url() -> String {
    "http://localhost:9200".to_string()
}
fn default_crm_timeout() -> u64 {
    defaults::CRM_TIMEOUT_SECS
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            base_url: default_crm_url(),
            api_key: String::new(),
            timeout_secs: default_crm_timeout(),
        }
    }
}

/// AI classification service and fallback policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_ai_url")]
    pub ai_url: String,

    #[serde(default = "default_ai_timeout")]
    pub ai_timeout_secs: u64,

    /// AI verdicts below this confidence are discarded in favour of the
    /// keyword fallback.
    #[serde(default = "default_min_ai_confidence")]
    pub min_ai_confidence: f64,

    /// Policy applied when denial text matches neither keyword list.
    /// `on_merits` routes ambiguous denials to judicial escalation.
    #[serde(default = "default_denial_default")]
    pub denial_default: DenialDefault,

    /// Days added to the source-entry date when no explicit deadline parses.
    #[serde(default = "default_deadline_days")]
    pub default_deadline_days: i64,
}

/// Configured fallback for ambiguous denial text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialDefault {
    ForCause,
    OnMerits,
}

fn default_ai_url() -> String {
    "http://localhost:9300".to_string()
}
fn default_ai_timeout() -> u64 {
    defaults::AI_TIMEOUT_SECS
}
fn default_min_ai_confidence() -> f64 {
    defaults::MIN_AI_CONFIDENCE
}
fn default_denial_default() -> DenialDefault {
    DenialDefault::OnMerits
}
fn default_deadline_days() -> i64 {
    defaults::DEFAULT_DEADLINE_DAYS
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            ai_url: default_ai_url(),
            ai_timeout_secs: default_ai_timeout(),
            min_ai_confidence: default_min_ai_confidence(),
            denial_default: default_denial_default(),
            default_deadline_days: default_deadline_days(),
        }
    }
}

/// Messaging gateway session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Local bridge process that owns the physical gateway connection.
    #[serde(default = "default_bridge_url")]
    pub bridge_url: String,

    #[serde(default = "default_bridge_timeout")]
    pub timeout_secs: u64,

    /// Directory holding session artifacts (credentials, key store, wal).
    #[serde(default = "default_session_dir")]
    pub session_dir: String,

    /// Base for the exponential recovery backoff, in seconds.
    #[serde(default = "default_backoff_base")]
    pub backoff_base_secs: u64,

    /// Recovery attempts before the session is declared degraded.
    #[serde(default = "default_max_recovery")]
    pub max_recovery_attempts: u32,

    /// Fixed delay before reconnecting after a plain disconnect.
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,

    /// Grace delay flushed before closing the session on shutdown.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_ms: u64,
}

fn default_bridge_url() -> String {
    "http://localhost:9400".to_string()
}
fn default_bridge_timeout() -> u64 {
    defaults::GATEWAY_TIMEOUT_SECS
}
fn default_session_dir() -> String {
    "./data/session".to_string()
}
fn default_backoff_base() -> u64 {
    defaults::RECOVERY_BACKOFF_BASE_SECS
}
fn default_max_recovery() -> u32 {
    defaults::MAX_RECOVERY_ATTEMPTS
}
fn default_reconnect_delay() -> u64 {
    defaults::RECONNECT_DELAY_SECS
}
fn default_shutdown_grace() -> u64 {
    defaults::SHUTDOWN_GRACE_MS
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bridge_url: default_bridge_url(),
            timeout_secs: default_bridge_timeout(),
            session_dir: default_session_dir(),
            backoff_base_secs: default_backoff_base(),
            max_recovery_attempts: default_max_recovery(),
            reconnect_delay_secs: default_reconnect_delay(),
            shutdown_grace_ms: default_shutdown_grace(),
        }
    }
}

/// Notification destinations.
///
/// Numbers are national format (DDD + number); normalization happens at
/// send time in the gateway layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Default destination: requirement work and unmapped regions.
    #[serde(default)]
    pub office: String,

    /// Approvals channel.
    #[serde(default)]
    pub approval: String,

    /// Legal team channel for denials.
    #[serde(default)]
    pub legal: String,

    /// Regional-partner overrides, keyed by the `REGIAO-` tag suffix
    /// (e.g. `SP = "11987654321"`).
    #[serde(default)]
    pub partners: HashMap<String, String>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            office: String::new(),
            approval: String::new(),
            legal: String::new(),
            partners: HashMap::new(),
        }
    }
}

/// Note mirroring and duplicate suppression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Token-overlap ratio at or above which a note is a duplicate.
    #[serde(default = "default_dedup_overlap")]
    pub dedup_overlap: f64,

    /// Only notes younger than this many days participate in dedup.
    #[serde(default = "default_dedup_window")]
    pub dedup_window_days: i64,

    /// How many recent notes per case are compared.
    #[serde(default = "default_recent_notes")]
    pub recent_notes: usize,
}

fn default_dedup_overlap() -> f64 {
    defaults::DEDUP_OVERLAP_RATIO
}
fn default_dedup_window() -> i64 {
    defaults::DEDUP_WINDOW_DAYS
}
fn default_recent_notes() -> usize {
    defaults::DEDUP_RECENT_NOTES
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            dedup_overlap: default_dedup_overlap(),
            dedup_window_days: default_dedup_window(),
            recent_notes: default_recent_notes(),
        }
    }
}

/// Durable storage layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Audit/history entries older than this are pruned at startup.
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
}

fn default_data_dir() -> String {
    "./data".to_string()
}
fn default_retention_days() -> i64 {
    defaults::STORAGE_RETENTION_DAYS
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            retention_days: default_retention_days(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_pass_validation() {
        ClaimsyncConfig::default().validate().unwrap();
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let toml_str = r#"
            [notify]
            dedup_overlap = 0.8
        "#;
        let config: ClaimsyncConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.notify.dedup_overlap, 0.8);
        assert_eq!(config.notify.dedup_window_days, defaults::DEDUP_WINDOW_DAYS);
        assert_eq!(config.pipeline.report_window_days, defaults::REPORT_WINDOW_DAYS);
    }

    #[test]
    fn test_out_of_range_overlap_rejected() {
        let mut config = ClaimsyncConfig::default();
        config.notify.dedup_overlap = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partner_channels_parse() {
        let toml_str = r#"
            [channels]
            office = "1133334444"
            [channels.partners]
            SP = "11988887777"
            BA = "71988887777"
        "#;
        let config: ClaimsyncConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.channels.partners.len(), 2);
        assert_eq!(config.channels.partners["SP"], "11988887777");
    }
}
