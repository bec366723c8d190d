//! Unknown-key detection for config files.
//!
//! Serde silently ignores unrecognized TOML keys, which turns typos like
//! `dedup_overlp` into hard-to-find default fallbacks. This pass walks the
//! raw TOML and warns about any key path the schema doesn't know.

/// Known section names and their keys. `channels.partners` accepts arbitrary
/// region suffixes and is exempted from key checking.
const KNOWN_KEYS: &[&str] = &[
    "server.addr",
    "pipeline.report_window_days",
    "pipeline.inter_case_delay_ms",
    "pipeline.history_entries",
    "pipeline.stale_job_minutes",
    "portal.base_url",
    "portal.timeout_secs",
    "crm.base_url",
    "crm.api_key",
    "crm.timeout_secs",
    "classifier.ai_url",
    "classifier.ai_timeout_secs",
    "classifier.min_ai_confidence",
    "classifier.denial_default",
    "classifier.default_deadline_days",
    "gateway.bridge_url",
    "gateway.timeout_secs",
    "gateway.session_dir",
    "gateway.backoff_base_secs",
    "gateway.max_recovery_attempts",
    "gateway.reconnect_delay_secs",
    "gateway.shutdown_grace_ms",
    "channels.office",
    "channels.approval",
    "channels.legal",
    "notify.dedup_overlap",
    "notify.dedup_window_days",
    "notify.recent_notes",
    "storage.data_dir",
    "storage.retention_days",
];

/// Collect dotted key paths from a parsed TOML value.
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let toml::Value::Table(table) = value {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{}.{}", prefix, k)
            };
            match v {
                toml::Value::Table(_) => keys.extend(walk_toml_keys(v, &path)),
                _ => keys.push(path),
            }
        }
    }
    keys
}

/// Return one warning string per unrecognized key path in `contents`.
pub fn validate_unknown_keys(contents: &str) -> Vec<String> {
    let Ok(value) = contents.parse::<toml::Value>() else {
        return Vec::new(); // parse errors surface later with a proper path
    };

    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|path| {
            !KNOWN_KEYS.contains(&path.as_str()) && !path.starts_with("channels.partners.")
        })
        .map(|path| format!("Unknown config key '{}' — check for typos, value will be ignored", path))
        .collect()
}
