//! Runtime configuration.
//!
//! Every tunable of the pipeline lives in [`ClaimsyncConfig`], loaded from
//! TOML and held in a process-wide `OnceLock`.
//!
//! ## Loading Order
//!
//! 1. `CLAIMSYNC_CONFIG` environment variable (path to TOML file)
//! 2. `claimsync.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! Call `config::init()` once at startup, then `config::get()` anywhere:
//!
//! ```ignore
//! // In main():
//! config::init(ClaimsyncConfig::load());
//!
//! // Anywhere in the codebase:
//! let delay = config::get().pipeline.inter_case_delay_ms;
//! ```

mod settings;
mod validation;
pub mod defaults;

pub use settings::*;

use std::sync::OnceLock;

/// Global configuration, initialized once at startup.
static CONFIG: OnceLock<ClaimsyncConfig> = OnceLock::new();

/// Initialize the global configuration.
///
/// Must be called exactly once before any calls to `get()`.
pub fn init(config: ClaimsyncConfig) {
    if CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once — ignoring");
    }
}

/// Get a reference to the global configuration.
///
/// Falls back to built-in defaults when `init()` was never called, which
/// keeps unit tests free of global setup.
pub fn get() -> &'static ClaimsyncConfig {
    CONFIG.get_or_init(ClaimsyncConfig::default)
}

/// Check whether the config has been initialized.
pub fn is_initialized() -> bool {
    CONFIG.get().is_some()
}
