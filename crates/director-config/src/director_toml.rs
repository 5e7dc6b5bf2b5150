//! `director.toml`: namespace constant, storage paths, and default run
//! budgets applied to a mood profile that does not declare its own.

use director_core::RunBudgets;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Filesystem layout for the three persisted stores (spec §6.4).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct StoragePaths {
    /// Directory the `FileEventLog` segment and index live under.
    #[serde(default = "default_event_log_dir")]
    pub event_log_dir: String,
    /// Directory the content-addressed artifact store writes into.
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: String,
    /// Directory receipt JSON exports are written to.
    #[serde(default = "default_receipts_dir")]
    pub receipts_dir: String,
}

fn default_event_log_dir() -> String {
    "./data/events".into()
}

fn default_artifact_dir() -> String {
    "./data/artifacts".into()
}

fn default_receipts_dir() -> String {
    "./data/receipts".into()
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self {
            event_log_dir: default_event_log_dir(),
            artifact_dir: default_artifact_dir(),
            receipts_dir: default_receipts_dir(),
        }
    }
}

/// Top-level settings loaded from `director.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct DirectorConfig {
    /// The subject namespace constant (spec §6.1: `{namespace}.{user_id}.{source}.{event_type}`).
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Log level passed to `tracing-subscriber`'s env filter.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Storage paths for the event log, artifact store, and receipt exports.
    #[serde(default)]
    pub storage: StoragePaths,
    /// Budget ceiling applied to a run whose mood profile sets none of its
    /// own (every built-in profile does; this only matters for a partial
    /// override in `moods.toml`).
    #[serde(default = "default_run_budgets")]
    pub default_budgets: RunBudgets,
}

fn default_run_budgets() -> RunBudgets {
    RunBudgets {
        tokens: 200_000,
        time_ms: 600_000,
        iterations: 40,
        diff_bytes: 2_000_000,
    }
}

fn default_namespace() -> String {
    director_core::NAMESPACE.to_string()
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for DirectorConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            log_level: default_log_level(),
            storage: StoragePaths::default(),
            default_budgets: default_run_budgets(),
        }
    }
}

const VALID_LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

pub(crate) fn validate(config: &DirectorConfig) -> Vec<String> {
    let mut errors = Vec::new();
    if config.namespace.trim().is_empty() {
        errors.push("director.toml: namespace must not be empty".into());
    }
    if !VALID_LOG_LEVELS.contains(&config.log_level.as_str()) {
        errors.push(format!("director.toml: invalid log_level '{}'", config.log_level));
    }
    if config.default_budgets.tokens == 0 {
        errors.push("director.toml: default_budgets.tokens must be greater than zero".into());
    }
    errors
}
