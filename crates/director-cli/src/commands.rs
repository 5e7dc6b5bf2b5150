//! Shared command implementations for the director CLI.
//!
//! Library-level functions so they can be tested without spawning the binary.

use anyhow::{Context, Result};
use director_config::{load_director_config, load_moods_config, load_verifiers_config, validate, Config};
use director_core::{Receipt, Run, WorkItem};
use schemars::schema_for;
use std::path::Path;

/// Schema types the `schema` subcommand can print.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    /// JSON schema for [`Run`].
    Run,
    /// JSON schema for [`WorkItem`].
    WorkItem,
    /// JSON schema for [`Receipt`].
    Receipt,
    /// JSON schema for [`director_config::DirectorConfig`].
    Config,
}

/// Returns the pretty-printed JSON schema for the given kind.
pub fn schema_json(kind: SchemaKind) -> Result<String> {
    let value = match kind {
        SchemaKind::Run => serde_json::to_value(schema_for!(Run))?,
        SchemaKind::WorkItem => serde_json::to_value(schema_for!(WorkItem))?,
        SchemaKind::Receipt => serde_json::to_value(schema_for!(Receipt))?,
        SchemaKind::Config => serde_json::to_value(schema_for!(director_config::DirectorConfig))?,
    };
    serde_json::to_string_pretty(&value).context("serialize schema")
}

/// The outcome of loading and validating the three configuration documents.
pub struct ConfigCheck {
    /// The loaded configuration, when parsing succeeded.
    pub config: Option<Config>,
    /// Human-readable diagnostics, empty when the config is valid.
    pub diagnostics: Vec<String>,
    /// Whether the failure was specifically an empty verifier allowlist
    /// (exit code `6`), as opposed to any other invalid configuration
    /// (exit code `2`).
    pub verifier_allowlist_missing: bool,
}

/// Loads `director.toml`, `moods.toml`, and `verifiers.toml` from `config_dir`
/// and validates the combined configuration.
pub fn check_config(config_dir: &Path) -> Result<ConfigCheck> {
    let director_path = config_dir.join("director.toml");
    let moods_path = config_dir.join("moods.toml");
    let verifiers_path = config_dir.join("verifiers.toml");

    let director = load_director_config(director_path.is_file().then_some(director_path.as_path()))
        .with_context(|| format!("load director.toml from '{}'", director_path.display()))?;
    let moods = load_moods_config(moods_path.is_file().then_some(moods_path.as_path()))
        .with_context(|| format!("load moods.toml from '{}'", moods_path.display()))?;
    let verifiers = match load_verifiers_config(&verifiers_path) {
        Ok(v) => v,
        Err(director_config::ConfigError::FileNotFound { .. }) => {
            return Ok(ConfigCheck {
                config: None,
                diagnostics: vec![format!(
                    "verifiers.toml not found at '{}'",
                    verifiers_path.display()
                )],
                verifier_allowlist_missing: true,
            });
        }
        Err(e) => return Err(e.into()),
    };

    let config = Config { director, moods, verifiers };
    match validate(&config) {
        Ok(()) => Ok(ConfigCheck { config: Some(config), diagnostics: vec![], verifier_allowlist_missing: false }),
        Err(director_config::ConfigError::ValidationError { reasons }) => {
            let verifier_allowlist_missing =
                reasons.iter().any(|r| r.contains("verifiers.toml: allowlist declares no verifiers"));
            Ok(ConfigCheck { config: None, diagnostics: reasons, verifier_allowlist_missing })
        }
        Err(e) => Err(e.into()),
    }
}

/// Inspects a receipt JSON file: deserializes it and recomputes its content
/// hash. `director_core::Receipt` carries no embedded hash field, so this
/// reports the computed hash for comparison rather than verifying a stored
/// one (unlike a signed receipt export).
pub fn inspect_receipt_file(path: &Path) -> Result<(Receipt, String)> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("read receipt file '{}'", path.display()))?;
    let receipt: Receipt = serde_json::from_str(&content)
        .with_context(|| format!("parse receipt from '{}'", path.display()))?;
    let hash = director_receipt::compute_hash(&receipt).context("compute receipt hash")?;
    Ok((receipt, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn schema_json_produces_valid_json_for_every_kind() {
        for kind in [SchemaKind::Run, SchemaKind::WorkItem, SchemaKind::Receipt, SchemaKind::Config] {
            let json = schema_json(kind).unwrap();
            let _: serde_json::Value = serde_json::from_str(&json).unwrap();
        }
    }

    #[test]
    fn check_config_with_no_files_uses_defaults_but_flags_missing_verifiers() {
        let dir = tempfile::tempdir().unwrap();
        let result = check_config(dir.path()).unwrap();
        assert!(result.config.is_none());
        assert!(result.verifier_allowlist_missing);
    }

    #[test]
    fn check_config_with_full_set_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("director.toml"), "namespace = \"choiros\"").unwrap();
        std::fs::write(
            dir.path().join("verifiers.toml"),
            r#"
            [[verifier]]
            id = "lint"
            verifier_type = "lint"
            command_template = "cargo clippy"
            required_capabilities = ["exec"]
            declared_independent = true
            priority = 10
            path_globs = ["**/*.rs"]
            "#,
        )
        .unwrap();

        let result = check_config(dir.path()).unwrap();
        assert!(result.config.is_some());
        assert!(result.diagnostics.is_empty());
        assert!(!result.verifier_allowlist_missing);
    }

    #[test]
    fn inspect_receipt_file_reports_a_stable_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("receipt.json");
        let receipt = Receipt {
            receipt_id: uuid::Uuid::nil(),
            kind: director_core::ReceiptKind::Read,
            references: vec!["ref1".into()],
            timestamp_ms: 0,
        };
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(serde_json::to_string(&receipt).unwrap().as_bytes()).unwrap();

        let (parsed, hash) = inspect_receipt_file(&path).unwrap();
        assert_eq!(parsed.receipt_id, receipt.receipt_id);
        assert!(!hash.is_empty());
    }
}
