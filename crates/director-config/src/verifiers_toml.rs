//! `verifiers.toml`: the static verifier allowlist (spec §6.3). "The planner
//! chooses from this set only; no ad-hoc commands may be executed as
//! verifiers." An allowlist with no entries is a configuration error (exit
//! code `6`, "verifier allowlist missing").

use director_policy::{VerifierAllowlist, VerifierAllowlistEntry};
use std::collections::HashSet;

/// Raw `verifiers.toml` contents.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct VerifiersConfig {
    /// Declared verifier entries, in configuration order (also the default
    /// tie-break order when priorities match).
    #[serde(default)]
    pub verifier: Vec<VerifierAllowlistEntry>,
}

impl VerifiersConfig {
    /// Compiles into the [`VerifierAllowlist`] `director-verifier` consumes.
    #[must_use]
    pub fn into_allowlist(self) -> VerifierAllowlist {
        VerifierAllowlist::new(self.verifier)
    }
}

pub(crate) fn validate(config: &VerifiersConfig) -> Vec<String> {
    let mut errors = Vec::new();
    if config.verifier.is_empty() {
        errors.push("verifiers.toml: allowlist declares no verifiers".into());
        return errors;
    }

    let mut seen = HashSet::new();
    for entry in &config.verifier {
        if entry.id.trim().is_empty() {
            errors.push("verifiers.toml: a verifier entry has an empty id".into());
        } else if !seen.insert(entry.id.clone()) {
            errors.push(format!("verifiers.toml: duplicate verifier id '{}'", entry.id));
        }
        if entry.command_template.trim().is_empty() {
            errors.push(format!("verifiers.toml: verifier '{}' has an empty command_template", entry.id));
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, command: &str) -> VerifierAllowlistEntry {
        VerifierAllowlistEntry {
            id: id.into(),
            verifier_type: "lint".into(),
            command_template: command.into(),
            required_capabilities: vec!["exec".into()],
            declared_independent: false,
            priority: 1,
            path_globs: vec!["**".into()],
        }
    }

    #[test]
    fn empty_allowlist_is_rejected() {
        let config = VerifiersConfig::default();
        assert!(!validate(&config).is_empty());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let config = VerifiersConfig {
            verifier: vec![entry("v1", "echo ok"), entry("v1", "echo ok")],
        };
        assert!(!validate(&config).is_empty());
    }

    #[test]
    fn empty_command_template_is_rejected() {
        let config = VerifiersConfig {
            verifier: vec![entry("v1", "  ")],
        };
        assert!(!validate(&config).is_empty());
    }

    #[test]
    fn valid_config_passes() {
        let config = VerifiersConfig {
            verifier: vec![entry("v1", "echo ok"), entry("v2", "echo ok")],
        };
        assert!(validate(&config).is_empty());
    }

    #[test]
    fn into_allowlist_preserves_entries() {
        let config = VerifiersConfig {
            verifier: vec![entry("v1", "echo ok")],
        };
        let allowlist = config.into_allowlist();
        assert!(allowlist.get("v1").is_some());
    }

    #[test]
    fn parses_toml_table_array() {
        let toml_str = r#"
            [[verifier]]
            id = "lint"
            verifier_type = "lint"
            command_template = "cargo clippy"
            required_capabilities = ["exec"]
            declared_independent = true
            priority = 10
            path_globs = ["**/*.rs"]
        "#;
        let config: VerifiersConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.verifier.len(), 1);
        assert_eq!(config.verifier[0].id, "lint");
    }
}
