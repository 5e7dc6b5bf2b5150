#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Configuration loading and validation for the Director control plane:
//! `director.toml` (namespace, storage paths, budget defaults),
//! `moods.toml` (capability profile overrides per mood), and
//! `verifiers.toml` (the static verifier allowlist, spec §6.3).
//!
//! Typed structs loaded via `toml::from_str`, a `validate` pass returning
//! structured diagnostics instead of panicking, and environment overrides
//! layered on top.

mod director_toml;
mod moods_toml;
mod verifiers_toml;

pub use director_toml::{DirectorConfig, StoragePaths};
pub use moods_toml::MoodsConfig;
pub use verifiers_toml::VerifiersConfig;

use std::path::Path;

/// Errors that can occur loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file was not found.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },
    /// The file could not be parsed as valid TOML.
    #[error("failed to parse {file}: {reason}")]
    ParseError {
        /// Which of the three config files failed to parse.
        file: &'static str,
        /// Human-readable parse error detail.
        reason: String,
    },
    /// Semantic validation failed (one or more problems).
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },
}

/// The three static configuration documents loaded at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// `director.toml`: namespace, storage paths, budget defaults.
    pub director: DirectorConfig,
    /// `moods.toml`: capability profile overrides per mood.
    pub moods: MoodsConfig,
    /// `verifiers.toml`: the static verifier allowlist.
    pub verifiers: VerifiersConfig,
}

/// Loads `director.toml` from `path`, or returns [`DirectorConfig::default()`]
/// if `path` is `None`.
///
/// # Errors
/// Returns [`ConfigError::FileNotFound`] if `path` is `Some` and missing, or
/// [`ConfigError::ParseError`] if the contents are not valid TOML.
pub fn load_director_config(path: Option<&Path>) -> Result<DirectorConfig, ConfigError> {
    match path {
        Some(p) => {
            let content = read_file(p)?;
            toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                file: "director.toml",
                reason: e.to_string(),
            })
        }
        None => Ok(DirectorConfig::default()),
    }
}

/// Loads `moods.toml` from `path`, or returns [`MoodsConfig::default()`]
/// (no overrides, `director-policy::default_profiles()` governs every mood)
/// if `path` is `None`.
///
/// # Errors
/// Returns [`ConfigError::FileNotFound`] if `path` is `Some` and missing, or
/// [`ConfigError::ParseError`] if the contents are not valid TOML.
pub fn load_moods_config(path: Option<&Path>) -> Result<MoodsConfig, ConfigError> {
    match path {
        Some(p) => {
            let content = read_file(p)?;
            toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                file: "moods.toml",
                reason: e.to_string(),
            })
        }
        None => Ok(MoodsConfig::default()),
    }
}

/// Loads `verifiers.toml` from `path`.
///
/// # Errors
/// Returns [`ConfigError::FileNotFound`] if `path` is missing, or
/// [`ConfigError::ParseError`] if the contents are not valid TOML.
pub fn load_verifiers_config(path: &Path) -> Result<VerifiersConfig, ConfigError> {
    let content = read_file(path)?;
    toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        file: "verifiers.toml",
        reason: e.to_string(),
    })
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.display().to_string(),
    })
}

/// Validates the full configuration set (spec §6.5 exit code `2`, `6`):
/// every mood override declares a complete profile, and the verifier
/// allowlist is non-empty and internally consistent.
///
/// # Errors
/// Returns [`ConfigError::ValidationError`] naming every problem found.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();
    errors.extend(director_toml::validate(&config.director));
    errors.extend(moods_toml::validate(&config.moods));
    errors.extend(verifiers_toml::validate(&config.verifiers));

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError { reasons: errors })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_none_returns_defaults() {
        let director = load_director_config(None).unwrap();
        assert_eq!(director.namespace, director_core::NAMESPACE);
        let moods = load_moods_config(None).unwrap();
        assert!(moods.overrides.is_empty());
    }

    #[test]
    fn load_missing_file_gives_file_not_found() {
        let err = load_director_config(Some(Path::new("/nonexistent/director.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn load_director_config_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("director.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "namespace = \"choiros\"").unwrap();
        let cfg = load_director_config(Some(&path)).unwrap();
        assert_eq!(cfg.namespace, "choiros");
    }

    #[test]
    fn validate_rejects_empty_verifier_allowlist() {
        let config = Config {
            director: DirectorConfig::default(),
            moods: MoodsConfig::default(),
            verifiers: VerifiersConfig::default(),
        };
        let err = validate(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }
}
