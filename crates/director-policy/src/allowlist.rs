use director_core::DirectorError;
use globset::{Glob, GlobSetBuilder};
use serde::{Deserialize, Serialize};

/// One entry in the static verifier allowlist (spec §6.3): "`(id, type,
/// command_template, required_capabilities, declared_independent,
/// priority)`". The planner chooses from this set only — "no ad-hoc commands
/// may be executed as verifiers".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerifierAllowlistEntry {
    /// Stable identifier referenced by [`VerifierPlan::selected_verifiers`](director_core::VerifierPlan).
    pub id: String,
    /// Verifier category, e.g. `unit`, `lint`, `security_scan`.
    pub verifier_type: String,
    /// Shell-independent command template; argument substitution is the
    /// caller's (director-verifier's) concern, not this crate's.
    pub command_template: String,
    /// Capability syscall classes the verifier needs leased before it runs.
    pub required_capabilities: Vec<String>,
    /// Whether this verifier may run concurrently with other declared-independent verifiers.
    pub declared_independent: bool,
    /// Selection priority; higher runs first when the plan orders verifiers.
    pub priority: i32,
    /// Path globs mapping touched files to this verifier (spec §4.4 step 3:
    /// "Resolves verifier targets by `touched_paths -> verifier_globs`
    /// mapping"). A verifier with no globs applies to every touched path.
    pub path_globs: Vec<String>,
}

impl VerifierAllowlistEntry {
    /// Whether any of `touched_paths` falls under this verifier's path
    /// globs. An entry with no globs targets every touched path.
    #[must_use]
    pub fn targets_any(&self, touched_paths: &[String]) -> bool {
        if self.path_globs.is_empty() {
            return true;
        }
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.path_globs {
            if let Ok(glob) = Glob::new(pattern) {
                builder.add(glob);
            }
        }
        let Ok(set) = builder.build() else {
            return false;
        };
        touched_paths.iter().any(|p| set.is_match(p))
    }
}

/// The compiled allowlist loaded from `verifiers.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VerifierAllowlist {
    entries: Vec<VerifierAllowlistEntry>,
}

impl VerifierAllowlist {
    /// Builds an allowlist from entries, e.g. after parsing configuration.
    #[must_use]
    pub fn new(entries: Vec<VerifierAllowlistEntry>) -> Self {
        Self { entries }
    }

    /// `true` when the allowlist declares no verifiers at all; exit code `6`
    /// ("verifier allowlist missing") is raised by the caller in this case.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries, in configuration order.
    #[must_use]
    pub fn entries(&self) -> &[VerifierAllowlistEntry] {
        &self.entries
    }

    /// Looks up a single entry by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&VerifierAllowlistEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Validates that every id in `selected` names a configured entry.
    ///
    /// # Errors
    /// Returns [`DirectorError::ContractViolation`] naming the first unknown
    /// id, since a verifier plan referencing an unlisted command is a
    /// structural violation of §6.3, not a runtime failure.
    pub fn validate_plan(&self, selected: &[String]) -> Result<(), DirectorError> {
        for id in selected {
            if self.get(id).is_none() {
                return Err(DirectorError::ContractViolation(format!(
                    "verifier '{id}' is not in the allowlist"
                )));
            }
        }
        Ok(())
    }
}
