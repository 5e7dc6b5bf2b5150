use crate::Decision;
use director_core::{Mood, RunBudgets};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How a mood's commit gate treats an `inconclusive` verifier result (spec
/// §7: "the orchestrator decides whether `inconclusive` blocks commit
/// according to mood strictness").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerifierStrictness {
    /// If `false`, `inconclusive` never blocks commit for this mood.
    pub blocks_on_inconclusive: bool,
    /// When `blocks_on_inconclusive` is `true`, an `inconclusive` attestation
    /// whose confidence exceeds this threshold is treated as non-blocking.
    /// `None` means no confidence escape hatch: `inconclusive` always blocks.
    pub inconclusive_confidence_threshold: Option<f64>,
}

impl VerifierStrictness {
    /// Whether an `inconclusive` result with the given `confidence` may
    /// proceed to commit under this strictness setting.
    #[must_use]
    pub fn permits_inconclusive(&self, confidence: f64) -> bool {
        if !self.blocks_on_inconclusive {
            return true;
        }
        self.inconclusive_confidence_threshold
            .is_some_and(|threshold| confidence > threshold)
    }
}

/// A mood's capability profile: "tool allowlist, data scope, model tier,
/// verifier strictness, budgets, stop rules" (spec §4.5).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MoodProfile {
    /// Mood this profile governs.
    pub mood: Mood,
    /// Tool name glob patterns a run in this mood may invoke.
    pub tool_allowlist: Vec<String>,
    /// Path glob patterns a run in this mood may read or write.
    pub data_scope: Vec<String>,
    /// Opaque model-tier label consumed by the caller's LLM client.
    pub model_tier: String,
    /// Commit-gating strictness for `inconclusive` verifier results.
    pub verifier_strictness: VerifierStrictness,
    /// Budget ceiling applied to runs entering this mood.
    pub budget_caps: RunBudgets,
    /// Named stop rules (e.g. `"await_preference"`) a run in this mood honors.
    pub stop_rules: Vec<String>,
}

impl MoodProfile {
    /// Compiles the tool allowlist and data scope globs for repeated checks.
    #[must_use]
    pub fn engine(&self) -> PolicyEngine {
        PolicyEngine::new(self)
    }
}

/// Compiled, reusable matcher for a single [`MoodProfile`]'s tool allowlist
/// and data scope, built on the same allow/deny-glob shape as other path
/// policy checks in this workspace, specialized to mood profiles.
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    tools: GlobSet,
    scope: GlobSet,
}

impl PolicyEngine {
    /// Compiles a [`MoodProfile`]'s glob lists. Malformed patterns are
    /// dropped rather than rejected: a misconfigured mood should fail closed
    /// (nothing matches, everything denied) rather than refuse to start.
    #[must_use]
    pub fn new(profile: &MoodProfile) -> Self {
        Self {
            tools: build_globset(&profile.tool_allowlist),
            scope: build_globset(&profile.data_scope),
        }
    }

    /// Checks whether `tool_name` is on the mood's tool allowlist.
    #[must_use]
    pub fn can_use_tool(&self, tool_name: &str) -> Decision {
        if self.tools.is_match(tool_name) {
            Decision::allow()
        } else {
            Decision::deny(format!("tool '{tool_name}' not in mood allowlist"))
        }
    }

    /// Checks whether `path` falls within the mood's data scope.
    #[must_use]
    pub fn can_access_path(&self, path: &str) -> Decision {
        if self.scope.is_match(path) {
            Decision::allow()
        } else {
            Decision::deny(format!("path '{path}' outside mood data scope"))
        }
    }
}

fn build_globset(patterns: &[String]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        if let Ok(glob) = Glob::new(pattern) {
            builder.add(glob);
        }
    }
    builder.build().unwrap_or_else(|_| GlobSetBuilder::new().build().unwrap())
}

fn lenient() -> VerifierStrictness {
    VerifierStrictness {
        blocks_on_inconclusive: false,
        inconclusive_confidence_threshold: None,
    }
}

fn strict_with_threshold(threshold: f64) -> VerifierStrictness {
    VerifierStrictness {
        blocks_on_inconclusive: true,
        inconclusive_confidence_threshold: Some(threshold),
    }
}

fn always_blocks() -> VerifierStrictness {
    VerifierStrictness {
        blocks_on_inconclusive: true,
        inconclusive_confidence_threshold: None,
    }
}

fn budgets(tokens: u64, time_ms: u64, iterations: u32, diff_bytes: u64) -> RunBudgets {
    RunBudgets {
        tokens,
        time_ms,
        iterations,
        diff_bytes,
    }
}

/// Built-in profiles used when `moods.toml` does not override a mood.
/// Tightened monotonically with perceived risk, per the entry/reactive
/// guards in spec §4.5.
#[must_use]
pub fn default_profiles() -> HashMap<Mood, MoodProfile> {
    let mut m = HashMap::new();
    m.insert(
        Mood::Calm,
        MoodProfile {
            mood: Mood::Calm,
            tool_allowlist: vec!["*".into()],
            data_scope: vec!["**".into()],
            model_tier: "standard".into(),
            verifier_strictness: lenient(),
            budget_caps: budgets(200_000, 600_000, 40, 2_000_000),
            stop_rules: vec![],
        },
    );
    m.insert(
        Mood::Curious,
        MoodProfile {
            mood: Mood::Curious,
            tool_allowlist: vec!["Read*".into(), "Grep*".into(), "Glob*".into(), "Tool*".into()],
            data_scope: vec!["**".into()],
            model_tier: "standard".into(),
            verifier_strictness: lenient(),
            budget_caps: budgets(150_000, 600_000, 40, 1_000_000),
            stop_rules: vec!["require_conjecture_before_write".into()],
        },
    );
    m.insert(
        Mood::Skeptical,
        MoodProfile {
            mood: Mood::Skeptical,
            tool_allowlist: vec!["Read*".into(), "Grep*".into(), "Write*".into(), "Test*".into()],
            data_scope: vec!["**".into()],
            model_tier: "standard".into(),
            verifier_strictness: strict_with_threshold(0.9),
            budget_caps: budgets(150_000, 600_000, 30, 1_000_000),
            stop_rules: vec!["require_verifier_pass_before_commit".into()],
        },
    );
    m.insert(
        Mood::Paranoid,
        MoodProfile {
            mood: Mood::Paranoid,
            tool_allowlist: vec!["Read*".into(), "Grep*".into()],
            data_scope: vec!["src/**".into(), "tests/**".into()],
            model_tier: "high".into(),
            verifier_strictness: always_blocks(),
            budget_caps: budgets(100_000, 300_000, 15, 200_000),
            stop_rules: vec![
                "deny_network".into(),
                "deny_publish".into(),
                "require_human_review".into(),
            ],
        },
    );
    m.insert(
        Mood::Bold,
        MoodProfile {
            mood: Mood::Bold,
            tool_allowlist: vec!["*".into()],
            data_scope: vec!["**".into()],
            model_tier: "standard".into(),
            verifier_strictness: lenient(),
            budget_caps: budgets(250_000, 900_000, 50, 3_000_000),
            stop_rules: vec![],
        },
    );
    m.insert(
        Mood::Contrite,
        MoodProfile {
            mood: Mood::Contrite,
            tool_allowlist: vec!["Read*".into(), "Grep*".into(), "Glob*".into()],
            data_scope: vec!["**".into()],
            model_tier: "standard".into(),
            verifier_strictness: always_blocks(),
            budget_caps: budgets(50_000, 180_000, 10, 50_000),
            stop_rules: vec!["require_clean_projection_before_write".into()],
        },
    );
    m.insert(
        Mood::Petty,
        MoodProfile {
            mood: Mood::Petty,
            tool_allowlist: vec!["Read*".into()],
            data_scope: vec!["**".into()],
            model_tier: "standard".into(),
            verifier_strictness: always_blocks(),
            budget_caps: budgets(20_000, 60_000, 5, 0),
            stop_rules: vec!["deny_write".into(), "deny_network".into(), "require_human_review".into()],
        },
    );
    m.insert(
        Mood::Deferential,
        MoodProfile {
            mood: Mood::Deferential,
            tool_allowlist: vec!["Read*".into(), "Grep*".into()],
            data_scope: vec!["**".into()],
            model_tier: "standard".into(),
            verifier_strictness: always_blocks(),
            budget_caps: budgets(30_000, 120_000, 5, 0),
            stop_rules: vec!["await_preference".into()],
        },
    );
    m
}
