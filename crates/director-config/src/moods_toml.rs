//! `moods.toml`: capability profile overrides per mood (spec §4.5). A mood
//! absent from this file keeps its `director-policy::default_profiles()`
//! definition; a mood present here replaces that profile wholesale (no
//! partial field merge, since a `MoodProfile` is only meaningful as a whole
//! set of allow/deny rules).

use director_core::Mood;
use director_policy::{default_profiles, MoodProfile};
use std::collections::{BTreeMap, HashMap};

/// Raw `moods.toml` contents: mood name (`SCREAMING_SNAKE_CASE`, matching
/// [`Mood::as_str`]) to its full capability profile.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct MoodsConfig {
    /// Profile overrides, keyed by mood name.
    #[serde(flatten, default)]
    pub overrides: BTreeMap<String, MoodProfile>,
}

impl MoodsConfig {
    /// Resolves the full profile table: `director-policy::default_profiles()`
    /// with every entry in `overrides` replacing its built-in counterpart.
    #[must_use]
    pub fn resolve(&self) -> HashMap<Mood, MoodProfile> {
        let mut profiles = default_profiles();
        for (name, profile) in &self.overrides {
            if let Some(mood) = parse_mood(name) {
                profiles.insert(mood, profile.clone());
            }
        }
        profiles
    }
}

fn parse_mood(s: &str) -> Option<Mood> {
    Mood::ALL.into_iter().find(|m| m.as_str() == s)
}

pub(crate) fn validate(config: &MoodsConfig) -> Vec<String> {
    let mut errors = Vec::new();
    for (name, profile) in &config.overrides {
        let Some(mood) = parse_mood(name) else {
            errors.push(format!("moods.toml: unknown mood '{name}'"));
            continue;
        };
        if mood != profile.mood {
            errors.push(format!(
                "moods.toml: profile under key '{name}' declares mood {} instead",
                profile.mood
            ));
        }
        if profile.budget_caps.tokens == 0 {
            errors.push(format!("moods.toml: mood '{name}' has a zero token budget"));
        }
        if profile.data_scope.is_empty() && profile.tool_allowlist.is_empty() {
            errors.push(format!(
                "moods.toml: mood '{name}' grants neither data scope nor tool access; it can never act"
            ));
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use director_policy::VerifierStrictness;

    fn profile(mood: Mood) -> MoodProfile {
        MoodProfile {
            mood,
            tool_allowlist: vec!["*".into()],
            data_scope: vec!["**".into()],
            model_tier: "standard".into(),
            verifier_strictness: VerifierStrictness {
                blocks_on_inconclusive: false,
                inconclusive_confidence_threshold: None,
            },
            budget_caps: director_core::RunBudgets {
                tokens: 1000,
                time_ms: 1000,
                iterations: 5,
                diff_bytes: 1000,
            },
            stop_rules: vec![],
        }
    }

    #[test]
    fn empty_overrides_resolve_to_defaults() {
        let config = MoodsConfig::default();
        let resolved = config.resolve();
        assert_eq!(resolved.len(), 8);
    }

    #[test]
    fn override_replaces_built_in_profile() {
        let mut config = MoodsConfig::default();
        config.overrides.insert("CALM".into(), profile(Mood::Calm));
        let resolved = config.resolve();
        assert_eq!(resolved[&Mood::Calm].budget_caps.tokens, 1000);
    }

    #[test]
    fn unknown_mood_name_is_rejected() {
        let mut config = MoodsConfig::default();
        config.overrides.insert("FURIOUS".into(), profile(Mood::Calm));
        assert!(!validate(&config).is_empty());
    }

    #[test]
    fn mismatched_mood_field_is_rejected() {
        let mut config = MoodsConfig::default();
        config.overrides.insert("CALM".into(), profile(Mood::Bold));
        assert!(!validate(&config).is_empty());
    }

    #[test]
    fn zero_budget_is_rejected() {
        let mut config = MoodsConfig::default();
        let mut p = profile(Mood::Calm);
        p.budget_caps.tokens = 0;
        config.overrides.insert("CALM".into(), p);
        assert!(!validate(&config).is_empty());
    }
}
