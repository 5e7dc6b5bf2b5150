#![deny(unsafe_code)]
#![warn(missing_docs)]
//! The Mood Engine (spec §4.5): a deterministic strategy table over
//! [`MoodSignals`] that selects the active [`Mood`] and records the guard
//! that fired.
//!
//! `select_mood` is a pure function: given the same `(context, signals,
//! config_version)` it always returns the same `(Mood, guard_id)` pair
//! (P7). All of the signal derivation — turning a projection snapshot and
//! an unread event tail into booleans and counters — is the caller's job;
//! this crate only encodes the guard table itself, so the table can be
//! tested without a projection store in scope.

use director_core::{EventPayload, Mood};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The number of consecutive non-monotonic progress signals that escalates
/// CALM to SKEPTICAL (spec §4.5 "on N consecutive non-monotonic progress
/// signals"). `N` is left open by the guard description; three was chosen
/// to match the three-strikes regression scenario in §8.4.
pub const NON_MONOTONIC_ESCALATION_THRESHOLD: u32 = 3;

/// Discrete signals a caller derives from the projection snapshot and the
/// unread event tail, consumed by [`select_mood`]. Grouped as plain
/// booleans/counters rather than raw projection types so the guard table
/// stays a pure, easily-tested function of small inputs (the "struct +
/// strategy table" translation pattern in spec §9).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct MoodSignals {
    /// The work item has no acceptance demo recorded.
    pub missing_acceptance_demo: bool,
    /// The work item has produced no conjectures yet.
    pub no_conjectures: bool,
    /// Count of consecutive verifier failures immediately preceding this
    /// selection, across the work item's run history.
    pub consecutive_verifier_regressions: u32,
    /// The next action would cross a privilege boundary: publish, promote,
    /// or export.
    pub crossing_privilege_boundary: bool,
    /// A human preference is missing that would materially change the next
    /// privileged action, favoring DEFERENTIAL over PARANOID when both a
    /// privilege boundary and a missing preference are present.
    pub missing_preference_material: bool,
    /// This selection follows a process restart.
    pub process_restart: bool,
    /// The restart produced a valid, consistent projection cursor.
    pub restart_projection_consistent: bool,
    /// Ambiguity in the current step blocks forward motion.
    pub ambiguity_blocks_forward_motion: bool,
    /// A hyperthesis of high severity was just recorded, or the run just
    /// touched a security-sensitive surface.
    pub high_severity_hyperthesis_or_security_touch: bool,
    /// Mitigations for a prior high-severity concern have installed and the
    /// relevant verifiers now pass.
    pub mitigations_installed_and_verifiers_pass: bool,
    /// A reward-hacking or prompt-injection signature was detected.
    pub reward_hack_signature: bool,
}

/// Input to [`select_mood`]: the mood history needed to resolve guards that
/// reference "previous mood" (CONTRITE's reactive exit) as well as the
/// current mood, if any.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MoodContext {
    /// The mood currently active, `None` for an initial (entry) selection.
    pub current: Option<Mood>,
    /// The last non-CONTRITE mood active before entering CONTRITE, used to
    /// resolve "CONTRITE → previous mood on consistent projection".
    pub previous_stable: Option<Mood>,
}

/// Identifies which guard produced a mood selection, carried on the
/// `note.status` event's `guard_id` field so replays can distinguish guards
/// that happen to select the same mood.
pub type GuardId = &'static str;

/// Selects the active mood given the current context and derived signals.
/// Pure and total: every input combination yields a `(Mood, GuardId)` pair.
///
/// Entry guards apply when `context.current` is `None`; reactive guards
/// apply otherwise. Safety-overriding reactive guards (reward-hack
/// detection, restart handling, missing-preference deferral) are checked
/// before mood-specific reactive guards, since they apply from "Any" mood.
#[must_use]
pub fn select_mood(context: MoodContext, signals: MoodSignals) -> (Mood, GuardId) {
    match context.current {
        None => select_entry_mood(signals),
        Some(current) => select_reactive_mood(current, context, signals),
    }
}

fn select_entry_mood(signals: MoodSignals) -> (Mood, GuardId) {
    if signals.process_restart && !signals.restart_projection_consistent {
        return (Mood::Contrite, "entry.contrite.invalid_cursor");
    }
    if signals.missing_acceptance_demo || signals.no_conjectures {
        return (Mood::Curious, "entry.curious.missing_acceptance_or_conjectures");
    }
    if signals.consecutive_verifier_regressions >= NON_MONOTONIC_ESCALATION_THRESHOLD {
        return (Mood::Skeptical, "entry.skeptical.repeated_regressions");
    }
    if signals.crossing_privilege_boundary {
        return if signals.missing_preference_material {
            (Mood::Deferential, "entry.deferential.privilege_boundary")
        } else {
            (Mood::Paranoid, "entry.paranoid.privilege_boundary")
        };
    }
    (Mood::Calm, "entry.calm.default")
}

fn select_reactive_mood(current: Mood, context: MoodContext, signals: MoodSignals) -> (Mood, GuardId) {
    if signals.reward_hack_signature {
        return (Mood::Petty, "reactive.any.petty.reward_hack_detected");
    }
    if signals.process_restart {
        return (Mood::Contrite, "reactive.any.contrite.process_restart");
    }
    if signals.missing_preference_material {
        return (Mood::Deferential, "reactive.any.deferential.missing_preference");
    }

    match current {
        Mood::Calm if signals.ambiguity_blocks_forward_motion => {
            (Mood::Curious, "reactive.calm.curious.ambiguity")
        }
        Mood::Calm if signals.consecutive_verifier_regressions >= NON_MONOTONIC_ESCALATION_THRESHOLD => {
            (Mood::Skeptical, "reactive.calm.skeptical.non_monotonic_progress")
        }
        Mood::Skeptical if signals.high_severity_hyperthesis_or_security_touch => {
            (Mood::Paranoid, "reactive.skeptical.paranoid.high_severity_surface")
        }
        Mood::Paranoid if signals.mitigations_installed_and_verifiers_pass => {
            (Mood::Bold, "reactive.paranoid.bold.mitigations_verified")
        }
        Mood::Contrite if signals.restart_projection_consistent => (
            context.previous_stable.unwrap_or(Mood::Calm),
            "reactive.contrite.previous.consistent_projection",
        ),
        Mood::Contrite => (Mood::Curious, "reactive.contrite.curious.inconsistent_projection"),
        other => (other, "reactive.stable.no_guard_fired"),
    }
}

/// Builds the `note.status` payload for a mood transition (spec §4.5:
/// "A mood change is emitted as `note.status` with the from/to pair and
/// guard identifier; replays reproduce the sequence").
#[must_use]
pub fn note_status_payload(run_id: Option<Uuid>, from: Option<Mood>, to: Mood, guard_id: GuardId) -> EventPayload {
    EventPayload::NoteStatus {
        run_id,
        from: from.map(|m| m.to_string()),
        to: to.to_string(),
        guard_id: guard_id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_prefers_contrite_on_invalid_cursor() {
        let signals = MoodSignals {
            process_restart: true,
            restart_projection_consistent: false,
            ..Default::default()
        };
        assert_eq!(
            select_mood(MoodContext::default(), signals),
            (Mood::Contrite, "entry.contrite.invalid_cursor")
        );
    }

    #[test]
    fn entry_defaults_to_calm() {
        assert_eq!(
            select_mood(MoodContext::default(), MoodSignals::default()),
            (Mood::Calm, "entry.calm.default")
        );
    }

    #[test]
    fn entry_picks_curious_on_missing_conjectures() {
        let signals = MoodSignals {
            no_conjectures: true,
            ..Default::default()
        };
        let (mood, _) = select_mood(MoodContext::default(), signals);
        assert_eq!(mood, Mood::Curious);
    }

    #[test]
    fn entry_privilege_boundary_prefers_paranoid_without_missing_preference() {
        let signals = MoodSignals {
            crossing_privilege_boundary: true,
            ..Default::default()
        };
        let (mood, _) = select_mood(MoodContext::default(), signals);
        assert_eq!(mood, Mood::Paranoid);
    }

    #[test]
    fn entry_privilege_boundary_prefers_deferential_with_missing_preference() {
        let signals = MoodSignals {
            crossing_privilege_boundary: true,
            missing_preference_material: true,
            ..Default::default()
        };
        let (mood, _) = select_mood(MoodContext::default(), signals);
        assert_eq!(mood, Mood::Deferential);
    }

    #[test]
    fn reactive_calm_escalates_to_skeptical_on_three_regressions() {
        let context = MoodContext {
            current: Some(Mood::Calm),
            previous_stable: None,
        };
        let signals = MoodSignals {
            consecutive_verifier_regressions: 3,
            ..Default::default()
        };
        let (mood, _) = select_mood(context, signals);
        assert_eq!(mood, Mood::Skeptical);
    }

    #[test]
    fn reward_hack_signature_overrides_any_current_mood() {
        for mood in Mood::ALL {
            let context = MoodContext {
                current: Some(mood),
                previous_stable: None,
            };
            let signals = MoodSignals {
                reward_hack_signature: true,
                ..Default::default()
            };
            let (selected, _) = select_mood(context, signals);
            assert_eq!(selected, Mood::Petty);
        }
    }

    #[test]
    fn contrite_returns_to_previous_stable_mood_on_consistent_projection() {
        let context = MoodContext {
            current: Some(Mood::Contrite),
            previous_stable: Some(Mood::Bold),
        };
        let signals = MoodSignals {
            restart_projection_consistent: true,
            ..Default::default()
        };
        let (mood, _) = select_mood(context, signals);
        assert_eq!(mood, Mood::Bold);
    }

    #[test]
    fn contrite_falls_back_to_curious_on_inconsistent_projection() {
        let context = MoodContext {
            current: Some(Mood::Contrite),
            previous_stable: Some(Mood::Bold),
        };
        let signals = MoodSignals::default();
        let (mood, _) = select_mood(context, signals);
        assert_eq!(mood, Mood::Curious);
    }

    #[test]
    fn stable_mood_without_guard_does_not_change() {
        let context = MoodContext {
            current: Some(Mood::Bold),
            previous_stable: None,
        };
        let (mood, guard) = select_mood(context, MoodSignals::default());
        assert_eq!(mood, Mood::Bold);
        assert_eq!(guard, "reactive.stable.no_guard_fired");
    }

    #[test]
    fn note_status_payload_carries_guard_and_wire_mood_names() {
        let payload = note_status_payload(Some(Uuid::nil()), Some(Mood::Calm), Mood::Skeptical, "g1");
        match payload {
            EventPayload::NoteStatus { from, to, guard_id, .. } => {
                assert_eq!(from.as_deref(), Some("CALM"));
                assert_eq!(to, "SKEPTICAL");
                assert_eq!(guard_id, "g1");
            }
            _ => panic!("expected NoteStatus payload"),
        }
    }

    #[test]
    fn selection_is_pure_and_repeatable() {
        let context = MoodContext {
            current: Some(Mood::Skeptical),
            previous_stable: None,
        };
        let signals = MoodSignals {
            high_severity_hyperthesis_or_security_touch: true,
            ..Default::default()
        };
        let first = select_mood(context, signals);
        let second = select_mood(context, signals);
        assert_eq!(first, second);
    }
}
