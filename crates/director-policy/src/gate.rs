use crate::{Decision, MoodProfile};
use director_core::VerifierResult;

/// One verifier's contribution to a commit decision.
#[derive(Debug, Clone, Copy)]
pub struct VerifierOutcome {
    /// The attestation's result.
    pub result: VerifierResult,
    /// The attestation's confidence, in `[0, 1]`.
    pub confidence: f64,
    /// Whether this verifier is mandatory for commit (from the plan, not a
    /// property of the verifier itself: the same verifier may be optional in
    /// one plan and mandatory in another).
    pub mandatory: bool,
}

/// Evaluates the commit gate (spec §4.6 "committing"): "all mandatory
/// verifiers must pass; `inconclusive` blocks when mood strictness requires;
/// `fail` blocks unconditionally."
///
/// An empty `outcomes` list (a verifier plan that selected nothing) is
/// permitted exactly when the mood does not require blocking on
/// `inconclusive` — this reproduces the documented boundary behavior that
/// CALM permits a zero-verifier commit while SKEPTICAL refuses one.
#[must_use]
pub fn evaluate_commit(profile: &MoodProfile, outcomes: &[VerifierOutcome]) -> Decision {
    if outcomes.is_empty() {
        return if profile.verifier_strictness.blocks_on_inconclusive {
            Decision::deny("no verifiers ran and this mood requires verification before commit")
        } else {
            Decision::allow()
        };
    }

    for outcome in outcomes.iter().filter(|o| o.mandatory) {
        match outcome.result {
            VerifierResult::Fail => {
                return Decision::deny("a mandatory verifier failed");
            }
            VerifierResult::Flaky => {
                return Decision::deny("a mandatory verifier is still flaky");
            }
            VerifierResult::Inconclusive => {
                if !profile.verifier_strictness.permits_inconclusive(outcome.confidence) {
                    return Decision::deny(
                        "a mandatory verifier was inconclusive below this mood's confidence threshold",
                    );
                }
            }
            VerifierResult::Pass => {}
        }
    }

    Decision::allow()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::default_profiles;
    use director_core::Mood;

    fn outcome(result: VerifierResult, confidence: f64, mandatory: bool) -> VerifierOutcome {
        VerifierOutcome {
            result,
            confidence,
            mandatory,
        }
    }

    #[test]
    fn calm_permits_zero_verifier_commit() {
        let profiles = default_profiles();
        let decision = evaluate_commit(&profiles[&Mood::Calm], &[]);
        assert!(decision.allowed);
    }

    #[test]
    fn skeptical_refuses_zero_verifier_commit() {
        let profiles = default_profiles();
        let decision = evaluate_commit(&profiles[&Mood::Skeptical], &[]);
        assert!(!decision.allowed);
    }

    #[test]
    fn mandatory_fail_blocks_unconditionally_even_in_calm() {
        let profiles = default_profiles();
        let outcomes = [outcome(VerifierResult::Fail, 1.0, true)];
        let decision = evaluate_commit(&profiles[&Mood::Calm], &outcomes);
        assert!(!decision.allowed);
    }

    #[test]
    fn optional_fail_does_not_block() {
        let profiles = default_profiles();
        let outcomes = [
            outcome(VerifierResult::Pass, 1.0, true),
            outcome(VerifierResult::Fail, 1.0, false),
        ];
        let decision = evaluate_commit(&profiles[&Mood::Calm], &outcomes);
        assert!(decision.allowed);
    }

    #[test]
    fn skeptical_blocks_low_confidence_inconclusive_but_allows_high_confidence() {
        let profiles = default_profiles();
        let low = [outcome(VerifierResult::Inconclusive, 0.5, true)];
        assert!(!evaluate_commit(&profiles[&Mood::Skeptical], &low).allowed);

        let high = [outcome(VerifierResult::Inconclusive, 0.95, true)];
        assert!(evaluate_commit(&profiles[&Mood::Skeptical], &high).allowed);
    }

    #[test]
    fn paranoid_blocks_inconclusive_at_any_confidence() {
        let profiles = default_profiles();
        let outcomes = [outcome(VerifierResult::Inconclusive, 0.999, true)];
        assert!(!evaluate_commit(&profiles[&Mood::Paranoid], &outcomes).allowed);
    }

    #[test]
    fn all_mandatory_pass_allows_commit() {
        let profiles = default_profiles();
        let outcomes = [
            outcome(VerifierResult::Pass, 1.0, true),
            outcome(VerifierResult::Pass, 1.0, true),
        ];
        assert!(evaluate_commit(&profiles[&Mood::Skeptical], &outcomes).allowed);
    }
}
