//! Structured verifier reports (spec §4.4): raw verifier output never flows
//! back to the run as free-form text, only this bounded, typed shape does.

use director_core::{sha256_hex, VerifierResult};
use director_sandbox::ExecOutcome;
use serde::{Deserialize, Serialize};

const MAX_SUMMARY_BYTES: usize = 2_000;
const MAX_NEXT_ACTIONS: usize = 3;

/// The "green thread" boundary product: everything the run orchestrator is
/// allowed to see about a verifier's execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifierReport {
    /// Pass/fail/flaky/inconclusive outcome.
    pub result: VerifierResult,
    /// Normalized failure signatures, not raw stack traces.
    pub failure_signatures: Vec<String>,
    /// Bounded-length human summary.
    pub summary: String,
    /// At most three suggested follow-ups.
    pub next_actions: Vec<String>,
    /// Confidence in `[0, 1]` that `result` reflects ground truth.
    pub confidence: f64,
}

impl VerifierReport {
    fn bounded(
        result: VerifierResult,
        failure_signatures: Vec<String>,
        summary: String,
        mut next_actions: Vec<String>,
        confidence: f64,
    ) -> Self {
        next_actions.truncate(MAX_NEXT_ACTIONS);
        let mut summary = summary;
        summary.truncate(MAX_SUMMARY_BYTES);
        Self {
            result,
            failure_signatures,
            summary,
            next_actions,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Exit code convention a verifier command is expected to honor: `0`
    /// passes, `2` means the verifier itself could not reach a stable
    /// verdict (flaky), anything else fails.
    #[must_use]
    pub fn classify_exit_code(exit_code: i32) -> VerifierResult {
        match exit_code {
            0 => VerifierResult::Pass,
            2 => VerifierResult::Flaky,
            _ => VerifierResult::Fail,
        }
    }

    /// Builds a report from a completed sandbox execution's exit code.
    #[must_use]
    pub fn from_exec_outcome(verifier_id: &str, outcome: &ExecOutcome) -> Self {
        match Self::classify_exit_code(outcome.exit_code) {
            VerifierResult::Pass => Self::bounded(
                VerifierResult::Pass,
                Vec::new(),
                format!("{verifier_id} passed"),
                Vec::new(),
                1.0,
            ),
            VerifierResult::Flaky => Self::bounded(
                VerifierResult::Flaky,
                vec!["ambiguous-exit-code".to_string()],
                format!("{verifier_id} reported an ambiguous result"),
                vec!["re-run after a clean sandbox restore".to_string()],
                0.5,
            ),
            _ => {
                let signature = sha256_hex(outcome.stderr_ref.as_bytes())[..16].to_string();
                Self::bounded(
                    VerifierResult::Fail,
                    vec![signature],
                    format!("{verifier_id} exited with code {}", outcome.exit_code),
                    vec![format!("inspect artifact {}", outcome.stderr_ref)],
                    1.0,
                )
            }
        }
    }

    /// Builds a report for a verifier whose two attempts disagreed (spec
    /// §4.4 flakiness policy: a second flaky outcome becomes inconclusive).
    #[must_use]
    pub fn flaky(verifier_id: &str, first: &ExecOutcome, second: &ExecOutcome) -> Self {
        Self::bounded(
            VerifierResult::Flaky,
            vec![sha256_hex(
                format!("{}:{}", first.exit_code, second.exit_code).as_bytes(),
            )[..16]
                .to_string()],
            format!("{verifier_id} disagreed across two clean-sandbox attempts"),
            vec!["re-run after investigating non-determinism".to_string()],
            0.5,
        )
    }

    /// Builds a report for a verifier that crashed or could not be executed
    /// at all. Crashes do not fail the run by themselves (spec §4.4).
    #[must_use]
    pub fn crashed(verifier_id: &str, signature: &str) -> Self {
        Self::bounded(
            VerifierResult::Inconclusive,
            vec![signature.to_string()],
            format!("{verifier_id} crashed: {signature}"),
            vec!["re-run once the crash cause is understood".to_string()],
            0.0,
        )
    }

    /// Builds a report for a second consecutive flaky outcome, which
    /// downgrades to inconclusive rather than retrying indefinitely.
    #[must_use]
    pub fn inconclusive_after_repeated_flakiness(verifier_id: &str) -> Self {
        Self::bounded(
            VerifierResult::Inconclusive,
            vec!["repeated-flakiness".to_string()],
            format!("{verifier_id} remained flaky after one clean retry"),
            vec!["open a hyperthesis entry for the non-determinism".to_string()],
            0.3,
        )
    }
}
