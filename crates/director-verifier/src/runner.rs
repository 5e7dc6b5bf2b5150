//! Isolated verifier execution (spec §4.4): each verifier runs in its own
//! "green thread" so raw stdout/stderr never flows back into the run's
//! control stream as free-form text, only the bounded [`VerifierReport`] does.

use std::collections::HashMap;
use std::sync::Arc;

use director_artifact::ArtifactStore;
use director_core::{sha256_hex, Attestation, DirectorError, VerifierPlan, VerifierResult};
use director_policy::{VerifierAllowlist, VerifierAllowlistEntry};
use director_sandbox::Sandbox;
use uuid::Uuid;

use crate::attestation::{build_attestation, AttestationStore};
use crate::report::VerifierReport;

/// The result of executing one verifier from a plan: its report plus the
/// content-addressed attestation derived from it.
#[derive(Debug, Clone)]
pub struct VerifierRun {
    /// Allowlist id of the verifier that ran.
    pub verifier_id: String,
    /// Structured, bounded report.
    pub report: VerifierReport,
    /// Durable attestation derived from the report.
    pub attestation: Attestation,
}

/// Executes verifier plans against a sandbox, storing raw output as
/// artifacts and durable outcomes as attestations.
#[derive(Clone)]
pub struct VerifierRunner {
    sandbox: Arc<dyn Sandbox>,
    artifacts: Arc<dyn ArtifactStore>,
    attestations: Arc<dyn AttestationStore>,
}

impl VerifierRunner {
    /// Builds a runner over the given sandbox, artifact, and attestation backends.
    #[must_use]
    pub fn new(
        sandbox: Arc<dyn Sandbox>,
        artifacts: Arc<dyn ArtifactStore>,
        attestations: Arc<dyn AttestationStore>,
    ) -> Self {
        Self { sandbox, artifacts, attestations }
    }

    /// Runs every verifier in `plan` against `sandbox_id`, in plan order.
    /// Verifiers `declared_independent` in a contiguous run execute
    /// concurrently; any other verifier runs alone before the next group
    /// starts. Results are always returned in plan order, regardless of
    /// completion order (spec §4.4: "attestations appended to the log in
    /// plan order regardless of completion order").
    ///
    /// # Errors
    /// Returns [`DirectorError::ContractViolation`] if `plan` references an
    /// id absent from `allowlist`.
    pub async fn run_plan(
        &self,
        sandbox_id: Uuid,
        target_atom_hash: &str,
        plan: &VerifierPlan,
        allowlist: &VerifierAllowlist,
    ) -> Result<Vec<VerifierRun>, DirectorError> {
        allowlist.validate_plan(&plan.selected_verifiers)?;

        let mut results: HashMap<String, VerifierRun> = HashMap::new();
        let mut cursor = 0;
        while cursor < plan.selected_verifiers.len() {
            let start = cursor;
            let entry_at = |i: usize| allowlist.get(&plan.selected_verifiers[i]).expect("validated above");
            let independent_group = entry_at(start).declared_independent;
            if independent_group {
                while cursor < plan.selected_verifiers.len() && entry_at(cursor).declared_independent {
                    cursor += 1;
                }
                let mut set = tokio::task::JoinSet::new();
                for id in &plan.selected_verifiers[start..cursor] {
                    let entry = allowlist.get(id).expect("validated above").clone();
                    let target_atom_hash = target_atom_hash.to_string();
                    let runner = self.clone();
                    set.spawn(async move { runner.run_one(sandbox_id, &entry, &target_atom_hash).await });
                }
                while let Some(joined) = set.join_next().await {
                    let run = joined.map_err(|e| DirectorError::ContractViolation(e.to_string()))??;
                    results.insert(run.verifier_id.clone(), run);
                }
            } else {
                cursor += 1;
                let entry = allowlist.get(&plan.selected_verifiers[start]).expect("validated above").clone();
                let run = self.run_one(sandbox_id, &entry, target_atom_hash).await?;
                results.insert(run.verifier_id.clone(), run);
            }
        }

        plan.selected_verifiers
            .iter()
            .map(|id| {
                results
                    .remove(id)
                    .ok_or_else(|| DirectorError::ContractViolation(format!("verifier '{id}' produced no result")))
            })
            .collect()
    }

    /// Runs a single verifier, including the flakiness retry policy: a
    /// `flaky` first result triggers exactly one clean-sandbox re-run; a
    /// second disagreement downgrades to `inconclusive`. A verifier that
    /// cannot even be executed is reported `inconclusive` with a crash
    /// signature and never fails the run by itself.
    async fn run_one(
        &self,
        sandbox_id: Uuid,
        entry: &VerifierAllowlistEntry,
        target_atom_hash: &str,
    ) -> Result<VerifierRun, DirectorError> {
        let operation_id = Uuid::new_v4();
        let report = match self.sandbox.exec(sandbox_id, operation_id, &entry.command_template).await {
            Err(e) => VerifierReport::crashed(&entry.id, &crash_signature(&e)),
            Ok(outcome) => {
                let first_report = VerifierReport::from_exec_outcome(&entry.id, &outcome);
                if first_report.result == VerifierResult::Flaky {
                    self.retry_after_flake(sandbox_id, entry).await?
                } else {
                    first_report
                }
            }
        };

        let artifact_bytes = serde_json::to_vec(&report).map_err(DirectorError::Serialization)?;
        let artifact_hash = self.artifacts.put(&artifact_bytes).await?;
        let report_hash = sha256_hex(&artifact_bytes);

        let attestation = build_attestation(
            target_atom_hash,
            &entry.verifier_type,
            &entry.command_template,
            "default",
            &artifact_hash,
            &report_hash,
            env!("CARGO_PKG_VERSION"),
            report.result,
            report.confidence,
        )?;
        self.attestations.put(attestation.clone()).await?;

        Ok(VerifierRun { verifier_id: entry.id.clone(), report, attestation })
    }

    /// One clean-sandbox retry after a flaky first outcome. Checkpoints
    /// before the retry so the restore target is the state the first
    /// attempt actually ran against, not whatever the verifier may have
    /// mutated.
    async fn retry_after_flake(
        &self,
        sandbox_id: Uuid,
        entry: &VerifierAllowlistEntry,
    ) -> Result<VerifierReport, DirectorError> {
        let checkpoint = self.sandbox.checkpoint(sandbox_id, Uuid::new_v4()).await?;
        self.sandbox.restore(sandbox_id, Uuid::new_v4(), &checkpoint).await?;
        match self.sandbox.exec(sandbox_id, Uuid::new_v4(), &entry.command_template).await {
            Err(e) => Ok(VerifierReport::crashed(&entry.id, &crash_signature(&e))),
            Ok(second) => match VerifierReport::classify_exit_code(second.exit_code) {
                VerifierResult::Flaky => Ok(VerifierReport::inconclusive_after_repeated_flakiness(&entry.id)),
                _ => Ok(VerifierReport::from_exec_outcome(&entry.id, &second)),
            },
        }
    }
}

fn crash_signature(error: &DirectorError) -> String {
    sha256_hex(error.to_string().as_bytes())[..16].to_string()
}
