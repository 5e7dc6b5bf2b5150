//! The run orchestrator (spec §4.6): owns the run lifecycle, issues
//! capability leases, gates commits, and drives the other components. Owns
//! the event log, projection, capability registry, policy profiles,
//! sandbox provider, and verifier runner.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use director_capability::{LeaseRegistry, LeaseRequest, EXECUTION_WRITE_CLASS, WRITE_CLASS};
use director_core::{DirectorError, Event, EventPayload, EventSource, Mood, RunStatus};
use director_eventlog::EventLog;
use director_mood::{note_status_payload, select_mood, MoodContext, MoodSignals};
use director_policy::{evaluate_commit, Decision, MoodProfile, VerifierAllowlist, VerifierOutcome};
use director_projection::Projector;
use director_sandbox::{Egress, Patch, Sandbox as SandboxProvider, SandboxPolicy};
use director_verifier::VerifierRunner;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::budget::{BudgetStatus, BudgetTracker};
use crate::cancel::{run_with_grace, CancellableRun, CancellationReason, VERIFIER_KILL_GRACE};

/// Per-run state the orchestrator keeps outside the projection: the
/// projection only knows what events say happened, not live handles like a
/// budget tracker or cancellation token.
struct ActiveRun {
    work_item_id: Uuid,
    mood: Mood,
    sandbox_id: Uuid,
    checkpoint_ref: String,
    budgets: BudgetTracker,
    cancel: CancellableRun,
    verifier_plan_id: Option<Uuid>,
    last_diff_hash: String,
    lease_ids: Vec<Uuid>,
}

/// The Director: the run orchestrator tying every other component together.
pub struct Director {
    log: Arc<dyn EventLog>,
    projector: Arc<Projector>,
    leases: Arc<LeaseRegistry>,
    profiles: HashMap<Mood, MoodProfile>,
    allowlist: VerifierAllowlist,
    allowlist_version: String,
    sandbox: Arc<dyn SandboxProvider>,
    verifier: VerifierRunner,
    active: RwLock<HashMap<Uuid, ActiveRun>>,
}

impl Director {
    /// Builds a Director over the given components. `allowlist_version`
    /// feeds `director-verifier`'s `plan_id`/`inputs_hash` derivation so a
    /// reloaded `verifiers.toml` changes the selected plan deterministically.
    #[must_use]
    pub fn new(
        log: Arc<dyn EventLog>,
        projector: Arc<Projector>,
        leases: Arc<LeaseRegistry>,
        profiles: HashMap<Mood, MoodProfile>,
        allowlist: VerifierAllowlist,
        allowlist_version: impl Into<String>,
        sandbox: Arc<dyn SandboxProvider>,
        verifier: VerifierRunner,
    ) -> Self {
        Self {
            log,
            projector,
            leases,
            profiles,
            allowlist,
            allowlist_version: allowlist_version.into(),
            sandbox,
            verifier,
            active: RwLock::new(HashMap::new()),
        }
    }

    fn profile_for(&self, mood: Mood) -> Result<&MoodProfile, DirectorError> {
        self.profiles
            .get(&mood)
            .ok_or_else(|| DirectorError::ContractViolation(format!("no profile configured for mood {mood}")))
    }

    async fn append(&self, event: Event) -> Result<u64, DirectorError> {
        let seq = self.log.append(event).await?;
        self.projector.apply_next().await?;
        Ok(seq)
    }

    /// `plan`: binds to exactly one work item, selects a mood, allocates a
    /// sandbox under that mood's policy, checkpoints before any write, and
    /// emits `run_start`. Returns the new run's id (the event's own id,
    /// mirroring how the projection derives `run_id` from `run.start`).
    ///
    /// # Errors
    /// Returns [`DirectorError::ContractViolation`] if `work_item_id` is
    /// unknown or no profile is configured for the selected mood;
    /// [`DirectorError::SandboxUnavailable`] if sandbox allocation fails.
    pub async fn plan(
        &self,
        work_item_id: Uuid,
        user_id: impl Into<String>,
        context: MoodContext,
        signals: MoodSignals,
    ) -> Result<Uuid, DirectorError> {
        let user_id = user_id.into();
        self.projector.apply_next().await?;
        let snapshot = self.projector.snapshot().await;
        if !snapshot.tables.work_items.contains_key(&work_item_id) {
            return Err(DirectorError::ContractViolation(format!("unknown work item {work_item_id}")));
        }

        let (mood, guard_id) = select_mood(context, signals);
        let profile = self.profile_for(mood)?;
        let policy = sandbox_policy_for(profile);

        let sandbox_id = self.sandbox.create(Uuid::new_v4(), policy).await?;
        let checkpoint_ref = self.sandbox.checkpoint(sandbox_id, Uuid::new_v4()).await?;

        let now = Utc::now();
        let run_event = Event::new(
            Uuid::new_v4(),
            now,
            user_id.clone(),
            EventSource::Agent,
            EventPayload::RunStart { work_item_id, mood: mood.to_string(), sandbox_id },
        );
        let run_id = run_event.id;
        self.append(run_event).await?;

        let status_event = Event::new(
            Uuid::new_v4(),
            now,
            user_id,
            EventSource::Agent,
            note_status_payload(Some(run_id), None, mood, guard_id),
        );
        self.append(status_event).await?;

        let budgets = BudgetTracker::new(profile.budget_caps);
        budgets.start_timer();
        self.active.write().await.insert(
            run_id,
            ActiveRun {
                work_item_id,
                mood,
                sandbox_id,
                checkpoint_ref,
                budgets,
                cancel: CancellableRun::new(),
                verifier_plan_id: None,
                last_diff_hash: String::new(),
                lease_ids: Vec::new(),
            },
        );
        info!(%run_id, %work_item_id, %mood, "run planned");
        Ok(run_id)
    }

    /// `executing`: grants an execution-phase write lease scoped to `scope`
    /// and applies `patch`, emitting `receipt.patch`. This lease uses
    /// [`EXECUTION_WRITE_CLASS`], not [`WRITE_CLASS`], so multiple patches
    /// within a run — or concurrent runs — are never serialized against
    /// each other here; only the fresh lease [`Director::commit`] grants is
    /// serialized. Stops (returning [`DirectorError::BudgetExhausted`]) if
    /// the patch pushes `diff_bytes` over budget.
    ///
    /// # Errors
    /// Returns [`DirectorError::CapabilityDenied`] if no run `run_id` is
    /// active; propagates sandbox and budget errors.
    pub async fn apply_patch(
        &self,
        run_id: Uuid,
        user_id: impl Into<String>,
        scope: Vec<String>,
        patch: Patch,
    ) -> Result<String, DirectorError> {
        let user_id = user_id.into();
        let patch_bytes: u64 = patch
            .iter()
            .map(|change| match change {
                director_sandbox::FileChange::Write { contents, .. } => contents.len() as u64,
                director_sandbox::FileChange::Delete { .. } => 0,
                director_sandbox::FileChange::Move { .. } => 0,
            })
            .sum();

        let (sandbox_id, mood, ttl_ms) = {
            let active = self.active.read().await;
            let run = require_active(&active, run_id)?;
            (run.sandbox_id, run.mood, self.profile_for(run.mood)?.budget_caps.time_ms)
        };

        let seq = self.log.last_seq().await;
        let lease = self
            .leases
            .grant(
                LeaseRequest {
                    run_id,
                    user_id: user_id.clone(),
                    mood,
                    syscall_class: EXECUTION_WRITE_CLASS.to_string(),
                    scope,
                    ttl_ms,
                    budget: None,
                    constraints: Default::default(),
                },
                seq,
                Utc::now().timestamp_millis(),
            )
            .await?;

        let diff_hash = self.sandbox.write_files(sandbox_id, Uuid::new_v4(), &patch).await?;

        let receipt = Event::new(
            Uuid::new_v4(),
            Utc::now(),
            user_id,
            EventSource::Agent,
            EventPayload::ReceiptPatch { lease_id: lease.lease_id, diff_hash: diff_hash.clone() },
        );
        self.append(receipt).await?;

        let mut active = self.active.write().await;
        let run = require_active_mut(&mut active, run_id)?;
        run.budgets.record_diff_bytes(patch_bytes);
        run.budgets.record_iteration();
        run.last_diff_hash = diff_hash.clone();
        run.lease_ids.push(lease.lease_id);

        if let BudgetStatus::Exceeded(violation) = run.budgets.check() {
            let dimension = violation.dimension().to_string();
            drop(active);
            self.timeout(run_id, dimension).await?;
            return Err(DirectorError::BudgetExhausted { dimension: violation.dimension().to_string() });
        }

        Ok(diff_hash)
    }

    /// `verifying`: selects a deterministic verifier plan for `touched_paths`
    /// and `risk_tier`, executes it, and appends one `receipt.verifier` per
    /// result in plan order. Returns the outcomes for the caller to pass to
    /// [`Director::commit`].
    ///
    /// # Errors
    /// Propagates plan selection and verifier execution errors; returns
    /// [`DirectorError::Cancelled`] if the run's cancellation grace period
    /// expires mid-run.
    pub async fn request_verify(
        &self,
        run_id: Uuid,
        user_id: impl Into<String>,
        touched_paths: Vec<String>,
    ) -> Result<Vec<VerifierOutcome>, DirectorError> {
        let user_id = user_id.into();
        let (sandbox_id, mood, target_atom_hash, token) = {
            let active = self.active.read().await;
            let run = require_active(&active, run_id)?;
            (run.sandbox_id, run.mood, run.last_diff_hash.clone(), run.cancel.token())
        };

        self.projector.apply_next().await?;
        let snapshot = self.projector.snapshot().await;
        let work_item_id = {
            let active = self.active.read().await;
            require_active(&active, run_id)?.work_item_id
        };
        let work_item = snapshot
            .tables
            .work_items
            .get(&work_item_id)
            .ok_or_else(|| DirectorError::ContractViolation(format!("run {run_id} references unknown work item")))?
            .clone();

        let plan = director_verifier::select_plan(
            mood,
            &touched_paths,
            work_item.risk_tier,
            &self.allowlist,
            &self.allowlist_version,
        )?;

        let runs = run_with_grace(
            &token,
            VERIFIER_KILL_GRACE,
            self.verifier.run_plan(sandbox_id, &target_atom_hash, &plan, &self.allowlist),
        )
        .await?;

        let mut outcomes = Vec::with_capacity(runs.len());
        for run in &runs {
            let event = Event::new(
                Uuid::new_v4(),
                Utc::now(),
                user_id.clone(),
                EventSource::Agent,
                EventPayload::ReceiptVerifier {
                    plan_id: plan.plan_id,
                    verifier_id: run.verifier_id.clone(),
                    result: run.report.result,
                },
            );
            self.append(event).await?;
            outcomes.push(VerifierOutcome {
                result: run.report.result,
                confidence: run.report.confidence,
                mandatory: work_item.required_verifiers.contains(&run.verifier_id),
            });
        }

        let mut active = self.active.write().await;
        let active_run = require_active_mut(&mut active, run_id)?;
        active_run.verifier_plan_id = Some(plan.plan_id);
        Ok(outcomes)
    }

    /// `committing`: evaluates the commit gate against `outcomes`. On
    /// allow, grants a fresh WRITE lease, emits `receipt.commit`, and
    /// transitions the run to a terminal, committed state (leases revoked,
    /// sandbox destroyed). On deny, discards the run (spec §4.6: "a commit
    /// requires a fresh capability lease ... leases consumed during
    /// execution do not carry over").
    ///
    /// # Errors
    /// Returns [`DirectorError::PolicyRefused`] if the gate denies; the run
    /// is discarded either way before this returns.
    pub async fn commit(
        &self,
        run_id: Uuid,
        user_id: impl Into<String>,
        outcomes: &[VerifierOutcome],
    ) -> Result<Decision, DirectorError> {
        let user_id = user_id.into();
        let (mood, verifier_plan_id, diff_hash) = {
            let active = self.active.read().await;
            let run = require_active(&active, run_id)?;
            (
                run.mood,
                run.verifier_plan_id.ok_or_else(|| {
                    DirectorError::ContractViolation(format!("run {run_id} has no verifier plan to commit against"))
                })?,
                run.last_diff_hash.clone(),
            )
        };
        let profile = self.profile_for(mood)?;
        let decision = evaluate_commit(profile, outcomes);

        if decision.is_denied() {
            self.discard(run_id, CancellationReason::PolicyRefused).await?;
            return Ok(decision);
        }

        let seq = self.log.last_seq().await;
        let lease = self
            .leases
            .grant(
                LeaseRequest {
                    run_id,
                    user_id: user_id.clone(),
                    mood,
                    syscall_class: WRITE_CLASS.to_string(),
                    scope: vec!["**".into()],
                    ttl_ms: 5_000,
                    budget: None,
                    constraints: Default::default(),
                },
                seq,
                Utc::now().timestamp_millis(),
            )
            .await?;

        let event = Event::new(
            Uuid::new_v4(),
            Utc::now(),
            user_id,
            EventSource::Agent,
            EventPayload::ReceiptCommit { run_id, diff_hash, verifier_plan_id },
        );
        self.append(event).await?;
        self.leases.revoke(lease.lease_id).await;
        self.leases.revoke_all_for_run(run_id).await;

        let sandbox_id = {
            let active = self.active.read().await;
            require_active(&active, run_id)?.sandbox_id
        };
        self.sandbox.destroy(sandbox_id, Uuid::new_v4()).await?;
        self.active.write().await.remove(&run_id);

        info!(%run_id, "run committed");
        Ok(decision)
    }

    /// Discards a run: restores the sandbox to its pre-run checkpoint,
    /// revokes every outstanding lease, destroys the sandbox, and signals
    /// the run's cancellation handle with `reason`.
    ///
    /// # Errors
    /// Propagates sandbox restore/destroy failures; the run is still
    /// removed from the active set and leases are still revoked even if a
    /// sandbox call fails, since a discarded run must not linger.
    pub async fn discard(&self, run_id: Uuid, reason: CancellationReason) -> Result<(), DirectorError> {
        let (sandbox_id, checkpoint_ref) = {
            let active = self.active.read().await;
            let run = require_active(&active, run_id)?;
            run.cancel.cancel(reason);
            (run.sandbox_id, run.checkpoint_ref.clone())
        };

        let restore_result = self.sandbox.restore(sandbox_id, Uuid::new_v4(), &checkpoint_ref).await;
        self.leases.revoke_all_for_run(run_id).await;
        let destroy_result = self.sandbox.destroy(sandbox_id, Uuid::new_v4()).await;
        self.active.write().await.remove(&run_id);

        warn!(%run_id, reason = reason.description(), "run discarded");
        restore_result?;
        destroy_result?;
        Ok(())
    }

    /// Transitions a run to `discarded` on budget exhaustion, emitting
    /// `receipt.timeout` with the dimension that was crossed (spec §4.6
    /// "Timeouts").
    ///
    /// # Errors
    /// Propagates append and sandbox failures from the underlying discard.
    pub async fn timeout(&self, run_id: Uuid, dimension: impl Into<String>) -> Result<(), DirectorError> {
        let dimension = dimension.into();
        let event = Event::new(
            Uuid::new_v4(),
            Utc::now(),
            "system",
            EventSource::System,
            EventPayload::ReceiptTimeout { run_id, budget: dimension },
        );
        self.append(event).await?;
        self.discard(run_id, CancellationReason::BudgetExhausted).await
    }

    /// Signals cooperative cancellation for `run_id`; the next safe point
    /// (between patches or verifier steps) observes it and discards.
    ///
    /// # Errors
    /// Returns [`DirectorError::ContractViolation`] if `run_id` is not
    /// active.
    pub async fn cancel(&self, run_id: Uuid, reason: CancellationReason) -> Result<(), DirectorError> {
        let active = self.active.read().await;
        let run = require_active(&active, run_id)?;
        run.cancel.cancel(reason);
        Ok(())
    }

    /// `split-on-infeasible` (spec §4.6): emits `spec_change_request` and
    /// `split_request`, marking the parent work item `split` via the
    /// projection, then discards the run that could not satisfy it.
    ///
    /// # Errors
    /// Propagates append and discard failures.
    pub async fn split(
        &self,
        run_id: Uuid,
        user_id: impl Into<String>,
        reason: impl Into<String>,
        children: Vec<String>,
    ) -> Result<(), DirectorError> {
        let user_id = user_id.into();
        let work_item_id = {
            let active = self.active.read().await;
            require_active(&active, run_id)?.work_item_id
        };

        let change_event = Event::new(
            Uuid::new_v4(),
            Utc::now(),
            user_id.clone(),
            EventSource::Agent,
            EventPayload::SpecChangeRequest { work_item_id, reason: reason.into() },
        );
        self.append(change_event).await?;

        let split_event = Event::new(
            Uuid::new_v4(),
            Utc::now(),
            user_id,
            EventSource::Agent,
            EventPayload::SplitRequest { work_item_id, children },
        );
        self.append(split_event).await?;

        self.discard(run_id, CancellationReason::PolicyRefused).await
    }

    /// The run's current lifecycle status, if it is still active in this
    /// orchestrator instance (a committed or discarded run is no longer
    /// tracked here; consult the projection for its final status).
    pub async fn status(&self, run_id: Uuid) -> Option<RunStatus> {
        let snapshot = self.projector.snapshot().await;
        snapshot.tables.runs.get(&run_id).map(|r| r.status)
    }

}

fn require_active(active: &HashMap<Uuid, ActiveRun>, run_id: Uuid) -> Result<&ActiveRun, DirectorError> {
    active
        .get(&run_id)
        .ok_or_else(|| DirectorError::ContractViolation(format!("run {run_id} is not active")))
}

fn require_active_mut(active: &mut HashMap<Uuid, ActiveRun>, run_id: Uuid) -> Result<&mut ActiveRun, DirectorError> {
    active
        .get_mut(&run_id)
        .ok_or_else(|| DirectorError::ContractViolation(format!("run {run_id} is not active")))
}

/// Derives a sandbox policy from a mood profile: network egress follows the
/// mood's trust level, writes are scoped to the mood's data scope (or
/// denied outright under a `deny_write` stop rule), and wall-clock limits
/// mirror the mood's own time budget.
fn sandbox_policy_for(profile: &MoodProfile) -> SandboxPolicy {
    let egress = match profile.mood {
        Mood::Calm | Mood::Bold => Egress::Full,
        _ => Egress::Off,
    };
    let deny_write = profile.stop_rules.iter().any(|rule| rule == "deny_write");
    SandboxPolicy {
        egress,
        allowed_read: profile.data_scope.clone(),
        allowed_write: if deny_write { Vec::new() } else { profile.data_scope.clone() },
        max_cpu_ms: profile.budget_caps.time_ms,
        max_memory_bytes: 512 * 1024 * 1024,
        max_wall_ms: profile.budget_caps.time_ms,
        exec_permitted: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use director_artifact::MemoryArtifactStore;
    use director_core::{RiskTier, WorkItem, WorkItemStatus};
    use director_eventlog::MemoryEventLog;
    use director_mood::MoodContext;
    use director_policy::{default_profiles, VerifierAllowlist, VerifierAllowlistEntry};
    use director_sandbox::MockSandbox;
    use director_verifier::{MemoryAttestationStore, VerifierRunner};

    async fn seeded_director(allowlist: VerifierAllowlist) -> (Director, Uuid) {
        let log: Arc<dyn EventLog> = Arc::new(MemoryEventLog::default());
        let projector = Arc::new(Projector::new(log.clone()));
        let work_item_id = Uuid::new_v4();
        projector
            .seed_work_item(WorkItem {
                work_item_id,
                description: "seed".into(),
                acceptance_criteria: "passes v1".into(),
                required_verifiers: vec!["v1".into()],
                risk_tier: RiskTier::Medium,
                dependencies: vec![],
                status: WorkItemStatus::Open,
            })
            .await;

        let sandbox: Arc<dyn SandboxProvider> = Arc::new(MockSandbox::default());
        let artifacts = Arc::new(MemoryArtifactStore::default());
        let attestations = Arc::new(MemoryAttestationStore::default());
        let verifier = VerifierRunner::new(sandbox.clone(), artifacts, attestations);

        let director = Director::new(
            log,
            projector,
            Arc::new(LeaseRegistry::new()),
            default_profiles(),
            allowlist,
            "v1",
            sandbox,
            verifier,
        );
        (director, work_item_id)
    }

    fn entry(id: &str) -> VerifierAllowlistEntry {
        VerifierAllowlistEntry {
            id: id.into(),
            verifier_type: "lint".into(),
            command_template: "echo t_ok".into(),
            required_capabilities: vec!["exec".into()],
            declared_independent: false,
            priority: 1,
            path_globs: vec!["**".into()],
        }
    }

    #[tokio::test]
    async fn plan_rejects_unknown_work_item() {
        let (director, _) = seeded_director(VerifierAllowlist::new(vec![entry("v1")])).await;
        let err = director.plan(Uuid::new_v4(), "u1", MoodContext::default(), MoodSignals::default()).await;
        assert!(matches!(err, Err(DirectorError::ContractViolation(_))));
    }

    #[tokio::test]
    async fn cancel_of_unknown_run_is_rejected() {
        let (director, _) = seeded_director(VerifierAllowlist::new(vec![entry("v1")])).await;
        let err = director.cancel(Uuid::new_v4(), CancellationReason::UserRequested).await;
        assert!(err.is_err());
    }

    #[test]
    fn sandbox_policy_denies_network_outside_calm_and_bold() {
        let profiles = default_profiles();
        let policy = sandbox_policy_for(&profiles[&Mood::Paranoid]);
        assert_eq!(policy.egress, Egress::Off);
        let policy = sandbox_policy_for(&profiles[&Mood::Calm]);
        assert_eq!(policy.egress, Egress::Full);
    }

    #[test]
    fn sandbox_policy_denies_writes_under_deny_write_stop_rule() {
        let profiles = default_profiles();
        let policy = sandbox_policy_for(&profiles[&Mood::Petty]);
        assert!(policy.allowed_write.is_empty());
    }

    #[tokio::test]
    async fn full_happy_path_commits() {
        let (director, work_item_id) =
            seeded_director(VerifierAllowlist::new(vec![entry("v1")])).await;

        let run_id = director
            .plan(work_item_id, "u1", MoodContext::default(), MoodSignals::default())
            .await
            .unwrap();
        assert_eq!(director.status(run_id).await, Some(RunStatus::Executing));

        let patch = vec![director_sandbox::FileChange::Write {
            path: "src/lib.rs".into(),
            contents: b"fn main() {}".to_vec(),
        }];
        director.apply_patch(run_id, "u1", vec!["**".into()], patch).await.unwrap();

        let outcomes = director.request_verify(run_id, "u1", vec!["src/lib.rs".into()]).await.unwrap();
        assert!(!outcomes.is_empty());

        let decision = director.commit(run_id, "u1", &outcomes).await.unwrap();
        assert!(decision.allowed);
        assert_eq!(director.status(run_id).await, Some(RunStatus::Committed));
    }

    #[tokio::test]
    async fn apply_patch_does_not_serialize_against_prior_patches_in_the_same_run() {
        let (director, work_item_id) =
            seeded_director(VerifierAllowlist::new(vec![entry("v1")])).await;
        let run_id = director
            .plan(work_item_id, "u1", MoodContext::default(), MoodSignals::default())
            .await
            .unwrap();

        let patch = |path: &str| {
            vec![director_sandbox::FileChange::Write {
                path: path.into(),
                contents: b"fn main() {}".to_vec(),
            }]
        };
        director.apply_patch(run_id, "u1", vec!["**".into()], patch("a.rs")).await.unwrap();
        // A second patch in the same run must not be denied by the
        // single-outstanding-writer rule reserved for commit-time leases.
        director.apply_patch(run_id, "u1", vec!["**".into()], patch("b.rs")).await.unwrap();
    }

    #[tokio::test]
    async fn apply_patch_over_budget_times_out_and_discards() {
        let (director, work_item_id) =
            seeded_director(VerifierAllowlist::new(vec![entry("v1")])).await;
        let run_id = director
            .plan(work_item_id, "u1", MoodContext::default(), MoodSignals::default())
            .await
            .unwrap();

        let huge_patch = vec![director_sandbox::FileChange::Write {
            path: "src/big.bin".into(),
            contents: vec![0u8; 50_000_000],
        }];
        let err = director.apply_patch(run_id, "u1", vec!["**".into()], huge_patch).await;
        assert!(matches!(err, Err(DirectorError::BudgetExhausted { .. })));
        assert_eq!(director.status(run_id).await, Some(RunStatus::Discarded));
    }

    #[tokio::test]
    async fn cancel_then_discard_removes_active_run() {
        let (director, work_item_id) =
            seeded_director(VerifierAllowlist::new(vec![entry("v1")])).await;
        let run_id = director
            .plan(work_item_id, "u1", MoodContext::default(), MoodSignals::default())
            .await
            .unwrap();

        director.cancel(run_id, CancellationReason::UserRequested).await.unwrap();
        director.discard(run_id, CancellationReason::UserRequested).await.unwrap();
        assert_eq!(director.status(run_id).await, Some(RunStatus::Discarded));
        assert!(director.cancel(run_id, CancellationReason::UserRequested).await.is_err());
    }
}
