//! Entity model from spec §3.1, independent of any storage engine.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// WorkItem
// ---------------------------------------------------------------------------

/// A single bounded objective; the unit of planning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WorkItem {
    /// Unique identifier.
    pub work_item_id: Uuid,
    /// Human-readable description of the objective.
    pub description: String,
    /// Acceptance criteria text (free-form; checked by verifiers, not parsed here).
    pub acceptance_criteria: String,
    /// Verifier IDs that must pass for a run against this item to commit.
    pub required_verifiers: Vec<String>,
    /// Declared risk tier, consulted by verifier plan selection.
    pub risk_tier: RiskTier,
    /// Work items that must be `done` before this one may start.
    pub dependencies: Vec<Uuid>,
    /// Current lifecycle status.
    pub status: WorkItemStatus,
}

/// Declared risk tier for a work item, consulted by verifier plan selection (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    /// Low-risk, localized change.
    Low,
    /// Touches shared surfaces.
    Medium,
    /// Touches security-relevant or externally visible surfaces.
    High,
}

/// `WorkItem.status` lifecycle (spec §3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WorkItemStatus {
    /// Created, no run bound yet.
    Open,
    /// A run is currently bound and executing against this item.
    Running,
    /// A run committed against this item.
    Done,
    /// Split into child work items because it was unsatisfiable in one run.
    Split,
    /// Exhausted all attempts without committing.
    Failed,
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// One bounded execution episode bound to exactly one [`WorkItem`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Run {
    /// Unique identifier.
    pub run_id: Uuid,
    /// The work item this run is bound to.
    pub work_item_id: Uuid,
    /// The mood active for this run.
    pub mood: Mood,
    /// Resource budgets for this run.
    pub budgets: RunBudgets,
    /// Current lifecycle status.
    pub status: RunStatus,
    /// The sandbox allocated to this run, once planned.
    pub sandbox_id: Option<Uuid>,
    /// The verifier plan selected for this run, once requested.
    pub verifier_plan_id: Option<Uuid>,
}

/// Resource budgets a run must respect (spec §3.1, §4.6, §5).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RunBudgets {
    /// Maximum LLM tokens consumable by this run.
    pub tokens: u64,
    /// Maximum wall-clock milliseconds.
    pub time_ms: u64,
    /// Maximum orchestrator iterations (plan/execute/verify cycles).
    pub iterations: u32,
    /// Maximum cumulative diff size in bytes.
    pub diff_bytes: u64,
}

/// `Run.status` state machine (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Created, not yet planned.
    Pending,
    /// Planned and applying patches inside the sandbox.
    Executing,
    /// Verifier plan requested and/or running.
    Verifying,
    /// Commit gate is being evaluated.
    Committing,
    /// Terminal: committed durably.
    Committed,
    /// Terminal: discarded, no durable mutation.
    Discarded,
}

impl RunStatus {
    /// Returns `true` if this status is terminal (I3: exactly one of committed/discarded).
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Committed | Self::Discarded)
    }

    /// Returns the set of statuses that are valid successors of `self`, per
    /// the state machine diagram in spec §4.6.
    #[must_use]
    pub fn valid_transitions(&self) -> &'static [RunStatus] {
        match self {
            Self::Pending => &[Self::Executing, Self::Discarded],
            Self::Executing => &[Self::Verifying, Self::Discarded],
            Self::Verifying => &[Self::Committing, Self::Discarded],
            Self::Committing => &[Self::Committed, Self::Discarded],
            Self::Committed | Self::Discarded => &[],
        }
    }

    /// Returns `true` if transitioning from `self` to `next` is valid.
    #[must_use]
    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        self.valid_transitions().contains(&next)
    }
}

// ---------------------------------------------------------------------------
// Mood
// ---------------------------------------------------------------------------

/// The eight mood states (spec §4.5, v0 set). The capability profile for each
/// is data, loaded by `director-config`/`director-mood` — this enum is only
/// the discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mood {
    /// Default steady-state mood.
    Calm,
    /// Entered when acceptance criteria or conjectures are missing.
    Curious,
    /// Entered on repeated verifier regressions.
    Skeptical,
    /// Entered when crossing a privilege boundary or on high-severity findings.
    Paranoid,
    /// Entered after mitigations install and verifiers pass in PARANOID.
    Bold,
    /// Entered on process restart without a clean handoff.
    Contrite,
    /// Entered on a detected reward-hack or injection signature.
    Petty,
    /// Entered when a missing preference would materially change the next action.
    Deferential,
}

impl Mood {
    /// All moods, in a stable declaration order (used for config validation and tests).
    pub const ALL: [Mood; 8] = [
        Mood::Calm,
        Mood::Curious,
        Mood::Skeptical,
        Mood::Paranoid,
        Mood::Bold,
        Mood::Contrite,
        Mood::Petty,
        Mood::Deferential,
    ];

    /// The `SCREAMING_SNAKE_CASE` wire name, matching the `note.status` event payload.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Calm => "CALM",
            Self::Curious => "CURIOUS",
            Self::Skeptical => "SKEPTICAL",
            Self::Paranoid => "PARANOID",
            Self::Bold => "BOLD",
            Self::Contrite => "CONTRITE",
            Self::Petty => "PETTY",
            Self::Deferential => "DEFERENTIAL",
        }
    }
}

impl std::fmt::Display for Mood {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// CapabilityLease
// ---------------------------------------------------------------------------

/// A time- and scope-bounded grant for a specific syscall class (spec §3.1, I6).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CapabilityLease {
    /// Unique identifier.
    pub lease_id: Uuid,
    /// The run this lease was granted to.
    pub run_id: Uuid,
    /// The user on whose behalf the run acts.
    pub user_id: String,
    /// The mood active when this lease was granted.
    pub mood: Mood,
    /// The syscall class this lease authorizes (e.g. `write`, `net`, `exec`).
    pub syscall_class: String,
    /// The scope this lease is restricted to (e.g. a path glob or host allowlist).
    pub scope: Vec<String>,
    /// Time-to-live in milliseconds from issuance.
    pub ttl_ms: u64,
    /// Budget consumable under this lease, if the syscall class is metered.
    pub budget: Option<u64>,
    /// Free-form constraints beyond scope (e.g. max request size).
    pub constraints: BTreeMap<String, String>,
    /// The event-log sequence number at issuance, used to express expiry/revocation
    /// as a pure function of the log (I8).
    pub issued_seq: u64,
    /// Wall-clock milliseconds since the Unix epoch at issuance, used to
    /// evaluate `ttl_ms` expiry. Not part of any projected table — owned
    /// live by the lease registry, not rebuilt from the log.
    pub issued_at_ms: i64,
    /// Whether this lease has been explicitly revoked.
    pub revoked: bool,
}

// ---------------------------------------------------------------------------
// VerifierPlan / Attestation
// ---------------------------------------------------------------------------

/// A deterministically selected set of verifier targets (spec §3.1, §4.4).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VerifierPlan {
    /// Unique, deterministically derived identifier.
    pub plan_id: Uuid,
    /// Verifier IDs selected from the allowlist, in execution order.
    pub selected_verifiers: Vec<String>,
    /// Hash of the planner inputs `(mood, touched_paths, risk_tier, allowlist_version)`.
    pub inputs_hash: String,
}

/// Outcome of a single verifier execution (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum VerifierResult {
    /// The verifier passed.
    Pass,
    /// The verifier failed deterministically.
    Fail,
    /// The verifier gave an inconsistent result across retries.
    Flaky,
    /// The result could not be determined (e.g. verifier crash).
    Inconclusive,
}

/// A content-addressed verifier outcome binding (spec §3.1). The only object
/// that may promote an [`Atom`] to `PROMOTED` (I4).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Attestation {
    /// Unique identifier.
    pub attestation_id: Uuid,
    /// Hash of the atom this attestation targets.
    pub target_atom_hash: String,
    /// The kind of verifier that produced this attestation (e.g. `unit`, `lint`).
    pub verifier_type: String,
    /// Outcome of the verification.
    pub result: AttestationResult,
    /// Content hash of the raw artifact (stdout/stderr) this attestation is based on.
    pub artifact_hash: String,
    /// Version string of the verifier binary/config used.
    pub verifier_version: String,
    /// Confidence in `[0, 1]` that `result` reflects ground truth.
    pub confidence: f64,
}

/// Mirrors [`VerifierResult`] at the attestation layer; kept distinct because
/// an attestation's result is the durable, content-addressed record while
/// `VerifierResult` is the transient in-flight outcome.
pub type AttestationResult = VerifierResult;

// ---------------------------------------------------------------------------
// Receipt
// ---------------------------------------------------------------------------

/// An observability record emitted on every capability use and lifecycle
/// transition (spec §3.1, I6, P6). Distinct from a wire `receipt.*` event:
/// a `Receipt` is the materialized projection row; the event is what produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Receipt {
    /// Unique identifier.
    pub receipt_id: Uuid,
    /// The kind of receipt.
    pub kind: ReceiptKind,
    /// Identifiers referenced by this receipt (lease IDs, artifact hashes, run IDs).
    pub references: Vec<String>,
    /// Milliseconds since the Unix epoch when this receipt was recorded.
    pub timestamp_ms: i64,
}

/// The receipt kinds from the canonical event contract (spec §6.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptKind {
    /// `receipt.read`
    Read,
    /// `receipt.patch`
    Patch,
    /// `receipt.verifier`
    Verifier,
    /// `receipt.net`
    Net,
    /// `receipt.db`
    Db,
    /// `receipt.export`
    Export,
    /// `receipt.publish`
    Publish,
    /// `receipt.commit`
    Commit,
    /// `receipt.ahdb.delta`
    AhdbDelta,
    /// `receipt.projection.rebuild`
    ProjectionRebuild,
    /// `receipt.timeout`
    Timeout,
    /// `receipt.policy.decision.tokens`
    PolicyDecisionTokens,
    /// `receipt.security.attestations`
    SecurityAttestations,
    /// `receipt.context.footprint`
    ContextFootprint,
    /// `receipt.hyperthesis.delta`
    HyperthesisDelta,
}

// ---------------------------------------------------------------------------
// Atom
// ---------------------------------------------------------------------------

/// A content-addressed unit of reasoning (spec §3.1, GLOSSARY).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Atom {
    /// Content hash; also the arena key (§9 design note).
    pub hash: String,
    /// The kind of atom.
    pub kind: AtomKind,
    /// Current lifecycle state.
    pub state: AtomState,
}

/// `Atom.kind` (spec §3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AtomKind {
    /// Raw ingested material.
    Source,
    /// A derived excerpt.
    Extract,
    /// An assertion derived from extracts.
    Claim,
    /// A link between two atoms.
    Binding,
    /// A tentative explanation.
    Conjecture,
    /// An explicit disclosure of what cannot be ruled out.
    Hyperthesis,
    /// A combination of multiple lower atoms.
    Synthesis,
}

/// `Atom.state` lifecycle (spec §3.1, I4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AtomState {
    /// Newly created, no attestation yet.
    Untrusted,
    /// Flagged and held back from promotion pending review.
    Quarantined,
    /// At least one attestation is in flight.
    PromotionPending,
    /// At least one passing attestation exists; eligible for ASSERT reference (I4).
    Promoted,
    /// Withdrawn; no longer eligible for reference.
    Retracted,
}

impl AtomState {
    /// Returns `true` if an ASSERT entry may reference an atom in this state (I4).
    #[must_use]
    pub fn is_assert_eligible(&self) -> bool {
        matches!(self, Self::Promoted)
    }
}

// ---------------------------------------------------------------------------
// Sandbox
// ---------------------------------------------------------------------------

/// An isolated execution environment (spec §3.1, §4.3).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Sandbox {
    /// Unique identifier.
    pub sandbox_id: Uuid,
    /// Local or remote backend.
    pub kind: SandboxKind,
    /// Current lifecycle state.
    pub state: SandboxState,
    /// Checkpoint references captured so far, most recent last.
    pub checkpoint_refs: Vec<String>,
}

/// `Sandbox.kind` (spec §3.1, §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SandboxKind {
    /// In-process or local-machine backend.
    Local,
    /// Out-of-process backend reached over a remote adapter.
    Remote,
}

/// `Sandbox.state` lifecycle (spec §3.1, §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SandboxState {
    /// Allocated, not yet ready for exec.
    Created,
    /// Ready to accept exec calls.
    Ready,
    /// Currently executing a command.
    Running,
    /// A checkpoint has been captured and no mutation has occurred since.
    Checkpointed,
    /// Resources released; irreversible.
    Destroyed,
}

// ---------------------------------------------------------------------------
// AHDBState
// ---------------------------------------------------------------------------

/// The projected control-state vector (spec §3.1, GLOSSARY). Never
/// authoritative by itself — always rebuildable from the event log (I8).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AhdbState {
    /// Assertions: claims backed by at least one promoted atom (I4).
    pub assert: Vec<String>,
    /// Open hypotheses awaiting verification.
    pub hypothesize: Vec<String>,
    /// Active drives (in-flight objectives).
    pub drive: Vec<String>,
    /// Beliefs carried across runs.
    pub believe: Vec<String>,
    /// Hyperthesis atom hashes (explicit unknowns with mitigations).
    pub hypertheses: Vec<String>,
    /// Conjecture atom hashes.
    pub conjectures: Vec<String>,
    /// The last event sequence number folded into this state.
    pub last_event_id: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_status_terminal_states_have_no_successors() {
        assert!(RunStatus::Committed.valid_transitions().is_empty());
        assert!(RunStatus::Discarded.valid_transitions().is_empty());
        assert!(RunStatus::Committed.is_terminal());
        assert!(RunStatus::Discarded.is_terminal());
    }

    #[test]
    fn run_status_forbids_skipping_verification() {
        assert!(!RunStatus::Executing.can_transition_to(RunStatus::Committed));
        assert!(RunStatus::Executing.can_transition_to(RunStatus::Verifying));
    }

    #[test]
    fn every_state_can_reach_discarded_or_is_terminal() {
        for s in [
            RunStatus::Pending,
            RunStatus::Executing,
            RunStatus::Verifying,
            RunStatus::Committing,
        ] {
            assert!(s.can_transition_to(RunStatus::Discarded), "{s:?}");
        }
    }

    #[test]
    fn only_promoted_atoms_are_assert_eligible() {
        assert!(AtomState::Promoted.is_assert_eligible());
        for s in [
            AtomState::Untrusted,
            AtomState::Quarantined,
            AtomState::PromotionPending,
            AtomState::Retracted,
        ] {
            assert!(!s.is_assert_eligible(), "{s:?}");
        }
    }

    #[test]
    fn mood_wire_names_are_screaming_snake_case() {
        for m in Mood::ALL {
            assert_eq!(m.as_str(), m.as_str().to_uppercase());
        }
    }
}
