//! The canonical event contract (spec §3.1 Event, §6.1 wire format, §4.2 normalization).

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Who produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    /// A human acting through a client.
    User,
    /// The orchestrator or a component acting on behalf of a run.
    Agent,
    /// The Director or infrastructure itself (e.g. retention, poison markers).
    System,
}

impl EventSource {
    /// The lower-case wire representation used in the subject string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Agent => "agent",
            Self::System => "system",
        }
    }
}

/// An immutable, append-only record (spec entity: Event).
///
/// `event_type` always holds the **canonical** (normalized) form; the
/// original string, if normalization changed it, is preserved in `ext`
/// under the `raw_event_type` key so historical data is not lost (§4.2).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Event {
    /// Unique identifier; duplicate appends of the same id collapse (L1).
    pub id: Uuid,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
    /// The acting user's identifier.
    pub user_id: String,
    /// Who produced this event.
    pub source: EventSource,
    /// Canonical, lower-case, dot-delimited event type (I1).
    pub event_type: String,
    /// The structured, typed payload for this event type.
    pub payload: EventPayload,
    /// Forward-compatible extension fields, never interpreted by core logic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<BTreeMap<String, serde_json::Value>>,
}

impl Event {
    /// Convenience constructor for "now" events; stamps `timestamp_ms` from
    /// the caller-supplied clock reading so the crate stays free of
    /// wall-clock reads (kept out of library code for testability).
    #[must_use]
    pub fn new(
        id: Uuid,
        at: DateTime<Utc>,
        user_id: impl Into<String>,
        source: EventSource,
        payload: EventPayload,
    ) -> Self {
        Self {
            id,
            timestamp_ms: at.timestamp_millis(),
            user_id: user_id.into(),
            source,
            event_type: payload.canonical_type().to_string(),
            payload,
            ext: None,
        }
    }
}

/// Typed tagged union over the canonical event types (spec §6.1, §9 design note:
/// "dynamic typing / reflection -> typed tagged unions").
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    /// `file.write`
    FileWrite {
        /// Workspace-relative path written.
        path: String,
        /// Content hash of the resulting diff.
        diff_hash: String,
    },
    /// `file.delete`
    FileDelete {
        /// Workspace-relative path removed.
        path: String,
    },
    /// `file.move`
    FileMove {
        /// Source path.
        from: String,
        /// Destination path.
        to: String,
    },
    /// `tool.call`
    ToolCall {
        /// Tool identifier.
        tool: String,
        /// Hash of the call arguments (arguments themselves live in an artifact).
        args_hash: String,
    },
    /// `tool.result`
    ToolResult {
        /// Tool identifier this result corresponds to.
        tool: String,
        /// Whether the tool call succeeded.
        ok: bool,
    },
    /// `window.open` — opaque to the core; carried for UI rehydration only.
    WindowOpen {
        /// Opaque window identifier.
        window_id: String,
    },
    /// `window.close` — opaque to the core.
    WindowClose {
        /// Opaque window identifier.
        window_id: String,
    },
    /// `checkpoint`
    Checkpoint {
        /// Sandbox this checkpoint belongs to.
        sandbox_id: Uuid,
        /// Opaque checkpoint reference.
        checkpoint_ref: String,
    },
    /// `undo`
    Undo {
        /// The checkpoint being restored to.
        checkpoint_ref: String,
    },
    /// `message`
    Message {
        /// Free-text message content (never interpreted by control logic).
        text: String,
    },
    /// `note.observation`
    NoteObservation {
        /// Observation text.
        text: String,
    },
    /// `note.hypothesis`
    NoteHypothesis {
        /// What test or action would discriminate between explanations.
        text: String,
    },
    /// `note.hyperthesis`
    NoteHyperthesis {
        /// The explicit disclosure of what cannot be ruled out.
        text: String,
        /// A bound or mitigation, required alongside every hyperthesis.
        mitigation: String,
    },
    /// `note.conjecture`
    NoteConjecture {
        /// The conjecture text.
        text: String,
    },
    /// `note.status` — mood transitions (§4.5).
    NoteStatus {
        /// The run this mood transition applies to, if any (absent for
        /// deployment-wide mood selections made before a run exists).
        run_id: Option<Uuid>,
        /// Mood transitioned from, if any (absent on initial selection).
        from: Option<String>,
        /// Mood transitioned to.
        to: String,
        /// Identifier of the guard that fired.
        guard_id: String,
    },
    /// `note.request.help`
    NoteRequestHelp {
        /// What assistance is being requested.
        text: String,
    },
    /// `note.request.verify`
    NoteRequestVerify {
        /// The verifier plan being requested, if already selected.
        plan_id: Option<Uuid>,
    },
    /// `run.start` — emitted by the orchestrator's `plan` transition (§4.6, §8.4).
    RunStart {
        /// The work item this run is bound to.
        work_item_id: Uuid,
        /// The mood selected for this run.
        mood: String,
        /// The sandbox allocated for this run.
        sandbox_id: Uuid,
    },
    /// `receipt.read`
    ReceiptRead {
        /// Lease consumed for the read.
        lease_id: Uuid,
        /// Path read.
        path: String,
    },
    /// `receipt.patch`
    ReceiptPatch {
        /// Lease consumed for the write.
        lease_id: Uuid,
        /// Content hash of the applied diff.
        diff_hash: String,
    },
    /// `receipt.verifier`
    ReceiptVerifier {
        /// The verifier plan this result belongs to.
        plan_id: Uuid,
        /// The verifier that produced this result.
        verifier_id: String,
        /// Outcome of the verifier.
        result: super::VerifierResult,
    },
    /// `receipt.net`
    ReceiptNet {
        /// Lease consumed.
        lease_id: Uuid,
        /// Host contacted.
        host: String,
    },
    /// `receipt.db`
    ReceiptDb {
        /// Lease consumed.
        lease_id: Uuid,
        /// Operation performed.
        operation: String,
    },
    /// `receipt.export`
    ReceiptExport {
        /// Lease consumed.
        lease_id: Uuid,
        /// Artifact exported.
        artifact_hash: String,
    },
    /// `receipt.publish`
    ReceiptPublish {
        /// Lease consumed.
        lease_id: Uuid,
        /// Atom published.
        atom_hash: String,
    },
    /// `receipt.commit`
    ReceiptCommit {
        /// The run that committed.
        run_id: Uuid,
        /// Content hash of the committed diff.
        diff_hash: String,
        /// The verifier plan that gated this commit.
        verifier_plan_id: Uuid,
    },
    /// `receipt.ahdb.delta`
    ReceiptAhdbDelta {
        /// Sequence number this delta was computed at.
        at_seq: u64,
    },
    /// `receipt.projection.rebuild`
    ReceiptProjectionRebuild {
        /// Number of events replayed.
        events_replayed: u64,
    },
    /// `receipt.timeout`
    ReceiptTimeout {
        /// The run that timed out.
        run_id: Uuid,
        /// Which budget dimension was exhausted.
        budget: String,
    },
    /// `receipt.policy.decision.tokens`
    ReceiptPolicyDecisionTokens {
        /// The run this decision applies to.
        run_id: Uuid,
        /// Tokens consumed at decision time.
        tokens: u64,
    },
    /// `receipt.security.attestations`
    ReceiptSecurityAttestations {
        /// Attestations referenced by this security receipt.
        attestation_ids: Vec<Uuid>,
    },
    /// `receipt.context.footprint`
    ReceiptContextFootprint {
        /// Approximate bytes of context carried by the run.
        bytes: u64,
    },
    /// `receipt.hyperthesis.delta`
    ReceiptHyperthesisDelta {
        /// Hyperthesis entries added since the last delta.
        added: u64,
    },
    /// `work_item.create` — the only way a work item enters the projection
    /// (spec §6.2: "all endpoints are side-effects that append events").
    WorkItemCreate {
        /// The work item being created.
        work_item: super::WorkItem,
    },
    /// `spec_change_request` — split-on-infeasible (§4.6).
    SpecChangeRequest {
        /// The work item that cannot be satisfied as specified.
        work_item_id: Uuid,
        /// Why.
        reason: String,
    },
    /// `split_request` — split-on-infeasible (§4.6).
    SplitRequest {
        /// The parent work item being split.
        work_item_id: Uuid,
        /// Proposed child work item descriptions.
        children: Vec<String>,
    },
}

impl EventPayload {
    /// The canonical dot-delimited event type this payload variant encodes.
    #[must_use]
    pub fn canonical_type(&self) -> &'static str {
        match self {
            Self::FileWrite { .. } => "file.write",
            Self::FileDelete { .. } => "file.delete",
            Self::FileMove { .. } => "file.move",
            Self::ToolCall { .. } => "tool.call",
            Self::ToolResult { .. } => "tool.result",
            Self::WindowOpen { .. } => "window.open",
            Self::WindowClose { .. } => "window.close",
            Self::Checkpoint { .. } => "checkpoint",
            Self::Undo { .. } => "undo",
            Self::Message { .. } => "message",
            Self::NoteObservation { .. } => "note.observation",
            Self::NoteHypothesis { .. } => "note.hypothesis",
            Self::NoteHyperthesis { .. } => "note.hyperthesis",
            Self::NoteConjecture { .. } => "note.conjecture",
            Self::NoteStatus { .. } => "note.status",
            Self::NoteRequestHelp { .. } => "note.request.help",
            Self::NoteRequestVerify { .. } => "note.request.verify",
            Self::RunStart { .. } => "run.start",
            Self::ReceiptRead { .. } => "receipt.read",
            Self::ReceiptPatch { .. } => "receipt.patch",
            Self::ReceiptVerifier { .. } => "receipt.verifier",
            Self::ReceiptNet { .. } => "receipt.net",
            Self::ReceiptDb { .. } => "receipt.db",
            Self::ReceiptExport { .. } => "receipt.export",
            Self::ReceiptPublish { .. } => "receipt.publish",
            Self::ReceiptCommit { .. } => "receipt.commit",
            Self::ReceiptAhdbDelta { .. } => "receipt.ahdb.delta",
            Self::ReceiptProjectionRebuild { .. } => "receipt.projection.rebuild",
            Self::ReceiptTimeout { .. } => "receipt.timeout",
            Self::ReceiptPolicyDecisionTokens { .. } => "receipt.policy.decision.tokens",
            Self::ReceiptSecurityAttestations { .. } => "receipt.security.attestations",
            Self::ReceiptContextFootprint { .. } => "receipt.context.footprint",
            Self::ReceiptHyperthesisDelta { .. } => "receipt.hyperthesis.delta",
            Self::WorkItemCreate { .. } => "work_item.create",
            Self::SpecChangeRequest { .. } => "spec_change_request",
            Self::SplitRequest { .. } => "split_request",
        }
    }
}

/// Normalizes a legacy or malformed event type string to its canonical form
/// (§4.2, §6.1, L3). Idempotent: `normalize(normalize(t)) == normalize(t)`.
#[must_use]
pub fn normalize_event_type(raw: &str) -> String {
    let lower = raw.to_lowercase();
    let dotted: String = lower
        .chars()
        .map(|c| if c == '/' || c == '_' { '.' } else { c })
        .collect();

    // NOTE/<KIND> -> note.<kind>; <KIND>_RECEIPT and RECEIPT/<KIND> already
    // dotted by the pass above, so both collapse to the same `receipt.<kind>`
    // shape once we check prefix/suffix against the dotted form.
    if let Some(rest) = dotted.strip_prefix("note.") {
        return format!("note.{rest}");
    }
    if let Some(rest) = dotted.strip_prefix("receipt.") {
        return format!("receipt.{rest}");
    }
    if let Some(rest) = dotted.strip_suffix(".receipt") {
        return format!("receipt.{rest}");
    }

    dotted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_slash_and_underscore() {
        assert_eq!(normalize_event_type("FILE_WRITE"), "file.write");
        assert_eq!(normalize_event_type("file/write"), "file.write");
    }

    #[test]
    fn folds_note_subtype() {
        assert_eq!(normalize_event_type("NOTE/STATUS"), "note.status");
        assert_eq!(normalize_event_type("note_status"), "note.status");
    }

    #[test]
    fn folds_receipt_subtype_either_order() {
        assert_eq!(normalize_event_type("RECEIPT/COMMIT"), "receipt.commit");
        assert_eq!(normalize_event_type("commit_receipt"), "receipt.commit");
    }

    #[test]
    fn normalization_is_idempotent() {
        let cases = ["FILE_WRITE", "note/status", "commit_receipt", "tool.call"];
        for c in cases {
            let once = normalize_event_type(c);
            let twice = normalize_event_type(&once);
            assert_eq!(once, twice, "not idempotent for {c}");
        }
    }

    #[test]
    fn canonical_type_round_trips_through_event_type_field() {
        let payload = EventPayload::FileWrite {
            path: "a.rs".into(),
            diff_hash: "h".into(),
        };
        let event = Event::new(
            Uuid::nil(),
            Utc::now(),
            "u1",
            EventSource::Agent,
            payload,
        );
        assert_eq!(event.event_type, "file.write");
    }

    #[test]
    fn payload_serializes_with_kind_tag() {
        let payload = EventPayload::NoteStatus {
            run_id: Some(Uuid::new_v4()),
            from: Some("CALM".into()),
            to: "SKEPTICAL".into(),
            guard_id: "g1".into(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["kind"], "note_status");
    }
}
