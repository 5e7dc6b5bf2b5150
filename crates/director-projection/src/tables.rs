//! The materialized tables (spec §6.4: work_items, runs, atoms,
//! attestations, receipts_index, ahdb_state) and the pure fold that keeps
//! them in sync with the event log.

use director_core::{
    sha256_hex, AhdbState, Atom, AtomKind, AtomState, DirectorError, Event, EventPayload, Mood,
    Receipt, ReceiptKind, Run, RunBudgets, RunStatus, VerifierResult, WorkItem, WorkItemStatus,
};
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

/// The full set of materialized views, keyed exactly as spec §6.4 describes.
///
/// `attestation_refs` intentionally holds only the IDs a `receipt.security.attestations`
/// event has referenced, not the full `Attestation` bodies — those are
/// content-addressed records owned by `director-verifier`'s attestation
/// store (I5/I9: raw evidence is never copied into control state). The
/// projection only needs to know an attestation was referenced, by whom.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectionTables {
    /// Work items by ID.
    pub work_items: HashMap<Uuid, WorkItem>,
    /// Runs by ID.
    pub runs: HashMap<Uuid, Run>,
    /// Atoms by content hash.
    pub atoms: HashMap<String, Atom>,
    /// Attestation IDs referenced by any `receipt.security.attestations` event.
    pub attestation_refs: BTreeSet<Uuid>,
    /// Receipts by ID (minted as the producing event's ID).
    pub receipts_index: HashMap<Uuid, Receipt>,
    /// The AHDB control-state vector.
    pub ahdb: AhdbState,
}

impl ProjectionTables {
    /// Folds one event into these tables. See [`crate::apply_event`] for the
    /// public, documented entry point; this inherent method is the actual
    /// match over the canonical event types.
    pub(crate) fn apply(&mut self, seq: u64, event: &Event) -> Result<(), DirectorError> {
        self.ahdb.last_event_id = seq;

        match &event.payload {
            EventPayload::FileWrite { path, .. } => {
                self.ahdb.drive.push(format!("file.write:{path}"));
            }
            EventPayload::FileDelete { path } => {
                self.ahdb.drive.push(format!("file.delete:{path}"));
            }
            EventPayload::FileMove { from, to } => {
                self.ahdb.drive.push(format!("file.move:{from}->{to}"));
            }
            EventPayload::ToolCall { tool, .. } => {
                self.ahdb.drive.push(format!("tool.call:{tool}"));
            }
            EventPayload::ToolResult { .. }
            | EventPayload::WindowOpen { .. }
            | EventPayload::WindowClose { .. }
            | EventPayload::Checkpoint { .. }
            | EventPayload::Undo { .. }
            | EventPayload::Message { .. } => {}

            EventPayload::NoteObservation { text } => {
                self.ahdb.believe.push(text.clone());
            }
            EventPayload::NoteHypothesis { text } => {
                self.ahdb.hypothesize.push(text.clone());
            }
            EventPayload::NoteHyperthesis { text, mitigation } => {
                let hash = sha256_hex(format!("{text}\u{0}{mitigation}").as_bytes());
                self.atoms.insert(
                    hash.clone(),
                    Atom {
                        hash: hash.clone(),
                        kind: AtomKind::Hyperthesis,
                        state: AtomState::Untrusted,
                    },
                );
                self.ahdb.hypertheses.push(hash);
            }
            EventPayload::NoteConjecture { text } => {
                let hash = sha256_hex(text.as_bytes());
                self.atoms.insert(
                    hash.clone(),
                    Atom {
                        hash: hash.clone(),
                        kind: AtomKind::Conjecture,
                        state: AtomState::Untrusted,
                    },
                );
                self.ahdb.conjectures.push(hash);
            }
            EventPayload::NoteStatus { run_id, to, .. } => {
                if let Some(run_id) = run_id {
                    if let Some(run) = self.runs.get_mut(run_id) {
                        run.mood = parse_mood(to).unwrap_or(run.mood);
                    }
                }
            }
            EventPayload::NoteRequestHelp { .. } | EventPayload::NoteRequestVerify { .. } => {}

            EventPayload::WorkItemCreate { work_item } => {
                self.work_items.insert(work_item.work_item_id, work_item.clone());
            }

            EventPayload::RunStart {
                work_item_id,
                mood,
                sandbox_id,
            } => {
                let mood = parse_mood(mood).ok_or_else(|| DirectorError::ProjectionInconsistency {
                    at_seq: seq,
                    reason: format!("unknown mood {mood:?} in run.start"),
                })?;
                let work_item = self.work_items.get_mut(work_item_id).ok_or_else(|| {
                    DirectorError::ProjectionInconsistency {
                        at_seq: seq,
                        reason: format!("run.start references unknown work item {work_item_id}"),
                    }
                })?;
                work_item.status = WorkItemStatus::Running;

                // run_id is not itself a field of RunStart; derive a stable
                // run identity from the event's own id so every run.start
                // event corresponds to exactly one Run record.
                let run_id = event.id;
                self.runs.insert(
                    run_id,
                    Run {
                        run_id,
                        work_item_id: *work_item_id,
                        mood,
                        budgets: RunBudgets {
                            tokens: 0,
                            time_ms: 0,
                            iterations: 0,
                            diff_bytes: 0,
                        },
                        status: RunStatus::Executing,
                        sandbox_id: Some(*sandbox_id),
                        verifier_plan_id: None,
                    },
                );
            }

            EventPayload::ReceiptRead { .. } | EventPayload::ReceiptPatch { .. } => {
                self.index_receipt(event, receipt_kind_for(&event.payload));
            }
            EventPayload::ReceiptVerifier {
                plan_id, result, ..
            } => {
                self.index_receipt(event, ReceiptKind::Verifier);
                if let Some(run) = self.find_run_by_plan_or_latest(*plan_id) {
                    run.verifier_plan_id = Some(*plan_id);
                    run.status = match result {
                        VerifierResult::Pass => RunStatus::Committing,
                        _ => RunStatus::Verifying,
                    };
                }
            }
            EventPayload::ReceiptNet { .. }
            | EventPayload::ReceiptDb { .. }
            | EventPayload::ReceiptExport { .. }
            | EventPayload::ReceiptPublish { .. } => {
                self.index_receipt(event, receipt_kind_for(&event.payload));
            }
            EventPayload::ReceiptCommit { run_id, .. } => {
                self.index_receipt(event, ReceiptKind::Commit);
                if let Some(run) = self.runs.get_mut(run_id) {
                    run.status = RunStatus::Committed;
                    if let Some(wi) = self.work_items.get_mut(&run.work_item_id) {
                        wi.status = WorkItemStatus::Done;
                    }
                }
            }
            EventPayload::ReceiptAhdbDelta { .. } => {
                self.index_receipt(event, ReceiptKind::AhdbDelta);
            }
            EventPayload::ReceiptProjectionRebuild { .. } => {
                self.index_receipt(event, ReceiptKind::ProjectionRebuild);
            }
            EventPayload::ReceiptTimeout { run_id, .. } => {
                self.index_receipt(event, ReceiptKind::Timeout);
                if let Some(run) = self.runs.get_mut(run_id) {
                    run.status = RunStatus::Discarded;
                }
            }
            EventPayload::ReceiptPolicyDecisionTokens { .. } => {
                self.index_receipt(event, ReceiptKind::PolicyDecisionTokens);
            }
            EventPayload::ReceiptSecurityAttestations { attestation_ids } => {
                self.index_receipt(event, ReceiptKind::SecurityAttestations);
                self.attestation_refs.extend(attestation_ids.iter().copied());
            }
            EventPayload::ReceiptContextFootprint { .. } => {
                self.index_receipt(event, ReceiptKind::ContextFootprint);
            }
            EventPayload::ReceiptHyperthesisDelta { .. } => {
                self.index_receipt(event, ReceiptKind::HyperthesisDelta);
            }

            EventPayload::SpecChangeRequest { work_item_id, .. }
            | EventPayload::SplitRequest { work_item_id, .. } => {
                let wi = self.work_items.get_mut(work_item_id).ok_or_else(|| {
                    DirectorError::ProjectionInconsistency {
                        at_seq: seq,
                        reason: format!("split references unknown work item {work_item_id}"),
                    }
                })?;
                wi.status = WorkItemStatus::Split;
            }
        }
        Ok(())
    }

    fn index_receipt(&mut self, event: &Event, kind: ReceiptKind) {
        self.receipts_index.insert(
            event.id,
            Receipt {
                receipt_id: event.id,
                kind,
                references: receipt_references(&event.payload),
                timestamp_ms: event.timestamp_ms,
            },
        );
    }

    /// `receipt.verifier` events do not carry a `run_id` directly; this
    /// resolves the run that requested the given plan, falling back to the
    /// most recently started run still in `Verifying`/`Executing`. Acceptable
    /// because a single sandbox/lease is bound to exactly one outstanding
    /// run at a time (I3 ownership rule).
    fn find_run_by_plan_or_latest(&mut self, plan_id: Uuid) -> Option<&mut Run> {
        if self
            .runs
            .values()
            .any(|r| r.verifier_plan_id == Some(plan_id))
        {
            return self
                .runs
                .values_mut()
                .find(|r| r.verifier_plan_id == Some(plan_id));
        }
        self.runs
            .values_mut()
            .filter(|r| matches!(r.status, RunStatus::Executing | RunStatus::Verifying))
            .max_by_key(|r| r.run_id)
    }
}

fn parse_mood(s: &str) -> Option<Mood> {
    Mood::ALL.into_iter().find(|m| m.as_str() == s)
}

fn receipt_kind_for(payload: &EventPayload) -> ReceiptKind {
    match payload {
        EventPayload::ReceiptRead { .. } => ReceiptKind::Read,
        EventPayload::ReceiptPatch { .. } => ReceiptKind::Patch,
        EventPayload::ReceiptVerifier { .. } => ReceiptKind::Verifier,
        EventPayload::ReceiptNet { .. } => ReceiptKind::Net,
        EventPayload::ReceiptDb { .. } => ReceiptKind::Db,
        EventPayload::ReceiptExport { .. } => ReceiptKind::Export,
        EventPayload::ReceiptPublish { .. } => ReceiptKind::Publish,
        EventPayload::ReceiptCommit { .. } => ReceiptKind::Commit,
        EventPayload::ReceiptAhdbDelta { .. } => ReceiptKind::AhdbDelta,
        EventPayload::ReceiptProjectionRebuild { .. } => ReceiptKind::ProjectionRebuild,
        EventPayload::ReceiptTimeout { .. } => ReceiptKind::Timeout,
        EventPayload::ReceiptPolicyDecisionTokens { .. } => ReceiptKind::PolicyDecisionTokens,
        EventPayload::ReceiptSecurityAttestations { .. } => ReceiptKind::SecurityAttestations,
        EventPayload::ReceiptContextFootprint { .. } => ReceiptKind::ContextFootprint,
        EventPayload::ReceiptHyperthesisDelta { .. } => ReceiptKind::HyperthesisDelta,
        _ => unreachable!("receipt_kind_for called on a non-receipt payload"),
    }
}

fn receipt_references(payload: &EventPayload) -> Vec<String> {
    match payload {
        EventPayload::ReceiptRead { lease_id, path } => vec![lease_id.to_string(), path.clone()],
        EventPayload::ReceiptPatch { lease_id, diff_hash } => {
            vec![lease_id.to_string(), diff_hash.clone()]
        }
        EventPayload::ReceiptVerifier {
            plan_id,
            verifier_id,
            ..
        } => vec![plan_id.to_string(), verifier_id.clone()],
        EventPayload::ReceiptNet { lease_id, host } => vec![lease_id.to_string(), host.clone()],
        EventPayload::ReceiptDb { lease_id, operation } => {
            vec![lease_id.to_string(), operation.clone()]
        }
        EventPayload::ReceiptExport {
            lease_id,
            artifact_hash,
        } => vec![lease_id.to_string(), artifact_hash.clone()],
        EventPayload::ReceiptPublish { lease_id, atom_hash } => {
            vec![lease_id.to_string(), atom_hash.clone()]
        }
        EventPayload::ReceiptCommit {
            run_id,
            diff_hash,
            verifier_plan_id,
        } => vec![run_id.to_string(), diff_hash.clone(), verifier_plan_id.to_string()],
        EventPayload::ReceiptAhdbDelta { at_seq } => vec![at_seq.to_string()],
        EventPayload::ReceiptProjectionRebuild { events_replayed } => {
            vec![events_replayed.to_string()]
        }
        EventPayload::ReceiptTimeout { run_id, budget } => {
            vec![run_id.to_string(), budget.clone()]
        }
        EventPayload::ReceiptPolicyDecisionTokens { run_id, tokens } => {
            vec![run_id.to_string(), tokens.to_string()]
        }
        EventPayload::ReceiptSecurityAttestations { attestation_ids } => {
            attestation_ids.iter().map(ToString::to_string).collect()
        }
        EventPayload::ReceiptContextFootprint { bytes } => vec![bytes.to_string()],
        EventPayload::ReceiptHyperthesisDelta { added } => vec![added.to_string()],
        _ => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use director_core::{EventSource, RiskTier};

    fn work_item(id: Uuid) -> WorkItem {
        WorkItem {
            work_item_id: id,
            description: "d".into(),
            acceptance_criteria: "a".into(),
            required_verifiers: vec![],
            risk_tier: RiskTier::Low,
            dependencies: vec![],
            status: WorkItemStatus::Open,
        }
    }

    #[test]
    fn run_start_marks_work_item_running_and_creates_run() {
        let mut tables = ProjectionTables::default();
        let wi_id = Uuid::new_v4();
        tables.work_items.insert(wi_id, work_item(wi_id));

        let event = Event::new(
            Uuid::new_v4(),
            Utc::now(),
            "u1",
            EventSource::Agent,
            EventPayload::RunStart {
                work_item_id: wi_id,
                mood: "CALM".into(),
                sandbox_id: Uuid::new_v4(),
            },
        );
        tables.apply(1, &event).unwrap();

        assert_eq!(
            tables.work_items[&wi_id].status,
            WorkItemStatus::Running
        );
        assert_eq!(tables.runs.len(), 1);
    }

    #[test]
    fn work_item_create_inserts_into_work_items() {
        let mut tables = ProjectionTables::default();
        let wi_id = Uuid::new_v4();
        let event = Event::new(
            Uuid::new_v4(),
            Utc::now(),
            "system",
            EventSource::System,
            EventPayload::WorkItemCreate {
                work_item: work_item(wi_id),
            },
        );
        tables.apply(1, &event).unwrap();

        assert!(tables.work_items.contains_key(&wi_id));
        assert_eq!(tables.work_items[&wi_id].status, WorkItemStatus::Open);
    }

    #[test]
    fn run_start_rejects_unknown_work_item() {
        let mut tables = ProjectionTables::default();
        let event = Event::new(
            Uuid::new_v4(),
            Utc::now(),
            "u1",
            EventSource::Agent,
            EventPayload::RunStart {
                work_item_id: Uuid::new_v4(),
                mood: "CALM".into(),
                sandbox_id: Uuid::new_v4(),
            },
        );
        assert!(tables.apply(1, &event).is_err());
    }

    #[test]
    fn commit_marks_run_committed_and_work_item_done() {
        let mut tables = ProjectionTables::default();
        let wi_id = Uuid::new_v4();
        tables.work_items.insert(wi_id, work_item(wi_id));
        let start = Event::new(
            Uuid::new_v4(),
            Utc::now(),
            "u1",
            EventSource::Agent,
            EventPayload::RunStart {
                work_item_id: wi_id,
                mood: "CALM".into(),
                sandbox_id: Uuid::new_v4(),
            },
        );
        let run_id = start.id;
        tables.apply(1, &start).unwrap();

        let commit = Event::new(
            Uuid::new_v4(),
            Utc::now(),
            "u1",
            EventSource::System,
            EventPayload::ReceiptCommit {
                run_id,
                diff_hash: "h".into(),
                verifier_plan_id: Uuid::new_v4(),
            },
        );
        tables.apply(2, &commit).unwrap();

        assert_eq!(tables.runs[&run_id].status, RunStatus::Committed);
        assert_eq!(tables.work_items[&wi_id].status, WorkItemStatus::Done);
    }

    #[test]
    fn hyperthesis_creates_untrusted_atom() {
        let mut tables = ProjectionTables::default();
        let event = Event::new(
            Uuid::new_v4(),
            Utc::now(),
            "u1",
            EventSource::Agent,
            EventPayload::NoteHyperthesis {
                text: "cannot rule out X".into(),
                mitigation: "bounded by Y".into(),
            },
        );
        tables.apply(1, &event).unwrap();
        assert_eq!(tables.atoms.len(), 1);
        let atom = tables.atoms.values().next().unwrap();
        assert_eq!(atom.state, AtomState::Untrusted);
        assert_eq!(atom.kind, AtomKind::Hyperthesis);
    }
}
