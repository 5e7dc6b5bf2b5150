#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Deterministic verifier plan selection, green-thread isolated execution,
//! and content-addressed attestation storage (spec §4.4).
//!
//! Raw verifier stdout/stderr is stored as an artifact and never crosses
//! back into the run's control stream; only the bounded [`VerifierReport`]
//! and the [`director_core::Attestation`] it produces do.

mod attestation;
mod plan;
mod report;
mod runner;

pub use attestation::{build_attestation, AttestationStore, MemoryAttestationStore, SharedAttestationStore};
pub use plan::select_plan;
pub use report::VerifierReport;
pub use runner::{VerifierRun, VerifierRunner};
