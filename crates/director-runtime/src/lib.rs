#![deny(unsafe_code)]
#![warn(missing_docs)]
//! The run orchestrator (spec §4.6): the state machine that drives a run
//! through `pending → executing → verifying → committing → committed |
//! discarded`, gating every transition on mood policy, capability leases,
//! and run budgets.

mod budget;
mod cancel;
mod director;

pub use budget::{BudgetStatus, BudgetTracker, BudgetViolation, WARNING_THRESHOLD};
pub use cancel::{run_with_grace, CancellableRun, CancellationReason, CancellationToken, VERIFIER_KILL_GRACE};
pub use director::Director;
