#![deny(unsafe_code)]
#![warn(missing_docs)]
//! HTTP Supervisor API (spec §6.2): "all endpoints are side-effects that
//! append events; state is a projection." Thin axum handlers over
//! [`director_runtime::Director`] for run lifecycle, the event log and
//! projector directly for notes and read endpoints that [`Director`] does
//! not itself expose, and the shared sandbox provider for lifecycle calls
//! made outside the context of a run.
//!
//! [`Director`]: director_runtime::Director

mod api;

pub use api::{build_app, AppState};
