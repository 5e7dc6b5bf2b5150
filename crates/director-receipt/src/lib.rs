#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Receipt canonicalization, hashing, chain verification, and diffing,
//! layered over [`director_core::Receipt`] as a dedicated microcrate rather
//! than folded into `director-projection`'s rebuild logic.

mod builder;
mod chain;
mod diff;
mod hash;

pub use builder::ReceiptBuilder;
pub use chain::{ChainError, ReceiptChain};
pub use diff::{diff_receipts, FieldDiff, ReceiptDiff};
pub use hash::{canonicalize, compute_hash, verify_hash};
