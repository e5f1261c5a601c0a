#![forbid(unsafe_code)]
//! Validates one block at a time against the current verified state
//! and advances that state atomically on success (spec.md §4.2).
//!
//! [`Verifier`] owns the [`ChainState`] and the [`UnverifiedQueue`] of
//! blocks waiting on a dependency (spec.md §4.2 "Re-entrancy &
//! ordering"). Callers feed it blocks one at a time via
//! [`Verifier::ingest`]; a block whose author is not yet known is
//! queued rather than dropped, and is retried once that author's
//! device-creation block verifies.

pub mod state;
pub mod unverified;
pub mod verifier;

pub use state::ChainState;
pub use unverified::{Subject, UnverifiedQueue};
pub use verifier::{IngestOutcome, Verifier};
