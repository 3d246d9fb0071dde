//! indexvest-query
//!
//! Read-only query and reporting layer over a ledger database.
//! Mutations live in indexvest-state's engines. This crate evaluates stored
//! terms against a snapshot of the index, supply and shared window, and
//! builds release projections and ledger-wide summaries.

pub mod projection;
pub mod query;
pub mod summary;

pub use projection::{release_projection, ReleasePoint, MAX_PROJECTION_STEPS};
pub use query::{Schedule, Snapshot, TermQuery, TermStatus};
pub use summary::LedgerSummary;
