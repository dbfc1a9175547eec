//! Reconciliation of the ledger and indexer histories
//!
//! - `checks`: projection and whole-row set agreement between two event collections.
//! - `report`: the per-entity report, its checks and its verdict.
//! - `reconciler`: runs both sources for one entity and builds the report.

/// Set agreement checks
pub mod checks;
/// Coordinates both sources for one entity
pub mod reconciler;
/// Report and verdict types
pub mod report;

pub use checks::{Divergence, EventRow, Projection, RowDifference};
pub use reconciler::Reconciler;
pub use report::*;
