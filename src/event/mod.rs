//! Canonical stake/unstake event model
//!
//! Both the ledger scanner and the indexed fetcher decode their records into
//! [`CanonicalEvent`], which is what the aggregator and the reconciler work on.

/// Net position summation
mod aggregate;
/// Event kind, canonical event and ordering helpers
mod types;

pub use aggregate::net_total;
pub use types::*;
