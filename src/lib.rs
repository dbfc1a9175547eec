//! Reconciles geyser stake/unstake histories between a direct ledger log scan
//! and a precomputed indexing service, as of one fixed checkpoint height.
//!
//! Both sources are decoded into [`event::CanonicalEvent`]. The
//! [`reconcile::Reconciler`] compares their net totals with an authoritative
//! total and compares the event sets themselves, producing a
//! [`reconcile::ReconciliationReport`] per entity.

/// Run configuration and entity registry
pub mod config;
/// Fatal reconciliation errors
pub mod error;
/// Canonical event model and aggregation
pub mod event;
/// Indexer client and paged fetcher
pub mod indexer;
/// Ledger node client and windowed scanner
pub mod ledger;
/// Checks, reports and the reconciler
pub mod reconcile;
/// Bounded retry of transient failures
pub mod retry;

#[cfg(test)]
mod testing;
