//! Indexer integration module
//!
//! This module provides the client and types for querying the geyser GraphQL
//! indexer, and the fetcher that pages through an entity's full stake history
//! at a fixed checkpoint.

/// GraphQL client for interacting with the indexer
mod client;
/// Paged fetch of an entity's history
mod fetcher;
/// Type definitions for indexer data structures
mod types;

pub use client::GeyserIndexerClient;
pub use fetcher::{FetchOutcome, IndexedFetcher};
pub use types::*;
