//! Direct ledger access
//!
//! This module scans geyser stake and unstake logs straight from a ledger node,
//! and reads the authoritative `totalStaked()` value used as ground truth.

/// ABI helpers for the geyser events
mod abi;
/// JSON-RPC client for the ledger node
mod client;
/// Windowed log scan of one entity
mod scanner;
/// Type definitions for ledger data and collaborator traits
mod types;

pub use client::JsonRpcLedgerClient;
pub use scanner::{LedgerScanner, block_windows};
pub use types::*;
