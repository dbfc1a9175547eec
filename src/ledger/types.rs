//! Types for direct ledger log access

use crate::config::Entity;
use crate::event::EventKind;
use crate::retry::Transient;

use serde::Serialize;

/// Inclusive block range covered by one pair of log queries
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockWindow {
	pub from: u64,
	pub to: u64,
}

impl BlockWindow {
	/// Number of blocks in the window
	pub fn len(&self) -> u64 {
		self.to - self.from + 1
	}

	pub fn contains(&self, height: u64) -> bool {
		(self.from..=self.to).contains(&height)
	}
}

impl std::fmt::Display for BlockWindow {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "[{}, {}]", self.from, self.to)
	}
}

/// Decoded geyser log entry, before the sign convention is applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLogEntry {
	/// Actor address as found in the log
	pub account: String,
	/// Unsigned amount from the event payload
	pub amount: u128,
	/// Event payload timestamp
	pub timestamp: u64,
	/// Event payload block number
	pub block_height: u64,
}

/// Ledger log query capability.
///
/// Implementations must accept windows of up to the configured window size
/// and must be safe to call concurrently.
#[async_trait::async_trait]
pub trait LedgerLogSource: Send + Sync {
	/// Fetch every `kind` log emitted by `entity` within `window`.
	async fn query_logs(
		&self,
		entity: &Entity,
		kind: EventKind,
		window: BlockWindow,
	) -> Result<Vec<RawLogEntry>, LedgerError>;
}

/// Authoritative net total as of a checkpoint
#[async_trait::async_trait]
pub trait TotalStakedSource: Send + Sync {
	async fn total_staked(&self, entity: &Entity, checkpoint_height: u64)
	-> Result<i128, LedgerError>;
}

/// Error types for ledger node access and log decoding
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
	#[error("HTTP error: {0}")]
	HttpError(#[from] reqwest::Error),

	#[error("JSON parse error: {0}")]
	JsonError(#[from] serde_json::Error),

	#[error("JSON-RPC error {code}: {message}")]
	RpcError { code: i64, message: String },

	#[error("No result returned")]
	NoResult,

	#[error("Malformed log: {0}")]
	MalformedLog(String),
}

impl Transient for LedgerError {
	fn is_transient(&self) -> bool {
		matches!(
			self,
			LedgerError::HttpError(_)
				| LedgerError::JsonError(_)
				| LedgerError::RpcError { .. }
				| LedgerError::NoResult
		)
	}
}

#[async_trait::async_trait]
impl<S: LedgerLogSource + ?Sized> LedgerLogSource for std::sync::Arc<S> {
	async fn query_logs(
		&self,
		entity: &Entity,
		kind: EventKind,
		window: BlockWindow,
	) -> Result<Vec<RawLogEntry>, LedgerError> {
		(**self).query_logs(entity, kind, window).await
	}
}

#[async_trait::async_trait]
impl<S: TotalStakedSource + ?Sized> TotalStakedSource for std::sync::Arc<S> {
	async fn total_staked(
		&self,
		entity: &Entity,
		checkpoint_height: u64,
	) -> Result<i128, LedgerError> {
		(**self).total_staked(entity, checkpoint_height).await
	}
}
