//! Types for GraphQL indexer integration

use crate::event::{CanonicalEvent, EventError, EventKind};
use crate::retry::Transient;

use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;

/// Reference to the geyser entity a record belongs to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GeyserRef {
	pub id: String,
}

/// One stake or unstake record as stored by the indexer.
///
/// The indexer exposes amounts, timestamps and block numbers as `BigInt`,
/// which arrive as JSON strings; plain numbers are accepted as well.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexedEventRecord {
	/// The geyser that emitted the event.
	pub geyser: GeyserRef,
	/// The staking account.
	pub user: String,
	/// Unsigned amount.
	#[serde(deserialize_with = "big_int")]
	pub amount: u128,
	/// Event payload timestamp in seconds.
	#[serde(deserialize_with = "big_int")]
	pub timestamp: u64,
	/// Height at which the event was recorded.
	#[serde(rename = "blockNumber", deserialize_with = "big_int")]
	pub block_number: u64,
}

impl IndexedEventRecord {
	/// Convert into a canonical event, applying the sign convention of `kind`.
	pub fn to_canonical(&self, kind: EventKind) -> Result<CanonicalEvent, EventError> {
		CanonicalEvent::new(
			kind,
			&self.geyser.id,
			&self.user,
			self.amount,
			self.timestamp,
			self.block_number,
		)
	}
}

/// One page of both event kinds
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventPage {
	#[serde(rename = "stakedEvents", default)]
	pub staked_events: Vec<IndexedEventRecord>,
	#[serde(rename = "unstakedEvents", default)]
	pub unstaked_events: Vec<IndexedEventRecord>,
}

impl EventPage {
	/// Decode the `data` member of a query response.
	///
	/// Decoding failures are permanent and reported as `InvalidRecord`.
	pub fn from_response_data(data: serde_json::Value) -> Result<Self, IndexerError> {
		serde_json::from_value(data).map_err(|e| IndexerError::InvalidRecord(e.to_string()))
	}

	/// True when neither kind returned a record, which ends paging
	pub fn is_empty(&self) -> bool {
		self.staked_events.is_empty() && self.unstaked_events.is_empty()
	}

	pub fn len(&self) -> usize {
		self.staked_events.len() + self.unstaked_events.len()
	}

	/// Records of both kinds, tagged with their kind
	pub fn records(&self) -> impl Iterator<Item = (EventKind, &IndexedEventRecord)> {
		self.staked_events
			.iter()
			.map(|r| (EventKind::Staked, r))
			.chain(self.unstaked_events.iter().map(|r| (EventKind::Unstaked, r)))
	}
}

/// Parameters of one paged query
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PageQuery {
	/// Lowercase entity identifier
	pub entity_id: String,
	/// Height the indexer must resolve its state at
	pub checkpoint_height: u64,
	/// Records to skip per kind
	pub skip: u64,
	/// Records to return per kind
	pub first: u64,
}

/// Paged query capability of the indexing service.
///
/// Implementations must be safe to call concurrently.
#[async_trait::async_trait]
pub trait IndexedEventSource: Send + Sync {
	async fn query_page(&self, query: &PageQuery) -> Result<EventPage, IndexerError>;
}

fn big_int<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
	D: Deserializer<'de>,
	T: FromStr + From<u64>,
	T::Err: std::fmt::Display,
{
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Repr {
		Number(u64),
		Text(String),
	}

	match Repr::deserialize(deserializer)? {
		Repr::Number(n) => Ok(T::from(n)),
		Repr::Text(s) => s.trim().parse::<T>().map_err(serde::de::Error::custom),
	}
}

/// Error types for indexer operations
#[derive(Debug, thiserror::Error)]
pub enum IndexerError {
	#[error("GraphQL error: {0}")]
	GraphQLError(String),

	#[error("No data returned")]
	NoData,

	#[error("HTTP error: {0}")]
	HttpError(#[from] reqwest::Error),

	#[error("Invalid record: {0}")]
	InvalidRecord(String),
}

impl Transient for IndexerError {
	fn is_transient(&self) -> bool {
		!matches!(self, IndexerError::InvalidRecord(_))
	}
}
