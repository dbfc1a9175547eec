//! Types for the canonical stake/unstake event representation

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Kind of geyser event, which decides the sign of the amount
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
	/// Tokens were staked into the entity
	Staked,
	/// Tokens were withdrawn from the entity
	Unstaked,
}

impl EventKind {
	/// Both kinds, in the order they are queried.
	pub const ALL: [EventKind; 2] = [EventKind::Staked, EventKind::Unstaked];

	/// Solidity signature of the event as emitted by the geyser contract
	pub fn signature(&self) -> &'static str {
		match self {
			EventKind::Staked => "Staked(address,uint256,uint256,uint256,uint256,bytes)",
			EventKind::Unstaked => "Unstaked(address,uint256,uint256,uint256,uint256,bytes)",
		}
	}

	/// Apply the sign convention to an unsigned magnitude.
	pub fn signed(&self, magnitude: u128) -> Result<i128, EventError> {
		let value = i128::try_from(magnitude).map_err(|_| EventError::AmountOverflow(magnitude))?;
		Ok(match self {
			EventKind::Staked => value,
			EventKind::Unstaked => -value,
		})
	}
}

impl std::fmt::Display for EventKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			EventKind::Staked => write!(f, "staked"),
			EventKind::Unstaked => write!(f, "unstaked"),
		}
	}
}

/// One observed stake or unstake occurrence.
///
/// Identifiers are lowercased on construction because the ledger and the
/// indexer disagree on address casing. The value is never mutated after
/// decoding, so the fields are only reachable through accessors.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Hash)]
pub struct CanonicalEvent {
	kind: EventKind,
	entity_id: String,
	account: String,
	signed_amount: i128,
	timestamp: u64,
	block_height: u64,
}

impl CanonicalEvent {
	/// Build a canonical event from an unsigned magnitude.
	///
	/// # Errors
	/// Returns `EventError` if the account is empty or the magnitude does not
	/// fit a signed 128-bit amount.
	pub fn new(
		kind: EventKind,
		entity_id: &str,
		account: &str,
		magnitude: u128,
		timestamp: u64,
		block_height: u64,
	) -> Result<Self, EventError> {
		let account = account.trim();
		if account.is_empty() {
			return Err(EventError::EmptyAccount);
		}

		Ok(Self {
			kind,
			entity_id: normalize_id(entity_id),
			account: normalize_id(account),
			signed_amount: kind.signed(magnitude)?,
			timestamp,
			block_height,
		})
	}

	pub fn kind(&self) -> EventKind {
		self.kind
	}

	pub fn entity_id(&self) -> &str {
		&self.entity_id
	}

	pub fn account(&self) -> &str {
		&self.account
	}

	/// Positive for stakes, negated magnitude for unstakes
	pub fn signed_amount(&self) -> i128 {
		self.signed_amount
	}

	/// Seconds since epoch, taken from the event payload
	pub fn timestamp(&self) -> u64 {
		self.timestamp
	}

	pub fn block_height(&self) -> u64 {
		self.block_height
	}
}

/// Lowercase an address-like identifier.
pub fn normalize_id(id: &str) -> String {
	id.trim().to_ascii_lowercase()
}

/// Display ordering: timestamp descending, ties broken by amount descending.
///
/// Only used for logs and reports; the reconciliation checks never rely on it.
pub fn display_order(a: &CanonicalEvent, b: &CanonicalEvent) -> Ordering {
	b.timestamp
		.cmp(&a.timestamp)
		.then_with(|| b.signed_amount.cmp(&a.signed_amount))
}

/// Sort a collection in place with [`display_order`].
pub fn sort_for_display(events: &mut [CanonicalEvent]) {
	events.sort_by(display_order);
}

/// Errors raised while building a canonical event
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EventError {
	#[error("Amount {0} does not fit a signed 128-bit integer")]
	AmountOverflow(u128),

	#[error("Event has an empty account")]
	EmptyAccount,
}
