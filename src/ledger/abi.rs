//! Minimal ABI helpers for the geyser `Staked`/`Unstaked` events.
//!
//! Both events share the layout
//! `(address indexed user, uint256 amount, uint256 total, uint256 timestamp, uint256 blockNumber, bytes data)`,
//! so the user sits in topic 1 and the data section starts with the four
//! static words followed by the dynamic `bytes` offset.

use super::types::{LedgerError, RawLogEntry};
use crate::event::EventKind;

use serde::Deserialize;
use sha3::{Digest, Keccak256};

const WORD: usize = 32;

const AMOUNT_WORD: usize = 0;
const TIMESTAMP_WORD: usize = 2;
const BLOCK_NUMBER_WORD: usize = 3;

/// Log object as returned by `eth_getLogs`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcLog {
	pub topics: Vec<String>,
	pub data: String,
	#[serde(default)]
	pub block_number: Option<String>,
	#[serde(default)]
	pub removed: bool,
}

/// `0x`-prefixed keccak-256 of an event signature (topic 0).
pub fn event_topic(signature: &str) -> String {
	format!("0x{}", hex::encode(Keccak256::digest(signature.as_bytes())))
}

/// First four bytes of the keccak-256 of a function signature.
pub fn function_selector(signature: &str) -> [u8; 4] {
	let digest = Keccak256::digest(signature.as_bytes());
	[digest[0], digest[1], digest[2], digest[3]]
}

/// Decode a `0x`-prefixed hex string into bytes.
pub fn decode_hex(value: &str) -> Result<Vec<u8>, LedgerError> {
	let digits = value.strip_prefix("0x").unwrap_or(value);
	hex::decode(digits).map_err(|e| LedgerError::MalformedLog(format!("Invalid hex {}: {}", value, e)))
}

/// Parse a `0x`-prefixed quantity such as a block number.
pub fn parse_quantity(value: &str) -> Result<u64, LedgerError> {
	let digits = value.strip_prefix("0x").unwrap_or(value);
	u64::from_str_radix(digits, 16)
		.map_err(|e| LedgerError::MalformedLog(format!("Invalid quantity {}: {}", value, e)))
}

/// Read a uint256 word that must fit into 128 bits.
pub fn word_as_u128(word: &[u8]) -> Result<u128, LedgerError> {
	if word.len() != WORD {
		return Err(LedgerError::MalformedLog(format!(
			"Expected a {}-byte word, got {} bytes",
			WORD,
			word.len()
		)));
	}
	let (high, low) = word.split_at(WORD / 2);
	if high.iter().any(|b| *b != 0) {
		return Err(LedgerError::MalformedLog(format!(
			"Value 0x{} exceeds 128 bits",
			hex::encode(word)
		)));
	}
	let mut bytes = [0u8; WORD / 2];
	bytes.copy_from_slice(low);
	Ok(u128::from_be_bytes(bytes))
}

fn data_word(data: &[u8], index: usize) -> Result<&[u8], LedgerError> {
	data.get(index * WORD..(index + 1) * WORD).ok_or_else(|| {
		LedgerError::MalformedLog(format!(
			"Data section has {} bytes, word {} is missing",
			data.len(),
			index
		))
	})
}

fn word_as_u64(word: &[u8], field: &str) -> Result<u64, LedgerError> {
	let value = word_as_u128(word)?;
	u64::try_from(value)
		.map_err(|_| LedgerError::MalformedLog(format!("{} {} exceeds 64 bits", field, value)))
}

/// Decode a geyser log of the given kind into a raw entry.
pub fn decode_geyser_log(kind: EventKind, log: &RpcLog) -> Result<RawLogEntry, LedgerError> {
	let expected_topic = event_topic(kind.signature());
	match log.topics.first() {
		Some(topic) if topic.eq_ignore_ascii_case(&expected_topic) => {}
		other => {
			return Err(LedgerError::MalformedLog(format!(
				"Topic {:?} does not match {} event",
				other, kind
			)));
		}
	}

	let user_topic = log
		.topics
		.get(1)
		.ok_or_else(|| LedgerError::MalformedLog("Missing indexed user topic".to_string()))?;
	let user_word = decode_hex(user_topic)?;
	if user_word.len() != WORD {
		return Err(LedgerError::MalformedLog(format!(
			"User topic has {} bytes",
			user_word.len()
		)));
	}
	let account = format!("0x{}", hex::encode(&user_word[WORD - 20..]));

	let data = decode_hex(&log.data)?;
	let amount = word_as_u128(data_word(&data, AMOUNT_WORD)?)?;
	let timestamp = word_as_u64(data_word(&data, TIMESTAMP_WORD)?, "timestamp")?;
	let block_height = word_as_u64(data_word(&data, BLOCK_NUMBER_WORD)?, "blockNumber")?;

	// Geysers emit `block.number`; the payload must match the containing block.
	if let Some(log_block) = log.block_number.as_deref() {
		let log_block = parse_quantity(log_block)?;
		if log_block != block_height {
			return Err(LedgerError::MalformedLog(format!(
				"Payload blockNumber {} differs from log block {}",
				block_height, log_block
			)));
		}
	}

	Ok(RawLogEntry {
		account,
		amount,
		timestamp,
		block_height,
	})
}

#[cfg(test)]
pub(crate) fn encode_geyser_log(
	kind: EventKind,
	user: &str,
	amount: u128,
	timestamp: u64,
	block_number: u64,
) -> RpcLog {
	let user_digits = user.trim_start_matches("0x");
	let data = format!(
		"0x{:064x}{:064x}{:064x}{:064x}{:064x}{:064x}",
		amount, 0u128, timestamp, block_number, 0xa0, 0
	);
	RpcLog {
		topics: vec![
			event_topic(kind.signature()),
			format!("0x{:0>64}", user_digits),
		],
		data,
		block_number: Some(format!("0x{:x}", block_number)),
		removed: false,
	}
}
