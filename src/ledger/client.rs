//!
//! JSON-RPC client for the ledger node.
//!
//! Provides `eth_getLogs` scans of geyser events, the `totalStaked()` ground
//! truth through `eth_call`, and the chain head through `eth_blockNumber`.
//! Every query that reads state is pinned to an explicit block height.

use super::abi::{
	RpcLog, decode_geyser_log, decode_hex, event_topic, function_selector, parse_quantity,
	word_as_u128,
};
use super::types::*;
use crate::config::Entity;
use crate::event::EventKind;

use reqwest::Client;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

const TOTAL_STAKED_SIGNATURE: &str = "totalStaked()";

/// Ledger node JSON-RPC client
pub struct JsonRpcLedgerClient {
	/// The underlying HTTP client, shared by concurrent window scans.
	http_client: Client,
	/// The JSON-RPC endpoint of the ledger node.
	rpc_url: String,
	/// Monotonic JSON-RPC request id.
	next_id: AtomicU64,
}

impl JsonRpcLedgerClient {
	/// Create a new ledger client.
	///
	/// # Arguments
	/// * `rpc_url` - The JSON-RPC endpoint.
	/// * `timeout` - Per-request timeout.
	pub fn new(rpc_url: String, timeout: Duration) -> Result<Self, LedgerError> {
		let http_client = Client::builder().timeout(timeout).build()?;

		Ok(Self {
			http_client,
			rpc_url,
			next_id: AtomicU64::new(1),
		})
	}

	/// Current chain head height.
	pub async fn block_number(&self) -> Result<u64, LedgerError> {
		let result = self.call("eth_blockNumber", json!([])).await?;
		let height = result.as_str().ok_or(LedgerError::NoResult)?;
		parse_quantity(height)
	}

	/// Execute a JSON-RPC call and return its `result` member.
	///
	/// # Errors
	/// Returns `LedgerError::RpcError` if the node answers with an error object.
	pub async fn call(
		&self,
		method: &str,
		params: serde_json::Value,
	) -> Result<serde_json::Value, LedgerError> {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		let request_body = json!({
			"jsonrpc": "2.0",
			"method": method,
			"params": params,
			"id": id
		});

		let response = self
			.http_client
			.post(&self.rpc_url)
			.header("Content-Type", "application/json")
			.json(&request_body)
			.send()
			.await?
			.error_for_status()?;

		let mut response_json: serde_json::Value = response.json().await?;

		if let Some(error) = response_json.get("error") {
			return Err(LedgerError::RpcError {
				code: error.get("code").and_then(|c| c.as_i64()).unwrap_or_default(),
				message: error
					.get("message")
					.and_then(|m| m.as_str())
					.unwrap_or("Unknown JSON-RPC error")
					.to_string(),
			});
		}

		match response_json.get_mut("result") {
			Some(result) if !result.is_null() => Ok(result.take()),
			_ => Err(LedgerError::NoResult),
		}
	}
}

#[async_trait::async_trait]
impl LedgerLogSource for JsonRpcLedgerClient {
	async fn query_logs(
		&self,
		entity: &Entity,
		kind: EventKind,
		window: BlockWindow,
	) -> Result<Vec<RawLogEntry>, LedgerError> {
		let params = json!([{
			"fromBlock": format!("0x{:x}", window.from),
			"toBlock": format!("0x{:x}", window.to),
			"address": entity.address,
			"topics": [event_topic(kind.signature())]
		}]);

		let result = self.call("eth_getLogs", params).await?;
		let logs: Vec<RpcLog> = serde_json::from_value(result)?;
		debug!(
			"Fetched {} {} logs for {} in {}",
			logs.len(),
			kind,
			entity.name,
			window
		);

		logs.iter()
			.filter(|log| !log.removed)
			.map(|log| decode_geyser_log(kind, log))
			.collect()
	}
}

#[async_trait::async_trait]
impl TotalStakedSource for JsonRpcLedgerClient {
	async fn total_staked(
		&self,
		entity: &Entity,
		checkpoint_height: u64,
	) -> Result<i128, LedgerError> {
		let selector = function_selector(TOTAL_STAKED_SIGNATURE);
		let params = json!([
			{
				"to": entity.address,
				"data": format!("0x{}", hex::encode(selector))
			},
			format!("0x{:x}", checkpoint_height)
		]);

		let result = self.call("eth_call", params).await?;
		let raw = result.as_str().ok_or(LedgerError::NoResult)?;
		let bytes = decode_hex(raw)?;
		let total = word_as_u128(&bytes)?;
		i128::try_from(total).map_err(|_| {
			LedgerError::MalformedLog(format!("totalStaked {} exceeds signed 128 bits", total))
		})
	}
}
