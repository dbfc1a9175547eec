//! In-memory stand-ins for the ledger node and the indexer, used by tests

use crate::config::Entity;
use crate::event::EventKind;
use crate::indexer::{
	EventPage, GeyserRef, IndexedEventRecord, IndexedEventSource, IndexerError, PageQuery,
};
use crate::ledger::{BlockWindow, LedgerError, LedgerLogSource, RawLogEntry, TotalStakedSource};

use std::collections::HashMap;
use std::sync::Mutex;

pub fn entity(address: &str, genesis_height: u64) -> Entity {
	Entity {
		name: "pool".to_string(),
		address: address.to_string(),
		genesis_height,
	}
}

pub fn raw(account: &str, amount: u128, timestamp: u64, block_height: u64) -> RawLogEntry {
	RawLogEntry {
		account: account.to_string(),
		amount,
		timestamp,
		block_height,
	}
}

pub fn record(
	geyser: &str,
	user: &str,
	amount: u128,
	timestamp: u64,
	block_number: u64,
) -> IndexedEventRecord {
	IndexedEventRecord {
		geyser: GeyserRef {
			id: geyser.to_string(),
		},
		user: user.to_string(),
		amount,
		timestamp,
		block_number,
	}
}

/// Ledger node holding a fixed set of logs
#[derive(Default)]
pub struct FakeLedger {
	logs: Vec<(EventKind, RawLogEntry)>,
	/// Windows larger than this are rejected like a rate-limited provider would
	max_window: Option<u64>,
	/// Remaining transient failures per window start
	failures: Mutex<HashMap<u64, u32>>,
	total: i128,
	pub queries: Mutex<Vec<(EventKind, BlockWindow)>>,
}

impl FakeLedger {
	pub fn new(logs: Vec<(EventKind, RawLogEntry)>) -> Self {
		Self {
			logs,
			..Self::default()
		}
	}

	pub fn with_max_window(mut self, max_window: u64) -> Self {
		self.max_window = Some(max_window);
		self
	}

	pub fn with_total(mut self, total: i128) -> Self {
		self.total = total;
		self
	}

	/// Fail the window starting at `from` for the next `times` queries
	pub fn failing_window(self, from: u64, times: u32) -> Self {
		self.failures
			.lock()
			.expect("fake lock")
			.insert(from, times);
		self
	}

	pub fn windows_queried(&self) -> Vec<BlockWindow> {
		let mut windows: Vec<_> = self
			.queries
			.lock()
			.expect("fake lock")
			.iter()
			.filter(|(kind, _)| *kind == EventKind::Staked)
			.map(|(_, window)| *window)
			.collect();
		windows.sort();
		windows
	}
}

#[async_trait::async_trait]
impl LedgerLogSource for FakeLedger {
	async fn query_logs(
		&self,
		_entity: &Entity,
		kind: EventKind,
		window: BlockWindow,
	) -> Result<Vec<RawLogEntry>, LedgerError> {
		self.queries
			.lock()
			.expect("fake lock")
			.push((kind, window));

		if let Some(max_window) = self.max_window {
			if window.len() > max_window {
				return Err(LedgerError::MalformedLog(format!(
					"window {} exceeds {} blocks",
					window, max_window
				)));
			}
		}

		if let Some(remaining) = self
			.failures
			.lock()
			.expect("fake lock")
			.get_mut(&window.from)
		{
			if *remaining > 0 {
				*remaining -= 1;
				return Err(LedgerError::RpcError {
					code: -32000,
					message: "upstream timeout".to_string(),
				});
			}
		}

		Ok(self
			.logs
			.iter()
			.filter(|(log_kind, entry)| *log_kind == kind && window.contains(entry.block_height))
			.map(|(_, entry)| entry.clone())
			.collect())
	}
}

#[async_trait::async_trait]
impl TotalStakedSource for FakeLedger {
	async fn total_staked(&self, _entity: &Entity, _checkpoint_height: u64) -> Result<i128, LedgerError> {
		Ok(self.total)
	}
}

/// Largest page an endless indexer returns, whatever the requested size
const ENDLESS_PAGE_CAP: usize = 10_000;

/// Indexer holding a fixed set of records, stored under lowercase ids
#[derive(Default)]
pub struct FakeIndexer {
	staked: Vec<IndexedEventRecord>,
	unstaked: Vec<IndexedEventRecord>,
	/// Every page is full, so paging never sees an empty page
	endless: bool,
	/// Remaining transient failures before queries succeed
	failures: Mutex<u32>,
	/// Every page carries a record with a non-numeric amount
	malformed: bool,
	pub queries: Mutex<Vec<PageQuery>>,
}

impl FakeIndexer {
	pub fn new(staked: Vec<IndexedEventRecord>, unstaked: Vec<IndexedEventRecord>) -> Self {
		Self {
			staked,
			unstaked,
			..Self::default()
		}
	}

	pub fn endless(staked: Vec<IndexedEventRecord>) -> Self {
		Self {
			staked,
			endless: true,
			..Self::default()
		}
	}

	pub fn failing(self, times: u32) -> Self {
		*self.failures.lock().expect("fake lock") = times;
		self
	}

	pub fn malformed(self) -> Self {
		Self {
			malformed: true,
			..self
		}
	}

	pub fn query_count(&self) -> usize {
		self.queries.lock().expect("fake lock").len()
	}

	fn slice(&self, records: &[IndexedEventRecord], query: &PageQuery) -> Vec<IndexedEventRecord> {
		let visible: Vec<_> = records
			.iter()
			.filter(|r| r.geyser.id == query.entity_id)
			.filter(|r| r.block_number <= query.checkpoint_height)
			.cloned()
			.collect();

		if self.endless {
			let first = usize::try_from(query.first).unwrap_or(usize::MAX);
			return visible
				.into_iter()
				.cycle()
				.take(first.min(ENDLESS_PAGE_CAP))
				.collect();
		}

		visible
			.into_iter()
			.skip(query.skip as usize)
			.take(query.first as usize)
			.collect()
	}
}

#[async_trait::async_trait]
impl IndexedEventSource for FakeIndexer {
	async fn query_page(&self, query: &PageQuery) -> Result<EventPage, IndexerError> {
		self.queries
			.lock()
			.expect("fake lock")
			.push(query.clone());

		{
			let mut failures = self.failures.lock().expect("fake lock");
			if *failures > 0 {
				*failures -= 1;
				return Err(IndexerError::GraphQLError("indexer busy".to_string()));
			}
		}

		if self.malformed {
			return EventPage::from_response_data(serde_json::json!({
				"stakedEvents": [{
					"geyser": { "id": query.entity_id },
					"user": "0xaa",
					"amount": "12abc",
					"timestamp": "1",
					"blockNumber": "1"
				}]
			}));
		}

		Ok(EventPage {
			staked_events: self.slice(&self.staked, query),
			unstaked_events: self.slice(&self.unstaked, query),
		})
	}
}
