//! Direct ledger scan of an entity's stake history.
//!
//! The block range from the entity's genesis to the checkpoint is split into
//! windows no larger than the log query capability accepts. Windows are
//! scanned concurrently; any window that still fails after its retries fails
//! the whole scan.

use super::types::{BlockWindow, LedgerLogSource};
use crate::config::{Entity, ScanConfig};
use crate::error::{Origin, ReconcileError};
use crate::event::{CanonicalEvent, EventKind, sort_for_display};
use crate::retry::{RetryPolicy, retry_transient};

use futures::{StreamExt, TryStreamExt, stream};
use tracing::debug;

/// Split `[genesis_height, checkpoint_height]` into consecutive windows of at
/// most `window_size` blocks. The last window is clipped to the checkpoint.
pub fn block_windows(genesis_height: u64, checkpoint_height: u64, window_size: u64) -> Vec<BlockWindow> {
	let mut windows = Vec::new();
	if window_size == 0 || genesis_height > checkpoint_height {
		return windows;
	}

	let mut from = genesis_height;
	loop {
		let to = from.saturating_add(window_size - 1).min(checkpoint_height);
		windows.push(BlockWindow { from, to });
		if to == checkpoint_height {
			break;
		}
		from = to + 1;
	}
	windows
}

/// Scans ledger logs window by window
pub struct LedgerScanner<S> {
	source: S,
	config: ScanConfig,
	retry: RetryPolicy,
}

impl<S: LedgerLogSource> LedgerScanner<S> {
	pub fn new(source: S, config: ScanConfig, retry: RetryPolicy) -> Self {
		Self {
			source,
			config,
			retry,
		}
	}

	/// Scan every stake and unstake log of `entity` between `genesis_height`
	/// and `checkpoint_height`, both inclusive.
	///
	/// # Errors
	/// Returns `ReconcileError::SourceUnavailable` if any window fails after
	/// its retries or contains an undecodable log.
	pub async fn scan(
		&self,
		entity: &Entity,
		genesis_height: u64,
		checkpoint_height: u64,
	) -> Result<Vec<CanonicalEvent>, ReconcileError> {
		let windows = block_windows(genesis_height, checkpoint_height, self.config.window_size);
		debug!(
			"Scanning {} from {} to {} in {} windows",
			entity.name,
			genesis_height,
			checkpoint_height,
			windows.len()
		);

		let per_window: Vec<Vec<CanonicalEvent>> = stream::iter(windows)
			.map(|window| self.scan_window(entity, window))
			.buffer_unordered(self.config.max_concurrent_windows.max(1))
			.try_collect()
			.await?;

		let mut events: Vec<CanonicalEvent> = per_window.into_iter().flatten().collect();
		sort_for_display(&mut events);
		Ok(events)
	}

	async fn scan_window(
		&self,
		entity: &Entity,
		window: BlockWindow,
	) -> Result<Vec<CanonicalEvent>, ReconcileError> {
		let (mut staked, unstaked) = futures::try_join!(
			self.scan_kind(entity, EventKind::Staked, window),
			self.scan_kind(entity, EventKind::Unstaked, window),
		)?;

		debug!(
			"Window {} of {}: {} staked, {} unstaked",
			window,
			entity.name,
			staked.len(),
			unstaked.len()
		);
		staked.extend(unstaked);
		Ok(staked)
	}

	async fn scan_kind(
		&self,
		entity: &Entity,
		kind: EventKind,
		window: BlockWindow,
	) -> Result<Vec<CanonicalEvent>, ReconcileError> {
		let what = format!("{} logs of {} in {}", kind, entity.name, window);
		let entries = retry_transient(&self.retry, &what, || {
			self.source.query_logs(entity, kind, window)
		})
		.await
		.map_err(|e| ReconcileError::unavailable(Origin::LedgerScan, &entity.name, e))?;

		entries
			.iter()
			.map(|entry| {
				CanonicalEvent::new(
					kind,
					&entity.address,
					&entry.account,
					entry.amount,
					entry.timestamp,
					entry.block_height,
				)
				.map_err(|e| ReconcileError::unavailable(Origin::LedgerScan, &entity.name, e))
			})
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::event::net_total;
	use crate::ledger::RawLogEntry;
	use crate::testing::{FakeLedger, entity, raw};
	use itertools::Itertools;

	fn scanner(ledger: FakeLedger, window_size: u64) -> LedgerScanner<FakeLedger> {
		LedgerScanner::new(
			ledger,
			ScanConfig {
				window_size,
				max_concurrent_windows: 3,
			},
			RetryPolicy::immediate(3),
		)
	}

	/// Logs on and around window boundaries of both 7,000 and 10,000 blocks
	fn boundary_history(genesis: u64) -> Vec<(EventKind, RawLogEntry)> {
		[0u64, 1, 6_999, 7_000, 7_001, 9_999, 10_000, 10_001, 13_999, 14_000, 19_999, 20_000, 24_321]
			.iter()
			.enumerate()
			.map(|(i, offset)| {
				let kind = if i % 3 == 2 { EventKind::Unstaked } else { EventKind::Staked };
				let height = genesis + offset;
				(kind, raw(&format!("0x{:02X}", i), 100 + i as u128, height, height))
			})
			.collect()
	}

	#[test]
	fn windows_cover_the_range_without_overlap() {
		let windows = block_windows(100, 25_000, 10_000);
		assert_eq!(
			windows,
			vec![
				BlockWindow { from: 100, to: 10_099 },
				BlockWindow { from: 10_100, to: 20_099 },
				BlockWindow { from: 20_100, to: 25_000 },
			]
		);
		assert!(windows.iter().all(|w| w.len() <= 10_000));
	}

	#[test]
	fn exact_multiple_includes_the_checkpoint() {
		let windows = block_windows(0, 20_000, 10_000);
		assert_eq!(windows.last(), Some(&BlockWindow { from: 20_000, to: 20_000 }));
		assert_eq!(windows.iter().map(BlockWindow::len).sum::<u64>(), 20_001);
	}

	#[test]
	fn single_block_and_empty_ranges() {
		assert_eq!(block_windows(7, 7, 10_000), vec![BlockWindow { from: 7, to: 7 }]);
		assert!(block_windows(8, 7, 10_000).is_empty());
		assert!(block_windows(0, 7, 0).is_empty());
	}

	#[test]
	fn windows_near_the_top_of_the_range_do_not_overflow() {
		let windows = block_windows(u64::MAX - 5, u64::MAX, 4);
		assert_eq!(
			windows,
			vec![
				BlockWindow { from: u64::MAX - 5, to: u64::MAX - 2 },
				BlockWindow { from: u64::MAX - 1, to: u64::MAX },
			]
		);
	}

	#[tokio::test]
	async fn scan_decodes_and_negates_unstakes() {
		let ledger = FakeLedger::new(vec![
			(EventKind::Staked, raw("0xAA", 50, 10, 120)),
			(EventKind::Unstaked, raw("0xaa", 20, 20, 200)),
		]);
		let events = scanner(ledger, 10_000)
			.scan(&entity("0xPOOL", 100), 100, 250)
			.await
			.expect("scan succeeds");

		assert_eq!(events.len(), 2);
		assert_eq!(events[0].signed_amount(), -20);
		assert_eq!(events[1].signed_amount(), 50);
		assert!(events.iter().all(|e| e.account() == "0xaa" && e.entity_id() == "0xpool"));
		assert_eq!(net_total(&events), Some(30));
	}

	#[tokio::test]
	async fn every_window_respects_the_query_limit() {
		let ledger = FakeLedger::new(boundary_history(1_000)).with_max_window(10_000);
		let scanner = scanner(ledger, 10_000);
		scanner
			.scan(&entity("0xpool", 1_000), 1_000, 26_000)
			.await
			.expect("scan succeeds");

		let windows = scanner.source.windows_queried();
		assert_eq!(windows.len(), 3);
		assert_eq!(windows.first().map(|w| w.from), Some(1_000));
		assert_eq!(windows.last().map(|w| w.to), Some(26_000));
		// One query per kind per window.
		assert_eq!(scanner.source.queries.lock().expect("fake lock").len(), 6);
	}

	#[tokio::test]
	async fn window_size_does_not_drop_or_duplicate_boundary_events() {
		let genesis = 5_000;
		let checkpoint = genesis + 24_321;
		let pool = entity("0xpool", genesis);

		let coarse = scanner(FakeLedger::new(boundary_history(genesis)), 10_000)
			.scan(&pool, genesis, checkpoint)
			.await
			.expect("scan succeeds");
		let fine = scanner(FakeLedger::new(boundary_history(genesis)), 7_000)
			.scan(&pool, genesis, checkpoint)
			.await
			.expect("scan succeeds");

		assert_eq!(coarse.len(), boundary_history(genesis).len());
		let sorted = |events: &[CanonicalEvent]| {
			events
				.iter()
				.cloned()
				.sorted_by_key(|e| (e.block_height(), e.account().to_string()))
				.collect::<Vec<_>>()
		};
		assert_eq!(sorted(&coarse), sorted(&fine));
	}

	#[tokio::test]
	async fn events_after_the_checkpoint_are_not_scanned() {
		let ledger = FakeLedger::new(vec![
			(EventKind::Staked, raw("0xaa", 5, 1, 150)),
			(EventKind::Staked, raw("0xaa", 7, 2, 251)),
		]);
		let events = scanner(ledger, 10_000)
			.scan(&entity("0xpool", 100), 100, 250)
			.await
			.expect("scan succeeds");
		assert_eq!(events.len(), 1);
		assert_eq!(events[0].block_height(), 150);
	}

	#[tokio::test]
	async fn transient_window_failures_are_retried() {
		let ledger = FakeLedger::new(boundary_history(0)).failing_window(10_000, 2);
		let events = scanner(ledger, 10_000)
			.scan(&entity("0xpool", 0), 0, 30_000)
			.await
			.expect("scan succeeds");
		assert_eq!(events.len(), boundary_history(0).len());
	}

	#[tokio::test]
	async fn one_failed_window_fails_the_whole_scan() {
		let ledger = FakeLedger::new(boundary_history(0)).failing_window(10_000, 100);
		let result = scanner(ledger, 10_000)
			.scan(&entity("0xpool", 0), 0, 30_000)
			.await;

		assert!(matches!(
			result,
			Err(ReconcileError::SourceUnavailable {
				origin: Origin::LedgerScan,
				..
			})
		));
	}
}
