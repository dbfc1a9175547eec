//! Reconciler coordinating both sources for one entity.
//!
//! The ledger scan and the indexed fetch run concurrently against the same
//! explicit checkpoint. Either one failing aborts the run; disagreements are
//! not errors but a `Diverged` verdict in the report.

use super::report::{ReconciliationReport, display_total};
use crate::config::{CheckConfig, Entity};
use crate::error::{Origin, ReconcileError};
use crate::indexer::{IndexedEventSource, IndexedFetcher};
use crate::ledger::{LedgerLogSource, LedgerScanner, TotalStakedSource};
use crate::retry::{RetryPolicy, retry_transient};

use tracing::{error, info, warn};

/// Reconciles ledger and indexer histories
pub struct Reconciler<L, I, T> {
	scanner: LedgerScanner<L>,
	fetcher: IndexedFetcher<I>,
	totals: T,
	retry: RetryPolicy,
	checks: CheckConfig,
}

impl<L, I, T> Reconciler<L, I, T>
where
	L: LedgerLogSource,
	I: IndexedEventSource,
	T: TotalStakedSource,
{
	pub fn new(
		scanner: LedgerScanner<L>,
		fetcher: IndexedFetcher<I>,
		totals: T,
		retry: RetryPolicy,
		checks: CheckConfig,
	) -> Self {
		Self {
			scanner,
			fetcher,
			totals,
			retry,
			checks,
		}
	}

	/// Reconcile `entity` at `checkpoint_height` against `expected_total`.
	///
	/// # Errors
	/// Returns `ReconcileError::SourceUnavailable` if either source cannot be
	/// read completely.
	pub async fn reconcile(
		&self,
		entity: &Entity,
		checkpoint_height: u64,
		expected_total: i128,
	) -> Result<ReconciliationReport, ReconcileError> {
		info!(
			"Reconciling {} ({}) at height {}",
			entity.name, entity.address, checkpoint_height
		);

		let (ledger_events, indexed) = tokio::try_join!(
			self.scanner
				.scan(entity, entity.genesis_height, checkpoint_height),
			self.fetcher.fetch(&entity.address, checkpoint_height),
		)?;

		let report = ReconciliationReport::build(
			entity,
			checkpoint_height,
			expected_total,
			&ledger_events,
			&indexed,
			self.checks.row_level,
		);
		log_report(&report);
		Ok(report)
	}

	/// Read the authoritative total at the checkpoint, then reconcile against it.
	pub async fn reconcile_with_ground_truth(
		&self,
		entity: &Entity,
		checkpoint_height: u64,
	) -> Result<ReconciliationReport, ReconcileError> {
		let what = format!("totalStaked of {} at {}", entity.name, checkpoint_height);
		let expected_total = retry_transient(&self.retry, &what, || {
			self.totals.total_staked(entity, checkpoint_height)
		})
		.await
		.map_err(|e| ReconcileError::unavailable(Origin::GroundTruth, &entity.name, e))?;

		self.reconcile(entity, checkpoint_height, expected_total).await
	}
}

fn log_report(report: &ReconciliationReport) {
	if report.passed() {
		info!("{}", report.summary());
	} else {
		error!("{}", report.summary());
	}

	if !report.aggregate.passed() {
		warn!(
			"{}: aggregate mismatch, expected {}, ledger {}, indexed {}",
			report.entity,
			report.aggregate.expected_total,
			display_total(report.aggregate.ledger_total),
			display_total(report.aggregate.indexed_total)
		);
	}
	for divergence in &report.projection_divergences {
		warn!(
			"{}: {} projection diverges at index {} (ledger {:?}, indexed {:?})",
			report.entity,
			divergence.projection,
			divergence.index,
			divergence.ledger,
			divergence.indexed
		);
	}
	if !report.set_check_reliable() {
		warn!(
			"{}: indexed history truncated, set agreement is unreliable",
			report.entity
		);
	}
}
