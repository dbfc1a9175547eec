//! Reconciliation report for one entity at one checkpoint

use super::checks::{Divergence, RowDifference, projection_divergences, row_difference};
use crate::config::Entity;
use crate::event::{CanonicalEvent, net_total, normalize_id};
use crate::indexer::FetchOutcome;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Overall outcome of a reconciliation
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
	Passed,
	/// At least one enforced check disagreed
	Diverged,
}

/// Conditions that do not fail a run but weaken its conclusions
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FetchWarning {
	/// The indexed fetch hit its page bound before an empty page
	ResultTruncated { pages_fetched: u32 },
}

/// Check A: both sources sum to the authoritative total
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AggregateCheck {
	pub expected_total: i128,
	/// `None` if the ledger history sums beyond 128 bits
	pub ledger_total: Option<i128>,
	/// `None` if the indexed history sums beyond 128 bits
	pub indexed_total: Option<i128>,
}

impl AggregateCheck {
	pub fn ledger_agrees(&self) -> bool {
		self.ledger_total == Some(self.expected_total)
	}

	pub fn indexed_agrees(&self) -> bool {
		self.indexed_total == Some(self.expected_total)
	}

	/// True when either collection could not be summed
	pub fn overflowed(&self) -> bool {
		self.ledger_total.is_none() || self.indexed_total.is_none()
	}

	pub fn passed(&self) -> bool {
		self.ledger_agrees() && self.indexed_agrees()
	}
}

/// Outcome of reconciling one entity
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReport {
	pub entity: String,
	/// Lowercase entity identifier
	pub entity_id: String,
	pub checkpoint_height: u64,
	pub generated_at: DateTime<Utc>,
	pub ledger_event_count: usize,
	pub indexed_event_count: usize,
	/// Check A
	pub aggregate: AggregateCheck,
	/// Check B, one entry per diverging projection
	pub projection_divergences: Vec<Divergence>,
	/// Whole-row comparison
	pub row_difference: RowDifference,
	/// Whether the row comparison contributes to the verdict
	pub row_check_enforced: bool,
	pub warnings: Vec<FetchWarning>,
	pub verdict: Verdict,
}

impl ReconciliationReport {
	/// Run both checks over the two collections and derive the verdict.
	pub fn build(
		entity: &Entity,
		checkpoint_height: u64,
		expected_total: i128,
		ledger_events: &[CanonicalEvent],
		indexed: &FetchOutcome,
		row_check_enforced: bool,
	) -> Self {
		let aggregate = AggregateCheck {
			expected_total,
			ledger_total: net_total(ledger_events),
			indexed_total: net_total(&indexed.events),
		};
		let projection_divergences = projection_divergences(ledger_events, &indexed.events);
		let row_difference = row_difference(ledger_events, &indexed.events);

		let mut warnings = Vec::new();
		if indexed.truncated {
			warnings.push(FetchWarning::ResultTruncated {
				pages_fetched: indexed.pages_fetched,
			});
		}

		let rows_agree = !row_check_enforced || row_difference.is_empty();
		let verdict = if aggregate.passed() && projection_divergences.is_empty() && rows_agree {
			Verdict::Passed
		} else {
			Verdict::Diverged
		};

		Self {
			entity: entity.name.clone(),
			entity_id: normalize_id(&entity.address),
			checkpoint_height,
			generated_at: Utc::now(),
			ledger_event_count: ledger_events.len(),
			indexed_event_count: indexed.events.len(),
			aggregate,
			projection_divergences,
			row_difference,
			row_check_enforced,
			warnings,
			verdict,
		}
	}

	pub fn passed(&self) -> bool {
		self.verdict == Verdict::Passed
	}

	pub fn is_truncated(&self) -> bool {
		self.warnings
			.iter()
			.any(|w| matches!(w, FetchWarning::ResultTruncated { .. }))
	}

	/// Check B passed on the data that was fetched
	pub fn sets_agree(&self) -> bool {
		self.projection_divergences.is_empty()
	}

	/// Check B can be trusted only when the indexed history is complete
	pub fn set_check_reliable(&self) -> bool {
		!self.is_truncated()
	}

	/// Get a human-readable one-line summary of the report
	pub fn summary(&self) -> String {
		format!(
			"{} at {}: {:?}; totals expected {} / ledger {} / indexed {}; {} vs {} events; {} projection divergences, {} rows only in ledger, {} rows only in indexed{}",
			self.entity,
			self.checkpoint_height,
			self.verdict,
			self.aggregate.expected_total,
			display_total(self.aggregate.ledger_total),
			display_total(self.aggregate.indexed_total),
			self.ledger_event_count,
			self.indexed_event_count,
			self.projection_divergences.len(),
			self.row_difference.only_in_ledger.len(),
			self.row_difference.only_in_indexed.len(),
			if self.is_truncated() {
				" (indexed results truncated, set check unreliable)"
			} else {
				""
			}
		)
	}
}

/// Render a net total, or `overflow` when it could not be computed
pub fn display_total(total: Option<i128>) -> String {
	match total {
		Some(total) => total.to_string(),
		None => "overflow".to_string(),
	}
}
