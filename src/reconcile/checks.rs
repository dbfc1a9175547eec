//! Set agreement checks between the two event collections.
//!
//! The projection check compares the sorted `account`, `block_height` and
//! `signed_amount` columns independently. It can pass when rows are
//! cross-matched, so the row check compares whole
//! `(account, signed_amount, block_height, timestamp)` tuples as a multiset.

use crate::event::CanonicalEvent;

use itertools::{EitherOrBoth, Itertools};
use serde::Serialize;
use std::collections::HashMap;

/// Column extracted from both collections for the projection check
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Projection {
	Account,
	BlockHeight,
	SignedAmount,
}

impl Projection {
	pub const ALL: [Projection; 3] = [
		Projection::Account,
		Projection::BlockHeight,
		Projection::SignedAmount,
	];
}

impl std::fmt::Display for Projection {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Projection::Account => write!(f, "account"),
			Projection::BlockHeight => write!(f, "block_height"),
			Projection::SignedAmount => write!(f, "signed_amount"),
		}
	}
}

/// First position at which a sorted projection differs between sources
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Divergence {
	pub projection: Projection,
	/// Index into the ascending-sorted projection
	pub index: usize,
	/// Ledger value at `index`, absent when the ledger side is shorter
	pub ledger: Option<String>,
	/// Indexed value at `index`, absent when the indexed side is shorter
	pub indexed: Option<String>,
}

/// Sort both sequences ascending and return the first index where they differ.
pub fn first_divergence<T: Ord>(ledger: Vec<T>, indexed: Vec<T>) -> Option<(usize, Option<T>, Option<T>)> {
	ledger
		.into_iter()
		.sorted()
		.zip_longest(indexed.into_iter().sorted())
		.enumerate()
		.find_map(|(index, pair)| match pair {
			EitherOrBoth::Both(l, i) if l == i => None,
			EitherOrBoth::Both(l, i) => Some((index, Some(l), Some(i))),
			EitherOrBoth::Left(l) => Some((index, Some(l), None)),
			EitherOrBoth::Right(i) => Some((index, None, Some(i))),
		})
}

fn divergence_of<T, F>(
	projection: Projection,
	ledger: &[CanonicalEvent],
	indexed: &[CanonicalEvent],
	column: F,
) -> Option<Divergence>
where
	T: Ord + ToString,
	F: Fn(&CanonicalEvent) -> T,
{
	first_divergence(
		ledger.iter().map(&column).collect(),
		indexed.iter().map(&column).collect(),
	)
	.map(|(index, l, i)| Divergence {
		projection,
		index,
		ledger: l.map(|v| v.to_string()),
		indexed: i.map(|v| v.to_string()),
	})
}

/// Compare the three sorted projections, returning one entry per diverging
/// projection. An empty result means the check passed.
pub fn projection_divergences(ledger: &[CanonicalEvent], indexed: &[CanonicalEvent]) -> Vec<Divergence> {
	Projection::ALL
		.iter()
		.filter_map(|projection| match projection {
			Projection::Account => divergence_of(*projection, ledger, indexed, |e| {
				e.account().to_string()
			}),
			Projection::BlockHeight => {
				divergence_of(*projection, ledger, indexed, CanonicalEvent::block_height)
			}
			Projection::SignedAmount => {
				divergence_of(*projection, ledger, indexed, CanonicalEvent::signed_amount)
			}
		})
		.collect()
}

/// Row identity used by the whole-row check
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventRow {
	pub account: String,
	pub signed_amount: i128,
	pub block_height: u64,
	pub timestamp: u64,
}

impl From<&CanonicalEvent> for EventRow {
	fn from(event: &CanonicalEvent) -> Self {
		Self {
			account: event.account().to_string(),
			signed_amount: event.signed_amount(),
			block_height: event.block_height(),
			timestamp: event.timestamp(),
		}
	}
}

/// Rows present on one side but not the other, counting multiplicity
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct RowDifference {
	pub only_in_ledger: Vec<EventRow>,
	pub only_in_indexed: Vec<EventRow>,
}

impl RowDifference {
	pub fn is_empty(&self) -> bool {
		self.only_in_ledger.is_empty() && self.only_in_indexed.is_empty()
	}
}

/// Multiset difference of whole rows between the two collections.
pub fn row_difference(ledger: &[CanonicalEvent], indexed: &[CanonicalEvent]) -> RowDifference {
	let mut balance: HashMap<EventRow, i64> = HashMap::new();
	for event in ledger {
		*balance.entry(EventRow::from(event)).or_default() += 1;
	}
	for event in indexed {
		*balance.entry(EventRow::from(event)).or_default() -= 1;
	}

	let mut difference = RowDifference::default();
	for (row, count) in balance.into_iter().sorted() {
		let copies = count.unsigned_abs() as usize;
		if count > 0 {
			difference
				.only_in_ledger
				.extend(std::iter::repeat_n(row, copies));
		} else if count < 0 {
			difference
				.only_in_indexed
				.extend(std::iter::repeat_n(row, copies));
		}
	}
	difference
}
