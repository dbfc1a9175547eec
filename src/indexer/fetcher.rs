//! Paged fetch of one entity's stake history from the indexer.
//!
//! Pages are requested with an increasing offset until a page comes back empty
//! for both kinds. The page count is bounded; reaching the bound without an
//! empty page is reported as truncation rather than treated as completion.

use super::types::{IndexedEventSource, PageQuery};
use crate::config::FetchConfig;
use crate::error::{Origin, ReconcileError};
use crate::event::{CanonicalEvent, normalize_id, sort_for_display};
use crate::retry::{RetryPolicy, retry_transient};

use tracing::{debug, warn};

/// Result of a complete indexed fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
	/// Decoded events in display order
	pub events: Vec<CanonicalEvent>,
	/// Pages requested, including the empty terminating page
	pub pages_fetched: u32,
	/// The page bound was reached before an empty page was seen
	pub truncated: bool,
}

/// Pages through the indexer for one entity at a fixed checkpoint
pub struct IndexedFetcher<S> {
	source: S,
	config: FetchConfig,
	retry: RetryPolicy,
}

impl<S: IndexedEventSource> IndexedFetcher<S> {
	pub fn new(source: S, config: FetchConfig, retry: RetryPolicy) -> Self {
		Self {
			source,
			config,
			retry,
		}
	}

	/// Fetch every stake and unstake event of `entity_id` as of `checkpoint_height`.
	///
	/// # Errors
	/// Returns `ReconcileError::SourceUnavailable` if a page still fails after
	/// its retries, or if a record cannot be decoded.
	pub async fn fetch(
		&self,
		entity_id: &str,
		checkpoint_height: u64,
	) -> Result<FetchOutcome, ReconcileError> {
		// The indexer stores ids lowercase and matches them case-sensitively.
		let entity_id = normalize_id(entity_id);
		let mut events = Vec::new();
		let mut pages_fetched = 0u32;
		let mut exhausted = false;

		for page_index in 0..self.config.max_pages {
			let skip = u64::from(page_index)
				.checked_mul(self.config.page_size)
				.ok_or_else(|| {
					ReconcileError::unavailable(
						Origin::IndexedFetch,
						&entity_id,
						format!(
							"offset of page {} with page size {} overflows",
							page_index, self.config.page_size
						),
					)
				})?;
			let query = PageQuery {
				entity_id: entity_id.clone(),
				checkpoint_height,
				skip,
				first: self.config.page_size,
			};

			let what = format!("indexer page {} for {}", page_index, entity_id);
			let page = retry_transient(&self.retry, &what, || self.source.query_page(&query))
				.await
				.map_err(|e| ReconcileError::unavailable(Origin::IndexedFetch, &entity_id, e))?;
			pages_fetched += 1;

			if page.is_empty() {
				exhausted = true;
				break;
			}

			debug!(
				"Page {} for {} returned {} records",
				page_index,
				entity_id,
				page.len()
			);

			for (kind, record) in page.records() {
				let event = record.to_canonical(kind).map_err(|e| {
					ReconcileError::unavailable(Origin::IndexedFetch, &entity_id, e)
				})?;
				events.push(event);
			}
		}

		let truncated = !exhausted;
		if truncated {
			warn!(
				"Indexed fetch for {} hit the {} page bound without an empty page; results may be truncated",
				entity_id, self.config.max_pages
			);
		}

		sort_for_display(&mut events);

		Ok(FetchOutcome {
			events,
			pages_fetched,
			truncated,
		})
	}
}
