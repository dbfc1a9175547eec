//!
//! GraphQL client for the geyser indexer.
//!
//! This module provides an async client for the indexing service that tracks
//! geyser stake and unstake events. Queries are pinned to a block height so
//! that the indexer resolves historical state rather than its live head.

use super::types::*;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Both event kinds in one request, pinned to a block and paged per kind
const EVENT_PAGE_QUERY: &str = r#"
    query GeyserEvents($skip: Int!, $first: Int!, $geyser: String!, $blockheight: Int!) {
        stakedEvents(first: $first, skip: $skip, where: {geyser: $geyser},
            orderBy: timestamp, orderDirection: desc, block: {number: $blockheight}) {
            geyser {
                id
            }
            user
            amount
            timestamp
            blockNumber
        }
        unstakedEvents(first: $first, skip: $skip, where: {geyser: $geyser},
            orderBy: timestamp, orderDirection: desc, block: {number: $blockheight}) {
            geyser {
                id
            }
            user
            amount
            timestamp
            blockNumber
        }
    }
"#;

/// Geyser GraphQL indexer client
#[derive(Clone)]
pub struct GeyserIndexerClient {
	/// The underlying HTTP client for GraphQL queries.
	http_client: Client,
	/// The indexer GraphQL HTTP endpoint.
	indexer_url: String,
}

impl GeyserIndexerClient {
	/// Create a new indexer client.
	///
	/// # Arguments
	/// * `indexer_url` - The HTTP endpoint for GraphQL queries.
	/// * `timeout` - Per-request timeout.
	pub fn new(indexer_url: String, timeout: Duration) -> Result<Self, IndexerError> {
		let http_client = Client::builder().timeout(timeout).build()?;

		Ok(Self {
			http_client,
			indexer_url,
		})
	}

	/// Execute a GraphQL query.
	///
	/// # Arguments
	/// * `query` - The GraphQL query string.
	/// * `variables` - Optional variables for the query.
	///
	/// # Returns
	/// The JSON response from the indexer, or an `IndexerError` if the request fails.
	pub async fn execute_query(
		&self,
		query: &str,
		variables: Option<serde_json::Value>,
	) -> Result<serde_json::Value, IndexerError> {
		let request_body = json!({
			"query": query,
			"variables": variables
		});

		let response = self
			.http_client
			.post(&self.indexer_url)
			.header("Content-Type", "application/json")
			.json(&request_body)
			.send()
			.await?;

		if !response.status().is_success() {
			return Err(IndexerError::GraphQLError(format!(
				"HTTP error: {}",
				response.status()
			)));
		}

		let response_json: serde_json::Value = response.json().await?;

		if let Some(errors) = response_json.get("errors") {
			return Err(IndexerError::GraphQLError(format!(
				"GraphQL errors: {}",
				errors
			)));
		}

		Ok(response_json)
	}
}

#[async_trait::async_trait]
impl IndexedEventSource for GeyserIndexerClient {
	async fn query_page(&self, query: &PageQuery) -> Result<EventPage, IndexerError> {
		let variables = json!({
			"skip": query.skip,
			"first": query.first,
			"geyser": query.entity_id,
			"blockheight": query.checkpoint_height
		});

		let mut response = self.execute_query(EVENT_PAGE_QUERY, Some(variables)).await?;

		let data = response
			.get_mut("data")
			.map(serde_json::Value::take)
			.filter(|data| !data.is_null())
			.ok_or(IndexerError::NoData)?;

		let page = EventPage::from_response_data(data)?;
		debug!(
			"Indexer page for {} at skip {}: {} staked, {} unstaked",
			query.entity_id,
			query.skip,
			page.staked_events.len(),
			page.unstaked_events.len()
		);
		Ok(page)
	}
}
