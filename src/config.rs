//!
//! Run configuration and the entity registry.
//!
//! Configuration is a JSON document; every field has a default, so a file only
//! needs the endpoints and the entities. Endpoints can be overridden through
//! the environment so that API keys stay out of the file.

use crate::retry::{DelayStrategy, RetryPolicy};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Environment variable holding the config file path
pub const CONFIG_PATH_ENV: &str = "GEYSER_RECONCILE_CONFIG";
/// Environment override for the ledger JSON-RPC endpoint
pub const RPC_URL_ENV: &str = "GEYSER_RECONCILE_RPC_URL";
/// Environment override for the indexer GraphQL endpoint
pub const INDEXER_URL_ENV: &str = "GEYSER_RECONCILE_INDEXER_URL";

/// One program instance whose stake history is reconciled
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Entity {
	/// Human-readable name used in logs and reports
	pub name: String,
	/// Contract address, in whatever case the registry stores it
	pub address: String,
	/// First block at which the entity could have emitted events
	pub genesis_height: u64,
}

/// Ledger scan settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScanConfig {
	/// Largest block window accepted by the log query capability
	pub window_size: u64,
	/// Windows queried at the same time for one entity
	pub max_concurrent_windows: usize,
}

impl Default for ScanConfig {
	fn default() -> Self {
		Self {
			window_size: 10_000,
			max_concurrent_windows: 4,
		}
	}
}

/// Indexed fetch settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FetchConfig {
	/// Records requested per kind per page
	pub page_size: u64,
	/// Safety bound on the number of pages per entity
	pub max_pages: u32,
}

impl Default for FetchConfig {
	fn default() -> Self {
		Self {
			page_size: 1_000,
			max_pages: 100,
		}
	}
}

/// Which checks decide the verdict
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CheckConfig {
	/// Require whole-row agreement on top of the projection checks
	pub row_level: bool,
}

impl Default for CheckConfig {
	fn default() -> Self {
		Self { row_level: true }
	}
}

/// Top-level configuration of a reconciliation run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReconcileConfig {
	pub rpc_url: String,
	pub indexer_url: String,
	pub request_timeout_secs: u64,
	/// Fixed checkpoint; when absent the chain head is read once at start
	pub checkpoint_height: Option<u64>,
	/// Entities reconciled at the same time
	pub max_concurrent_entities: usize,
	pub scan: ScanConfig,
	pub fetch: FetchConfig,
	pub retry: RetryPolicy,
	pub checks: CheckConfig,
	pub entities: Vec<Entity>,
}

impl Default for ReconcileConfig {
	fn default() -> Self {
		Self {
			rpc_url: "http://localhost:8545".to_string(),
			indexer_url: "https://api.thegraph.com/subgraphs/name/m4azey/badger-finance"
				.to_string(),
			request_timeout_secs: 30,
			checkpoint_height: None,
			max_concurrent_entities: 2,
			scan: ScanConfig::default(),
			fetch: FetchConfig::default(),
			retry: RetryPolicy::default(),
			checks: CheckConfig::default(),
			entities: Vec::new(),
		}
	}
}

impl ReconcileConfig {
	/// Parse a configuration document and validate it.
	pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
		let config: Self = serde_json::from_str(content)?;
		config.validate()?;
		Ok(config)
	}

	/// Load the configuration file at `path`, then apply environment overrides.
	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
			path: path.display().to_string(),
			source,
		})?;
		let config: Self = serde_json::from_str(&content)?;
		let config = config.with_overrides(
			std::env::var(RPC_URL_ENV).ok(),
			std::env::var(INDEXER_URL_ENV).ok(),
		);
		config.validate()?;
		Ok(config)
	}

	/// Replace endpoints with the given overrides, ignoring empty values.
	pub fn with_overrides(mut self, rpc_url: Option<String>, indexer_url: Option<String>) -> Self {
		if let Some(url) = rpc_url.filter(|u| !u.trim().is_empty()) {
			self.rpc_url = url;
		}
		if let Some(url) = indexer_url.filter(|u| !u.trim().is_empty()) {
			self.indexer_url = url;
		}
		self
	}

	/// Reject settings that would make a run meaningless or non-terminating.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.scan.window_size == 0 {
			return Err(ConfigError::Invalid("scan.window_size must be positive".into()));
		}
		if self.scan.max_concurrent_windows == 0 {
			return Err(ConfigError::Invalid(
				"scan.max_concurrent_windows must be positive".into(),
			));
		}
		if self.fetch.page_size == 0 {
			return Err(ConfigError::Invalid("fetch.page_size must be positive".into()));
		}
		if self.fetch.max_pages == 0 {
			return Err(ConfigError::Invalid("fetch.max_pages must be positive".into()));
		}
		if self
			.fetch
			.page_size
			.checked_mul(u64::from(self.fetch.max_pages))
			.is_none()
		{
			return Err(ConfigError::Invalid(
				"fetch.page_size times fetch.max_pages exceeds the offset range".into(),
			));
		}
		if self.retry.max_attempts == 0 {
			return Err(ConfigError::Invalid("retry.max_attempts must be positive".into()));
		}
		if let DelayStrategy::Exponential { multiplier, .. } = self.retry.strategy {
			if !(multiplier >= 1.0) {
				return Err(ConfigError::Invalid(
					"retry multiplier must be at least 1.0".into(),
				));
			}
		}
		if self.max_concurrent_entities == 0 {
			return Err(ConfigError::Invalid(
				"max_concurrent_entities must be positive".into(),
			));
		}
		if self.entities.is_empty() {
			return Err(ConfigError::Invalid("entity registry is empty".into()));
		}

		let mut names = HashSet::new();
		for entity in &self.entities {
			if entity.address.trim().is_empty() {
				return Err(ConfigError::Invalid(format!(
					"entity {} has no address",
					entity.name
				)));
			}
			if !names.insert(entity.name.as_str()) {
				return Err(ConfigError::Invalid(format!(
					"duplicate entity name {}",
					entity.name
				)));
			}
		}

		Ok(())
	}

	/// Look up a registry entry by name.
	pub fn entity(&self, name: &str) -> Option<&Entity> {
		self.entities.iter().find(|e| e.name == name)
	}
}

/// Errors raised while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("Failed to read {path}: {source}")]
	Io {
		path: String,
		#[source]
		source: std::io::Error,
	},

	#[error("JSON parse error: {0}")]
	JsonError(#[from] serde_json::Error),

	#[error("Invalid configuration: {0}")]
	Invalid(String),
}
