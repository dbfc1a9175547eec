use futures::{StreamExt, stream};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use geyser_reconcile::config::{CONFIG_PATH_ENV, ReconcileConfig};
use geyser_reconcile::indexer::{GeyserIndexerClient, IndexedFetcher};
use geyser_reconcile::ledger::{JsonRpcLedgerClient, LedgerScanner};
use geyser_reconcile::reconcile::Reconciler;

const DEFAULT_CONFIG_PATH: &str = "config/geysers.json";

#[tokio::main]
async fn main() -> ExitCode {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::from_default_env()
				.add_directive(tracing::Level::INFO.into()),
		)
		.with_target(false)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_file(false)
		.with_line_number(false)
		.with_timer(tracing_subscriber::fmt::time::time())
		.with_writer(std::io::stderr)
		.init();

	let config_path = std::env::args()
		.nth(1)
		.or_else(|| std::env::var(CONFIG_PATH_ENV).ok())
		.map(PathBuf::from)
		.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

	let config = match ReconcileConfig::load(&config_path) {
		Ok(config) => config,
		Err(e) => {
			error!("Failed to load configuration from {:?}: {}", config_path, e);
			return ExitCode::FAILURE;
		}
	};
	info!(
		"Loaded {} entities from {:?}",
		config.entities.len(),
		config_path
	);

	let timeout = Duration::from_secs(config.request_timeout_secs);
	let ledger_client = match JsonRpcLedgerClient::new(config.rpc_url.clone(), timeout) {
		Ok(client) => Arc::new(client),
		Err(e) => {
			error!("Failed to create ledger client: {}", e);
			return ExitCode::FAILURE;
		}
	};
	let indexer_client = match GeyserIndexerClient::new(config.indexer_url.clone(), timeout) {
		Ok(client) => client,
		Err(e) => {
			error!("Failed to create indexer client: {}", e);
			return ExitCode::FAILURE;
		}
	};

	// The checkpoint is read once and passed explicitly to every query.
	let checkpoint_height = match config.checkpoint_height {
		Some(height) => height,
		None => match ledger_client.block_number().await {
			Ok(height) => height,
			Err(e) => {
				error!("Failed to read the chain head: {}", e);
				return ExitCode::FAILURE;
			}
		},
	};
	info!("Reconciling at checkpoint height {}", checkpoint_height);

	let reconciler = Reconciler::new(
		LedgerScanner::new(ledger_client.clone(), config.scan.clone(), config.retry),
		IndexedFetcher::new(indexer_client, config.fetch.clone(), config.retry),
		ledger_client,
		config.retry,
		config.checks.clone(),
	);

	let results: Vec<_> = stream::iter(&config.entities)
		.map(|entity| {
			let reconciler = &reconciler;
			async move {
				(
					entity,
					reconciler
						.reconcile_with_ground_truth(entity, checkpoint_height)
						.await,
				)
			}
		})
		.buffer_unordered(config.max_concurrent_entities)
		.collect()
		.await;

	let mut failures = 0usize;
	for (entity, result) in results {
		match result {
			Ok(report) => {
				if !report.passed() {
					failures += 1;
				}
				match serde_json::to_string_pretty(&report) {
					Ok(json) => println!("{}", json),
					Err(e) => error!("Failed to serialize report for {}: {}", entity.name, e),
				}
			}
			Err(e) => {
				failures += 1;
				error!("Reconciliation of {} failed: {}", entity.name, e);
			}
		}
	}

	if failures == 0 {
		info!("All {} entities reconciled", config.entities.len());
		ExitCode::SUCCESS
	} else {
		error!(
			"{} of {} entities failed reconciliation",
			failures,
			config.entities.len()
		);
		ExitCode::FAILURE
	}
}
