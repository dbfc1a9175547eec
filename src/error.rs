//! Errors that abort the reconciliation of one entity

use serde::Serialize;

/// Which side of the reconciliation a failure came from
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
	/// Direct ledger log scan
	LedgerScan,
	/// Paged indexing service fetch
	IndexedFetch,
	/// Authoritative total query
	GroundTruth,
}

impl std::fmt::Display for Origin {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Origin::LedgerScan => write!(f, "ledger scan"),
			Origin::IndexedFetch => write!(f, "indexed fetch"),
			Origin::GroundTruth => write!(f, "ground-truth total"),
		}
	}
}

/// Fatal reconciliation errors.
///
/// A partial history would silently corrupt the aggregate, so a source that
/// stays unavailable after its retries fails the whole entity run.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
	#[error("{origin} unavailable for {entity}: {reason}")]
	SourceUnavailable {
		origin: Origin,
		entity: String,
		reason: String,
	},
}

impl ReconcileError {
	pub fn unavailable(origin: Origin, entity: &str, reason: impl std::fmt::Display) -> Self {
		ReconcileError::SourceUnavailable {
			origin,
			entity: entity.to_string(),
			reason: reason.to_string(),
		}
	}
}
