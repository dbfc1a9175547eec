//!
//! Bounded retry of transient source failures.
//!
//! Queries against the ledger node and the indexer are retried with a fixed or
//! exponential delay until they succeed, fail permanently, or run out of
//! attempts. The policy is plain configuration; [`PolicyBackoff`] adapts it to
//! the `backoff` crate, which drives the retry loop.

use backoff::{backoff::Backoff, future::retry_notify};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Errors that know whether another attempt could succeed
pub trait Transient {
	fn is_transient(&self) -> bool;
}

/// How the delay between attempts evolves
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum DelayStrategy {
	/// Same delay before every retry
	Fixed,
	/// Delay grows by `multiplier` per retry, capped at `max_delay_ms`
	Exponential { multiplier: f64, max_delay_ms: u64 },
}

/// Retry configuration shared by both fetchers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryPolicy {
	/// Total attempts, including the first one
	pub max_attempts: u32,
	/// Base delay between attempts in milliseconds
	pub delay_ms: u64,
	pub strategy: DelayStrategy,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_attempts: 5,
			delay_ms: 5_000,
			strategy: DelayStrategy::Fixed,
		}
	}
}

impl RetryPolicy {
	/// A policy that never waits, used where delays only slow things down.
	#[cfg(test)]
	pub fn immediate(max_attempts: u32) -> Self {
		Self {
			max_attempts,
			delay_ms: 0,
			strategy: DelayStrategy::Fixed,
		}
	}

	/// Delay to wait before retry number `retry` (zero-based).
	pub fn delay_for(&self, retry: u32) -> Duration {
		let base = Duration::from_millis(self.delay_ms);
		match self.strategy {
			DelayStrategy::Fixed => base,
			DelayStrategy::Exponential {
				multiplier,
				max_delay_ms,
			} => {
				let max_delay = Duration::from_millis(max_delay_ms);
				let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
				let scaled = base.as_secs_f64() * multiplier.powi(exponent);
				if !scaled.is_finite() || scaled >= max_delay.as_secs_f64() {
					max_delay
				} else {
					Duration::from_secs_f64(scaled)
				}
			}
		}
	}

	/// Fresh backoff state for one retried operation.
	pub fn backoff(&self) -> PolicyBackoff {
		PolicyBackoff {
			policy: *self,
			retries_used: 0,
		}
	}
}

/// `Backoff` implementation that stops after the configured attempts
#[derive(Debug, Clone)]
pub struct PolicyBackoff {
	policy: RetryPolicy,
	retries_used: u32,
}

impl Backoff for PolicyBackoff {
	fn reset(&mut self) {
		self.retries_used = 0;
	}

	fn next_backoff(&mut self) -> Option<Duration> {
		if self.retries_used.saturating_add(1) >= self.policy.max_attempts {
			return None;
		}
		let delay = self.policy.delay_for(self.retries_used);
		self.retries_used += 1;
		Some(delay)
	}
}

/// Run `operation`, retrying transient failures according to `policy`.
///
/// Permanent errors are returned immediately. When the attempts are exhausted
/// the last transient error is returned.
pub async fn retry_transient<T, E, F, Fut>(
	policy: &RetryPolicy,
	what: &str,
	mut operation: F,
) -> Result<T, E>
where
	E: Transient + std::fmt::Display,
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T, E>>,
{
	let mut retries = 0u32;
	let max_attempts = policy.max_attempts;

	retry_notify(
		policy.backoff(),
		|| {
			let attempt = operation();
			async move {
				attempt.await.map_err(|e| {
					if e.is_transient() {
						backoff::Error::transient(e)
					} else {
						backoff::Error::permanent(e)
					}
				})
			}
		},
		|e: E, delay: Duration| {
			retries += 1;
			warn!(
				"{} failed (attempt {}/{}): {}; retrying in {:?}",
				what, retries, max_attempts, e, delay
			);
		},
	)
	.await
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicU32, Ordering};

	#[derive(Debug)]
	struct FakeError {
		transient: bool,
	}

	impl std::fmt::Display for FakeError {
		fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
			write!(f, "fake error (transient: {})", self.transient)
		}
	}

	impl Transient for FakeError {
		fn is_transient(&self) -> bool {
			self.transient
		}
	}

	#[test]
	fn backoff_stops_after_max_attempts() {
		let mut backoff = RetryPolicy::immediate(3).backoff();
		assert!(backoff.next_backoff().is_some());
		assert!(backoff.next_backoff().is_some());
		assert!(backoff.next_backoff().is_none());

		backoff.reset();
		assert!(backoff.next_backoff().is_some());
	}

	#[test]
	fn single_attempt_never_retries() {
		let mut backoff = RetryPolicy::immediate(1).backoff();
		assert!(backoff.next_backoff().is_none());
	}

	#[test]
	fn exponential_delay_is_capped() {
		let policy = RetryPolicy {
			max_attempts: 10,
			delay_ms: 1_000,
			strategy: DelayStrategy::Exponential {
				multiplier: 2.0,
				max_delay_ms: 5_000,
			},
		};
		assert_eq!(policy.delay_for(0), Duration::from_secs(1));
		assert_eq!(policy.delay_for(1), Duration::from_secs(2));
		assert_eq!(policy.delay_for(2), Duration::from_secs(4));
		assert_eq!(policy.delay_for(3), Duration::from_secs(5));
		assert_eq!(policy.delay_for(40), Duration::from_secs(5));
	}

	#[test]
	fn fixed_delay_does_not_grow() {
		let policy = RetryPolicy::default();
		assert_eq!(policy.delay_for(0), Duration::from_secs(5));
		assert_eq!(policy.delay_for(7), Duration::from_secs(5));
	}

	#[tokio::test]
	async fn transient_errors_are_retried_until_success() {
		let calls = AtomicU32::new(0);
		let result = retry_transient(&RetryPolicy::immediate(5), "fake query", || async {
			let call = calls.fetch_add(1, Ordering::SeqCst);
			if call < 2 {
				Err(FakeError { transient: true })
			} else {
				Ok(call)
			}
		})
		.await;

		assert_eq!(result.ok(), Some(2));
		assert_eq!(calls.load(Ordering::SeqCst), 3);
	}

	#[tokio::test]
	async fn exhaustion_returns_the_last_error() {
		let calls = AtomicU32::new(0);
		let result: Result<(), FakeError> =
			retry_transient(&RetryPolicy::immediate(4), "fake query", || async {
				calls.fetch_add(1, Ordering::SeqCst);
				Err(FakeError { transient: true })
			})
			.await;

		assert!(result.is_err());
		assert_eq!(calls.load(Ordering::SeqCst), 4);
	}

	#[tokio::test]
	async fn permanent_errors_are_not_retried() {
		let calls = AtomicU32::new(0);
		let result: Result<(), FakeError> =
			retry_transient(&RetryPolicy::immediate(4), "fake query", || async {
				calls.fetch_add(1, Ordering::SeqCst);
				Err(FakeError { transient: false })
			})
			.await;

		assert!(result.is_err());
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}
}
