// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::obs::{OpKind, OpOutcome};

/// Records an operation outcome via the global metrics recorder (when enabled).
pub fn record_outcome(kind: OpKind, outcome: OpOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"paylocity_broker_op_total",
			"op" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Thread-safe counters describing token manager activity.
#[derive(Debug, Default)]
pub struct TokenMetrics {
	cache_hits: AtomicU64,
	exchange_attempts: AtomicU64,
	exchanges: AtomicU64,
	invalidations: AtomicU64,
}
impl TokenMetrics {
	/// Number of `get_token` calls answered from the cache.
	pub fn cache_hits(&self) -> u64 {
		self.cache_hits.load(Ordering::Relaxed)
	}

	/// Number of HTTP requests sent to the identity endpoint, retries included.
	pub fn exchange_attempts(&self) -> u64 {
		self.exchange_attempts.load(Ordering::Relaxed)
	}

	/// Number of successful exchanges.
	pub fn exchanges(&self) -> u64 {
		self.exchanges.load(Ordering::Relaxed)
	}

	/// Number of `invalidate` calls.
	pub fn invalidations(&self) -> u64 {
		self.invalidations.load(Ordering::Relaxed)
	}

	pub(crate) fn record_cache_hit(&self) {
		self.cache_hits.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_exchange_attempt(&self) {
		self.exchange_attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_exchange(&self) {
		self.exchanges.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_invalidation(&self) {
		self.invalidations.fetch_add(1, Ordering::Relaxed);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn record_outcome_noop_without_metrics() {
		record_outcome(OpKind::TokenExchange, OpOutcome::Failure);
	}

	#[test]
	fn token_metrics_count_independently() {
		let metrics = TokenMetrics::default();

		metrics.record_cache_hit();
		metrics.record_exchange_attempt();
		metrics.record_exchange_attempt();
		metrics.record_exchange();
		metrics.record_invalidation();

		assert_eq!(metrics.cache_hits(), 1);
		assert_eq!(metrics.exchange_attempts(), 2);
		assert_eq!(metrics.exchanges(), 1);
		assert_eq!(metrics.invalidations(), 1);
	}
}
