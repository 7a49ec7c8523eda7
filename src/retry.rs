//! Retry policy, error classification, and backoff sleeping.
//!
//! Every attempt yields either a payload or an [`Error`]; [`Error::disposition`] turns the
//! error into an explicit [`Disposition`] so retry loops branch on a visible value instead of
//! on which error type happened to be raised.

// self
use crate::{
	_prelude::*,
	error::{ApiError, TransportError},
};

/// Boxed future returned by [`BackoffSleeper::sleep`].
pub type SleepFuture<'a> = Pin<Box<dyn Future<Output = ()> + 'a + Send>>;

/// Retry tunables shared by the token manager and the request executor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
	/// Retries after the initial attempt; `max_retries + 1` attempts in total.
	pub max_retries: u32,
	/// Delay before the first retry; doubles on each subsequent retry.
	pub base_delay: Duration,
	/// Upper bound applied to every network call.
	pub request_timeout: Duration,
	/// Whether HTTP 429 is retried (honoring `Retry-After`) instead of surfaced immediately.
	pub retry_rate_limited: bool,
}
impl RetryPolicy {
	/// Overrides the retry count.
	pub fn with_max_retries(mut self, max_retries: u32) -> Self {
		self.max_retries = max_retries;

		self
	}

	/// Overrides the initial backoff delay (negative values clamp to zero).
	pub fn with_base_delay(mut self, delay: Duration) -> Self {
		self.base_delay = if delay.is_negative() { Duration::ZERO } else { delay };

		self
	}

	/// Overrides the per-request timeout.
	pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = timeout;

		self
	}

	/// Opts in to retrying HTTP 429 responses.
	pub fn with_retry_rate_limited(mut self, enabled: bool) -> Self {
		self.retry_rate_limited = enabled;

		self
	}

	/// Total attempts allowed: one initial attempt plus `max_retries`.
	pub fn max_attempts(&self) -> u32 {
		self.max_retries.saturating_add(1)
	}

	/// Delay after the zero-based failed `attempt`: `base_delay * 2^attempt`.
	pub fn delay_for(&self, attempt: u32) -> Duration {
		let factor = 1_i32 << attempt.min(30);

		self.base_delay.saturating_mul(factor)
	}

	/// Backoff after `attempt`, stretched to honor an upstream hint when one was given.
	pub fn backoff(&self, attempt: u32, hint: Option<Duration>) -> Duration {
		let delay = self.delay_for(attempt);

		match hint {
			Some(after) if after > delay => after,
			_ => delay,
		}
	}

	/// Request timeout as a std duration for transports.
	pub fn timeout(&self) -> std::time::Duration {
		self.request_timeout.unsigned_abs()
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_retries: 3,
			base_delay: Duration::seconds(1),
			request_timeout: Duration::seconds(30),
			retry_rate_limited: false,
		}
	}
}

/// What a retry loop should do with a failed attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
	/// Back off and try again; `after` is an upstream lower bound on the delay.
	Retry {
		/// Upstream `Retry-After` hint, if any.
		after: Option<Duration>,
	},
	/// Drop the cached token, back off, and try again with a fresh one.
	InvalidateAndRetry,
	/// Surface the error immediately.
	Terminal,
}
impl Disposition {
	/// Returns `true` unless the disposition is [`Disposition::Terminal`].
	pub fn is_retryable(self) -> bool {
		!matches!(self, Self::Terminal)
	}
}

impl Error {
	/// Classifies the error for retry loops under `policy`.
	pub fn disposition(&self, policy: &RetryPolicy) -> Disposition {
		match self {
			Error::Transport(
				TransportError::Timeout { .. }
				| TransportError::Connect { .. }
				| TransportError::Network { .. }
				| TransportError::Io(_),
			) => Disposition::Retry { after: None },
			Error::Api(ApiError::Unauthorized { .. }) => Disposition::InvalidateAndRetry,
			Error::Api(ApiError::Server { .. }) => Disposition::Retry { after: None },
			Error::Api(ApiError::RateLimited { retry_after, .. }) if policy.retry_rate_limited =>
				Disposition::Retry { after: *retry_after },
			Error::Api(ApiError::RateLimited { .. } | ApiError::Client { .. })
			| Error::IdentityAuth { .. }
			| Error::IdentityResponse { .. }
			| Error::Decode { .. }
			| Error::Config(_)
			| Error::Storage(_) => Disposition::Terminal,
		}
	}
}

/// Suspends the current operation between attempts.
///
/// Each call's backoff is local to that call; implementations must not block other tasks.
pub trait BackoffSleeper
where
	Self: Send + Sync,
{
	/// Waits for `delay`.
	fn sleep(&self, delay: Duration) -> SleepFuture<'_>;
}

/// Sleeper backed by the tokio timer.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioSleeper;
impl BackoffSleeper for TokioSleeper {
	fn sleep(&self, delay: Duration) -> SleepFuture<'_> {
		Box::pin(tokio::time::sleep(delay.unsigned_abs()))
	}
}

/// Sleeper that returns immediately and remembers every requested delay.
#[derive(Clone, Debug, Default)]
pub struct RecordingSleeper(Arc<Mutex<Vec<Duration>>>);
impl RecordingSleeper {
	/// Delays requested so far, in order.
	pub fn delays(&self) -> Vec<Duration> {
		self.0.lock().clone()
	}
}
impl BackoffSleeper for RecordingSleeper {
	fn sleep(&self, delay: Duration) -> SleepFuture<'_> {
		self.0.lock().push(delay);

		Box::pin(async {})
	}
}
