//! Token lifecycle orchestration: cached lookups, client-credentials exchanges, invalidation.

mod client_credentials;

// self
use crate::{
	_prelude::*,
	auth::{Credentials, DEFAULT_SAFETY_BUFFER, TokenRecord, TokenSecret, TokenState},
	clock::{Clock, SystemClock},
	http::{ApiHttpClient, TransportErrorMapper},
	obs::{self, TokenMetrics},
	retry::{BackoffSleeper, RetryPolicy, TokioSleeper},
	store::{StoreError, TokenStore},
};
#[cfg(feature = "reqwest")]
use crate::http::{ReqwestHttpClient, ReqwestTransportErrorMapper};

#[cfg(feature = "reqwest")]
/// Token manager specialized for the crate's default reqwest transport stack.
pub type ReqwestTokenManager = TokenManager<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Produces currently valid bearer tokens for one client identity.
///
/// Every [`TokenManager::get_token`] call re-reads the store and re-validates the record against
/// the injected clock and safety buffer; there is no background refresh. Concurrent callers that
/// all observe a missing or expiring token may each run an exchange and each persist the result;
/// the last write wins and every returned token is valid.
pub struct TokenManager<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// HTTP client used for identity-endpoint requests.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors before classification.
	pub transport_mapper: Arc<M>,
	/// Durable token cache.
	pub store: Arc<dyn TokenStore>,
	/// Client credentials supplied at construction.
	pub credentials: Credentials,
	/// Retry and timeout tunables for the identity exchange.
	pub policy: RetryPolicy,
	/// Wall clock used for expiry checks and issued-at stamps.
	pub clock: Arc<dyn Clock>,
	/// Suspends between exchange retries.
	pub sleeper: Arc<dyn BackoffSleeper>,
	/// In-process activity counters.
	pub metrics: Arc<TokenMetrics>,
	safety_buffer: Duration,
	state: Arc<RwLock<TokenState>>,
}
impl<C, M> TokenManager<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a manager that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		store: Arc<dyn TokenStore>,
		credentials: Credentials,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			store,
			credentials,
			policy: RetryPolicy::default(),
			clock: Arc::new(SystemClock),
			sleeper: Arc::new(TokioSleeper),
			metrics: Default::default(),
			safety_buffer: DEFAULT_SAFETY_BUFFER,
			state: Arc::new(RwLock::new(TokenState::NoToken)),
		}
	}

	/// Overrides the retry policy used by the identity exchange.
	pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
		self.policy = policy;

		self
	}

	/// Overrides the wall clock.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Overrides the backoff sleeper.
	pub fn with_sleeper(mut self, sleeper: Arc<dyn BackoffSleeper>) -> Self {
		self.sleeper = sleeper;

		self
	}

	/// Overrides the safety buffer (defaults to 600 seconds; negative values clamp to zero).
	pub fn with_safety_buffer(mut self, buffer: Duration) -> Self {
		self.safety_buffer = if buffer.is_negative() { Duration::ZERO } else { buffer };

		self
	}

	/// Safety buffer subtracted from every expiry.
	pub fn safety_buffer(&self) -> Duration {
		self.safety_buffer
	}

	/// Current in-memory state. Informational only: `get_token` always consults the store.
	pub fn state(&self) -> TokenState {
		*self.state.read()
	}

	/// Returns a bearer token that stays valid for longer than the safety buffer.
	///
	/// A usable cached record is returned without any network call. Absent, corrupt, or
	/// expiring records trigger a fresh exchange whose result is persisted before returning.
	pub async fn get_token(&self) -> Result<TokenSecret> {
		let now = self.clock.now();

		if let Some(record) = self.load_cached().await {
			if record.is_usable_at(now, self.safety_buffer) {
				self.metrics.record_cache_hit();
				self.set_state(TokenState::Cached { expires_at: record.expires_at });

				obs::event!(
					debug,
					remaining_secs = record.remaining_at(now).whole_seconds(),
					"Using cached access token."
				);

				return Ok(record.access_token);
			}

			obs::event!(debug, "Cached access token is inside the safety buffer.");
		}

		self.set_state(TokenState::NoToken);

		let record = self.exchange().await?;

		Ok(record.access_token)
	}

	/// Forgets the current token so the next [`TokenManager::get_token`] performs an exchange.
	///
	/// Succeeds when nothing is cached.
	pub async fn invalidate(&self) -> Result<()> {
		self.set_state(TokenState::NoToken);
		self.metrics.record_invalidation();

		obs::event!(info, "Invalidating cached access token.");

		self.store.delete().await.map_err(Error::from)
	}

	async fn load_cached(&self) -> Option<TokenRecord> {
		let loaded = self
			.store
			.load()
			.await
			.and_then(|cached| cached.map(|cached| cached.to_record()).transpose());

		match loaded {
			Ok(record) => record,
			Err(e @ StoreError::Corrupt { .. }) => {
				obs::event!(warn, error = %e, "Discarding corrupt token cache.");

				if let Err(e) = self.store.delete().await {
					obs::event!(warn, error = %e, "Corrupt token cache could not be removed.");
				}

				None
			},
			Err(e) => {
				obs::event!(warn, error = %e, "Token cache could not be read; treating as a miss.");

				None
			},
		}
	}

	fn set_state(&self, state: TokenState) {
		*self.state.write() = state;
	}
}
#[cfg(feature = "reqwest")]
impl TokenManager<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a manager with its own reqwest-backed transport.
	pub fn new(store: Arc<dyn TokenStore>, credentials: Credentials) -> Self {
		Self::with_http_client(
			store,
			credentials,
			ReqwestHttpClient::default(),
			Arc::new(ReqwestTransportErrorMapper),
		)
	}
}
impl<C, M> Debug for TokenManager<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenManager")
			.field("credentials", &self.credentials)
			.field("policy", &self.policy)
			.field("safety_buffer", &self.safety_buffer)
			.field("state", &self.state())
			.finish()
	}
}
