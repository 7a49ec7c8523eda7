//! Client-credentials exchange against the identity endpoint.
//!
//! Only transport failures are retried here. A non-success status from the identity endpoint
//! means the credentials themselves were rejected, so it is surfaced immediately.

// crates.io
use oauth2::http::{
	Method, Request,
	header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
};
// self
use crate::{
	_prelude::*,
	auth::{TokenRecord, TokenSecret, TokenState},
	error::{self, ConfigError},
	flows::TokenManager,
	http::{ApiHttpClient, HttpRequest, TransportErrorMapper, TransportStage},
	obs::{self, OpKind, OpOutcome, OpSpan},
	retry::Disposition,
	store::CachedTokenRecord,
};

const GRANT_TYPE: &str = "client_credentials";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Deserialize)]
struct TokenResponse {
	#[serde(deserialize_with = "non_empty")]
	access_token: String,
	expires_in: i64,
}

fn non_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
	D: serde::Deserializer<'de>,
{
	let value = String::deserialize(deserializer)?;

	if value.is_empty() {
		return Err(serde::de::Error::invalid_length(0, &"a non-empty access token"));
	}

	Ok(value)
}

impl<C, M> TokenManager<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Performs a fresh exchange regardless of the cache, persists the result, and returns it.
	///
	/// Transport failures are retried with the manager's backoff policy; the last one is
	/// returned once attempts are exhausted.
	pub async fn exchange(&self) -> Result<TokenRecord> {
		const KIND: OpKind = OpKind::TokenExchange;

		let span = OpSpan::new(KIND, "exchange");

		obs::record_outcome(KIND, OpOutcome::Attempt);

		let result = span.instrument(self.exchange_with_retries()).await;

		match &result {
			Ok(_) => obs::record_outcome(KIND, OpOutcome::Success),
			Err(_) => obs::record_outcome(KIND, OpOutcome::Failure),
		}

		result
	}

	async fn exchange_with_retries(&self) -> Result<TokenRecord> {
		let max_attempts = self.policy.max_attempts();
		let mut attempt = 0;

		loop {
			self.metrics.record_exchange_attempt();

			let error = match self.request_token().await {
				Ok(record) => {
					self.adopt(&record).await;

					return Ok(record);
				},
				Err(e) => e,
			};
			let after = match error.disposition(&self.policy) {
				Disposition::Retry { after } if attempt + 1 < max_attempts => after,
				_ => return Err(error),
			};
			let delay = self.policy.backoff(attempt, after);

			obs::record_outcome(OpKind::TokenExchange, OpOutcome::Retry);
			obs::event!(
				warn,
				attempt = attempt + 1,
				delay_ms = delay.whole_milliseconds() as u64,
				error = %error,
				"Token exchange failed; retrying."
			);

			self.sleeper.sleep(delay).await;

			attempt += 1;
		}
	}

	async fn request_token(&self) -> Result<TokenRecord> {
		let request = self.token_request()?;
		let response = self
			.http_client
			.send(request, self.policy.timeout())
			.await
			.map_err(|e| self.transport_mapper.map_transport_error(TransportStage::IdentityEndpoint, e))?;
		let status = response.status();

		if !status.is_success() {
			return Err(Error::IdentityAuth {
				status: status.as_u16(),
				body: error::body_preview(response.body()),
			});
		}

		let mut deserializer = serde_json::Deserializer::from_slice(response.body());
		let payload: TokenResponse = serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| Error::IdentityResponse { source })?;

		if payload.expires_in <= 0 {
			return Err(ConfigError::NonPositiveExpiresIn.into());
		}

		let issued_at = self.clock.now();
		let expires_at = issued_at
			.checked_add(Duration::seconds(payload.expires_in))
			.ok_or(ConfigError::ExpiresInOutOfRange(payload.expires_in))?;

		Ok(TokenRecord { access_token: TokenSecret::new(payload.access_token), issued_at, expires_at })
	}

	fn token_request(&self) -> Result<HttpRequest> {
		let url = self.credentials.token_url()?;
		let body = url::form_urlencoded::Serializer::new(String::new())
			.append_pair("grant_type", GRANT_TYPE)
			.append_pair("scope", &self.credentials.scope)
			.finish();
		let request = Request::builder()
			.method(Method::POST)
			.uri(url.as_str())
			.header(AUTHORIZATION, self.credentials.basic_authorization())
			.header(CONTENT_TYPE, FORM_CONTENT_TYPE)
			.header(ACCEPT, JSON_CONTENT_TYPE)
			.body(body.into_bytes())
			.map_err(ConfigError::from)?;

		Ok(request)
	}

	async fn adopt(&self, record: &TokenRecord) {
		if let Err(e) = self.store.save(CachedTokenRecord::from_record(record)).await {
			obs::event!(warn, error = %e, "Fresh access token could not be persisted.");
		}

		self.set_state(TokenState::Cached { expires_at: record.expires_at });
		self.metrics.record_exchange();

		obs::event!(
			info,
			expires_in_secs = (record.expires_at - record.issued_at).whole_seconds(),
			"Obtained a fresh access token."
		);
	}
}
