//! Authorized API calls with bearer injection, backoff, and `401` self-healing.
//!
//! Each attempt asks the [`TokenManager`] for a token afresh, so an invalidation triggered by
//! a `401` on one attempt is observed by the next. Failures are classified through
//! [`Error::disposition`]; only the final failure reaches the caller.

// crates.io
use oauth2::http::{
	HeaderMap, HeaderName, HeaderValue, Method, Request,
	header::{AUTHORIZATION, CONTENT_TYPE},
};
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::{self, ApiError, ConfigError},
	flows::TokenManager,
	http::{
		ApiHttpClient, HttpRequest, HttpResponse, ResponseMetadata, TransportErrorMapper,
		TransportStage,
	},
	obs::{self, OpKind, OpOutcome, OpSpan},
	retry::{Disposition, RetryPolicy},
};

const JSON_CONTENT_TYPE: &str = "application/json";

/// One authorized call: method, endpoint path, query, optional JSON body, extra headers.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: Method,
	/// Endpoint path joined onto the credentials' base URL.
	pub endpoint: String,
	/// Query parameters appended in order.
	pub query: Vec<(String, String)>,
	/// JSON body, serialized when present.
	pub body: Option<Value>,
	/// Extra headers; they override defaults but never the bearer `Authorization` header.
	pub headers: Vec<(String, String)>,
}
impl ApiRequest {
	/// Creates a request without query, body, or extra headers.
	pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
		Self {
			method,
			endpoint: endpoint.into(),
			query: Vec::new(),
			body: None,
			headers: Vec::new(),
		}
	}

	/// Shorthand for a `GET` request.
	pub fn get(endpoint: impl Into<String>) -> Self {
		Self::new(Method::GET, endpoint)
	}

	/// Shorthand for a `POST` request.
	pub fn post(endpoint: impl Into<String>) -> Self {
		Self::new(Method::POST, endpoint)
	}

	/// Appends a query parameter.
	pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
		self.query.push((key.into(), value.to_string()));

		self
	}

	/// Attaches a JSON body.
	pub fn with_json(mut self, body: Value) -> Self {
		self.body = Some(body);

		self
	}

	/// Serializes `body` and attaches it.
	pub fn with_json_body<T>(self, body: &T) -> Result<Self>
	where
		T: ?Sized + Serialize,
	{
		let value = serde_json::to_value(body).map_err(ConfigError::from)?;

		Ok(self.with_json(value))
	}

	/// Adds an extra header.
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));

		self
	}
}

/// Executes [`ApiRequest`]s on behalf of one [`TokenManager`].
pub struct AuthorizedRequestExecutor<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	manager: Arc<TokenManager<C, M>>,
	policy: RetryPolicy,
}
impl<C, M> AuthorizedRequestExecutor<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates an executor sharing the manager's transport, sleeper, and retry policy.
	pub fn new(manager: Arc<TokenManager<C, M>>) -> Self {
		let policy = manager.policy.clone();

		Self { manager, policy }
	}

	/// Overrides the retry policy for API calls.
	pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
		self.policy = policy;

		self
	}

	/// Token manager backing this executor.
	pub fn manager(&self) -> &Arc<TokenManager<C, M>> {
		&self.manager
	}

	/// Retry policy applied to API calls.
	pub fn policy(&self) -> &RetryPolicy {
		&self.policy
	}

	/// Runs `request` until it succeeds, fails terminally, or exhausts the retry policy.
	///
	/// Success yields the parsed JSON body (`Value::Null` for an empty body). A token that cannot
	/// be obtained fails the call immediately.
	pub async fn execute(&self, request: &ApiRequest) -> Result<Value> {
		const KIND: OpKind = OpKind::AuthorizedCall;

		let span = OpSpan::new(KIND, "execute");

		obs::record_outcome(KIND, OpOutcome::Attempt);

		let result = span.instrument(self.execute_with_retries(request)).await;

		match &result {
			Ok(_) => obs::record_outcome(KIND, OpOutcome::Success),
			Err(_) => obs::record_outcome(KIND, OpOutcome::Failure),
		}

		result
	}

	async fn execute_with_retries(&self, request: &ApiRequest) -> Result<Value> {
		let max_attempts = self.policy.max_attempts();
		let mut attempt = 0;

		loop {
			let token = self.manager.get_token().await?;
			let error = match self.send_once(request, &token).await {
				Ok(value) => return Ok(value),
				Err(e) => e,
			};
			let after = match error.disposition(&self.policy) {
				Disposition::Terminal => return Err(error),
				Disposition::Retry { after } => after,
				Disposition::InvalidateAndRetry => {
					if let Err(e) = self.manager.invalidate().await {
						obs::event!(warn, error = %e, "Token cache could not be invalidated.");
					}

					None
				},
			};

			if attempt + 1 >= max_attempts {
				obs::event!(warn, attempts = attempt + 1, error = %error, "API call exhausted retries.");

				return Err(error);
			}

			let delay = self.policy.backoff(attempt, after);

			obs::record_outcome(OpKind::AuthorizedCall, OpOutcome::Retry);
			obs::event!(
				warn,
				endpoint = %request.endpoint,
				attempt = attempt + 1,
				delay_ms = delay.whole_milliseconds() as u64,
				error = %error,
				"API call failed; retrying."
			);

			self.manager.sleeper.sleep(delay).await;

			attempt += 1;
		}
	}

	async fn send_once(&self, request: &ApiRequest, token: &TokenSecret) -> Result<Value> {
		let http_request = self.build_request(request, token)?;
		let response = self
			.manager
			.http_client
			.send(http_request, self.policy.timeout())
			.await
			.map_err(|e| self.manager.transport_mapper.map_transport_error(TransportStage::Api, e))?;

		classify_response(response)
	}

	fn build_request(&self, request: &ApiRequest, token: &TokenSecret) -> Result<HttpRequest> {
		let url = self.endpoint_url(request)?;
		let headers = request_headers(&request.headers, token)?;
		let body = match &request.body {
			Some(body) => serde_json::to_vec(body).map_err(ConfigError::from)?,
			None => Vec::new(),
		};
		let mut http_request = Request::builder()
			.method(request.method.clone())
			.uri(url.as_str())
			.body(body)
			.map_err(ConfigError::from)?;

		*http_request.headers_mut() = headers;

		Ok(http_request)
	}

	fn endpoint_url(&self, request: &ApiRequest) -> Result<Url> {
		let mut url = self.manager.credentials.endpoint_url(&request.endpoint)?;

		if !request.query.is_empty() {
			url.query_pairs_mut().extend_pairs(request.query.iter());
		}

		Ok(url)
	}
}
impl<C, M> Debug for AuthorizedRequestExecutor<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthorizedRequestExecutor")
			.field("manager", &self.manager)
			.field("policy", &self.policy)
			.finish()
	}
}

/// Default `Content-Type`, then caller headers, then the bearer token.
fn request_headers(extra: &[(String, String)], token: &TokenSecret) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));

	for (name, value) in extra {
		let invalid = || ConfigError::InvalidHeader { name: name.clone() };
		let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;

		if header_name == AUTHORIZATION {
			continue;
		}

		let header_value = HeaderValue::from_str(value).map_err(|_| invalid())?;

		headers.insert(header_name, header_value);
	}

	let mut bearer = HeaderValue::from_str(&token.bearer())
		.map_err(|_| ConfigError::InvalidHeader { name: AUTHORIZATION.as_str().into() })?;

	bearer.set_sensitive(true);
	headers.insert(AUTHORIZATION, bearer);

	Ok(headers)
}

fn classify_response(response: HttpResponse) -> Result<Value> {
	let metadata = ResponseMetadata::from_response(&response);
	let status = response.status();
	let bytes = response.body();

	if status.is_success() {
		if bytes.iter().all(u8::is_ascii_whitespace) {
			return Ok(Value::Null);
		}

		return serde_json::from_slice(bytes)
			.map_err(|source| Error::Decode { source, body: error::body_preview(bytes) });
	}

	let body = error::body_preview(bytes);
	let error = match status.as_u16() {
		401 => ApiError::Unauthorized { body },
		429 => ApiError::RateLimited { retry_after: metadata.retry_after, body },
		code @ 500..=599 => ApiError::Server { status: code, body },
		code => ApiError::Client { status: code, body },
	};

	Err(error.into())
}
