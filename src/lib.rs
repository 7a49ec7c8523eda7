//! Paylocity WebLink API gateway: cached client-credentials tokens with atomic on-disk
//! persistence, plus an authorized request executor that retries transient failures and heals
//! expired tokens on `401`.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod api;
pub mod auth;
pub mod clock;
pub mod error;
pub mod executor;
pub mod flows;
pub mod http;
pub mod obs;
pub mod retry;
pub mod store;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
#[doc(hidden)]
pub mod _preludet {
	//! Convenience re-exports, fakes, and builders shared by unit and integration tests; enabled
	//! via `cfg(test)` or the `test` crate feature.

	pub use crate::{_prelude::*, retry::RecordingSleeper};

	// std
	use std::collections::VecDeque;
	// self
	use crate::{
		auth::{Credentials, Environment},
		clock::{Clock, ManualClock},
		flows::TokenManager,
		error::TransportError,
		http::{
			ApiHttpClient, HttpFuture, HttpRequest, HttpResponse, ReqwestHttpClient,
			ReqwestTransportErrorMapper, TransportErrorMapper, TransportStage,
		},
		retry::{BackoffSleeper, RetryPolicy},
		store::{MemoryStore, TokenStore},
	};

	/// Token manager type alias used by reqwest-backed integration tests.
	pub type ReqwestTestManager = TokenManager<ReqwestHttpClient, ReqwestTransportErrorMapper>;
	/// Token manager type alias used by scripted-transport tests.
	pub type ScriptedTestManager = TokenManager<ScriptedHttpClient, ScriptedErrorMapper>;

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Credentials pointing at a mock server base URL.
	pub fn test_credentials(base_url: &str, client_id: &str, client_secret: &str) -> Credentials {
		Credentials::new(client_id, client_secret, Environment::Sandbox)
			.with_base_url(Url::parse(base_url).expect("Mock base URL should parse."))
	}

	/// Constructs a [`TokenManager`] backed by an in-memory store, the reqwest transport, and a
	/// recording sleeper so retries never wait on the wall clock.
	pub fn build_reqwest_test_manager(
		base_url: &str,
		client_id: &str,
		client_secret: &str,
	) -> (ReqwestTestManager, Arc<MemoryStore>, Arc<RecordingSleeper>) {
		let store_backend = Arc::new(MemoryStore::default());
		let store: Arc<dyn TokenStore> = store_backend.clone();
		let sleeper = Arc::new(RecordingSleeper::default());
		let sleeper_dyn: Arc<dyn BackoffSleeper> = sleeper.clone();
		let manager = TokenManager::with_http_client(
			store,
			test_credentials(base_url, client_id, client_secret),
			test_reqwest_http_client(),
			Arc::new(ReqwestTransportErrorMapper),
		)
		.with_sleeper(sleeper_dyn);

		(manager, store_backend, sleeper)
	}

	/// Constructs a [`TokenManager`] over a [`ScriptedHttpClient`], a manual clock, and a
	/// recording sleeper.
	pub fn build_scripted_manager(
		store: Arc<dyn TokenStore>,
		http: ScriptedHttpClient,
		clock: ManualClock,
	) -> (ScriptedTestManager, Arc<RecordingSleeper>) {
		let sleeper = Arc::new(RecordingSleeper::default());
		let sleeper_dyn: Arc<dyn BackoffSleeper> = sleeper.clone();
		let clock: Arc<dyn Clock> = Arc::new(clock);
		let manager = TokenManager::with_http_client(
			store,
			test_credentials("https://api.example.test", "scripted-client", "scripted-secret"),
			http,
			Arc::new(ScriptedErrorMapper),
		)
		.with_policy(RetryPolicy::default())
		.with_clock(clock)
		.with_sleeper(sleeper_dyn);

		(manager, sleeper)
	}

	/// Failure injected by [`ScriptedHttpClient`].
	#[derive(Debug)]
	pub enum ScriptedFailure {
		/// The request exceeded its timeout.
		Timeout,
		/// The connection was refused.
		Refused,
	}
	impl Display for ScriptedFailure {
		fn fmt(&self, f: &mut Formatter) -> FmtResult {
			match self {
				Self::Timeout => f.write_str("Scripted request timed out."),
				Self::Refused => f.write_str("Scripted connection refused."),
			}
		}
	}
	impl StdError for ScriptedFailure {}

	/// One scripted transport outcome.
	#[derive(Debug)]
	pub enum Scripted {
		/// Respond with the given status and body.
		Respond(u16, String),
		/// Fail at the transport layer.
		Fail(ScriptedFailure),
	}
	impl Scripted {
		/// Successful identity-endpoint payload.
		pub fn token(access_token: &str, expires_in: i64) -> Self {
			Self::Respond(
				200,
				format!(
					"{{\"access_token\":\"{access_token}\",\"token_type\":\"Bearer\",\"expires_in\":{expires_in}}}"
				),
			)
		}

		/// JSON response with the given status.
		pub fn json(status: u16, body: &str) -> Self {
			Self::Respond(status, body.to_owned())
		}

		/// Transport timeout.
		pub fn timeout() -> Self {
			Self::Fail(ScriptedFailure::Timeout)
		}
	}

	/// Summary of a request observed by [`ScriptedHttpClient`].
	#[derive(Clone, Debug)]
	pub struct RecordedRequest {
		/// HTTP method.
		pub method: String,
		/// Full request URL.
		pub url: String,
		/// `Authorization` header value, if present.
		pub authorization: Option<String>,
		/// Request headers as lowercase name/value pairs.
		pub headers: Vec<(String, String)>,
		/// Raw request body.
		pub body: Vec<u8>,
		/// Timeout the caller applied.
		pub timeout: std::time::Duration,
	}

	/// Fake transport that replays queued outcomes per route and records every request.
	///
	/// Requests whose path ends in `/connect/token` draw from the identity queue; all other
	/// requests draw from the API queue. An empty queue answers `599`.
	#[derive(Clone, Default)]
	pub struct ScriptedHttpClient {
		identity: Arc<Mutex<VecDeque<Scripted>>>,
		api: Arc<Mutex<VecDeque<Scripted>>>,
		requests: Arc<Mutex<Vec<RecordedRequest>>>,
	}
	impl ScriptedHttpClient {
		/// Queues identity-endpoint outcomes.
		pub fn with_identity(self, outcomes: impl IntoIterator<Item = Scripted>) -> Self {
			self.identity.lock().extend(outcomes);

			self
		}

		/// Queues API outcomes.
		pub fn with_api(self, outcomes: impl IntoIterator<Item = Scripted>) -> Self {
			self.api.lock().extend(outcomes);

			self
		}

		/// Every request observed so far.
		pub fn requests(&self) -> Vec<RecordedRequest> {
			self.requests.lock().clone()
		}

		/// Number of identity-endpoint calls observed so far.
		pub fn identity_calls(&self) -> usize {
			self.requests.lock().iter().filter(|r| r.url.ends_with("/connect/token")).count()
		}

		/// Number of API calls observed so far.
		pub fn api_calls(&self) -> usize {
			self.requests.lock().iter().filter(|r| !r.url.ends_with("/connect/token")).count()
		}
	}
	impl ApiHttpClient for ScriptedHttpClient {
		type TransportError = ScriptedFailure;

		fn send(
			&self,
			request: HttpRequest,
			timeout: std::time::Duration,
		) -> HttpFuture<'_, Self::TransportError> {
			Box::pin(async move {
				let url = request.uri().to_string();
				let is_identity = request.uri().path().ends_with("/connect/token");
				let headers = request
					.headers()
					.iter()
					.map(|(name, value)| {
						(name.as_str().to_owned(), value.to_str().unwrap_or_default().to_owned())
					})
					.collect::<Vec<_>>();
				let authorization = headers
					.iter()
					.find(|(name, _)| name == "authorization")
					.map(|(_, value)| value.clone());

				self.requests.lock().push(RecordedRequest {
					method: request.method().to_string(),
					url,
					authorization,
					headers,
					body: request.body().clone(),
					timeout,
				});

				let next =
					if is_identity { self.identity.lock().pop_front() } else { self.api.lock().pop_front() };

				match next.unwrap_or(Scripted::Respond(599, "{\"error\":\"script exhausted\"}".into())) {
					Scripted::Respond(status, body) => {
						let mut response = HttpResponse::new(body.into_bytes());

						*response.status_mut() = oauth2::http::StatusCode::from_u16(status)
							.expect("Scripted status should be a valid HTTP status.");
						response.headers_mut().insert(
							oauth2::http::header::CONTENT_TYPE,
							oauth2::http::HeaderValue::from_static("application/json"),
						);

						Ok(response)
					},
					Scripted::Fail(failure) => Err(failure),
				}
			})
		}
	}

	/// Maps [`ScriptedFailure`] values into the crate taxonomy.
	#[derive(Clone, Debug, Default)]
	pub struct ScriptedErrorMapper;
	impl TransportErrorMapper<ScriptedFailure> for ScriptedErrorMapper {
		fn map_transport_error(&self, stage: TransportStage, error: ScriptedFailure) -> Error {
			match error {
				ScriptedFailure::Timeout => TransportError::Timeout { stage }.into(),
				ScriptedFailure::Refused => TransportError::Connect { stage }.into(),
			}
		}
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
