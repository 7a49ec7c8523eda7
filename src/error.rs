//! Crate-level error types shared by the token manager, stores, and the request executor.

// self
use crate::{_prelude::*, http::TransportStage};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Maximum number of characters retained from an upstream response body.
pub const BODY_PREVIEW_LIMIT: usize = 256;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (timeout, connection refused/reset, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Non-success HTTP status from an authorized API call.
	#[error(transparent)]
	Api(#[from] ApiError),

	/// Identity endpoint rejected the client credentials.
	#[error("Identity endpoint rejected the client credentials with HTTP {status}: {body}")]
	IdentityAuth {
		/// HTTP status code returned by the identity endpoint.
		status: u16,
		/// Truncated response body.
		body: String,
	},
	/// Identity endpoint answered with a success status but an unusable payload.
	#[error("Identity endpoint returned a malformed token response.")]
	IdentityResponse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// API answered with a success status but the body is not valid JSON.
	#[error("API returned a malformed JSON body: {body}")]
	Decode {
		/// Structured parsing failure.
		#[source]
		source: serde_json::Error,
		/// Truncated response body.
		body: String,
	},
}

/// Configuration and request-construction failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Base URL and endpoint could not be joined.
	#[error("Endpoint `{endpoint}` cannot be joined onto the base URL.")]
	InvalidEndpoint {
		/// Endpoint path supplied by the caller.
		endpoint: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Caller-supplied header name or value is not valid HTTP.
	#[error("Header `{name}` is not a valid HTTP header.")]
	InvalidHeader {
		/// Offending header name.
		name: String,
	},
	/// Request body could not be serialized as JSON.
	#[error("Request body could not be serialized.")]
	BodySerialization(#[from] serde_json::Error),
	/// Environment label is not recognized.
	#[error("Unknown environment `{0}`; expected `production`, `sandbox`, or `testing`.")]
	UnknownEnvironment(String),
	/// Identity endpoint returned a non-positive `expires_in`.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
	/// Identity endpoint returned an `expires_in` too large to represent as a timestamp.
	#[error("The expires_in value {0} does not fit in a timestamp.")]
	ExpiresInOutOfRange(i64),
	/// No company id was supplied and none is configured.
	#[error("No company id was supplied and none is configured.")]
	NoCompanyConfigured,
	/// Identifier validation failed.
	#[error(transparent)]
	InvalidIdentifier(#[from] crate::auth::IdentifierError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures. Always retryable until the policy is exhausted.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// The request exceeded the configured timeout.
	#[error("Request to the {stage} timed out.")]
	Timeout {
		/// Call site that timed out.
		stage: TransportStage,
	},
	/// The connection could not be established or was reset.
	#[error("Connection to the {stage} failed.")]
	Connect {
		/// Call site whose connection failed.
		stage: TransportStage,
	},
	/// Underlying HTTP client reported another network failure.
	#[error("Network error occurred while calling the {stage}.")]
	Network {
		/// Call site that failed.
		stage: TransportStage,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred during transport.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(stage: TransportStage, src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { stage, source: Box::new(src) }
	}
}

/// Non-success statuses returned by authorized API calls.
#[derive(Debug, ThisError)]
pub enum ApiError {
	/// The bearer token was rejected; the cached token is invalidated before retrying.
	#[error("API rejected the bearer token (HTTP 401): {body}")]
	Unauthorized {
		/// Truncated response body.
		body: String,
	},
	/// Upstream server failure; retried with backoff.
	#[error("API returned a server error (HTTP {status}): {body}")]
	Server {
		/// HTTP status code.
		status: u16,
		/// Truncated response body.
		body: String,
	},
	/// Upstream rate limit.
	#[error("API rate limited the request (HTTP 429): {body}")]
	RateLimited {
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
		/// Truncated response body.
		body: String,
	},
	/// Request was rejected on its own merits; never retried.
	#[error("API rejected the request (HTTP {status}): {body}")]
	Client {
		/// HTTP status code.
		status: u16,
		/// Truncated response body.
		body: String,
	},
}
impl ApiError {
	/// Returns the HTTP status code carried by the error.
	pub fn status(&self) -> u16 {
		match self {
			Self::Unauthorized { .. } => 401,
			Self::RateLimited { .. } => 429,
			Self::Server { status, .. } | Self::Client { status, .. } => *status,
		}
	}
}

/// Truncates an upstream body to [`BODY_PREVIEW_LIMIT`] characters for error context.
pub fn body_preview(body: &[u8]) -> String {
	let body = String::from_utf8_lossy(body);

	if body.chars().count() <= BODY_PREVIEW_LIMIT {
		return body.into_owned();
	}

	let mut buf = String::new();

	for (idx, ch) in body.chars().enumerate() {
		if idx >= BODY_PREVIEW_LIMIT {
			buf.push('…');

			break;
		}
		buf.push(ch);
	}

	buf
}
