//! Transport primitives shared by the identity exchange and authorized API calls.
//!
//! The module exposes [`ApiHttpClient`] so callers can plug in any HTTP stack (or a scripted
//! fake in tests) and [`TransportErrorMapper`] so transport-specific failures are classified
//! into the crate's [`TransportError`](crate::error::TransportError) taxonomy before the retry
//! loop inspects them. Requests and responses use the `http` crate types re-exported by
//! `oauth2`, keeping the trait free of any particular client's structures.

// std
use std::time::Duration as StdDuration;
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
pub use oauth2::{HttpRequest, HttpResponse, http};
use oauth2::http::{HeaderMap, header::RETRY_AFTER};
use time::format_description::well_known::Rfc2822;
// self
use crate::_prelude::*;
#[cfg(feature = "reqwest")]
use crate::error::{ConfigError, TransportError};

/// Boxed future returned by [`ApiHttpClient::send`].
pub type HttpFuture<'a, E> = Pin<Box<dyn Future<Output = Result<HttpResponse, E>> + 'a + Send>>;

/// Call site a transport failure originated from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransportStage {
	/// The OAuth identity endpoint.
	IdentityEndpoint,
	/// An authorized API endpoint.
	Api,
}
impl TransportStage {
	/// Returns a stable label suitable for messages and span fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::IdentityEndpoint => "identity endpoint",
			Self::Api => "API",
		}
	}
}
impl Display for TransportStage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Abstraction over HTTP transports able to execute one request with a timeout.
///
/// The trait is the crate's only dependency on an HTTP stack. Implementations must be
/// `Send + Sync + 'static` so one transport can be shared by the token manager and the
/// executor, and the returned futures must be `Send` so callers can spawn them.
/// Non-success statuses are **not** errors at this layer; only failures that prevented a
/// response from arriving (timeouts, refused connections, TLS) are.
pub trait ApiHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// Sends `request`, aborting once `timeout` elapses.
	fn send(&self, request: HttpRequest, timeout: StdDuration)
	-> HttpFuture<'_, Self::TransportError>;
}

/// Maps transport failures into crate [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an error emitted by the transport into a crate error.
	fn map_transport_error(&self, stage: TransportStage, error: E) -> Error;
}

/// Metadata read from a response before its status is classified.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseMetadata {
	/// HTTP status code.
	pub status: Option<u16>,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
}
impl ResponseMetadata {
	/// Extracts status and `Retry-After` from `response`.
	pub fn from_response(response: &HttpResponse) -> Self {
		Self {
			status: Some(response.status().as_u16()),
			retry_after: parse_retry_after(response.headers()),
		}
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl ApiHttpClient for ReqwestHttpClient {
	type TransportError = ReqwestError;

	fn send(
		&self,
		request: HttpRequest,
		timeout: StdDuration,
	) -> HttpFuture<'_, Self::TransportError> {
		let client = self.0.clone();

		Box::pin(async move {
			let mut request = reqwest::Request::try_from(request)?;

			*request.timeout_mut() = Some(timeout);

			let response = client.execute(request).await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let mut response_new = HttpResponse::new(response.bytes().await?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(&self, stage: TransportStage, err: ReqwestError) -> Error {
		if err.is_builder() {
			return ConfigError::from(err).into();
		}
		if err.is_timeout() {
			return TransportError::Timeout { stage }.into();
		}
		if err.is_connect() {
			return TransportError::Connect { stage }.into();
		}

		TransportError::network(stage, err).into()
	}
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u32>() {
		return Some(Duration::seconds(i64::from(secs)));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use oauth2::http::{HeaderValue, StatusCode};

	fn response_with_retry_after(value: &'static str) -> HttpResponse {
		let mut response = HttpResponse::new(Vec::new());

		*response.status_mut() = StatusCode::TOO_MANY_REQUESTS;
		response.headers_mut().insert(RETRY_AFTER, HeaderValue::from_static(value));

		response
	}

	#[test]
	fn metadata_reads_status_and_delta_seconds() {
		let meta = ResponseMetadata::from_response(&response_with_retry_after("7"));

		assert_eq!(meta.status, Some(429));
		assert_eq!(meta.retry_after, Some(Duration::seconds(7)));
	}

	#[test]
	fn past_http_dates_and_garbage_are_ignored() {
		let past = ResponseMetadata::from_response(&response_with_retry_after(
			"Wed, 21 Oct 2015 07:28:00 +0000",
		));
		let garbage = ResponseMetadata::from_response(&response_with_retry_after("soon"));

		assert_eq!(past.retry_after, None);
		assert_eq!(garbage.retry_after, None);
	}

	#[test]
	fn stage_labels_are_human_readable() {
		assert_eq!(TransportStage::IdentityEndpoint.to_string(), "identity endpoint");
		assert_eq!(TransportStage::Api.to_string(), "API");
	}
}
