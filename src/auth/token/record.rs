//! Immutable bearer token records, lifecycle helpers, and builders.

// self
use crate::{_prelude::*, auth::token::secret::TokenSecret};

/// Margin subtracted from a token's expiry to force early refresh.
pub const DEFAULT_SAFETY_BUFFER: Duration = Duration::seconds(600);

/// Lifecycle status of a token record relative to an instant and a safety buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStatus {
	/// Token may be handed to callers.
	Usable,
	/// Token has not expired yet but is inside the safety buffer; treated as absent.
	Expiring,
	/// Token exceeded its expiry instant.
	Expired,
}

/// In-memory view of a token manager's state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenState {
	/// No token has been obtained, or the last one was invalidated.
	NoToken,
	/// A token was loaded or exchanged; it is re-validated on every use.
	Cached {
		/// Expiry instant of the cached token.
		expires_at: OffsetDateTime,
	},
}

/// Errors produced by [`TokenRecordBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum TokenRecordBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when no expiry (absolute or relative) was configured.
	#[error("Expiry must be supplied via expires_at or expires_in.")]
	MissingExpiry,
}

/// One bearer credential issued by the identity endpoint. Replaced, never mutated.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenRecord {
	/// Bearer token; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Instant the exchange completed.
	pub issued_at: OffsetDateTime,
	/// `issued_at + expires_in`.
	pub expires_at: OffsetDateTime,
}
impl TokenRecord {
	/// Returns a builder for constructing records.
	pub fn builder() -> TokenRecordBuilder {
		TokenRecordBuilder::default()
	}

	/// Computes the lifecycle status at `instant` with the given safety buffer.
	pub fn status_at(&self, instant: OffsetDateTime, buffer: Duration) -> TokenStatus {
		if instant >= self.expires_at {
			return TokenStatus::Expired;
		}
		if instant + buffer >= self.expires_at {
			return TokenStatus::Expiring;
		}

		TokenStatus::Usable
	}

	/// Returns `true` only while `instant < expires_at - buffer`.
	pub fn is_usable_at(&self, instant: OffsetDateTime, buffer: Duration) -> bool {
		matches!(self.status_at(instant, buffer), TokenStatus::Usable)
	}

	/// Remaining lifetime at `instant`, clamped at zero.
	pub fn remaining_at(&self, instant: OffsetDateTime) -> Duration {
		let remaining = self.expires_at - instant;

		if remaining.is_negative() { Duration::ZERO } else { remaining }
	}
}
impl Debug for TokenRecord {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenRecord")
			.field("access_token", &"<redacted>")
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Builder for [`TokenRecord`].
#[derive(Clone, Debug, Default)]
pub struct TokenRecordBuilder {
	access_token: Option<TokenSecret>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
}
impl TokenRecordBuilder {
	/// Sets the issued-at instant.
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative expiry duration from the issued instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Consumes the builder and produces a [`TokenRecord`].
	pub fn build(self) -> Result<TokenRecord, TokenRecordBuilderError> {
		let access_token = self.access_token.ok_or(TokenRecordBuilderError::MissingAccessToken)?;
		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_at = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => instant,
			(None, Some(delta)) => issued_at + delta,
			(None, None) => return Err(TokenRecordBuilderError::MissingExpiry),
		};

		Ok(TokenRecord { access_token, issued_at, expires_at })
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn record_expiring_at(expires_at: OffsetDateTime) -> TokenRecord {
		TokenRecord::builder()
			.access_token("access")
			.issued_at(macros::datetime!(2025-01-01 00:00 UTC))
			.expires_at(expires_at)
			.build()
			.expect("Token record builder should succeed.")
	}

	#[test]
	fn status_honors_safety_buffer_boundaries() {
		let now = macros::datetime!(2025-01-01 00:30 UTC);

		assert_eq!(
			record_expiring_at(now + Duration::seconds(601)).status_at(now, DEFAULT_SAFETY_BUFFER),
			TokenStatus::Usable
		);
		assert_eq!(
			record_expiring_at(now + Duration::seconds(600)).status_at(now, DEFAULT_SAFETY_BUFFER),
			TokenStatus::Expiring
		);
		assert_eq!(
			record_expiring_at(now + Duration::seconds(599)).status_at(now, DEFAULT_SAFETY_BUFFER),
			TokenStatus::Expiring
		);
		assert_eq!(
			record_expiring_at(now).status_at(now, DEFAULT_SAFETY_BUFFER),
			TokenStatus::Expired
		);
	}

	#[test]
	fn builder_handles_relative_expiry() {
		let record = TokenRecord::builder()
			.access_token("secret")
			.issued_at(macros::datetime!(2025-01-01 00:00 UTC))
			.expires_in(Duration::minutes(30))
			.build()
			.expect("Token record builder should support relative expiry calculations.");

		assert_eq!(record.expires_at, macros::datetime!(2025-01-01 00:30 UTC));
		assert_eq!(
			record.remaining_at(macros::datetime!(2025-01-01 00:20 UTC)),
			Duration::minutes(10)
		);
		assert_eq!(record.remaining_at(macros::datetime!(2025-01-01 01:00 UTC)), Duration::ZERO);
	}

	#[test]
	fn builder_requires_token_and_expiry() {
		assert_eq!(
			TokenRecord::builder().expires_in(Duration::minutes(1)).build(),
			Err(TokenRecordBuilderError::MissingAccessToken)
		);
		assert_eq!(
			TokenRecord::builder().access_token("a").build(),
			Err(TokenRecordBuilderError::MissingExpiry)
		);
	}

	#[test]
	fn debug_redacts_token() {
		let record = record_expiring_at(macros::datetime!(2025-01-01 01:00 UTC));

		assert!(!format!("{record:?}").contains("access\""));
		assert!(format!("{record:?}").contains("<redacted>"));
	}
}
