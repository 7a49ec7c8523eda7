//! Storage contract, durable record format, and built-in token stores.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// crates.io
use time::{PrimitiveDateTime, format_description::BorrowedFormatItem, macros::format_description};
// self
use crate::{_prelude::*, auth::TokenRecord};

/// Boxed future returned by [`TokenStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

const HUMAN_FORMAT: &[BorrowedFormatItem<'static>] =
	format_description!("[year]-[month]-[day] [hour]:[minute]:[second] UTC");

/// Durable storage for the single cached token of one client identity.
///
/// Implementations must replace records as a whole: a concurrent `load` observes either the
/// previous complete record or the new one, never a partial write.
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Reads the cached record. Malformed data must surface as [`StoreError::Corrupt`].
	fn load(&self) -> StoreFuture<'_, Option<CachedTokenRecord>>;

	/// Persists `record`, fully superseding any prior record.
	fn save(&self, record: CachedTokenRecord) -> StoreFuture<'_, ()>;

	/// Removes the cached record and any sidecar artifacts. Succeeds when nothing is stored.
	fn delete(&self) -> StoreFuture<'_, ()>;
}

/// Error type produced by [`TokenStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Stored bytes are not a well-formed record; callers discard them and treat it as a miss.
	#[error("Cached token record is corrupt: {message}.")]
	Corrupt {
		/// Human-readable error payload.
		message: String,
	},
	/// Serialization failures surfaced while writing.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// On-disk shape of a cached token plus operator-facing timestamps.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedTokenRecord {
	/// Opaque bearer string.
	pub token: String,
	/// Expiry as unix epoch seconds.
	pub expiry: f64,
	/// Human-readable creation instant.
	pub created_at: String,
	/// Human-readable expiry instant.
	pub expires_at: String,
}
impl CachedTokenRecord {
	/// Captures `record` in its durable form.
	pub fn from_record(record: &TokenRecord) -> Self {
		Self {
			token: record.access_token.expose().to_owned(),
			expiry: record.expires_at.unix_timestamp_nanos() as f64 / 1e9,
			created_at: human_timestamp(record.issued_at),
			expires_at: human_timestamp(record.expires_at),
		}
	}

	/// Validates the durable form and rebuilds the in-memory record.
	pub fn to_record(&self) -> Result<TokenRecord, StoreError> {
		if self.token.is_empty() {
			return Err(StoreError::Corrupt { message: "token is empty".into() });
		}
		if !self.expiry.is_finite() {
			return Err(StoreError::Corrupt { message: "expiry is not a finite number".into() });
		}

		let expires_at = OffsetDateTime::from_unix_timestamp_nanos((self.expiry * 1e9).round() as i128)
			.map_err(|e| StoreError::Corrupt { message: format!("expiry out of range: {e}") })?;
		let issued_at = PrimitiveDateTime::parse(&self.created_at, HUMAN_FORMAT)
			.map(PrimitiveDateTime::assume_utc)
			.unwrap_or(expires_at);

		TokenRecord::builder()
			.access_token(self.token.clone())
			.issued_at(issued_at)
			.expires_at(expires_at)
			.build()
			.map_err(|e| StoreError::Corrupt { message: e.to_string() })
	}

	/// Serializes the record as pretty-printed JSON.
	pub fn encode(&self) -> Result<Vec<u8>, StoreError> {
		serde_json::to_vec_pretty(self).map_err(|e| StoreError::Serialization {
			message: format!("Failed to serialize token record: {e}"),
		})
	}

	/// Parses stored bytes, mapping any malformation to [`StoreError::Corrupt`].
	pub fn decode(bytes: &[u8]) -> Result<Self, StoreError> {
		if bytes.is_empty() {
			return Err(StoreError::Corrupt { message: "record is empty".into() });
		}

		serde_json::from_slice(bytes).map_err(|e| StoreError::Corrupt { message: e.to_string() })
	}
}
impl Debug for CachedTokenRecord {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CachedTokenRecord")
			.field("token", &"<redacted>")
			.field("expiry", &self.expiry)
			.field("created_at", &self.created_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

fn human_timestamp(instant: OffsetDateTime) -> String {
	instant.format(HUMAN_FORMAT).unwrap_or_else(|_| instant.unix_timestamp().to_string())
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn record() -> TokenRecord {
		TokenRecord::builder()
			.access_token("cached-token")
			.issued_at(macros::datetime!(2025-03-01 08:00 UTC))
			.expires_in(Duration::hours(1))
			.build()
			.expect("Token record fixture should build.")
	}

	#[test]
	fn durable_form_carries_epoch_and_human_timestamps() {
		let cached = CachedTokenRecord::from_record(&record());

		assert_eq!(cached.token, "cached-token");
		assert_eq!(cached.expiry, macros::datetime!(2025-03-01 09:00 UTC).unix_timestamp() as f64);
		assert_eq!(cached.created_at, "2025-03-01 08:00:00 UTC");
		assert_eq!(cached.expires_at, "2025-03-01 09:00:00 UTC");

		let json: serde_json::Value = serde_json::from_slice(
			&cached.encode().expect("Cached record should serialize."),
		)
		.expect("Encoded record should be JSON.");

		assert!(json["expiry"].is_f64());
		assert_eq!(json["token"], "cached-token");
	}

	#[test]
	fn rebuilt_record_matches_original_instants() {
		let original = record();
		let rebuilt = CachedTokenRecord::from_record(&original)
			.to_record()
			.expect("Well-formed record should rebuild.");

		assert_eq!(rebuilt, original);
	}

	#[test]
	fn malformed_records_are_corrupt() {
		let mut cached = CachedTokenRecord::from_record(&record());

		cached.expiry = f64::NAN;

		assert!(matches!(cached.to_record(), Err(StoreError::Corrupt { .. })));

		cached.expiry = 1e30;

		assert!(matches!(cached.to_record(), Err(StoreError::Corrupt { .. })));
		assert!(matches!(CachedTokenRecord::decode(b""), Err(StoreError::Corrupt { .. })));
		assert!(matches!(CachedTokenRecord::decode(b"{\"token\":"), Err(StoreError::Corrupt { .. })));
		assert!(matches!(
			CachedTokenRecord::decode(b"{\"token\":\"t\",\"expiry\":\"soon\"}"),
			Err(StoreError::Corrupt { .. })
		));
	}

	#[test]
	fn unparseable_created_at_falls_back_to_expiry() {
		let mut cached = CachedTokenRecord::from_record(&record());

		cached.created_at = "yesterday".into();

		let rebuilt = cached.to_record().expect("Human timestamps are informational only.");

		assert_eq!(rebuilt.issued_at, rebuilt.expires_at);
	}

	#[test]
	fn debug_redacts_token() {
		let rendered = format!("{:?}", CachedTokenRecord::from_record(&record()));

		assert!(!rendered.contains("cached-token"));
	}
}
