//! Thread-safe in-memory [`TokenStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	store::{CachedTokenRecord, StoreError, StoreFuture, TokenStore},
};

type StoreSlot = Arc<RwLock<Option<Vec<u8>>>>;

/// Thread-safe storage backend that keeps the encoded record in-process.
///
/// Records are held in their serialized form so the load path exercises the same decoding,
/// and the same corruption handling, as durable backends.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreSlot);
impl MemoryStore {
	/// Seeds the store with raw bytes, well-formed or not.
	pub fn with_raw(bytes: impl Into<Vec<u8>>) -> Self {
		Self(Arc::new(RwLock::new(Some(bytes.into()))))
	}

	/// Returns `true` when a record (or raw bytes) is present.
	pub fn is_populated(&self) -> bool {
		self.0.read().is_some()
	}

	fn load_now(slot: StoreSlot) -> Result<Option<CachedTokenRecord>, StoreError> {
		match slot.read().as_deref() {
			Some(bytes) => CachedTokenRecord::decode(bytes).map(Some),
			None => Ok(None),
		}
	}

	fn save_now(slot: StoreSlot, record: CachedTokenRecord) -> Result<(), StoreError> {
		let encoded = record.encode()?;

		*slot.write() = Some(encoded);

		Ok(())
	}
}
impl TokenStore for MemoryStore {
	fn load(&self) -> StoreFuture<'_, Option<CachedTokenRecord>> {
		let slot = self.0.clone();

		Box::pin(async move { Self::load_now(slot) })
	}

	fn save(&self, record: CachedTokenRecord) -> StoreFuture<'_, ()> {
		let slot = self.0.clone();

		Box::pin(async move { Self::save_now(slot, record) })
	}

	fn delete(&self) -> StoreFuture<'_, ()> {
		let slot = self.0.clone();

		Box::pin(async move {
			slot.write().take();

			Ok(())
		})
	}
}
