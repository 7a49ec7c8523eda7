//! File-backed [`TokenStore`] that survives process restarts.
//!
//! The record is written to a uniquely named temporary file in the same directory, synced, and
//! renamed over the primary file, so readers (including other processes sharing the directory)
//! only ever observe a complete record. A human-readable sidecar is refreshed after each save
//! for operator inspection; it is never read back.

// std
use std::{
	fs::{self, File},
	io::{ErrorKind, Write},
	path::{Path, PathBuf},
};
// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	obs,
	store::{CachedTokenRecord, StoreError, StoreFuture, TokenStore},
};

const RECORD_FILE: &str = "token.json";
const INFO_FILE: &str = "token_info.txt";
const INFO_TOKEN_PREVIEW: usize = 50;

/// Persists the cached token as JSON plus a text sidecar.
#[derive(Clone, Debug)]
pub struct FileStore {
	record_path: PathBuf,
	info_path: PathBuf,
}
impl FileStore {
	/// Opens (or creates) a cache directory using the default `token.json` file name.
	pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let dir = dir.into();

		Self::ensure_dir_exists(&dir)?;

		Ok(Self { record_path: dir.join(RECORD_FILE), info_path: dir.join(INFO_FILE) })
	}

	/// Opens a cache directory with file names derived from `client_id`, so several clients can
	/// share one directory while each keeps exactly one record.
	pub fn for_client(dir: impl Into<PathBuf>, client_id: &str) -> Result<Self, StoreError> {
		let dir = dir.into();

		Self::ensure_dir_exists(&dir)?;

		let fingerprint = client_fingerprint(client_id);

		Ok(Self {
			record_path: dir.join(format!("token-{fingerprint}.json")),
			info_path: dir.join(format!("token-{fingerprint}_info.txt")),
		})
	}

	/// Path of the structured record.
	pub fn record_path(&self) -> &Path {
		&self.record_path
	}

	/// Path of the human-readable sidecar.
	pub fn info_path(&self) -> &Path {
		&self.info_path
	}

	fn ensure_dir_exists(dir: &Path) -> Result<(), StoreError> {
		if dir.as_os_str().is_empty() {
			return Ok(());
		}

		fs::create_dir_all(dir).map_err(|e| StoreError::Backend {
			message: format!("Failed to create token cache directory {}: {e}", dir.display()),
		})
	}

	fn read_record(&self) -> Result<Option<CachedTokenRecord>, StoreError> {
		let bytes = match fs::read(&self.record_path) {
			Ok(bytes) => bytes,
			Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
			Err(e) =>
				return Err(StoreError::Backend {
					message: format!("Failed to read {}: {e}", self.record_path.display()),
				}),
		};

		CachedTokenRecord::decode(&bytes).map(Some)
	}

	/// Writes `record` to a fresh temporary file next to the primary file and syncs it.
	pub(crate) fn stage(&self, record: &CachedTokenRecord) -> Result<PathBuf, StoreError> {
		let serialized = record.encode()?;
		let tmp_path = self.staging_path();
		let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
			message: format!("Failed to create {}: {e}", tmp_path.display()),
		})?;

		file.write_all(&serialized).map_err(|e| StoreError::Backend {
			message: format!("Failed to write {}: {e}", tmp_path.display()),
		})?;
		file.sync_all().map_err(|e| StoreError::Backend {
			message: format!("Failed to sync {}: {e}", tmp_path.display()),
		})?;

		Ok(tmp_path)
	}

	/// Atomically replaces the primary file with a staged one.
	pub(crate) fn commit(&self, staged: &Path) -> Result<(), StoreError> {
		fs::rename(staged, &self.record_path).map_err(|e| {
			let _ = fs::remove_file(staged);

			StoreError::Backend {
				message: format!("Failed to replace {}: {e}", self.record_path.display()),
			}
		})
	}

	fn staging_path(&self) -> PathBuf {
		let name = self
			.record_path
			.file_name()
			.map(|name| name.to_string_lossy().into_owned())
			.unwrap_or_else(|| RECORD_FILE.into());

		self.record_path.with_file_name(format!("{name}.{:016x}.tmp", rand::random::<u64>()))
	}

	fn write_info(&self, record: &CachedTokenRecord) -> Result<(), StoreError> {
		let preview = record.token.chars().take(INFO_TOKEN_PREVIEW).collect::<String>();
		let contents = format!(
			"Token Information:\nCreated At: {}\nExpires At: {}\nToken: {preview}...\n",
			record.created_at, record.expires_at,
		);

		fs::write(&self.info_path, contents).map_err(|e| StoreError::Backend {
			message: format!("Failed to write {}: {e}", self.info_path.display()),
		})
	}

	fn remove_if_exists(path: &Path) -> Result<(), StoreError> {
		match fs::remove_file(path) {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
			Err(e) =>
				Err(StoreError::Backend { message: format!("Failed to remove {}: {e}", path.display()) }),
		}
	}
}
impl TokenStore for FileStore {
	fn load(&self) -> StoreFuture<'_, Option<CachedTokenRecord>> {
		Box::pin(async move { self.read_record() })
	}

	fn save(&self, record: CachedTokenRecord) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let staged = self.stage(&record)?;

			self.commit(&staged)?;

			if let Err(e) = self.write_info(&record) {
				obs::event!(warn, error = %e, "Token sidecar could not be written.");
			}

			Ok(())
		})
	}

	fn delete(&self) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let record = Self::remove_if_exists(&self.record_path);
			let info = Self::remove_if_exists(&self.info_path);

			record.and(info)
		})
	}
}

/// First 16 characters of the unpadded URL-safe base64 SHA-256 digest of `client_id`.
fn client_fingerprint(client_id: &str) -> String {
	let digest = Sha256::digest(client_id.as_bytes());
	let mut encoded = URL_SAFE_NO_PAD.encode(digest);

	encoded.truncate(16);

	encoded
}
