//! File-based storage backend.
//!
//! Each key is one file under the base directory. The file holds a small JSON
//! envelope with the hex-encoded value and an optional unix expiry so that
//! TTLs survive restarts.

use crate::{StorageError, StorageInterface};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;

#[derive(Serialize, Deserialize)]
struct Envelope {
	expires_at: Option<i64>,
	data: String,
}

pub struct FileStorage {
	base_path: PathBuf,
}

impl FileStorage {
	pub fn new(base_path: PathBuf) -> Self {
		Self { base_path }
	}

	fn get_file_path(&self, key: &str) -> PathBuf {
		let safe_key = key.replace(['/', ':', '\\'], "_");
		self.base_path.join(format!("{}.json", safe_key))
	}

	async fn read_envelope(&self, key: &str) -> Result<Option<Envelope>, StorageError> {
		let path = self.get_file_path(key);
		let raw = match fs::read(&path).await {
			Ok(raw) => raw,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};
		let envelope: Envelope =
			serde_json::from_slice(&raw).map_err(|e| StorageError::Serialization(e.to_string()))?;

		let expired = envelope
			.expires_at
			.is_some_and(|at| chrono::Utc::now().timestamp() >= at);
		if expired {
			tracing::debug!(key, "Dropping expired storage entry");
			self.delete(key).await?;
			return Ok(None);
		}
		Ok(Some(envelope))
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let envelope = self.read_envelope(key).await?.ok_or(StorageError::NotFound)?;
		hex::decode(&envelope.data).map_err(|e| StorageError::Serialization(e.to_string()))
	}

	async fn set_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<(), StorageError> {
		let path = self.get_file_path(key);
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)
				.await
				.map_err(|e| StorageError::Backend(e.to_string()))?;
		}

		let envelope = Envelope {
			expires_at: ttl.map(|ttl| chrono::Utc::now().timestamp() + ttl.as_secs() as i64),
			data: hex::encode(value),
		};
		let bytes =
			serde_json::to_vec(&envelope).map_err(|e| StorageError::Serialization(e.to_string()))?;

		// Write to a temp file then rename so readers never see partial data
		let temp_path = path.with_extension("tmp");
		fs::write(&temp_path, bytes)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		fs::rename(&temp_path, &path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		match fs::remove_file(self.get_file_path(key)).await {
			Ok(_) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		Ok(self.read_envelope(key).await?.is_some())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_persists_across_instances() {
		let dir = tempfile::tempdir().unwrap();
		FileStorage::new(dir.path().to_path_buf())
			.set_bytes("orders:0xabc", b"record".to_vec(), None)
			.await
			.unwrap();

		let reopened = FileStorage::new(dir.path().to_path_buf());
		assert_eq!(reopened.get_bytes("orders:0xabc").await.unwrap(), b"record");
	}

	#[tokio::test]
	async fn test_zero_ttl_is_immediately_expired() {
		let dir = tempfile::tempdir().unwrap();
		let storage = FileStorage::new(dir.path().to_path_buf());
		storage
			.set_bytes("k", b"v".to_vec(), Some(Duration::ZERO))
			.await
			.unwrap();

		assert!(!storage.exists("k").await.unwrap());
		assert!(!dir.path().join("k.json").exists());
	}

	#[tokio::test]
	async fn test_missing_key_is_not_found() {
		let dir = tempfile::tempdir().unwrap();
		let storage = FileStorage::new(dir.path().to_path_buf());
		assert!(matches!(
			storage.get_bytes("absent").await,
			Err(StorageError::NotFound)
		));
	}
}
