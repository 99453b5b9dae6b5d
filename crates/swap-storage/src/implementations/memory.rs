//! In-memory storage backend.

use crate::{StorageError, StorageInterface};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

struct Entry {
	value: Vec<u8>,
	expires_at: Option<Instant>,
}

impl Entry {
	fn is_expired(&self, now: Instant) -> bool {
		self.expires_at.is_some_and(|at| now >= at)
	}
}

/// Process-local storage. Expired entries are dropped when next touched.
#[derive(Default)]
pub struct MemoryStorage {
	entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryStorage {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl StorageInterface for MemoryStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let now = Instant::now();
		{
			let entries = self.entries.read().await;
			match entries.get(key) {
				None => return Err(StorageError::NotFound),
				Some(entry) if !entry.is_expired(now) => return Ok(entry.value.clone()),
				Some(_) => {}
			}
		}
		self.entries.write().await.remove(key);
		Err(StorageError::NotFound)
	}

	async fn set_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<(), StorageError> {
		let expires_at = ttl.map(|ttl| Instant::now() + ttl);
		self.entries
			.write()
			.await
			.insert(key.to_string(), Entry { value, expires_at });
		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		self.entries.write().await.remove(key);
		Ok(())
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		let now = Instant::now();
		Ok(self
			.entries
			.read()
			.await
			.get(key)
			.is_some_and(|entry| !entry.is_expired(now)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test(start_paused = true)]
	async fn test_ttl_expires_entries() {
		let storage = MemoryStorage::new();
		storage
			.set_bytes("k", b"v".to_vec(), Some(Duration::from_secs(5)))
			.await
			.unwrap();
		assert_eq!(storage.get_bytes("k").await.unwrap(), b"v");

		tokio::time::advance(Duration::from_secs(6)).await;
		assert!(!storage.exists("k").await.unwrap());
		assert!(matches!(
			storage.get_bytes("k").await,
			Err(StorageError::NotFound)
		));
	}

	#[tokio::test]
	async fn test_delete_missing_key_succeeds() {
		let storage = MemoryStorage::new();
		storage.delete("nothing").await.unwrap();
	}
}
