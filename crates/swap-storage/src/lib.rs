//! Storage for the swap engine.
//!
//! Provides a byte-level key/value abstraction with optional time-to-live,
//! a typed service on top of it, and the order repository that keeps
//! submitted order records. Permit and chain-support caches are namespaces
//! within the same service.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use swap_types::{ConfigSchema, Field, FieldType, Schema, ValidationError};
use thiserror::Error;

pub mod implementations {
	pub mod file;
	pub mod memory;
}

pub mod orders;

pub use orders::{OrderRepository, StorageOrderRepository};

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	#[error("Not found")]
	NotFound,
	#[error("Serialization error: {0}")]
	Serialization(String),
	#[error("Backend error: {0}")]
	Backend(String),
	#[error("Invalid storage configuration: {0}")]
	Configuration(String),
}

/// Low-level interface every storage backend implements.
///
/// Values written with a TTL must read as [`StorageError::NotFound`] once the
/// TTL has elapsed.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Retrieves raw bytes for the given key.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Stores raw bytes with optional time-to-live.
	async fn set_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<(), StorageError>;

	/// Deletes the value associated with the given key. Deleting a missing
	/// key succeeds.
	async fn delete(&self, key: &str) -> Result<(), StorageError>;

	/// Checks if a live value exists for the key.
	async fn exists(&self, key: &str) -> Result<bool, StorageError>;
}

/// Typed storage operations over a backend.
///
/// Values are JSON encoded and keyed `namespace:id`.
pub struct StorageService {
	backend: Box<dyn StorageInterface>,
}

impl StorageService {
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self { backend }
	}

	fn key(namespace: &str, id: &str) -> String {
		format!("{}:{}", namespace, id)
	}

	/// Stores a serializable value with optional time-to-live.
	pub async fn store_with_ttl<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
		ttl: Option<Duration>,
	) -> Result<(), StorageError> {
		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend
			.set_bytes(&Self::key(namespace, id), bytes, ttl)
			.await
	}

	/// Stores a serializable value without time-to-live.
	pub async fn store<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		self.store_with_ttl(namespace, id, data, None).await
	}

	/// Retrieves and deserializes a value.
	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<T, StorageError> {
		let bytes = self.backend.get_bytes(&Self::key(namespace, id)).await?;
		serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))
	}

	/// Retrieves a value, mapping a missing key to `None`.
	pub async fn retrieve_optional<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<Option<T>, StorageError> {
		match self.retrieve(namespace, id).await {
			Ok(value) => Ok(Some(value)),
			Err(StorageError::NotFound) => Ok(None),
			Err(e) => Err(e),
		}
	}

	pub async fn remove(&self, namespace: &str, id: &str) -> Result<(), StorageError> {
		self.backend.delete(&Self::key(namespace, id)).await
	}

	pub async fn exists(&self, namespace: &str, id: &str) -> Result<bool, StorageError> {
		self.backend.exists(&Self::key(namespace, id)).await
	}
}

/// Configuration schema of the `[storage]` table.
pub struct StorageSchema;

impl ConfigSchema for StorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![
				Field::new("backend", FieldType::String).with_validator(|value| {
					match value.as_str() {
						Some("memory") | Some("file") => Ok(()),
						other => Err(format!("Unknown storage backend {:?}", other)),
					}
				}),
			],
			vec![Field::new("path", FieldType::String)],
		);
		schema.validate(config)
	}
}

/// Creates a storage backend from the `[storage]` configuration table.
///
/// - `backend`: `"memory"` or `"file"`
/// - `path`: base directory for file storage (default `./data/storage`)
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	StorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;

	match config.get("backend").and_then(|v| v.as_str()) {
		Some("file") => {
			let path = config
				.get("path")
				.and_then(|v| v.as_str())
				.unwrap_or("./data/storage");
			Ok(Box::new(implementations::file::FileStorage::new(path.into())))
		}
		_ => Ok(Box::new(implementations::memory::MemoryStorage::new())),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use implementations::memory::MemoryStorage;
	use serde::Deserialize;

	#[derive(Debug, PartialEq, Serialize, Deserialize)]
	struct Entry {
		value: u32,
	}

	#[tokio::test]
	async fn test_typed_round_trip_and_remove() {
		let storage = StorageService::new(Box::new(MemoryStorage::new()));
		storage.store("ns", "a", &Entry { value: 7 }).await.unwrap();

		let entry: Entry = storage.retrieve("ns", "a").await.unwrap();
		assert_eq!(entry, Entry { value: 7 });
		assert!(storage.exists("ns", "a").await.unwrap());

		storage.remove("ns", "a").await.unwrap();
		let missing: Option<Entry> = storage.retrieve_optional("ns", "a").await.unwrap();
		assert!(missing.is_none());
	}

	#[tokio::test]
	async fn test_namespaces_do_not_collide() {
		let storage = StorageService::new(Box::new(MemoryStorage::new()));
		storage.store("one", "id", &Entry { value: 1 }).await.unwrap();
		storage.store("two", "id", &Entry { value: 2 }).await.unwrap();

		let one: Entry = storage.retrieve("one", "id").await.unwrap();
		let two: Entry = storage.retrieve("two", "id").await.unwrap();
		assert_eq!((one.value, two.value), (1, 2));
	}

	#[test]
	fn test_create_storage_rejects_unknown_backend() {
		let config = toml::Value::Table(toml::from_str("backend = \"redis\"").unwrap());
		assert!(matches!(
			create_storage(&config),
			Err(StorageError::Configuration(_))
		));
	}
}
