//! Keyed persistence of submitted orders.

use crate::{StorageError, StorageService};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use swap_types::{OrderHash, OrderRecord, RevealOutcome};

const ORDERS_NAMESPACE: &str = "orders";
const OUTCOMES_NAMESPACE: &str = "reveal_outcomes";

/// How long order records are kept when nobody deletes them.
pub const DEFAULT_ORDER_TTL: Duration = Duration::from_secs(3 * 24 * 60 * 60);

#[async_trait]
pub trait OrderRepository: Send + Sync {
	async fn save_order(&self, record: &OrderRecord) -> Result<(), StorageError>;

	async fn get_order(&self, hash: &OrderHash) -> Result<Option<OrderRecord>, StorageError>;

	async fn delete_order(&self, hash: &OrderHash) -> Result<(), StorageError>;

	/// Persists the terminal outcome of an order's background reveal loop.
	async fn save_outcome(
		&self,
		hash: &OrderHash,
		outcome: RevealOutcome,
	) -> Result<(), StorageError>;

	async fn get_outcome(&self, hash: &OrderHash) -> Result<Option<RevealOutcome>, StorageError>;
}

/// [`OrderRepository`] backed by the storage service.
pub struct StorageOrderRepository {
	storage: Arc<StorageService>,
	ttl: Duration,
}

impl StorageOrderRepository {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self {
			storage,
			ttl: DEFAULT_ORDER_TTL,
		}
	}

	pub fn with_ttl(mut self, ttl: Duration) -> Self {
		self.ttl = ttl;
		self
	}

	fn id(hash: &OrderHash) -> String {
		format!("{:#x}", hash)
	}
}

#[async_trait]
impl OrderRepository for StorageOrderRepository {
	async fn save_order(&self, record: &OrderRecord) -> Result<(), StorageError> {
		self.storage
			.store_with_ttl(ORDERS_NAMESPACE, &Self::id(&record.hash), record, Some(self.ttl))
			.await
	}

	async fn get_order(&self, hash: &OrderHash) -> Result<Option<OrderRecord>, StorageError> {
		self.storage
			.retrieve_optional(ORDERS_NAMESPACE, &Self::id(hash))
			.await
	}

	async fn delete_order(&self, hash: &OrderHash) -> Result<(), StorageError> {
		self.storage.remove(ORDERS_NAMESPACE, &Self::id(hash)).await?;
		self.storage.remove(OUTCOMES_NAMESPACE, &Self::id(hash)).await
	}

	async fn save_outcome(
		&self,
		hash: &OrderHash,
		outcome: RevealOutcome,
	) -> Result<(), StorageError> {
		self.storage
			.store_with_ttl(OUTCOMES_NAMESPACE, &Self::id(hash), &outcome, Some(self.ttl))
			.await
	}

	async fn get_outcome(&self, hash: &OrderHash) -> Result<Option<RevealOutcome>, StorageError> {
		self.storage
			.retrieve_optional(OUTCOMES_NAMESPACE, &Self::id(hash))
			.await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::implementations::memory::MemoryStorage;
	use alloy::primitives::{Address, B256};
	use swap_types::VenueKind;

	fn record(hash: B256) -> OrderRecord {
		OrderRecord {
			hash,
			source_chain: 1,
			source_token: Address::repeat_byte(1),
			destination_chain: 137,
			destination_token: Address::repeat_byte(2),
			strategy: VenueKind::CrossChainAuction,
			account: Address::repeat_byte(9),
			created_at: chrono::Utc::now(),
		}
	}

	fn repository() -> StorageOrderRepository {
		StorageOrderRepository::new(Arc::new(StorageService::new(Box::new(MemoryStorage::new()))))
	}

	#[tokio::test]
	async fn test_save_get_delete() {
		let repo = repository();
		let hash = B256::repeat_byte(0x11);
		let saved = record(hash);
		repo.save_order(&saved).await.unwrap();
		assert_eq!(repo.get_order(&hash).await.unwrap(), Some(saved));

		repo.delete_order(&hash).await.unwrap();
		assert!(repo.get_order(&hash).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn test_outcome_removed_with_order() {
		let repo = repository();
		let hash = B256::repeat_byte(0x22);
		repo.save_order(&record(hash)).await.unwrap();
		repo.save_outcome(&hash, RevealOutcome::Executed).await.unwrap();
		assert_eq!(
			repo.get_outcome(&hash).await.unwrap(),
			Some(RevealOutcome::Executed)
		);

		repo.delete_order(&hash).await.unwrap();
		assert!(repo.get_outcome(&hash).await.unwrap().is_none());
	}
}
