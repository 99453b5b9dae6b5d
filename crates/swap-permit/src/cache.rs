//! Caches owned by the permit resolver.
//!
//! Both caches live in the injected [`StorageService`], so their lifetime is
//! whatever the caller's storage backend gives them. Reads that may end in a
//! delete hold a per-key lock.

use crate::SignedPermit;
use alloy::primitives::{Address, U256};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use swap_storage::{StorageError, StorageService};
use swap_types::ChainId;
use tokio::sync::{Mutex, OwnedMutexGuard};

const SIGNATURE_NAMESPACE: &str = "permit2_sig";
const SUPPORT_NAMESPACE: &str = "permit2_chain_contract";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedPermit {
	pub permit: SignedPermit,
	/// Largest transfer the signature authorises.
	pub amount: U256,
	/// Unix time the signature stops being accepted.
	pub expiration: u64,
}

impl CachedPermit {
	/// A cached signature is usable for `amount` while it covers the amount
	/// and still has a full lead time left once a lead time has passed, so
	/// the deadline must be at least two lead times away. With a 600s lead a
	/// deadline 700s out is already stale and 1200s out is the first usable.
	pub fn is_usable(&self, amount: U256, now: u64, minimum_lead_time: u64) -> bool {
		amount <= self.amount
			&& now.saturating_add(minimum_lead_time)
				<= self.expiration.saturating_sub(minimum_lead_time)
	}
}

/// Signed permits keyed by `chain:wallet:token`.
pub struct PermitCache {
	storage: Arc<StorageService>,
	locks: DashMap<String, Arc<Mutex<()>>>,
	minimum_lead_time: Duration,
}

impl PermitCache {
	pub fn new(storage: Arc<StorageService>, minimum_lead_time: Duration) -> Self {
		Self {
			storage,
			locks: DashMap::new(),
			minimum_lead_time,
		}
	}

	pub fn key(chain_id: ChainId, wallet: Address, token: Address) -> String {
		format!("{}:{:#x}:{:#x}", chain_id, wallet, token)
	}

	async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
		let mutex = self.locks.entry(key.to_string()).or_default().clone();
		mutex.lock_owned().await
	}

	/// Returns the cached permit if it is still usable for `amount` at `now`.
	///
	/// An entry that is found unusable is deleted.
	pub async fn get_valid(
		&self,
		chain_id: ChainId,
		wallet: Address,
		token: Address,
		amount: U256,
		now: u64,
	) -> Result<Option<CachedPermit>, StorageError> {
		let key = Self::key(chain_id, wallet, token);
		let _guard = self.lock(&key).await;

		let cached = match self
			.storage
			.retrieve_optional::<CachedPermit>(SIGNATURE_NAMESPACE, &key)
			.await
		{
			Ok(None) => return Ok(None),
			Ok(Some(cached)) => Some(cached),
			Err(StorageError::Serialization(e)) => {
				tracing::warn!(key, error = %e, "Discarding unreadable cached permit");
				None
			}
			Err(e) => return Err(e),
		};

		match cached {
			Some(cached) if cached.is_usable(amount, now, self.minimum_lead_time.as_secs()) => {
				Ok(Some(cached))
			}
			_ => {
				tracing::debug!(key, "Deleting unusable cached permit");
				self.storage.remove(SIGNATURE_NAMESPACE, &key).await?;
				Ok(None)
			}
		}
	}

	pub async fn put(&self, entry: &CachedPermit) -> Result<(), StorageError> {
		let key = Self::key(entry.permit.chain_id, entry.permit.owner, entry.permit.token);
		let _guard = self.lock(&key).await;
		self.storage.store(SIGNATURE_NAMESPACE, &key, entry).await
	}

	pub async fn remove(
		&self,
		chain_id: ChainId,
		wallet: Address,
		token: Address,
	) -> Result<(), StorageError> {
		let key = Self::key(chain_id, wallet, token);
		let _guard = self.lock(&key).await;
		self.storage.remove(SIGNATURE_NAMESPACE, &key).await
	}

	/// Whether an entry exists, usable or not.
	pub async fn contains(
		&self,
		chain_id: ChainId,
		wallet: Address,
		token: Address,
	) -> Result<bool, StorageError> {
		self.storage
			.exists(SIGNATURE_NAMESPACE, &Self::key(chain_id, wallet, token))
			.await
	}
}

/// Per-chain answer to "is Permit2 deployed here".
pub struct ChainSupportCache {
	storage: Arc<StorageService>,
	ttl: Duration,
}

impl ChainSupportCache {
	pub fn new(storage: Arc<StorageService>, ttl: Duration) -> Self {
		Self { storage, ttl }
	}

	pub async fn get(&self, chain_id: ChainId) -> Result<Option<bool>, StorageError> {
		self.storage
			.retrieve_optional(SUPPORT_NAMESPACE, &chain_id.to_string())
			.await
	}

	pub async fn set(&self, chain_id: ChainId, supported: bool) -> Result<(), StorageError> {
		self.storage
			.store_with_ttl(SUPPORT_NAMESPACE, &chain_id.to_string(), &supported, Some(self.ttl))
			.await
	}
}
