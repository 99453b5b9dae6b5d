//! `order` subcommands over the persisted order records.

use anyhow::{Context, Result};
use std::str::FromStr;
use swap_storage::OrderRepository;
use swap_types::{OrderHash, OrderRecord, RevealOutcome};
use tracing::info;

pub fn parse_hash(hash: &str) -> Result<OrderHash> {
	OrderHash::from_str(hash).with_context(|| format!("Invalid order hash {}", hash))
}

/// Record and reveal outcome of one order, as printed by `order show`.
pub async fn order_report(
	repository: &dyn OrderRepository,
	hash: &OrderHash,
) -> Result<Option<serde_json::Value>> {
	let Some(record) = repository
		.get_order(hash)
		.await
		.context("Failed to read order record")?
	else {
		return Ok(None);
	};
	let outcome = repository
		.get_outcome(hash)
		.await
		.context("Failed to read reveal outcome")?;
	Ok(Some(report(&record, outcome)))
}

fn report(record: &OrderRecord, outcome: Option<RevealOutcome>) -> serde_json::Value {
	serde_json::json!({
		"order": record,
		"reveal_outcome": outcome,
	})
}

/// Removes an order record. Returns whether one existed.
pub async fn delete_order(repository: &dyn OrderRepository, hash: &OrderHash) -> Result<bool> {
	let existed = repository
		.get_order(hash)
		.await
		.context("Failed to read order record")?
		.is_some();
	if existed {
		repository
			.delete_order(hash)
			.await
			.context("Failed to delete order record")?;
		info!(order_hash = %hash, "Order record deleted");
	}
	Ok(existed)
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy::primitives::{Address, B256};
	use std::sync::Arc;
	use swap_storage::implementations::memory::MemoryStorage;
	use swap_storage::{StorageOrderRepository, StorageService};
	use swap_types::VenueKind;

	fn repository() -> StorageOrderRepository {
		StorageOrderRepository::new(Arc::new(StorageService::new(Box::new(MemoryStorage::new()))))
	}

	fn record(hash: OrderHash) -> OrderRecord {
		OrderRecord {
			hash,
			source_chain: 1,
			source_token: Address::new([0x11; 20]),
			destination_chain: 137,
			destination_token: Address::new([0x22; 20]),
			strategy: VenueKind::CrossChainAuction,
			account: Address::new([0x33; 20]),
			created_at: chrono::Utc::now(),
		}
	}

	#[test]
	fn test_parse_hash() {
		let hash = B256::repeat_byte(0xab);
		assert_eq!(parse_hash(&format!("{:#x}", hash)).unwrap(), hash);
		assert!(parse_hash("0x1234").is_err());
	}

	#[tokio::test]
	async fn test_report_includes_reveal_outcome() {
		let repository = repository();
		let hash = B256::repeat_byte(0x01);
		repository.save_order(&record(hash)).await.unwrap();
		repository
			.save_outcome(&hash, RevealOutcome::Executed)
			.await
			.unwrap();

		let report = order_report(&repository, &hash).await.unwrap().unwrap();
		assert_eq!(report["reveal_outcome"], "Executed");
		assert_eq!(report["order"]["destination_chain"], 137);

		let missing = order_report(&repository, &B256::repeat_byte(0x02)).await.unwrap();
		assert!(missing.is_none());
	}

	#[tokio::test]
	async fn test_delete_reports_whether_record_existed() {
		let repository = repository();
		let hash = B256::repeat_byte(0x03);
		repository.save_order(&record(hash)).await.unwrap();

		assert!(delete_order(&repository, &hash).await.unwrap());
		assert!(repository.get_order(&hash).await.unwrap().is_none());
		assert!(!delete_order(&repository, &hash).await.unwrap());
	}
}
