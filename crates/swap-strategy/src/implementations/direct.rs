//! Same-chain on-chain exchange priced from the on-chain rate.
//!
//! The venue only quotes: execution goes through the auction venues.

use crate::auction;
use crate::registry::VenueComponents;
use crate::{RateProvider, StrategyError, VenueStrategy};
use alloy::primitives::Address;
use async_trait::async_trait;
use std::sync::Arc;
use swap_permit::ResolverActions;
use swap_types::{
	Amount, OrderHash, OrderStatusView, Pair, SwapOptions, SwapSnapshot, TxHash, VenueKind,
};

pub struct DirectStrategy {
	rates: Arc<dyn RateProvider>,
	components: VenueComponents,
}

impl DirectStrategy {
	pub fn new(rates: Arc<dyn RateProvider>, components: VenueComponents) -> Self {
		Self { rates, components }
	}
}

#[async_trait]
impl VenueStrategy for DirectStrategy {
	fn kind(&self) -> VenueKind {
		VenueKind::Direct
	}

	fn support_swap(&self, pair: &Pair, _wallet: Option<Address>) -> bool {
		pair.is_same_chain()
	}

	async fn get_data_snapshot(
		&self,
		pair: &Pair,
		amount: Amount,
		wallet: Option<Address>,
		_finalize: bool,
	) -> Result<SwapSnapshot, StrategyError> {
		let supported = self.support_swap(pair, wallet);
		let wallet =
			auction::check_quote(&self.components, self.kind(), supported, pair, &amount, wallet)
				.await?;

		let rate = self
			.rates
			.on_chain_rate(pair.source.chain_id, &pair.source, &pair.destination)
			.await?
			.filter(|rate| !rate.rate.is_zero() && !rate.rate.is_negative())
			.ok_or_else(|| {
				StrategyError::Unsupported(format!(
					"No on-chain rate for {} -> {}",
					pair.source.id(),
					pair.destination.id()
				))
			})?;
		let destination_amount = rate.apply(amount.clone())?;

		Ok(SwapSnapshot {
			wallet,
			source_token: pair.source.clone(),
			destination_token: pair.destination.clone(),
			source_amount: amount,
			destination_amount: destination_amount.clone(),
			options: SwapOptions {
				rate: Some(rate.rate.clone()),
				min_receive: Some(destination_amount),
				..SwapOptions::default()
			},
			rate,
			strategy: self.kind(),
			raw_quote: serde_json::Value::Null,
		})
	}

	async fn prepare_swap(
		&self,
		_snapshot: &SwapSnapshot,
	) -> Result<ResolverActions, StrategyError> {
		Ok(ResolverActions::new())
	}

	async fn swap(&self, _snapshot: SwapSnapshot) -> Result<OrderHash, StrategyError> {
		Err(StrategyError::Unsupported(
			"Direct venue does not execute swaps".to_string(),
		))
	}

	async fn get_order_status(&self, _hash: OrderHash) -> Result<OrderStatusView, StrategyError> {
		Err(StrategyError::Unsupported(
			"Direct venue does not track orders".to_string(),
		))
	}

	async fn cancel_order(&self, _hash: OrderHash) -> Option<TxHash> {
		None
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::mock::{test_components, token, FixedRateProvider};
	use swap_types::Rate;

	const OWNER: Address = Address::new([0x1d; 20]);

	fn pair() -> Pair {
		Pair::new(
			token(1, Address::new([0x01; 20]), false),
			token(1, Address::new([0x02; 20]), false),
		)
	}

	fn rate(rate: &str, reverted: &str, is_reverted: bool) -> Rate {
		let pair = pair();
		Rate {
			venue: VenueKind::Direct,
			rate: rate.parse().unwrap(),
			reverted_rate: reverted.parse().unwrap(),
			is_reverted,
			source_token: pair.source,
			destination_token: pair.destination,
		}
	}

	fn strategy(rate: Option<Rate>) -> DirectStrategy {
		let (components, _, _) = test_components(OWNER, 1);
		DirectStrategy::new(Arc::new(FixedRateProvider(rate)), components)
	}

	#[tokio::test]
	async fn test_quote_applies_on_chain_rate() {
		let snapshot = strategy(Some(rate("2", "0.5", false)))
			.get_data_snapshot(&pair(), Amount::from(3u64), Some(OWNER), false)
			.await
			.unwrap();
		assert_eq!(snapshot.destination_amount, Amount::from(6u64));
		assert_eq!(snapshot.options.min_receive, Some(Amount::from(6u64)));
		assert!(snapshot.options.network_fee.is_none());
		assert_eq!(snapshot.strategy, VenueKind::Direct);
	}

	#[tokio::test]
	async fn test_reverted_rate_divides() {
		let snapshot = strategy(Some(rate("4", "0.25", true)))
			.get_data_snapshot(&pair(), Amount::from(1u64), Some(OWNER), false)
			.await
			.unwrap();
		assert_eq!(snapshot.destination_amount, Amount::from(4u64));
	}

	#[tokio::test]
	async fn test_missing_or_zero_rate_is_unsupported() {
		for rate in [None, Some(rate("0", "0", false))] {
			let result = strategy(rate)
				.get_data_snapshot(&pair(), Amount::one(), Some(OWNER), false)
				.await;
			assert!(matches!(result, Err(StrategyError::Unsupported(_))));
		}
	}

	#[tokio::test]
	async fn test_quote_only_venue() {
		let strategy = strategy(Some(rate("2", "0.5", false)));
		let snapshot = strategy
			.get_data_snapshot(&pair(), Amount::one(), Some(OWNER), false)
			.await
			.unwrap();
		assert!(strategy.prepare_swap(&snapshot).await.unwrap().is_empty());
		assert!(matches!(
			strategy.swap(snapshot).await,
			Err(StrategyError::Unsupported(_))
		));
		assert!(strategy.cancel_order(OrderHash::ZERO).await.is_none());
	}

	#[test]
	fn test_cross_chain_pair_is_unsupported() {
		let pair = Pair::new(
			token(1, Address::new([0x01; 20]), false),
			token(10, Address::new([0x02; 20]), false),
		);
		assert!(!strategy(None).support_swap(&pair, Some(OWNER)));
	}
}
