//! One-to-one wrap of the native asset into the chain's wrapped token.

use crate::auction;
use crate::registry::VenueComponents;
use crate::{StrategyError, VenueStrategy};
use alloy::primitives::Address;
use async_trait::async_trait;
use swap_permit::ResolverActions;
use swap_types::{
	Amount, NetworkFee, OrderHash, OrderStatusView, Pair, Rate, SwapOptions, SwapSnapshot, TxHash,
	VenueKind,
};

pub struct WrapStrategy {
	components: VenueComponents,
}

impl WrapStrategy {
	pub fn new(components: VenueComponents) -> Self {
		Self { components }
	}

	async fn network_fee(&self, pair: &Pair, amount: Amount) -> Option<NetworkFee> {
		match self.components.wrap.estimate(pair.source.chain_id, amount).await {
			Ok(fee) => Some(NetworkFee {
				amount: fee,
				token: Some(pair.source.clone()),
				is_free: false,
			}),
			Err(e) => {
				tracing::warn!(
					chain_id = pair.source.chain_id,
					error = %e,
					"Wrap fee estimate failed"
				);
				None
			}
		}
	}
}

#[async_trait]
impl VenueStrategy for WrapStrategy {
	fn kind(&self) -> VenueKind {
		VenueKind::Wrap
	}

	fn support_swap(&self, pair: &Pair, _wallet: Option<Address>) -> bool {
		pair.is_same_chain()
			&& pair.source.is_internal_wrap_token
			&& self.components.contracts.wrapped_native(pair.source.chain_id)
				== Some(pair.destination.address)
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

		let rate = Rate {
			venue: self.kind(),
			rate: Amount::one(),
			reverted_rate: Amount::one(),
			is_reverted: false,
			source_token: pair.source.clone(),
			destination_token: pair.destination.clone(),
		};
		let options = SwapOptions {
			rate: Some(Amount::one()),
			min_receive: Some(amount.clone()),
			network_fee: self.network_fee(pair, amount.clone()).await,
			..SwapOptions::default()
		};

		Ok(SwapSnapshot {
			wallet,
			source_token: pair.source.clone(),
			destination_token: pair.destination.clone(),
			source_amount: amount.clone(),
			destination_amount: amount,
			rate,
			options,
			strategy: self.kind(),
			raw_quote: serde_json::Value::Null,
		})
	}

	async fn prepare_swap(
		&self,
		snapshot: &SwapSnapshot,
	) -> Result<ResolverActions, StrategyError> {
		let pair = Pair::new(snapshot.source_token.clone(), snapshot.destination_token.clone());
		let supported = self.support_swap(&pair, Some(snapshot.wallet));
		auction::check_prepare(&self.components, self.kind(), supported, snapshot).await?;
		Ok(ResolverActions::new())
	}

	async fn swap(&self, snapshot: SwapSnapshot) -> Result<OrderHash, StrategyError> {
		auction::check_snapshot(self.kind(), &snapshot)?;
		let chain_id = snapshot.source_token.chain_id;
		let hash = self
			.components
			.wrap
			.wrap(chain_id, snapshot.destination_amount)
			.await?;
		tracing::info!(chain_id, %hash, "Wrapped native token");
		Ok(hash)
	}

	async fn get_order_status(&self, _hash: OrderHash) -> Result<OrderStatusView, StrategyError> {
		Err(StrategyError::Unsupported(
			"Wraps settle in their transaction".to_string(),
		))
	}

	async fn cancel_order(&self, _hash: OrderHash) -> Option<TxHash> {
		None
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::mock::{test_components, token};
	use alloy::primitives::U256;
	use swap_types::ChainDirectory;

	const OWNER: Address = Address::new([0x2d; 20]);

	fn weth(chain_id: u64) -> Address {
		ChainDirectory::with_defaults().wrapped_native(chain_id).unwrap()
	}

	fn ether(value: u64) -> U256 {
		U256::from(value) * U256::from(10u64).pow(U256::from(18u8))
	}

	fn strategy() -> WrapStrategy {
		WrapStrategy::new(test_components(OWNER, 1).0)
	}

	#[test]
	fn test_supports_only_internal_to_canonical_on_one_chain() {
		let strategy = strategy();
		let internal = token(1, weth(1), true);
		let canonical = token(1, weth(1), false);
		assert!(strategy.support_swap(&Pair::new(internal.clone(), canonical.clone()), None));

		// Source must be the internal representation
		assert!(!strategy.support_swap(&Pair::new(canonical.clone(), canonical.clone()), None));
		// Destination must be the canonical wrapped token
		let usdc = token(1, Address::new([0x5c; 20]), false);
		assert!(!strategy.support_swap(&Pair::new(internal.clone(), usdc), None));
		// Never across chains, even between wrapped natives
		let optimism_weth = token(10, weth(10), false);
		assert!(!strategy.support_swap(&Pair::new(internal, optimism_weth), Some(OWNER)));
		let base_internal = token(8453, weth(8453), true);
		let optimism_weth = token(10, weth(10), false);
		assert!(!strategy.support_swap(&Pair::new(base_internal, optimism_weth), Some(OWNER)));
	}

	#[tokio::test]
	async fn test_snapshot_is_one_to_one_with_fee() {
		let (components, chain, _) = test_components(OWNER, 1);
		chain.state.lock().unwrap().gas_price = U256::from(1_000_000_000u64);
		let strategy = WrapStrategy::new(components);
		let pair = Pair::new(token(1, weth(1), true), token(1, weth(1), false));

		let snapshot = strategy
			.get_data_snapshot(&pair, Amount::from(2u64), Some(OWNER), false)
			.await
			.unwrap();

		assert_eq!(snapshot.destination_amount, Amount::from(2u64));
		assert_eq!(snapshot.rate.rate, Amount::one());
		let fee = snapshot.options.network_fee.unwrap();
		assert_eq!(fee.amount, "0.00005".parse::<Amount>().unwrap());
		assert!(!fee.is_free);
	}

	#[tokio::test]
	async fn test_fee_estimate_failure_leaves_fee_empty() {
		let (components, _, wallet) = test_components(OWNER, 1);
		wallet.set_chain_id(137);
		let strategy = WrapStrategy::new(components);
		let pair = Pair::new(token(1, weth(1), true), token(1, weth(1), false));

		let snapshot = strategy
			.get_data_snapshot(&pair, Amount::one(), Some(OWNER), false)
			.await
			.unwrap();
		assert!(snapshot.options.network_fee.is_none());
	}

	#[tokio::test]
	async fn test_swap_wraps_destination_amount() {
		let (components, chain, wallet) = test_components(OWNER, 1);
		chain.set_native_balance(OWNER, ether(3));
		let strategy = WrapStrategy::new(components);
		let pair = Pair::new(token(1, weth(1), true), token(1, weth(1), false));
		let snapshot = strategy
			.get_data_snapshot(&pair, Amount::from(2u64), Some(OWNER), false)
			.await
			.unwrap();

		strategy.swap(snapshot).await.unwrap();

		let sent = wallet.sent();
		assert_eq!(sent.len(), 1);
		assert_eq!(sent[0].to, weth(1));
		assert_eq!(sent[0].value, ether(2));
	}

	#[tokio::test]
	async fn test_swap_rejects_foreign_snapshot() {
		let (components, chain, wallet) = test_components(OWNER, 1);
		chain.set_native_balance(OWNER, ether(3));
		let strategy = WrapStrategy::new(components);
		let pair = Pair::new(token(1, weth(1), true), token(1, weth(1), false));
		let mut snapshot = strategy
			.get_data_snapshot(&pair, Amount::one(), Some(OWNER), false)
			.await
			.unwrap();
		snapshot.strategy = VenueKind::Direct;

		assert!(matches!(
			strategy.swap(snapshot).await,
			Err(StrategyError::WrongSnapshot { .. })
		));
		assert!(wallet.sent().is_empty());
	}

	#[tokio::test]
	async fn test_swap_without_native_balance_fails() {
		let (components, _, wallet) = test_components(OWNER, 1);
		let strategy = WrapStrategy::new(components);
		let pair = Pair::new(token(1, weth(1), true), token(1, weth(1), false));
		let snapshot = strategy
			.get_data_snapshot(&pair, Amount::one(), Some(OWNER), false)
			.await
			.unwrap();

		assert!(strategy.swap(snapshot).await.is_err());
		assert!(wallet.sent().is_empty());
	}
}
