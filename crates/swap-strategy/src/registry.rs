//! Ordered set of venue strategies.
//!
//! Selection is a linear scan in priority order: the first venue whose
//! support predicate holds for the pair wins. New venues are wired in by
//! [`StrategyRegistry::standard`] and nowhere else.

use crate::implementations::cross_chain::CrossChainAuctionStrategy;
use crate::implementations::direct::DirectStrategy;
use crate::implementations::single_chain::SingleChainAuctionStrategy;
use crate::implementations::wrap::WrapStrategy;
use crate::relay::{AuctionRelay, CrossChainRelay};
use crate::wrap::WrapNativeTokenResolver;
use crate::{AmountDataSource, RateProvider, SwapSettings, VenueStrategy};
use alloy::primitives::Address;
use std::sync::Arc;
use swap_chain::{ChainClient, WalletSigner};
use swap_permit::TransferRequirementResolver;
use swap_storage::OrderRepository;
use swap_types::{ChainDirectory, EventBus, Pair, VenueKind};

/// Collaborators shared by every venue.
#[derive(Clone)]
pub struct VenueComponents {
	pub chain: Arc<dyn ChainClient>,
	pub wallet: Arc<dyn WalletSigner>,
	pub contracts: Arc<ChainDirectory>,
	pub orders: Arc<dyn OrderRepository>,
	pub amounts: Arc<dyn AmountDataSource>,
	pub transfer: Arc<dyn TransferRequirementResolver>,
	pub wrap: Arc<dyn WrapNativeTokenResolver>,
	pub settings: SwapSettings,
	pub events: Option<EventBus>,
}

pub struct StrategyRegistry {
	strategies: Vec<Arc<dyn VenueStrategy>>,
}

impl StrategyRegistry {
	/// Registry over `strategies`, kept in [`VenueKind`] priority order.
	pub fn new(mut strategies: Vec<Arc<dyn VenueStrategy>>) -> Self {
		strategies.sort_by_key(|strategy| priority(strategy.kind()));
		Self { strategies }
	}

	/// The four standard venues.
	pub fn standard(
		components: VenueComponents,
		auction: Arc<dyn AuctionRelay>,
		cross_chain: Arc<dyn CrossChainRelay>,
		rates: Arc<dyn RateProvider>,
	) -> Self {
		Self::new(vec![
			Arc::new(WrapStrategy::new(components.clone())) as Arc<dyn VenueStrategy>,
			Arc::new(CrossChainAuctionStrategy::new(cross_chain, components.clone())),
			Arc::new(SingleChainAuctionStrategy::new(auction, components.clone())),
			Arc::new(DirectStrategy::new(rates, components)),
		])
	}

	pub fn get(&self, kind: VenueKind) -> Option<Arc<dyn VenueStrategy>> {
		self.strategies
			.iter()
			.find(|strategy| strategy.kind() == kind)
			.cloned()
	}

	/// First venue in priority order that supports `pair`.
	pub fn select(&self, pair: &Pair, wallet: Option<Address>) -> Option<Arc<dyn VenueStrategy>> {
		self.supporting(pair, wallet).next()
	}

	/// Every venue supporting `pair`, in priority order.
	pub fn supporting<'a>(
		&'a self,
		pair: &'a Pair,
		wallet: Option<Address>,
	) -> impl Iterator<Item = Arc<dyn VenueStrategy>> + 'a {
		self.strategies
			.iter()
			.filter(move |strategy| strategy.support_swap(pair, wallet))
			.cloned()
	}

	pub fn kinds(&self) -> Vec<VenueKind> {
		self.strategies.iter().map(|strategy| strategy.kind()).collect()
	}
}

fn priority(kind: VenueKind) -> usize {
	VenueKind::ALL
		.iter()
		.position(|candidate| *candidate == kind)
		.unwrap_or(VenueKind::ALL.len())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::mock::{
		test_components, token, FixedRateProvider, MockAuctionRelay, MockCrossChainRelay,
	};

	const OWNER: Address = Address::new([0x0d; 20]);

	fn registry() -> StrategyRegistry {
		let (components, _, _) = test_components(OWNER, 1);
		StrategyRegistry::standard(
			components,
			Arc::new(MockAuctionRelay::new(&[1, 137])),
			Arc::new(MockCrossChainRelay::new()),
			Arc::new(FixedRateProvider(None)),
		)
	}

	#[test]
	fn test_standard_priority_order() {
		assert_eq!(registry().kinds(), VenueKind::ALL.to_vec());
	}

	#[test]
	fn test_select_prefers_wrap_for_internal_wrap_token() {
		let directory = ChainDirectory::with_defaults();
		let weth = directory.wrapped_native(1).unwrap();
		let internal = token(1, weth, true);
		let canonical = token(1, weth, false);
		let selected = registry()
			.select(&Pair::new(internal, canonical), Some(OWNER))
			.unwrap();
		assert_eq!(selected.kind(), VenueKind::Wrap);
	}

	#[test]
	fn test_select_routes_by_chains() {
		let registry = registry();
		let usdc = token(1, Address::new([0x5c; 20]), false);
		let dai = token(1, Address::new([0xda; 20]), false);
		let polygon_usdc = token(137, Address::new([0x5c; 20]), false);

		let same_chain = Pair::new(usdc.clone(), dai);
		assert_eq!(
			registry.select(&same_chain, Some(OWNER)).unwrap().kind(),
			VenueKind::SingleChainAuction
		);
		// Auctions need a wallet, the direct venue does not
		assert_eq!(
			registry.select(&same_chain, None).unwrap().kind(),
			VenueKind::Direct
		);
		assert_eq!(
			registry
				.select(&Pair::new(usdc, polygon_usdc), Some(OWNER))
				.unwrap()
				.kind(),
			VenueKind::CrossChainAuction
		);
	}

	#[test]
	fn test_new_sorts_by_priority() {
		let (components, _, _) = test_components(OWNER, 1);
		let registry = StrategyRegistry::new(vec![
			Arc::new(DirectStrategy::new(Arc::new(FixedRateProvider(None)), components.clone()))
				as Arc<dyn VenueStrategy>,
			Arc::new(WrapStrategy::new(components)),
		]);
		assert_eq!(registry.kinds(), vec![VenueKind::Wrap, VenueKind::Direct]);
		assert!(registry.get(VenueKind::CrossChainAuction).is_none());
	}
}
