//! Per-chain contract addresses used by the engine.

use crate::token::ChainId;
use alloy::primitives::{address, Address};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Placeholder address used by token catalogs for a chain's native asset.
pub const NATIVE_TOKEN_ADDRESS: Address = address!("EeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE");

/// Canonical Permit2 deployment, identical on most EVM chains.
pub const PERMIT2_ADDRESS: Address = address!("000000000022D473030F116dDEE9F6B43aC78BA3");

/// Aggregation router v6, the spender authorised by permits and approvals.
pub const ROUTER_ADDRESS: Address = address!("111111125421cA6dc452d289314280a0f8842A65");

/// Contracts and native asset metadata of one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainContracts {
	pub permit2: Address,
	pub router: Address,
	pub wrapped_native: Address,
	pub native_symbol: String,
	pub native_decimals: u8,
}

impl ChainContracts {
	fn standard(wrapped_native: Address, native_symbol: &str) -> Self {
		Self {
			permit2: PERMIT2_ADDRESS,
			router: ROUTER_ADDRESS,
			wrapped_native,
			native_symbol: native_symbol.to_string(),
			native_decimals: 18,
		}
	}
}

/// Lookup table of [`ChainContracts`] by chain id.
#[derive(Debug, Clone, Default)]
pub struct ChainDirectory {
	chains: HashMap<ChainId, ChainContracts>,
}

impl ChainDirectory {
	pub fn new() -> Self {
		Self::default()
	}

	/// Directory preloaded with the well-known mainnet deployments.
	pub fn with_defaults() -> Self {
		let mut chains = HashMap::new();
		let weth_l2 = address!("4200000000000000000000000000000000000006");
		chains.insert(
			1,
			ChainContracts::standard(address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"), "ETH"),
		);
		chains.insert(10, ChainContracts::standard(weth_l2, "ETH"));
		chains.insert(
			56,
			ChainContracts::standard(address!("bb4CdB9CBd36B01bD1cBaEBF2De08d9173bc095c"), "BNB"),
		);
		chains.insert(
			100,
			ChainContracts::standard(address!("e91D153E0b41518A2Ce8Dd3D7944Fa863463a97d"), "xDAI"),
		);
		chains.insert(
			137,
			ChainContracts::standard(address!("0d500B1d8E8eF31E21C99d1Db9A6444d3ADf1270"), "POL"),
		);
		chains.insert(8453, ChainContracts::standard(weth_l2, "ETH"));
		chains.insert(
			42161,
			ChainContracts::standard(address!("82aF49447D8a07e3bd95BD0d56f35241523fBab1"), "ETH"),
		);
		chains.insert(
			43114,
			ChainContracts::standard(address!("B31f66AA3C1e785363F0875A1B74E27b85FD66c7"), "AVAX"),
		);
		chains.insert(
			324,
			ChainContracts {
				permit2: address!("0000000000225e31D15943971F47aD3022F714Fa"),
				router: address!("6fd4383cB451173D5f9304F041C7BCBf27d561fF"),
				wrapped_native: address!("5AEa5775959fBC2557Cc8789bC1bf90A239D9a91"),
				native_symbol: "ETH".to_string(),
				native_decimals: 18,
			},
		);
		Self { chains }
	}

	pub fn insert(&mut self, chain_id: ChainId, contracts: ChainContracts) {
		self.chains.insert(chain_id, contracts);
	}

	pub fn get(&self, chain_id: ChainId) -> Option<&ChainContracts> {
		self.chains.get(&chain_id)
	}

	pub fn wrapped_native(&self, chain_id: ChainId) -> Option<Address> {
		self.get(chain_id).map(|c| c.wrapped_native)
	}

	pub fn chain_ids(&self) -> impl Iterator<Item = ChainId> + '_ {
		self.chains.keys().copied()
	}
}
