//! Spendable balances read from chain.

use crate::wrap::WrapNativeTokenResolver;
use crate::{AmountDataSource, StrategyError};
use alloy::primitives::Address;
use async_trait::async_trait;
use std::sync::Arc;
use swap_chain::ChainClient;
use swap_types::{Amount, Token};

/// Token balance of the wallet. For the native asset, and the internal wrap
/// token standing in for it, the fee of wrapping is held back since auction
/// venues only accept the wrapped token.
pub struct ChainAmountSource {
	chain: Arc<dyn ChainClient>,
	wrap: Arc<dyn WrapNativeTokenResolver>,
}

impl ChainAmountSource {
	pub fn new(chain: Arc<dyn ChainClient>, wrap: Arc<dyn WrapNativeTokenResolver>) -> Self {
		Self { chain, wrap }
	}
}

#[async_trait]
impl AmountDataSource for ChainAmountSource {
	async fn max_amount(&self, wallet: Address, token: &Token) -> Result<Amount, StrategyError> {
		if !token.is_native() && !token.is_internal_wrap_token {
			let balance = self
				.chain
				.erc20_balance(token.chain_id, token.address, wallet)
				.await?;
			return Ok(Amount::from_wei(balance, token.decimals)?);
		}

		let balance = self.chain.native_balance(token.chain_id, wallet).await?;
		let balance = Amount::from_wei(balance, token.decimals)?;
		if balance.is_zero() {
			return Ok(balance);
		}
		match self.wrap.estimate(token.chain_id, balance.clone()).await {
			Ok(fee) => {
				let spendable = balance.checked_sub(&fee)?;
				Ok(if spendable.is_negative() {
					Amount::zero()
				} else {
					spendable
				})
			}
			Err(e) => {
				tracing::warn!(token = %token.id(), error = %e, "Wrap fee estimate failed");
				Ok(balance)
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::wrap::ChainWrapResolver;
	use alloy::primitives::U256;
	use swap_chain::mock::{MockChainClient, MockWallet};
	use swap_types::{ChainDirectory, NATIVE_TOKEN_ADDRESS};

	const OWNER: Address = Address::new([0x0c; 20]);

	fn token(address: Address, decimals: u8) -> Token {
		Token {
			chain_id: 1,
			address,
			decimals,
			symbol: "T".to_string(),
			cross_chain_supported: true,
			is_internal_wrap_token: false,
		}
	}

	fn source(chain: Arc<MockChainClient>) -> ChainAmountSource {
		let wallet = Arc::new(MockWallet::new(OWNER, 1));
		let wrap = Arc::new(ChainWrapResolver::new(
			chain.clone(),
			wallet,
			Arc::new(ChainDirectory::with_defaults()),
		));
		ChainAmountSource::new(chain, wrap)
	}

	#[tokio::test]
	async fn test_erc20_balance_in_token_units() {
		let chain = Arc::new(MockChainClient::new());
		let usdc = Address::new([0x5c; 20]);
		chain.set_balance(usdc, OWNER, U256::from(2_500_000u64));
		let amount = source(chain).max_amount(OWNER, &token(usdc, 6)).await.unwrap();
		assert_eq!(amount, "2.5".parse::<Amount>().unwrap());
	}

	#[tokio::test]
	async fn test_native_balance_holds_back_wrap_fee() {
		let chain = Arc::new(MockChainClient::new());
		chain.set_native_balance(OWNER, U256::from(10u64).pow(U256::from(18u8)));
		chain.state.lock().unwrap().gas_price = U256::from(1_000_000_000u64);
		let amount = source(chain)
			.max_amount(OWNER, &token(NATIVE_TOKEN_ADDRESS, 18))
			.await
			.unwrap();
		// 50_000 gas at 1 gwei
		assert_eq!(amount, "0.99995".parse::<Amount>().unwrap());
	}
}
