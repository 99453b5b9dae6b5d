//! Wrapping of the native asset into its ERC-20 representation.

use crate::StrategyError;
use alloy::primitives::{Address, U256};
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use std::sync::Arc;
use swap_chain::contracts::IWrappedNative;
use swap_chain::{ChainClient, WalletSigner};
use swap_types::{Amount, ChainContracts, ChainDirectory, ChainId, Transaction, TxHash};

#[async_trait]
pub trait WrapNativeTokenResolver: Send + Sync {
	/// Whether the connected wallet can wrap `amount` on `chain_id` now.
	async fn can_wrap(&self, chain_id: ChainId, amount: Amount) -> bool;

	/// Deposits `amount` of the native asset and waits for the receipt.
	async fn wrap(&self, chain_id: ChainId, amount: Amount) -> Result<TxHash, StrategyError>;

	/// Network fee of a deposit, in the native asset.
	async fn estimate(&self, chain_id: ChainId, amount: Amount) -> Result<Amount, StrategyError>;
}

pub struct ChainWrapResolver {
	chain: Arc<dyn ChainClient>,
	wallet: Arc<dyn WalletSigner>,
	contracts: Arc<ChainDirectory>,
}

impl ChainWrapResolver {
	pub fn new(
		chain: Arc<dyn ChainClient>,
		wallet: Arc<dyn WalletSigner>,
		contracts: Arc<ChainDirectory>,
	) -> Self {
		Self {
			chain,
			wallet,
			contracts,
		}
	}

	fn contracts(&self, chain_id: ChainId) -> Result<&ChainContracts, StrategyError> {
		self.contracts
			.get(chain_id)
			.ok_or_else(|| {
				StrategyError::Unsupported(format!("No wrapped native token on chain {}", chain_id))
			})
	}

	async fn active_account(&self, chain_id: ChainId) -> Result<Address, StrategyError> {
		let wallet = self
			.wallet
			.address()
			.await
			.ok_or(StrategyError::WalletNotConnected)?;
		let actual = self.wallet.chain_id().await;
		if actual != Some(chain_id) {
			return Err(StrategyError::WrongWalletChain {
				expected: chain_id,
				actual,
			});
		}
		Ok(wallet)
	}

	fn deposit_tx(
		&self,
		chain_id: ChainId,
		wallet: Address,
		amount: &Amount,
	) -> Result<(Transaction, U256), StrategyError> {
		if amount.is_zero() || amount.is_negative() {
			return Err(StrategyError::InvalidInput(
				"Amount must be more than 0".to_string(),
			));
		}
		let contracts = self.contracts(chain_id)?;
		let value = amount.to_wei(contracts.native_decimals)?;
		let tx = Transaction::call(
			chain_id,
			contracts.wrapped_native,
			IWrappedNative::depositCall {}.abi_encode(),
		)
		.with_from(wallet)
		.with_value(value);
		Ok((tx, value))
	}
}

#[async_trait]
impl WrapNativeTokenResolver for ChainWrapResolver {
	async fn can_wrap(&self, chain_id: ChainId, amount: Amount) -> bool {
		let check = async {
			let wallet = self.active_account(chain_id).await?;
			let (tx, value) = self.deposit_tx(chain_id, wallet, &amount)?;
			let balance = self.chain.native_balance(chain_id, wallet).await?;
			if balance < value {
				return Err(StrategyError::InsufficientBalance {
					requested: amount,
					available: Amount::from_wei(
						balance,
						self.contracts(chain_id)?.native_decimals,
					)?,
				});
			}
			self.chain.estimate_gas(&tx).await?;
			Ok::<(), StrategyError>(())
		};
		match check.await {
			Ok(()) => true,
			Err(e) => {
				tracing::warn!(chain_id, error = %e, "Cannot wrap native token");
				false
			}
		}
	}

	async fn wrap(&self, chain_id: ChainId, amount: Amount) -> Result<TxHash, StrategyError> {
		let wallet = self.active_account(chain_id).await?;
		let (tx, _) = self.deposit_tx(chain_id, wallet, &amount)?;
		if !self.can_wrap(chain_id, amount.clone()).await {
			return Err(StrategyError::Unsupported("Cannot wrap native token".to_string()));
		}

		let hash = self.wallet.send_transaction(tx).await?;
		tracing::info!(chain_id, %hash, %amount, "Sent wrap deposit");
		self.chain.wait_transaction(chain_id, hash).await?;
		Ok(hash)
	}

	async fn estimate(&self, chain_id: ChainId, amount: Amount) -> Result<Amount, StrategyError> {
		let wallet = self.active_account(chain_id).await?;
		let (tx, _) = self.deposit_tx(chain_id, wallet, &amount)?;
		let (gas, price) = tokio::try_join!(
			self.chain.estimate_gas(&tx),
			self.chain.gas_price(chain_id)
		)?;
		let fee = U256::from(gas).saturating_mul(price);
		Ok(Amount::from_wei(fee, self.contracts(chain_id)?.native_decimals)?)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use swap_chain::mock::{MockChainClient, MockWallet};

	const OWNER: Address = Address::new([0x0b; 20]);

	fn resolver(chain: Arc<MockChainClient>, wallet: Arc<MockWallet>) -> ChainWrapResolver {
		ChainWrapResolver::new(chain, wallet, Arc::new(ChainDirectory::with_defaults()))
	}

	fn ether(value: u64) -> U256 {
		U256::from(value) * U256::from(10u64).pow(U256::from(18u8))
	}

	#[tokio::test]
	async fn test_wrap_deposits_native_value() {
		let chain = Arc::new(MockChainClient::new());
		chain.set_native_balance(OWNER, ether(5));
		let wallet = Arc::new(MockWallet::new(OWNER, 1).attached_to(chain.clone()));
		let resolver = resolver(chain.clone(), wallet.clone());

		resolver.wrap(1, Amount::from(2u64)).await.unwrap();

		let sent = wallet.sent();
		assert_eq!(sent.len(), 1);
		assert_eq!(sent[0].value, ether(2));
		assert_eq!(sent[0].to, ChainDirectory::with_defaults().wrapped_native(1).unwrap());
		assert_eq!(
			chain.state.lock().unwrap().native_balances[&OWNER],
			ether(3)
		);
	}

	#[tokio::test]
	async fn test_cannot_wrap_more_than_balance() {
		let chain = Arc::new(MockChainClient::new());
		chain.set_native_balance(OWNER, ether(1));
		let wallet = Arc::new(MockWallet::new(OWNER, 1));
		let resolver = resolver(chain, wallet.clone());

		assert!(!resolver.can_wrap(1, Amount::from(2u64)).await);
		assert!(resolver.wrap(1, Amount::from(2u64)).await.is_err());
		assert!(wallet.sent().is_empty());
	}

	#[tokio::test]
	async fn test_zero_amount_is_invalid() {
		let chain = Arc::new(MockChainClient::new());
		let wallet = Arc::new(MockWallet::new(OWNER, 1));
		let resolver = resolver(chain, wallet);
		assert!(matches!(
			resolver.wrap(1, Amount::zero()).await,
			Err(StrategyError::InvalidInput(_))
		));
	}

	#[tokio::test]
	async fn test_estimate_multiplies_gas_by_price() {
		let chain = Arc::new(MockChainClient::new());
		chain.state.lock().unwrap().gas_price = U256::from(2_000_000_000u64);
		let wallet = Arc::new(MockWallet::new(OWNER, 1));
		let resolver = resolver(chain, wallet);

		// 50_000 gas at 2 gwei
		let fee = resolver.estimate(1, Amount::from(1u64)).await.unwrap();
		assert_eq!(fee, "0.0001".parse::<Amount>().unwrap());
	}

	#[tokio::test]
	async fn test_estimate_requires_matching_chain() {
		let chain = Arc::new(MockChainClient::new());
		let wallet = Arc::new(MockWallet::new(OWNER, 137));
		let resolver = resolver(chain, wallet);
		assert!(matches!(
			resolver.estimate(1, Amount::from(1u64)).await,
			Err(StrategyError::WrongWalletChain { expected: 1, .. })
		));
	}
}
