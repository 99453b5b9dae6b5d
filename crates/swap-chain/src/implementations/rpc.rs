//! [`ChainClient`] over alloy HTTP providers, one per configured chain.

use crate::contracts::{IPermit2, IERC20};
use crate::{ChainClient, ChainError, Permit2Allowance};
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::HashMap;
use std::time::Duration;
use swap_types::{ChainId, Transaction, TransactionReceipt, TxHash};

pub(crate) fn to_request(tx: &Transaction) -> TransactionRequest {
	let request = TransactionRequest::default()
		.to(tx.to)
		.input(tx.data.clone().into())
		.value(tx.value);
	match tx.from {
		Some(from) => request.from(from),
		None => request,
	}
}

pub struct RpcChainClient {
	providers: HashMap<ChainId, DynProvider>,
	poll_interval: Duration,
}

impl RpcChainClient {
	/// Connects to every `(chain id, rpc url)` pair.
	pub fn new(rpc_urls: &HashMap<ChainId, String>) -> Result<Self, ChainError> {
		let mut providers = HashMap::new();
		for (chain_id, url) in rpc_urls {
			let url: url::Url = url
				.parse()
				.map_err(|e| {
					ChainError::Rpc(format!("Invalid RPC URL for chain {}: {}", chain_id, e))
				})?;
			let provider = ProviderBuilder::new().connect_http(url).erased();
			providers.insert(*chain_id, provider);
		}
		Ok(Self {
			providers,
			poll_interval: Duration::from_secs(1),
		})
	}

	/// Interval used when polling for receipts and new blocks.
	pub fn with_poll_interval(mut self, interval: Duration) -> Self {
		self.poll_interval = interval;
		self
	}

	fn provider(&self, chain_id: ChainId) -> Result<&DynProvider, ChainError> {
		self.providers
			.get(&chain_id)
			.ok_or(ChainError::UnsupportedChain(chain_id))
	}
}

fn rpc_err(e: impl std::fmt::Display) -> ChainError {
	ChainError::Rpc(e.to_string())
}

#[async_trait]
impl ChainClient for RpcChainClient {
	async fn get_code(&self, chain_id: ChainId, address: Address) -> Result<Bytes, ChainError> {
		self.provider(chain_id)?
			.get_code_at(address)
			.await
			.map_err(rpc_err)
	}

	async fn permit2_domain_separator(
		&self,
		chain_id: ChainId,
		permit2: Address,
	) -> Result<B256, ChainError> {
		IPermit2::new(permit2, self.provider(chain_id)?.clone())
			.DOMAIN_SEPARATOR()
			.call()
			.await
			.map_err(rpc_err)
	}

	async fn erc20_allowance(
		&self,
		chain_id: ChainId,
		token: Address,
		owner: Address,
		spender: Address,
	) -> Result<U256, ChainError> {
		IERC20::new(token, self.provider(chain_id)?.clone())
			.allowance(owner, spender)
			.call()
			.await
			.map_err(rpc_err)
	}

	async fn erc20_balance(
		&self,
		chain_id: ChainId,
		token: Address,
		owner: Address,
	) -> Result<U256, ChainError> {
		IERC20::new(token, self.provider(chain_id)?.clone())
			.balanceOf(owner)
			.call()
			.await
			.map_err(rpc_err)
	}

	async fn native_balance(&self, chain_id: ChainId, owner: Address) -> Result<U256, ChainError> {
		self.provider(chain_id)?
			.get_balance(owner)
			.await
			.map_err(rpc_err)
	}

	async fn permit2_allowance(
		&self,
		chain_id: ChainId,
		permit2: Address,
		owner: Address,
		token: Address,
		spender: Address,
	) -> Result<Permit2Allowance, ChainError> {
		let slot = IPermit2::new(permit2, self.provider(chain_id)?.clone())
			.allowance(owner, token, spender)
			.call()
			.await
			.map_err(rpc_err)?;
		Ok(Permit2Allowance {
			amount: U256::from(slot.amount),
			expiration: slot.expiration.to::<u64>(),
			nonce: slot.nonce.to::<u64>(),
		})
	}

	async fn estimate_gas(&self, tx: &Transaction) -> Result<u64, ChainError> {
		self.provider(tx.chain_id)?
			.estimate_gas(to_request(tx))
			.await
			.map_err(|e| ChainError::Estimation(e.to_string()))
	}

	async fn gas_price(&self, chain_id: ChainId) -> Result<U256, ChainError> {
		let price = self
			.provider(chain_id)?
			.get_gas_price()
			.await
			.map_err(rpc_err)?;
		Ok(U256::from(price))
	}

	async fn wait_transaction(
		&self,
		chain_id: ChainId,
		hash: TxHash,
	) -> Result<TransactionReceipt, ChainError> {
		let provider = self.provider(chain_id)?;
		loop {
			match provider.get_transaction_receipt(hash).await {
				Ok(Some(receipt)) => {
					let receipt = TransactionReceipt {
						hash,
						block_number: receipt.block_number.unwrap_or_default(),
						success: receipt.status(),
					};
					if !receipt.success {
						return Err(ChainError::Reverted(hash));
					}
					return Ok(receipt);
				}
				Ok(None) => {}
				Err(e) => tracing::warn!(chain_id, %hash, error = %e, "Receipt poll failed"),
			}
			tokio::time::sleep(self.poll_interval).await;
		}
	}

	fn block_ticks(&self, chain_id: ChainId) -> BoxStream<'static, u64> {
		let Some(provider) = self.providers.get(&chain_id).cloned() else {
			return stream::empty().boxed();
		};
		let interval = self.poll_interval;

		stream::unfold((provider, 0u64), move |(provider, last)| async move {
			loop {
				match provider.get_block_number().await {
					Ok(number) if number > last => return Some((number, (provider, number))),
					Ok(_) => {}
					Err(e) => tracing::warn!(chain_id, error = %e, "Block number poll failed"),
				}
				tokio::time::sleep(interval).await;
			}
		})
		.boxed()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_rejects_invalid_url() {
		let urls = HashMap::from([(1u64, "not a url".to_string())]);
		assert!(matches!(RpcChainClient::new(&urls), Err(ChainError::Rpc(_))));
	}

	#[tokio::test]
	async fn test_unknown_chain_is_unsupported() {
		let urls = HashMap::from([(1u64, "http://localhost:8545".to_string())]);
		let client = RpcChainClient::new(&urls).unwrap();
		assert!(matches!(
			client.gas_price(137).await,
			Err(ChainError::UnsupportedChain(137))
		));
	}

	#[test]
	fn test_request_carries_sender() {
		let tx = Transaction::call(1, Address::repeat_byte(1), vec![0xde, 0xad])
			.with_from(Address::repeat_byte(2));
		let request = to_request(&tx);
		assert_eq!(request.from, Some(Address::repeat_byte(2)));
	}
}
