//! Local private-key wallet.
//!
//! Signs with an alloy [`PrivateKeySigner`] and broadcasts through per-chain
//! HTTP providers that carry the same key. Never reports a user rejection:
//! there is no user to ask.

use crate::implementations::rpc::to_request;
use crate::{TypedDataRequest, WalletError, WalletSigner};
use alloy::network::EthereumWallet;
use alloy::primitives::{Address, Bytes};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use swap_types::{
	ChainId, ConfigSchema, Field, FieldType, Schema, Transaction, TxHash, ValidationError,
};

pub struct LocalWallet {
	signer: PrivateKeySigner,
	providers: HashMap<ChainId, DynProvider>,
	active_chain: AtomicU64,
}

impl LocalWallet {
	/// Creates a wallet from a hex private key (with or without `0x`),
	/// connected to `active_chain`.
	pub fn new(
		private_key_hex: &str,
		rpc_urls: &HashMap<ChainId, String>,
		active_chain: ChainId,
	) -> Result<Self, WalletError> {
		let signer = private_key_hex
			.parse::<PrivateKeySigner>()
			.map_err(|e| WalletError::Signing(format!("Invalid private key: {}", e)))?;

		let mut providers = HashMap::new();
		for (chain_id, url) in rpc_urls {
			let url: url::Url = url
				.parse()
				.map_err(|e| WalletError::Transport(format!("Invalid RPC URL: {}", e)))?;
			let provider = ProviderBuilder::new()
				.wallet(EthereumWallet::from(signer.clone()))
				.connect_http(url)
				.erased();
			providers.insert(*chain_id, provider);
		}

		Ok(Self {
			signer,
			providers,
			active_chain: AtomicU64::new(active_chain),
		})
	}

	/// Switches the chain reported by [`WalletSigner::chain_id`].
	pub fn switch_chain(&self, chain_id: ChainId) -> Result<(), WalletError> {
		if !self.providers.contains_key(&chain_id) {
			return Err(WalletError::Transport(format!("Chain {} is not configured", chain_id)));
		}
		self.active_chain.store(chain_id, Ordering::SeqCst);
		Ok(())
	}
}

/// Configuration schema of the `[wallet]` table.
pub struct LocalWalletSchema;

impl ConfigSchema for LocalWalletSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![
				Field::new("private_key", FieldType::String).with_validator(|value| {
					let key = value.as_str().unwrap_or_default();
					let key = key.strip_prefix("0x").unwrap_or(key);
					if key.len() != 64 || hex::decode(key).is_err() {
						return Err("Private key must be 32 bytes of hex".to_string());
					}
					Ok(())
				}),
				Field::new(
					"chain_id",
					FieldType::Integer {
						min: Some(1),
						max: None,
					},
				),
			],
			vec![],
		);
		schema.validate(config)
	}
}

#[async_trait]
impl WalletSigner for LocalWallet {
	async fn address(&self) -> Option<Address> {
		Some(self.signer.address())
	}

	async fn chain_id(&self) -> Option<ChainId> {
		Some(self.active_chain.load(Ordering::SeqCst))
	}

	async fn send_transaction(&self, tx: Transaction) -> Result<TxHash, WalletError> {
		let provider = self.providers.get(&tx.chain_id).ok_or_else(|| {
			WalletError::Transport(format!("Chain {} is not configured", tx.chain_id))
		})?;
		let tx = tx.with_from(self.signer.address());
		let pending = provider
			.send_transaction(to_request(&tx))
			.await
			.map_err(|e| WalletError::Transport(e.to_string()))?;
		Ok(*pending.tx_hash())
	}

	async fn sign_typed_data(&self, request: &TypedDataRequest) -> Result<Bytes, WalletError> {
		let signature = self
			.signer
			.sign_hash(&request.signing_hash)
			.await
			.map_err(|e| WalletError::Signing(e.to_string()))?;
		Ok(Bytes::from(signature.as_bytes().to_vec()))
	}
}
