//! Chain and wallet collaborators of the swap engine.
//!
//! The engine never talks to an RPC node or a wallet directly. It goes through
//! [`ChainClient`] for reads, gas estimation, receipts and block ticks, and
//! through [`WalletSigner`] for anything that needs the user's key. The
//! `implementations` module provides alloy-backed versions of both.

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::sol_types::Eip712Domain;
use async_trait::async_trait;
use futures::stream::BoxStream;
use swap_types::{ChainId, Transaction, TransactionReceipt, TxHash};
use thiserror::Error;

pub mod contracts;

pub mod implementations {
	pub mod local;
	pub mod rpc;
}

#[cfg(any(test, feature = "testing"))]
pub mod mock;

/// Errors returned by chain reads and transaction tracking.
#[derive(Debug, Error)]
pub enum ChainError {
	#[error("RPC error: {0}")]
	Rpc(String),
	#[error("Chain {0} is not configured")]
	UnsupportedChain(ChainId),
	#[error("Gas estimation failed: {0}")]
	Estimation(String),
	#[error("Transaction {0} reverted")]
	Reverted(TxHash),
}

/// Errors returned by the wallet.
#[derive(Debug, Error)]
pub enum WalletError {
	/// The user declined the request in their wallet.
	#[error("User rejected the request")]
	UserRejected,
	#[error("Wallet is not connected")]
	NotConnected,
	#[error("Signing failed: {0}")]
	Signing(String),
	#[error("Wallet transport error: {0}")]
	Transport(String),
}

/// Permit2 allowance slot of (owner, token, spender).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Permit2Allowance {
	pub amount: U256,
	pub expiration: u64,
	pub nonce: u64,
}

/// Everything the permit resolver needs to decide on remediation steps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferState {
	/// ERC-20 allowance of the owner towards the Permit2 contract.
	pub token_allowance: U256,
	pub permit2: Permit2Allowance,
	pub balance: U256,
}

/// An EIP-712 signature request.
///
/// `message` is the JSON rendering shown by external wallets; `signing_hash`
/// is the digest a local key signs.
#[derive(Debug, Clone)]
pub struct TypedDataRequest {
	pub domain: Eip712Domain,
	pub primary_type: String,
	pub message: serde_json::Value,
	pub signing_hash: B256,
}

/// Read access to chains plus transaction tracking.
#[async_trait]
pub trait ChainClient: Send + Sync {
	async fn get_code(&self, chain_id: ChainId, address: Address) -> Result<Bytes, ChainError>;

	/// Reads `DOMAIN_SEPARATOR()` from a Permit2 deployment.
	async fn permit2_domain_separator(
		&self,
		chain_id: ChainId,
		permit2: Address,
	) -> Result<B256, ChainError>;

	async fn erc20_allowance(
		&self,
		chain_id: ChainId,
		token: Address,
		owner: Address,
		spender: Address,
	) -> Result<U256, ChainError>;

	async fn erc20_balance(
		&self,
		chain_id: ChainId,
		token: Address,
		owner: Address,
	) -> Result<U256, ChainError>;

	async fn native_balance(&self, chain_id: ChainId, owner: Address) -> Result<U256, ChainError>;

	async fn permit2_allowance(
		&self,
		chain_id: ChainId,
		permit2: Address,
		owner: Address,
		token: Address,
		spender: Address,
	) -> Result<Permit2Allowance, ChainError>;

	/// Reads the token allowance towards Permit2, the Permit2 allowance slot
	/// and the token balance together.
	async fn read_transfer_state(
		&self,
		chain_id: ChainId,
		permit2: Address,
		token: Address,
		owner: Address,
		spender: Address,
	) -> Result<TransferState, ChainError> {
		let (token_allowance, permit2, balance) = tokio::try_join!(
			self.erc20_allowance(chain_id, token, owner, permit2),
			self.permit2_allowance(chain_id, permit2, owner, token, spender),
			self.erc20_balance(chain_id, token, owner),
		)?;
		Ok(TransferState {
			token_allowance,
			permit2,
			balance,
		})
	}

	/// Estimates gas for `tx`. An error means the call is expected to revert.
	async fn estimate_gas(&self, tx: &Transaction) -> Result<u64, ChainError>;

	async fn gas_price(&self, chain_id: ChainId) -> Result<U256, ChainError>;

	/// Waits until the transaction is mined.
	async fn wait_transaction(
		&self,
		chain_id: ChainId,
		hash: TxHash,
	) -> Result<TransactionReceipt, ChainError>;

	/// Stream of new block numbers of a chain.
	fn block_ticks(&self, chain_id: ChainId) -> BoxStream<'static, u64>;
}

/// The user's wallet.
#[async_trait]
pub trait WalletSigner: Send + Sync {
	/// Connected account, if any.
	async fn address(&self) -> Option<Address>;

	/// Chain the wallet is currently connected to.
	async fn chain_id(&self) -> Option<ChainId>;

	/// Sends a transaction. Contract writes carry ABI-encoded calldata.
	async fn send_transaction(&self, tx: Transaction) -> Result<TxHash, WalletError>;

	/// Signs EIP-712 typed data and returns the 65-byte signature.
	async fn sign_typed_data(&self, request: &TypedDataRequest) -> Result<Bytes, WalletError>;
}
