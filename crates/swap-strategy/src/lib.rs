//! Venue strategies for the swap engine.
//!
//! Every venue implements [`VenueStrategy`]: quote a pair into a
//! [`SwapSnapshot`], plan the remediation steps for it, execute it, then
//! track or cancel the resulting order. The [`StrategyRegistry`] holds the
//! venues in priority order.
//!
//! The auction venues talk to their backends through the relay traits in
//! [`relay`]; the cross-chain venue additionally keeps a secret reveal loop
//! running for each order it submits.

use alloy::primitives::Address;
use async_trait::async_trait;
use std::time::Duration;
use swap_chain::{ChainError, WalletError};
use swap_permit::{PermitError, ResolverActions};
use swap_storage::StorageError;
use swap_types::{
	Amount, AmountError, ChainId, OrderHash, OrderStatusView, Pair, Rate, RevealOutcome,
	SwapSnapshot, Token, TxHash, VenueKind,
};
use thiserror::Error;

pub mod amounts;
pub mod auction;
pub mod registry;
pub mod relay;
pub mod reveal;
pub mod secrets;
pub mod wrap;

pub mod implementations {
	pub mod cross_chain;
	pub mod direct;
	pub mod single_chain;
	pub mod wrap;
}

#[cfg(any(test, feature = "testing"))]
pub mod mock;

pub use amounts::ChainAmountSource;
pub use auction::normalize_source;
pub use implementations::cross_chain::CrossChainAuctionStrategy;
pub use implementations::direct::DirectStrategy;
pub use implementations::single_chain::SingleChainAuctionStrategy;
pub use implementations::wrap::WrapStrategy;
pub use registry::{StrategyRegistry, VenueComponents};
pub use relay::{AuctionRelay, CrossChainRelay, RelayError};
pub use reveal::{RevealHandle, RevealLoop};
pub use wrap::{ChainWrapResolver, WrapNativeTokenResolver};

#[derive(Debug, Error)]
pub enum StrategyError {
	#[error("Invalid input: {0}")]
	InvalidInput(String),
	#[error("Unsupported: {0}")]
	Unsupported(String),
	#[error("Insufficient balance: requested {requested}, available {available}")]
	InsufficientBalance { requested: Amount, available: Amount },
	#[error("Wallet is not connected")]
	WalletNotConnected,
	#[error("Change wallet chain to {expected} before continuing (connected to {actual:?})")]
	WrongWalletChain {
		expected: ChainId,
		actual: Option<ChainId>,
	},
	#[error("Quote has no quote id")]
	MissingQuoteId,
	#[error("Snapshot belongs to {actual}, not {expected}")]
	WrongSnapshot {
		expected: VenueKind,
		actual: VenueKind,
	},
	#[error("Order {0} not found")]
	OrderNotFound(OrderHash),
	#[error("Order {hash} ended with {outcome:?}")]
	OrderTerminated {
		hash: OrderHash,
		outcome: RevealOutcome,
	},
	#[error("Reveal loop for {0} was cancelled")]
	RevealCancelled(OrderHash),
	#[error("User rejected the request")]
	UserRejected,
	#[error("Wallet error: {0}")]
	Wallet(String),
	#[error("Serialization error: {0}")]
	Serialization(String),
	#[error(transparent)]
	Relay(#[from] RelayError),
	#[error(transparent)]
	Permit(#[from] PermitError),
	#[error(transparent)]
	Chain(#[from] ChainError),
	#[error(transparent)]
	Storage(#[from] StorageError),
	#[error(transparent)]
	Amount(#[from] AmountError),
}

impl From<WalletError> for StrategyError {
	fn from(e: WalletError) -> Self {
		match e {
			WalletError::UserRejected => StrategyError::UserRejected,
			WalletError::NotConnected => StrategyError::WalletNotConnected,
			other => StrategyError::Wallet(other.to_string()),
		}
	}
}

/// Quote and order tracking settings shared by the venues.
#[derive(Debug, Clone)]
pub struct SwapSettings {
	/// Caller's slippage override in percent. `None` keeps the venue's
	/// worst-case preset as minimum receive.
	pub slippage_percent: Option<Amount>,
	pub reveal_poll_interval: Duration,
	pub status_poll_interval: Duration,
}

impl Default for SwapSettings {
	fn default() -> Self {
		Self {
			slippage_percent: None,
			reveal_poll_interval: Duration::from_secs(1),
			status_poll_interval: Duration::from_secs(1),
		}
	}
}

/// One swap venue.
#[async_trait]
pub trait VenueStrategy: Send + Sync {
	fn kind(&self) -> VenueKind;

	/// Whether this venue can swap `pair`. Has no side effects.
	fn support_swap(&self, pair: &Pair, wallet: Option<Address>) -> bool;

	/// Quotes `amount` of the pair's source token.
	async fn get_data_snapshot(
		&self,
		pair: &Pair,
		amount: Amount,
		wallet: Option<Address>,
		finalize: bool,
	) -> Result<SwapSnapshot, StrategyError>;

	/// Steps that must run before [`VenueStrategy::swap`] can succeed.
	async fn prepare_swap(&self, snapshot: &SwapSnapshot) -> Result<ResolverActions, StrategyError>;

	/// Executes the snapshot and returns the order (or transaction) hash.
	async fn swap(&self, snapshot: SwapSnapshot) -> Result<OrderHash, StrategyError>;

	async fn get_order_status(&self, hash: OrderHash) -> Result<OrderStatusView, StrategyError>;

	/// Best effort. Returns the cancel transaction, or `None` when the order
	/// could not be cancelled for any reason.
	async fn cancel_order(&self, hash: OrderHash) -> Option<TxHash>;
}

/// Spendable balance of a token for a wallet.
#[async_trait]
pub trait AmountDataSource: Send + Sync {
	async fn max_amount(&self, wallet: Address, token: &Token) -> Result<Amount, StrategyError>;
}

/// On-chain exchange rate source for the direct venue.
#[async_trait]
pub trait RateProvider: Send + Sync {
	async fn on_chain_rate(
		&self,
		chain_id: ChainId,
		source: &Token,
		destination: &Token,
	) -> Result<Option<Rate>, StrategyError>;
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_wallet_rejection_is_preserved() {
		assert!(matches!(
			StrategyError::from(WalletError::UserRejected),
			StrategyError::UserRejected
		));
		assert!(matches!(
			StrategyError::from(WalletError::NotConnected),
			StrategyError::WalletNotConnected
		));
	}
}
