//! Order relays of the auction venues.
//!
//! A relay is the venue's off-chain backend: it prices quotes, accepts
//! signed orders, reports their status and, for cross-chain orders, asks
//! for secrets as fills land. Quote payloads are opaque to the engine and
//! travel verbatim inside [`VenueQuote::raw`].

use crate::secrets::HashLock;
use alloy::primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use swap_types::{Amount, ChainId, OrderHash, OrderTerms, TxHash};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
	#[error("Relay transport error: {0}")]
	Transport(String),
	#[error("Relay rejected the request: {0}")]
	Rejected(String),
	#[error("Order not known to the relay")]
	NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRequest {
	pub source_chain: ChainId,
	pub destination_chain: ChainId,
	pub source_token: Address,
	pub destination_token: Address,
	/// Source amount in base units.
	pub amount: U256,
	pub wallet: Address,
	/// Encoded Permit2 authorization, when one is already cached.
	pub permit: Option<Bytes>,
	/// Ask the relay for a gas-accurate estimate.
	pub enable_estimate: bool,
}

/// Auction parameters of the preset a quote recommends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionPreset {
	pub auction_duration_secs: u64,
	/// Destination amount at the end of the auction, the worst case.
	pub auction_end_amount: U256,
	/// Number of partial fills, hence secrets, a cross-chain order allows.
	pub secrets_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueQuote {
	pub quote_id: Option<String>,
	/// Market destination amount in base units.
	pub destination_amount: U256,
	pub preset_name: String,
	pub preset: AuctionPreset,
	/// Relay suggested slippage in percent.
	pub auto_slippage: Option<Amount>,
	pub raw: serde_json::Value,
}

/// Request and response of a quote, replayed by `swap`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredQuote {
	pub request: QuoteRequest,
	pub quote: VenueQuote,
}

/// Order states reported by the single-chain relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuctionOrderState {
	Pending,
	PartiallyFilled,
	Filled,
	Expired,
	Cancelled,
	Other(String),
}

/// Order states reported by the cross-chain relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrossChainOrderState {
	Pending,
	Executed,
	Expired,
	Refunding,
	Refunded,
	Cancelled,
	Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayOrderStatus<S> {
	pub state: S,
	pub cancel_tx: Option<TxHash>,
	pub terms: OrderTerms,
}

/// Backend of the single-chain intent auction.
#[async_trait]
pub trait AuctionRelay: Send + Sync {
	fn supports_chain(&self, chain_id: ChainId) -> bool;

	async fn quote(&self, request: &QuoteRequest) -> Result<VenueQuote, RelayError>;

	async fn submit_order(&self, quote: &StoredQuote) -> Result<OrderHash, RelayError>;

	async fn order_status(
		&self,
		chain_id: ChainId,
		hash: OrderHash,
	) -> Result<RelayOrderStatus<AuctionOrderState>, RelayError>;

	/// Calldata of the router call cancelling `hash`, if the order can be
	/// cancelled.
	async fn cancel_calldata(
		&self,
		chain_id: ChainId,
		hash: OrderHash,
	) -> Result<Option<Bytes>, RelayError>;
}

/// Backend of the escrow-based cross-chain auction.
#[async_trait]
pub trait CrossChainRelay: Send + Sync {
	fn supports_chain(&self, chain_id: ChainId) -> bool;

	async fn quote(&self, request: &QuoteRequest) -> Result<VenueQuote, RelayError>;

	/// Submits the order with its hash lock. Only secret hashes are sent.
	async fn submit_order(
		&self,
		quote: &StoredQuote,
		hash_lock: &HashLock,
		secret_hashes: &[B256],
	) -> Result<OrderHash, RelayError>;

	async fn order_status(
		&self,
		hash: OrderHash,
	) -> Result<RelayOrderStatus<CrossChainOrderState>, RelayError>;

	/// Fill indices whose escrows are ready to accept their secret.
	async fn ready_to_accept_secret_fills(&self, hash: OrderHash) -> Result<Vec<usize>, RelayError>;

	async fn submit_secret(&self, hash: OrderHash, secret: B256) -> Result<(), RelayError>;

	async fn cancel_calldata(&self, hash: OrderHash) -> Result<Option<Bytes>, RelayError>;
}
