//! Submitted order records and their status.

use crate::rate::VenueKind;
use crate::token::ChainId;
use crate::transaction::TxHash;
use alloy::primitives::{Address, B256, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Hash identifying a submitted order (or the transaction for on-chain venues).
pub type OrderHash = B256;

/// Persisted record of a submitted order, used for status and cancel lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
	pub hash: OrderHash,
	pub source_chain: ChainId,
	pub source_token: Address,
	pub destination_chain: ChainId,
	pub destination_token: Address,
	pub strategy: VenueKind,
	pub account: Address,
	pub created_at: DateTime<Utc>,
}

/// Canonical order status every venue maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
	Pending,
	Executed,
	Expired,
	Cancelled,
	Failed,
}

impl OrderStatus {
	pub fn is_terminal(&self) -> bool {
		!matches!(self, OrderStatus::Pending)
	}
}

/// Final outcome of a cross-chain secret reveal loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RevealOutcome {
	Executed,
	Expired,
	Refunded,
	Cancelled,
}

/// Amounts and auction timing of a submitted order, as its venue reports them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTerms {
	/// Source amount in base units.
	pub making_amount: U256,
	/// Destination amount in base units.
	pub taking_amount: U256,
	pub auction_duration_secs: u64,
	pub auction_start: DateTime<Utc>,
}

/// Status of an order as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusView {
	pub hash: OrderHash,
	pub status: OrderStatus,
	/// Venue status string before mapping.
	pub venue_status: String,
	pub source_chain: ChainId,
	pub source_token: Address,
	pub destination_chain: ChainId,
	pub destination_token: Address,
	/// Missing when the status comes from a persisted reveal outcome
	/// instead of the relay.
	pub terms: Option<OrderTerms>,
	/// Transaction that cancelled the order, if any.
	pub cancel_tx: Option<TxHash>,
	/// Last persisted reveal loop outcome for cross-chain orders.
	pub reveal_outcome: Option<RevealOutcome>,
}
