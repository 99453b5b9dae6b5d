use crate::amount::Amount;
use crate::rate::{Rate, VenueKind};
use crate::token::Token;
use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlippageOption {
	pub percent: Amount,
	/// True when the caller overrode the venue's own slippage.
	pub is_custom: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkFee {
	pub amount: Amount,
	pub token: Option<Token>,
	/// Venues where a resolver pays gas report a free fee.
	pub is_free: bool,
}

/// Venue-reported options shown alongside a quote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapOptions {
	pub rate: Option<Amount>,
	pub slippage: Option<SlippageOption>,
	pub auction_duration_secs: Option<u64>,
	pub min_receive: Option<Amount>,
	pub network_fee: Option<NetworkFee>,
}

/// A priced quote ready to be executed by the strategy that produced it.
///
/// Taken by value by `swap` so it can only be executed once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapSnapshot {
	pub wallet: Address,
	pub source_token: Token,
	pub destination_token: Token,
	pub source_amount: Amount,
	pub destination_amount: Amount,
	pub rate: Rate,
	pub options: SwapOptions,
	pub strategy: VenueKind,
	/// Venue response needed to execute the quoted terms, kept verbatim.
	pub raw_quote: serde_json::Value,
}
