use crate::amount::Amount;
use crate::token::Token;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The execution venues the engine can route a swap through.
///
/// Declaration order is the registry's selection priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VenueKind {
	/// One-to-one native asset wrap.
	Wrap,
	/// Escrow-based cross-chain intent auction.
	CrossChainAuction,
	/// Single-chain intent auction.
	SingleChainAuction,
	/// Immediate on-chain exchange.
	Direct,
}

impl VenueKind {
	pub const ALL: [VenueKind; 4] = [
		VenueKind::Wrap,
		VenueKind::CrossChainAuction,
		VenueKind::SingleChainAuction,
		VenueKind::Direct,
	];

	pub fn name(&self) -> &'static str {
		match self {
			VenueKind::Wrap => "wrap",
			VenueKind::CrossChainAuction => "cross_chain_auction",
			VenueKind::SingleChainAuction => "single_chain_auction",
			VenueKind::Direct => "direct",
		}
	}
}

impl fmt::Display for VenueKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

impl FromStr for VenueKind {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		VenueKind::ALL
			.into_iter()
			.find(|kind| kind.name() == s)
			.ok_or_else(|| format!("Unknown venue: {}", s))
	}
}

/// Exchange rate produced by a single quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rate {
	pub venue: VenueKind,
	/// Destination units per source unit.
	pub rate: Amount,
	/// Source units per destination unit.
	pub reverted_rate: Amount,
	/// True when `reverted_rate` is the canonical direction.
	pub is_reverted: bool,
	pub source_token: Token,
	pub destination_token: Token,
}

impl Rate {
	/// Destination amount obtained for `amount` of the source token.
	pub fn apply(&self, amount: Amount) -> Result<Amount, crate::AmountError> {
		if self.is_reverted {
			amount.checked_div(&self.reverted_rate)
		} else {
			amount.checked_mul(&self.rate)
		}
	}

	pub fn is_on_chain(&self) -> bool {
		self.venue == VenueKind::Direct
	}
}
