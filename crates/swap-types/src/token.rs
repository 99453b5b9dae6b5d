use crate::chains::NATIVE_TOKEN_ADDRESS;
use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type ChainId = u64;

/// A token as described by the external token catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
	pub chain_id: ChainId,
	pub address: Address,
	pub decimals: u8,
	pub symbol: String,
	/// Whether the cross-chain venue accepts this token.
	#[serde(default)]
	pub cross_chain_supported: bool,
	/// Set on the catalog's internal representation of the native asset
	/// that can be wrapped one-to-one into the chain's wrapped token.
	#[serde(default)]
	pub is_internal_wrap_token: bool,
}

impl Token {
	pub fn id(&self) -> TokenId {
		TokenId(format!("{}:{:#x}", self.chain_id, self.address))
	}

	pub fn is_native(&self) -> bool {
		self.address == NATIVE_TOKEN_ADDRESS
	}
}

/// Stable identifier of a token: `chain:address`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenId(String);

impl TokenId {
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for TokenId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pair {
	pub source: Token,
	pub destination: Token,
}

impl Pair {
	pub fn new(source: Token, destination: Token) -> Self {
		Self {
			source,
			destination,
		}
	}

	pub fn is_same_chain(&self) -> bool {
		self.source.chain_id == self.destination.chain_id
	}

	pub fn is_cross_chain(&self) -> bool {
		!self.is_same_chain()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_token_id_is_lowercase_hex() {
		let token = Token {
			chain_id: 10,
			address: Address::repeat_byte(0xAB),
			decimals: 6,
			symbol: "USDC".to_string(),
			cross_chain_supported: true,
			is_internal_wrap_token: false,
		};
		assert_eq!(
			token.id().as_str(),
			"10:0xabababababababababababababababababababab"
		);
	}
}
