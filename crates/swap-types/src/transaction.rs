use crate::token::ChainId;
use alloy::primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

pub type TxHash = B256;

/// A contract call or value transfer to be sent by the wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
	pub chain_id: ChainId,
	pub from: Option<Address>,
	pub to: Address,
	pub data: Bytes,
	pub value: U256,
}

impl Transaction {
	pub fn call(chain_id: ChainId, to: Address, data: impl Into<Bytes>) -> Self {
		Self {
			chain_id,
			from: None,
			to,
			data: data.into(),
			value: U256::ZERO,
		}
	}

	pub fn with_from(mut self, from: Address) -> Self {
		self.from = Some(from);
		self
	}

	pub fn with_value(mut self, value: U256) -> Self {
		self.value = value;
		self
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
	pub hash: TxHash,
	pub block_number: u64,
	pub success: bool,
}
