//! Permit2 `PermitSingle` typed data.

use crate::{PermitError, SignedPermit};
use alloy::primitives::aliases::{U160, U48};
use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::{Eip712Domain, SolCall, SolStruct};
use swap_chain::contracts::IPermit2;
use swap_chain::TypedDataRequest;
use swap_types::ChainId;

/// Largest value of a Solidity `uint48`.
pub const MAX_UINT48: u64 = (1 << 48) - 1;

/// Largest value of a Solidity `uint160`, the amount requested by approvals
/// and permits.
pub const MAX_UINT160: U256 = U256::from_limbs([u64::MAX, u64::MAX, u32::MAX as u64, 0]);

pub fn permit_domain(chain_id: ChainId, permit2: Address) -> Eip712Domain {
	Eip712Domain::new(
		Some("Permit2".into()),
		None,
		Some(U256::from(chain_id)),
		Some(permit2),
		None,
	)
}

fn to_uint48(field: &str, value: u64) -> Result<U48, PermitError> {
	if value > MAX_UINT48 {
		return Err(PermitError::InvalidPermit(format!(
			"{} {} does not fit in uint48",
			field, value
		)));
	}
	Ok(U48::from(value))
}

/// Unsigned fields of a `PermitSingle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermitDraft {
	pub token: Address,
	pub spender: Address,
	pub amount: U256,
	pub expiration: u64,
	pub nonce: u64,
	pub sig_deadline: u64,
}

impl PermitDraft {
	pub fn to_permit_single(&self) -> Result<IPermit2::PermitSingle, PermitError> {
		if self.amount > U256::from(U160::MAX) {
			return Err(PermitError::InvalidPermit(format!(
				"amount {} does not fit in uint160",
				self.amount
			)));
		}
		Ok(IPermit2::PermitSingle {
			details: IPermit2::PermitDetails {
				token: self.token,
				amount: U160::from(self.amount),
				expiration: to_uint48("expiration", self.expiration)?,
				nonce: to_uint48("nonce", self.nonce)?,
			},
			spender: self.spender,
			sigDeadline: U256::from(self.sig_deadline),
		})
	}

	/// Builds the wallet request for this permit on `chain_id`.
	pub fn typed_data(
		&self,
		chain_id: ChainId,
		permit2: Address,
	) -> Result<TypedDataRequest, PermitError> {
		let permit = self.to_permit_single()?;
		let domain = permit_domain(chain_id, permit2);
		let signing_hash = permit.eip712_signing_hash(&domain);
		let message = serde_json::json!({
			"details": {
				"token": format!("{:#x}", self.token),
				"amount": self.amount.to_string(),
				"expiration": self.expiration.to_string(),
				"nonce": self.nonce.to_string(),
			},
			"spender": format!("{:#x}", self.spender),
			"sigDeadline": self.sig_deadline.to_string(),
		});
		Ok(TypedDataRequest {
			domain,
			primary_type: "PermitSingle".to_string(),
			message,
			signing_hash,
		})
	}

	pub fn into_signed(self, chain_id: ChainId, owner: Address, signature: Bytes) -> SignedPermit {
		SignedPermit {
			chain_id,
			owner,
			token: self.token,
			spender: self.spender,
			amount: self.amount,
			expiration: self.expiration,
			nonce: self.nonce,
			sig_deadline: self.sig_deadline,
			signature,
		}
	}
}

/// Arguments of `Permit2.permit(owner, permitSingle, signature)` without the
/// selector, the form routers accept as a permit blob.
pub fn encode_permit_call(permit: &SignedPermit) -> Result<Bytes, PermitError> {
	let draft = PermitDraft {
		token: permit.token,
		spender: permit.spender,
		amount: permit.amount,
		expiration: permit.expiration,
		nonce: permit.nonce,
		sig_deadline: permit.sig_deadline,
	};
	let call = IPermit2::permitCall {
		owner: permit.owner,
		permitSingle: draft.to_permit_single()?,
		signature: permit.signature.clone(),
	};
	let encoded = call.abi_encode();
	Ok(Bytes::copy_from_slice(&encoded[4..]))
}
