//! Transfer authorization for swaps.
//!
//! Before a venue can pull the source token, the wallet needs either a
//! conventional ERC-20 allowance towards the venue's router or an allowance
//! towards Permit2 plus a signed Permit2 authorization for the router. The
//! resolvers here inspect on-chain state, reuse cached signatures, and return
//! the ordered remediation steps still missing.

use alloy::primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use swap_chain::{ChainError, WalletError};
use swap_storage::StorageError;
use swap_types::{Amount, AmountError, ChainId, Token};
use thiserror::Error;

pub mod cache;
pub mod eip712;
pub mod resolver;
pub mod steps;

pub mod implementations {
	pub mod approve;
	pub mod permit2;
}

pub use cache::{CachedPermit, ChainSupportCache, PermitCache};
pub use eip712::{encode_permit_call, PermitDraft, MAX_UINT160};
pub use implementations::approve::ApproveResolver;
pub use implementations::permit2::Permit2Resolver;
pub use resolver::CompositeTransferResolver;
pub use steps::{joined_aliases, ResolverActions, ResolverStep, StepKind, StepOutput};

#[derive(Debug, Error)]
pub enum PermitError {
	#[error("Amount must be more than 0")]
	ZeroAmount,
	#[error("Permit2 is not supported on chain {0}")]
	UnsupportedChain(ChainId),
	#[error("Insufficient token balance for {0}")]
	InsufficientBalance(String),
	#[error("Approval would revert: {0}")]
	ApprovalWouldRevert(String),
	#[error("Approval transaction landed but allowance is still below the target")]
	ApprovalNotConfirmed,
	#[error("Change wallet chain to {expected} before continuing (connected to {actual:?})")]
	WrongWalletChain {
		expected: ChainId,
		actual: Option<ChainId>,
	},
	#[error("Wallet is not connected")]
	WalletNotConnected,
	/// The user declined in their wallet. Never wrapped into another variant.
	#[error("User rejected the request")]
	UserRejected,
	#[error("Token approved for Permit2, but Permit2 signature failed for {token}: {reason}")]
	SignatureFailed { token: Address, reason: String },
	#[error("Invalid permit: {0}")]
	InvalidPermit(String),
	#[error("Wrap failed: {0}")]
	Wrap(String),
	#[error("No transfer resolver could provide the requirements")]
	NoSupportedProvider,
	#[error(transparent)]
	Amount(#[from] AmountError),
	#[error(transparent)]
	Chain(#[from] ChainError),
	#[error(transparent)]
	Storage(#[from] StorageError),
	#[error("Wallet error: {0}")]
	Wallet(String),
}

impl From<WalletError> for PermitError {
	fn from(e: WalletError) -> Self {
		match e {
			WalletError::UserRejected => PermitError::UserRejected,
			WalletError::NotConnected => PermitError::WalletNotConnected,
			other => PermitError::Wallet(other.to_string()),
		}
	}
}

/// A Permit2 `PermitSingle` together with the owner's signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedPermit {
	pub chain_id: ChainId,
	pub owner: Address,
	pub token: Address,
	pub spender: Address,
	pub amount: U256,
	/// Unix time the Permit2 allowance lapses.
	pub expiration: u64,
	pub nonce: u64,
	/// Unix time after which the signature is rejected.
	pub sig_deadline: u64,
	pub signature: Bytes,
}

/// Timing and threshold knobs of the Permit2 flow.
#[derive(Debug, Clone)]
pub struct PermitSettings {
	/// A cached signature is dropped once it gets this close to its deadline.
	pub minimum_lead_time: Duration,
	pub permit_expiration: Duration,
	pub signature_deadline: Duration,
	/// Share of the approval target, in basis points, that must be visible
	/// on-chain after the approval lands.
	pub approval_confirmation_bps: u32,
	/// Pause between the approval receipt and the allowance re-read.
	pub approval_settle_delay: Duration,
	pub support_cache_ttl: Duration,
}

impl Default for PermitSettings {
	fn default() -> Self {
		Self {
			minimum_lead_time: Duration::from_secs(10 * 60),
			permit_expiration: Duration::from_secs(30 * 24 * 60 * 60),
			signature_deadline: Duration::from_secs(60 * 60),
			approval_confirmation_bps: 5_000,
			approval_settle_delay: Duration::from_secs(1),
			support_cache_ttl: Duration::from_secs(365 * 24 * 60 * 60),
		}
	}
}

impl PermitSettings {
	/// Allowance that must be observed after approving `target`.
	pub fn confirmation_threshold(&self, target: U256) -> U256 {
		target / U256::from(10_000u32) * U256::from(self.approval_confirmation_bps)
	}
}

/// Decides which steps a wallet still needs before `amount` of `token` can
/// be transferred by a venue.
#[async_trait]
pub trait TransferRequirementResolver: Send + Sync {
	/// Fast path that never prompts the wallet. Returns the already satisfied
	/// authorization, if any.
	async fn requirement_provided(
		&self,
		wallet: Address,
		token: &Token,
		amount: Amount,
	) -> Result<Option<StepOutput>, PermitError>;

	/// Returns the ordered steps still needed. An empty list means the
	/// transfer is already authorised.
	async fn provide_requirements(
		&self,
		wallet: Address,
		token: &Token,
		amount: Amount,
	) -> Result<ResolverActions, PermitError>;
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_confirmation_threshold_is_half_by_default() {
		let settings = PermitSettings::default();
		assert_eq!(
			settings.confirmation_threshold(U256::from(1_000_000u64)),
			U256::from(500_000u64)
		);
	}

	#[test]
	fn test_user_rejection_is_preserved() {
		assert!(matches!(
			PermitError::from(WalletError::UserRejected),
			PermitError::UserRejected
		));
		assert!(matches!(
			PermitError::from(WalletError::Transport("down".into())),
			PermitError::Wallet(_)
		));
	}
}
