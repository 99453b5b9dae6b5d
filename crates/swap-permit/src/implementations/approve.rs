//! Conventional ERC-20 approval of the router.
//!
//! Used where Permit2 is unavailable. The wallet grants the router an
//! unlimited allowance in a single transaction and no signature is involved.

use crate::eip712::MAX_UINT160;
use crate::steps::{ResolverActions, ResolverStep, StepKind, StepOutput};
use crate::{PermitError, PermitSettings, TransferRequirementResolver};
use alloy::primitives::Address;
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use std::sync::Arc;
use swap_chain::contracts::IERC20;
use swap_chain::{ChainClient, WalletSigner};
use swap_types::{Amount, ChainDirectory, ChainId, Token, Transaction};

#[derive(Clone)]
pub struct ApproveResolver {
	chain: Arc<dyn ChainClient>,
	wallet: Arc<dyn WalletSigner>,
	contracts: Arc<ChainDirectory>,
	settings: PermitSettings,
}

impl ApproveResolver {
	pub fn new(
		chain: Arc<dyn ChainClient>,
		wallet: Arc<dyn WalletSigner>,
		contracts: Arc<ChainDirectory>,
		settings: PermitSettings,
	) -> Self {
		Self {
			chain,
			wallet,
			contracts,
			settings,
		}
	}

	fn router(&self, chain_id: ChainId) -> Result<Address, PermitError> {
		self.contracts
			.get(chain_id)
			.map(|contracts| contracts.router)
			.ok_or(PermitError::UnsupportedChain(chain_id))
	}

	fn approve_tx(
		&self,
		chain_id: ChainId,
		wallet: Address,
		token: Address,
	) -> Result<Transaction, PermitError> {
		let data = IERC20::approveCall {
			spender: self.router(chain_id)?,
			amount: MAX_UINT160,
		}
		.abi_encode();
		Ok(Transaction::call(chain_id, token, data).with_from(wallet))
	}

	async fn approve_step(
		&self,
		chain_id: ChainId,
		wallet: Address,
		token: Address,
	) -> Result<StepOutput, PermitError> {
		let actual = self.wallet.chain_id().await;
		if actual != Some(chain_id) {
			return Err(PermitError::WrongWalletChain {
				expected: chain_id,
				actual,
			});
		}

		let tx = self.approve_tx(chain_id, wallet, token)?;
		let hash = self.wallet.send_transaction(tx).await?;
		tracing::info!(chain_id, %token, %hash, "Sent router approval");
		self.chain.wait_transaction(chain_id, hash).await?;
		tokio::time::sleep(self.settings.approval_settle_delay).await;

		let allowance = self
			.chain
			.erc20_allowance(chain_id, token, wallet, self.router(chain_id)?)
			.await?;
		if allowance < self.settings.confirmation_threshold(MAX_UINT160) {
			return Err(PermitError::ApprovalNotConfirmed);
		}
		Ok(StepOutput::Approved)
	}
}

#[async_trait]
impl TransferRequirementResolver for ApproveResolver {
	async fn requirement_provided(
		&self,
		wallet: Address,
		token: &Token,
		amount: Amount,
	) -> Result<Option<StepOutput>, PermitError> {
		if token.is_native() {
			return Ok(Some(StepOutput::Approved));
		}
		let value = amount.to_wei(token.decimals)?;
		if value.is_zero() {
			return Ok(None);
		}
		let allowance = self
			.chain
			.erc20_allowance(token.chain_id, token.address, wallet, self.router(token.chain_id)?)
			.await?;
		Ok((allowance >= value).then_some(StepOutput::Approved))
	}

	async fn provide_requirements(
		&self,
		wallet: Address,
		token: &Token,
		amount: Amount,
	) -> Result<ResolverActions, PermitError> {
		let value = amount.to_wei(token.decimals)?;
		if value.is_zero() {
			return Err(PermitError::ZeroAmount);
		}
		if token.is_native() {
			return Ok(Vec::new());
		}

		let chain_id = token.chain_id;
		let allowance = self
			.chain
			.erc20_allowance(chain_id, token.address, wallet, self.router(chain_id)?)
			.await?;
		if allowance >= value {
			return Ok(Vec::new());
		}

		let tx = self.approve_tx(chain_id, wallet, token.address)?;
		if let Err(e) = self.chain.estimate_gas(&tx).await {
			tracing::warn!(token = %token.id(), error = %e, "Router approval would revert");
			return Err(PermitError::ApprovalWouldRevert(e.to_string()));
		}

		let this = self.clone();
		let token_address = token.address;
		Ok(vec![ResolverStep::new(StepKind::Approve, move || async move {
			this.approve_step(chain_id, wallet, token_address).await
		})])
	}
}
