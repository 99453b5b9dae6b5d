//! Transfer authorization through Permit2.
//!
//! The wallet approves the Permit2 contract once with an unlimited amount,
//! then signs a `PermitSingle` granting the router a bounded, time-limited
//! allowance. Signatures are cached per (chain, wallet, token) and reused
//! until they come within the minimum lead time of their deadline.

use crate::cache::{CachedPermit, ChainSupportCache, PermitCache};
use crate::eip712::{PermitDraft, MAX_UINT160};
use crate::steps::{ResolverActions, ResolverStep, StepKind, StepOutput};
use crate::{PermitError, PermitSettings, TransferRequirementResolver};
use alloy::primitives::Address;
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use std::sync::Arc;
use swap_chain::contracts::IERC20;
use swap_chain::{ChainClient, WalletError, WalletSigner};
use swap_storage::StorageService;
use swap_types::{
	current_timestamp, Amount, ChainContracts, ChainDirectory, ChainId, EventBus, SwapEvent,
	Token, Transaction,
};

#[derive(Clone)]
pub struct Permit2Resolver {
	chain: Arc<dyn ChainClient>,
	wallet: Arc<dyn WalletSigner>,
	contracts: Arc<ChainDirectory>,
	permits: Arc<PermitCache>,
	support: Arc<ChainSupportCache>,
	settings: PermitSettings,
	events: Option<EventBus>,
}

impl Permit2Resolver {
	pub fn new(
		chain: Arc<dyn ChainClient>,
		wallet: Arc<dyn WalletSigner>,
		contracts: Arc<ChainDirectory>,
		storage: Arc<StorageService>,
		settings: PermitSettings,
	) -> Self {
		Self {
			chain,
			wallet,
			contracts,
			permits: Arc::new(PermitCache::new(storage.clone(), settings.minimum_lead_time)),
			support: Arc::new(ChainSupportCache::new(storage, settings.support_cache_ttl)),
			settings,
			events: None,
		}
	}

	/// Publishes [`SwapEvent::PermitSigned`] after each new signature.
	pub fn with_events(mut self, events: EventBus) -> Self {
		self.events = Some(events);
		self
	}

	pub fn permit_cache(&self) -> &PermitCache {
		&self.permits
	}

	fn chain_contracts(&self, chain_id: ChainId) -> Result<&ChainContracts, PermitError> {
		self.contracts
			.get(chain_id)
			.ok_or(PermitError::UnsupportedChain(chain_id))
	}

	/// Whether Permit2 is deployed on `chain_id`: bytecode present and
	/// `DOMAIN_SEPARATOR()` readable. Answers are cached.
	pub async fn supports_chain(&self, chain_id: ChainId) -> Result<bool, PermitError> {
		let Ok(contracts) = self.chain_contracts(chain_id) else {
			return Ok(false);
		};
		if let Some(supported) = self.support.get(chain_id).await? {
			return Ok(supported);
		}

		let code = match self.chain.get_code(chain_id, contracts.permit2).await {
			Ok(code) => code,
			Err(e) => {
				tracing::warn!(chain_id, error = %e, "Permit2 bytecode read failed");
				return Ok(false);
			}
		};

		let supported = if code.is_empty() {
			false
		} else {
			match self
				.chain
				.permit2_domain_separator(chain_id, contracts.permit2)
				.await
			{
				Ok(_) => true,
				Err(e) => {
					tracing::warn!(chain_id, error = %e, "Permit2 DOMAIN_SEPARATOR read failed");
					false
				}
			}
		};

		tracing::debug!(chain_id, supported, "Resolved Permit2 support");
		self.support.set(chain_id, supported).await?;
		Ok(supported)
	}

	async fn ensure_wallet_chain(&self, chain_id: ChainId) -> Result<(), PermitError> {
		let actual = self.wallet.chain_id().await;
		if actual != Some(chain_id) {
			return Err(PermitError::WrongWalletChain {
				expected: chain_id,
				actual,
			});
		}
		Ok(())
	}

	async fn approve_step(
		&self,
		chain_id: ChainId,
		wallet: Address,
		token: Address,
	) -> Result<StepOutput, PermitError> {
		let permit2 = self.chain_contracts(chain_id)?.permit2;
		let data = IERC20::approveCall {
			spender: permit2,
			amount: MAX_UINT160,
		}
		.abi_encode();
		let tx = Transaction::call(chain_id, token, data).with_from(wallet);

		// Refuse before the wallet is ever prompted
		if let Err(e) = self.chain.estimate_gas(&tx).await {
			tracing::warn!(chain_id, %token, error = %e, "Approve for Permit2 would revert");
			return Err(PermitError::ApprovalWouldRevert(e.to_string()));
		}

		self.ensure_wallet_chain(chain_id).await?;

		let hash = self.wallet.send_transaction(tx).await?;
		tracing::info!(chain_id, %token, %hash, "Sent Permit2 approval");
		self.chain.wait_transaction(chain_id, hash).await?;

		tokio::time::sleep(self.settings.approval_settle_delay).await;

		let allowance = self
			.chain
			.erc20_allowance(chain_id, token, wallet, permit2)
			.await?;
		if allowance < self.settings.confirmation_threshold(MAX_UINT160) {
			tracing::warn!(chain_id, %token, %allowance, "Permit2 approval not visible yet");
			return Err(PermitError::ApprovalNotConfirmed);
		}
		Ok(StepOutput::Approved)
	}

	async fn sign_step(
		&self,
		chain_id: ChainId,
		wallet: Address,
		token: Address,
		nonce: u64,
	) -> Result<StepOutput, PermitError> {
		let now = current_timestamp();
		// A signature may have been stored since the step was planned
		if let Some(cached) = self
			.permits
			.get_valid(chain_id, wallet, token, MAX_UINT160, now)
			.await?
		{
			return Ok(StepOutput::Signed(cached.permit));
		}

		let contracts = self.chain_contracts(chain_id)?;
		let draft = PermitDraft {
			token,
			spender: contracts.router,
			amount: MAX_UINT160,
			expiration: now + self.settings.permit_expiration.as_secs(),
			nonce,
			sig_deadline: now + self.settings.signature_deadline.as_secs(),
		};
		let request = draft.typed_data(chain_id, contracts.permit2)?;

		let signature = match self.wallet.sign_typed_data(&request).await {
			Ok(signature) => signature,
			Err(WalletError::UserRejected) => return Err(PermitError::UserRejected),
			Err(e) => {
				tracing::warn!(chain_id, %token, error = %e, "Permit2 signing failed");
				return Err(PermitError::SignatureFailed {
					token,
					reason: e.to_string(),
				});
			}
		};

		let permit = draft.into_signed(chain_id, wallet, signature);
		self.permits
			.put(&CachedPermit {
				permit: permit.clone(),
				amount: MAX_UINT160,
				expiration: permit.sig_deadline,
			})
			.await?;

		if let Some(events) = &self.events {
			let _ = events.publish(SwapEvent::PermitSigned {
				chain_id,
				wallet,
				token,
			});
		}
		tracing::info!(chain_id, %token, "Stored Permit2 signature");
		Ok(StepOutput::Signed(permit))
	}
}

#[async_trait]
impl TransferRequirementResolver for Permit2Resolver {
	async fn requirement_provided(
		&self,
		wallet: Address,
		token: &Token,
		amount: Amount,
	) -> Result<Option<StepOutput>, PermitError> {
		let value = amount.to_wei(token.decimals)?;
		if value.is_zero() || !self.supports_chain(token.chain_id).await? {
			return Ok(None);
		}

		let permit2 = self.chain_contracts(token.chain_id)?.permit2;
		let allowance = match self
			.chain
			.erc20_allowance(token.chain_id, token.address, wallet, permit2)
			.await
		{
			Ok(allowance) => allowance,
			Err(e) => {
				tracing::warn!(token = %token.id(), error = %e, "Permit2 allowance read failed");
				return Ok(None);
			}
		};
		if allowance < value {
			return Ok(None);
		}

		let cached = self
			.permits
			.get_valid(token.chain_id, wallet, token.address, value, current_timestamp())
			.await?;
		Ok(cached.map(|cached| StepOutput::Signed(cached.permit)))
	}

	async fn provide_requirements(
		&self,
		wallet: Address,
		token: &Token,
		amount: Amount,
	) -> Result<ResolverActions, PermitError> {
		let chain_id = token.chain_id;
		let value = amount.to_wei(token.decimals)?;
		if value.is_zero() {
			return Err(PermitError::ZeroAmount);
		}
		if !self.supports_chain(chain_id).await? {
			return Err(PermitError::UnsupportedChain(chain_id));
		}

		let contracts = self.chain_contracts(chain_id)?;
		let state = self
			.chain
			.read_transfer_state(
				chain_id,
				contracts.permit2,
				token.address,
				wallet,
				contracts.router,
			)
			.await?;
		// The wrap step ahead of this one funds internal wrap tokens
		if state.balance < value && !token.is_internal_wrap_token {
			return Err(PermitError::InsufficientBalance(token.symbol.clone()));
		}

		let mut steps = ResolverActions::new();
		if state.token_allowance < value {
			let this = self.clone();
			let token_address = token.address;
			steps.push(ResolverStep::new(StepKind::Approve, move || async move {
				this.approve_step(chain_id, wallet, token_address).await
			}));
		}

		let cached = self
			.permits
			.get_valid(chain_id, wallet, token.address, MAX_UINT160, current_timestamp())
			.await?;
		if cached.is_none() {
			let this = self.clone();
			let token_address = token.address;
			let nonce = state.permit2.nonce;
			steps.push(ResolverStep::new(StepKind::SignPermit, move || async move {
				this.sign_step(chain_id, wallet, token_address, nonce).await
			}));
		}

		tracing::debug!(
			token = %token.id(),
			steps = %crate::joined_aliases(&steps),
			"Resolved Permit2 requirements"
		);
		Ok(steps)
	}
}
