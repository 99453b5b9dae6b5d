//! Chooses among several transfer resolvers.

use crate::implementations::approve::ApproveResolver;
use crate::implementations::permit2::Permit2Resolver;
use crate::steps::{ResolverActions, StepOutput};
use crate::{PermitError, TransferRequirementResolver};
use alloy::primitives::Address;
use async_trait::async_trait;
use std::sync::Arc;
use swap_types::{Amount, Token};

/// Tries its providers in order and returns the first plan that succeeds.
///
/// If the fallback reports the transfer as already authorised, no provider
/// is consulted. Errors about the caller's input end the search, anything
/// else moves on to the next provider.
pub struct CompositeTransferResolver {
	providers: Vec<Arc<dyn TransferRequirementResolver>>,
	fallback: Option<Arc<dyn TransferRequirementResolver>>,
}

impl CompositeTransferResolver {
	pub fn new(providers: Vec<Arc<dyn TransferRequirementResolver>>) -> Self {
		Self {
			providers,
			fallback: None,
		}
	}

	pub fn with_fallback(mut self, fallback: Arc<dyn TransferRequirementResolver>) -> Self {
		self.fallback = Some(fallback);
		self
	}

	/// Permit2 where it is deployed, a plain router approval elsewhere. An
	/// existing router allowance needs neither.
	pub fn standard(permit2: Arc<Permit2Resolver>, approve: Arc<ApproveResolver>) -> Self {
		Self::new(vec![permit2 as Arc<dyn TransferRequirementResolver>, approve.clone()])
			.with_fallback(approve)
	}
}

fn ends_search(error: &PermitError) -> bool {
	matches!(
		error,
		PermitError::ZeroAmount
			| PermitError::InsufficientBalance(_)
			| PermitError::WalletNotConnected
			| PermitError::UserRejected
			| PermitError::Amount(_)
	)
}

#[async_trait]
impl TransferRequirementResolver for CompositeTransferResolver {
	async fn requirement_provided(
		&self,
		wallet: Address,
		token: &Token,
		amount: Amount,
	) -> Result<Option<StepOutput>, PermitError> {
		for resolver in self.fallback.iter().chain(self.providers.iter()) {
			match resolver.requirement_provided(wallet, token, amount.clone()).await {
				Ok(Some(output)) => return Ok(Some(output)),
				Ok(None) => {}
				Err(e) => {
					tracing::warn!(token = %token.id(), error = %e, "Requirement check failed")
				}
			}
		}
		Ok(None)
	}

	async fn provide_requirements(
		&self,
		wallet: Address,
		token: &Token,
		amount: Amount,
	) -> Result<ResolverActions, PermitError> {
		if let Some(fallback) = &self.fallback {
			match fallback.requirement_provided(wallet, token, amount.clone()).await {
				Ok(Some(_)) => return Ok(Vec::new()),
				Ok(None) => {}
				Err(e) => tracing::warn!(token = %token.id(), error = %e, "Fallback check failed"),
			}
		}

		for provider in &self.providers {
			match provider.provide_requirements(wallet, token, amount.clone()).await {
				Ok(steps) => return Ok(steps),
				Err(e) if ends_search(&e) => return Err(e),
				Err(e) => {
					tracing::warn!(token = %token.id(), error = %e, "Transfer resolver declined");
				}
			}
		}
		Err(PermitError::NoSupportedProvider)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::steps::{ResolverStep, StepKind};
	use std::sync::atomic::{AtomicUsize, Ordering};

	struct Scripted {
		provided: bool,
		error: Option<fn() -> PermitError>,
		calls: AtomicUsize,
	}

	impl Scripted {
		fn ok() -> Arc<Self> {
			Arc::new(Self {
				provided: false,
				error: None,
				calls: AtomicUsize::new(0),
			})
		}

		fn failing(error: fn() -> PermitError) -> Arc<Self> {
			Arc::new(Self {
				provided: false,
				error: Some(error),
				calls: AtomicUsize::new(0),
			})
		}

		fn satisfied() -> Arc<Self> {
			Arc::new(Self {
				provided: true,
				error: None,
				calls: AtomicUsize::new(0),
			})
		}
	}

	#[async_trait]
	impl TransferRequirementResolver for Scripted {
		async fn requirement_provided(
			&self,
			_wallet: Address,
			_token: &Token,
			_amount: Amount,
		) -> Result<Option<StepOutput>, PermitError> {
			Ok(self.provided.then_some(StepOutput::Approved))
		}

		async fn provide_requirements(
			&self,
			_wallet: Address,
			_token: &Token,
			_amount: Amount,
		) -> Result<ResolverActions, PermitError> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			match self.error {
				Some(error) => Err(error()),
				None => Ok(vec![ResolverStep::new(StepKind::Approve, || async {
					Ok(StepOutput::Approved)
				})]),
			}
		}
	}

	fn token() -> Token {
		Token {
			chain_id: 1,
			address: Address::new([0x01; 20]),
			decimals: 18,
			symbol: "TKN".to_string(),
			cross_chain_supported: false,
			is_internal_wrap_token: false,
		}
	}

	#[tokio::test]
	async fn test_falls_through_to_next_provider() {
		let first = Scripted::failing(|| PermitError::UnsupportedChain(1));
		let second = Scripted::ok();
		let resolver = CompositeTransferResolver::new(vec![
			first.clone() as Arc<dyn TransferRequirementResolver>,
			second.clone(),
		]);

		let steps = resolver
			.provide_requirements(Address::ZERO, &token(), Amount::one())
			.await
			.unwrap();
		assert_eq!(steps.len(), 1);
		assert_eq!(first.calls.load(Ordering::SeqCst), 1);
		assert_eq!(second.calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn test_input_errors_are_not_swallowed() {
		let first = Scripted::failing(|| PermitError::InsufficientBalance("TKN".into()));
		let second = Scripted::ok();
		let resolver = CompositeTransferResolver::new(vec![
			first as Arc<dyn TransferRequirementResolver>,
			second.clone(),
		]);

		let result = resolver
			.provide_requirements(Address::ZERO, &token(), Amount::one())
			.await;
		assert!(matches!(result, Err(PermitError::InsufficientBalance(_))));
		assert_eq!(second.calls.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn test_satisfied_fallback_short_circuits() {
		let provider = Scripted::ok();
		let resolver = CompositeTransferResolver::new(vec![
			provider.clone() as Arc<dyn TransferRequirementResolver>
		])
		.with_fallback(Scripted::satisfied());

		let steps = resolver
			.provide_requirements(Address::ZERO, &token(), Amount::one())
			.await
			.unwrap();
		assert!(steps.is_empty());
		assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn test_no_provider_left() {
		let provider: Arc<dyn TransferRequirementResolver> =
			Scripted::failing(|| PermitError::ApprovalWouldRevert("reverted".into()));
		let resolver = CompositeTransferResolver::new(vec![provider]);
		let result = resolver
			.provide_requirements(Address::ZERO, &token(), Amount::one())
			.await;
		assert!(matches!(result, Err(PermitError::NoSupportedProvider)));
	}
}
