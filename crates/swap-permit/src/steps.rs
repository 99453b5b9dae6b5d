//! Remediation steps produced by transfer resolvers.
//!
//! A step is named up front and runs later, when the caller decides to
//! execute it. Steps of one [`ResolverActions`] list run strictly in order.

use crate::{PermitError, SignedPermit};
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use swap_types::TxHash;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
	Wrap,
	Approve,
	SignPermit,
}

impl StepKind {
	pub fn alias(&self) -> &'static str {
		match self {
			StepKind::Wrap => "Wrap",
			StepKind::Approve => "Approve",
			StepKind::SignPermit => "SignPermit",
		}
	}
}

/// Result of a completed step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutput {
	Wrapped(TxHash),
	Approved,
	Signed(SignedPermit),
}

type StepAction = Box<dyn FnOnce() -> BoxFuture<'static, Result<StepOutput, PermitError>> + Send>;

pub struct ResolverStep {
	kind: StepKind,
	action: StepAction,
}

impl ResolverStep {
	pub fn new<F, Fut>(kind: StepKind, action: F) -> Self
	where
		F: FnOnce() -> Fut + Send + 'static,
		Fut: Future<Output = Result<StepOutput, PermitError>> + Send + 'static,
	{
		Self {
			kind,
			action: Box::new(move || Box::pin(action())),
		}
	}

	pub fn kind(&self) -> StepKind {
		self.kind
	}

	/// Runs the step. Consumes it so a step can only run once.
	pub async fn run(self) -> Result<StepOutput, PermitError> {
		(self.action)().await
	}
}

impl fmt::Debug for ResolverStep {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ResolverStep")
			.field("kind", &self.kind)
			.finish_non_exhaustive()
	}
}

pub type ResolverActions = Vec<ResolverStep>;

/// Step aliases joined with `&`, e.g. `Wrap&Approve`.
pub fn joined_aliases(actions: &[ResolverStep]) -> String {
	actions
		.iter()
		.map(|step| step.kind().alias())
		.collect::<Vec<_>>()
		.join("&")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_step_runs_deferred_action() {
		let step = ResolverStep::new(StepKind::Approve, || async { Ok(StepOutput::Approved) });
		assert_eq!(step.kind(), StepKind::Approve);
		assert_eq!(step.run().await.unwrap(), StepOutput::Approved);
	}

	#[test]
	fn test_joined_aliases() {
		let actions = vec![
			ResolverStep::new(StepKind::Wrap, || async { Ok(StepOutput::Approved) }),
			ResolverStep::new(StepKind::SignPermit, || async { Ok(StepOutput::Approved) }),
		];
		assert_eq!(joined_aliases(&actions), "Wrap&SignPermit");
		assert_eq!(joined_aliases(&[]), "");
	}
}
