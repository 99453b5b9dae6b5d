//! Swap engine facade.
//!
//! [`SwapContext`] is the entry point callers use: it quotes the current
//! form through the first venue that accepts it and dispatches prepare,
//! swap, status and cancel calls to the venue that owns the snapshot or the
//! order. The [`preparation`] module decides, from the form, the wallet and
//! the latest quote, whether a swap can go ahead or which steps it still
//! needs.

use swap_permit::PermitError;
use swap_strategy::StrategyError;
use thiserror::Error;

pub mod context;
pub mod pair;
pub mod preparation;

pub use context::SwapContext;
pub use pair::{PairHolder, Side, SwapForm, TokenSlot};
pub use preparation::{
	evaluate, DriverHandle, PreparationDriver, PreparationInputs, PreparationMachine,
	PreparationState, PreparedTokens,
};

#[derive(Debug, Error)]
pub enum PreparationError {
	#[error("No snapshot for the current form")]
	MissingSnapshot,
	#[error("Unknown preparation steps {0}")]
	UnknownActions(String),
	#[error(transparent)]
	Strategy(#[from] StrategyError),
	#[error(transparent)]
	Permit(#[from] PermitError),
}

impl PreparationError {
	/// Whether the user declined a wallet prompt.
	pub fn is_user_rejection(&self) -> bool {
		matches!(
			self,
			PreparationError::Permit(PermitError::UserRejected)
				| PreparationError::Strategy(StrategyError::UserRejected)
				| PreparationError::Strategy(StrategyError::Permit(PermitError::UserRejected))
		)
	}
}
