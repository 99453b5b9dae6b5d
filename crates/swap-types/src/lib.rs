//! Common types shared by the swap execution engine crates.
//!
//! Tokens, pairs, rates and amounts describe what is being swapped; snapshots
//! and order records describe a quoted or submitted swap; events and the
//! configuration validation schema are shared plumbing.

pub mod amount;
pub mod chains;
pub mod events;
pub mod order;
pub mod rate;
pub mod snapshot;
pub mod token;
pub mod transaction;
pub mod validation;

pub use amount::{Amount, AmountError};
pub use chains::{
	ChainContracts, ChainDirectory, NATIVE_TOKEN_ADDRESS, PERMIT2_ADDRESS, ROUTER_ADDRESS,
};
pub use events::{EventBus, SwapEvent};
pub use order::{
	OrderHash, OrderRecord, OrderStatus, OrderStatusView, OrderTerms, RevealOutcome,
};
pub use rate::{Rate, VenueKind};
pub use snapshot::{NetworkFee, SlippageOption, SwapOptions, SwapSnapshot};
pub use token::{ChainId, Pair, Token, TokenId};
pub use transaction::{Transaction, TransactionReceipt, TxHash};
pub use validation::{ConfigSchema, Field, FieldType, Schema, ValidationError};

/// Returns the current unix timestamp in seconds.
pub fn current_timestamp() -> u64 {
	chrono::Utc::now().timestamp().max(0) as u64
}
