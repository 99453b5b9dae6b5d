//! The token pair and amounts a swap is being prepared for.

use swap_types::{Amount, Pair, Token, TokenId};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
	Source,
	Destination,
}

/// Token and amount on one side of the form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenSlot {
	pub token: Option<Token>,
	pub amount: Option<Amount>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SwapForm {
	pub source: TokenSlot,
	pub destination: TokenSlot,
}

impl SwapForm {
	pub fn pair(&self) -> Option<Pair> {
		match (&self.source.token, &self.destination.token) {
			(Some(source), Some(destination)) => {
				Some(Pair::new(source.clone(), destination.clone()))
			}
			_ => None,
		}
	}

	fn slot_mut(&mut self, side: Side) -> &mut TokenSlot {
		match side {
			Side::Source => &mut self.source,
			Side::Destination => &mut self.destination,
		}
	}

	/// The parts of the form a quote depends on. The destination amount is
	/// an output of quoting and is left out.
	pub fn quote_inputs(&self) -> (Option<TokenId>, Option<Amount>, Option<TokenId>) {
		(
			self.source.token.as_ref().map(Token::id),
			self.source.amount.clone(),
			self.destination.token.as_ref().map(Token::id),
		)
	}
}

fn same_token(a: &Token, b: &Token) -> bool {
	a.chain_id == b.chain_id && a.address == b.address
}

/// Holds the form and notifies subscribers of every change.
pub struct PairHolder {
	form: watch::Sender<SwapForm>,
}

impl PairHolder {
	pub fn new() -> Self {
		let (form, _) = watch::channel(SwapForm::default());
		Self { form }
	}

	pub fn snapshot(&self) -> SwapForm {
		self.form.borrow().clone()
	}

	pub fn subscribe(&self) -> watch::Receiver<SwapForm> {
		self.form.subscribe()
	}

	pub fn set_pair(&self, source: Option<Token>, destination: Option<Token>) {
		self.form.send_modify(|form| {
			form.source.token = source;
			form.destination.token = destination;
		});
	}

	/// Selects `token` on `side`.
	///
	/// Picking the token already on the other side switches the pair. A new
	/// source clears a destination it cannot be swapped into: one side
	/// supports cross-chain swaps and the other does not, or neither does
	/// and the chains differ.
	pub fn set_token(&self, side: Side, token: Option<Token>) {
		self.form.send_modify(|form| {
			let Some(token) = token else {
				form.slot_mut(side).token = None;
				return;
			};
			let other = match side {
				Side::Source => form.destination.token.as_ref(),
				Side::Destination => form.source.token.as_ref(),
			};
			if other.is_some_and(|other| same_token(other, &token)) {
				std::mem::swap(&mut form.source, &mut form.destination);
				return;
			}
			if side == Side::Source {
				let incompatible = form.destination.token.as_ref().is_some_and(|destination| {
					destination.cross_chain_supported != token.cross_chain_supported
						|| (!destination.cross_chain_supported
							&& destination.chain_id != token.chain_id)
				});
				if incompatible {
					form.destination.token = None;
				}
			}
			form.slot_mut(side).token = Some(token);
		});
	}

	pub fn switch_pair(&self) {
		self.form.send_modify(|form| {
			std::mem::swap(&mut form.source, &mut form.destination);
		});
	}

	/// Sets the amount on `side`. Subscribers are only notified when the
	/// amount changed.
	pub fn set_amount(&self, side: Side, amount: Amount) {
		self.form.send_if_modified(|form| {
			let slot = form.slot_mut(side);
			if slot.amount.as_ref() == Some(&amount) {
				return false;
			}
			slot.amount = Some(amount);
			true
		});
	}
}

impl Default for PairHolder {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy::primitives::Address;

	fn token(chain_id: u64, byte: u8, cross_chain_supported: bool) -> Token {
		Token {
			chain_id,
			address: Address::new([byte; 20]),
			decimals: 6,
			symbol: format!("T{}", byte),
			cross_chain_supported,
			is_internal_wrap_token: false,
		}
	}

	#[test]
	fn test_selecting_other_side_switches_pair() {
		let holder = PairHolder::new();
		let usdc = token(1, 0x5c, true);
		let dai = token(1, 0xda, true);
		holder.set_pair(Some(usdc.clone()), Some(dai.clone()));
		holder.set_amount(Side::Source, Amount::from(5u64));

		holder.set_token(Side::Source, Some(dai.clone()));

		let form = holder.snapshot();
		assert_eq!(form.source.token, Some(dai));
		assert_eq!(form.destination.token, Some(usdc));
		// Amounts travel with their tokens
		assert_eq!(form.destination.amount, Some(Amount::from(5u64)));
		assert_eq!(form.source.amount, None);
	}

	#[test]
	fn test_incompatible_source_clears_destination() {
		let holder = PairHolder::new();
		holder.set_pair(None, Some(token(1, 0xda, false)));

		// Same chain, neither cross-chain: kept
		holder.set_token(Side::Source, Some(token(1, 0x5c, false)));
		assert!(holder.snapshot().destination.token.is_some());

		// Different chain, neither cross-chain: cleared
		holder.set_token(Side::Source, Some(token(137, 0x5c, false)));
		assert!(holder.snapshot().destination.token.is_none());

		// Cross-chain support differs: cleared
		holder.set_token(Side::Destination, Some(token(1, 0xda, true)));
		holder.set_token(Side::Source, Some(token(1, 0x5c, false)));
		assert!(holder.snapshot().destination.token.is_none());
	}

	#[test]
	fn test_unchanged_amount_does_not_notify() {
		let holder = PairHolder::new();
		let mut changes = holder.subscribe();
		holder.set_amount(Side::Source, Amount::one());
		assert!(changes.has_changed().unwrap());
		changes.borrow_and_update();

		holder.set_amount(Side::Source, Amount::one());
		assert!(!changes.has_changed().unwrap());
	}

	#[test]
	fn test_quote_inputs_ignore_destination_amount() {
		let holder = PairHolder::new();
		holder.set_pair(Some(token(1, 0x5c, true)), Some(token(1, 0xda, true)));
		let before = holder.snapshot().quote_inputs();
		holder.set_amount(Side::Destination, Amount::from(7u64));
		assert_eq!(holder.snapshot().quote_inputs(), before);
		assert!(holder.snapshot().pair().is_some());
	}
}
