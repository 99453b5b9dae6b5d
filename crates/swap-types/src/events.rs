use crate::order::{OrderHash, OrderStatus, RevealOutcome};
use crate::rate::VenueKind;
use crate::token::{ChainId, TokenId};
use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SwapEvent {
	OrderSubmitted {
		hash: OrderHash,
		strategy: VenueKind,
	},
	OrderFinished {
		hash: OrderHash,
		status: OrderStatus,
	},
	SecretRevealed {
		hash: OrderHash,
		index: usize,
	},
	RevealFinished {
		hash: OrderHash,
		outcome: RevealOutcome,
	},
	PermitSigned {
		chain_id: ChainId,
		wallet: Address,
		token: Address,
	},
	/// Carries the preparation state name.
	PreparationChanged {
		token: Option<TokenId>,
		state: String,
	},
}

/// Broadcast channel for engine events.
///
/// `publish` fails when nobody is subscribed; notifiers ignore that result.
pub struct EventBus {
	sender: broadcast::Sender<SwapEvent>,
}

impl EventBus {
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<SwapEvent> {
		self.sender.subscribe()
	}

	pub fn publish(&self, event: SwapEvent) -> Result<(), broadcast::error::SendError<SwapEvent>> {
		self.sender.send(event)?;
		Ok(())
	}
}

impl Clone for EventBus {
	fn clone(&self) -> Self {
		Self {
			sender: self.sender.clone(),
		}
	}
}

impl Default for EventBus {
	fn default() -> Self {
		Self::new(256)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy::primitives::B256;

	#[tokio::test]
	async fn test_subscribers_receive_published_events() {
		let bus = EventBus::new(8);
		let mut rx = bus.subscribe();
		bus.publish(SwapEvent::SecretRevealed {
			hash: B256::ZERO,
			index: 2,
		})
		.unwrap();

		match rx.recv().await.unwrap() {
			SwapEvent::SecretRevealed { index, .. } => assert_eq!(index, 2),
			other => panic!("unexpected event {:?}", other),
		}
	}

	#[test]
	fn test_publish_without_subscribers_fails() {
		let bus = EventBus::new(8);
		assert!(bus
			.publish(SwapEvent::OrderFinished {
				hash: B256::ZERO,
				status: OrderStatus::Executed,
			})
			.is_err());
	}
}
