//! Background secret reveal loop of cross-chain orders.
//!
//! The loop polls the relay for fills that are ready to accept a secret and
//! for the order status, reveals only the requested secrets, and stops on
//! a terminal status. Read errors are logged and retried on the next tick.
//! Terminal outcomes are persisted so later status queries can report them.

use crate::relay::{CrossChainOrderState, CrossChainRelay};
use crate::secrets::Secret;
use crate::StrategyError;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use swap_storage::OrderRepository;
use swap_types::{EventBus, OrderHash, OrderStatus, RevealOutcome, SwapEvent};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Handle of a spawned reveal loop.
///
/// Dropping the handle leaves the loop running.
pub struct RevealHandle {
	hash: OrderHash,
	cancel: watch::Sender<bool>,
	task: JoinHandle<Result<RevealOutcome, StrategyError>>,
}

impl RevealHandle {
	pub fn order_hash(&self) -> OrderHash {
		self.hash
	}

	/// Asks the loop to stop at its next suspension point.
	pub fn cancel(&self) {
		let _ = self.cancel.send(true);
	}

	pub fn is_finished(&self) -> bool {
		self.task.is_finished()
	}

	/// Waits for the loop to end.
	pub async fn join(self) -> Result<RevealOutcome, StrategyError> {
		match self.task.await {
			Ok(result) => result,
			Err(e) if e.is_cancelled() => Err(StrategyError::RevealCancelled(self.hash)),
			Err(e) => Err(StrategyError::Relay(crate::RelayError::Transport(e.to_string()))),
		}
	}
}

#[derive(Clone)]
pub struct RevealLoop {
	relay: Arc<dyn CrossChainRelay>,
	orders: Arc<dyn OrderRepository>,
	events: Option<EventBus>,
	poll_interval: Duration,
}

impl RevealLoop {
	pub fn new(
		relay: Arc<dyn CrossChainRelay>,
		orders: Arc<dyn OrderRepository>,
		poll_interval: Duration,
	) -> Self {
		Self {
			relay,
			orders,
			events: None,
			poll_interval,
		}
	}

	pub fn with_events(mut self, events: Option<EventBus>) -> Self {
		self.events = events;
		self
	}

	/// Spawns the loop on the current runtime.
	pub fn spawn(self, hash: OrderHash, secrets: Vec<Secret>) -> RevealHandle {
		let (cancel, cancelled) = watch::channel(false);
		let task = tokio::spawn(async move {
			let result = self.run(hash, secrets, cancelled).await;
			if let Err(e) = &result {
				tracing::warn!(order_hash = %hash, error = %e, "Secret reveal loop ended");
			}
			result
		});
		RevealHandle { hash, cancel, task }
	}

	pub async fn run(
		&self,
		hash: OrderHash,
		secrets: Vec<Secret>,
		mut cancelled: watch::Receiver<bool>,
	) -> Result<RevealOutcome, StrategyError> {
		let mut revealed = HashSet::new();

		loop {
			if *cancelled.borrow() {
				return Err(StrategyError::RevealCancelled(hash));
			}

			let ready = match self.relay.ready_to_accept_secret_fills(hash).await {
				Ok(ready) => ready,
				Err(e) => {
					tracing::warn!(order_hash = %hash, error = %e, "Ready fills poll failed");
					Vec::new()
				}
			};
			let state = match self.relay.order_status(hash).await {
				Ok(status) => Some(status.state),
				Err(e) => {
					tracing::warn!(order_hash = %hash, error = %e, "Order status poll failed");
					None
				}
			};

			if let Some(outcome) = state.as_ref().and_then(terminal_outcome) {
				self.finish(hash, outcome).await;
				return match outcome {
					RevealOutcome::Executed => Ok(outcome),
					_ => Err(StrategyError::OrderTerminated { hash, outcome }),
				};
			}

			for index in ready {
				if revealed.contains(&index) {
					continue;
				}
				let Some(secret) = secrets.get(index) else {
					tracing::warn!(order_hash = %hash, index, "Relay asked for an unknown fill");
					continue;
				};
				match self.relay.submit_secret(hash, secret.secret).await {
					Ok(()) => {
						tracing::info!(order_hash = %hash, index, "Revealed secret");
						revealed.insert(index);
						self.publish(SwapEvent::SecretRevealed { hash, index });
					}
					Err(e) => {
						tracing::warn!(
							order_hash = %hash,
							index,
							error = %e,
							"Secret submission failed"
						);
					}
				}
			}

			if self.pause(&mut cancelled).await {
				return Err(StrategyError::RevealCancelled(hash));
			}
		}
	}

	/// Sleeps one poll interval. Returns true if cancellation was requested.
	async fn pause(&self, cancelled: &mut watch::Receiver<bool>) -> bool {
		tokio::select! {
			_ = tokio::time::sleep(self.poll_interval) => false,
			changed = cancelled.changed() => match changed {
				Ok(()) => *cancelled.borrow(),
				// Handle dropped: nobody can cancel any more
				Err(_) => {
					tokio::time::sleep(self.poll_interval).await;
					false
				}
			},
		}
	}

	async fn finish(&self, hash: OrderHash, outcome: RevealOutcome) {
		if let Err(e) = self.orders.save_outcome(&hash, outcome).await {
			tracing::warn!(order_hash = %hash, error = %e, "Failed to persist reveal outcome");
		}
		self.publish(SwapEvent::RevealFinished { hash, outcome });
		self.publish(SwapEvent::OrderFinished {
			hash,
			status: outcome_status(outcome),
		});
	}

	fn publish(&self, event: SwapEvent) {
		if let Some(events) = &self.events {
			let _ = events.publish(event);
		}
	}
}

/// Order status of a finished reveal loop. Refunded orders did not swap.
pub(crate) fn outcome_status(outcome: RevealOutcome) -> OrderStatus {
	match outcome {
		RevealOutcome::Executed => OrderStatus::Executed,
		RevealOutcome::Expired => OrderStatus::Expired,
		RevealOutcome::Cancelled => OrderStatus::Cancelled,
		RevealOutcome::Refunded => OrderStatus::Failed,
	}
}

fn terminal_outcome(state: &CrossChainOrderState) -> Option<RevealOutcome> {
	match state {
		CrossChainOrderState::Executed => Some(RevealOutcome::Executed),
		CrossChainOrderState::Expired => Some(RevealOutcome::Expired),
		CrossChainOrderState::Refunded => Some(RevealOutcome::Refunded),
		CrossChainOrderState::Cancelled => Some(RevealOutcome::Cancelled),
		_ => None,
	}
}
