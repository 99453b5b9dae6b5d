//! Escrow-based cross-chain intent auction.
//!
//! Orders are committed with a hash lock over one secret per allowed fill.
//! After submission a [`RevealLoop`] runs in the background and hands each
//! secret to the relay once its fill's escrows are ready. The loop's handle
//! stays with the strategy until the caller takes it.

use crate::auction;
use crate::registry::VenueComponents;
use crate::relay::{CrossChainOrderState, CrossChainRelay, StoredQuote};
use crate::reveal::{outcome_status, RevealHandle, RevealLoop};
use crate::secrets::{generate_secrets, HashLock};
use crate::{StrategyError, VenueStrategy};
use alloy::primitives::{Address, B256};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use swap_permit::ResolverActions;
use swap_types::{
	Amount, OrderHash, OrderStatus, OrderStatusView, Pair, SwapSnapshot, TxHash, VenueKind,
};

pub struct CrossChainAuctionStrategy {
	relay: Arc<dyn CrossChainRelay>,
	components: VenueComponents,
	reveals: DashMap<OrderHash, RevealHandle>,
}

impl CrossChainAuctionStrategy {
	pub fn new(relay: Arc<dyn CrossChainRelay>, components: VenueComponents) -> Self {
		Self {
			relay,
			components,
			reveals: DashMap::new(),
		}
	}

	/// Hands over the reveal loop of an order submitted through this
	/// strategy. Dropping the handle leaves the loop running.
	pub fn take_reveal_handle(&self, hash: OrderHash) -> Option<RevealHandle> {
		self.reveals.remove(&hash).map(|(_, handle)| handle)
	}

	fn reveal_loop(&self) -> RevealLoop {
		RevealLoop::new(
			self.relay.clone(),
			self.components.orders.clone(),
			self.components.settings.reveal_poll_interval,
		)
		.with_events(self.components.events.clone())
	}
}

fn map_status(state: &CrossChainOrderState) -> OrderStatus {
	match state {
		CrossChainOrderState::Pending | CrossChainOrderState::Refunding => OrderStatus::Pending,
		CrossChainOrderState::Executed => OrderStatus::Executed,
		CrossChainOrderState::Expired => OrderStatus::Expired,
		CrossChainOrderState::Cancelled => OrderStatus::Cancelled,
		CrossChainOrderState::Refunded | CrossChainOrderState::Other(_) => OrderStatus::Failed,
	}
}

fn venue_status(state: &CrossChainOrderState) -> String {
	match state {
		CrossChainOrderState::Other(name) => name.clone(),
		known => format!("{:?}", known),
	}
}

#[async_trait]
impl VenueStrategy for CrossChainAuctionStrategy {
	fn kind(&self) -> VenueKind {
		VenueKind::CrossChainAuction
	}

	fn support_swap(&self, pair: &Pair, wallet: Option<Address>) -> bool {
		wallet.is_some()
			&& pair.is_cross_chain()
			&& self.relay.supports_chain(pair.source.chain_id)
			&& self.relay.supports_chain(pair.destination.chain_id)
	}

	async fn get_data_snapshot(
		&self,
		pair: &Pair,
		amount: Amount,
		wallet: Option<Address>,
		finalize: bool,
	) -> Result<SwapSnapshot, StrategyError> {
		let supported = self.support_swap(pair, wallet);
		let wallet =
			auction::check_quote(&self.components, self.kind(), supported, pair, &amount, wallet)
				.await?;

		let source = auction::normalize_source(&self.components.contracts, &pair.source)?;
		let request = auction::quote_request(
			&self.components,
			wallet,
			&source,
			&pair.destination,
			&amount,
			finalize,
		)
		.await?;
		let quote = self.relay.quote(&request).await?;
		tracing::debug!(
			source_chain = source.chain_id,
			destination_chain = pair.destination.chain_id,
			preset = %quote.preset_name,
			secrets = quote.preset.secrets_count,
			"Cross-chain quote received"
		);

		auction::build_snapshot(
			&self.components,
			self.kind(),
			wallet,
			source,
			pair.destination.clone(),
			amount,
			StoredQuote { request, quote },
		)
	}

	async fn prepare_swap(
		&self,
		snapshot: &SwapSnapshot,
	) -> Result<ResolverActions, StrategyError> {
		let pair = Pair::new(snapshot.source_token.clone(), snapshot.destination_token.clone());
		let supported = self.support_swap(&pair, Some(snapshot.wallet));
		auction::check_prepare(&self.components, self.kind(), supported, snapshot).await?;
		auction::prepare_with_wrap(&self.components, snapshot).await
	}

	async fn swap(&self, snapshot: SwapSnapshot) -> Result<OrderHash, StrategyError> {
		auction::check_snapshot(self.kind(), &snapshot)?;
		if self.components.wallet.address().await.is_none() {
			return Err(StrategyError::WalletNotConnected);
		}
		let stored = auction::stored_quote(&snapshot)?;
		if stored.quote.quote_id.is_none() {
			return Err(StrategyError::MissingQuoteId);
		}

		let secrets = generate_secrets(stored.quote.preset.secrets_count);
		let hash_lock = HashLock::for_secrets(&secrets);
		let secret_hashes: Vec<B256> = secrets.iter().map(|secret| secret.hash).collect();
		let hash = self
			.relay
			.submit_order(&stored, &hash_lock, &secret_hashes)
			.await?;
		auction::record_order(&self.components, self.kind(), hash, &snapshot).await?;
		tracing::info!(
			order_hash = %hash,
			source_chain = snapshot.source_token.chain_id,
			destination_chain = snapshot.destination_token.chain_id,
			fills = secrets.len(),
			"Submitted cross-chain order"
		);

		self.reveals.retain(|_, handle| !handle.is_finished());
		self.reveals
			.insert(hash, self.reveal_loop().spawn(hash, secrets));
		Ok(hash)
	}

	async fn get_order_status(&self, hash: OrderHash) -> Result<OrderStatusView, StrategyError> {
		let record = auction::order_record(&self.components, hash).await?;
		let outcome = self.components.orders.get_outcome(&hash).await?;
		let (status, venue_status, cancel_tx, terms) = match self.relay.order_status(hash).await {
			Ok(status) => (
				map_status(&status.state),
				venue_status(&status.state),
				status.cancel_tx,
				Some(status.terms),
			),
			// The reveal loop already saw the order end
			Err(e) => match outcome {
				Some(outcome) => {
					tracing::debug!(order_hash = %hash, error = %e, "Reporting persisted outcome");
					(outcome_status(outcome), format!("{:?}", outcome), None, None)
				}
				None => return Err(e.into()),
			},
		};
		Ok(OrderStatusView {
			hash,
			status,
			venue_status,
			source_chain: record.source_chain,
			source_token: record.source_token,
			destination_chain: record.destination_chain,
			destination_token: record.destination_token,
			terms,
			cancel_tx,
			reveal_outcome: outcome,
		})
	}

	async fn cancel_order(&self, hash: OrderHash) -> Option<TxHash> {
		let result = async {
			let record = auction::cancellable_record(&self.components, self.kind(), hash).await?;
			let status = self.relay.order_status(hash).await?;
			if status.state == CrossChainOrderState::Cancelled || status.cancel_tx.is_some() {
				return Err(StrategyError::Unsupported("Order already cancelled".to_string()));
			}
			let calldata = self
				.relay
				.cancel_calldata(hash)
				.await?
				.ok_or_else(|| {
					StrategyError::Unsupported("Order cannot be cancelled".to_string())
				})?;
			auction::send_cancel(&self.components, &record, calldata).await
		}
		.await;

		if result.is_ok() {
			if let Some(handle) = self.take_reveal_handle(hash) {
				handle.cancel();
			}
		}
		auction::cancel_outcome(hash, result)
	}
}
