//! Swap context.
//!
//! Quotes walk the registry in priority order and stop at the first venue
//! that returns a snapshot. Everything after quoting is dispatched by name:
//! the snapshot names the venue that produced it and the order record names
//! the venue that submitted it.

use crate::pair::{PairHolder, Side};
use crate::preparation::PreparationInputs;
use alloy::primitives::Address;
use std::sync::Arc;
use swap_permit::ResolverActions;
use swap_strategy::{
	normalize_source, StrategyError, StrategyRegistry, VenueComponents, VenueStrategy,
};
use swap_types::{Amount, OrderHash, OrderStatusView, Pair, SwapSnapshot, TxHash, VenueKind};
use tokio::sync::watch;

pub struct SwapContext {
	registry: StrategyRegistry,
	components: VenueComponents,
	pair: PairHolder,
	loading: watch::Sender<bool>,
	latest: watch::Sender<Option<SwapSnapshot>>,
}

impl SwapContext {
	pub fn new(registry: StrategyRegistry, components: VenueComponents) -> Self {
		let (loading, _) = watch::channel(false);
		let (latest, _) = watch::channel(None);
		Self {
			registry,
			components,
			pair: PairHolder::new(),
			loading,
			latest,
		}
	}

	pub fn pair(&self) -> &PairHolder {
		&self.pair
	}

	pub fn registry(&self) -> &StrategyRegistry {
		&self.registry
	}

	pub fn components(&self) -> &VenueComponents {
		&self.components
	}

	/// Whether a quote for the form is in flight.
	pub fn is_loading(&self) -> bool {
		*self.loading.borrow()
	}

	pub fn latest_snapshot(&self) -> Option<SwapSnapshot> {
		self.latest.borrow().clone()
	}

	pub fn subscribe_snapshots(&self) -> watch::Receiver<Option<SwapSnapshot>> {
		self.latest.subscribe()
	}

	/// Quotes `pair` through the first supporting venue that succeeds.
	///
	/// When every supporting venue fails, the last venue's error is returned.
	pub async fn quote(
		&self,
		pair: &Pair,
		amount: Amount,
		wallet: Option<Address>,
		finalize: bool,
	) -> Result<SwapSnapshot, StrategyError> {
		let venues: Vec<_> = self.registry.supporting(pair, wallet).collect();
		let mut last_error = None;
		for venue in venues {
			match venue.get_data_snapshot(pair, amount.clone(), wallet, finalize).await {
				Ok(snapshot) => return Ok(snapshot),
				Err(e) => {
					tracing::debug!(
						venue = %venue.kind(),
						source = %pair.source.id(),
						destination = %pair.destination.id(),
						error = %e,
						"Venue declined quote"
					);
					last_error = Some(e);
				}
			}
		}
		Err(last_error.unwrap_or_else(|| {
			StrategyError::Unsupported(format!(
				"No venue supports {} -> {}",
				pair.source.id(),
				pair.destination.id()
			))
		}))
	}

	/// Quotes the current form.
	///
	/// Returns `None` while a token or the source amount is missing. A native
	/// source is quoted as its wrapped token. On success the destination
	/// amount of the form follows the quote.
	pub async fn snapshot(&self, finalize: bool) -> Result<Option<SwapSnapshot>, StrategyError> {
		let form = self.pair.snapshot();
		let (Some(source), Some(destination), Some(amount)) =
			(form.source.token, form.destination.token, form.source.amount)
		else {
			return Ok(None);
		};
		if amount.is_zero() {
			return Ok(None);
		}

		let source = normalize_source(&self.components.contracts, &source)?;
		let wallet = self.components.wallet.address().await;
		self.loading.send_replace(true);
		let result = self
			.quote(&Pair::new(source, destination), amount, wallet, finalize)
			.await;
		self.loading.send_replace(false);

		match result {
			Ok(snapshot) => {
				self.pair.set_amount(Side::Destination, snapshot.destination_amount.clone());
				self.latest.send_replace(Some(snapshot.clone()));
				Ok(Some(snapshot))
			}
			Err(e) => {
				self.latest.send_replace(None);
				Err(e)
			}
		}
	}

	fn venue(&self, kind: VenueKind) -> Result<Arc<dyn VenueStrategy>, StrategyError> {
		self.registry
			.get(kind)
			.ok_or_else(|| StrategyError::Unsupported(format!("Venue {} is not registered", kind)))
	}

	async fn venue_for_order(
		&self,
		hash: OrderHash,
	) -> Result<Arc<dyn VenueStrategy>, StrategyError> {
		let record = self
			.components
			.orders
			.get_order(&hash)
			.await?
			.ok_or(StrategyError::OrderNotFound(hash))?;
		self.venue(record.strategy)
	}

	pub async fn prepare_swap(
		&self,
		snapshot: &SwapSnapshot,
	) -> Result<ResolverActions, StrategyError> {
		self.venue(snapshot.strategy)?.prepare_swap(snapshot).await
	}

	pub async fn swap(&self, snapshot: SwapSnapshot) -> Result<OrderHash, StrategyError> {
		let venue = self.venue(snapshot.strategy)?;
		venue.swap(snapshot).await
	}

	pub async fn get_order_status(
		&self,
		hash: OrderHash,
	) -> Result<OrderStatusView, StrategyError> {
		self.venue_for_order(hash).await?.get_order_status(hash).await
	}

	/// Fails only when the order is unknown. Everything else the venue runs
	/// into while cancelling comes back as `Ok(None)`.
	pub async fn cancel_order(&self, hash: OrderHash) -> Result<Option<TxHash>, StrategyError> {
		Ok(self.venue_for_order(hash).await?.cancel_order(hash).await)
	}

	/// Spendable balance of the selected source token.
	pub async fn max_amount(&self) -> Result<Amount, StrategyError> {
		let wallet = self
			.components
			.wallet
			.address()
			.await
			.ok_or(StrategyError::WalletNotConnected)?;
		let source = self
			.pair
			.snapshot()
			.source
			.token
			.ok_or_else(|| StrategyError::InvalidInput("No source token selected".to_string()))?;
		self.components.amounts.max_amount(wallet, &source).await
	}

	pub async fn set_max_amount(&self) -> Result<Amount, StrategyError> {
		let amount = self.max_amount().await?;
		self.pair.set_amount(Side::Source, amount.clone());
		Ok(amount)
	}

	/// Inputs of the preparation state machine as of now.
	pub async fn preparation_inputs(&self) -> PreparationInputs {
		let form = self.pair.snapshot();
		let wallet = self.components.wallet.address().await;
		let wallet_chain = self.components.wallet.chain_id().await;

		let exceeds_balance = match (wallet, &form.source.token, &form.source.amount) {
			(Some(wallet), Some(token), Some(amount)) if !amount.is_zero() => {
				match self.components.amounts.max_amount(wallet, token).await {
					Ok(balance) => balance.is_zero() || &balance < amount,
					Err(e) => {
						tracing::warn!(token = %token.id(), error = %e, "Balance read failed");
						false
					}
				}
			}
			_ => false,
		};

		PreparationInputs {
			wallet,
			wallet_chain,
			source: form.source.token,
			destination: form.destination.token,
			amount: form.source.amount,
			exceeds_balance,
			rate: self.latest_snapshot().map(|snapshot| snapshot.rate),
			loading: self.is_loading(),
		}
	}
}
