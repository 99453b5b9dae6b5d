//! Single-chain intent auction.

use crate::auction;
use crate::registry::VenueComponents;
use crate::relay::{AuctionOrderState, AuctionRelay, StoredQuote};
use crate::{StrategyError, VenueStrategy};
use alloy::primitives::Address;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use swap_permit::ResolverActions;
use swap_types::{
	Amount, ChainId, OrderHash, OrderStatus, OrderStatusView, Pair, SwapEvent, SwapSnapshot,
	TxHash, VenueKind,
};
use tokio::task::JoinHandle;

pub struct SingleChainAuctionStrategy {
	relay: Arc<dyn AuctionRelay>,
	components: VenueComponents,
	watchers: DashMap<OrderHash, JoinHandle<()>>,
}

impl SingleChainAuctionStrategy {
	pub fn new(relay: Arc<dyn AuctionRelay>, components: VenueComponents) -> Self {
		Self {
			relay,
			components,
			watchers: DashMap::new(),
		}
	}

	/// Whether the status watcher of `hash` is still polling.
	pub fn is_watching(&self, hash: OrderHash) -> bool {
		self.watchers
			.get(&hash)
			.is_some_and(|task| !task.is_finished())
	}

	/// Polls the relay once per interval until the order settles, then
	/// announces the final status. Read errors are retried. The watcher is
	/// stopped when the order is cancelled or the strategy dropped.
	fn watch_order(&self, chain_id: ChainId, hash: OrderHash) {
		let relay = self.relay.clone();
		let events = self.components.events.clone();
		let interval = self.components.settings.status_poll_interval;
		self.watchers.retain(|_, task| !task.is_finished());
		let task = tokio::spawn(async move {
			let status = loop {
				tokio::time::sleep(interval).await;
				match relay.order_status(chain_id, hash).await {
					Ok(status) if map_status(&status.state).is_terminal() => {
						break map_status(&status.state);
					}
					Ok(_) => {}
					Err(e) => {
						tracing::warn!(order_hash = %hash, error = %e, "Order status poll failed");
					}
				}
			};
			tracing::info!(order_hash = %hash, ?status, "Auction order settled");
			if let Some(events) = &events {
				let _ = events.publish(SwapEvent::OrderFinished { hash, status });
			}
		});
		self.watchers.insert(hash, task);
	}

	fn stop_watching(&self, hash: OrderHash) {
		if let Some((_, task)) = self.watchers.remove(&hash) {
			task.abort();
		}
	}
}

impl Drop for SingleChainAuctionStrategy {
	fn drop(&mut self) {
		for task in self.watchers.iter() {
			task.abort();
		}
	}
}

fn map_status(state: &AuctionOrderState) -> OrderStatus {
	match state {
		AuctionOrderState::Pending | AuctionOrderState::PartiallyFilled => OrderStatus::Pending,
		AuctionOrderState::Filled => OrderStatus::Executed,
		AuctionOrderState::Expired => OrderStatus::Expired,
		AuctionOrderState::Cancelled => OrderStatus::Cancelled,
		AuctionOrderState::Other(_) => OrderStatus::Failed,
	}
}

fn venue_status(state: &AuctionOrderState) -> String {
	match state {
		AuctionOrderState::Other(name) => name.clone(),
		known => format!("{:?}", known),
	}
}

#[async_trait]
impl VenueStrategy for SingleChainAuctionStrategy {
	fn kind(&self) -> VenueKind {
		VenueKind::SingleChainAuction
	}

	fn support_swap(&self, pair: &Pair, wallet: Option<Address>) -> bool {
		wallet.is_some() && pair.is_same_chain() && self.relay.supports_chain(pair.source.chain_id)
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
			chain_id = source.chain_id,
			preset = %quote.preset_name,
			has_permit = request.permit.is_some(),
			"Auction quote received"
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

		let hash = self.relay.submit_order(&stored).await?;
		let record = auction::record_order(&self.components, self.kind(), hash, &snapshot).await?;
		tracing::info!(
			order_hash = %hash,
			chain_id = record.source_chain,
			"Submitted auction order"
		);
		self.watch_order(record.source_chain, hash);
		Ok(hash)
	}

	async fn get_order_status(&self, hash: OrderHash) -> Result<OrderStatusView, StrategyError> {
		let record = auction::order_record(&self.components, hash).await?;
		let status = self.relay.order_status(record.source_chain, hash).await?;
		Ok(OrderStatusView {
			hash,
			status: map_status(&status.state),
			venue_status: venue_status(&status.state),
			source_chain: record.source_chain,
			source_token: record.source_token,
			destination_chain: record.destination_chain,
			destination_token: record.destination_token,
			terms: Some(status.terms),
			cancel_tx: status.cancel_tx,
			reveal_outcome: None,
		})
	}

	async fn cancel_order(&self, hash: OrderHash) -> Option<TxHash> {
		let result = async {
			let record = auction::cancellable_record(&self.components, self.kind(), hash).await?;
			let status = self.relay.order_status(record.source_chain, hash).await?;
			if status.state == AuctionOrderState::Cancelled || status.cancel_tx.is_some() {
				return Err(StrategyError::Unsupported("Order already cancelled".to_string()));
			}
			let calldata = self
				.relay
				.cancel_calldata(record.source_chain, hash)
				.await?
				.ok_or_else(|| {
					StrategyError::Unsupported("Order cannot be cancelled".to_string())
				})?;
			auction::send_cancel(&self.components, &record, calldata).await
		}
		.await;

		if result.is_ok() {
			self.stop_watching(hash);
		}
		auction::cancel_outcome(hash, result)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::mock::{
		permit2_components, test_components, token, MockAuctionRelay, AUCTION_START,
	};
	use crate::relay::RelayError;
	use alloy::primitives::{Bytes, B256, U256};
	use std::time::Duration;
	use swap_chain::mock::{MockChainClient, MockWallet};
	use swap_permit::{encode_permit_call, CachedPermit, SignedPermit, MAX_UINT160};
	use swap_types::{current_timestamp, NATIVE_TOKEN_ADDRESS, PERMIT2_ADDRESS};

	const OWNER: Address = Address::new([0x3d; 20]);
	const SOURCE: Address = Address::new([0x01; 20]);
	const DESTINATION: Address = Address::new([0x02; 20]);

	struct Fixture {
		relay: Arc<MockAuctionRelay>,
		chain: Arc<MockChainClient>,
		wallet: Arc<MockWallet>,
		strategy: SingleChainAuctionStrategy,
		components: VenueComponents,
	}

	fn fixture() -> Fixture {
		let (components, chain, wallet) = test_components(OWNER, 1);
		let relay = Arc::new(MockAuctionRelay::new(&[1, 137]));
		Fixture {
			strategy: SingleChainAuctionStrategy::new(relay.clone(), components.clone()),
			relay,
			chain,
			wallet,
			components,
		}
	}

	fn pair() -> Pair {
		Pair::new(token(1, SOURCE, false), token(1, DESTINATION, false))
	}

	async fn submitted(f: &Fixture) -> OrderHash {
		let snapshot = f
			.strategy
			.get_data_snapshot(&pair(), Amount::from(2u64), Some(OWNER), true)
			.await
			.unwrap();
		f.strategy.swap(snapshot).await.unwrap()
	}

	#[test]
	fn test_support_requires_wallet_and_one_chain() {
		let f = fixture();
		assert!(f.strategy.support_swap(&pair(), Some(OWNER)));
		assert!(!f.strategy.support_swap(&pair(), None));
		let cross = Pair::new(token(1, SOURCE, false), token(137, DESTINATION, false));
		assert!(!f.strategy.support_swap(&cross, Some(OWNER)));
		let unsupported = Pair::new(token(56, SOURCE, false), token(56, DESTINATION, false));
		assert!(!f.strategy.support_swap(&unsupported, Some(OWNER)));
	}

	#[tokio::test]
	async fn test_quote_sends_base_units_and_finalize_flag() {
		let f = fixture();
		let snapshot = f
			.strategy
			.get_data_snapshot(&pair(), Amount::from(2u64), Some(OWNER), true)
			.await
			.unwrap();

		let request = f.relay.quotes.lock().unwrap()[0].clone();
		assert_eq!(request.amount, U256::from(2u64) * U256::from(10u64).pow(U256::from(18u8)));
		assert!(request.enable_estimate);
		assert!(request.permit.is_none());
		assert_eq!(snapshot.destination_amount, Amount::from(4u64));
		assert_eq!(snapshot.options.min_receive, Some("3.6".parse::<Amount>().unwrap()));
	}

	#[tokio::test]
	async fn test_native_source_quotes_wrapped_token() {
		let f = fixture();
		let native = Pair::new(token(1, NATIVE_TOKEN_ADDRESS, false), token(1, DESTINATION, false));
		let snapshot = f
			.strategy
			.get_data_snapshot(&native, Amount::one(), Some(OWNER), false)
			.await
			.unwrap();

		let weth = f.components.contracts.wrapped_native(1).unwrap();
		assert_eq!(f.relay.quotes.lock().unwrap()[0].source_token, weth);
		assert!(snapshot.source_token.is_internal_wrap_token);
		assert_eq!(snapshot.source_token.address, weth);
	}

	#[tokio::test]
	async fn test_swap_records_order() {
		let f = fixture();
		let mut events = f.components.events.as_ref().unwrap().subscribe();
		let hash = submitted(&f).await;

		let record = f.components.orders.get_order(&hash).await.unwrap().unwrap();
		assert_eq!(record.strategy, VenueKind::SingleChainAuction);
		assert_eq!(record.account, OWNER);
		assert_eq!(f.relay.submitted.lock().unwrap().len(), 1);
		assert!(matches!(
			events.recv().await.unwrap(),
			SwapEvent::OrderSubmitted { hash: h, .. } if h == hash
		));
	}

	#[tokio::test]
	async fn test_swap_requires_quote_id() {
		let f = fixture();
		*f.relay.quote_id.lock().unwrap() = None;
		let snapshot = f
			.strategy
			.get_data_snapshot(&pair(), Amount::one(), Some(OWNER), false)
			.await
			.unwrap();
		assert!(matches!(
			f.strategy.swap(snapshot).await,
			Err(StrategyError::MissingQuoteId)
		));
		assert!(f.relay.submitted.lock().unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_status_mapping() {
		let f = fixture();
		let hash = submitted(&f).await;
		let cases = [
			(AuctionOrderState::PartiallyFilled, OrderStatus::Pending),
			(AuctionOrderState::Filled, OrderStatus::Executed),
			(AuctionOrderState::Expired, OrderStatus::Expired),
			(AuctionOrderState::Cancelled, OrderStatus::Cancelled),
			(AuctionOrderState::Other("false-predicate".into()), OrderStatus::Failed),
		];
		for (state, expected) in cases {
			assert_eq!(map_status(&state), expected);
		}

		f.relay.script_statuses(vec![Ok(AuctionOrderState::Other("false-predicate".into()))]);
		let view = f.strategy.get_order_status(hash).await.unwrap();
		assert_eq!(view.status, OrderStatus::Failed);
		assert_eq!(view.venue_status, "false-predicate");
	}

	#[tokio::test]
	async fn test_status_reports_tokens_and_terms() {
		let f = fixture();
		let hash = submitted(&f).await;

		let view = f.strategy.get_order_status(hash).await.unwrap();

		assert_eq!(view.source_token, SOURCE);
		assert_eq!(view.destination_token, DESTINATION);
		let terms = view.terms.unwrap();
		let making = U256::from(2u64) * U256::from(10u64).pow(U256::from(18u8));
		assert_eq!(terms.making_amount, making);
		assert_eq!(terms.taking_amount, making * U256::from(2u8));
		assert_eq!(terms.auction_duration_secs, 180);
		assert_eq!(terms.auction_start.timestamp(), AUCTION_START);
	}

	#[tokio::test]
	async fn test_unknown_order_status() {
		let f = fixture();
		assert!(matches!(
			f.strategy.get_order_status(B256::repeat_byte(9)).await,
			Err(StrategyError::OrderNotFound(_))
		));
	}

	#[tokio::test]
	async fn test_cancel_sends_router_call_and_forgets_order() {
		let f = fixture();
		let hash = submitted(&f).await;

		let cancel_tx = f.strategy.cancel_order(hash).await;

		assert!(cancel_tx.is_some());
		let sent = f.wallet.sent();
		assert_eq!(sent.len(), 1);
		assert_eq!(sent[0].to, f.components.contracts.get(1).unwrap().router);
		assert!(f.components.orders.get_order(&hash).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn test_cancel_on_wrong_chain_sends_nothing() {
		let f = fixture();
		let hash = submitted(&f).await;
		f.wallet.set_chain_id(137);

		assert!(f.strategy.cancel_order(hash).await.is_none());
		assert!(f.wallet.sent().is_empty());
		assert!(f.components.orders.get_order(&hash).await.unwrap().is_some());
	}

	#[tokio::test]
	async fn test_cancel_refusals() {
		let f = fixture();
		let hash = submitted(&f).await;

		*f.relay.cancel_tx.lock().unwrap() = Some(B256::repeat_byte(0xcc));
		assert!(f.strategy.cancel_order(hash).await.is_none());
		*f.relay.cancel_tx.lock().unwrap() = None;

		*f.relay.cancel_calldata.lock().unwrap() = None;
		assert!(f.strategy.cancel_order(hash).await.is_none());
		*f.relay.cancel_calldata.lock().unwrap() = Some(vec![0x01].into());

		f.relay.script_statuses(vec![Err(RelayError::Transport("down".into()))]);
		assert!(f.strategy.cancel_order(hash).await.is_none());

		assert!(f.strategy.cancel_order(B256::repeat_byte(7)).await.is_none());
		assert!(f.wallet.sent().is_empty());
	}

	#[tokio::test]
	async fn test_cancel_by_other_account_is_refused() {
		let f = fixture();
		let hash = submitted(&f).await;
		let mut record = f.components.orders.get_order(&hash).await.unwrap().unwrap();
		record.account = Address::new([0x99; 20]);
		f.components.orders.save_order(&record).await.unwrap();

		assert!(f.strategy.cancel_order(hash).await.is_none());
		assert!(f.wallet.sent().is_empty());
	}

	#[tokio::test]
	async fn test_prepare_checks_wallet_and_allowance() {
		let f = fixture();
		let snapshot = f
			.strategy
			.get_data_snapshot(&pair(), Amount::one(), Some(OWNER), false)
			.await
			.unwrap();
		let steps = f.strategy.prepare_swap(&snapshot).await.unwrap();
		assert_eq!(swap_permit::joined_aliases(&steps), "Approve");

		let router = f.components.contracts.get(1).unwrap().router;
		f.chain.set_allowance(SOURCE, OWNER, router, U256::MAX);
		assert!(f.strategy.prepare_swap(&snapshot).await.unwrap().is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn test_watcher_announces_final_status() {
		let f = fixture();
		let mut events = f.components.events.as_ref().unwrap().subscribe();
		f.relay.script_statuses(vec![
			Ok(AuctionOrderState::Pending),
			Err(RelayError::Transport("timeout".into())),
			Ok(AuctionOrderState::Filled),
		]);
		let hash = submitted(&f).await;

		// Submission event first
		events.recv().await.unwrap();
		tokio::time::sleep(Duration::from_secs(5)).await;
		match events.recv().await.unwrap() {
			SwapEvent::OrderFinished { hash: h, status } => {
				assert_eq!(h, hash);
				assert_eq!(status, OrderStatus::Executed);
			}
			other => panic!("unexpected event {:?}", other),
		}
		assert_eq!(f.relay.status_polls(), 3);
		assert!(!f.strategy.is_watching(hash));
	}

	#[tokio::test(start_paused = true)]
	async fn test_cancel_stops_watcher() {
		let f = fixture();
		let hash = submitted(&f).await;
		assert!(f.strategy.is_watching(hash));

		assert!(f.strategy.cancel_order(hash).await.is_some());

		assert!(!f.strategy.is_watching(hash));
		let polls = f.relay.status_polls();
		tokio::time::sleep(Duration::from_secs(10)).await;
		assert_eq!(f.relay.status_polls(), polls);
	}

	#[tokio::test]
	async fn test_quote_attaches_cached_permit() {
		let (components, chain, _, permit2) = permit2_components(OWNER, 1);
		let relay = Arc::new(MockAuctionRelay::new(&[1]));
		let strategy = SingleChainAuctionStrategy::new(relay.clone(), components.clone());
		chain.set_allowance(SOURCE, OWNER, PERMIT2_ADDRESS, MAX_UINT160);

		// Nothing signed yet
		strategy
			.get_data_snapshot(&pair(), Amount::one(), Some(OWNER), false)
			.await
			.unwrap();
		assert!(relay.quotes.lock().unwrap()[0].permit.is_none());

		let now = current_timestamp();
		let permit = SignedPermit {
			chain_id: 1,
			owner: OWNER,
			token: SOURCE,
			spender: components.contracts.get(1).unwrap().router,
			amount: MAX_UINT160,
			expiration: now + 30 * 24 * 60 * 60,
			nonce: 0,
			sig_deadline: now + 60 * 60,
			signature: Bytes::from(vec![0x1b; 65]),
		};
		permit2
			.permit_cache()
			.put(&CachedPermit {
				permit: permit.clone(),
				amount: MAX_UINT160,
				expiration: permit.sig_deadline,
			})
			.await
			.unwrap();

		strategy
			.get_data_snapshot(&pair(), Amount::one(), Some(OWNER), false)
			.await
			.unwrap();
		assert_eq!(
			relay.quotes.lock().unwrap()[1].permit,
			Some(encode_permit_call(&permit).unwrap())
		);
	}

	#[tokio::test]
	async fn test_native_source_plans_wrap_then_permit2() {
		let (components, _, _, _) = permit2_components(OWNER, 1);
		let strategy =
			SingleChainAuctionStrategy::new(Arc::new(MockAuctionRelay::new(&[1])), components);
		let native = Pair::new(token(1, NATIVE_TOKEN_ADDRESS, false), token(1, DESTINATION, false));
		let snapshot = strategy
			.get_data_snapshot(&native, Amount::one(), Some(OWNER), false)
			.await
			.unwrap();

		let steps = strategy.prepare_swap(&snapshot).await.unwrap();

		assert_eq!(swap_permit::joined_aliases(&steps), "Wrap&Approve&SignPermit");
	}
}
