//! Scripted relays and data sources for tests.

use crate::relay::{
	AuctionOrderState, AuctionPreset, AuctionRelay, CrossChainOrderState, CrossChainRelay,
	QuoteRequest, RelayError, RelayOrderStatus, StoredQuote, VenueQuote,
};
use crate::registry::VenueComponents;
use crate::secrets::HashLock;
use crate::wrap::ChainWrapResolver;
use crate::{AmountDataSource, RateProvider, StrategyError, SwapSettings};
use alloy::primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use swap_chain::mock::{MockChainClient, MockWallet};
use swap_permit::{ApproveResolver, CompositeTransferResolver, Permit2Resolver, PermitSettings};
use swap_storage::implementations::memory::MemoryStorage;
use swap_storage::{StorageOrderRepository, StorageService};
use swap_types::{
	Amount, ChainDirectory, ChainId, EventBus, OrderHash, OrderTerms, Rate, Token, TxHash,
	PERMIT2_ADDRESS,
};

/// Unix time every scripted relay reports as the start of its auctions.
pub const AUCTION_START: i64 = 1_700_000_000;

fn quote_for(request: &QuoteRequest, secrets_count: usize) -> VenueQuote {
	// Two destination units per source unit, worst case 90% of market
	let destination_amount = request.amount * U256::from(2u8);
	VenueQuote {
		quote_id: Some("quote-1".to_string()),
		destination_amount,
		preset_name: "fast".to_string(),
		preset: AuctionPreset {
			auction_duration_secs: 180,
			auction_end_amount: destination_amount * U256::from(9u8) / U256::from(10u8),
			secrets_count,
		},
		auto_slippage: Some(Amount::from(1u64)),
		raw: serde_json::json!({ "quoteId": "quote-1", "amount": request.amount.to_string() }),
	}
}

/// Terms of the latest submitted order, zero before any submission.
fn order_terms(quote: Option<&StoredQuote>) -> OrderTerms {
	OrderTerms {
		making_amount: quote.map_or(U256::ZERO, |quote| quote.request.amount),
		taking_amount: quote.map_or(U256::ZERO, |quote| quote.quote.destination_amount),
		auction_duration_secs: quote.map_or(0, |quote| quote.quote.preset.auction_duration_secs),
		auction_start: chrono::DateTime::from_timestamp(AUCTION_START, 0).unwrap_or_default(),
	}
}

pub struct MockAuctionRelay {
	chains: HashSet<ChainId>,
	pub quote_id: Mutex<Option<String>>,
	pub statuses: Mutex<VecDeque<Result<AuctionOrderState, RelayError>>>,
	pub cancel_tx: Mutex<Option<TxHash>>,
	pub cancel_calldata: Mutex<Option<Bytes>>,
	pub quotes: Mutex<Vec<QuoteRequest>>,
	pub submitted: Mutex<Vec<StoredQuote>>,
	status_polls: AtomicUsize,
}

impl MockAuctionRelay {
	pub fn new(chains: &[ChainId]) -> Self {
		Self {
			chains: chains.iter().copied().collect(),
			quote_id: Mutex::new(Some("quote-1".to_string())),
			statuses: Mutex::new(VecDeque::new()),
			cancel_tx: Mutex::new(None),
			cancel_calldata: Mutex::new(Some(Bytes::from(vec![0xca, 0x9c]))),
			quotes: Mutex::new(Vec::new()),
			submitted: Mutex::new(Vec::new()),
			status_polls: AtomicUsize::new(0),
		}
	}

	pub fn script_statuses(&self, statuses: Vec<Result<AuctionOrderState, RelayError>>) {
		*self.statuses.lock().unwrap() = statuses.into();
	}

	pub fn status_polls(&self) -> usize {
		self.status_polls.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl AuctionRelay for MockAuctionRelay {
	fn supports_chain(&self, chain_id: ChainId) -> bool {
		self.chains.contains(&chain_id)
	}

	async fn quote(&self, request: &QuoteRequest) -> Result<VenueQuote, RelayError> {
		self.quotes.lock().unwrap().push(request.clone());
		let mut quote = quote_for(request, 1);
		quote.quote_id = self.quote_id.lock().unwrap().clone();
		Ok(quote)
	}

	async fn submit_order(&self, quote: &StoredQuote) -> Result<OrderHash, RelayError> {
		let mut submitted = self.submitted.lock().unwrap();
		submitted.push(quote.clone());
		Ok(B256::with_last_byte(0xa0 + submitted.len() as u8))
	}

	async fn order_status(
		&self,
		_chain_id: ChainId,
		_hash: OrderHash,
	) -> Result<RelayOrderStatus<AuctionOrderState>, RelayError> {
		self.status_polls.fetch_add(1, Ordering::SeqCst);
		let state = self
			.statuses
			.lock()
			.unwrap()
			.pop_front()
			.unwrap_or(Ok(AuctionOrderState::Pending))?;
		Ok(RelayOrderStatus {
			state,
			cancel_tx: *self.cancel_tx.lock().unwrap(),
			terms: order_terms(self.submitted.lock().unwrap().last()),
		})
	}

	async fn cancel_calldata(
		&self,
		_chain_id: ChainId,
		_hash: OrderHash,
	) -> Result<Option<Bytes>, RelayError> {
		Ok(self.cancel_calldata.lock().unwrap().clone())
	}
}

pub struct MockCrossChainRelay {
	chains: HashSet<ChainId>,
	pub secrets_count: Mutex<usize>,
	pub statuses: Mutex<VecDeque<Result<CrossChainOrderState, RelayError>>>,
	pub ready_fills: Mutex<VecDeque<Vec<usize>>>,
	pub cancel_calldata: Mutex<Option<Bytes>>,
	pub submitted: Mutex<Vec<(StoredQuote, HashLock, Vec<B256>)>>,
	secrets: Mutex<Vec<B256>>,
	fail_ready_fills: AtomicBool,
	status_polls: AtomicUsize,
}

impl Default for MockCrossChainRelay {
	fn default() -> Self {
		Self::with_chains(&[1, 10, 56, 100, 137, 8453, 42161, 43114])
	}
}

impl MockCrossChainRelay {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_chains(chains: &[ChainId]) -> Self {
		Self {
			chains: chains.iter().copied().collect(),
			secrets_count: Mutex::new(1),
			statuses: Mutex::new(VecDeque::new()),
			ready_fills: Mutex::new(VecDeque::new()),
			cancel_calldata: Mutex::new(Some(Bytes::from(vec![0xca, 0x9c]))),
			submitted: Mutex::new(Vec::new()),
			secrets: Mutex::new(Vec::new()),
			fail_ready_fills: AtomicBool::new(false),
			status_polls: AtomicUsize::new(0),
		}
	}

	pub fn script_statuses(&self, statuses: Vec<Result<CrossChainOrderState, RelayError>>) {
		*self.statuses.lock().unwrap() = statuses.into();
	}

	pub fn script_ready_fills(&self, fills: Vec<Vec<usize>>) {
		*self.ready_fills.lock().unwrap() = fills.into();
	}

	pub fn fail_ready_fills(&self, fail: bool) {
		self.fail_ready_fills.store(fail, Ordering::SeqCst);
	}

	pub fn status_polls(&self) -> usize {
		self.status_polls.load(Ordering::SeqCst)
	}

	pub fn submitted_secrets(&self) -> Vec<B256> {
		self.secrets.lock().unwrap().clone()
	}
}

#[async_trait]
impl CrossChainRelay for MockCrossChainRelay {
	fn supports_chain(&self, chain_id: ChainId) -> bool {
		self.chains.contains(&chain_id)
	}

	async fn quote(&self, request: &QuoteRequest) -> Result<VenueQuote, RelayError> {
		Ok(quote_for(request, *self.secrets_count.lock().unwrap()))
	}

	async fn submit_order(
		&self,
		quote: &StoredQuote,
		hash_lock: &HashLock,
		secret_hashes: &[B256],
	) -> Result<OrderHash, RelayError> {
		let mut submitted = self.submitted.lock().unwrap();
		submitted.push((quote.clone(), *hash_lock, secret_hashes.to_vec()));
		Ok(B256::with_last_byte(0xc0 + submitted.len() as u8))
	}

	async fn order_status(
		&self,
		_hash: OrderHash,
	) -> Result<RelayOrderStatus<CrossChainOrderState>, RelayError> {
		self.status_polls.fetch_add(1, Ordering::SeqCst);
		let state = self
			.statuses
			.lock()
			.unwrap()
			.pop_front()
			.unwrap_or(Ok(CrossChainOrderState::Pending))?;
		let submitted = self.submitted.lock().unwrap();
		Ok(RelayOrderStatus {
			state,
			cancel_tx: None,
			terms: order_terms(submitted.last().map(|(quote, _, _)| quote)),
		})
	}

	async fn ready_to_accept_secret_fills(
		&self,
		_hash: OrderHash,
	) -> Result<Vec<usize>, RelayError> {
		if self.fail_ready_fills.load(Ordering::SeqCst) {
			return Err(RelayError::Transport("connection reset".to_string()));
		}
		Ok(self.ready_fills.lock().unwrap().pop_front().unwrap_or_default())
	}

	async fn submit_secret(&self, _hash: OrderHash, secret: B256) -> Result<(), RelayError> {
		self.secrets.lock().unwrap().push(secret);
		Ok(())
	}

	async fn cancel_calldata(&self, _hash: OrderHash) -> Result<Option<Bytes>, RelayError> {
		Ok(self.cancel_calldata.lock().unwrap().clone())
	}
}

/// Fixed spendable balance regardless of wallet and token.
pub struct FixedAmountSource(pub Amount);

#[async_trait]
impl AmountDataSource for FixedAmountSource {
	async fn max_amount(&self, _wallet: Address, _token: &Token) -> Result<Amount, StrategyError> {
		Ok(self.0.clone())
	}
}

/// Returns the same rate for every pair, or none.
pub struct FixedRateProvider(pub Option<Rate>);

#[async_trait]
impl RateProvider for FixedRateProvider {
	async fn on_chain_rate(
		&self,
		_chain_id: ChainId,
		_source: &Token,
		_destination: &Token,
	) -> Result<Option<Rate>, StrategyError> {
		Ok(self.0.clone())
	}
}

/// An 18-decimal test token.
pub fn token(chain_id: ChainId, address: Address, is_internal_wrap_token: bool) -> Token {
	Token {
		chain_id,
		address,
		decimals: 18,
		symbol: format!("T{}", address.0[0]),
		cross_chain_supported: true,
		is_internal_wrap_token,
	}
}

/// Venue collaborators over the in-memory chain, a wallet connected to
/// `wallet_chain`, plain router approvals and a large fixed balance.
pub fn test_components(
	owner: Address,
	wallet_chain: ChainId,
) -> (VenueComponents, Arc<MockChainClient>, Arc<MockWallet>) {
	let chain = Arc::new(MockChainClient::new());
	let wallet = Arc::new(MockWallet::new(owner, wallet_chain).attached_to(chain.clone()));
	let contracts = Arc::new(ChainDirectory::with_defaults());
	let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
	let settings = PermitSettings {
		approval_settle_delay: Duration::ZERO,
		..PermitSettings::default()
	};
	let components = VenueComponents {
		chain: chain.clone(),
		wallet: wallet.clone(),
		contracts: contracts.clone(),
		orders: Arc::new(StorageOrderRepository::new(storage)),
		amounts: Arc::new(FixedAmountSource(Amount::from(1_000_000u64))),
		transfer: Arc::new(ApproveResolver::new(
			chain.clone(),
			wallet.clone(),
			contracts.clone(),
			settings,
		)),
		wrap: Arc::new(ChainWrapResolver::new(chain.clone(), wallet.clone(), contracts)),
		settings: SwapSettings::default(),
		events: Some(EventBus::default()),
	};
	(components, chain, wallet)
}

/// [`test_components`] with Permit2 deployed and transfers resolved the
/// standard way: Permit2 first, router approval as fallback. The Permit2
/// resolver is returned for access to its signature cache.
pub fn permit2_components(
	owner: Address,
	wallet_chain: ChainId,
) -> (VenueComponents, Arc<MockChainClient>, Arc<MockWallet>, Arc<Permit2Resolver>) {
	let (mut components, chain, wallet) = test_components(owner, wallet_chain);
	chain.set_code(PERMIT2_ADDRESS);
	let settings = PermitSettings {
		approval_settle_delay: Duration::ZERO,
		..PermitSettings::default()
	};
	let permit2 = Arc::new(Permit2Resolver::new(
		chain.clone(),
		wallet.clone(),
		components.contracts.clone(),
		Arc::new(StorageService::new(Box::new(MemoryStorage::new()))),
		settings.clone(),
	));
	let approve = Arc::new(ApproveResolver::new(
		chain.clone(),
		wallet.clone(),
		components.contracts.clone(),
		settings,
	));
	components.transfer = Arc::new(CompositeTransferResolver::standard(permit2.clone(), approve));
	(components, chain, wallet, permit2)
}
