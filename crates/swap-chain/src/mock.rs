//! Scripted in-memory chain and wallet for tests.
//!
//! [`MockWallet`] applies `approve` and `deposit` calls it sends to the
//! [`MockChainClient`] it is attached to, so approval flows can be exercised
//! end to end.

use crate::contracts::{IWrappedNative, IERC20};
use crate::{ChainClient, ChainError, Permit2Allowance, TypedDataRequest, WalletError, WalletSigner};
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use swap_types::{ChainId, Transaction, TransactionReceipt, TxHash};

#[derive(Default)]
pub struct MockChainState {
	pub code: HashMap<Address, Bytes>,
	pub domain_separator_fails: bool,
	/// (token, owner, spender) -> allowance
	pub allowances: HashMap<(Address, Address, Address), U256>,
	/// (token, owner) -> balance
	pub balances: HashMap<(Address, Address), U256>,
	pub native_balances: HashMap<Address, U256>,
	/// (owner, token, spender) -> slot
	pub permit2_allowances: HashMap<(Address, Address, Address), Permit2Allowance>,
	pub estimate_gas_error: Option<String>,
	/// Caps allowances written through `approve`, to simulate lagging reads.
	pub approve_visible_cap: Option<U256>,
	pub gas_price: U256,
	pub fail_reads: bool,
}

#[derive(Default)]
pub struct MockChainClient {
	pub state: Mutex<MockChainState>,
	code_reads: AtomicUsize,
	domain_reads: AtomicUsize,
}

impl MockChainClient {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn set_code(&self, address: Address) {
		self.state
			.lock()
			.unwrap()
			.code
			.insert(address, Bytes::from(vec![0x60, 0x80]));
	}

	pub fn set_allowance(&self, token: Address, owner: Address, spender: Address, amount: U256) {
		self.state
			.lock()
			.unwrap()
			.allowances
			.insert((token, owner, spender), amount);
	}

	pub fn set_balance(&self, token: Address, owner: Address, amount: U256) {
		self.state
			.lock()
			.unwrap()
			.balances
			.insert((token, owner), amount);
	}

	pub fn set_native_balance(&self, owner: Address, amount: U256) {
		self.state
			.lock()
			.unwrap()
			.native_balances
			.insert(owner, amount);
	}

	pub fn set_estimate_gas_error(&self, error: Option<&str>) {
		self.state.lock().unwrap().estimate_gas_error = error.map(str::to_string);
	}

	pub fn code_reads(&self) -> usize {
		self.code_reads.load(Ordering::SeqCst)
	}

	pub fn domain_reads(&self) -> usize {
		self.domain_reads.load(Ordering::SeqCst)
	}

	fn check_reads(&self) -> Result<(), ChainError> {
		if self.state.lock().unwrap().fail_reads {
			return Err(ChainError::Rpc("scripted failure".to_string()));
		}
		Ok(())
	}

	fn apply(&self, owner: Address, tx: &Transaction) {
		let mut state = self.state.lock().unwrap();
		if let Ok(call) = IERC20::approveCall::abi_decode(&tx.data) {
			let visible = match state.approve_visible_cap {
				Some(cap) => call.amount.min(cap),
				None => call.amount,
			};
			state.allowances.insert((tx.to, owner, call.spender), visible);
		} else if IWrappedNative::depositCall::abi_decode(&tx.data).is_ok() {
			let native = state.native_balances.entry(owner).or_default();
			*native = native.saturating_sub(tx.value);
			let wrapped = state.balances.entry((tx.to, owner)).or_default();
			*wrapped += tx.value;
		}
	}
}

#[async_trait]
impl ChainClient for MockChainClient {
	async fn get_code(&self, _chain_id: ChainId, address: Address) -> Result<Bytes, ChainError> {
		self.code_reads.fetch_add(1, Ordering::SeqCst);
		self.check_reads()?;
		Ok(self
			.state
			.lock()
			.unwrap()
			.code
			.get(&address)
			.cloned()
			.unwrap_or_default())
	}

	async fn permit2_domain_separator(
		&self,
		_chain_id: ChainId,
		_permit2: Address,
	) -> Result<B256, ChainError> {
		self.domain_reads.fetch_add(1, Ordering::SeqCst);
		if self.state.lock().unwrap().domain_separator_fails {
			return Err(ChainError::Rpc("execution reverted".to_string()));
		}
		Ok(B256::repeat_byte(0xd5))
	}

	async fn erc20_allowance(
		&self,
		_chain_id: ChainId,
		token: Address,
		owner: Address,
		spender: Address,
	) -> Result<U256, ChainError> {
		self.check_reads()?;
		Ok(self
			.state
			.lock()
			.unwrap()
			.allowances
			.get(&(token, owner, spender))
			.copied()
			.unwrap_or_default())
	}

	async fn erc20_balance(
		&self,
		_chain_id: ChainId,
		token: Address,
		owner: Address,
	) -> Result<U256, ChainError> {
		self.check_reads()?;
		Ok(self
			.state
			.lock()
			.unwrap()
			.balances
			.get(&(token, owner))
			.copied()
			.unwrap_or_default())
	}

	async fn native_balance(&self, _chain_id: ChainId, owner: Address) -> Result<U256, ChainError> {
		self.check_reads()?;
		Ok(self
			.state
			.lock()
			.unwrap()
			.native_balances
			.get(&owner)
			.copied()
			.unwrap_or_default())
	}

	async fn permit2_allowance(
		&self,
		_chain_id: ChainId,
		_permit2: Address,
		owner: Address,
		token: Address,
		spender: Address,
	) -> Result<Permit2Allowance, ChainError> {
		self.check_reads()?;
		Ok(self
			.state
			.lock()
			.unwrap()
			.permit2_allowances
			.get(&(owner, token, spender))
			.copied()
			.unwrap_or_default())
	}

	async fn estimate_gas(&self, _tx: &Transaction) -> Result<u64, ChainError> {
		match &self.state.lock().unwrap().estimate_gas_error {
			Some(error) => Err(ChainError::Estimation(error.clone())),
			None => Ok(50_000),
		}
	}

	async fn gas_price(&self, _chain_id: ChainId) -> Result<U256, ChainError> {
		Ok(self.state.lock().unwrap().gas_price)
	}

	async fn wait_transaction(
		&self,
		_chain_id: ChainId,
		hash: TxHash,
	) -> Result<TransactionReceipt, ChainError> {
		Ok(TransactionReceipt {
			hash,
			block_number: 1,
			success: true,
		})
	}

	fn block_ticks(&self, _chain_id: ChainId) -> BoxStream<'static, u64> {
		stream::empty().boxed()
	}
}

/// What the wallet does when asked for a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignBehavior {
	Sign,
	Reject,
	Fail,
}

pub struct MockWallet {
	address: Mutex<Option<Address>>,
	chain_id: Mutex<Option<ChainId>>,
	chain: Option<Arc<MockChainClient>>,
	sign_behavior: Mutex<SignBehavior>,
	sign_requests: Mutex<Vec<TypedDataRequest>>,
	sent: Mutex<Vec<Transaction>>,
}

impl MockWallet {
	pub fn new(address: Address, chain_id: ChainId) -> Self {
		Self {
			address: Mutex::new(Some(address)),
			chain_id: Mutex::new(Some(chain_id)),
			chain: None,
			sign_behavior: Mutex::new(SignBehavior::Sign),
			sign_requests: Mutex::new(Vec::new()),
			sent: Mutex::new(Vec::new()),
		}
	}

	pub fn disconnected() -> Self {
		let wallet = Self::new(Address::ZERO, 1);
		*wallet.address.lock().unwrap() = None;
		*wallet.chain_id.lock().unwrap() = None;
		wallet
	}

	/// Sent transactions are applied to `chain`.
	pub fn attached_to(mut self, chain: Arc<MockChainClient>) -> Self {
		self.chain = Some(chain);
		self
	}

	pub fn set_chain_id(&self, chain_id: ChainId) {
		*self.chain_id.lock().unwrap() = Some(chain_id);
	}

	pub fn set_sign_behavior(&self, behavior: SignBehavior) {
		*self.sign_behavior.lock().unwrap() = behavior;
	}

	pub fn sign_requests(&self) -> Vec<TypedDataRequest> {
		self.sign_requests.lock().unwrap().clone()
	}

	pub fn sent(&self) -> Vec<Transaction> {
		self.sent.lock().unwrap().clone()
	}
}

#[async_trait]
impl WalletSigner for MockWallet {
	async fn address(&self) -> Option<Address> {
		*self.address.lock().unwrap()
	}

	async fn chain_id(&self) -> Option<ChainId> {
		*self.chain_id.lock().unwrap()
	}

	async fn send_transaction(&self, tx: Transaction) -> Result<TxHash, WalletError> {
		let owner = self.address().await.ok_or(WalletError::NotConnected)?;
		if let Some(chain) = &self.chain {
			chain.apply(owner, &tx);
		}
		let mut sent = self.sent.lock().unwrap();
		sent.push(tx);
		Ok(B256::with_last_byte(sent.len() as u8))
	}

	async fn sign_typed_data(&self, request: &TypedDataRequest) -> Result<Bytes, WalletError> {
		self.sign_requests.lock().unwrap().push(request.clone());
		match *self.sign_behavior.lock().unwrap() {
			SignBehavior::Sign => {
				let mut signature = request.signing_hash.to_vec();
				signature.extend_from_slice(request.signing_hash.as_slice());
				signature.push(0x1b);
				Ok(Bytes::from(signature))
			}
			SignBehavior::Reject => Err(WalletError::UserRejected),
			SignBehavior::Fail => Err(WalletError::Signing("device disconnected".to_string())),
		}
	}
}
