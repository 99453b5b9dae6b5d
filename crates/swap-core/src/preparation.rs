//! Preparation state machine.
//!
//! [`evaluate`] is the pure half: it maps the wallet, the form and the
//! latest quote onto a [`PreparationState`]. [`PreparationMachine`] is the
//! stateful half. When evaluation lands on `CheckAllowance` it asks the
//! snapshot's venue for the steps still missing, runs them when the caller
//! proceeds, and remembers source tokens that needed nothing so unchanged
//! inputs go straight to `ReadyToSwap`. [`PreparationDriver`] re-evaluates
//! in the background on form changes and on new blocks of the source chain.

use crate::context::SwapContext;
use crate::pair::SwapForm;
use crate::PreparationError;
use alloy::primitives::Address;
use dashmap::DashSet;
use futures::stream::{self, BoxStream, StreamExt};
use std::fmt;
use std::sync::Arc;
use swap_chain::ChainClient;
use swap_permit::{joined_aliases, ResolverActions, ResolverStep, StepKind};
use swap_types::{Amount, ChainId, EventBus, Rate, SwapEvent, SwapSnapshot, Token, TokenId};
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreparationState {
	Initialize,
	ReadyToSwap,
	ReadyToSwapLoading,
	NeedChangeChainInWallet,
	WalletNotConnected,
	UnselectedSourceToken,
	UnselectedDestinationToken,
	ZeroAmount,
	ExceedingMaximumAmount,
	RateNotExist,
	CheckAllowance,
	UpdateSwapData,
	Wrap,
	Approve,
	Permit,
	WrapAndApprove,
	WrapAndPermit,
	ApproveAndPermit,
	WrapAndApproveAndPermit,
	WaitingWrapTransaction,
	WaitingApproveTransaction,
	WaitingSignPermit,
}

impl PreparationState {
	pub fn name(&self) -> &'static str {
		match self {
			Self::Initialize => "Initialize",
			Self::ReadyToSwap => "ReadyToSwap",
			Self::ReadyToSwapLoading => "ReadyToSwapLoading",
			Self::NeedChangeChainInWallet => "NeedChangeChainInWallet",
			Self::WalletNotConnected => "WalletNotConnected",
			Self::UnselectedSourceToken => "UnselectedSourceToken",
			Self::UnselectedDestinationToken => "UnselectedDestinationToken",
			Self::ZeroAmount => "ZeroAmount",
			Self::ExceedingMaximumAmount => "ExceedingMaximumAmount",
			Self::RateNotExist => "RateNotExist",
			Self::CheckAllowance => "CheckAllowance",
			Self::UpdateSwapData => "UpdateSwapData",
			Self::Wrap => "Wrap",
			Self::Approve => "Approve",
			Self::Permit => "Permit",
			Self::WrapAndApprove => "WrapAndApprove",
			Self::WrapAndPermit => "WrapAndPermit",
			Self::ApproveAndPermit => "ApproveAndPermit",
			Self::WrapAndApproveAndPermit => "WrapAndApproveAndPermit",
			Self::WaitingWrapTransaction => "WaitingWrapTransaction",
			Self::WaitingApproveTransaction => "WaitingApproveTransaction",
			Self::WaitingSignPermit => "WaitingSignPermit",
		}
	}

	/// What the user has to do before the swap can go on, for blocking
	/// states.
	pub fn reason(&self) -> Option<&'static str> {
		match self {
			Self::WalletNotConnected => Some("Connect wallet"),
			Self::UnselectedSourceToken => Some("Select the token to sell"),
			Self::UnselectedDestinationToken => Some("Select the token to buy"),
			Self::ZeroAmount => Some("Enter an amount to swap"),
			Self::ExceedingMaximumAmount => Some("Insufficient balance"),
			Self::RateNotExist => Some("No liquidity for this swap"),
			Self::NeedChangeChainInWallet => Some("Switch the wallet to the source chain"),
			_ => None,
		}
	}

	pub fn is_blocking(&self) -> bool {
		self.reason().is_some()
	}

	/// One of the step combinations waiting for the user to proceed.
	pub fn is_preparing(&self) -> bool {
		matches!(
			self,
			Self::Wrap
				| Self::Approve
				| Self::Permit
				| Self::WrapAndApprove
				| Self::WrapAndPermit
				| Self::ApproveAndPermit
				| Self::WrapAndApproveAndPermit
		)
	}

	pub fn is_waiting(&self) -> bool {
		matches!(
			self,
			Self::WaitingWrapTransaction | Self::WaitingApproveTransaction | Self::WaitingSignPermit
		)
	}

	pub fn is_ready(&self) -> bool {
		matches!(self, Self::ReadyToSwap | Self::ReadyToSwapLoading)
	}

	/// States during which something is in flight.
	pub fn shows_loader(&self) -> bool {
		matches!(
			self,
			Self::Initialize
				| Self::CheckAllowance
				| Self::UpdateSwapData
				| Self::WaitingWrapTransaction
				| Self::WaitingApproveTransaction
				| Self::ReadyToSwapLoading
		)
	}

	/// Sticky states survive re-evaluation until the machine is reset.
	fn is_sticky(&self) -> bool {
		self.is_ready() || self.is_preparing() || self.is_waiting() || *self == Self::CheckAllowance
	}

	/// State presenting `actions`, keyed by their joined aliases.
	pub fn for_actions(actions: &[ResolverStep]) -> Option<Self> {
		match joined_aliases(actions).as_str() {
			"Wrap" => Some(Self::Wrap),
			"Approve" => Some(Self::Approve),
			"SignPermit" => Some(Self::Permit),
			"Wrap&Approve" => Some(Self::WrapAndApprove),
			"Wrap&SignPermit" => Some(Self::WrapAndPermit),
			"Approve&SignPermit" => Some(Self::ApproveAndPermit),
			"Wrap&Approve&SignPermit" => Some(Self::WrapAndApproveAndPermit),
			_ => None,
		}
	}

	pub fn waiting_for(kind: StepKind) -> Self {
		match kind {
			StepKind::Wrap => Self::WaitingWrapTransaction,
			StepKind::Approve => Self::WaitingApproveTransaction,
			StepKind::SignPermit => Self::WaitingSignPermit,
		}
	}
}

impl fmt::Display for PreparationState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// Everything [`evaluate`] looks at.
#[derive(Debug, Clone, Default)]
pub struct PreparationInputs {
	pub wallet: Option<Address>,
	pub wallet_chain: Option<ChainId>,
	pub source: Option<Token>,
	pub destination: Option<Token>,
	pub amount: Option<Amount>,
	pub exceeds_balance: bool,
	pub rate: Option<Rate>,
	/// A quote for the form is in flight.
	pub loading: bool,
}

/// Maps the inputs onto a state. The first blocking reason wins.
pub fn evaluate(inputs: &PreparationInputs, first_evaluation: bool) -> PreparationState {
	if inputs.wallet.is_none() {
		return PreparationState::WalletNotConnected;
	}
	let Some(source) = &inputs.source else {
		return PreparationState::UnselectedSourceToken;
	};
	if inputs.destination.is_none() {
		return PreparationState::UnselectedDestinationToken;
	}
	if inputs.amount.as_ref().map_or(true, Amount::is_zero) {
		return PreparationState::ZeroAmount;
	}
	if inputs.exceeds_balance {
		return PreparationState::ExceedingMaximumAmount;
	}
	if inputs.loading && (first_evaluation || inputs.rate.is_none()) {
		return PreparationState::UpdateSwapData;
	}
	match &inputs.rate {
		None => return PreparationState::RateNotExist,
		// The direct venue only quotes
		Some(rate) if rate.is_on_chain() => return PreparationState::RateNotExist,
		Some(_) => {}
	}
	if inputs.wallet_chain != Some(source.chain_id) {
		return PreparationState::NeedChangeChainInWallet;
	}
	PreparationState::CheckAllowance
}

/// Source tokens whose steps have all completed.
///
/// Cheap to clone; clones share the set.
#[derive(Debug, Clone, Default)]
pub struct PreparedTokens {
	inner: Arc<DashSet<TokenId>>,
}

impl PreparedTokens {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn contains(&self, token: &TokenId) -> bool {
		self.inner.contains(token)
	}

	pub fn insert(&self, token: TokenId) {
		self.inner.insert(token);
	}

	pub fn remove(&self, token: &TokenId) {
		self.inner.remove(token);
	}

	pub fn clear(&self) {
		self.inner.clear();
	}

	pub fn len(&self) -> usize {
		self.inner.len()
	}

	pub fn is_empty(&self) -> bool {
		self.inner.is_empty()
	}
}

pub struct PreparationMachine {
	context: Arc<SwapContext>,
	prepared: PreparedTokens,
	state: watch::Sender<PreparationState>,
	pending: Mutex<Option<ResolverActions>>,
	events: Option<EventBus>,
}

impl PreparationMachine {
	pub fn new(context: Arc<SwapContext>, prepared: PreparedTokens) -> Self {
		let (state, _) = watch::channel(PreparationState::Initialize);
		Self {
			context,
			prepared,
			state,
			pending: Mutex::new(None),
			events: None,
		}
	}

	pub fn with_events(mut self, events: Option<EventBus>) -> Self {
		self.events = events;
		self
	}

	pub fn context(&self) -> &Arc<SwapContext> {
		&self.context
	}

	pub fn prepared_tokens(&self) -> &PreparedTokens {
		&self.prepared
	}

	pub fn state(&self) -> PreparationState {
		*self.state.borrow()
	}

	pub fn subscribe(&self) -> watch::Receiver<PreparationState> {
		self.state.subscribe()
	}

	fn source_id(&self) -> Option<TokenId> {
		self.context.pair().snapshot().source.token.as_ref().map(Token::id)
	}

	fn set_state(&self, next: PreparationState) {
		let changed = self.state.send_if_modified(|state| {
			if *state == next {
				return false;
			}
			*state = next;
			true
		});
		if !changed {
			return;
		}
		let token = self.source_id();
		tracing::debug!(state = %next, token = ?token, "Preparation state changed");
		if let Some(events) = &self.events {
			let _ = events.publish(SwapEvent::PreparationChanged {
				token,
				state: next.name().to_string(),
			});
		}
	}

	/// Drops sticky state so the next update evaluates from scratch. Called
	/// when the source token or amount changes.
	pub async fn reset(&self) {
		*self.pending.lock().await = None;
		self.set_state(PreparationState::Initialize);
	}

	async fn fail(&self) {
		if let Some(source) = self.source_id() {
			self.prepared.remove(&source);
		}
		self.reset().await;
	}

	/// Re-evaluates `inputs` unless the current state is sticky.
	pub async fn update(
		&self,
		inputs: &PreparationInputs,
		first_evaluation: bool,
	) -> Result<PreparationState, PreparationError> {
		let current = self.state();
		if current.is_sticky() {
			return Ok(current);
		}

		let next = evaluate(inputs, first_evaluation);
		self.set_state(next);
		if let (PreparationState::CheckAllowance, Some(source)) = (next, &inputs.source) {
			if let Err(e) = self.plan(source).await {
				tracing::warn!(token = %source.id(), error = %e, "Preparation check failed");
				self.fail().await;
				return Err(e);
			}
		}
		Ok(self.state())
	}

	async fn plan(&self, source: &Token) -> Result<(), PreparationError> {
		let source_id = source.id();
		if self.prepared.contains(&source_id) {
			self.set_state(PreparationState::ReadyToSwap);
			return Ok(());
		}

		let snapshot = self
			.context
			.snapshot(false)
			.await?
			.ok_or(PreparationError::MissingSnapshot)?;
		let actions = self.context.prepare_swap(&snapshot).await?;
		if actions.is_empty() {
			self.prepared.insert(source_id);
			self.set_state(PreparationState::ReadyToSwap);
			return Ok(());
		}

		let state = PreparationState::for_actions(&actions)
			.ok_or_else(|| PreparationError::UnknownActions(joined_aliases(&actions)))?;
		*self.pending.lock().await = Some(actions);
		self.set_state(state);
		Ok(())
	}

	/// Moves the swap forward from the current state.
	///
	/// From `ReadyToSwap` this requotes with `finalize` and returns the
	/// snapshot to execute. From a preparing state it first runs the pending
	/// steps in order. `ExceedingMaximumAmount` sets the source amount to the
	/// balance. Other states do nothing. On any error the machine resets and
	/// forgets the source token.
	pub async fn proceed(&self) -> Result<Option<SwapSnapshot>, PreparationError> {
		let state = self.state();
		let result = match state {
			PreparationState::ReadyToSwap => self.confirm().await.map(Some),
			PreparationState::ExceedingMaximumAmount => self
				.context
				.set_max_amount()
				.await
				.map(|_| None)
				.map_err(PreparationError::from),
			state if state.is_preparing() => self.run_pending().await.map(Some),
			_ => Ok(None),
		};

		if let Err(e) = &result {
			tracing::warn!(state = %state, error = %e, "Preparation failed");
			self.fail().await;
		}
		result
	}

	async fn run_pending(&self) -> Result<SwapSnapshot, PreparationError> {
		let actions = self.pending.lock().await.take().unwrap_or_default();
		for step in actions {
			let kind = step.kind();
			self.set_state(PreparationState::waiting_for(kind));
			step.run().await?;
			tracing::info!(step = kind.alias(), "Preparation step completed");
		}
		if let Some(source) = self.source_id() {
			self.prepared.remove(&source);
		}
		self.confirm().await
	}

	async fn confirm(&self) -> Result<SwapSnapshot, PreparationError> {
		self.set_state(PreparationState::ReadyToSwapLoading);
		let snapshot = self
			.context
			.snapshot(true)
			.await?
			.ok_or(PreparationError::MissingSnapshot)?;
		self.set_state(PreparationState::ReadyToSwap);
		Ok(snapshot)
	}
}

/// Handle of a running [`PreparationDriver`]. Dropping it stops the driver.
pub struct DriverHandle {
	stop: watch::Sender<bool>,
	refresh: Arc<Notify>,
	task: JoinHandle<()>,
}

impl DriverHandle {
	/// Requotes the form and re-evaluates.
	pub fn refresh(&self) {
		self.refresh.notify_one();
	}

	pub async fn stop(self) {
		let _ = self.stop.send(true);
		let _ = self.task.await;
	}
}

/// Background re-evaluation loop of a [`PreparationMachine`].
pub struct PreparationDriver {
	machine: Arc<PreparationMachine>,
	chain: Arc<dyn ChainClient>,
}

impl PreparationDriver {
	pub fn new(machine: Arc<PreparationMachine>, chain: Arc<dyn ChainClient>) -> Self {
		Self { machine, chain }
	}

	pub fn spawn(self) -> DriverHandle {
		let (stop, stopped) = watch::channel(false);
		let refresh = Arc::new(Notify::new());
		let task = tokio::spawn(self.run(stopped, refresh.clone()));
		DriverHandle {
			stop,
			refresh,
			task,
		}
	}

	async fn requote(&self) {
		if let Err(e) = self.machine.context().snapshot(false).await {
			tracing::debug!(error = %e, "Quote for the form failed");
		}
	}

	async fn run(self, mut stopped: watch::Receiver<bool>, refresh: Arc<Notify>) {
		let context = self.machine.context().clone();
		let mut form = context.pair().subscribe();
		let mut quote_inputs = form.borrow_and_update().quote_inputs();
		let mut ticks_chain: Option<ChainId> = None;
		let mut ticks: BoxStream<'static, u64> = stream::pending().boxed();
		let mut first_evaluation = true;

		self.requote().await;
		loop {
			let source_chain = source_chain(&form.borrow());
			if source_chain != ticks_chain {
				ticks = match source_chain {
					Some(chain_id) => self.chain.block_ticks(chain_id),
					None => stream::pending().boxed(),
				};
				ticks_chain = source_chain;
			}

			let inputs = context.preparation_inputs().await;
			// Errors are logged by the machine
			let _ = self.machine.update(&inputs, first_evaluation).await;
			first_evaluation = false;

			tokio::select! {
				changed = form.changed() => {
					if changed.is_err() {
						break;
					}
					let next = form.borrow_and_update().quote_inputs();
					if next != quote_inputs {
						quote_inputs = next;
						self.machine.reset().await;
						self.requote().await;
					}
				}
				tick = ticks.next() => {
					if tick.is_none() {
						ticks = stream::pending().boxed();
					}
				}
				_ = refresh.notified() => {
					self.requote().await;
				}
				_ = stopped.changed() => break,
			}
		}
		tracing::debug!("Preparation driver stopped");
	}
}

fn source_chain(form: &SwapForm) -> Option<ChainId> {
	form.source.token.as_ref().map(|token| token.chain_id)
}
