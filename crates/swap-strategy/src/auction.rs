//! Quote, prepare and cancel plumbing shared by the venues.
//!
//! Both auction venues quote the same way: normalize a native source into
//! its wrapped token, attach a cached Permit2 authorization when there is
//! one, ask the relay, then derive the rate and minimum receive from the
//! response. The raw response travels inside the snapshot so `swap` submits
//! exactly the quoted terms.

use crate::registry::VenueComponents;
use crate::relay::{QuoteRequest, StoredQuote};
use crate::StrategyError;
use alloy::primitives::{Address, Bytes};
use swap_permit::{
	encode_permit_call, PermitError, ResolverActions, ResolverStep, StepKind, StepOutput,
};
use swap_types::{
	Amount, ChainDirectory, NetworkFee, OrderHash, OrderRecord, Pair, Rate, SlippageOption,
	SwapEvent, SwapOptions, SwapSnapshot, Token, Transaction, TxHash, VenueKind,
};

/// Input checks every quote goes through. Returns the quoting wallet.
pub(crate) async fn check_quote(
	components: &VenueComponents,
	kind: VenueKind,
	supported: bool,
	pair: &Pair,
	amount: &Amount,
	wallet: Option<Address>,
) -> Result<Address, StrategyError> {
	if amount.is_zero() || amount.is_negative() {
		return Err(StrategyError::InvalidInput(
			"Amount must be more than 0".to_string(),
		));
	}
	let wallet =
		wallet.ok_or_else(|| StrategyError::InvalidInput("Wallet is not connected".to_string()))?;
	if !supported {
		return Err(unsupported(kind, pair));
	}

	let available = components.amounts.max_amount(wallet, &pair.source).await?;
	if *amount > available {
		return Err(StrategyError::InsufficientBalance {
			requested: amount.clone(),
			available,
		});
	}
	Ok(wallet)
}

/// Checks done before planning the steps of a snapshot.
pub(crate) async fn check_prepare(
	components: &VenueComponents,
	kind: VenueKind,
	supported: bool,
	snapshot: &SwapSnapshot,
) -> Result<(), StrategyError> {
	if components.wallet.address().await.is_none() {
		return Err(StrategyError::WalletNotConnected);
	}
	if !supported {
		return Err(unsupported(
			kind,
			&Pair::new(snapshot.source_token.clone(), snapshot.destination_token.clone()),
		));
	}
	Ok(())
}

pub(crate) fn check_snapshot(
	kind: VenueKind,
	snapshot: &SwapSnapshot,
) -> Result<(), StrategyError> {
	if snapshot.strategy != kind {
		return Err(StrategyError::WrongSnapshot {
			expected: kind,
			actual: snapshot.strategy,
		});
	}
	Ok(())
}

fn unsupported(kind: VenueKind, pair: &Pair) -> StrategyError {
	StrategyError::Unsupported(format!(
		"{} does not support {} -> {}",
		kind,
		pair.source.id(),
		pair.destination.id()
	))
}

/// Swaps a native token for the internal representation of its wrapped
/// token. Other tokens are returned unchanged.
pub fn normalize_source(
	contracts: &ChainDirectory,
	token: &Token,
) -> Result<Token, StrategyError> {
	if !token.is_native() {
		return Ok(token.clone());
	}
	let chain = contracts.get(token.chain_id).ok_or_else(|| {
		StrategyError::Unsupported(format!("No wrapped native token on chain {}", token.chain_id))
	})?;
	Ok(Token {
		chain_id: token.chain_id,
		address: chain.wrapped_native,
		decimals: chain.native_decimals,
		symbol: format!("W{}", chain.native_symbol),
		cross_chain_supported: token.cross_chain_supported,
		is_internal_wrap_token: true,
	})
}

/// Encoded cached Permit2 authorization for the quote, if one is usable.
pub(crate) async fn permit_blob(
	components: &VenueComponents,
	wallet: Address,
	token: &Token,
	amount: Amount,
) -> Option<Bytes> {
	let provided = match components
		.transfer
		.requirement_provided(wallet, token, amount)
		.await
	{
		Ok(provided) => provided,
		Err(e) => {
			tracing::warn!(token = %token.id(), error = %e, "Permit lookup failed");
			return None;
		}
	};
	match provided {
		Some(StepOutput::Signed(permit)) => match encode_permit_call(&permit) {
			Ok(blob) => Some(blob),
			Err(e) => {
				tracing::warn!(token = %token.id(), error = %e, "Cached permit cannot be encoded");
				None
			}
		},
		_ => None,
	}
}

pub(crate) async fn quote_request(
	components: &VenueComponents,
	wallet: Address,
	source: &Token,
	destination: &Token,
	amount: &Amount,
	finalize: bool,
) -> Result<QuoteRequest, StrategyError> {
	let permit = permit_blob(components, wallet, source, amount.clone()).await;
	Ok(QuoteRequest {
		source_chain: source.chain_id,
		destination_chain: destination.chain_id,
		source_token: source.address,
		destination_token: destination.address,
		amount: amount.to_wei(source.decimals)?,
		wallet,
		permit,
		enable_estimate: finalize,
	})
}

/// Snapshot of an auction quote.
pub(crate) fn build_snapshot(
	components: &VenueComponents,
	kind: VenueKind,
	wallet: Address,
	source: Token,
	destination: Token,
	amount: Amount,
	stored: StoredQuote,
) -> Result<SwapSnapshot, StrategyError> {
	let quote = &stored.quote;
	let market = Amount::from_wei(quote.destination_amount, destination.decimals)?;
	let rate = Rate {
		venue: kind,
		rate: market.checked_div(&amount)?,
		reverted_rate: amount.checked_div(&market)?,
		is_reverted: false,
		source_token: source.clone(),
		destination_token: destination.clone(),
	};

	let (min_receive, slippage) = match &components.settings.slippage_percent {
		// Custom slippage is taken from the market amount, not the preset
		Some(percent) => (
			market.checked_sub(&market.percent(percent)?)?,
			Some(SlippageOption {
				percent: percent.clone(),
				is_custom: true,
			}),
		),
		None => (
			Amount::from_wei(quote.preset.auction_end_amount, destination.decimals)?,
			quote.auto_slippage.clone().map(|percent| SlippageOption {
				percent,
				is_custom: false,
			}),
		),
	};

	let options = SwapOptions {
		rate: Some(rate.rate.clone()),
		slippage,
		auction_duration_secs: Some(quote.preset.auction_duration_secs),
		min_receive: Some(min_receive),
		network_fee: Some(NetworkFee {
			amount: Amount::zero(),
			token: None,
			is_free: true,
		}),
	};
	let raw_quote = serde_json::to_value(&stored)
		.map_err(|e| StrategyError::Serialization(e.to_string()))?;

	Ok(SwapSnapshot {
		wallet,
		source_token: source,
		destination_token: destination,
		source_amount: amount,
		destination_amount: market,
		rate,
		options,
		strategy: kind,
		raw_quote,
	})
}

pub(crate) fn stored_quote(snapshot: &SwapSnapshot) -> Result<StoredQuote, StrategyError> {
	serde_json::from_value(snapshot.raw_quote.clone())
		.map_err(|e| StrategyError::Serialization(format!("Snapshot carries no quote: {}", e)))
}

/// Transfer steps for the snapshot, preceded by a wrap of the native asset
/// when the source is the internal wrap token.
pub(crate) async fn prepare_with_wrap(
	components: &VenueComponents,
	snapshot: &SwapSnapshot,
) -> Result<ResolverActions, StrategyError> {
	let source = &snapshot.source_token;
	let mut steps = components
		.transfer
		.provide_requirements(snapshot.wallet, source, snapshot.source_amount.clone())
		.await?;

	let wraps_native = source.is_internal_wrap_token
		&& components.contracts.wrapped_native(source.chain_id) == Some(source.address);
	if wraps_native {
		let wrap = components.wrap.clone();
		let chain_id = source.chain_id;
		let amount = snapshot.source_amount.clone();
		steps.insert(
			0,
			ResolverStep::new(StepKind::Wrap, move || async move {
				wrap.wrap(chain_id, amount)
					.await
					.map(StepOutput::Wrapped)
					.map_err(|e| match e {
						StrategyError::UserRejected => PermitError::UserRejected,
						other => PermitError::Wrap(other.to_string()),
					})
			}),
		);
	}
	Ok(steps)
}

/// Persists the record of a submitted order and announces it.
pub(crate) async fn record_order(
	components: &VenueComponents,
	kind: VenueKind,
	hash: OrderHash,
	snapshot: &SwapSnapshot,
) -> Result<OrderRecord, StrategyError> {
	let record = OrderRecord {
		hash,
		source_chain: snapshot.source_token.chain_id,
		source_token: snapshot.source_token.address,
		destination_chain: snapshot.destination_token.chain_id,
		destination_token: snapshot.destination_token.address,
		strategy: kind,
		account: snapshot.wallet,
		created_at: chrono::Utc::now(),
	};
	components.orders.save_order(&record).await?;
	if let Some(events) = &components.events {
		let _ = events.publish(SwapEvent::OrderSubmitted {
			hash,
			strategy: kind,
		});
	}
	Ok(record)
}

pub(crate) async fn order_record(
	components: &VenueComponents,
	hash: OrderHash,
) -> Result<OrderRecord, StrategyError> {
	components
		.orders
		.get_order(&hash)
		.await?
		.ok_or(StrategyError::OrderNotFound(hash))
}

/// Record of an order `kind` may cancel.
pub(crate) async fn cancellable_record(
	components: &VenueComponents,
	kind: VenueKind,
	hash: OrderHash,
) -> Result<OrderRecord, StrategyError> {
	let record = order_record(components, hash).await?;
	if record.strategy != kind {
		return Err(StrategyError::Unsupported(format!(
			"Order {} belongs to {}",
			hash, record.strategy
		)));
	}
	Ok(record)
}

/// Sends the router cancel call from the original submitter on the source
/// chain, then forgets the order.
pub(crate) async fn send_cancel(
	components: &VenueComponents,
	record: &OrderRecord,
	calldata: Bytes,
) -> Result<TxHash, StrategyError> {
	let connected_chain = components.wallet.chain_id().await;
	if connected_chain != Some(record.source_chain) {
		return Err(StrategyError::WrongWalletChain {
			expected: record.source_chain,
			actual: connected_chain,
		});
	}
	let account = components
		.wallet
		.address()
		.await
		.ok_or(StrategyError::WalletNotConnected)?;
	if account != record.account {
		return Err(StrategyError::InvalidInput(format!(
			"Order was submitted by {}, connected account is {}",
			record.account, account
		)));
	}

	let router = components
		.contracts
		.get(record.source_chain)
		.map(|contracts| contracts.router)
		.ok_or_else(|| {
			StrategyError::Unsupported(format!("No router on chain {}", record.source_chain))
		})?;
	let tx = Transaction::call(record.source_chain, router, calldata).with_from(account);
	let cancel_tx = components.wallet.send_transaction(tx).await?;
	components.orders.delete_order(&record.hash).await?;
	tracing::info!(order_hash = %record.hash, %cancel_tx, "Sent order cancellation");
	Ok(cancel_tx)
}

/// Cancellation never fails towards the caller.
pub(crate) fn cancel_outcome(
	hash: OrderHash,
	result: Result<TxHash, StrategyError>,
) -> Option<TxHash> {
	match result {
		Ok(tx) => Some(tx),
		Err(e) => {
			tracing::warn!(order_hash = %hash, error = %e, "Order not cancelled");
			None
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::mock::{test_components, token, FixedAmountSource};
	use crate::relay::{AuctionPreset, VenueQuote};
	use alloy::primitives::U256;
	use std::sync::Arc;
	use swap_types::NATIVE_TOKEN_ADDRESS;

	const OWNER: Address = Address::new([0x0e; 20]);

	fn ether(value: u64) -> U256 {
		U256::from(value) * U256::from(10u64).pow(U256::from(18u8))
	}

	fn stored(amount: U256, destination: U256, end: U256) -> StoredQuote {
		StoredQuote {
			request: QuoteRequest {
				source_chain: 1,
				destination_chain: 1,
				source_token: Address::new([0x01; 20]),
				destination_token: Address::new([0x02; 20]),
				amount,
				wallet: OWNER,
				permit: None,
				enable_estimate: false,
			},
			quote: VenueQuote {
				quote_id: Some("q".to_string()),
				destination_amount: destination,
				preset_name: "fast".to_string(),
				preset: AuctionPreset {
					auction_duration_secs: 120,
					auction_end_amount: end,
					secrets_count: 1,
				},
				auto_slippage: Some(Amount::from(2u64)),
				raw: serde_json::json!({}),
			},
		}
	}

	#[test]
	fn test_snapshot_min_receive_from_preset() {
		let (components, _, _) = test_components(OWNER, 1);
		let snapshot = build_snapshot(
			&components,
			VenueKind::SingleChainAuction,
			OWNER,
			token(1, Address::new([0x01; 20]), false),
			token(1, Address::new([0x02; 20]), false),
			Amount::from(2u64),
			stored(ether(2), ether(4), ether(3)),
		)
		.unwrap();

		assert_eq!(snapshot.destination_amount, Amount::from(4u64));
		assert_eq!(snapshot.rate.rate, Amount::from(2u64));
		assert_eq!(snapshot.rate.reverted_rate, "0.5".parse::<Amount>().unwrap());
		assert_eq!(snapshot.options.min_receive, Some(Amount::from(3u64)));
		assert_eq!(
			snapshot.options.slippage,
			Some(SlippageOption {
				percent: Amount::from(2u64),
				is_custom: false
			})
		);
		assert_eq!(snapshot.options.auction_duration_secs, Some(120));
		assert!(snapshot.options.network_fee.as_ref().unwrap().is_free);
		assert_eq!(stored_quote(&snapshot).unwrap().quote.quote_id.as_deref(), Some("q"));
	}

	#[test]
	fn test_custom_slippage_uses_market_amount() {
		let (mut components, _, _) = test_components(OWNER, 1);
		components.settings.slippage_percent = Some(Amount::from(1u64));
		let snapshot = build_snapshot(
			&components,
			VenueKind::SingleChainAuction,
			OWNER,
			token(1, Address::new([0x01; 20]), false),
			token(1, Address::new([0x02; 20]), false),
			Amount::from(1u64),
			stored(ether(1), ether(200), ether(150)),
		)
		.unwrap();
		assert_eq!(snapshot.options.min_receive, Some(Amount::from(198u64)));
		assert!(snapshot.options.slippage.unwrap().is_custom);
	}

	#[tokio::test]
	async fn test_check_quote_errors() {
		let (mut components, _, _) = test_components(OWNER, 1);
		components.amounts = Arc::new(FixedAmountSource(Amount::from(5u64)));
		let pair = Pair::new(
			token(1, Address::new([0x01; 20]), false),
			token(1, Address::new([0x02; 20]), false),
		);
		let kind = VenueKind::SingleChainAuction;

		assert!(matches!(
			check_quote(&components, kind, true, &pair, &Amount::zero(), Some(OWNER)).await,
			Err(StrategyError::InvalidInput(_))
		));
		assert!(matches!(
			check_quote(&components, kind, true, &pair, &Amount::one(), None).await,
			Err(StrategyError::InvalidInput(_))
		));
		assert!(matches!(
			check_quote(&components, kind, false, &pair, &Amount::one(), Some(OWNER)).await,
			Err(StrategyError::Unsupported(_))
		));
		assert!(matches!(
			check_quote(&components, kind, true, &pair, &Amount::from(6u64), Some(OWNER)).await,
			Err(StrategyError::InsufficientBalance { .. })
		));
		assert_eq!(
			check_quote(&components, kind, true, &pair, &Amount::from(5u64), Some(OWNER))
				.await
				.unwrap(),
			OWNER
		);
	}

	#[test]
	fn test_native_source_becomes_internal_wrap_token() {
		let directory = ChainDirectory::with_defaults();
		let native = token(137, NATIVE_TOKEN_ADDRESS, false);
		let normalized = normalize_source(&directory, &native).unwrap();
		assert!(normalized.is_internal_wrap_token);
		assert_eq!(Some(normalized.address), directory.wrapped_native(137));
		assert_eq!(normalized.symbol, "WPOL");

		let usdc = token(137, Address::new([0x5c; 20]), false);
		assert_eq!(normalize_source(&directory, &usdc).unwrap(), usdc);
	}

	#[tokio::test]
	async fn test_prepare_prepends_wrap_step() {
		let (components, chain, wallet) = test_components(OWNER, 1);
		chain.set_native_balance(OWNER, ether(10));
		let weth = components.contracts.wrapped_native(1).unwrap();
		let snapshot = build_snapshot(
			&components,
			VenueKind::SingleChainAuction,
			OWNER,
			token(1, weth, true),
			token(1, Address::new([0x02; 20]), false),
			Amount::from(2u64),
			stored(ether(2), ether(4), ether(3)),
		)
		.unwrap();

		let steps = prepare_with_wrap(&components, &snapshot).await.unwrap();
		assert_eq!(swap_permit::joined_aliases(&steps), "Wrap&Approve");

		for step in steps {
			step.run().await.unwrap();
		}
		let sent = wallet.sent();
		assert_eq!(sent.len(), 2);
		assert_eq!(sent[0].value, ether(2));
		assert_eq!(sent[0].to, weth);
		// The router allowance is in place, the native asset is wrapped per swap
		let again = prepare_with_wrap(&components, &snapshot).await.unwrap();
		assert_eq!(swap_permit::joined_aliases(&again), "Wrap");
	}
}
