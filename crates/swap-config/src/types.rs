//! # Configuration Types
//!
//! Structures deserialized from the engine's TOML file. Every section has
//! defaults, so an empty file only needs its `[chains.<id>]` tables.

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use swap_permit::PermitSettings;
use swap_strategy::SwapSettings;
use swap_types::{Amount, ChainContracts, ChainDirectory, ChainId};

/// Root configuration object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
	#[serde(default)]
	pub engine: EngineSettings,
	/// Backend table handed to `swap_storage::create_storage`.
	#[serde(default = "default_storage")]
	pub storage: toml::Value,
	#[serde(default)]
	pub permit: PermitConfig,
	#[serde(default)]
	pub swap: SwapConfig,
	/// Chains keyed by their decimal chain id.
	#[serde(default)]
	pub chains: HashMap<String, ChainConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
	#[serde(default = "default_log_level")]
	pub log_level: String,
	/// Buffered events per subscriber before the slowest one lags.
	#[serde(default = "default_event_bus_capacity")]
	pub event_bus_capacity: usize,
}

impl Default for EngineSettings {
	fn default() -> Self {
		Self {
			log_level: default_log_level(),
			event_bus_capacity: default_event_bus_capacity(),
		}
	}
}

/// Permit and approval timings. Durations are in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermitConfig {
	#[serde(default = "default_minimum_lead_time_seconds")]
	pub minimum_lead_time_seconds: u64,
	#[serde(default = "default_permit_expiration_seconds")]
	pub permit_expiration_seconds: u64,
	#[serde(default = "default_signature_deadline_seconds")]
	pub signature_deadline_seconds: u64,
	/// Basis points of the approved amount that must be visible on-chain
	/// before an approval counts as confirmed.
	#[serde(default = "default_approval_confirmation_bps")]
	pub approval_confirmation_bps: u32,
	#[serde(default = "default_approval_settle_delay_seconds")]
	pub approval_settle_delay_seconds: u64,
	#[serde(default = "default_support_cache_ttl_seconds")]
	pub support_cache_ttl_seconds: u64,
}

impl Default for PermitConfig {
	fn default() -> Self {
		Self {
			minimum_lead_time_seconds: default_minimum_lead_time_seconds(),
			permit_expiration_seconds: default_permit_expiration_seconds(),
			signature_deadline_seconds: default_signature_deadline_seconds(),
			approval_confirmation_bps: default_approval_confirmation_bps(),
			approval_settle_delay_seconds: default_approval_settle_delay_seconds(),
			support_cache_ttl_seconds: default_support_cache_ttl_seconds(),
		}
	}
}

impl PermitConfig {
	pub fn settings(&self) -> PermitSettings {
		PermitSettings {
			minimum_lead_time: Duration::from_secs(self.minimum_lead_time_seconds),
			permit_expiration: Duration::from_secs(self.permit_expiration_seconds),
			signature_deadline: Duration::from_secs(self.signature_deadline_seconds),
			approval_confirmation_bps: self.approval_confirmation_bps,
			approval_settle_delay: Duration::from_secs(self.approval_settle_delay_seconds),
			support_cache_ttl: Duration::from_secs(self.support_cache_ttl_seconds),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapConfig {
	/// Custom slippage in percent. Unset keeps each venue's preset.
	#[serde(default)]
	pub slippage_percent: Option<Amount>,
	#[serde(default = "default_order_ttl_seconds")]
	pub order_ttl_seconds: u64,
	#[serde(default = "default_poll_interval_seconds")]
	pub reveal_poll_interval_seconds: u64,
	#[serde(default = "default_poll_interval_seconds")]
	pub status_poll_interval_seconds: u64,
}

impl Default for SwapConfig {
	fn default() -> Self {
		Self {
			slippage_percent: None,
			order_ttl_seconds: default_order_ttl_seconds(),
			reveal_poll_interval_seconds: default_poll_interval_seconds(),
			status_poll_interval_seconds: default_poll_interval_seconds(),
		}
	}
}

impl SwapConfig {
	pub fn settings(&self) -> SwapSettings {
		SwapSettings {
			slippage_percent: self.slippage_percent.clone(),
			reveal_poll_interval: Duration::from_secs(self.reveal_poll_interval_seconds),
			status_poll_interval: Duration::from_secs(self.status_poll_interval_seconds),
		}
	}

	pub fn order_ttl(&self) -> Duration {
		Duration::from_secs(self.order_ttl_seconds)
	}
}

/// One `[chains.<id>]` table. Omitted contract addresses fall back to the
/// well-known deployment for that chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
	#[serde(default)]
	pub rpc_url: String,
	pub permit2: Option<Address>,
	pub router: Option<Address>,
	pub wrapped_native: Option<Address>,
	pub native_symbol: Option<String>,
	pub native_decimals: Option<u8>,
}

impl EngineConfig {
	/// Configured chains with numeric ids, in ascending order.
	pub fn chain_entries(&self) -> Result<Vec<(ChainId, &ChainConfig)>, String> {
		let mut entries = self
			.chains
			.iter()
			.map(|(key, chain)| {
				key.parse::<ChainId>()
					.map(|id| (id, chain))
					.map_err(|_| format!("Chain key {:?} is not a chain id", key))
			})
			.collect::<Result<Vec<_>, _>>()?;
		entries.sort_by_key(|(id, _)| *id);
		Ok(entries)
	}

	pub fn rpc_urls(&self) -> Result<HashMap<ChainId, String>, String> {
		Ok(self
			.chain_entries()?
			.into_iter()
			.map(|(id, chain)| (id, chain.rpc_url.clone()))
			.collect())
	}

	/// Builds the contract directory: known deployments overlaid with the
	/// configured chains.
	pub fn chain_directory(&self) -> Result<ChainDirectory, String> {
		let defaults = ChainDirectory::with_defaults();
		let mut directory = ChainDirectory::new();
		for (id, chain) in self.chain_entries()? {
			let known = defaults.get(id);
			let wrapped_native = chain
				.wrapped_native
				.or(known.map(|c| c.wrapped_native))
				.ok_or_else(|| format!("Chain {} needs a wrapped_native address", id))?;
			let base = known.cloned().unwrap_or(ChainContracts {
				permit2: swap_types::PERMIT2_ADDRESS,
				router: swap_types::ROUTER_ADDRESS,
				wrapped_native,
				native_symbol: "ETH".to_string(),
				native_decimals: 18,
			});
			directory.insert(
				id,
				ChainContracts {
					permit2: chain.permit2.unwrap_or(base.permit2),
					router: chain.router.unwrap_or(base.router),
					wrapped_native,
					native_symbol: chain.native_symbol.clone().unwrap_or(base.native_symbol),
					native_decimals: chain.native_decimals.unwrap_or(base.native_decimals),
				},
			);
		}
		Ok(directory)
	}
}

fn default_storage() -> toml::Value {
	let mut table = toml::map::Map::new();
	table.insert("backend".to_string(), toml::Value::String("memory".to_string()));
	toml::Value::Table(table)
}

fn default_log_level() -> String {
	"info".to_string()
}

fn default_event_bus_capacity() -> usize {
	256
}

fn default_minimum_lead_time_seconds() -> u64 {
	10 * 60
}

fn default_permit_expiration_seconds() -> u64 {
	30 * 24 * 60 * 60
}

fn default_signature_deadline_seconds() -> u64 {
	60 * 60
}

fn default_approval_confirmation_bps() -> u32 {
	5_000
}

fn default_approval_settle_delay_seconds() -> u64 {
	1
}

fn default_support_cache_ttl_seconds() -> u64 {
	365 * 24 * 60 * 60
}

fn default_order_ttl_seconds() -> u64 {
	3 * 24 * 60 * 60
}

fn default_poll_interval_seconds() -> u64 {
	1
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy::primitives::address;

	#[test]
	fn test_defaults_match_engine_settings() {
		let config: EngineConfig = toml::from_str("").unwrap();
		let permit = config.permit.settings();
		let expected = PermitSettings::default();
		assert_eq!(permit.minimum_lead_time, expected.minimum_lead_time);
		assert_eq!(permit.permit_expiration, expected.permit_expiration);
		assert_eq!(permit.approval_confirmation_bps, 5_000);
		assert_eq!(config.swap.order_ttl(), Duration::from_secs(3 * 24 * 60 * 60));
		assert_eq!(config.storage.get("backend").and_then(|v| v.as_str()), Some("memory"));
		assert_eq!(config.engine.event_bus_capacity, 256);
	}

	#[test]
	fn test_chain_directory_overlays_known_deployments() {
		let config: EngineConfig = toml::from_str(
			r#"
			[chains.1]
			rpc_url = "http://localhost:8545"

			[chains.31337]
			rpc_url = "http://localhost:8546"
			wrapped_native = "0x5FbDB2315678afecb367f032d93F642f64180aa3"
			native_symbol = "GO"
			"#,
		)
		.unwrap();

		let directory = config.chain_directory().unwrap();
		assert_eq!(
			directory.wrapped_native(1),
			ChainDirectory::with_defaults().wrapped_native(1)
		);
		let local = directory.get(31337).unwrap();
		assert_eq!(local.wrapped_native, address!("5FbDB2315678afecb367f032d93F642f64180aa3"));
		assert_eq!(local.native_symbol, "GO");
		assert_eq!(local.permit2, swap_types::PERMIT2_ADDRESS);
	}

	#[test]
	fn test_unknown_chain_needs_wrapped_native() {
		let config: EngineConfig = toml::from_str(
			r#"
			[chains.31337]
			rpc_url = "http://localhost:8545"
			"#,
		)
		.unwrap();
		assert!(config.chain_directory().is_err());
	}

	#[test]
	fn test_non_numeric_chain_key_is_rejected() {
		let config: EngineConfig = toml::from_str(
			r#"
			[chains.mainnet]
			rpc_url = "http://localhost:8545"
			"#,
		)
		.unwrap();
		assert!(config.rpc_urls().is_err());
	}
}
