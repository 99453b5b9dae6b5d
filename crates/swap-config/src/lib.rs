//! Engine configuration loading.
//!
//! The configuration is a TOML file. `${VAR}` placeholders are replaced with
//! environment variables before parsing, a few `SWAP_`-prefixed variables
//! override parsed values, and the result is validated before use.

use regex::Regex;
use std::env;
use std::path::Path;
use std::str::FromStr;
use swap_storage::StorageSchema;
use swap_types::{Amount, ConfigSchema};
use thiserror::Error;
use tracing::debug;

pub mod types;

pub use types::{ChainConfig, EngineConfig, EngineSettings, PermitConfig, SwapConfig};

#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("File not found: {0}")]
	FileNotFound(String),

	#[error("Parse error: {0}")]
	ParseError(String),

	#[error("Validation error: {0}")]
	ValidationError(String),

	#[error("Environment variable not found: {0}")]
	EnvVarNotFound(String),

	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),
}

/// Configuration loader with environment variable substitution
pub struct ConfigLoader {
	file_path: Option<String>,
	env_prefix: String,
}

impl Default for ConfigLoader {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigLoader {
	pub fn new() -> Self {
		Self {
			file_path: None,
			env_prefix: "SWAP_".to_string(),
		}
	}

	pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
		self.file_path = Some(path.as_ref().to_string_lossy().to_string());
		self
	}

	pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.env_prefix = prefix.into();
		self
	}

	pub async fn load(&self) -> Result<EngineConfig, ConfigError> {
		let Some(file_path) = &self.file_path else {
			return Err(ConfigError::FileNotFound(
				"No configuration file specified".to_string(),
			));
		};
		let mut config = self.load_from_file(file_path).await?;

		self.apply_env_overrides(&mut config)?;
		validate_config(&config)?;

		debug!(path = %file_path, chains = config.chains.len(), "Configuration loaded");
		Ok(config)
	}

	async fn load_from_file(&self, file_path: &str) -> Result<EngineConfig, ConfigError> {
		let content = tokio::fs::read_to_string(file_path).await.map_err(|e| {
			if e.kind() == std::io::ErrorKind::NotFound {
				ConfigError::FileNotFound(file_path.to_string())
			} else {
				ConfigError::IoError(e)
			}
		})?;

		let substituted = substitute_env_vars(&content)?;

		toml::from_str(&substituted).map_err(|e| ConfigError::ParseError(e.to_string()))
	}

	fn apply_env_overrides(&self, config: &mut EngineConfig) -> Result<(), ConfigError> {
		if let Ok(log_level) = env::var(format!("{}LOG_LEVEL", self.env_prefix)) {
			config.engine.log_level = log_level;
		}

		if let Ok(slippage) = env::var(format!("{}SLIPPAGE_PERCENT", self.env_prefix)) {
			let slippage = Amount::from_str(&slippage).map_err(|e| {
				ConfigError::ValidationError(format!("Invalid slippage percent: {}", e))
			})?;
			config.swap.slippage_percent = Some(slippage);
		}

		if let Ok(path) = env::var(format!("{}STORAGE_PATH", self.env_prefix)) {
			let table = config.storage.as_table_mut().ok_or_else(|| {
				ConfigError::ValidationError("[storage] must be a table".to_string())
			})?;
			table.insert("backend".to_string(), toml::Value::String("file".to_string()));
			table.insert("path".to_string(), toml::Value::String(path));
		}

		Ok(())
	}
}

/// Replaces every `${VAR_NAME}` with the variable's value.
fn substitute_env_vars(content: &str) -> Result<String, ConfigError> {
	let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ConfigError::ParseError(e.to_string()))?;

	let mut result = content.to_string();
	for cap in re.captures_iter(content) {
		let var_name = &cap[1];
		let value =
			env::var(var_name).map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
		result = result.replace(&cap[0], &value);
	}
	Ok(result)
}

fn validate_config(config: &EngineConfig) -> Result<(), ConfigError> {
	let invalid = |message: String| ConfigError::ValidationError(message);

	if config.engine.event_bus_capacity == 0 {
		return Err(invalid("Event bus capacity must be positive".to_string()));
	}

	StorageSchema
		.validate(&config.storage)
		.map_err(|e| invalid(format!("[storage] {}", e)))?;

	if let Some(slippage) = &config.swap.slippage_percent {
		if *slippage <= Amount::zero() || *slippage > Amount::from(50u64) {
			return Err(invalid(format!(
				"Slippage percent must be in (0, 50], got {}",
				slippage
			)));
		}
	}

	let bps = config.permit.approval_confirmation_bps;
	if bps == 0 || bps > 10_000 {
		return Err(invalid(format!(
			"Approval confirmation must be in (0, 10000] basis points, got {}",
			bps
		)));
	}

	let intervals = [
		("swap.reveal_poll_interval_seconds", config.swap.reveal_poll_interval_seconds),
		("swap.status_poll_interval_seconds", config.swap.status_poll_interval_seconds),
		("swap.order_ttl_seconds", config.swap.order_ttl_seconds),
		("permit.signature_deadline_seconds", config.permit.signature_deadline_seconds),
		("permit.permit_expiration_seconds", config.permit.permit_expiration_seconds),
	];
	if let Some((name, _)) = intervals.iter().find(|(_, value)| *value == 0) {
		return Err(invalid(format!("{} must be positive", name)));
	}

	let entries = config.chain_entries().map_err(invalid)?;
	if entries.is_empty() {
		return Err(invalid("At least one chain must be configured".to_string()));
	}
	if let Some((id, _)) = entries.iter().find(|(_, chain)| chain.rpc_url.trim().is_empty()) {
		return Err(invalid(format!("Chain {} has no rpc_url", id)));
	}
	config.chain_directory().map_err(invalid)?;

	Ok(())
}
