use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use swap_chain::implementations::rpc::RpcChainClient;
use swap_config::{ConfigLoader, EngineConfig};
use swap_storage::{create_storage, StorageOrderRepository, StorageService};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod orders;

#[derive(Parser)]
#[command(name = "swap-engine")]
#[command(about = "Swap execution engine tools", long_about = None)]
struct Cli {
	#[command(subcommand)]
	command: Commands,

	#[arg(short, long, value_name = "FILE", default_value = "config/local.toml")]
	config: PathBuf,

	#[arg(long, env = "SWAP_LOG_LEVEL", default_value = "info")]
	log_level: String,
}

#[derive(Subcommand)]
enum Commands {
	/// Validate the configuration file
	Validate,
	/// Inspect persisted order records
	Order {
		#[command(subcommand)]
		action: OrderAction,
	},
}

#[derive(Subcommand)]
enum OrderAction {
	/// Print an order record and its reveal outcome
	Show { hash: String },
	/// Delete an order record
	Delete { hash: String },
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	setup_tracing(&cli.log_level)?;

	match &cli.command {
		Commands::Validate => validate_config(&cli).await,
		Commands::Order { action } => order_command(&cli, action).await,
	}
}

async fn load_config(cli: &Cli) -> Result<EngineConfig> {
	info!("Loading configuration from: {:?}", cli.config);
	ConfigLoader::new()
		.with_file(&cli.config)
		.load()
		.await
		.context("Failed to load configuration")
}

async fn validate_config(cli: &Cli) -> Result<()> {
	let config = load_config(cli).await?;

	let entries = config.chain_entries().map_err(anyhow::Error::msg)?;
	let rpc_urls = config.rpc_urls().map_err(anyhow::Error::msg)?;
	RpcChainClient::new(&rpc_urls).context("Failed to set up RPC providers")?;
	let directory = config.chain_directory().map_err(anyhow::Error::msg)?;

	info!("Configuration is valid");
	info!("Log level: {}", config.engine.log_level);
	match &config.swap.slippage_percent {
		Some(slippage) => info!("Custom slippage: {}%", slippage),
		None => info!("Custom slippage: venue preset"),
	}
	info!("Configured chains:");
	for (chain_id, _) in entries {
		if let Some(contracts) = directory.get(chain_id) {
			info!(
				"  {} ({}): permit2 {}, router {}, wrapped native {}",
				chain_id,
				contracts.native_symbol,
				contracts.permit2,
				contracts.router,
				contracts.wrapped_native
			);
		}
	}

	Ok(())
}

async fn order_command(cli: &Cli, action: &OrderAction) -> Result<()> {
	let config = load_config(cli).await?;
	if config.storage.get("backend").and_then(|v| v.as_str()) != Some("file") {
		bail!("Order records are only kept across runs with the file storage backend");
	}

	let backend = create_storage(&config.storage).context("Failed to create storage")?;
	let repository = StorageOrderRepository::new(Arc::new(StorageService::new(backend)))
		.with_ttl(config.swap.order_ttl());

	match action {
		OrderAction::Show { hash } => {
			let hash = orders::parse_hash(hash)?;
			match orders::order_report(&repository, &hash).await? {
				Some(report) => {
					println!("{}", serde_json::to_string_pretty(&report)?);
				}
				None => bail!("Order {} not found", hash),
			}
		}
		OrderAction::Delete { hash } => {
			let hash = orders::parse_hash(hash)?;
			if !orders::delete_order(&repository, &hash).await? {
				bail!("Order {} not found", hash);
			}
		}
	}
	Ok(())
}

fn setup_tracing(log_level: &str) -> Result<()> {
	let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

	tracing_subscriber::registry()
		.with(env_filter)
		.with(tracing_subscriber::fmt::layer())
		.init();

	Ok(())
}
