//! Swap executor CLI
//!
//! Quotes and executes single-pool Uniswap V3 swaps from the command line.

use alloy::primitives::aliases::U160;
use alloy::primitives::utils::{parse_units, ParseUnits};
use alloy::primitives::{Address, U256};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uniswap_swap_executor::audit::AuditLog;
use uniswap_swap_executor::quote::QuoteService;
use uniswap_swap_executor::rpc::ProviderClient;
use uniswap_swap_executor::tokens::registry;
use uniswap_swap_executor::wallet::{CredentialProvider, EnvCredentials};
use uniswap_swap_executor::{
    Config, Error, ExecutionContext, Network, PipelineSettings, Result, RpcConfig, SwapPipeline,
    SwapRequest,
};

#[derive(Parser)]
#[command(name = "swap-exec")]
#[command(about = "Quote and execute single-pool Uniswap V3 swaps")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Network override (ethereum, arbitrum, optimism, polygon)
    #[arg(short, long, global = true)]
    network: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Args, Clone)]
struct PairArgs {
    /// Input token address or symbol (e.g. DAI)
    #[arg(long)]
    token_in: String,

    /// Output token address or symbol
    #[arg(long)]
    token_out: String,

    /// Pool fee tier in hundredths of a bip (500, 3000, 10000)
    #[arg(long, default_value_t = 3000)]
    fee: u32,

    /// Amount of token_in, in token units ("1.5") unless --raw
    #[arg(long)]
    amount: String,

    /// Treat --amount as an integer in the token's smallest unit
    #[arg(long)]
    raw: bool,

    /// Decimals of token_in, for tokens not in the built-in registry
    #[arg(long)]
    decimals: Option<u8>,

    /// sqrtPriceLimitX96; 0 or absent means no limit
    #[arg(long)]
    price_limit: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Quote a swap without signing anything
    Quote {
        #[command(flatten)]
        pair: PairArgs,
    },

    /// Quote, sign, broadcast and wait for the receipt
    Swap {
        #[command(flatten)]
        pair: PairArgs,

        /// Slippage tolerance as a fraction (0.005 = 0.5%)
        #[arg(long, default_value_t = 0.005)]
        slippage: f64,

        /// Recipient of token_out (defaults to the signing account)
        #[arg(long)]
        recipient: Option<String>,

        /// Stop after building parameters; nothing is signed or sent
        #[arg(long)]
        dry_run: bool,
    },

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (ignore if not found)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    if cli.json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(network) = &cli.network {
        config.network = network.parse::<Network>()?;
    }
    let rpc = RpcConfig::from_env();

    match cli.command {
        Commands::Quote { pair } => run_quote(&config, &rpc, pair).await,
        Commands::Swap {
            pair,
            slippage,
            recipient,
            dry_run,
        } => run_swap(&config, &rpc, pair, slippage, recipient, dry_run).await,
        Commands::Config => print_json(&config.redacted()),
    }
}

async fn run_quote(config: &Config, rpc: &RpcConfig, pair: PairArgs) -> Result<()> {
    let request = build_request(config, &pair, 0.0, None)?;
    let endpoints = config.resolve_endpoints(rpc)?;
    let client = ProviderClient::connect(&endpoints.quote)
        .map_err(|e| Error::Config(format!("quote endpoint: {}", e)))?;

    tracing::info!(
        network = %config.network,
        host = client.host(),
        token_in = %request.token_in,
        token_out = %request.token_out,
        amount_in = %request.amount_in,
        "Requesting quote"
    );

    let quote = QuoteService::new(Arc::new(client), config.contracts().quoter)
        .quote(
            request.token_in,
            request.token_out,
            request.fee_tier,
            request.amount_in,
            request.effective_price_limit(),
        )
        .await?;

    print_json(&quote)
}

async fn run_swap(
    config: &Config,
    rpc: &RpcConfig,
    pair: PairArgs,
    slippage: f64,
    recipient: Option<String>,
    dry_run: bool,
) -> Result<()> {
    let recipient = recipient
        .map(|r| {
            r.parse::<Address>()
                .map_err(|_| Error::Config(format!("invalid recipient address: {}", r)))
        })
        .transpose()?;
    let request = build_request(config, &pair, slippage, recipient)?;

    let credentials = EnvCredentials::new(&config.credential_env)?;
    tracing::info!(
        account = %credentials.address(),
        network = %config.network,
        dry_run,
        "Starting swap"
    );

    let context = ExecutionContext::connect(config, rpc, Arc::new(credentials)).await?;
    let mut pipeline = SwapPipeline::new(context, PipelineSettings::from_config(config));
    if let Some(path) = &config.audit_log_path {
        let audit = AuditLog::new(path);
        tracing::info!(path = %path, "Writing audit trail");
        pipeline = pipeline.with_audit(audit);
    }

    if dry_run {
        let plan = pipeline.plan(&request).await?;
        return print_json(&serde_json::json!({
            "quote": plan.quote,
            "parameters": plan.parameters,
            "simulation": plan.simulation,
        }));
    }

    match pipeline.execute(&request).await {
        Ok(receipt) => print_json(&receipt),
        Err(err) => {
            if let Some(tx_hash) = err.transaction_id() {
                tracing::warn!(
                    %tx_hash,
                    "Outcome unknown; check the transaction before retrying. Do not resubmit."
                );
            } else if err.safe_to_retry_with_fresh_parameters() {
                tracing::info!("Nothing was executed; the swap can be retried");
            }
            Err(err)
        }
    }
}

fn build_request(
    config: &Config,
    pair: &PairArgs,
    slippage: f64,
    recipient: Option<Address>,
) -> Result<SwapRequest> {
    let chain_id = config.chain_id();
    let token_in = resolve_token(chain_id, &pair.token_in)?;
    let token_out = resolve_token(chain_id, &pair.token_out)?;
    let amount_in = parse_amount(&token_in, &pair.amount, pair.raw, pair.decimals)?;

    let mut request = SwapRequest::new(token_in, token_out, pair.fee, amount_in, slippage);
    if let Some(limit) = &pair.price_limit {
        let limit = limit
            .parse::<U160>()
            .map_err(|_| Error::Config(format!("invalid price limit: {}", limit)))?;
        request = request.with_price_limit(limit);
    }
    if let Some(recipient) = recipient {
        request = request.with_recipient(recipient);
    }
    Ok(request)
}

fn resolve_token(chain_id: u64, token: &str) -> Result<Address> {
    registry()
        .resolve(chain_id, token)
        .ok_or_else(|| Error::Config(format!("unknown token {} on chain {}", token, chain_id)))
}

fn parse_amount(token: &Address, amount: &str, raw: bool, decimals: Option<u8>) -> Result<U256> {
    let invalid = || Error::Config(format!("invalid amount: {}", amount));

    if raw {
        return amount.parse::<U256>().map_err(|_| invalid());
    }
    match decimals {
        Some(decimals) => match parse_units(amount, decimals).map_err(|_| invalid())? {
            ParseUnits::U256(value) => Ok(value),
            ParseUnits::I256(_) => Err(invalid()),
        },
        None => registry().to_base_units(token, amount).ok_or_else(|| {
            Error::Config(format!(
                "cannot scale {} for {}; pass --decimals or --raw",
                amount, token
            ))
        }),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|e| Error::Config(format!("cannot render output: {}", e)))?;
    println!("{}", rendered);
    Ok(())
}
