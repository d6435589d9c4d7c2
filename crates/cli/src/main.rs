use anyhow::Result;
use clap::{Parser, Subcommand};
use gateway_api::state::{AppState, FallbackCredentials};
use gateway_brokers_common::BrokerRegistry;
use gateway_brokers_crypto::client::{ExchangeClient, ExchangeConfig};
use gateway_brokers_crypto::CryptoAdapter;
use gateway_brokers_marginfx::{MarginFxAdapter, MarginFxConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "tradegate")]
#[command(about = "Multi-broker trading gateway — one operation set over margin-FX and crypto brokers")]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway HTTP server
    Serve {
        /// Bind address
        #[arg(short, long, default_value = "0.0.0.0:3000")]
        bind: String,

        /// Margin-FX automation terminal entry point (executable script)
        #[arg(long, env = "MARGINFX_TERMINAL")]
        marginfx_terminal: PathBuf,

        /// Margin-FX market data script
        #[arg(long, env = "MARGINFX_MARKET_DATA")]
        marginfx_market_data: PathBuf,

        /// Hard per-call timeout for terminal invocations, in seconds
        #[arg(long, default_value = "30")]
        terminal_timeout_secs: u64,

        /// Exchange REST base URL
        #[arg(long, env = "EXCHANGE_BASE_URL")]
        exchange_base_url: String,

        /// Exchange API key
        #[arg(long, env = "EXCHANGE_API_KEY", hide_env_values = true)]
        exchange_api_key: String,

        /// Exchange API secret
        #[arg(long, env = "EXCHANGE_API_SECRET", hide_env_values = true)]
        exchange_api_secret: String,
    },

    /// List supported brokers
    Brokers,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    fmt().with_env_filter(filter).with_target(false).init();

    match cli.command {
        Commands::Serve {
            bind,
            marginfx_terminal,
            marginfx_market_data,
            terminal_timeout_secs,
            exchange_base_url,
            exchange_api_key,
            exchange_api_secret,
        } => {
            serve(
                bind,
                marginfx_terminal,
                marginfx_market_data,
                terminal_timeout_secs,
                exchange_base_url,
                exchange_api_key,
                exchange_api_secret,
            )
            .await?;
        }
        Commands::Brokers => {
            println!("Supported brokers:");
            println!("  margin_fx        - margin-FX venue via its automation terminal (one subprocess per call)");
            println!("  crypto_exchange  - crypto exchange via the shared REST client");
        }
    }

    Ok(())
}

async fn serve(
    bind: String,
    marginfx_terminal: PathBuf,
    marginfx_market_data: PathBuf,
    terminal_timeout_secs: u64,
    exchange_base_url: String,
    exchange_api_key: String,
    exchange_api_secret: String,
) -> Result<()> {
    // One exchange client for the process lifetime, authenticated here.
    let exchange = ExchangeClient::new(ExchangeConfig::new(
        exchange_base_url,
        exchange_api_key,
        exchange_api_secret,
    ))
    .map_err(|e| anyhow::anyhow!("exchange client init failed: {e}"))?;

    let mut marginfx_config = MarginFxConfig::new(marginfx_terminal, marginfx_market_data);
    marginfx_config.call_timeout = Duration::from_secs(terminal_timeout_secs);
    let marginfx = MarginFxAdapter::new(marginfx_config);

    let registry = BrokerRegistry::new(
        Arc::new(marginfx),
        Arc::new(CryptoAdapter::new(Arc::new(exchange))),
    );
    let state = Arc::new(AppState::new(registry, FallbackCredentials::from_env()));

    tracing::info!("starting trading gateway");
    gateway_api::start_server(state, &bind).await
}
