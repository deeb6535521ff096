use anyhow::{bail, Context};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use swap_api_client::{
    PriceApi, SwapApiClient, SwapRequest, SwapResponse, TokenPriceResponse, TransportError,
};
use swap_engine::amount::format_currency;
use swap_engine::catalog::{PriceCatalog, PriceMap};
use swap_engine::config::EngineConfig;
use swap_engine::log;
use swap_engine::logs::{DEBUG, INFO};
use swap_engine::session::TradingSession;
use swap_engine::stream::{PriceStream, QuoteCache};
use swap_engine::swap::progress::PROGRESS_MAX;

// Latency of the simulated backend execution.
const SIMULATED_SWAP_LATENCY: Duration = Duration::from_secs(2);

#[derive(Parser)]
#[command(name = "swap_engine")]
#[command(about = "Quote and submit currency swaps against the price and swap endpoints")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// YAML configuration file. Defaults to $SWAP_CONFIG, then built-in values
    #[arg(long)]
    config: Option<PathBuf>,

    /// REST base URL, overriding the configuration
    #[arg(long)]
    api_base_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the latest price per currency
    Prices,

    /// Show the rate, the derived amount and the review of a trade
    Quote {
        #[command(flatten)]
        trade: TradeArgs,
    },

    /// Submit a trade through the confirmation flow
    Swap {
        #[command(flatten)]
        trade: TradeArgs,

        /// Confirm without prompting
        #[arg(long)]
        yes: bool,

        /// Execute against a local stand-in that always succeeds
        #[arg(long)]
        simulate: bool,
    },

    /// Follow pushed price updates until interrupted
    Watch {
        /// WebSocket URL, overriding the configuration
        #[arg(long)]
        stream_url: Option<String>,
    },
}

#[derive(clap::Args)]
struct TradeArgs {
    /// Currency to pay with. Defaults to the configured pair
    #[arg(long)]
    from: Option<String>,

    /// Currency to receive. Defaults to the configured pair
    #[arg(long)]
    to: Option<String>,

    /// Amount of the `from` currency
    #[arg(long)]
    amount: String,
}

/// Serves real prices but answers every swap with success.
struct SimulatedExecution {
    prices: Arc<dyn PriceApi>,
}

#[async_trait]
impl PriceApi for SimulatedExecution {
    async fn get_prices(&self) -> Result<Vec<TokenPriceResponse>, TransportError> {
        self.prices.get_prices().await
    }

    async fn swap(&self, request: SwapRequest) -> Result<SwapResponse, TransportError> {
        log!(INFO, "[swap]: Simulating execution of {request:?}");
        tokio::time::sleep(SIMULATED_SWAP_LATENCY).await;
        Ok(SwapResponse { success: true })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_yaml_file(path)?,
        None => EngineConfig::from_env()?,
    };
    if let Some(url) = cli.api_base_url {
        config.api_base_url = url;
    }
    config.validate().context("invalid configuration")?;

    let client = SwapApiClient::builder(&config.api_base_url, DEBUG)
        .with_timeout(config.request_timeout())
        .build()?;
    let api: Arc<dyn PriceApi> = Arc::new(client);

    match cli.command {
        Commands::Prices => {
            let catalog = PriceCatalog::new(api);
            let prices = catalog.prices().await?;
            print_prices(&prices);
        }
        Commands::Quote { trade } => {
            let mut session = prepare_session(api, &config, &trade).await?;
            match session.submit() {
                Ok(preview) => {
                    println!("{preview}");
                    session.cancel()?;
                }
                Err(e) => println!("Cannot submit: {e}"),
            }
        }
        Commands::Swap {
            trade,
            yes,
            simulate,
        } => {
            let api: Arc<dyn PriceApi> = if simulate {
                Arc::new(SimulatedExecution { prices: api })
            } else {
                api
            };
            let mut session = prepare_session(api, &config, &trade).await?;
            println!("{}", session.submit()?);
            if !yes && !ask_confirmation()? {
                session.cancel()?;
                println!("Cancelled");
                return Ok(());
            }
            execute(&mut session).await?;
        }
        Commands::Watch { stream_url } => {
            let Some(url) = stream_url.or(config.stream_url.clone()) else {
                bail!("no stream URL: pass --stream-url or set SWAP_STREAM_URL");
            };
            watch(api, &url, &config).await?;
        }
    }
    Ok(())
}

async fn prepare_session(
    api: Arc<dyn PriceApi>,
    config: &EngineConfig,
    trade: &TradeArgs,
) -> anyhow::Result<TradingSession> {
    let catalog = PriceCatalog::new(api.clone());
    let mut session = TradingSession::new(api, catalog, config);
    let prices = session.load().await?;

    if let Some(from) = &trade.from {
        ensure_listed(&prices, from)?;
        session.select_from_token(from);
    }
    if let Some(to) = &trade.to {
        ensure_listed(&prices, to)?;
        session.select_to_token(to);
    }
    let outcome = session.edit_from_amount(&trade.amount)?;

    let form = session.form();
    println!("{}", session.exchange_rate_label());
    println!(
        "Available:   {} {}",
        format_currency(form.available_amount(), ""),
        form.from().token
    );
    println!(
        "You pay:     {} {}",
        form.from()
            .amount
            .map_or_else(|| "-".to_string(), |amount| format_currency(amount, "")),
        form.from().token
    );
    println!(
        "You receive: {} {}",
        form.to()
            .amount
            .map_or_else(|| "-".to_string(), |amount| format_currency(amount, "")),
        form.to().token
    );
    for (path, issue) in outcome.iter() {
        println!("  {path}: {issue}");
    }
    Ok(session)
}

fn ensure_listed(prices: &PriceMap, currency: &str) -> anyhow::Result<()> {
    if !prices.contains_key(currency) {
        let listed: Vec<&str> = prices.keys().map(String::as_str).collect();
        bail!("unknown currency {currency}, expected one of {}", listed.join(", "));
    }
    Ok(())
}

fn ask_confirmation() -> anyhow::Result<bool> {
    print!("Confirm swap? [y/N] ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

async fn execute(session: &mut TradingSession) -> anyhow::Result<()> {
    let mut progress = session.progress().subscribe();
    let printer = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let value = *progress.borrow_and_update();
            eprint!(
                "\r[{:<width$}]",
                "#".repeat(value as usize),
                width = PROGRESS_MAX as usize
            );
        }
    });
    let result = session.confirm().await;
    printer.abort();
    eprintln!();

    let snapshot = result?;
    for notification in session.drain_notifications() {
        println!("{notification}");
    }
    log!(
        DEBUG,
        "[swap]: Executed {} {} at {}",
        snapshot.from_amount,
        snapshot.from_token,
        snapshot.exchange_rate
    );
    Ok(())
}

async fn watch(api: Arc<dyn PriceApi>, url: &str, config: &EngineConfig) -> anyhow::Result<()> {
    let catalog = PriceCatalog::new(api);
    let mut seen = catalog.fetch().await?;
    print_prices(&seen);

    let mut updates = catalog.subscribe();
    let stream = PriceStream::spawn(
        url,
        catalog.clone(),
        QuoteCache::default(),
        config.reconnect_delay(),
    )?;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let Some(prices) = updates.borrow_and_update().prices.clone() else {
                    continue;
                };
                for (currency, token) in prices.iter() {
                    let moved = seen
                        .get(currency)
                        .map_or(true, |previous| previous.price != token.price);
                    if moved {
                        println!("{currency:<8} {:>20}", format_currency(token.price, ""));
                    }
                }
                seen = prices;
            }
        }
    }
    stream.shutdown().await;
    Ok(())
}

fn print_prices(prices: &PriceMap) {
    for token in prices.values() {
        println!(
            "{:<8} {:>20}  {}",
            token.currency,
            format_currency(token.price, ""),
            token.as_of
        );
    }
}
