//! Process entry point (6. process interface): load configuration, start
//! logging, build the `Runtime`, spawn every ingestor and the indicator
//! engine, then block until one of them exits.
//!
//! The concrete Poloniex/Bittrex/CoinMarketCap REST and WebSocket clients,
//! and the InfluxDB-backed `PointStore`, are external collaborators this
//! crate does not implement (see DESIGN.md) -- this binary wires what it
//! owns (config, store abstraction, indicator engine) and leaves collaborator
//! construction to the deployment that supplies them.

use anyhow::{Context, Result};
use clap::Parser;
use marketdata_ingest::config::Config;
use marketdata_ingest::runtime::Runtime;
use marketdata_ingest::store::memory::MemoryStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Cryptocurrency market-data ingestion and derived-metrics engine.
#[derive(Parser, Debug)]
#[command(name = "marketdata-ingest")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, default_value = "conf.json", env = "MARKETDATA_CONFIG")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv::dotenv();
    let cli = Cli::parse();

    let config = Config::load_from_file(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;

    init_tracing(&config);
    info!(path = %cli.config.display(), "configuration loaded");

    // No concrete `PointStore` backend is wired in; a real deployment
    // supplies one that talks to `config.ingestion.influxdb`. `MemoryStore`
    // keeps the engine runnable end-to-end until that backend is plugged in.
    let store: Arc<dyn marketdata_ingest::store::PointStore> = Arc::new(MemoryStore::new());

    let runtime = Runtime::new(config, store);

    let mut handles = runtime.spawn_indicator_engine();
    info!(
        tasks = handles.len(),
        "indicator engine started; exchange ingestors await collaborator clients"
    );

    // Poloniex/Bittrex/CoinMarketCap ingestors start the same way, once a
    // deployment hands this binary concrete clients:
    //   handles.extend(runtime.spawn_poloniex(public, push));
    //   handles.extend(runtime.spawn_bittrex(public));
    //   handles.extend(runtime.spawn_coinmarketcap(client));

    for handle in handles.drain(..) {
        if let Err(join_err) = handle.await {
            tracing::error!(error = %join_err, "a background task panicked");
        }
    }

    Ok(())
}

fn init_tracing(config: &Config) {
    let default_filter = format!(
        "marketdata_ingest={}",
        config.ingestion.log_level.as_tracing_filter()
    );
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
