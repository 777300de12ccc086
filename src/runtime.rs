//! The engine's top-level wiring (4.A overview): one `Runtime` built once
//! at startup from `Config`, holding every piece of shared state an
//! ingestor or indicator stage needs. No global singletons -- everything
//! is an explicit field passed by reference, matching the process
//! interface's single-entry-point contract.

use crate::cache::{EmaSeedCache, LastOhlcCache};
use crate::config::Config;
use crate::exchanges::bittrex::{self as bittrex, BittrexPublicClient};
use crate::exchanges::coinmarketcap::{self as coinmarketcap, CoinMarketCapClient};
use crate::exchanges::poloniex::{self as poloniex, PoloniexPublicClient, PoloniexPushClient};
use crate::indicators::{run_market_depth_live, run_market_depth_pull, run_ohlc_cascade, MetricsSource};
use crate::model::MarketTable;
use crate::reconstructor::{run_hard_refetch, OrderBookTable};
use crate::store::PointStore;
use crate::subscription::SubscriptionTable;
use std::sync::Arc;
use std::time::Duration;

/// Book depth requested from the REST order-book snapshot endpoints.
/// Neither exchange's config block carries this (it's a protocol-level
/// constant, not an operational knob), so it's fixed here the way the
/// teacher fixes its own protocol constants.
const ORDER_BOOK_DEPTH: usize = 50;

pub struct Runtime {
    pub config: Config,
    pub store: Arc<dyn PointStore>,

    pub poloniex_markets: Arc<MarketTable>,
    pub poloniex_books: Arc<OrderBookTable>,
    pub poloniex_subscriptions: Arc<SubscriptionTable>,

    pub bittrex_markets: Arc<MarketTable>,

    pub last_ohlc_cache: Arc<LastOhlcCache>,
    pub ema_cache: Arc<EmaSeedCache>,
}

impl Runtime {
    pub fn new(config: Config, store: Arc<dyn PointStore>) -> Self {
        Self {
            config,
            store,
            poloniex_markets: Arc::new(MarketTable::new()),
            poloniex_books: Arc::new(OrderBookTable::new()),
            poloniex_subscriptions: Arc::new(SubscriptionTable::new()),
            bittrex_markets: Arc::new(MarketTable::new()),
            last_ohlc_cache: Arc::new(LastOhlcCache::new()),
            ema_cache: Arc::new(EmaSeedCache::new()),
        }
    }

    /// Spawns Poloniex's ingestors (push ticks, pulled order books, push
    /// market updates) plus their flusher and subscription-discovery loop.
    pub fn spawn_poloniex(
        &self,
        public: Arc<dyn PoloniexPublicClient>,
        push: Arc<dyn PoloniexPushClient>,
    ) -> Vec<tokio::task::JoinHandle<()>> {
        let cfg = &self.config.ingestion.poloniex;
        let (batch, receiver) = crate::batch::channel(cfg.flush_capacity);
        let mut handles = vec![tokio::spawn(crate::batch::run_flusher(
            receiver,
            Arc::clone(&self.store),
            cfg.flush_period(),
            "poloniex",
        ))];

        handles.push(tokio::spawn(poloniex::ticks::run(
            Arc::clone(&push),
            Arc::clone(&self.poloniex_markets),
            batch.clone(),
        )));

        if let Some(secs) = cfg.order_books_check_period_sec {
            let period = Duration::from_secs(secs);
            handles.push(tokio::spawn(poloniex::orderbook::run(
                Arc::clone(&public),
                ORDER_BOOK_DEPTH,
                period,
                Arc::clone(&self.poloniex_books),
                batch.clone(),
            )));

            handles.push(tokio::spawn(run_hard_refetch(
                Arc::clone(&self.poloniex_markets),
                Arc::clone(&self.store),
                Arc::clone(&self.poloniex_books),
                period,
                self.config.metrics.market_depths.poloniex_hard_fetch_frequency,
            )));
        }

        if let Some(secs) = cfg.missing_trades_check_period_sec {
            handles.push(tokio::spawn(poloniex::reconciler::run(
                Arc::clone(&public),
                Duration::from_secs(secs),
                Arc::clone(&self.poloniex_markets),
                Arc::clone(&self.store),
                batch.clone(),
            )));
        }

        let discovery_period = Duration::from_secs(cfg.market_check_period_min.unwrap_or(10) * 60);
        handles.push(tokio::spawn(poloniex_subscription_loop(
            push,
            Arc::clone(&self.poloniex_markets),
            Arc::clone(&self.poloniex_books),
            Arc::clone(&self.poloniex_subscriptions),
            discovery_period,
            batch.clone(),
        )));

        let depths = &self.config.metrics.market_depths;
        handles.push(tokio::spawn(run_market_depth_live(
            "poloniex".to_string(),
            Arc::clone(&self.poloniex_markets),
            Arc::clone(&self.poloniex_books),
            depths.intervals.clone(),
            depths.frequency,
            batch,
        )));

        handles
    }

    /// Spawns Bittrex's ingestors (market summaries, order books, market
    /// history) plus their flusher.
    pub fn spawn_bittrex(&self, public: Arc<dyn BittrexPublicClient>) -> Vec<tokio::task::JoinHandle<()>> {
        let cfg = &self.config.ingestion.bittrex;
        let (batch, receiver) = crate::batch::channel(cfg.flush_capacity);
        let mut handles = vec![tokio::spawn(crate::batch::run_flusher(
            receiver,
            Arc::clone(&self.store),
            cfg.flush_period(),
            "bittrex",
        ))];

        handles.push(tokio::spawn(bittrex::marketsummary::run(
            Arc::clone(&public),
            Duration::from_secs(cfg.public_ticks_check_period_sec.unwrap_or(30)),
            Arc::clone(&self.bittrex_markets),
            batch.clone(),
        )));

        if let Some(secs) = cfg.order_books_check_period_sec {
            handles.push(tokio::spawn(bittrex::orderbook::run(
                Arc::clone(&public),
                Duration::from_secs(secs),
                Arc::clone(&self.bittrex_markets),
                batch.clone(),
            )));
        }

        if let Some(secs) = cfg.market_history_check_period_sec {
            handles.push(tokio::spawn(bittrex::markethistory::run(
                public,
                Duration::from_secs(secs),
                Arc::clone(&self.bittrex_markets),
                batch.clone(),
            )));
        }

        let depths = &self.config.metrics.market_depths;
        handles.push(tokio::spawn(run_market_depth_pull(
            "bittrex".to_string(),
            Arc::clone(&self.bittrex_markets),
            Arc::clone(&self.store),
            depths.intervals.clone(),
            depths.frequency,
            batch,
        )));

        handles
    }

    /// Spawns Coinmarketcap's two independent pulls plus their flusher.
    pub fn spawn_coinmarketcap(&self, client: Arc<dyn CoinMarketCapClient>) -> Vec<tokio::task::JoinHandle<()>> {
        let cfg = &self.config.ingestion.coinmarketcap;
        let (batch, receiver) = crate::batch::channel(cfg.flush_capacity);
        let mut handles = vec![tokio::spawn(crate::batch::run_flusher(
            receiver,
            Arc::clone(&self.store),
            cfg.flush_period(),
            "coinmarketcap",
        ))];

        let tick_period = Duration::from_secs(cfg.public_ticks_check_period_sec.unwrap_or(300));
        handles.push(tokio::spawn(coinmarketcap::ticker::run(
            Arc::clone(&client),
            tick_period,
            batch.clone(),
        )));

        handles.push(tokio::spawn(coinmarketcap::globaldata::run(client, tick_period * 2, batch)));

        handles
    }

    /// Spawns the indicator engine: one OHLC/OBV/MA/RSI cascade per
    /// configured source, ticking at `metrics.frequency` and folding up
    /// through every configured OHLC period each time the base period closes.
    pub fn spawn_indicator_engine(&self) -> Vec<tokio::task::JoinHandle<()>> {
        let metrics = &self.config.metrics;
        let (batch, receiver) = crate::batch::channel(metrics.flush_capacity);
        let mut handles = vec![tokio::spawn(crate::batch::run_flusher(
            receiver,
            Arc::clone(&self.store),
            metrics.flush_period(),
            "metrics",
        ))];

        if metrics.ohlc_periods.is_empty() {
            return handles;
        }

        for (exchange, source_cfg) in &metrics.sources {
            let source = MetricsSource {
                exchange: exchange.clone(),
                trades_measurement: source_cfg
                    .schema
                    .get("trades_measurement")
                    .cloned()
                    .unwrap_or_else(|| "trades".to_string()),
                update_lag: source_cfg.update_lag,
            };

            handles.push(tokio::spawn(run_ohlc_cascade(
                source,
                metrics.ohlc_periods.clone(),
                metrics.length_max,
                metrics.frequency,
                Arc::clone(&self.store),
                Arc::clone(&self.last_ohlc_cache),
                Arc::clone(&self.ema_cache),
                batch.clone(),
            )));
        }

        handles
    }
}

/// Re-derives the subscribed-market set from `markets` every `period` and
/// opens a push worker for any market discovered since the last tick
/// (subscription manager invariant: at most one worker per market).
async fn poloniex_subscription_loop(
    push_client: Arc<dyn PoloniexPushClient>,
    markets: Arc<MarketTable>,
    books: Arc<OrderBookTable>,
    subscriptions: Arc<SubscriptionTable>,
    period: Duration,
    batch: crate::batch::BatchSender,
) {
    loop {
        let active = markets.active_markets();
        poloniex::market::discover_and_subscribe(
            Arc::clone(&push_client),
            &active,
            subscriptions.as_ref(),
            Arc::clone(&books),
            batch.clone(),
        )
        .await;
        tokio::time::sleep(period).await;
    }
}
