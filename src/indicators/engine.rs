//! Orchestration for the indicator engine (4.H): wires the pure per-stage
//! functions in this module to the store, the caches, and the batch
//! channel.
//!
//! Every tick runs the stages for one exchange in a fixed order -- base
//! OHLC, then each configured up-level fold, then OBV/MA/RSI for whichever
//! period just closed -- so a later stage can always read the earlier
//! stage's freshly merged cache within the same tick (property 8, cascade
//! ordering).

use crate::batch::BatchSender;
use crate::cache::{EmaSeedCache, LastOhlcCache};
use crate::indicators::{ma, market_depth, obv, ohlc_base, ohlc_uplevel, rsi};
use crate::model::{BatchPoints, Indicator, MarketTable, OrderBook, Point};
use crate::reconstructor::OrderBookTable;
use crate::scheduler;
use crate::store::{PointStore, Query};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

/// One exchange's metrics source: which raw measurement OHLC aggregates
/// trades from, and how far behind the store's write side the source can
/// lag (fed into `Indicator::compute_time_intervals`).
#[derive(Clone)]
pub struct MetricsSource {
    pub exchange: String,
    pub trades_measurement: String,
    pub update_lag: Duration,
}

/// Converts a period into the `<n><unit>` suffix used for per-period
/// measurement names (`ohlc_1m`, `ma_5m`, ...), matching the configuration
/// file's own duration-string convention and picking the coarsest unit that
/// divides the period exactly.
fn period_label(period: Duration) -> String {
    let ms = period.as_millis();
    if ms != 0 && ms % 3_600_000 == 0 {
        format!("{}h", ms / 3_600_000)
    } else if ms != 0 && ms % 60_000 == 0 {
        format!("{}m", ms / 60_000)
    } else if ms != 0 && ms % 1_000 == 0 {
        format!("{}s", ms / 1_000)
    } else {
        format!("{ms}ms")
    }
}

/// Runs the OHLC/OBV/MA/RSI cascade for one exchange forever, aligned to
/// `frequency` (normally equal to the base, shortest configured period).
/// `periods` must be ascending with `periods[0]` the base period that reads
/// directly from the trade tape; every later period folds up from the one
/// before it.
pub async fn run_ohlc_cascade(
    source: MetricsSource,
    periods: Vec<Duration>,
    length_max: usize,
    frequency: Duration,
    store: Arc<dyn PointStore>,
    last_ohlc_cache: Arc<LastOhlcCache>,
    ema_cache: Arc<EmaSeedCache>,
    batch: BatchSender,
) {
    scheduler::run_every(frequency, move |next_run_ns| {
        let source = source.clone();
        let periods = periods.clone();
        let store = Arc::clone(&store);
        let last_ohlc_cache = Arc::clone(&last_ohlc_cache);
        let ema_cache = Arc::clone(&ema_cache);
        let batch = batch.clone();

        async move {
            run_cascade_once(
                &source,
                &periods,
                length_max,
                next_run_ns,
                store.as_ref(),
                &last_ohlc_cache,
                &ema_cache,
                &batch,
            )
            .await;
        }
    })
    .await;
}

async fn run_cascade_once(
    source: &MetricsSource,
    periods: &[Duration],
    length_max: usize,
    next_run_ns: i64,
    store: &dyn PointStore,
    last_ohlc_cache: &LastOhlcCache,
    ema_cache: &EmaSeedCache,
    batch: &BatchSender,
) {
    let Some(&base_period) = periods.first() else { return };

    let mut indicator = Indicator::new(source.exchange.clone(), base_period);
    indicator.next_run_ns = next_run_ns;
    indicator.compute_time_intervals(length_max, source.update_lag);

    if indicator.time_intervals.is_empty() {
        return;
    }
    let period_ns = base_period.as_nanos() as i64;
    let from_ns = indicator.time_intervals[0];

    let query = Query::new(source.trades_measurement.clone(), from_ns, next_run_ns);
    let trades = match store.query(&query).await {
        Ok(rows) => rows,
        Err(err) => {
            error!(error = %err, exchange = %source.exchange, "indicator engine: base trade query failed");
            return;
        }
    };

    let mut imohlc = ohlc_base::aggregate_ohlc_from_trades(&trades, &indicator.time_intervals, period_ns);

    let last_ticks = last_ohlc_cache
        .snapshot(&source.exchange, base_period)
        .and_then(|snapshot| snapshot.get(&(from_ns - period_ns)).cloned())
        .map(|mohlc| mohlc.into_iter().map(|(m, c)| (m, c.close)).collect())
        .unwrap_or_default();
    ohlc_base::gap_fill_ohlc(&mut imohlc, &indicator.time_intervals, last_ticks);

    merge_into_cache(last_ohlc_cache, &source.exchange, base_period, imohlc.clone(), &indicator.time_intervals);

    let closed_interval = *indicator.time_intervals.last().unwrap();
    let Some(closed) = imohlc.get(&closed_interval).cloned() else { return };

    emit_ohlc(batch, &source.exchange, base_period, closed_interval, &closed).await;

    let base_snapshot = last_ohlc_cache.snapshot(&source.exchange, base_period).unwrap_or_default();
    run_derived_stages(
        batch,
        &source.exchange,
        base_period,
        closed_interval,
        &indicator.time_intervals,
        length_max,
        &base_snapshot,
        ema_cache,
    )
    .await;

    // Cascade up through the remaining configured periods: each one folds
    // the period directly below it, only once enough sub-intervals of that
    // lower period have closed to cover its own window exactly.
    let mut lower_period = base_period;
    let mut lower_closed_interval = closed_interval;

    for &up_period in &periods[1..] {
        let up_ns = up_period.as_nanos() as i64;
        let lower_ns = lower_period.as_nanos() as i64;
        let end = lower_closed_interval + lower_ns;
        if up_ns == 0 || end % up_ns != 0 {
            break;
        }

        let up_closed_interval = end - up_ns;
        let ratio = (up_ns / lower_ns).max(1) as usize;
        let lower_snapshot = last_ohlc_cache.snapshot(&source.exchange, lower_period).unwrap_or_default();
        let mut sub_intervals: Vec<i64> = (0..ratio).map(|i| end - (i as i64 + 1) * lower_ns).collect();
        sub_intervals.sort_unstable();

        let folded = ohlc_uplevel::fold_up_level(&lower_snapshot, &sub_intervals, up_closed_interval);
        if folded.is_empty() {
            break;
        }

        let up_time_intervals = crate::model::indicator::compute_time_intervals(
            up_closed_interval + up_ns,
            up_period,
            Duration::ZERO,
            length_max,
        );
        let mut new_rows = HashMap::new();
        new_rows.insert(up_closed_interval, folded.clone());
        merge_into_cache(last_ohlc_cache, &source.exchange, up_period, new_rows, &up_time_intervals);

        emit_ohlc(batch, &source.exchange, up_period, up_closed_interval, &folded).await;

        let up_snapshot = last_ohlc_cache.snapshot(&source.exchange, up_period).unwrap_or_default();
        run_derived_stages(
            batch,
            &source.exchange,
            up_period,
            up_closed_interval,
            &up_time_intervals,
            length_max,
            &up_snapshot,
            ema_cache,
        )
        .await;

        lower_period = up_period;
        lower_closed_interval = up_closed_interval;
    }
}

fn merge_into_cache(
    last_ohlc_cache: &LastOhlcCache,
    exchange: &str,
    period: Duration,
    rows: HashMap<i64, HashMap<String, crate::model::Ohlc>>,
    time_intervals: &[i64],
) {
    if last_ohlc_cache.needs_rebuild(exchange, period, time_intervals.len()) {
        last_ohlc_cache.replace(exchange, period, rows);
    } else {
        last_ohlc_cache.merge_and_trim(exchange, period, rows, time_intervals);
    }
}

async fn emit_ohlc(
    batch: &BatchSender,
    exchange: &str,
    period: Duration,
    closed_interval: i64,
    closed: &HashMap<String, crate::model::Ohlc>,
) {
    let label = period_label(period);
    let measurement = format!("ohlc_{label}");
    let mut points = Vec::with_capacity(closed.len());
    for (market, candle) in closed {
        points.push(
            Point::new(measurement.as_str(), closed_interval)
                .tag("exchange", exchange)
                .tag("market", market.as_str())
                .field("open", candle.open)
                .field("high", candle.high)
                .field("low", candle.low)
                .field("close", candle.close)
                .field("volume", candle.volume)
                .field("quantity", candle.quantity)
                .field("weighted_average", candle.weighted_average)
                .field("change", candle.change)
                .field("change_percent", candle.change_percent),
        );
    }
    let _ = batch.send(BatchPoints::new(measurement.as_str(), points)).await;
}

/// Runs OBV, MA and RSI for one just-closed interval of `period`, reading
/// only from the already-merged Last-OHLC snapshot for that period.
async fn run_derived_stages(
    batch: &BatchSender,
    exchange: &str,
    period: Duration,
    closed_interval: i64,
    time_intervals: &[i64],
    length_max: usize,
    snapshot: &HashMap<i64, HashMap<String, crate::model::Ohlc>>,
    ema_cache: &EmaSeedCache,
) {
    let label = period_label(period);
    let period_ns = period.as_nanos() as i64;

    let imobv = obv::compute_obv(snapshot, &[closed_interval], period_ns);
    if let Some(mobv) = imobv.get(&closed_interval) {
        let measurement = format!("obv_{label}");
        let points: Vec<Point> = mobv
            .iter()
            .map(|(market, value)| {
                Point::new(measurement.as_str(), closed_interval)
                    .tag("exchange", exchange)
                    .tag("market", market.as_str())
                    .field("obv", *value)
            })
            .collect();
        let _ = batch.send(BatchPoints::new(measurement.as_str(), points)).await;
    }

    let imma = ma::compute_ma(snapshot, time_intervals, length_max, period, exchange, ema_cache);
    if let Some(mma) = imma.get(&closed_interval) {
        let measurement = format!("ma_{label}");
        let mut points = Vec::with_capacity(mma.len());
        for (market, point) in mma {
            let mut p = Point::new(measurement.as_str(), closed_interval)
                .tag("exchange", exchange)
                .tag("market", market.as_str());
            for (length, value) in &point.smas {
                p = p.field(format!("sma_{length}"), *value);
            }
            for (length, value) in &point.emas {
                p = p.field(format!("ema_{length}"), *value);
            }
            points.push(p);
        }
        let _ = batch.send(BatchPoints::new(measurement.as_str(), points)).await;
    }

    let imrsi = rsi::compute_rsi(snapshot, time_intervals, length_max);
    if let Some(mrsi) = imrsi.get(&closed_interval) {
        let measurement = format!("rsi_{label}");
        let mut points = Vec::with_capacity(mrsi.len());
        for (market, rsis) in mrsi {
            let mut p = Point::new(measurement.as_str(), closed_interval)
                .tag("exchange", exchange)
                .tag("market", market.as_str());
            for (length, value) in rsis {
                p = p.field(format!("rsi_{length}"), *value);
            }
            points.push(p);
        }
        let _ = batch.send(BatchPoints::new(measurement.as_str(), points)).await;
    }
}

/// Market depth, live variant (4.H, push exchanges): reads the
/// reconstructor's in-memory book directly, no store round-trip.
pub async fn run_market_depth_live(
    exchange: String,
    markets: Arc<MarketTable>,
    books: Arc<OrderBookTable>,
    intervals: Vec<f64>,
    frequency: Duration,
    batch: BatchSender,
) {
    loop {
        let mut points = Vec::new();
        for market in markets.active_markets() {
            if let Some(book) = books.get(&market) {
                push_depth_points(&exchange, &market, &book, &intervals, &mut points);
            }
        }
        if !points.is_empty() {
            let _ = batch.send(BatchPoints::new("marketDepth", points)).await;
        }
        tokio::time::sleep(frequency).await;
    }
}

/// Market depth, pull variant (4.H, pull exchanges): reconstructs the book
/// from the most recent `book_orders` rows the REST ingestor wrote, since
/// there is no live reconstructor to read from.
pub async fn run_market_depth_pull(
    exchange: String,
    markets: Arc<MarketTable>,
    store: Arc<dyn PointStore>,
    intervals: Vec<f64>,
    frequency: Duration,
    batch: BatchSender,
) {
    loop {
        let now_ns = scheduler::now_ns();
        let from_ns = now_ns - 2 * frequency.as_nanos() as i64;
        let mut points = Vec::new();

        for market in markets.active_markets() {
            let query = Query::new("book_orders", from_ns, now_ns).tag("market", market.as_str());
            match store.query(&query).await {
                Ok(rows) => {
                    if let Some(book) = market_depth::order_book_from_rows(&rows) {
                        push_depth_points(&exchange, &market, &book, &intervals, &mut points);
                    }
                }
                Err(err) => error!(error = %err, %market, "indicator engine: market depth query failed"),
            }
        }

        if !points.is_empty() {
            let _ = batch.send(BatchPoints::new("marketDepth", points)).await;
        }
        tokio::time::sleep(frequency).await;
    }
}

fn push_depth_points(exchange: &str, market: &str, book: &OrderBook, intervals: &[f64], points: &mut Vec<Point>) {
    for depth in market_depth::compute_market_depths(book, intervals) {
        points.push(
            Point::new("market_depths", scheduler::now_ns())
                .tag("exchange", exchange)
                .tag("market", market)
                .tag("interval", depth.interval.to_string())
                .field("bid_depth", depth.bid_depth)
                .field("ask_depth", depth.ask_depth),
        );
    }
}
