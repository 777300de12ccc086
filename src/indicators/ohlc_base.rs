//! Base OHLC (4.H.i): aggregates the raw trade tape into one candle per
//! (market, interval), then gap-fills markets with no trades from the most
//! recent tick.

use crate::model::Ohlc;
use crate::store::QueryRow;
use std::collections::HashMap;

/// Buckets trade rows by the aligned interval they fall in and folds each
/// bucket into an `Ohlc`. Every interval in `time_intervals` gets an entry
/// (possibly empty), matching the source query's `GROUP BY time(period)`
/// producing one row per bucket even when a bucket is later gap-filled.
pub fn aggregate_ohlc_from_trades(
    trades: &[QueryRow],
    time_intervals: &[i64],
    period_ns: i64,
) -> HashMap<i64, HashMap<String, Ohlc>> {
    let mut imohlc: HashMap<i64, HashMap<String, Ohlc>> =
        time_intervals.iter().map(|&i| (i, HashMap::new())).collect();

    let mut buckets: HashMap<(i64, String), Vec<&QueryRow>> = HashMap::new();
    for row in trades {
        let Some(market) = row.tags.get("market") else { continue };
        let bucket = row.timestamp_ns - row.timestamp_ns.rem_euclid(period_ns);
        buckets
            .entry((bucket, market.clone()))
            .or_default()
            .push(row);
    }

    for ((bucket, market), mut rows) in buckets {
        if !imohlc.contains_key(&bucket) {
            continue;
        }
        rows.sort_by_key(|r| r.timestamp_ns);

        let rate = |r: &QueryRow| r.fields.get("rate").and_then(|f| f.as_f64()).unwrap_or(0.0);
        let quantity = |r: &QueryRow| r.fields.get("quantity").and_then(|f| f.as_f64()).unwrap_or(0.0);
        let total = |r: &QueryRow| r.fields.get("total").and_then(|f| f.as_f64()).unwrap_or(0.0);

        let open = rate(rows[0]);
        let close = rate(rows[rows.len() - 1]);
        let high = rows.iter().map(|r| rate(r)).fold(f64::NEG_INFINITY, f64::max);
        let low = rows.iter().map(|r| rate(r)).fold(f64::INFINITY, f64::min);
        let volume: f64 = rows.iter().map(|r| total(r)).sum();
        let qty: f64 = rows.iter().map(|r| quantity(r)).sum();

        imohlc
            .get_mut(&bucket)
            .unwrap()
            .insert(market, Ohlc::from_trade_aggregate(volume, qty, open, high, low, close));
    }

    imohlc
}

/// Fills markets with no trade activity in an interval from the most
/// recently known tick, carrying the synthesized close forward so a run of
/// silent intervals stays flat instead of reverting to a stale price
/// (property 9).
pub fn gap_fill_ohlc(
    imohlc: &mut HashMap<i64, HashMap<String, Ohlc>>,
    time_intervals: &[i64],
    mut last_ticks: HashMap<String, f64>,
) {
    let mut sorted = time_intervals.to_vec();
    sorted.sort_unstable();

    for interval in sorted {
        let mohlc = imohlc.entry(interval).or_insert_with(HashMap::new);
        for (market, last) in last_ticks.iter_mut() {
            match mohlc.get(market) {
                Some(existing) => *last = existing.close,
                None => {
                    mohlc.insert(market.clone(), Ohlc::flat_from_last(*last));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldValue;

    fn trade_row(market: &str, rate: f64, quantity: f64, ts: i64) -> QueryRow {
        QueryRow {
            tags: HashMap::from([("market".to_string(), market.to_string())]),
            fields: HashMap::from([
                ("rate".to_string(), FieldValue::Float(rate)),
                ("quantity".to_string(), FieldValue::Float(quantity)),
                ("total".to_string(), FieldValue::Float(rate * quantity)),
            ]),
            timestamp_ns: ts,
        }
    }

    #[test]
    fn aggregates_a_single_bucket() {
        let period_ns = 60_000_000_000i64;
        let trades = vec![
            trade_row("BTC_ETH", 10.0, 1.0, 5_000_000_000),
            trade_row("BTC_ETH", 12.0, 1.0, 30_000_000_000),
            trade_row("BTC_ETH", 11.0, 1.0, 55_000_000_000),
        ];
        let imohlc = aggregate_ohlc_from_trades(&trades, &[0], period_ns);
        let candle = imohlc[&0]["BTC_ETH"];
        assert_eq!(candle.open, 10.0);
        assert_eq!(candle.close, 11.0);
        assert_eq!(candle.high, 12.0);
        assert_eq!(candle.low, 10.0);
        assert_eq!(candle.volume, 33.0);
    }

    #[test]
    fn property_9_gap_fill_from_last_tick() {
        let period_ns = 60_000_000_000i64;
        let mut imohlc = aggregate_ohlc_from_trades(&[], &[0], period_ns);
        gap_fill_ohlc(
            &mut imohlc,
            &[0],
            HashMap::from([("BTC_ETH".to_string(), 42.0)]),
        );
        let candle = imohlc[&0]["BTC_ETH"];
        assert_eq!(candle.open, 42.0);
        assert_eq!(candle.high, 42.0);
        assert_eq!(candle.low, 42.0);
        assert_eq!(candle.close, 42.0);
        assert_eq!(candle.volume, 0.0);
        assert_eq!(candle.quantity, 0.0);
    }

    #[test]
    fn gap_fill_carries_the_synthesized_close_forward() {
        let period_ns = 60_000_000_000i64;
        let mut imohlc = aggregate_ohlc_from_trades(&[], &[0, period_ns], period_ns);
        gap_fill_ohlc(
            &mut imohlc,
            &[0, period_ns],
            HashMap::from([("BTC_ETH".to_string(), 5.0)]),
        );
        assert_eq!(imohlc[&0]["BTC_ETH"].close, 5.0);
        assert_eq!(imohlc[&period_ns]["BTC_ETH"].close, 5.0);
    }
}
