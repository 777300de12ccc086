//! Up-level OHLC: folds N consecutive lower-period candles into one
//! higher-period candle per market (e.g. five 1m candles into one 5m
//! candle).

use crate::model::Ohlc;
use std::collections::HashMap;

/// `imohlc` holds one lower-period candle set per interval, in ascending
/// chronological order matching `lower_intervals`. Every market present in
/// the first interval's candle set is expected to appear in every other
/// interval too (base OHLC's gap-fill guarantees this upstream).
pub fn fold_up_level(
    imohlc: &HashMap<i64, HashMap<String, Ohlc>>,
    lower_intervals: &[i64],
    up_level_interval: i64,
) -> HashMap<String, Ohlc> {
    let mut per_market: HashMap<String, Vec<Ohlc>> = HashMap::new();

    for &interval in lower_intervals {
        let Some(mohlc) = imohlc.get(&interval) else { continue };
        for (market, candle) in mohlc {
            per_market.entry(market.clone()).or_default().push(*candle);
        }
    }

    let _ = up_level_interval;

    per_market
        .into_iter()
        .filter_map(|(market, candles)| Ohlc::fold(&candles).map(|c| (market, c)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_five_one_minute_candles_into_one_five_minute_candle() {
        let period_ns = 60_000_000_000i64;
        let mut imohlc = HashMap::new();
        for i in 0..5 {
            imohlc.insert(
                i * period_ns,
                HashMap::from([(
                    "BTC_ETH".to_string(),
                    Ohlc::from_trade_aggregate(1.0, 1.0, 10.0 + i as f64, 11.0 + i as f64, 9.0, 10.0 + i as f64),
                )]),
            );
        }
        let lower_intervals: Vec<i64> = (0..5).map(|i| i * period_ns).collect();
        let folded = fold_up_level(&imohlc, &lower_intervals, 5 * period_ns);
        let candle = folded["BTC_ETH"];
        assert_eq!(candle.open, 10.0);
        assert_eq!(candle.close, 14.0);
        assert_eq!(candle.volume, 5.0);
    }
}
