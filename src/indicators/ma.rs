//! Simple and exponential moving averages over closes, for MA lengths
//! `1..=length_max`.
//!
//! EMA seeding is indexed by the MA length it belongs to (never a fixed
//! index): the cache stores one seed per `(market, length)` pair, so a
//! length-1 EMA and a length-9 EMA evolve independently instead of
//! colliding on a shared slot.

use crate::cache::EmaSeedCache;
use crate::model::Ohlc;
use std::collections::HashMap;
use std::time::Duration;

pub struct MaPoint {
    pub smas: HashMap<usize, f64>,
    pub emas: HashMap<usize, f64>,
}

/// `time_intervals` must include `length_max - 1` trailing intervals of
/// history before the first interval an MA row is emitted for.
pub fn compute_ma(
    imohlc: &HashMap<i64, HashMap<String, Ohlc>>,
    time_intervals: &[i64],
    length_max: usize,
    period: Duration,
    exchange: &str,
    ema_cache: &EmaSeedCache,
) -> HashMap<i64, HashMap<String, MaPoint>> {
    let mut imma: HashMap<i64, HashMap<String, MaPoint>> = HashMap::new();

    if time_intervals.len() < length_max {
        return imma;
    }

    let period_ns = period.as_nanos() as i64;

    for (i, &interval) in time_intervals[length_max - 1..].iter().enumerate() {
        let Some(mohlc) = imohlc.get(&interval) else { continue };
        let mut mma = HashMap::new();

        for market in mohlc.keys() {
            let mut smas = HashMap::new();
            let mut cumulative_sum = 0.0;

            for ma_length in 1..=length_max {
                let offset_interval = time_intervals[i + length_max - ma_length];
                let Some(close) = imohlc.get(&offset_interval).and_then(|m| m.get(market)).map(|c| c.close) else {
                    break;
                };
                cumulative_sum += close;
                smas.insert(ma_length, cumulative_sum / ma_length as f64);
            }

            let mut emas = HashMap::new();
            let close_now = mohlc[market].close;

            for ma_length in 1..=length_max {
                let seed = ema_cache
                    .seed(exchange, period, market, ma_length)
                    .or_else(|| {
                        imohlc
                            .get(&(interval - period_ns))
                            .and_then(|m| m.get(market))
                            .map(|c| c.close)
                    });

                let Some(seed) = seed else { continue };

                let multiplier = 2.0 / (ma_length as f64 + 1.0);
                let ema = (close_now - seed) * multiplier + seed;
                emas.insert(ma_length, ema);
                ema_cache.set_seed(exchange, period, market, ma_length, ema);
            }

            mma.insert(market.clone(), MaPoint { smas, emas });
        }

        imma.insert(interval, mma);
    }

    imma
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_is_a_plain_cumulative_average() {
        let period = Duration::from_secs(60);
        let period_ns = period.as_nanos() as i64;
        let closes = [10.0, 12.0, 14.0];
        let mut imohlc = HashMap::new();
        for (i, &c) in closes.iter().enumerate() {
            imohlc.insert(
                i as i64 * period_ns,
                HashMap::from([("BTC_ETH".to_string(), Ohlc::from_trade_aggregate(1.0, 1.0, c, c, c, c))]),
            );
        }
        let time_intervals = vec![0, period_ns, 2 * period_ns];
        let cache = EmaSeedCache::new();
        let imma = compute_ma(&imohlc, &time_intervals, 3, period, "poloniex", &cache);

        let point = &imma[&(2 * period_ns)]["BTC_ETH"];
        assert_eq!(point.smas[&1], 14.0);
        assert_eq!(point.smas[&2], 13.0);
        assert!((point.smas[&3] - 12.0).abs() < 1e-9);
    }

    #[test]
    fn property_11_ema_seed_length_one_equals_previous_close_on_first_run() {
        let period = Duration::from_secs(60);
        let period_ns = period.as_nanos() as i64;
        let imohlc = HashMap::from([
            (0, HashMap::from([("BTC_ETH".to_string(), Ohlc::from_trade_aggregate(1.0, 1.0, 10.0, 10.0, 10.0, 10.0))])),
            (period_ns, HashMap::from([("BTC_ETH".to_string(), Ohlc::from_trade_aggregate(1.0, 1.0, 10.0, 12.0, 10.0, 12.0))])),
        ]);
        let time_intervals = vec![0, period_ns];
        let cache = EmaSeedCache::new();
        let imma = compute_ma(&imohlc, &time_intervals, 1, period, "poloniex", &cache);

        // length-1 EMA seeded from the prior close (10.0): multiplier = 2/(1+1) = 1.
        let ema = imma[&period_ns]["BTC_ETH"].emas[&1];
        assert_eq!(ema, 12.0);
    }

    #[test]
    fn ema_seeds_evolve_independently_per_length() {
        let period = Duration::from_secs(60);
        let period_ns = period.as_nanos() as i64;
        let cache = EmaSeedCache::new();
        cache.set_seed("poloniex", period, "BTC_ETH", 1, 9.0);
        cache.set_seed("poloniex", period, "BTC_ETH", 5, 11.0);

        let imohlc = HashMap::from([
            (0, HashMap::from([("BTC_ETH".to_string(), Ohlc::from_trade_aggregate(1.0, 1.0, 10.0, 10.0, 10.0, 10.0))])),
            (period_ns, HashMap::from([("BTC_ETH".to_string(), Ohlc::from_trade_aggregate(1.0, 1.0, 10.0, 10.0, 10.0, 13.0))])),
        ]);
        let time_intervals = vec![0, period_ns];
        let imma = compute_ma(&imohlc, &time_intervals, 5, period, "poloniex", &cache);

        let point = &imma[&period_ns]["BTC_ETH"];
        // length-1: multiplier 1, so ema == close.
        assert_eq!(point.emas[&1], 13.0);
        // length-5: multiplier 2/6, seeded from 11.0 not the length-1 seed.
        let expected = (13.0 - 11.0) * (2.0 / 6.0) + 11.0;
        assert!((point.emas[&5] - expected).abs() < 1e-9);
    }
}
