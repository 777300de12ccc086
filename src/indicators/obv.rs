//! On-Balance Volume: accumulates volume direction against the previous
//! interval's OBV, seeded from the previous interval's raw volume.

use crate::model::Ohlc;
use std::collections::HashMap;

/// `imohlc` must cover every interval in `time_intervals` plus the one
/// immediately preceding the first, since OBV at interval `t` needs the
/// candle at `t - period`.
pub fn compute_obv(
    imohlc: &HashMap<i64, HashMap<String, Ohlc>>,
    time_intervals: &[i64],
    period_ns: i64,
) -> HashMap<i64, HashMap<String, f64>> {
    let mut imobv: HashMap<i64, HashMap<String, f64>> = HashMap::new();

    for &interval in time_intervals {
        let Some(mohlc) = imohlc.get(&interval) else { continue };
        let mut mobv = HashMap::new();

        for (market, candle) in mohlc {
            if let Some(prev) = imohlc.get(&(interval - period_ns)).and_then(|m| m.get(market)) {
                let obv = if candle.volume > prev.volume {
                    prev.volume + candle.volume
                } else if candle.volume == prev.volume {
                    candle.volume
                } else {
                    prev.volume - candle.volume
                };
                mobv.insert(market.clone(), obv);
            }
        }

        imobv.insert(interval, mobv);
    }

    imobv
}
