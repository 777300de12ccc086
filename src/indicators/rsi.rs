//! Relative Strength Index over a sliding window of `length_max` candles.
//!
//! `avg_up`/`avg_down` here are cumulative sums over the window, not true
//! averages -- matching the accumulate-then-divide-once-at-the-end shape the
//! RSI formula actually needs: `rsi = 100 - 100 / (1 + avg_up/avg_down)`.

use crate::model::Ohlc;
use std::collections::HashMap;

/// `time_intervals` must include `length_max - 1` trailing intervals of
/// history before the first interval an RSI row is emitted for.
pub fn compute_rsi(
    imohlc: &HashMap<i64, HashMap<String, Ohlc>>,
    time_intervals: &[i64],
    length_max: usize,
) -> HashMap<i64, HashMap<String, HashMap<usize, f64>>> {
    let mut imrsi: HashMap<i64, HashMap<String, HashMap<usize, f64>>> = HashMap::new();

    if time_intervals.len() < length_max {
        return imrsi;
    }

    for (i, &interval) in time_intervals[length_max - 1..].iter().enumerate() {
        let Some(mohlc) = imohlc.get(&interval) else { continue };
        let mut mrsi = HashMap::new();

        for market in mohlc.keys() {
            let mut rsis = HashMap::new();
            let mut avg_up = 0.0;
            let mut avg_down = 0.0;

            for ma_length in 1..=length_max {
                let offset_interval = time_intervals[i + length_max - ma_length];
                let Some(candle) = imohlc.get(&offset_interval).and_then(|m| m.get(market)) else {
                    break;
                };

                if candle.change > 0.0 {
                    avg_up += candle.change;
                } else if candle.change < 0.0 {
                    avg_down -= candle.change;
                }

                let rsi = if avg_down != 0.0 {
                    100.0 - 100.0 / (1.0 + avg_up / avg_down)
                } else {
                    100.0
                };
                rsis.insert(ma_length, rsi);
            }

            mrsi.insert(market.clone(), rsis);
        }

        imrsi.insert(interval, mrsi);
    }

    imrsi
}
