//! The OHLC candle row, per market per interval start.

/// Open/High/Low/Close candle for one market over one aligned interval.
///
/// Invariants: `open` is the first trade rate in the interval, `close` the
/// last, `high`/`low` the extremes; when no trades occurred the whole row
/// is filled flat from the most recent known tick so the close-to-close
/// series has no gaps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ohlc {
    pub volume: f64,
    pub quantity: f64,
    pub weighted_average: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub change: f64,
    pub change_percent: f64,
}

impl Ohlc {
    /// Builds a candle from aggregated trade-tape rows: `SUM(total)`,
    /// `SUM(quantity)`, `FIRST(rate)`, `MAX(rate)`, `MIN(rate)`, `LAST(rate)`.
    pub fn from_trade_aggregate(
        volume: f64,
        quantity: f64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    ) -> Self {
        let weighted_average = if quantity != 0.0 { volume / quantity } else { 0.0 };
        let change = close - open;
        let change_percent = if open != 0.0 { change * 100.0 / open } else { 0.0 };
        Ohlc {
            volume,
            quantity,
            weighted_average,
            open,
            high,
            low,
            close,
            change,
            change_percent,
        }
    }

    /// A flat candle synthesized from the most recent known tick when no
    /// trades occurred during the interval (property 9, "OHLC gap fill").
    pub fn flat_from_last(last: f64) -> Self {
        Ohlc {
            volume: 0.0,
            quantity: 0.0,
            weighted_average: 0.0,
            open: last,
            high: last,
            low: last,
            close: last,
            change: 0.0,
            change_percent: 0.0,
        }
    }

    /// Folds a run of sub-period candles (in chronological order) into one
    /// higher-period candle: sums volume/quantity, recomputes weighted
    /// average, takes first open / last close, min low / max high.
    pub fn fold(sub_candles: &[Ohlc]) -> Option<Ohlc> {
        let first = sub_candles.first()?;
        let last = sub_candles.last()?;

        let volume: f64 = sub_candles.iter().map(|c| c.volume).sum();
        let quantity: f64 = sub_candles.iter().map(|c| c.quantity).sum();
        let high = sub_candles
            .iter()
            .map(|c| c.high)
            .fold(f64::NEG_INFINITY, f64::max);
        let low = sub_candles
            .iter()
            .map(|c| c.low)
            .fold(f64::INFINITY, f64::min);

        Some(Ohlc::from_trade_aggregate(
            volume, quantity, first.open, high, low, last.close,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s5_ohlc_aggregate_scenario() {
        let candles = vec![
            Ohlc::from_trade_aggregate(1.0, 1.0, 10.0, 11.0, 9.0, 10.0),
            Ohlc::from_trade_aggregate(2.0, 1.0, 10.0, 12.0, 10.0, 11.0),
            Ohlc::from_trade_aggregate(1.0, 1.0, 11.0, 11.0, 10.0, 10.0),
            Ohlc::from_trade_aggregate(3.0, 1.0, 10.0, 13.0, 10.0, 13.0),
            Ohlc::from_trade_aggregate(1.0, 1.0, 13.0, 13.0, 12.0, 12.0),
        ];

        let folded = Ohlc::fold(&candles).unwrap();
        assert_eq!(folded.open, 10.0);
        assert_eq!(folded.high, 13.0);
        assert_eq!(folded.low, 9.0);
        assert_eq!(folded.close, 12.0);
        assert_eq!(folded.volume, 8.0);
        assert_eq!(folded.change, 2.0);
        assert_eq!(folded.change_percent, 20.0);
    }

    #[test]
    fn s9_gap_fill_flat_candle() {
        let candle = Ohlc::flat_from_last(42.0);
        assert_eq!(candle.open, 42.0);
        assert_eq!(candle.high, 42.0);
        assert_eq!(candle.low, 42.0);
        assert_eq!(candle.close, 42.0);
        assert_eq!(candle.volume, 0.0);
        assert_eq!(candle.quantity, 0.0);
    }
}
