//! Market history ingestion (4.D.ii): trade tape pull model with
//! watermarking so trades already stored are never re-emitted.

use crate::model::{MarketTable, NewTrade};

/// One trade as reported by a market-history endpoint, newest first.
#[derive(Debug, Clone, Copy)]
pub struct HistoryTrade {
    pub id: i64,
    pub trade: NewTrade,
}

pub struct MarketHistoryResult {
    /// Trades to emit, in the order they were received (newest first).
    pub emitted: Vec<NewTrade>,
    pub new_watermark: i64,
    /// True when the oldest trade returned has an id more than one past
    /// the previous watermark -- a gap the reconciler will later close.
    pub possibly_missing: bool,
}

/// Walks `response` (newest-first) against `market`'s stored watermark:
/// emits every trade newer than the watermark, stopping at the first one
/// that isn't, then advances the watermark to the newest emitted id.
pub fn process_market_history(
    market_table: &MarketTable,
    market: &str,
    response: &[HistoryTrade],
) -> MarketHistoryResult {
    let watermark = market_table.watermark(market);
    let mut emitted = Vec::new();

    for history_trade in response {
        if history_trade.id <= watermark {
            break;
        }
        emitted.push(history_trade.trade);
    }

    let possibly_missing = match response.last() {
        Some(oldest) if watermark != 0 => oldest.id > watermark + 1,
        _ => false,
    };

    let new_watermark = match response.first() {
        Some(newest) => market_table.advance_watermark(market, newest.id),
        None => watermark,
    };

    MarketHistoryResult {
        emitted,
        new_watermark,
        possibly_missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OrderType;

    fn trade(id: i64) -> HistoryTrade {
        HistoryTrade {
            id,
            trade: NewTrade {
                trade_id: id,
                date: 0,
                rate: 1.0,
                amount: 1.0,
                order_type: OrderType::Bid,
            },
        }
    }

    #[test]
    fn s1_watermark_scenario() {
        let table = MarketTable::new();
        let result = process_market_history(&table, "BTC_ETH", &[trade(105), trade(104), trade(103)]);
        assert_eq!(result.emitted.len(), 3);
        assert_eq!(result.new_watermark, 105);
        assert!(!result.possibly_missing);

        let result2 = process_market_history(&table, "BTC_ETH", &[trade(107), trade(106), trade(105)]);
        assert_eq!(result2.emitted.iter().map(|t| t.trade_id).collect::<Vec<_>>(), vec![107, 106]);
        assert_eq!(result2.new_watermark, 107);
    }

    #[test]
    fn s2_gap_warning_scenario() {
        let table = MarketTable::new();
        table.advance_watermark("BTC_ETH", 100);

        let result = process_market_history(&table, "BTC_ETH", &[trade(110), trade(109), trade(108)]);
        assert_eq!(result.emitted.len(), 3);
        assert!(result.possibly_missing);
        assert_eq!(result.new_watermark, 110);
    }
}
