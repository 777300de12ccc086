//! Market depth: for each configured interval percentage, how much
//! cumulative bid/ask volume sits within that percentage of mid-price.

use crate::model::{OrderBook, OrderLevel, OrderType};
use crate::store::QueryRow;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthAtInterval {
    pub interval: f64,
    pub bid_depth: f64,
    pub ask_depth: f64,
}

/// Walks bids down from mid-price and asks up, recording the cumulative
/// sum at each configured interval boundary. `intervals` must be sorted
/// ascending; a single pass per side reuses the previous interval's
/// position instead of rescanning from the top each time.
///
/// Once a side's levels are exhausted before crossing a wider interval's
/// bound, every remaining (wider) interval records the side's full depth
/// rather than leaving it at zero -- required for property 6
/// (monotonicity): a wider interval can never show less depth than a
/// narrower one.
pub fn compute_market_depths(book: &OrderBook, intervals: &[f64]) -> Vec<DepthAtInterval> {
    if book.bids.is_empty() || book.asks.is_empty() {
        return Vec::new();
    }

    let mid = (book.bids[0].rate + book.asks[0].rate) / 2.0;
    let bid_depths = walk_side(&book.bids, mid, intervals, |rate, bound| rate < bound, |m, pct| m - m / 100.0 * pct);
    let ask_depths = walk_side(&book.asks, mid, intervals, |rate, bound| rate > bound, |m, pct| m + m / 100.0 * pct);

    intervals
        .iter()
        .zip(bid_depths)
        .zip(ask_depths)
        .map(|((&interval, bid_depth), ask_depth)| DepthAtInterval {
            interval,
            bid_depth,
            ask_depth,
        })
        .collect()
}

/// Rebuilds an `OrderBook` from persisted `book_orders` rows (pull
/// exchanges have no live reconstructor to read from, only what they wrote
/// to the store). Rows already carry their ladder-order `cumulative_sum`
/// from ingestion, so this only needs to sort by it, not recompute.
pub fn order_book_from_rows(rows: &[QueryRow]) -> Option<OrderBook> {
    let mut bids = Vec::new();
    let mut asks = Vec::new();
    let mut sequence = 0i64;

    for row in rows {
        let Some(order_type) = row.tags.get("order_type") else { continue };
        let rate = row.fields.get("rate").and_then(|v| v.as_f64()).unwrap_or(0.0);
        let quantity = row.fields.get("quantity").and_then(|v| v.as_f64()).unwrap_or(0.0);
        let total = row.fields.get("total").and_then(|v| v.as_f64()).unwrap_or(rate * quantity);
        let cumulative_sum = row.fields.get("cumulative_sum").and_then(|v| v.as_f64()).unwrap_or(0.0);
        if let Some(s) = row.fields.get("sequence").and_then(|v| v.as_f64()) {
            sequence = s as i64;
        }

        let (order_type, levels) = match order_type.as_str() {
            "bid" => (OrderType::Bid, &mut bids),
            "ask" => (OrderType::Ask, &mut asks),
            _ => continue,
        };
        levels.push(OrderLevel { rate, quantity, total, cumulative_sum, order_type });
    }

    if bids.is_empty() || asks.is_empty() {
        return None;
    }
    bids.sort_by(|a, b| a.cumulative_sum.partial_cmp(&b.cumulative_sum).unwrap());
    asks.sort_by(|a, b| a.cumulative_sum.partial_cmp(&b.cumulative_sum).unwrap());
    Some(OrderBook { sequence, bids, asks })
}

fn walk_side(
    levels: &[OrderLevel],
    mid: f64,
    intervals: &[f64],
    crosses_bound: impl Fn(f64, f64) -> bool,
    bound_at: impl Fn(f64, f64) -> f64,
) -> Vec<f64> {
    let full_depth = levels.last().map(|l| l.cumulative_sum).unwrap_or(0.0);
    let mut out = Vec::with_capacity(intervals.len());
    let mut cursor = 0usize;
    let mut cumulative_sum = 0.0;
    let mut exhausted = false;

    for &interval in intervals {
        if exhausted {
            out.push(full_depth);
            continue;
        }

        let bound = bound_at(mid, interval);
        let mut crossed = false;

        for (offset, level) in levels[cursor..].iter().enumerate() {
            if crosses_bound(level.rate, bound) {
                out.push(cumulative_sum);
                cursor += offset;
                crossed = true;
                break;
            }
            cumulative_sum = level.cumulative_sum;
        }

        if !crossed {
            out.push(full_depth);
            exhausted = true;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book_row(order_type: &str, rate: f64, quantity: f64, cumulative_sum: f64) -> QueryRow {
        use crate::model::FieldValue;
        QueryRow {
            tags: std::collections::HashMap::from([
                ("order_type".to_string(), order_type.to_string()),
                ("market".to_string(), "BTC-ETH".to_string()),
            ]),
            fields: std::collections::HashMap::from([
                ("rate".to_string(), FieldValue::Float(rate)),
                ("quantity".to_string(), FieldValue::Float(quantity)),
                ("total".to_string(), FieldValue::Float(rate * quantity)),
                ("cumulative_sum".to_string(), FieldValue::Float(cumulative_sum)),
            ]),
            timestamp_ns: 0,
        }
    }

    #[test]
    fn rebuilds_an_order_book_from_persisted_ladder_rows() {
        let rows = vec![
            book_row("bid", 99.0, 10.0, 990.0),
            book_row("bid", 98.0, 5.0, 1480.0),
            book_row("ask", 101.0, 10.0, 1010.0),
        ];
        let book = order_book_from_rows(&rows).unwrap();
        assert_eq!(book.bids.len(), 2);
        assert_eq!(book.bids[0].rate, 99.0);
        assert_eq!(book.asks.len(), 1);
    }

    #[test]
    fn missing_one_side_yields_no_book() {
        let rows = vec![book_row("bid", 99.0, 10.0, 990.0)];
        assert!(order_book_from_rows(&rows).is_none());
    }

    #[test]
    fn carries_the_sequence_field_when_present() {
        use crate::model::FieldValue;
        let mut bid = book_row("bid", 99.0, 10.0, 990.0);
        bid.fields.insert("sequence".to_string(), FieldValue::Int(77));
        let rows = vec![bid, book_row("ask", 101.0, 10.0, 1010.0)];
        let book = order_book_from_rows(&rows).unwrap();
        assert_eq!(book.sequence, 77);
    }
    use crate::model::{Order, OrderType};

    fn sample_book() -> OrderBook {
        OrderBook::from_ladders(
            1,
            vec![
                Order { rate: 100.0, quantity: 1.0, order_type: OrderType::Bid },
                Order { rate: 99.0, quantity: 1.0, order_type: OrderType::Bid },
                Order { rate: 90.0, quantity: 1.0, order_type: OrderType::Bid },
                Order { rate: 50.0, quantity: 1.0, order_type: OrderType::Bid },
            ],
            vec![
                Order { rate: 101.0, quantity: 1.0, order_type: OrderType::Ask },
                Order { rate: 102.0, quantity: 1.0, order_type: OrderType::Ask },
                Order { rate: 110.0, quantity: 1.0, order_type: OrderType::Ask },
                Order { rate: 150.0, quantity: 1.0, order_type: OrderType::Ask },
            ],
        )
    }

    #[test]
    fn property_6_depth_is_monotonic_across_widening_intervals() {
        let book = sample_book();
        let depths = compute_market_depths(&book, &[0.5, 1.0, 5.0, 20.0]);

        for pair in depths.windows(2) {
            assert!(pair[1].bid_depth >= pair[0].bid_depth);
            assert!(pair[1].ask_depth >= pair[0].ask_depth);
        }
    }

    #[test]
    fn s4_depth_scenario() {
        let book = sample_book();
        // mid = (100 + 101) / 2 = 100.5
        let depths = compute_market_depths(&book, &[1.0]);
        let d = depths[0];
        // bound = 100.5 - 1.005 = 99.495: only the 100.0 level stays within bound.
        assert_eq!(d.bid_depth, 100.0);
        // bound = 100.5 + 1.005 = 101.505: only the 101.0 level stays within bound.
        assert_eq!(d.ask_depth, 101.0);
    }

    #[test]
    fn wide_interval_covering_the_whole_book_reports_full_depth() {
        let book = sample_book();
        let depths = compute_market_depths(&book, &[1000.0]);
        let total_bid: f64 = book.bids.iter().map(|l| l.total).sum();
        let total_ask: f64 = book.asks.iter().map(|l| l.total).sum();
        assert!((depths[0].bid_depth - total_bid).abs() < 1e-9);
        assert!((depths[0].ask_depth - total_ask).abs() < 1e-9);
    }
}
