//! Order book wire shapes.
//!
//! `OrderBookSnapshot` is per-exchange, produced by C1. `MergedBook` is
//! the cross-exchange union produced by the aggregator (C3) and is what
//! goes out over the client WebSocket.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::symbol::Symbol;

pub const MAX_DEPTH: usize = 10;

/// One `(price, quantity)` level. Both fields are non-negative; a zero
/// quantity in an incremental feed means "level removed" and must never
/// reach a stored snapshot.
///
/// Serialises as the wire tuple `[price, quantity]` (see `spec.md` §4.4's
/// `bids:[[p,q]...]` frame shape).
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PriceLevel {
    pub price: Decimal,
    pub quantity: Decimal,
}

impl PriceLevel {
    pub fn new(price: Decimal, quantity: Decimal) -> Self {
        Self { price, quantity }
    }
}

impl Serialize for PriceLevel {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeTuple;
        let mut tup = serializer.serialize_tuple(2)?;
        tup.serialize_element(&self.price)?;
        tup.serialize_element(&self.quantity)?;
        tup.end()
    }
}

/// A single exchange's top-of-book for one symbol. Bids strictly
/// price-descending, asks strictly price-ascending, each truncated to
/// `MAX_DEPTH`. `max(bids) < min(asks)` whenever both sides are
/// non-empty (crossed single-venue books are rejected at ingestion, see
/// `exchange::session`).
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBookSnapshot {
    pub exchange: crate::exchange::Exchange,
    pub symbol: Symbol,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
}

impl OrderBookSnapshot {
    /// Sort, truncate to `MAX_DEPTH`, and drop zero-quantity levels. Does
    /// not itself reject crossed books; callers that need that check
    /// call `is_crossed`.
    pub fn standardise(
        exchange: crate::exchange::Exchange,
        symbol: Symbol,
        mut bids: Vec<PriceLevel>,
        mut asks: Vec<PriceLevel>,
    ) -> Self {
        bids.retain(|l| !l.quantity.is_zero());
        asks.retain(|l| !l.quantity.is_zero());
        bids.sort_by(|a, b| b.price.cmp(&a.price));
        asks.sort_by(|a, b| a.price.cmp(&b.price));
        bids.truncate(MAX_DEPTH);
        asks.truncate(MAX_DEPTH);
        Self {
            exchange,
            symbol,
            bids,
            asks,
        }
    }

    pub fn is_crossed(&self) -> bool {
        match (self.bids.first(), self.asks.first()) {
            (Some(b), Some(a)) => b.price >= a.price,
            _ => false,
        }
    }

    pub fn best_bid(&self) -> Option<&PriceLevel> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&PriceLevel> {
        self.asks.first()
    }
}

/// Cross-exchange union of top-of-books for one symbol. Duplicate-price
/// levels from different venues are preserved, never netted.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MergedBook {
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
}

impl MergedBook {
    /// Union-then-sort across every snapshot that has data for the
    /// symbol, then repair (not reject) any residual cross between the
    /// merged best bid and best ask. See SPEC_FULL.md §9.2 for the
    /// rationale: per-venue crossing is rejected at ingestion, but the
    /// union of two simultaneously-valid venues can still cross because
    /// no cross-venue synchronisation is attempted.
    pub fn merge(snapshots: &[&OrderBookSnapshot]) -> Option<Self> {
        if snapshots.is_empty() {
            return None;
        }

        let mut bids: Vec<PriceLevel> = snapshots.iter().flat_map(|s| s.bids.iter().copied()).collect();
        let mut asks: Vec<PriceLevel> = snapshots.iter().flat_map(|s| s.asks.iter().copied()).collect();
        bids.sort_by(|a, b| b.price.cmp(&a.price));
        asks.sort_by(|a, b| a.price.cmp(&b.price));

        if let (Some(best_bid), Some(best_ask)) = (bids.first().copied(), asks.first().copied()) {
            if best_bid.price >= best_ask.price {
                bids.retain(|l| l.price < best_ask.price);
                asks.retain(|l| l.price > best_bid.price);
            }
        }

        Some(Self { bids, asks })
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::Exchange;

    fn lvl(p: &str, q: &str) -> PriceLevel {
        PriceLevel::new(p.parse().unwrap(), q.parse().unwrap())
    }

    #[test]
    fn standardise_sorts_truncates_and_drops_zero_qty() {
        let bids = vec![lvl("99", "2"), lvl("100", "1"), lvl("50", "0")];
        let asks = vec![lvl("102", "1"), lvl("101", "1")];
        let snap = OrderBookSnapshot::standardise(Exchange::Binance, Symbol::parse("BTCUSDT").unwrap(), bids, asks);
        assert_eq!(snap.bids, vec![lvl("100", "1"), lvl("99", "2")]);
        assert_eq!(snap.asks, vec![lvl("101", "1"), lvl("102", "1")]);
    }

    #[test]
    fn merged_ordering_scenario() {
        // Scenario 3 from spec.md §8.
        let a = OrderBookSnapshot::standardise(
            Exchange::Binance,
            Symbol::parse("BTCUSDT").unwrap(),
            vec![lvl("100", "1"), lvl("99", "2")],
            vec![lvl("101", "1")],
        );
        let b = OrderBookSnapshot::standardise(
            Exchange::Kraken,
            Symbol::parse("BTCUSDT").unwrap(),
            vec![lvl("99.5", "3")],
            vec![lvl("100.5", "2"), lvl("102", "1")],
        );
        let merged = MergedBook::merge(&[&a, &b]).unwrap();
        assert_eq!(merged.bids, vec![lvl("100", "1"), lvl("99.5", "3"), lvl("99", "2")]);
        assert_eq!(merged.asks, vec![lvl("100.5", "2"), lvl("101", "1"), lvl("102", "1")]);
    }

    #[test]
    fn merge_repairs_cross_between_venues() {
        let a = OrderBookSnapshot::standardise(
            Exchange::Binance,
            Symbol::parse("BTCUSDT").unwrap(),
            vec![lvl("100", "1")],
            vec![],
        );
        let b = OrderBookSnapshot::standardise(
            Exchange::Kraken,
            Symbol::parse("BTCUSDT").unwrap(),
            vec![],
            vec![lvl("99", "1")], // crosses venue A's bid
        );
        let merged = MergedBook::merge(&[&a, &b]).unwrap();
        assert!(merged.asks.is_empty(), "crossing ask level should be repaired away");
        assert_eq!(merged.bids, vec![lvl("100", "1")]);
    }

    #[test]
    fn merge_of_no_snapshots_is_none() {
        assert!(MergedBook::merge(&[]).is_none());
    }
}
