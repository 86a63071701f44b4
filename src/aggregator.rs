//! C3 — Aggregator.
//!
//! A pure function of the current per-exchange `latestBook` tables. Holds
//! no state of its own; readers must tolerate cross-exchange snapshots
//! being from different wall-clock instants (`spec.md` §4.3).

use std::sync::Arc;

use crate::book::{MergedBook, OrderBookSnapshot};
use crate::exchange::ExchangeSession;
use crate::symbol::Symbol;

pub struct Aggregator {
    sessions: Vec<Arc<ExchangeSession>>,
}

impl Aggregator {
    pub fn new(sessions: Vec<Arc<ExchangeSession>>) -> Self {
        Self { sessions }
    }

    /// Collect every exchange's snapshot that has `symbol`, union and
    /// sort their sides. Returns `None` iff no exchange currently has
    /// data for the symbol.
    pub fn merged_book_for(&self, symbol: &Symbol) -> Option<MergedBook> {
        let snapshots: Vec<Arc<OrderBookSnapshot>> =
            self.sessions.iter().filter_map(|s| s.latest(symbol)).collect();
        if snapshots.is_empty() {
            return None;
        }
        let refs: Vec<&OrderBookSnapshot> = snapshots.iter().map(|s| s.as_ref()).collect();
        MergedBook::merge(&refs)
    }

    /// The single venue's snapshot for `(exchange, symbol)`, used by the
    /// TWAP engine which prices fills against the order's named venue,
    /// not the merged view (`spec.md` §4.5).
    pub fn venue_book_for(
        &self,
        exchange: crate::exchange::Exchange,
        symbol: &Symbol,
    ) -> Option<Arc<OrderBookSnapshot>> {
        self.sessions
            .iter()
            .find(|s| s.exchange() == exchange)
            .and_then(|s| s.latest(symbol))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::binance::BinanceAdapter;

    #[test]
    fn returns_none_when_no_exchange_has_data() {
        let session = ExchangeSession::new(Arc::new(BinanceAdapter::new("wss://example")));
        let agg = Aggregator::new(vec![session]);
        assert!(agg.merged_book_for(&Symbol::parse("BTCUSDT").unwrap()).is_none());
    }
}
