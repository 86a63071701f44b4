//! C2 — Symbol Registry.
//!
//! A counting multiset of symbol demand shared across every exchange.
//! `add`/`remove` are the primary deduplication gate of the system: one
//! upstream subscription per symbol regardless of how many clients or
//! TWAP orders need it (`spec.md` §4.2).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::exchange::ExchangeSession;
use crate::symbol::Symbol;

pub struct SubscriptionRegistry {
    sessions: Vec<Arc<ExchangeSession>>,
    // The check-then-act transition (0->1, 1->0) and the refcount mutation
    // must be one critical section (spec.md §5), hence a single mutex
    // rather than an atomic counter.
    counts: Mutex<HashMap<Symbol, u32>>,
}

impl SubscriptionRegistry {
    pub fn new(sessions: Vec<Arc<ExchangeSession>>) -> Self {
        Self {
            sessions,
            counts: Mutex::new(HashMap::new()),
        }
    }

    /// `count=0 -> 1`: subscribes on every configured exchange.
    /// `count=n -> n+1` (n>=1): refcount bump only.
    pub fn add_subscription(&self, symbol: &Symbol) {
        let mut counts = self.counts.lock();
        let entry = counts.entry(symbol.clone()).or_insert(0);
        *entry += 1;
        let became_active = *entry == 1;
        drop(counts);

        if became_active {
            debug!(symbol = %symbol, "symbol demand 0->1, subscribing upstream");
            for session in &self.sessions {
                session.subscribe(symbol.clone());
            }
        }
    }

    /// `count=n -> n-1` (n>=2): decrement only.
    /// `count=1 -> 0`: erases the entry and unsubscribes on every exchange.
    pub fn remove_subscription(&self, symbol: &Symbol) {
        let mut counts = self.counts.lock();
        let Some(entry) = counts.get_mut(symbol) else {
            return;
        };
        *entry = entry.saturating_sub(1);
        let became_inactive = *entry == 0;
        if became_inactive {
            counts.remove(symbol);
        }
        drop(counts);

        if became_inactive {
            debug!(symbol = %symbol, "symbol demand 1->0, unsubscribing upstream");
            for session in &self.sessions {
                session.unsubscribe(symbol.clone());
            }
        }
    }

    /// Current demand count for a symbol (0 if untracked). Test/diagnostic use.
    pub fn count(&self, symbol: &Symbol) -> u32 {
        self.counts.lock().get(symbol).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::binance::BinanceAdapter;
    use crate::exchange::ExchangeSession;

    fn registry_with_one_session() -> SubscriptionRegistry {
        let session = ExchangeSession::new(Arc::new(BinanceAdapter::new("wss://example")));
        SubscriptionRegistry::new(vec![session])
    }

    #[test]
    fn add_then_remove_leaves_registry_unchanged() {
        let reg = registry_with_one_session();
        let s = Symbol::parse("BTCUSDT").unwrap();
        reg.add_subscription(&s);
        reg.remove_subscription(&s);
        assert_eq!(reg.count(&s), 0);
    }

    #[test]
    fn second_subscribe_is_refcount_bump_only() {
        let reg = registry_with_one_session();
        let s = Symbol::parse("ETHUSDT").unwrap();
        reg.add_subscription(&s);
        reg.add_subscription(&s);
        assert_eq!(reg.count(&s), 2);
        reg.remove_subscription(&s);
        assert_eq!(reg.count(&s), 1);
        reg.remove_subscription(&s);
        assert_eq!(reg.count(&s), 0);
    }
}
