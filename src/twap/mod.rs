//! TWAP order types and the process-scoped order registry (C7).

pub mod engine;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::exchange::Exchange;
use crate::symbol::Symbol;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Active,
    Completed,
    /// Duration/slices elapsed without fully filling (see SPEC_FULL.md §9.1).
    Partial,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct Fill {
    pub price: Decimal,
    pub quantity: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Mutable TWAP order state. Owned exclusively by its engine task; all
/// other readers go through `OrderRegistry::snapshot`, which copies out
/// a consistent view rather than exposing a live reference
/// (`spec.md` §5).
pub struct TwapOrder {
    pub id: Uuid,
    pub exchange: Exchange,
    pub symbol: Symbol,
    pub side: Side,
    pub total_qty: Decimal,
    pub slices: u32,
    pub duration_secs: u64,
    pub limit_price: Option<Decimal>,
    pub qty_per_slice: Decimal,
    pub interval_secs: u64,

    state: Mutex<OrderState>,
}

struct OrderState {
    executed_qty: Decimal,
    executions: Vec<Fill>,
    status: OrderStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderSnapshot {
    pub status: OrderStatus,
    pub side: Side,
    pub executed_quantity: Decimal,
    pub total_quantity: Decimal,
    pub slices_executed: usize,
    pub total_slices: u32,
    pub executions: Vec<Fill>,
    pub average_price: Option<Decimal>,
}

impl TwapOrder {
    pub fn new(
        exchange: Exchange,
        symbol: Symbol,
        side: Side,
        total_qty: Decimal,
        slices: u32,
        duration_secs: u64,
        limit_price: Option<Decimal>,
    ) -> Arc<Self> {
        // Rounding residuals (when total_qty/slices doesn't divide evenly)
        // go to the last executed slice, per spec.md §4.5. qty_per_slice
        // here is the *nominal* per-slice amount; the engine tops the
        // final slice up to total_qty exactly.
        let slices_dec: Decimal = slices.into();
        let qty_per_slice = total_qty / slices_dec;
        let interval_secs = duration_secs / u64::from(slices).max(1);

        Arc::new(Self {
            id: Uuid::new_v4(),
            exchange,
            symbol,
            side,
            total_qty,
            slices,
            duration_secs,
            limit_price,
            qty_per_slice,
            interval_secs,
            state: Mutex::new(OrderState {
                executed_qty: Decimal::ZERO,
                executions: Vec::new(),
                status: OrderStatus::Active,
            }),
        })
    }

    pub fn status(&self) -> OrderStatus {
        self.state.lock().status
    }

    pub fn set_status(&self, status: OrderStatus) {
        self.state.lock().status = status;
    }

    pub fn executed_qty(&self) -> Decimal {
        self.state.lock().executed_qty
    }

    pub fn record_fill(&self, price: Decimal, quantity: Decimal) {
        let mut state = self.state.lock();
        state.executions.push(Fill {
            price,
            quantity,
            timestamp: Utc::now(),
        });
        state.executed_qty += quantity;
    }

    pub fn slices_executed(&self) -> usize {
        self.state.lock().executions.len()
    }

    pub fn snapshot(&self) -> OrderSnapshot {
        let state = self.state.lock();
        let average_price = if state.executed_qty.is_zero() {
            None
        } else {
            let weighted: Decimal = state.executions.iter().map(|f| f.price * f.quantity).sum();
            Some(weighted / state.executed_qty)
        };
        OrderSnapshot {
            status: state.status,
            side: self.side,
            executed_quantity: state.executed_qty,
            total_quantity: self.total_qty,
            slices_executed: state.executions.len(),
            total_slices: self.slices,
            executions: state.executions.clone(),
            average_price,
        }
    }
}

/// C7 — process-scoped `orderId -> TwapOrder` map. Insert-only; orders
/// are never removed (`spec.md` §4.7).
#[derive(Default)]
pub struct OrderRegistry {
    orders: Mutex<HashMap<Uuid, Arc<TwapOrder>>>,
}

impl OrderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, order: Arc<TwapOrder>) {
        self.orders.lock().insert(order.id, order);
    }

    pub fn get(&self, id: Uuid) -> Option<Arc<TwapOrder>> {
        self.orders.lock().get(&id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn qty_per_slice_and_interval_are_computed_once() {
        let order = TwapOrder::new(
            Exchange::Binance,
            Symbol::parse("BTCUSDT").unwrap(),
            Side::Buy,
            dec!(1.0),
            5,
            10,
            None,
        );
        assert_eq!(order.qty_per_slice, dec!(0.2));
        assert_eq!(order.interval_secs, 2);
    }

    #[test]
    fn average_price_is_none_until_a_fill_lands() {
        let order = TwapOrder::new(
            Exchange::Binance,
            Symbol::parse("BTCUSDT").unwrap(),
            Side::Buy,
            dec!(1.0),
            5,
            10,
            None,
        );
        assert_eq!(order.snapshot().average_price, None);
        order.record_fill(dec!(200), dec!(0.2));
        assert_eq!(order.snapshot().average_price, Some(dec!(200)));
    }
}
