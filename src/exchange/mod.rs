//! Exchange adapters and the per-exchange WebSocket session (C1).
//!
//! Grounded on the teacher's `scrapers/binance_session.rs` (state
//! machine, backoff) and `scrapers/polymarket_book_store.rs` (whole-
//! snapshot copy-on-write publication), generalised to the two-venue,
//! adapter-driven shape `spec.md` §4.8 (SPEC_FULL.md) calls for.

pub mod binance;
pub mod kraken;
pub mod session;

use serde::{Deserialize, Serialize};
use tokio_tungstenite::tungstenite::Message;

use crate::book::PriceLevel;
use crate::symbol::Symbol;

pub use session::ExchangeSession;

/// The reference set of upstream venues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exchange {
    Binance,
    Kraken,
}

impl Exchange {
    pub fn as_str(&self) -> &'static str {
        match self {
            Exchange::Binance => "binance",
            Exchange::Kraken => "kraken",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "binance" => Some(Exchange::Binance),
            "kraken" => Some(Exchange::Kraken),
            _ => None,
        }
    }

    pub fn all() -> &'static [Exchange] {
        &[Exchange::Binance, Exchange::Kraken]
    }
}

impl std::fmt::Display for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A standardised depth update parsed from one exchange's wire frame,
/// not yet truncated/sorted (that happens in `OrderBookSnapshot::standardise`).
#[derive(Debug, Clone)]
pub struct DepthUpdate {
    pub symbol: Symbol,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
}

/// The seam between C1's session state machine and one venue's wire
/// protocol. Heartbeats, subscription acks, and channel-name parsing are
/// fully absorbed behind this trait; no other component knows they exist.
pub trait ExchangeAdapter: Send + Sync {
    fn name(&self) -> Exchange;

    fn ws_url(&self) -> &str;

    /// Canonical `Symbol` -> this venue's wire symbol (e.g. `BTCUSDT` -> `btcusdt`).
    fn to_native_symbol(&self, symbol: &Symbol) -> String;

    /// This venue's wire symbol -> canonical `Symbol`, if recognisable.
    fn from_native_symbol(&self, native: &str) -> Option<Symbol>;

    /// Encode a subscribe control frame for the given canonical symbols.
    fn encode_subscribe(&self, symbols: &[Symbol]) -> Message;

    /// Encode an unsubscribe control frame for the given canonical symbols.
    fn encode_unsubscribe(&self, symbols: &[Symbol]) -> Message;

    /// Parse one inbound frame into a standardised depth update. Returns
    /// `None` for heartbeats, acks, or anything that isn't a depth
    /// message — those are silently discarded by the caller.
    fn parse_depth(&self, msg: &Message) -> Option<DepthUpdate>;
}
