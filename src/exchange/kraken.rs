//! Kraken adapter: wire symbols are slash-separated and use `XBT` for
//! Bitcoin (e.g. canonical `BTCUSDT` <-> wire `XBT/USDT`), per the book
//! channel (v2) message shape.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message;

use super::{DepthUpdate, Exchange, ExchangeAdapter};
use crate::book::PriceLevel;
use crate::symbol::Symbol;

pub struct KrakenAdapter {
    ws_url: String,
}

impl KrakenAdapter {
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self { ws_url: ws_url.into() }
    }

    /// Split a canonical symbol like `BTCUSDT` into Kraken's base/quote
    /// pair `XBT/USDT`. Canonical symbols have no separator, so this
    /// relies on a small set of known quote currencies; unrecognised
    /// quotes fall back to a 3-character quote (Kraken's common case).
    fn split_base_quote(symbol: &Symbol) -> (String, String) {
        const QUOTES: &[&str] = &["USDT", "USDC", "USD", "EUR", "GBP"];
        let raw = symbol.as_str();
        for quote in QUOTES {
            if let Some(base) = raw.strip_suffix(quote) {
                if !base.is_empty() {
                    return (base.to_string(), quote.to_string());
                }
            }
        }
        let split_at = raw.len().saturating_sub(3).max(1);
        (raw[..split_at].to_string(), raw[split_at..].to_string())
    }

    fn canonical_base(base: &str) -> String {
        if base == "XBT" {
            "BTC".to_string()
        } else {
            base.to_string()
        }
    }

    fn wire_base(base: &str) -> String {
        if base == "BTC" {
            "XBT".to_string()
        } else {
            base.to_string()
        }
    }
}

/// Kraken sends book levels as JSON numbers, not strings; accept both so
/// a future wire change to quoted prices doesn't break parsing.
fn flexible_decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::String(s) => s.parse().map_err(serde::de::Error::custom),
        Value::Number(n) => n
            .as_f64()
            .and_then(Decimal::from_f64_retain)
            .ok_or_else(|| serde::de::Error::custom("invalid numeric price/qty")),
        other => Err(serde::de::Error::custom(format!("unsupported price/qty shape: {other}"))),
    }
}

#[derive(Deserialize)]
struct BookLevel {
    #[serde(deserialize_with = "flexible_decimal")]
    price: Decimal,
    #[serde(deserialize_with = "flexible_decimal")]
    qty: Decimal,
}

#[derive(Deserialize)]
struct BookEntry {
    symbol: String,
    #[serde(default)]
    bids: Vec<BookLevel>,
    #[serde(default)]
    asks: Vec<BookLevel>,
}

#[derive(Deserialize)]
struct BookMessage {
    channel: String,
    #[serde(default)]
    data: Vec<BookEntry>,
}

impl ExchangeAdapter for KrakenAdapter {
    fn name(&self) -> Exchange {
        Exchange::Kraken
    }

    fn ws_url(&self) -> &str {
        &self.ws_url
    }

    fn to_native_symbol(&self, symbol: &Symbol) -> String {
        let (base, quote) = Self::split_base_quote(symbol);
        format!("{}/{}", Self::wire_base(&base), quote)
    }

    fn from_native_symbol(&self, native: &str) -> Option<Symbol> {
        let (base, quote) = native.split_once('/')?;
        Symbol::parse(&format!("{}{}", Self::canonical_base(base), quote))
    }

    fn encode_subscribe(&self, symbols: &[Symbol]) -> Message {
        let pairs: Vec<String> = symbols.iter().map(|s| self.to_native_symbol(s)).collect();
        Message::Text(
            serde_json::json!({
                "method": "subscribe",
                "params": { "channel": "book", "symbol": pairs, "depth": 10 },
            })
            .to_string(),
        )
    }

    fn encode_unsubscribe(&self, symbols: &[Symbol]) -> Message {
        let pairs: Vec<String> = symbols.iter().map(|s| self.to_native_symbol(s)).collect();
        Message::Text(
            serde_json::json!({
                "method": "unsubscribe",
                "params": { "channel": "book", "symbol": pairs, "depth": 10 },
            })
            .to_string(),
        )
    }

    fn parse_depth(&self, msg: &Message) -> Option<DepthUpdate> {
        let Message::Text(text) = msg else {
            return None;
        };
        let value: Value = serde_json::from_str(text).ok()?;
        let frame: BookMessage = serde_json::from_value(value).ok()?;
        if frame.channel != "book" {
            return None;
        }
        let entry = frame.data.into_iter().next()?;
        let symbol = self.from_native_symbol(&entry.symbol)?;

        Some(DepthUpdate {
            symbol,
            bids: entry.bids.into_iter().map(|l| PriceLevel::new(l.price, l.qty)).collect(),
            asks: entry.asks.into_iter().map(|l| PriceLevel::new(l.price, l.qty)).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_to_wire_remaps_btc_to_xbt() {
        let a = KrakenAdapter::new("wss://example");
        assert_eq!(a.to_native_symbol(&Symbol::parse("BTCUSDT").unwrap()), "XBT/USDT");
    }

    #[test]
    fn wire_to_canonical_roundtrips() {
        let a = KrakenAdapter::new("wss://example");
        assert_eq!(a.from_native_symbol("XBT/USDT").unwrap(), Symbol::parse("BTCUSDT").unwrap());
    }

    #[test]
    fn parses_book_snapshot_message() {
        let a = KrakenAdapter::new("wss://example");
        let msg = Message::Text(
            serde_json::json!({
                "channel": "book",
                "type": "snapshot",
                "data": [{
                    "symbol": "XBT/USDT",
                    "bids": [{"price": 100.0, "qty": 1.5}],
                    "asks": [{"price": 100.5, "qty": 0.5}],
                }]
            })
            .to_string(),
        );
        let update = a.parse_depth(&msg).expect("should parse");
        assert_eq!(update.symbol, Symbol::parse("BTCUSDT").unwrap());
        assert_eq!(update.bids.len(), 1);
    }
}
