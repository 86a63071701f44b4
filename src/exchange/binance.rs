//! Binance spot adapter: wire symbols are lower-case and slash-free
//! (e.g. `btcusdt`), and the depth-10 partial-book-depth stream is used
//! directly rather than combined-stream framing, to keep parsing simple.

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message;
use tracing::trace;

use super::{DepthUpdate, Exchange, ExchangeAdapter};
use crate::book::PriceLevel;
use crate::symbol::Symbol;

pub struct BinanceAdapter {
    ws_url: String,
}

impl BinanceAdapter {
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self { ws_url: ws_url.into() }
    }
}

#[derive(Deserialize)]
struct DepthFrame {
    #[serde(default)]
    bids: Vec<[String; 2]>,
    #[serde(default)]
    asks: Vec<[String; 2]>,
}

fn levels(raw: &[[String; 2]]) -> Vec<PriceLevel> {
    raw.iter()
        .filter_map(|[p, q]| {
            let price: Decimal = p.parse().ok()?;
            let quantity: Decimal = q.parse().ok()?;
            Some(PriceLevel::new(price, quantity))
        })
        .collect()
}

impl ExchangeAdapter for BinanceAdapter {
    fn name(&self) -> Exchange {
        Exchange::Binance
    }

    fn ws_url(&self) -> &str {
        &self.ws_url
    }

    fn to_native_symbol(&self, symbol: &Symbol) -> String {
        symbol.as_str().to_ascii_lowercase()
    }

    fn from_native_symbol(&self, native: &str) -> Option<Symbol> {
        Symbol::parse(native)
    }

    fn encode_subscribe(&self, symbols: &[Symbol]) -> Message {
        let params: Vec<String> = symbols
            .iter()
            .map(|s| format!("{}@depth10@1000ms", self.to_native_symbol(s)))
            .collect();
        Message::Text(
            serde_json::json!({
                "method": "SUBSCRIBE",
                "params": params,
                "id": 1,
            })
            .to_string(),
        )
    }

    fn encode_unsubscribe(&self, symbols: &[Symbol]) -> Message {
        let params: Vec<String> = symbols
            .iter()
            .map(|s| format!("{}@depth10@1000ms", self.to_native_symbol(s)))
            .collect();
        Message::Text(
            serde_json::json!({
                "method": "UNSUBSCRIBE",
                "params": params,
                "id": 2,
            })
            .to_string(),
        )
    }

    fn parse_depth(&self, msg: &Message) -> Option<DepthUpdate> {
        let Message::Text(text) = msg else {
            return None;
        };
        let value: Value = serde_json::from_str(text).ok()?;

        // Subscription acks look like `{"result":null,"id":1}` and carry
        // no symbol; nothing to standardise.
        if value.get("result").is_some() {
            return None;
        }

        // This adapter subscribes one stream per symbol, so the stream
        // name (carried out-of-band by the caller via the open
        // subscription set) is not in the frame itself; callers resolve
        // the symbol for a raw `<symbol>@depth10` stream from their own
        // subscribed-symbol set when only one symbol is outstanding. For
        // combined-stream deployments the `stream` field disambiguates.
        let symbol = value
            .get("stream")
            .and_then(Value::as_str)
            .and_then(|s| s.split('@').next())
            .and_then(|native| self.from_native_symbol(native));

        let data = value.get("data").unwrap_or(&value);
        let frame: DepthFrame = serde_json::from_value(data.clone()).ok()?;

        let symbol = symbol.or_else(|| {
            trace!("binance depth frame without a resolvable symbol, dropping");
            None
        })?;

        Some(DepthUpdate {
            symbol,
            bids: levels(&frame.bids),
            asks: levels(&frame.asks),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_native_lowercases() {
        let a = BinanceAdapter::new("wss://example");
        assert_eq!(a.to_native_symbol(&Symbol::parse("BTCUSDT").unwrap()), "btcusdt");
    }

    #[test]
    fn parses_combined_stream_depth_frame() {
        let a = BinanceAdapter::new("wss://example");
        let msg = Message::Text(
            serde_json::json!({
                "stream": "btcusdt@depth10@1000ms",
                "data": {
                    "lastUpdateId": 1,
                    "bids": [["100.00", "1.5"], ["99.50", "2.0"]],
                    "asks": [["100.50", "0.5"]],
                }
            })
            .to_string(),
        );
        let update = a.parse_depth(&msg).expect("should parse");
        assert_eq!(update.symbol, Symbol::parse("BTCUSDT").unwrap());
        assert_eq!(update.bids.len(), 2);
        assert_eq!(update.asks.len(), 1);
    }

    #[test]
    fn subscription_ack_is_ignored() {
        let a = BinanceAdapter::new("wss://example");
        let msg = Message::Text(r#"{"result":null,"id":1}"#.to_string());
        assert!(a.parse_depth(&msg).is_none());
    }
}
