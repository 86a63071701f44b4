//! C4 — Client Session.
//!
//! One per downstream WebSocket subscriber. Grounded on the teacher's
//! `main.rs` `handle_socket`: the same `tokio::select!` shape over an
//! inbound stream and a periodic outbound tick, generalised from a
//! broadcast-replay feed to per-session authenticate/subscribe commands
//! and a per-session ticker (`spec.md` §4.4).

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::aggregator::Aggregator;
use crate::auth::AuthFacade;
use crate::registry::SubscriptionRegistry;
use crate::symbol::Symbol;

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
enum InboundCommand {
    Authenticate { token: String },
    Subscribe { symbol: String },
    Unsubscribe { symbol: String },
}

#[derive(Serialize)]
struct OrderBookFrame<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    symbol: &'a str,
    bids: &'a [crate::book::PriceLevel],
    asks: &'a [crate::book::PriceLevel],
}

/// Drives one client connection end-to-end: authenticate/subscribe
/// command loop plus the per-session ticker, until disconnect. Always
/// releases every subscription still held on the way out (`spec.md`
/// §4.4's "leaking subscriptions ... is a critical bug").
pub async fn handle_socket(
    mut socket: WebSocket,
    auth: Arc<AuthFacade>,
    aggregator: Arc<Aggregator>,
    registry: Arc<SubscriptionRegistry>,
    tick_period: Duration,
) {
    let mut authenticated = false;
    let mut subscriptions: HashSet<Symbol> = HashSet::new();
    let mut ticker = tokio::time::interval(tick_period);
    // The first tick fires immediately; skip it so a client isn't sent
    // an empty/short-lived frame before it has had a chance to subscribe.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if send_tick(&mut socket, &aggregator, &subscriptions).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if !handle_inbound(&text, &mut socket, &auth, &registry, &mut authenticated, &mut subscriptions).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!(error = %err, "client session transport error");
                        break;
                    }
                }
            }
        }
    }

    for symbol in subscriptions.drain() {
        registry.remove_subscription(&symbol);
    }
    debug!("client session closed, subscriptions released");
}

/// Returns `false` if the underlying socket should be torn down (send failed).
async fn handle_inbound(
    text: &str,
    socket: &mut WebSocket,
    auth: &AuthFacade,
    registry: &SubscriptionRegistry,
    authenticated: &mut bool,
    subscriptions: &mut HashSet<Symbol>,
) -> bool {
    let Ok(command) = serde_json::from_str::<InboundCommand>(text) else {
        // Unparseable frame: ignored, not a fatal error for the session.
        return true;
    };

    match command {
        InboundCommand::Authenticate { token } => {
            *authenticated = auth.verify_token(&token).is_some();
            let reply = if *authenticated {
                json!({ "authenticated": true })
            } else {
                json!({ "error": "Invalid token" })
            };
            return send_json(socket, &reply).await;
        }
        InboundCommand::Subscribe { symbol } => {
            if !*authenticated {
                return true;
            }
            if let Some(symbol) = Symbol::parse(&symbol) {
                if subscriptions.insert(symbol.clone()) {
                    registry.add_subscription(&symbol);
                }
            }
        }
        InboundCommand::Unsubscribe { symbol } => {
            if !*authenticated {
                return true;
            }
            if let Some(symbol) = Symbol::parse(&symbol) {
                if subscriptions.remove(&symbol) {
                    registry.remove_subscription(&symbol);
                }
            }
        }
    }
    true
}

async fn send_tick(socket: &mut WebSocket, aggregator: &Aggregator, subscriptions: &HashSet<Symbol>) -> Result<(), axum::Error> {
    let books: Vec<(&Symbol, crate::book::MergedBook)> = subscriptions
        .iter()
        .filter_map(|symbol| aggregator.merged_book_for(symbol).map(|book| (symbol, book)))
        .collect();
    if books.is_empty() {
        return Ok(());
    }

    let frames: Vec<OrderBookFrame> = books
        .iter()
        .map(|(symbol, book)| OrderBookFrame {
            kind: "order_book",
            symbol: symbol.as_str(),
            bids: &book.bids,
            asks: &book.asks,
        })
        .collect();
    let text = serde_json::to_string(&frames).unwrap_or_else(|_| "[]".to_string());
    socket.send(Message::Text(text)).await
}

async fn send_json(socket: &mut WebSocket, value: &serde_json::Value) -> bool {
    socket.send(Message::Text(value.to_string())).await.is_ok()
}
