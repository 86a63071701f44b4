//! C1 — Exchange Session.
//!
//! One long-lived upstream WebSocket per exchange. Owns the locally
//! tracked subscribed-symbol set and `latestBook`, and runs the perpetual
//! listen loop with reconnect-with-backoff.
//!
//! Grounded on the teacher's `scrapers/binance_session.rs`: the state
//! machine names and the backoff shape (base/multiplier/cap/jitter) are
//! carried over; the endpoint-rotation, circuit-breaker, and 24h
//! proactive-refresh machinery are not, since `spec.md` names no
//! counterpart for them.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use rand::Rng;
use tokio::net::TcpStream;
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::{Exchange, ExchangeAdapter};
use crate::book::OrderBookSnapshot;
use crate::symbol::Symbol;

/// `connecting -> connected -> (reconnecting)* -> closed`, per `spec.md` §4.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Connected,
    Reconnecting,
    Closed,
}

#[derive(Debug, Clone)]
pub struct BackoffConfig {
    pub base: Duration,
    pub max: Duration,
    pub multiplier: f64,
    pub jitter_factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            max: Duration::from_secs(30),
            multiplier: 2.0,
            jitter_factor: 0.2,
        }
    }
}

impl BackoffConfig {
    fn delay_for(&self, attempt: u32) -> Duration {
        let raw_ms = self.base.as_millis() as f64 * self.multiplier.powi(attempt as i32);
        let capped_ms = raw_ms.min(self.max.as_millis() as f64);
        let jitter = 1.0 + rand::thread_rng().gen_range(-self.jitter_factor..=self.jitter_factor);
        Duration::from_millis((capped_ms * jitter).max(0.0) as u64)
    }
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Owns one exchange's upstream connection, its locally tracked
/// subscribed-symbol set, and the latest standardised book per symbol.
pub struct ExchangeSession {
    adapter: Arc<dyn ExchangeAdapter>,
    subscribed: RwLock<HashSet<Symbol>>,
    latest_book: RwLock<HashMap<Symbol, Arc<OrderBookSnapshot>>>,
    outbound: Mutex<Option<tokio::sync::mpsc::UnboundedSender<tokio_tungstenite::tungstenite::Message>>>,
    state: RwLock<SessionState>,
    backoff: BackoffConfig,
    reconnect_attempts: AtomicU32,
}

impl ExchangeSession {
    pub fn new(adapter: Arc<dyn ExchangeAdapter>) -> Arc<Self> {
        Arc::new(Self {
            adapter,
            subscribed: RwLock::new(HashSet::new()),
            latest_book: RwLock::new(HashMap::new()),
            outbound: Mutex::new(None),
            state: RwLock::new(SessionState::Connecting),
            backoff: BackoffConfig::default(),
            reconnect_attempts: AtomicU32::new(0),
        })
    }

    pub fn exchange(&self) -> Exchange {
        self.adapter.name()
    }

    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Latest standardised snapshot for a symbol, if this venue has one.
    pub fn latest(&self, symbol: &Symbol) -> Option<Arc<OrderBookSnapshot>> {
        self.latest_book.read().get(symbol).cloned()
    }

    /// Idempotent: subscribes upstream only if the symbol isn't already
    /// tracked locally.
    pub fn subscribe(self: &Arc<Self>, symbol: Symbol) {
        let newly_inserted = self.subscribed.write().insert(symbol.clone());
        if !newly_inserted {
            return;
        }
        self.send_control(self.adapter.encode_subscribe(&[symbol]));
    }

    /// Idempotent: drops any stored snapshot for the symbol and
    /// unsubscribes upstream.
    pub fn unsubscribe(self: &Arc<Self>, symbol: Symbol) {
        let removed = self.subscribed.write().remove(&symbol);
        self.latest_book.write().remove(&symbol);
        if removed {
            self.send_control(self.adapter.encode_unsubscribe(&[symbol]));
        }
    }

    fn send_control(&self, msg: tokio_tungstenite::tungstenite::Message) {
        if let Some(tx) = self.outbound.lock().as_ref() {
            let _ = tx.send(msg);
        }
    }

    /// Perpetual connect -> listen -> reconnect loop. Runs until the
    /// owning task is dropped (process shutdown); never returns early on
    /// transient failure.
    pub async fn run(self: Arc<Self>) {
        loop {
            *self.state.write() = SessionState::Connecting;
            match connect_async(self.adapter.ws_url()).await {
                Ok((stream, _)) => {
                    self.reconnect_attempts.store(0, Ordering::Relaxed);
                    *self.state.write() = SessionState::Connected;
                    info!(exchange = %self.exchange(), "exchange session connected");
                    self.resubscribe_all();
                    self.listen_loop(stream).await;
                }
                Err(err) => {
                    warn!(exchange = %self.exchange(), error = %err, "exchange connect failed");
                }
            }

            // Disconnect (or failed connect): invalidate snapshots so
            // stale data is never merged, then back off before retrying.
            self.latest_book.write().clear();
            *self.state.write() = SessionState::Reconnecting;
            let attempt = self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
            let delay = self.backoff.delay_for(attempt);
            debug!(exchange = %self.exchange(), attempt, delay_ms = delay.as_millis() as u64, "reconnecting after backoff");
            sleep(delay).await;
        }
    }

    fn resubscribe_all(self: &Arc<Self>) {
        let symbols: Vec<Symbol> = self.subscribed.read().iter().cloned().collect();
        if symbols.is_empty() {
            return;
        }
        self.send_control(self.adapter.encode_subscribe(&symbols));
    }

    async fn listen_loop(self: &Arc<Self>, stream: WsStream) {
        let (mut write, mut read) = stream.split();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        *self.outbound.lock() = Some(tx);
        self.resubscribe_all();

        loop {
            tokio::select! {
                outbound = rx.recv() => {
                    match outbound {
                        Some(msg) => {
                            if write.send(msg).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                incoming = read.next() => {
                    match incoming {
                        Some(Ok(msg)) => self.handle_message(&msg),
                        Some(Err(err)) => {
                            warn!(exchange = %self.exchange(), error = %err, "transport error");
                            break;
                        }
                        None => break,
                    }
                }
            }
        }

        *self.outbound.lock() = None;
    }

    fn handle_message(self: &Arc<Self>, msg: &tokio_tungstenite::tungstenite::Message) {
        let Some(update) = self.adapter.parse_depth(msg) else {
            return;
        };
        if !self.subscribed.read().contains(&update.symbol) {
            // Unsubscribed / unknown symbol: silently discard.
            return;
        }

        let snapshot = OrderBookSnapshot::standardise(self.exchange(), update.symbol.clone(), update.bids, update.asks);
        if snapshot.is_crossed() {
            warn!(exchange = %self.exchange(), symbol = %update.symbol, "rejecting crossed single-venue snapshot");
            return;
        }

        self.latest_book.write().insert(update.symbol, Arc::new(snapshot));
    }

    /// Test-only: publish a pre-built snapshot without a live socket,
    /// exercising the same storage path `handle_message` uses.
    #[cfg(test)]
    pub fn test_insert_snapshot(&self, symbol: Symbol, snapshot: OrderBookSnapshot) {
        self.latest_book.write().insert(symbol, Arc::new(snapshot));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps() {
        let cfg = BackoffConfig {
            base: Duration::from_millis(100),
            max: Duration::from_secs(1),
            multiplier: 2.0,
            jitter_factor: 0.0,
        };
        assert_eq!(cfg.delay_for(0), Duration::from_millis(100));
        assert_eq!(cfg.delay_for(1), Duration::from_millis(200));
        assert_eq!(cfg.delay_for(10), Duration::from_secs(1));
    }
}
