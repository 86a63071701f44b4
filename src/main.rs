//! Crypto market-data aggregation and TWAP execution gateway.
//!
//! Bootstraps one `ExchangeSession` (C1) per configured venue, wires
//! them into the shared `SubscriptionRegistry` (C2) and `Aggregator`
//! (C3), and serves the downstream REST + WebSocket surface (C4) on top.

mod aggregator;
mod api;
mod auth;
mod book;
mod client;
mod config;
mod error;
mod exchange;
mod registry;
mod symbol;
mod twap;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use aggregator::Aggregator;
use auth::{AuthFacade, InMemoryCredentialStore};
use config::Config;
use exchange::{binance::BinanceAdapter, kraken::KrakenAdapter, Exchange, ExchangeSession};
use registry::SubscriptionRegistry;
use symbol::Symbol;
use twap::OrderRegistry;

/// Explicitly constructed, cheaply cloneable server state threaded
/// through every handler via `State<AppState>` — no ambient globals.
#[derive(Clone)]
struct AppState {
    auth: Arc<AuthFacade>,
    aggregator: Arc<Aggregator>,
    subscription_registry: Arc<SubscriptionRegistry>,
    order_registry: Arc<OrderRegistry>,
    symbol_universe: Arc<HashMap<Exchange, Vec<Symbol>>>,
    client_tick_period: Duration,
}

/// The symbol universe this gateway tracks per venue. A fixed seed list
/// rather than discovered from an exchange's instruments endpoint —
/// `spec.md` scopes symbol discovery out (§1 Non-goals).
fn seed_symbol_universe() -> HashMap<Exchange, Vec<Symbol>> {
    let symbols = ["BTCUSDT", "ETHUSDT", "SOLUSDT"]
        .iter()
        .filter_map(|s| Symbol::parse(s))
        .collect::<Vec<_>>();
    let mut map = HashMap::new();
    map.insert(Exchange::Binance, symbols.clone());
    map.insert(Exchange::Kraken, symbols);
    map
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Config::from_env();
    info!(port = config.port, "starting aggregation gateway");

    let binance = ExchangeSession::new(Arc::new(BinanceAdapter::new(&config.binance_ws_url)));
    let kraken = ExchangeSession::new(Arc::new(KrakenAdapter::new(&config.kraken_ws_url)));
    let sessions = vec![binance.clone(), kraken.clone()];

    tokio::spawn(binance.clone().run());
    tokio::spawn(kraken.clone().run());

    let aggregator = Arc::new(Aggregator::new(sessions.clone()));
    let subscription_registry = Arc::new(SubscriptionRegistry::new(sessions));
    let order_registry = Arc::new(OrderRegistry::new());

    let credential_store = InMemoryCredentialStore::new(config.seed_users.clone())?;
    let auth = Arc::new(AuthFacade::new(Box::new(credential_store)));

    let state = AppState {
        auth,
        aggregator,
        subscription_registry,
        order_registry,
        symbol_universe: Arc::new(seed_symbol_universe()),
        client_tick_period: Duration::from_secs(config.client_tick_period_secs),
    };

    let app = Router::new()
        .route("/auth/login", post(api::login))
        .route("/exchanges", get(api::list_exchanges))
        .route("/pairs/:exchange", get(api::list_pairs))
        .route("/klines/:exchange/:symbol", get(api::klines))
        .route("/orders/twap", post(api::submit_twap))
        .route("/twap", post(api::submit_twap))
        .route("/orders/:order_id", get(api::order_status))
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "gateway listening");
    axum::serve(listener, app).await?;

    Ok(())
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| {
        client::handle_socket(
            socket,
            state.auth,
            state.aggregator,
            state.subscription_registry,
            state.client_tick_period,
        )
    })
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aggregator_gateway=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
