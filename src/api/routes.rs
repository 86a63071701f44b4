//! REST handlers.
//!
//! Grounded on the teacher's `api/routes.rs`: plain `axum` extractors,
//! one handler function per endpoint, `State<AppState>` threaded
//! through rather than ambient globals.

use axum::extract::{Path, Query, State};
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::exchange::Exchange;
use crate::symbol::Symbol;
use crate::twap::{OrderSnapshot, Side, TwapOrder};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}

/// `POST /auth/login?username=&password=`.
pub async fn login(
    State(state): State<AppState>,
    Query(query): Query<LoginQuery>,
) -> Result<Json<LoginResponse>, ApiError> {
    let token = state
        .auth
        .authenticate(&query.username, &query.password)
        .ok_or(ApiError::Unauthorized)?;
    Ok(Json(LoginResponse { token }))
}

/// `GET /exchanges` — public.
pub async fn list_exchanges() -> Json<Vec<&'static str>> {
    Json(Exchange::all().iter().map(|e| e.as_str()).collect())
}

/// `GET /pairs/{exchange}`.
pub async fn list_pairs(
    State(state): State<AppState>,
    Path(exchange): Path<String>,
) -> Result<Json<Vec<String>>, ApiError> {
    let exchange = Exchange::parse(&exchange).ok_or_else(|| ApiError::BadRequest(format!("unsupported exchange: {exchange}")))?;
    Ok(Json(
        state
            .symbol_universe
            .get(&exchange)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|s| s.as_str().to_string())
            .collect(),
    ))
}

#[derive(Debug, Deserialize)]
pub struct KlinesQuery {
    #[allow(dead_code)]
    pub interval: Option<String>,
    #[allow(dead_code)]
    pub limit: Option<u32>,
}

/// `GET /klines/{exchange}/{symbol}?interval=&limit=`. Honest 501: this
/// gateway sources live depth, not historical candles (SPEC_FULL.md §6).
pub async fn klines(
    Path((_exchange, _symbol)): Path<(String, String)>,
    Query(_query): Query<KlinesQuery>,
) -> ApiError {
    ApiError::NotImplemented("historical candles are not sourced by this gateway".to_string())
}

#[derive(Debug, Deserialize)]
pub struct SubmitTwapRequest {
    pub exchange: String,
    pub symbol: String,
    pub side: Side,
    pub total_qty: Decimal,
    pub slices: u32,
    pub duration_secs: u64,
    pub limit_price: Option<Decimal>,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct SubmitTwapResponse {
    pub order_id: Uuid,
    pub status: &'static str,
}

/// `POST /orders/twap` (and its `/twap` alias, per spec.md §9).
pub async fn submit_twap(
    State(state): State<AppState>,
    Json(request): Json<SubmitTwapRequest>,
) -> Result<Json<SubmitTwapResponse>, ApiError> {
    state.auth.verify_token(&request.token).ok_or(ApiError::Unauthorized)?;

    let exchange =
        Exchange::parse(&request.exchange).ok_or_else(|| ApiError::BadRequest(format!("unsupported exchange: {}", request.exchange)))?;
    let symbol = Symbol::parse(&request.symbol).ok_or_else(|| ApiError::BadRequest(format!("invalid symbol: {}", request.symbol)))?;
    if request.total_qty <= Decimal::ZERO {
        return Err(ApiError::BadRequest("total_qty must be positive".to_string()));
    }
    if request.slices == 0 {
        return Err(ApiError::BadRequest("slices must be >= 1".to_string()));
    }
    if request.duration_secs == 0 {
        return Err(ApiError::BadRequest("duration_secs must be positive".to_string()));
    }

    let order = TwapOrder::new(
        exchange,
        symbol.clone(),
        request.side,
        request.total_qty,
        request.slices,
        request.duration_secs,
        request.limit_price,
    );
    state.order_registry.insert(order.clone());
    state.subscription_registry.add_subscription(&symbol);

    let order_id = order.id;
    let aggregator = state.aggregator.clone();
    let registry = state.subscription_registry.clone();
    tokio::spawn(async move {
        crate::twap::engine::run(order, aggregator, registry).await;
    });

    Ok(Json(SubmitTwapResponse {
        order_id,
        status: "accepted",
    }))
}

#[derive(Debug, Deserialize)]
pub struct OrderStatusQuery {
    pub token: String,
}

/// `GET /orders/{order_id}?token=`.
pub async fn order_status(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Query(query): Query<OrderStatusQuery>,
) -> Result<Json<OrderSnapshot>, ApiError> {
    state.auth.verify_token(&query.token).ok_or(ApiError::Unauthorized)?;
    let order = state
        .order_registry
        .get(order_id)
        .ok_or_else(|| ApiError::NotFound(format!("no such order: {order_id}")))?;
    Ok(Json(order.snapshot()))
}
