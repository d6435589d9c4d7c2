use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use gateway_core::*;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info_span, warn, Instrument};
use uuid::Uuid;

pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Health
        .route("/health", get(health_check))
        // Broker operations
        .route("/balance/{broker}/{account}", get(get_balance))
        .route("/trade/{broker}/{account}", post(execute_trade))
        .route("/deposit/{broker}/{account}", post(deposit))
        .route("/withdraw/{broker}/{account}", post(withdraw))
        .route("/market-data/{symbol}", get(market_data))
        // Engine control (advisory flag only)
        .route("/engine/start", post(engine_start))
        .route("/engine/stop", post(engine_stop))
        .route("/engine/emergency-stop", post(engine_emergency_stop))
        .route("/engine/status", get(engine_status))
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ---------------------------------------------------------------------------
// Request resolution
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct CredentialQuery {
    password: Option<String>,
    server: Option<String>,
}

/// Build the per-request account from path and query. Margin-FX
/// credentials come from the query, falling back to the startup
/// environment values; missing values are forwarded empty rather than
/// rejected (the terminal reports its own login failures).
fn resolve_account(
    state: &AppState,
    broker: &str,
    account_id: String,
    query: CredentialQuery,
) -> Result<BrokerAccount, ApiError> {
    let kind: BrokerKind = broker.parse()?;
    let credentials = match kind {
        BrokerKind::MarginFx => {
            let password = query
                .password
                .or_else(|| state.fallback_credentials.password.clone());
            let server = query
                .server
                .or_else(|| state.fallback_credentials.server.clone());
            Some(Credentials {
                password: password.unwrap_or_default(),
                server: server.unwrap_or_default(),
            })
        }
        // Authenticated once at startup; nothing per-request.
        BrokerKind::CryptoExchange => None,
    };
    Ok(BrokerAccount {
        broker: kind,
        account_id,
        credentials,
    })
}

/// Unwrap a JSON body, turning extractor rejections into the structured
/// validation shape instead of axum's plain-text default.
fn require_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => Err(ApiError::Validation(rejection.body_text())),
    }
}

// ---------------------------------------------------------------------------
// Broker operations
// ---------------------------------------------------------------------------

async fn get_balance(
    State(state): State<Arc<AppState>>,
    Path((broker, account_id)): Path<(String, String)>,
    Query(query): Query<CredentialQuery>,
) -> Result<Json<BalanceSnapshot>, ApiError> {
    let account = resolve_account(&state, &broker, account_id, query)?;
    let span = info_span!(
        "balance",
        request_id = %Uuid::new_v4(),
        broker = %account.broker,
        account = %account.account_id,
    );
    let snapshot = state
        .registry
        .adapter(account.broker)
        .balance(&account)
        .instrument(span)
        .await?;
    Ok(Json(snapshot))
}

async fn execute_trade(
    State(state): State<Arc<AppState>>,
    Path((broker, account_id)): Path<(String, String)>,
    Query(query): Query<CredentialQuery>,
    body: Result<Json<TradeRequest>, JsonRejection>,
) -> Result<Json<TradeResult>, ApiError> {
    let request = require_body(body)?;
    request.validate()?;
    let account = resolve_account(&state, &broker, account_id, query)?;

    if !state.engine.is_running() {
        // Advisory only: the trade goes through regardless.
        warn!(broker = %account.broker, "trade submitted while the engine flag reads stopped");
    }

    let span = info_span!(
        "trade",
        request_id = %Uuid::new_v4(),
        broker = %account.broker,
        account = %account.account_id,
        symbol = %request.symbol,
    );
    let result = state
        .registry
        .adapter(account.broker)
        .execute_trade(&account, &request)
        .instrument(span)
        .await?;
    Ok(Json(result))
}

async fn deposit(
    State(state): State<Arc<AppState>>,
    Path((broker, account_id)): Path<(String, String)>,
    Query(query): Query<CredentialQuery>,
    body: Result<Json<TransferRequest>, JsonRejection>,
) -> Result<Json<TransferResult>, ApiError> {
    let request = require_body(body)?;
    request.validate_deposit()?;
    let account = resolve_account(&state, &broker, account_id, query)?;
    let span = info_span!(
        "deposit",
        request_id = %Uuid::new_v4(),
        broker = %account.broker,
        account = %account.account_id,
    );
    let result = state
        .registry
        .adapter(account.broker)
        .deposit(&account, &request)
        .instrument(span)
        .await?;
    Ok(Json(result))
}

async fn withdraw(
    State(state): State<Arc<AppState>>,
    Path((broker, account_id)): Path<(String, String)>,
    Query(query): Query<CredentialQuery>,
    body: Result<Json<TransferRequest>, JsonRejection>,
) -> Result<Json<TransferResult>, ApiError> {
    let request = require_body(body)?;
    request.validate_withdrawal()?;
    let account = resolve_account(&state, &broker, account_id, query)?;
    let span = info_span!(
        "withdraw",
        request_id = %Uuid::new_v4(),
        broker = %account.broker,
        account = %account.account_id,
    );
    let result = state
        .registry
        .adapter(account.broker)
        .withdraw(&account, &request)
        .instrument(span)
        .await?;
    Ok(Json(result))
}

#[derive(Debug, Default, Deserialize)]
struct MarketDataQuery {
    broker: Option<String>,
}

/// Market data defaults to the margin-FX terminal (the venue the
/// dashboard charts come from); `?broker=` selects the exchange ticker
/// instead.
async fn market_data(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    Query(query): Query<MarketDataQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let kind = match query.broker.as_deref() {
        Some(name) => name.parse::<BrokerKind>()?,
        None => BrokerKind::MarginFx,
    };
    let span = info_span!(
        "market_data",
        request_id = %Uuid::new_v4(),
        broker = %kind,
        symbol = %symbol,
    );
    let payload = state
        .registry
        .adapter(kind)
        .market_data(&symbol)
        .instrument(span)
        .await?;
    Ok(Json(payload))
}

// ---------------------------------------------------------------------------
// Engine control
// ---------------------------------------------------------------------------

async fn engine_start(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.engine.start() {
        Json(serde_json::json!({ "status": "started" }))
    } else {
        Json(serde_json::json!({ "status": "already running" }))
    }
}

async fn engine_stop(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.engine.stop() {
        Json(serde_json::json!({ "status": "stopped" }))
    } else {
        Json(serde_json::json!({ "status": "not running" }))
    }
}

async fn engine_emergency_stop(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.engine.stop();
    warn!("emergency stop triggered");
    Json(serde_json::json!({ "status": "emergency stop triggered" }))
}

async fn engine_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({ "running": state.engine.is_running() }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::FallbackCredentials;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use gateway_brokers_common::{BrokerRegistry, SimulatedAdapter};
    use tower::ServiceExt;

    fn test_state() -> (Arc<AppState>, Arc<SimulatedAdapter>, Arc<SimulatedAdapter>) {
        let margin = Arc::new(SimulatedAdapter::default());
        let crypto = Arc::new(SimulatedAdapter::default());
        let registry = BrokerRegistry::new(margin.clone(), crypto.clone());
        let state = Arc::new(AppState::new(registry, FallbackCredentials::default()));
        (state, margin, crypto)
    }

    fn app(state: Arc<AppState>) -> Router {
        api_routes().with_state(state)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn post_empty(uri: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    fn trade_body() -> serde_json::Value {
        serde_json::json!({
            "symbol": "BTC/USDT",
            "order_type": "market",
            "side": "buy",
            "quantity": "0.01",
        })
    }

    #[tokio::test]
    async fn test_unknown_broker_same_shape_for_every_operation() {
        let (state, ..) = test_state();

        let balance = app(state.clone())
            .oneshot(get("/balance/robinhood/123"))
            .await
            .unwrap();
        assert_eq!(balance.status(), StatusCode::BAD_REQUEST);
        let balance_body = body_json(balance).await;

        let trade = app(state)
            .oneshot(post_json("/trade/robinhood/123", trade_body()))
            .await
            .unwrap();
        assert_eq!(trade.status(), StatusCode::BAD_REQUEST);
        let trade_body = body_json(trade).await;

        assert_eq!(balance_body, trade_body);
        assert_eq!(balance_body["error"], "unsupported broker: robinhood");
    }

    #[tokio::test]
    async fn test_balance_payload_passes_through_unchanged() {
        let (state, _, crypto) = test_state();
        let response = app(state)
            .oneshot(get("/balance/crypto_exchange/main"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({ "USDT": "10000" })
        );
        assert_eq!(crypto.balance_calls(), 1);
    }

    #[tokio::test]
    async fn test_identical_queries_hit_the_adapter_twice() {
        let (state, _, crypto) = test_state();
        for _ in 0..2 {
            let response = app(state.clone())
                .oneshot(get("/balance/crypto_exchange/main"))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
        assert_eq!(crypto.balance_calls(), 2);
    }

    #[tokio::test]
    async fn test_trade_validation_rejects_before_dispatch() {
        let (state, _, crypto) = test_state();
        let mut body = trade_body();
        body["quantity"] = serde_json::json!("0");
        let response = app(state)
            .oneshot(post_json("/trade/crypto_exchange/main", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("quantity"));
        assert_eq!(crypto.trade_calls(), 0);
    }

    #[tokio::test]
    async fn test_malformed_body_is_a_structured_error() {
        let (state, ..) = test_state();
        let response = app(state)
            .oneshot(post_json(
                "/trade/crypto_exchange/main",
                serde_json::json!({ "symbol": "BTC/USDT", "side": "hold" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_withdraw_requires_an_address() {
        let (state, _, crypto) = test_state();
        let response = app(state)
            .oneshot(post_json(
                "/withdraw/crypto_exchange/main",
                serde_json::json!({ "amount": "100", "currency": "USDT" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(crypto.transfer_calls(), 0);
    }

    #[tokio::test]
    async fn test_deposit_needs_no_address() {
        let (state, ..) = test_state();
        let response = app(state)
            .oneshot(post_json(
                "/deposit/crypto_exchange/main",
                serde_json::json!({ "amount": "100", "currency": "USDT" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "pending");
    }

    #[tokio::test]
    async fn test_adapter_failure_keeps_kind_and_retryability() {
        let (state, _, crypto) = test_state();
        crypto.fail_with(AdapterErrorKind::NetworkFailure);
        let response = app(state)
            .oneshot(get("/balance/crypto_exchange/main"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_json(response).await;
        assert_eq!(body["kind"], "network_failure");
        assert_eq!(body["retryable"], true);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_timeout_maps_to_gateway_timeout() {
        let (state, margin, _) = test_state();
        margin.fail_with(AdapterErrorKind::Timeout);
        let response = app(state)
            .oneshot(get("/balance/margin_fx/1001?password=pw&server=srv"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        let body = body_json(response).await;
        assert_eq!(body["kind"], "timeout");
        assert_eq!(body["retryable"], true);
    }

    #[tokio::test]
    async fn test_market_data_defaults_to_margin_fx() {
        let (state, margin, crypto) = test_state();
        let response = app(state.clone())
            .oneshot(get("/market-data/EURUSD"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(margin.market_data_calls(), 1);
        assert_eq!(crypto.market_data_calls(), 0);

        let response = app(state)
            .oneshot(get("/market-data/BTCUSDT?broker=crypto_exchange"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(crypto.market_data_calls(), 1);
    }

    #[tokio::test]
    async fn test_engine_control_round_trip() {
        let (state, ..) = test_state();

        let status = app(state.clone()).oneshot(get("/engine/status")).await.unwrap();
        assert_eq!(body_json(status).await["running"], false);

        let started = app(state.clone())
            .oneshot(post_empty("/engine/start"))
            .await
            .unwrap();
        assert_eq!(body_json(started).await["status"], "started");

        let again = app(state.clone())
            .oneshot(post_empty("/engine/start"))
            .await
            .unwrap();
        assert_eq!(body_json(again).await["status"], "already running");

        let stopped = app(state.clone())
            .oneshot(post_empty("/engine/emergency-stop"))
            .await
            .unwrap();
        assert_eq!(
            body_json(stopped).await["status"],
            "emergency stop triggered"
        );

        let status = app(state).oneshot(get("/engine/status")).await.unwrap();
        assert_eq!(body_json(status).await["running"], false);
    }

    #[tokio::test]
    async fn test_trades_execute_even_while_engine_is_stopped() {
        // The run/stop flag is advisory by design; this pins the gap.
        let (state, _, crypto) = test_state();
        assert!(!state.engine.is_running());
        let response = app(state)
            .oneshot(post_json("/trade/crypto_exchange/main", trade_body()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "filled");
        assert_eq!(crypto.trade_calls(), 1);
    }
}
