use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use till_core::services::DatabaseService;
use till_core::{Order, OrderId};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::error::AppError;

const DEFAULT_LIST_LIMIT: usize = 50;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    orders: DatabaseService,
}

impl AppState {
    pub async fn open(config: Arc<AppConfig>) -> till_core::Result<Self> {
        let orders = match &config.db_path {
            Some(path) => DatabaseService::open_path(path.clone()).await?,
            None => DatabaseService::open_in_memory().await?,
        };
        Ok(Self { config, orders })
    }
}

pub fn app_router(state: AppState) -> Router {
    let max_body_bytes = state.config.max_body_bytes;

    let v1 = Router::new().route("/orders", get(list_orders).post(receive_order));

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/v1", v1)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
    orders: usize,
}

async fn healthz(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    Ok(Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp(),
        orders: state.orders.ledger_count().await?,
    }))
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum ReceiptStatus {
    Accepted,
    Duplicate,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Receipt {
    status: ReceiptStatus,
    order_id: OrderId,
}

/// Stores an order once per id; replays are acknowledged without a second copy
async fn receive_order(
    State(state): State<AppState>,
    Json(order): Json<Order>,
) -> Result<(StatusCode, Json<Receipt>), AppError> {
    let inserted = state
        .orders
        .prepend_to_ledger(std::slice::from_ref(&order))
        .await?;

    let (status, receipt) = if inserted > 0 {
        (StatusCode::ACCEPTED, ReceiptStatus::Accepted)
    } else {
        (StatusCode::OK, ReceiptStatus::Duplicate)
    };
    tracing::info!(
        endpoint = "orders",
        order_id = %order.id,
        duplicate = receipt == ReceiptStatus::Duplicate,
        "Received order"
    );

    Ok((
        status,
        Json(Receipt {
            status: receipt,
            order_id: order.id,
        }),
    ))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OrdersResponse {
    orders: Vec<Order>,
    total: usize,
}

/// Most recently received first
async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<OrdersResponse>, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    if limit == 0 {
        return Err(AppError::BadRequest("limit must be at least 1".to_string()));
    }
    let limit = limit.min(state.config.max_list_limit);

    let orders = state.orders.ledger_orders(limit, 0).await?;
    let total = state.orders.ledger_count().await?;
    Ok(Json(OrdersResponse { orders, total }))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use serde_json::json;
    use till_core::sync::{HttpOrderTransport, OrderTransport};

    use super::*;

    async fn spawn_app() -> String {
        let config = Arc::new(AppConfig::from_lookup(|_| None).unwrap());
        let state = AppState::open(config).await.unwrap();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app_router(state)).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn repeated_order_is_acknowledged_as_duplicate() {
        let base = spawn_app().await;
        let client = reqwest::Client::new();
        let order = json!({"id": "ord_1", "total": 1500, "status": "pending"});

        let first = client
            .post(format!("{base}/v1/orders"))
            .json(&order)
            .send()
            .await
            .unwrap();
        assert_eq!(first.status(), reqwest::StatusCode::ACCEPTED);
        let receipt: Receipt = first.json().await.unwrap();
        assert_eq!(receipt.status, ReceiptStatus::Accepted);

        let second = client
            .post(format!("{base}/v1/orders"))
            .json(&order)
            .send()
            .await
            .unwrap();
        assert_eq!(second.status(), reqwest::StatusCode::OK);
        let receipt: Receipt = second.json().await.unwrap();
        assert_eq!(receipt.status, ReceiptStatus::Duplicate);

        let listed: OrdersResponse = client
            .get(format!("{base}/v1/orders"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(listed.total, 1);
        assert_eq!(serde_json::to_value(&listed.orders[0]).unwrap(), order);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn order_without_id_is_rejected() {
        let base = spawn_app().await;
        let response = reqwest::Client::new()
            .post(format!("{base}/v1/orders"))
            .json(&json!({"total": 100}))
            .send()
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn zero_limit_is_a_bad_request() {
        let base = spawn_app().await;
        let response = reqwest::get(format!("{base}/v1/orders?limit=0")).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn healthz_reports_order_count() {
        let base = spawn_app().await;
        let body: serde_json::Value = reqwest::get(format!("{base}/healthz"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["orders"], 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn register_transport_delivers_to_endpoint() {
        let base = spawn_app().await;
        let transport =
            HttpOrderTransport::new(format!("{base}/v1/orders"), Duration::from_secs(5)).unwrap();
        let order = Order::new(OrderId::new("ord_live").unwrap()).with_detail("total", 700);

        let delivery = transport.send(&order).await.unwrap();
        assert_eq!(delivery.status, 202);
        let replay = transport.send(&order).await.unwrap();
        assert_eq!(replay.status, 200);
    }
}
