//! HTTP surface: storefront order API, admin operations, and the
//! processor-facing payment endpoints.

mod orders;
mod payments;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::PagesConfig;
use crate::gateways::GatewayRegistry;
use crate::interfaces::GatewayError;
use crate::orders::{OrderError, OrderService};
use crate::settlement::Reconciler;

/// Shared state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<OrderService>,
    pub reconciler: Arc<Reconciler>,
    pub gateways: Arc<GatewayRegistry>,
    pub pages: PagesConfig,
}

/// Start the API server on the given address.
pub async fn serve(
    state: AppState,
    addr: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual = listener.local_addr()?;
    info!(addr = %actual, "storefront API listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Build the axum router (separated for testing).
pub fn router(state: AppState) -> Router {
    // The storefront and admin UIs are served from other origins.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route(
            "/orders",
            post(orders::create_order).get(orders::list_orders),
        )
        .route(
            "/orders/:id",
            get(orders::get_order)
                .patch(orders::update_order)
                .delete(orders::delete_order),
        )
        .route("/payments/:gateway/create", post(payments::create_payment))
        .route("/payments/card/webhook", post(payments::card_webhook))
        .route("/payments/checkout/return", get(payments::checkout_return))
        .route("/payments/wallet/return", get(payments::wallet_return))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health() -> StatusCode {
    StatusCode::OK
}

/// API error with its client-facing status and message.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    BadGateway(String),
    GatewayTimeout,
    Internal,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, message),
            ApiError::BadGateway(message) => (StatusCode::BAD_GATEWAY, message),
            ApiError::GatewayTimeout => (
                StatusCode::GATEWAY_TIMEOUT,
                "payment gateway timed out".to_string(),
            ),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error".to_string(),
            ),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

impl From<OrderError> for ApiError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::EmptyOrder
            | OrderError::ZeroQuantity
            | OrderError::UnknownProduct(_)
            | OrderError::AmountOverflow
            | OrderError::InvalidStatus { .. } => ApiError::BadRequest(e.to_string()),
            OrderError::NotFound(_) => ApiError::NotFound(e.to_string()),
            OrderError::Catalog(_) | OrderError::Store(_) => {
                error!(error = %e, "order operation failed");
                ApiError::Internal
            }
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Timeout => ApiError::GatewayTimeout,
            GatewayError::Unavailable(_) | GatewayError::Rejected(_) => {
                error!(error = %e, "payment request failed");
                ApiError::BadGateway("payment gateway request failed".to_string())
            }
            GatewayError::Verification(e) => ApiError::BadRequest(e.to_string()),
        }
    }
}
