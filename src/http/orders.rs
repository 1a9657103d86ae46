//! Order CRUD handlers.
//!
//! Status and delete are admin operations; authentication happens at
//! the gateway in front of this service.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use super::{ApiError, AppState};
use crate::orders::{NewOrder, Order, OrderStatus};

pub async fn create_order(
    State(state): State<AppState>,
    Json(draft): Json<NewOrder>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let order = state.orders.create_order(draft).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn list_orders(State(state): State<AppState>) -> Result<Json<Vec<Order>>, ApiError> {
    Ok(Json(state.orders.list_orders().await?))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, ApiError> {
    Ok(Json(state.orders.get_order(id).await?))
}

#[derive(Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
    #[serde(default)]
    pub paid: bool,
}

pub async fn update_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<Order>, ApiError> {
    let order = state
        .orders
        .update_status(id, update.status, update.paid)
        .await?;
    Ok(Json(order))
}

pub async fn delete_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.orders.delete_order(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
