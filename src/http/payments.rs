//! Payment handlers: request creation, the card webhook, and the
//! browser return endpoints.
//!
//! The webhook answers 200 "received" for anything that verified,
//! whether or not it changed state; a non-2xx would only make the
//! processor retry an event we have already judged. Signature failures
//! are the one exception and answer 400. The return endpoints always
//! answer with a redirect to a result page, never JSON and never
//! verification internals.

use std::collections::BTreeMap;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use super::{ApiError, AppState};
use crate::gateways::card::SIGNATURE_HEADER;
use crate::interfaces::{Callback, CallbackOutcome, PaymentRequest};
use crate::orders::{PaymentMethod, PaymentStatus};

#[derive(Deserialize)]
pub struct CreatePaymentBody {
    pub order_id: Uuid,
}

#[derive(Serialize)]
pub struct PaymentRequestBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
}

pub async fn create_payment(
    State(state): State<AppState>,
    Path(gateway): Path<String>,
    Json(body): Json<CreatePaymentBody>,
) -> Result<Json<PaymentRequestBody>, ApiError> {
    let adapter = state
        .gateways
        .by_slug(&gateway)
        .ok_or_else(|| ApiError::NotFound(format!("unknown payment gateway: {gateway}")))?;

    let order = state.orders.get_order(body.order_id).await?;
    if order.payment_status == PaymentStatus::Paid {
        return Err(ApiError::Conflict("order is already paid".to_string()));
    }

    let created = adapter.create_payment_request(&order).await?;
    state
        .orders
        .record_payment_request(order.id, adapter.method(), created.provisional_transaction_id)
        .await?;

    let body = match created.request {
        PaymentRequest::RedirectUrl(url) => PaymentRequestBody {
            redirect_url: Some(url),
            client_secret: None,
        },
        PaymentRequest::ClientSecret(secret) => PaymentRequestBody {
            redirect_url: None,
            client_secret: Some(secret),
        },
    };
    Ok(Json(body))
}

pub async fn card_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(adapter) = state.gateways.get(PaymentMethod::Card) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let Some(signature) = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) else {
        return (StatusCode::BAD_REQUEST, "missing signature").into_response();
    };

    let callback = Callback::Webhook {
        body: body.to_vec(),
        signature_header: signature.to_string(),
    };
    match adapter.verify_callback(callback).await {
        Err(e) => {
            warn!(error = %e, "webhook rejected");
            (StatusCode::BAD_REQUEST, "verification failed").into_response()
        }
        Ok(None) => (StatusCode::OK, "received").into_response(),
        Ok(Some(result)) => {
            if let Err(e) = state.reconciler.apply(&result).await {
                warn!(order_id = %result.order_id, error = %e, "webhook result not applied");
            }
            (StatusCode::OK, "received").into_response()
        }
    }
}

pub async fn checkout_return(
    State(state): State<AppState>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Redirect {
    gateway_return(state, PaymentMethod::Checkout, params).await
}

pub async fn wallet_return(
    State(state): State<AppState>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Redirect {
    gateway_return(state, PaymentMethod::Wallet, params).await
}

async fn gateway_return(
    state: AppState,
    method: PaymentMethod,
    params: BTreeMap<String, String>,
) -> Redirect {
    let Some(adapter) = state.gateways.get(method) else {
        return Redirect::to(&state.pages.failure_url);
    };

    match adapter.verify_callback(Callback::Return { params }).await {
        Ok(Some(result)) => {
            let success = matches!(result.outcome, CallbackOutcome::Success { .. });
            match state.reconciler.apply(&result).await {
                Ok(_) if success => Redirect::to(&state.pages.success_url),
                Ok(_) => Redirect::to(&state.pages.failure_url),
                Err(e) => {
                    warn!(order_id = %result.order_id, error = %e, "return result not applied");
                    Redirect::to(&state.pages.failure_url)
                }
            }
        }
        Ok(None) => Redirect::to(&state.pages.failure_url),
        Err(e) => {
            warn!(gateway = %method, error = %e, "return rejected");
            Redirect::to(&state.pages.failure_url)
        }
    }
}
