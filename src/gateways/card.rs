//! Card gateway: payment intents confirmed by a signed webhook.
//!
//! The outbound call creates a remote payment intent keyed by the amount
//! in the processor's minor unit, with the order id carried in opaque
//! metadata. The intent id is stored on the order immediately as a
//! provisional transaction reference; proof of payment only ever arrives
//! through the webhook, whose envelope is authenticated by recomputing
//! an HMAC over the raw request body within a replay tolerance window.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::config::CardConfig;
use crate::gateways::{build_client, sign_sha256, transport_error, verify_sha256};
use crate::interfaces::gateway::{
    Callback, CallbackOutcome, CreatedPayment, GatewayError, PaymentGateway, PaymentRequest,
    Result, VerificationFailure, VerifiedResult,
};
use crate::orders::{Order, PaymentMethod};

/// Header carrying the webhook signature envelope, `t=<unix>,v1=<hex>`.
pub const SIGNATURE_HEADER: &str = "x-payment-signature";

const INTENT_PATH: &str = "/v1/payment_intents";

const EVENT_SUCCEEDED: &str = "payment_intent.succeeded";
const EVENT_FAILED: &str = "payment_intent.payment_failed";

/// Adapter for the card processor.
pub struct CardGateway {
    client: reqwest::Client,
    config: CardConfig,
    /// Minor-unit multiplier, never zero.
    scale: i64,
}

#[derive(Deserialize)]
struct PaymentIntent {
    id: String,
    client_secret: String,
}

#[derive(Deserialize)]
struct WebhookEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: WebhookData,
}

#[derive(Deserialize)]
struct WebhookData {
    object: IntentObject,
}

#[derive(Deserialize)]
struct IntentObject {
    id: String,
    amount: i64,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

impl CardGateway {
    pub fn new(config: CardConfig, timeout: Duration) -> Result<Self> {
        let client = build_client(timeout)?;
        let scale = i64::from(config.minor_unit_scale.max(1));
        Ok(Self {
            client,
            config,
            scale,
        })
    }

    fn verify_webhook(&self, body: &[u8], header: &str) -> Result<Option<VerifiedResult>> {
        let (timestamp, signature_hex) = parse_signature_header(header)?;

        let now = Utc::now().timestamp();
        if (now - timestamp).abs() > self.config.tolerance_secs {
            return Err(VerificationFailure::StaleTimestamp.into());
        }

        // The signature covers "<t>.<raw body>"; the body must be the
        // exact bytes received, never a re-serialization.
        let mut payload = Vec::with_capacity(body.len() + 24);
        payload.extend_from_slice(timestamp.to_string().as_bytes());
        payload.push(b'.');
        payload.extend_from_slice(body);
        verify_sha256(
            self.config.webhook_secret.as_bytes(),
            &payload,
            &signature_hex,
        )?;

        let event: WebhookEvent = serde_json::from_slice(body)
            .map_err(|e| VerificationFailure::Malformed(format!("event body: {e}")))?;

        let success = match event.event_type.as_str() {
            EVENT_SUCCEEDED => true,
            EVENT_FAILED => false,
            // Authentic but not a settlement event; acknowledge and drop.
            _ => return Ok(None),
        };

        let intent = event.data.object;
        let order_id = intent
            .metadata
            .get("order_id")
            .ok_or(VerificationFailure::MissingField("metadata.order_id"))?;
        let order_id = Uuid::parse_str(order_id)
            .map_err(|e| VerificationFailure::Malformed(format!("metadata.order_id: {e}")))?;

        let outcome = if success {
            CallbackOutcome::Success {
                transaction_id: intent.id,
            }
        } else {
            CallbackOutcome::Failure { code: None }
        };

        Ok(Some(VerifiedResult {
            order_id,
            amount: intent.amount / self.scale,
            outcome,
        }))
    }
}

#[async_trait]
impl PaymentGateway for CardGateway {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::Card
    }

    async fn create_payment_request(&self, order: &Order) -> Result<CreatedPayment> {
        let amount_minor = order
            .total_amount
            .checked_mul(self.scale)
            .ok_or_else(|| GatewayError::Rejected("amount exceeds processor range".into()))?;

        let params = [
            ("amount", amount_minor.to_string()),
            ("currency", self.config.currency.clone()),
            ("metadata[order_id]", order.id.to_string()),
        ];

        let response = self
            .client
            .post(format!("{}{}", self.config.api_base, INTENT_PATH))
            .basic_auth(&self.config.api_key, None::<&str>)
            .form(&params)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(GatewayError::Rejected(format!(
                "intent creation returned {}",
                response.status()
            )));
        }
        let intent: PaymentIntent = response.json().await.map_err(transport_error)?;

        Ok(CreatedPayment {
            request: PaymentRequest::ClientSecret(intent.client_secret),
            provisional_transaction_id: Some(intent.id),
        })
    }

    async fn verify_callback(&self, callback: Callback) -> Result<Option<VerifiedResult>> {
        match callback {
            Callback::Webhook {
                body,
                signature_header,
            } => self.verify_webhook(&body, &signature_header),
            Callback::Return { .. } => Err(VerificationFailure::Malformed(
                "card callbacks arrive as webhooks, not redirects".into(),
            )
            .into()),
        }
    }
}

/// Parse `t=<unix>,v1=<hex>` into its parts.
fn parse_signature_header(header: &str) -> std::result::Result<(i64, String), VerificationFailure> {
    let mut timestamp = None;
    let mut signature = None;
    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            return Err(VerificationFailure::Malformed(
                "signature header is not key=value pairs".into(),
            ));
        };
        match key {
            "t" => timestamp = value.parse::<i64>().ok(),
            "v1" => signature = Some(value.to_string()),
            _ => {}
        }
    }
    let timestamp = timestamp.ok_or(VerificationFailure::MissingField("t"))?;
    let signature = signature.ok_or(VerificationFailure::MissingField("v1"))?;
    Ok((timestamp, signature))
}
