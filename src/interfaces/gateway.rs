//! Payment gateway interface.
//!
//! One trait, three external processors with mutually incompatible
//! protocols. An adapter builds the outbound payment request for its
//! processor and verifies that processor's inbound callbacks; everything
//! it learns is normalized into [`VerifiedResult`] before the settlement
//! reconciler sees it.

use std::collections::BTreeMap;

use async_trait::async_trait;
use uuid::Uuid;

use crate::orders::{Order, PaymentMethod};

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Errors from gateway operations.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The outbound call did not complete within the configured bound.
    /// The order stays unpaid; nothing was attempted as far as the
    /// caller is concerned.
    #[error("payment gateway timed out")]
    Timeout,

    #[error("payment gateway unavailable: {0}")]
    Unavailable(String),

    /// The processor answered but refused the request.
    #[error("payment gateway rejected the request: {0}")]
    Rejected(String),

    #[error(transparent)]
    Verification(#[from] VerificationFailure),
}

/// An inbound callback failed authentication or could not be decoded.
///
/// Never mutates order state. Messages carry enough context to audit but
/// never the shared secret or the expected signature value.
#[derive(Debug, thiserror::Error)]
pub enum VerificationFailure {
    #[error("callback signature mismatch")]
    SignatureMismatch,

    #[error("callback timestamp outside replay tolerance")]
    StaleTimestamp,

    #[error("callback missing field: {0}")]
    MissingField(&'static str),

    #[error("malformed callback: {0}")]
    Malformed(String),
}

/// Raw inbound callback payload, before verification.
#[derive(Debug, Clone)]
pub enum Callback {
    /// Out-of-band webhook: the raw, unparsed request body plus the
    /// signature header. The signature is computed over these bytes, so
    /// they must not be re-serialized before verification.
    Webhook {
        body: Vec<u8>,
        signature_header: String,
    },
    /// Browser redirect return: the decoded query parameters.
    Return { params: BTreeMap<String, String> },
}

/// What a verified callback says happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// Payment went through; the processor's transaction reference.
    Success { transaction_id: String },
    /// Payment failed or was declined; the processor's result code when
    /// it supplied one.
    Failure { code: Option<String> },
}

/// An authenticated, decoded callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedResult {
    pub order_id: Uuid,
    /// Amount the processor reports, converted back to catalog units.
    pub amount: i64,
    pub outcome: CallbackOutcome,
}

/// What to hand the client so it can complete payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentRequest {
    /// Send the browser here.
    RedirectUrl(String),
    /// Hand this to the processor's client-side SDK.
    ClientSecret(String),
}

/// Result of building an outbound payment request.
#[derive(Debug, Clone)]
pub struct CreatedPayment {
    pub request: PaymentRequest,
    /// Processor reference already known at request time (card intents).
    /// Provisional until a verified callback confirms it; not proof of
    /// payment.
    pub provisional_transaction_id: Option<String>,
}

/// Interface implemented once per external payment processor.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// The payment method this adapter settles.
    fn method(&self) -> PaymentMethod;

    /// Build the processor-specific signed payment request for an order.
    async fn create_payment_request(&self, order: &Order) -> Result<CreatedPayment>;

    /// Authenticate an inbound callback and extract the payment result.
    ///
    /// `Ok(None)` means the callback is authentic but carries nothing to
    /// settle (e.g. an event type the adapter does not track); it should
    /// be acknowledged and dropped.
    async fn verify_callback(&self, callback: Callback) -> Result<Option<VerifiedResult>>;
}
