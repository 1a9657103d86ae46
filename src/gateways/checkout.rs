//! Hosted checkout gateway: browser redirect with a sorted-query HMAC.
//!
//! The payment request is a signed URL: parameters are canonicalized in
//! lexicographic key order, HMAC-SHA512 signed, and the signature is
//! appended as its own parameter. The processor redirects the browser
//! back with the same parameter set plus its result fields, re-signed;
//! verification strips the signature parameter, re-canonicalizes what
//! remains, and requires an exact constant-time match before the result
//! code is even looked at.
//!
//! The processor's protocol has no dedicated order-reference field: the
//! order id travels inside the free-text order-info string. That wire
//! contract cannot change, so recovery is confined to
//! [`extract_order_id`], which fails explicitly instead of splitting
//! optimistically.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::config::CheckoutConfig;
use crate::gateways::{sign_sha512, verify_sha512};
use crate::interfaces::gateway::{
    Callback, CallbackOutcome, CreatedPayment, GatewayError, PaymentGateway, PaymentRequest,
    Result, VerificationFailure, VerifiedResult,
};
use crate::orders::{Order, PaymentMethod};

/// Query parameter carrying the signature itself; excluded from signing.
const SIGNATURE_PARAM: &str = "signature";

/// Result code the processor uses for a successful payment.
const SUCCESS_CODE: &str = "00";

/// Adapter for the hosted checkout processor.
pub struct CheckoutGateway {
    config: CheckoutConfig,
}

impl CheckoutGateway {
    pub fn new(config: CheckoutConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl PaymentGateway for CheckoutGateway {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::Checkout
    }

    async fn create_payment_request(&self, order: &Order) -> Result<CreatedPayment> {
        let mut params = BTreeMap::new();
        params.insert("amount".to_string(), order.total_amount.to_string());
        params.insert("currency".to_string(), self.config.currency.clone());
        params.insert("merchant".to_string(), self.config.merchant_code.clone());
        params.insert("orderInfo".to_string(), order_info(order.id));
        params.insert(
            "requestedAt".to_string(),
            Utc::now().format("%Y%m%d%H%M%S").to_string(),
        );
        params.insert("returnUrl".to_string(), self.config.return_url.clone());

        let signature = sign_sha512(
            self.config.secret.as_bytes(),
            canonical_query(&params).as_bytes(),
        )?;

        let mut url = reqwest::Url::parse(&self.config.pay_url)
            .map_err(|e| GatewayError::Unavailable(format!("invalid pay URL: {e}")))?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &params {
                pairs.append_pair(key, value);
            }
            pairs.append_pair(SIGNATURE_PARAM, &signature);
        }

        Ok(CreatedPayment {
            request: PaymentRequest::RedirectUrl(url.to_string()),
            provisional_transaction_id: None,
        })
    }

    async fn verify_callback(&self, callback: Callback) -> Result<Option<VerifiedResult>> {
        let Callback::Return { mut params } = callback else {
            return Err(VerificationFailure::Malformed(
                "checkout callbacks arrive as browser redirects".into(),
            )
            .into());
        };

        let provided = params
            .remove(SIGNATURE_PARAM)
            .ok_or(VerificationFailure::MissingField(SIGNATURE_PARAM))?;
        verify_sha512(
            self.config.secret.as_bytes(),
            canonical_query(&params).as_bytes(),
            &provided,
        )?;

        let response_code = require(&params, "responseCode")?;
        let amount: i64 = require(&params, "amount")?
            .parse()
            .map_err(|_| VerificationFailure::Malformed("amount is not an integer".into()))?;
        let order_id = extract_order_id(require(&params, "orderInfo")?)?;

        let outcome = if response_code == SUCCESS_CODE {
            CallbackOutcome::Success {
                transaction_id: require(&params, "transactionNo")?.to_string(),
            }
        } else {
            CallbackOutcome::Failure {
                code: Some(response_code.to_string()),
            }
        };

        Ok(Some(VerifiedResult {
            order_id,
            amount,
            outcome,
        }))
    }
}

/// The free-text order description the processor echoes back. The order
/// id must stay the final whitespace-separated token; verification
/// depends on it.
fn order_info(order_id: Uuid) -> String {
    format!("Flower order {order_id}")
}

/// Recover the order id from the echoed order-info text.
pub(crate) fn extract_order_id(order_info: &str) -> std::result::Result<Uuid, VerificationFailure> {
    let token = order_info.rsplit(' ').next().unwrap_or("");
    Uuid::parse_str(token).map_err(|_| {
        VerificationFailure::Malformed("order info does not end with an order reference".into())
    })
}

/// Canonical string the signature covers: decoded parameter values in
/// lexicographic key order, joined as a query string.
fn canonical_query(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn require<'a>(
    params: &'a BTreeMap<String, String>,
    field: &'static str,
) -> std::result::Result<&'a str, VerificationFailure> {
    params
        .get(field)
        .map(String::as_str)
        .ok_or(VerificationFailure::MissingField(field))
}
