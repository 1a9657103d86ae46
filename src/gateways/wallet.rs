//! Wallet gateway: synchronous capture call, redirect confirmation.
//!
//! Unlike the hosted checkout protocol, the canonical string here is a
//! fixed, hand-specified field order baked into both directions; the
//! processor does not sort keys. The outbound call is a signed JSON POST
//! that returns the payment URL to send the client to; confirmation
//! arrives as a browser redirect whose numeric result code means
//! success only when it is exactly `"0"`. Anything else, including a
//! value that does not parse, is a failure, never "unknown".

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::WalletConfig;
use crate::gateways::{build_client, sign_sha256, transport_error, verify_sha256};
use crate::interfaces::gateway::{
    Callback, CallbackOutcome, CreatedPayment, GatewayError, PaymentGateway, PaymentRequest,
    Result, VerificationFailure, VerifiedResult,
};
use crate::orders::{Order, PaymentMethod};

const CAPTURE_PATH: &str = "/v2/payments";

const SIGNATURE_PARAM: &str = "signature";

const SUCCESS_CODE: &str = "0";

/// Redirect fields in the exact order the processor signs them.
const RETURN_SIGNED_FIELDS: [&str; 10] = [
    "partnerCode",
    "accessKey",
    "requestId",
    "amount",
    "orderId",
    "orderInfo",
    "transId",
    "resultCode",
    "message",
    "responseTime",
];

/// Adapter for the wallet processor.
pub struct WalletGateway {
    client: reqwest::Client,
    config: WalletConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CaptureRequest<'a> {
    partner_code: &'a str,
    access_key: &'a str,
    request_id: &'a str,
    amount: i64,
    order_id: String,
    order_info: &'a str,
    return_url: &'a str,
    extra_data: &'a str,
    signature: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptureResponse {
    result_code: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    pay_url: Option<String>,
}

impl WalletGateway {
    pub fn new(config: WalletConfig, timeout: Duration) -> Result<Self> {
        let client = build_client(timeout)?;
        Ok(Self { client, config })
    }

    /// Canonical string for the outbound capture call. Field order is
    /// part of the wire contract.
    fn capture_canonical(&self, request_id: &str, order: &Order, order_info: &str) -> String {
        format!(
            "partnerCode={}&accessKey={}&requestId={}&amount={}&orderId={}&orderInfo={}&returnUrl={}&extraData=",
            self.config.partner_code,
            self.config.access_key,
            request_id,
            order.total_amount,
            order.id,
            order_info,
            self.config.return_url,
        )
    }
}

#[async_trait]
impl PaymentGateway for WalletGateway {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::Wallet
    }

    async fn create_payment_request(&self, order: &Order) -> Result<CreatedPayment> {
        let request_id = Uuid::new_v4().to_string();
        let order_info = format!("Flower order {}", order.id);
        let canonical = self.capture_canonical(&request_id, order, &order_info);
        let signature = sign_sha256(self.config.secret.as_bytes(), canonical.as_bytes())?;

        let response = self
            .client
            .post(format!("{}{}", self.config.api_base, CAPTURE_PATH))
            .json(&CaptureRequest {
                partner_code: &self.config.partner_code,
                access_key: &self.config.access_key,
                request_id: &request_id,
                amount: order.total_amount,
                order_id: order.id.to_string(),
                order_info: &order_info,
                return_url: &self.config.return_url,
                extra_data: "",
                signature: &signature,
            })
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(GatewayError::Rejected(format!(
                "capture call returned {}",
                response.status()
            )));
        }
        let capture: CaptureResponse = response.json().await.map_err(transport_error)?;
        if capture.result_code != 0 {
            return Err(GatewayError::Rejected(
                capture
                    .message
                    .unwrap_or_else(|| format!("result code {}", capture.result_code)),
            ));
        }
        let pay_url = capture
            .pay_url
            .ok_or_else(|| GatewayError::Rejected("no payment URL returned".into()))?;

        Ok(CreatedPayment {
            request: PaymentRequest::RedirectUrl(pay_url),
            provisional_transaction_id: None,
        })
    }

    async fn verify_callback(&self, callback: Callback) -> Result<Option<VerifiedResult>> {
        let Callback::Return { params } = callback else {
            return Err(VerificationFailure::Malformed(
                "wallet callbacks arrive as browser redirects".into(),
            )
            .into());
        };

        let provided = params
            .get(SIGNATURE_PARAM)
            .ok_or(VerificationFailure::MissingField(SIGNATURE_PARAM))?;
        let canonical = return_canonical(&params)?;
        verify_sha256(
            self.config.secret.as_bytes(),
            canonical.as_bytes(),
            provided,
        )?;

        let order_id = params
            .get("orderId")
            .ok_or(VerificationFailure::MissingField("orderId"))?;
        let order_id = Uuid::parse_str(order_id)
            .map_err(|e| VerificationFailure::Malformed(format!("orderId: {e}")))?;
        let amount: i64 = params
            .get("amount")
            .ok_or(VerificationFailure::MissingField("amount"))?
            .parse()
            .map_err(|_| VerificationFailure::Malformed("amount is not an integer".into()))?;

        // Exactly "0" is success; any other result code, parseable or
        // not, is a verified failure.
        let result_code = params
            .get("resultCode")
            .ok_or(VerificationFailure::MissingField("resultCode"))?;
        let outcome = if result_code == SUCCESS_CODE {
            CallbackOutcome::Success {
                transaction_id: params
                    .get("transId")
                    .ok_or(VerificationFailure::MissingField("transId"))?
                    .clone(),
            }
        } else {
            CallbackOutcome::Failure {
                code: Some(result_code.clone()),
            }
        };

        Ok(Some(VerifiedResult {
            order_id,
            amount,
            outcome,
        }))
    }
}

/// Canonical string for the redirect return, in the processor's fixed
/// field order.
fn return_canonical(
    params: &BTreeMap<String, String>,
) -> std::result::Result<String, VerificationFailure> {
    let mut canonical = String::new();
    for (i, field) in RETURN_SIGNED_FIELDS.into_iter().enumerate() {
        let value = params
            .get(field)
            .ok_or(VerificationFailure::MissingField(field))?;
        if i > 0 {
            canonical.push('&');
        }
        canonical.push_str(field);
        canonical.push('=');
        canonical.push_str(value);
    }
    Ok(canonical)
}
