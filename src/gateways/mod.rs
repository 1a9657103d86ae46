//! Payment gateway adapters.
//!
//! One module per external processor. The protocols are deliberately not
//! unified beyond the [`PaymentGateway`] trait: each processor has its
//! own canonical string, digest, and callback shape, and blending them
//! is how signing bugs happen.

pub mod card;
pub mod checkout;
pub mod wallet;

pub use card::CardGateway;
pub use checkout::CheckoutGateway;
pub use wallet::WalletGateway;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha512};

use crate::config::GatewaysConfig;
use crate::interfaces::{GatewayError, PaymentGateway, VerificationFailure};
use crate::orders::PaymentMethod;

/// Gateways available to this deployment, keyed by payment method.
pub struct GatewayRegistry {
    inner: HashMap<PaymentMethod, Arc<dyn PaymentGateway>>,
}

impl GatewayRegistry {
    /// Build adapters for every configured gateway.
    pub fn from_config(config: &GatewaysConfig) -> Result<Self, GatewayError> {
        let mut inner: HashMap<PaymentMethod, Arc<dyn PaymentGateway>> = HashMap::new();
        let timeout = Duration::from_secs(config.timeout_secs);

        if let Some(card) = &config.card {
            inner.insert(
                PaymentMethod::Card,
                Arc::new(CardGateway::new(card.clone(), timeout)?),
            );
        }
        if let Some(checkout) = &config.checkout {
            inner.insert(
                PaymentMethod::Checkout,
                Arc::new(CheckoutGateway::new(checkout.clone())),
            );
        }
        if let Some(wallet) = &config.wallet {
            inner.insert(
                PaymentMethod::Wallet,
                Arc::new(WalletGateway::new(wallet.clone(), timeout)?),
            );
        }

        Ok(Self { inner })
    }

    pub fn get(&self, method: PaymentMethod) -> Option<Arc<dyn PaymentGateway>> {
        self.inner.get(&method).cloned()
    }

    /// Resolve a route slug like `card` or `wallet`. Cash on delivery is
    /// not a gateway and never resolves.
    pub fn by_slug(&self, slug: &str) -> Option<Arc<dyn PaymentGateway>> {
        let method: PaymentMethod = slug.parse().ok()?;
        if method == PaymentMethod::CashOnDelivery {
            return None;
        }
        self.get(method)
    }
}

/// Build the bounded-timeout HTTP client adapters use for outbound
/// processor calls.
pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client, GatewayError> {
    reqwest::Client::builder()
        .use_rustls_tls()
        .timeout(timeout)
        .build()
        .map_err(|e| GatewayError::Unavailable(e.to_string()))
}

/// Map a transport error, distinguishing a timed-out call (payment never
/// attempted as far as the caller knows) from other failures.
pub(crate) fn transport_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Unavailable(e.to_string())
    }
}

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

pub(crate) fn sign_sha256(secret: &[u8], payload: &[u8]) -> Result<String, VerificationFailure> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| VerificationFailure::Malformed(e.to_string()))?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

pub(crate) fn verify_sha256(
    secret: &[u8],
    payload: &[u8],
    signature_hex: &str,
) -> Result<(), VerificationFailure> {
    let signature = hex::decode(signature_hex)
        .map_err(|_| VerificationFailure::Malformed("signature is not valid hex".into()))?;
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| VerificationFailure::Malformed(e.to_string()))?;
    mac.update(payload);
    mac.verify_slice(&signature)
        .map_err(|_| VerificationFailure::SignatureMismatch)
}

pub(crate) fn sign_sha512(secret: &[u8], payload: &[u8]) -> Result<String, VerificationFailure> {
    let mut mac = HmacSha512::new_from_slice(secret)
        .map_err(|e| VerificationFailure::Malformed(e.to_string()))?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

pub(crate) fn verify_sha512(
    secret: &[u8],
    payload: &[u8],
    signature_hex: &str,
) -> Result<(), VerificationFailure> {
    let signature = hex::decode(signature_hex)
        .map_err(|_| VerificationFailure::Malformed("signature is not valid hex".into()))?;
    let mut mac = HmacSha512::new_from_slice(secret)
        .map_err(|e| VerificationFailure::Malformed(e.to_string()))?;
    mac.update(payload);
    mac.verify_slice(&signature)
        .map_err(|_| VerificationFailure::SignatureMismatch)
}
