//! Application configuration.
//!
//! Aggregates configuration for the server, storage, pricing policy,
//! notifications, and the three payment gateways into a single Config
//! struct that can be loaded from YAML files or environment variables.

use std::collections::HashMap;

use serde::Deserialize;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "FLEURON_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "FLEURON";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "FLEURON_LOG";

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Order storage configuration.
    pub storage: StorageConfig,
    /// Price resolution policy.
    pub pricing: PricingConfig,
    /// Seed catalog for standalone mode.
    pub catalog: CatalogConfig,
    /// Notification configuration.
    pub notifications: NotificationConfig,
    /// Browser-facing result pages for payment returns.
    pub pages: PagesConfig,
    /// Payment gateway configuration.
    pub gateways: GatewaysConfig,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `config.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `FLEURON_CONFIG` environment variable (if set)
    /// 4. Environment variables with `FLEURON` prefix
    pub fn load(path: Option<&str>) -> Result<Self, Box<dyn std::error::Error>> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        Ok(config)
    }

    /// Create config for testing.
    pub fn for_test() -> Self {
        Self::default()
    }
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,
    /// Port for the storefront/admin API.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8088,
        }
    }
}

/// Order storage configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage backend: "memory" or "sqlite".
    pub storage_type: String,
    /// Database file path (sqlite only).
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_type: "memory".to_string(),
            path: "data/fleuron.db".to_string(),
        }
    }
}

/// Policy for order items whose product reference the catalog cannot price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownProductPolicy {
    /// Fail order creation with an error.
    #[default]
    Reject,
    /// Price the item at zero and proceed.
    Zero,
}

/// Price resolution configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// How to treat product references the catalog cannot resolve.
    pub unknown_product: UnknownProductPolicy,
}

/// Seed catalog used by the standalone static catalog implementation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Unit price per product reference.
    pub prices: HashMap<String, i64>,
}

/// Notification configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Statically configured admin recipients.
    pub admin_emails: Vec<String>,
    /// HTTP mail relay endpoint. When unset, mails are logged instead.
    pub mail_endpoint: Option<String>,
    /// Bearer token for the mail relay.
    pub mail_token: Option<String>,
    /// Sender address.
    pub from: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            admin_emails: Vec::new(),
            mail_endpoint: None,
            mail_token: None,
            from: "orders@fleuron.example".to_string(),
        }
    }
}

/// Browser-facing result pages for payment return redirects.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PagesConfig {
    /// Where to send the customer after a successful payment.
    pub success_url: String,
    /// Where to send the customer after a failed or rejected payment.
    pub failure_url: String,
}

impl Default for PagesConfig {
    fn default() -> Self {
        Self {
            success_url: "/payment/success".to_string(),
            failure_url: "/payment/failure".to_string(),
        }
    }
}

/// Payment gateway configuration.
///
/// Each gateway is optional; unconfigured gateways are simply absent from
/// the registry and requests naming them are rejected.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewaysConfig {
    /// Bound on every outbound call to a processor, in seconds.
    pub timeout_secs: u64,
    /// Card gateway (payment intent + signed webhook).
    pub card: Option<CardConfig>,
    /// Hosted checkout gateway (redirect + sorted-query signature).
    pub checkout: Option<CheckoutConfig>,
    /// Wallet gateway (capture call + fixed-order signature).
    pub wallet: Option<WalletConfig>,
}

impl Default for GatewaysConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 5,
            card: None,
            checkout: None,
            wallet: None,
        }
    }
}

/// Card gateway configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CardConfig {
    /// Processor API base URL.
    pub api_base: String,
    /// Secret API key for outbound calls.
    pub api_key: String,
    /// Shared secret for webhook signature verification.
    pub webhook_secret: String,
    /// ISO currency code sent with payment intents.
    #[serde(default = "default_card_currency")]
    pub currency: String,
    /// Multiplier from catalog amounts to the processor's minor unit.
    #[serde(default = "default_minor_unit_scale")]
    pub minor_unit_scale: u32,
    /// Replay tolerance for webhook timestamps, in seconds.
    #[serde(default = "default_webhook_tolerance")]
    pub tolerance_secs: i64,
}

fn default_card_currency() -> String {
    "usd".to_string()
}

fn default_minor_unit_scale() -> u32 {
    100
}

fn default_webhook_tolerance() -> i64 {
    300
}

/// Hosted checkout gateway configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutConfig {
    /// Hosted payment page URL the browser is redirected to.
    pub pay_url: String,
    /// Merchant identifier assigned by the processor.
    pub merchant_code: String,
    /// Shared signing secret.
    pub secret: String,
    /// URL the processor redirects back to after payment.
    pub return_url: String,
    /// ISO currency code.
    #[serde(default = "default_checkout_currency")]
    pub currency: String,
}

fn default_checkout_currency() -> String {
    "USD".to_string()
}

/// Wallet gateway configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    /// Processor API base URL for the capture call.
    pub api_base: String,
    /// Partner identifier assigned by the processor.
    pub partner_code: String,
    /// Access key sent with every request.
    pub access_key: String,
    /// Shared signing secret.
    pub secret: String,
    /// URL the processor redirects back to after payment.
    pub return_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.server.port, 8088);
        assert_eq!(config.storage.storage_type, "memory");
        assert_eq!(config.pricing.unknown_product, UnknownProductPolicy::Reject);
        assert!(config.gateways.card.is_none());
    }

    #[test]
    fn test_gateway_timeout_default() {
        let config = Config::for_test();
        assert_eq!(config.gateways.timeout_secs, 5);
    }
}
