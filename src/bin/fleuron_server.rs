//! Storefront API server.
//!
//! Wires the configured store, catalog, notifier, and gateway adapters
//! together and serves the HTTP surface.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fleuron::catalog::StaticCatalog;
use fleuron::config::{Config, LOG_ENV_VAR};
use fleuron::gateways::GatewayRegistry;
use fleuron::http::{self, AppState};
use fleuron::interfaces::Mailer;
use fleuron::notify::directory::StaticDirectory;
use fleuron::notify::mailer::{HttpMailer, LogMailer};
use fleuron::notify::EmailNotifier;
use fleuron::orders::OrderService;
use fleuron::settlement::Reconciler;
use fleuron::store;

/// Initialize tracing with the FLEURON_LOG environment variable.
///
/// Defaults to "info" level if FLEURON_LOG is not set.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV_VAR)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = Config::load(std::env::args().nth(1).as_deref())?;

    let store = store::init_store(&config.storage).await?;
    let catalog = Arc::new(StaticCatalog::new(config.catalog.prices.clone()));

    let mailer: Arc<dyn Mailer> = match &config.notifications.mail_endpoint {
        Some(endpoint) => Arc::new(HttpMailer::new(
            endpoint.clone(),
            config.notifications.mail_token.clone(),
            config.notifications.from.clone(),
        )?),
        None => Arc::new(LogMailer),
    };
    let directory = Arc::new(StaticDirectory::new(
        config.notifications.admin_emails.clone(),
    ));
    let notifier = Arc::new(EmailNotifier::new(mailer, directory));

    let orders = Arc::new(OrderService::new(
        store.clone(),
        catalog,
        notifier.clone(),
        config.pricing.unknown_product,
    ));
    let reconciler = Arc::new(Reconciler::new(store, notifier));
    let gateways = Arc::new(GatewayRegistry::from_config(&config.gateways)?);

    let state = AppState {
        orders,
        reconciler,
        gateways,
        pages: config.pages.clone(),
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);
    http::serve(state, &addr).await?;
    Ok(())
}
