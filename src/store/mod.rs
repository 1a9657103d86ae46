//! Order store implementations.

use std::sync::Arc;

use tracing::info;

use crate::config::StorageConfig;
use crate::interfaces::order_store::{Disposition, OrderStore, SettleOutcome};
use crate::orders::{Order, PaymentStatus};

pub mod memory;
pub mod schema;
pub mod sqlite;

pub use memory::MemoryOrderStore;
pub use sqlite::SqliteOrderStore;


/// Initialize an order store from configuration.
pub async fn init_store(
    config: &StorageConfig,
) -> Result<Arc<dyn OrderStore>, Box<dyn std::error::Error>> {
    info!("Order storage: {}", config.storage_type);

    match config.storage_type.as_str() {
        "memory" => Ok(Arc::new(MemoryOrderStore::new())),
        "sqlite" => {
            if let Some(parent) = std::path::Path::new(&config.path).parent() {
                std::fs::create_dir_all(parent)?;
            }

            let pool =
                sqlx::SqlitePool::connect(&format!("sqlite:{}?mode=rwc", config.path)).await?;
            let store = SqliteOrderStore::new(pool);
            store.init().await?;
            Ok(Arc::new(store))
        }
        other => Err(format!("unknown storage type: {other}").into()),
    }
}

/// Classify a settlement write that did not apply.
///
/// Shared between store implementations: once the conditional write
/// reports no transition, the stored record decides between an
/// idempotent replay and a conflicting result.
pub(crate) fn settle_noop_outcome(order: &Order, disposition: &Disposition) -> SettleOutcome {
    match (disposition, order.payment_status) {
        (Disposition::Paid { transaction_id }, PaymentStatus::Paid) => {
            if order.transaction_id.as_deref() == Some(transaction_id.as_str()) {
                SettleOutcome::AlreadyApplied
            } else {
                SettleOutcome::Conflicting {
                    existing: order.transaction_id.clone(),
                }
            }
        }
        (Disposition::Paid { .. }, _) => SettleOutcome::Conflicting {
            existing: order.transaction_id.clone(),
        },
        (Disposition::Failed, PaymentStatus::Paid) => SettleOutcome::Conflicting {
            existing: order.transaction_id.clone(),
        },
        (Disposition::Failed, _) => SettleOutcome::AlreadyApplied,
    }
}
