//! Settlement reconciler.
//!
//! Applies a verified gateway callback to the order store. Callbacks are
//! at-least-once and unordered: the webhook and the browser redirect for
//! the same payment race each other, and processors retry. The
//! reconciler leans on the store's compare-and-set so that any schedule
//! of duplicates and races converges to exactly one applied transition,
//! and a settled payment is never overwritten or downgraded.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::interfaces::order_store::{Disposition, OrderStore, SettleOutcome, StoreError};
use crate::interfaces::{CallbackOutcome, VerifiedResult};
use crate::notify::Notifier;
use crate::orders::Order;

#[cfg(test)]
mod tests;

/// Result type for settlement operations.
pub type Result<T> = std::result::Result<T, SettlementError>;

/// Errors from applying a verified callback.
#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    #[error("order not found: {0}")]
    OrderNotFound(Uuid),

    /// The callback disagrees with an already-settled payment. The order
    /// is left untouched; this is logged for audit, never papered over.
    #[error("conflicting settlement for order {order_id}: already settled with {existing:?}")]
    Conflict {
        order_id: Uuid,
        existing: Option<String>,
    },

    /// The processor reported a different amount than the order total.
    #[error("amount mismatch for order {order_id}: expected {expected}, callback says {reported}")]
    AmountMismatch {
        order_id: Uuid,
        expected: i64,
        reported: i64,
    },

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for SettlementError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => SettlementError::OrderNotFound(id),
            other => SettlementError::Store(other),
        }
    }
}

/// What applying a verified callback did.
#[derive(Debug, Clone)]
pub enum Settlement {
    /// The callback transitioned the order; the updated record.
    Applied(Order),
    /// The order already carried this result. Nothing changed and no
    /// notification was re-sent.
    Replayed,
}

/// Applies verified callbacks to the order store.
pub struct Reconciler {
    store: Arc<dyn OrderStore>,
    notifier: Arc<dyn Notifier>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn OrderStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Apply one verified callback.
    ///
    /// Safe to call concurrently for the same order from a webhook and a
    /// redirect return; the store's conditional write decides the winner.
    pub async fn apply(&self, result: &VerifiedResult) -> Result<Settlement> {
        let order = self.store.get(result.order_id).await?;

        match &result.outcome {
            CallbackOutcome::Success { transaction_id } => {
                if result.amount != order.total_amount {
                    warn!(
                        order_id = %order.id,
                        expected = order.total_amount,
                        reported = result.amount,
                        "settlement amount mismatch, rejecting"
                    );
                    return Err(SettlementError::AmountMismatch {
                        order_id: order.id,
                        expected: order.total_amount,
                        reported: result.amount,
                    });
                }

                let disposition = Disposition::Paid {
                    transaction_id: transaction_id.clone(),
                };
                match self.store.settle(order.id, disposition).await? {
                    SettleOutcome::Applied(settled) => {
                        info!(
                            order_id = %settled.id,
                            transaction_id = %transaction_id,
                            "payment settled"
                        );
                        self.notifier.payment_settled(&settled);
                        Ok(Settlement::Applied(settled))
                    }
                    SettleOutcome::AlreadyApplied => {
                        debug!(order_id = %order.id, "settlement replayed, no-op");
                        Ok(Settlement::Replayed)
                    }
                    SettleOutcome::Conflicting { existing } => {
                        warn!(
                            order_id = %order.id,
                            incoming = %transaction_id,
                            existing = existing.as_deref().unwrap_or("<none>"),
                            "conflicting settlement rejected"
                        );
                        Err(SettlementError::Conflict {
                            order_id: order.id,
                            existing,
                        })
                    }
                }
            }
            CallbackOutcome::Failure { code } => {
                match self.store.settle(order.id, Disposition::Failed).await? {
                    SettleOutcome::Applied(failed) => {
                        info!(
                            order_id = %failed.id,
                            code = code.as_deref().unwrap_or("<none>"),
                            "payment failed"
                        );
                        Ok(Settlement::Applied(failed))
                    }
                    SettleOutcome::AlreadyApplied => Ok(Settlement::Replayed),
                    SettleOutcome::Conflicting { existing } => {
                        warn!(
                            order_id = %order.id,
                            existing = existing.as_deref().unwrap_or("<none>"),
                            "failure callback for settled order ignored"
                        );
                        Err(SettlementError::Conflict {
                            order_id: order.id,
                            existing,
                        })
                    }
                }
            }
        }
    }
}
