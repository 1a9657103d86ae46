//! Order persistence interface.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::orders::{Order, OrderStatus, PaymentMethod};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("order not found: {0}")]
    NotFound(Uuid),

    /// The record changed underneath a conditional status write.
    #[error("order {0} was modified concurrently")]
    Stale(Uuid),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt order record: {0}")]
    Corrupt(String),
}

/// Payment result to apply through the settlement compare-and-set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Verified successful payment carrying the processor's reference.
    Paid { transaction_id: String },
    /// Verified declined/failed payment.
    Failed,
}

/// Outcome of a settlement compare-and-set.
#[derive(Debug, Clone, PartialEq)]
pub enum SettleOutcome {
    /// The conditional write transitioned the order; the updated record.
    Applied(Order),
    /// The order already carries this exact result. Idempotent replay.
    AlreadyApplied,
    /// The order is settled with a different transaction. The write was
    /// rejected and the record left untouched.
    Conflicting { existing: Option<String> },
}

/// Interface for order persistence.
///
/// Implementations:
/// - `MemoryOrderStore`: in-process map, standalone mode and tests
/// - `SqliteOrderStore`: SQLite via sqlx
///
/// `settle` is the concurrency-critical operation: it must be a single
/// conditional write keyed on the current payment status so that racing
/// callbacks (webhook + redirect return, or a retried webhook) converge
/// to exactly one applied transition.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persist a freshly created order.
    async fn insert(&self, order: &Order) -> Result<()>;

    /// Fetch one order.
    async fn get(&self, id: Uuid) -> Result<Order>;

    /// List all orders, newest first.
    async fn list(&self) -> Result<Vec<Order>>;

    /// Record the chosen payment method and, for the card gateway, the
    /// provisional intent reference, before the customer is handed off
    /// to the processor.
    async fn set_payment_method(
        &self,
        id: Uuid,
        method: PaymentMethod,
        transaction_id: Option<String>,
    ) -> Result<Order>;

    /// Conditionally move an order along the fulfilment DAG.
    ///
    /// The write only applies while the stored status still equals
    /// `from`; otherwise `StoreError::Stale` is returned and the record
    /// is untouched. `mark_paid` additionally stamps the payment as paid
    /// at the given instant.
    async fn transition_status(
        &self,
        id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
        mark_paid: Option<DateTime<Utc>>,
    ) -> Result<Order>;

    /// Apply a verified payment result with compare-and-set semantics.
    ///
    /// Rules:
    /// - `Paid` applies while the order is not yet paid, setting payment
    ///   status, confirmed status, transaction id, and paid timestamp.
    /// - `Paid` with the already-stored transaction id is `AlreadyApplied`.
    /// - `Paid` with a different transaction id than a settled payment is
    ///   `Conflicting`; a settled payment is never overwritten.
    /// - `Failed` applies only while unpaid; it never downgrades a paid
    ///   order (`Conflicting`), and re-applying to a failed order is
    ///   `AlreadyApplied`.
    async fn settle(&self, id: Uuid, disposition: Disposition) -> Result<SettleOutcome>;

    /// Hard-delete an order, returning the removed record.
    async fn delete(&self, id: Uuid) -> Result<Order>;
}
