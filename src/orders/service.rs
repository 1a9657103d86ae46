//! Order operations: creation with price snapshots, admin status
//! updates along the fulfilment DAG, and hard deletion.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::UnknownProductPolicy;
use crate::interfaces::catalog::CatalogError;
use crate::interfaces::{Catalog, OrderStore, StoreError};
use crate::notify::Notifier;
use crate::orders::{Customer, Order, OrderItem, OrderStatus, PaymentMethod, PaymentStatus};

/// Result type for order operations.
pub type Result<T> = std::result::Result<T, OrderError>;

/// Errors from order operations.
#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("order has no items")]
    EmptyOrder,

    #[error("item quantity must be at least 1")]
    ZeroQuantity,

    #[error("unknown product: {0}")]
    UnknownProduct(String),

    #[error("order total overflows")]
    AmountOverflow,

    #[error("invalid status transition: {from} -> {to}")]
    InvalidStatus {
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error("order not found: {0}")]
    NotFound(Uuid),

    #[error("catalog unavailable: {0}")]
    Catalog(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for OrderError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => OrderError::NotFound(id),
            other => OrderError::Store(other),
        }
    }
}

impl From<CatalogError> for OrderError {
    fn from(e: CatalogError) -> Self {
        OrderError::Catalog(e.to_string())
    }
}

/// An order as submitted by the storefront, before pricing.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct NewOrder {
    pub customer: Customer,
    pub items: Vec<NewOrderItem>,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
}

/// One submitted line: a product reference and a quantity. The unit
/// price is always resolved server-side, never taken from the client.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct NewOrderItem {
    pub product_ref: String,
    pub quantity: u32,
}

/// Order operations over the store, catalog, and notifier collaborators.
pub struct OrderService {
    store: Arc<dyn OrderStore>,
    catalog: Arc<dyn Catalog>,
    notifier: Arc<dyn Notifier>,
    unknown_product: UnknownProductPolicy,
}

impl OrderService {
    pub fn new(
        store: Arc<dyn OrderStore>,
        catalog: Arc<dyn Catalog>,
        notifier: Arc<dyn Notifier>,
        unknown_product: UnknownProductPolicy,
    ) -> Self {
        Self {
            store,
            catalog,
            notifier,
            unknown_product,
        }
    }

    /// Create an order.
    ///
    /// Unit prices are snapshotted from the catalog at this moment and
    /// never re-read; the total is the sum over the snapshot. Nothing is
    /// persisted when validation or pricing fails.
    pub async fn create_order(&self, draft: NewOrder) -> Result<Order> {
        if draft.items.is_empty() {
            return Err(OrderError::EmptyOrder);
        }

        let mut items = Vec::with_capacity(draft.items.len());
        let mut total: i64 = 0;
        for line in &draft.items {
            if line.quantity == 0 {
                return Err(OrderError::ZeroQuantity);
            }
            let unit_price = match self.catalog.unit_price(&line.product_ref).await? {
                Some(price) => price,
                None => match self.unknown_product {
                    UnknownProductPolicy::Reject => {
                        return Err(OrderError::UnknownProduct(line.product_ref.clone()))
                    }
                    UnknownProductPolicy::Zero => {
                        warn!(product_ref = %line.product_ref, "unpriced product zero-filled");
                        0
                    }
                },
            };
            let item = OrderItem {
                product_ref: line.product_ref.clone(),
                quantity: line.quantity,
                unit_price,
            };
            let line_total = item.line_total().ok_or(OrderError::AmountOverflow)?;
            total = total
                .checked_add(line_total)
                .ok_or(OrderError::AmountOverflow)?;
            items.push(item);
        }

        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            customer: draft.customer,
            items,
            total_amount: total,
            payment_method: draft.payment_method,
            payment_status: PaymentStatus::Unpaid,
            transaction_id: None,
            status: OrderStatus::Pending,
            paid_at: None,
            created_at: now,
            updated_at: now,
        };

        self.store.insert(&order).await?;
        info!(order_id = %order.id, total = order.total_amount, "order created");

        self.notifier.order_created(&order);
        Ok(order)
    }

    pub async fn get_order(&self, id: Uuid) -> Result<Order> {
        Ok(self.store.get(id).await?)
    }

    pub async fn list_orders(&self) -> Result<Vec<Order>> {
        Ok(self.store.list().await?)
    }

    /// Admin status update.
    ///
    /// Transitions must follow the fulfilment DAG; anything else fails
    /// and leaves the record unchanged. `paid` stamps the order paid at
    /// now; it is a separate axis and implies no status movement.
    pub async fn update_status(
        &self,
        id: Uuid,
        new_status: OrderStatus,
        paid: bool,
    ) -> Result<Order> {
        let current = self.store.get(id).await?;
        if !current.status.can_transition_to(new_status) {
            return Err(OrderError::InvalidStatus {
                from: current.status,
                to: new_status,
            });
        }

        let mark_paid = paid.then(Utc::now);
        let updated = match self
            .store
            .transition_status(id, current.status, new_status, mark_paid)
            .await
        {
            Ok(order) => order,
            // Lost the race with another writer; report the transition as
            // invalid against whatever is stored now.
            Err(StoreError::Stale(_)) => {
                let fresh = self.store.get(id).await?;
                return Err(OrderError::InvalidStatus {
                    from: fresh.status,
                    to: new_status,
                });
            }
            Err(e) => return Err(e.into()),
        };

        info!(order_id = %id, from = %current.status, to = %new_status, "order status updated");
        self.notifier.status_changed(&updated);
        Ok(updated)
    }

    /// Record the payment method the customer chose, plus the card
    /// gateway's provisional intent reference, before redirecting them.
    pub async fn record_payment_request(
        &self,
        id: Uuid,
        method: PaymentMethod,
        provisional_transaction_id: Option<String>,
    ) -> Result<Order> {
        Ok(self
            .store
            .set_payment_method(id, method, provisional_transaction_id)
            .await?)
    }

    /// Hard-delete an order.
    ///
    /// There is no compensating cancel call to the processor; deleting
    /// while a payment request is in flight orphans the remote intent,
    /// so that case is logged loudly instead of passing silently.
    pub async fn delete_order(&self, id: Uuid) -> Result<Order> {
        let removed = self.store.delete(id).await?;
        if removed.payment_status == PaymentStatus::Unpaid && removed.transaction_id.is_some() {
            warn!(
                order_id = %id,
                transaction_id = removed.transaction_id.as_deref().unwrap_or(""),
                "order deleted with a payment request in flight; remote intent is orphaned"
            );
        }
        info!(order_id = %id, "order deleted");
        Ok(removed)
    }
}
