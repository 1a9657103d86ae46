//! In-memory OrderStore for standalone mode and tests.
//!
//! A single write lock around the map makes every mutation, including
//! the settlement compare-and-set, atomic with respect to concurrent
//! callers.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::interfaces::order_store::{
    Disposition, OrderStore, Result, SettleOutcome, StoreError,
};
use crate::orders::{Order, OrderStatus, PaymentMethod, PaymentStatus};
use crate::store::settle_noop_outcome;

/// Order store backed by a process-local map.
#[derive(Default)]
pub struct MemoryOrderStore {
    orders: RwLock<HashMap<Uuid, Order>>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn insert(&self, order: &Order) -> Result<()> {
        let mut orders = self.orders.write().await;
        orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Order> {
        let orders = self.orders.read().await;
        orders.get(&id).cloned().ok_or(StoreError::NotFound(id))
    }

    async fn list(&self) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        let mut all: Vec<Order> = orders.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    async fn set_payment_method(
        &self,
        id: Uuid,
        method: PaymentMethod,
        transaction_id: Option<String>,
    ) -> Result<Order> {
        let mut orders = self.orders.write().await;
        let order = orders.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        order.payment_method = Some(method);
        if transaction_id.is_some() {
            order.transaction_id = transaction_id;
        }
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
        mark_paid: Option<DateTime<Utc>>,
    ) -> Result<Order> {
        let mut orders = self.orders.write().await;
        let order = orders.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if order.status != from {
            return Err(StoreError::Stale(id));
        }
        order.status = to;
        if let Some(paid_at) = mark_paid {
            order.payment_status = PaymentStatus::Paid;
            order.paid_at = Some(paid_at);
        }
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn settle(&self, id: Uuid, disposition: Disposition) -> Result<SettleOutcome> {
        let mut orders = self.orders.write().await;
        let order = orders.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        match &disposition {
            Disposition::Paid { transaction_id } => {
                if order.payment_status == PaymentStatus::Paid {
                    return Ok(settle_noop_outcome(order, &disposition));
                }
                let now = Utc::now();
                order.payment_status = PaymentStatus::Paid;
                order.status = OrderStatus::Confirmed;
                order.transaction_id = Some(transaction_id.clone());
                order.paid_at = Some(now);
                order.updated_at = now;
                Ok(SettleOutcome::Applied(order.clone()))
            }
            Disposition::Failed => {
                if order.payment_status != PaymentStatus::Unpaid {
                    return Ok(settle_noop_outcome(order, &disposition));
                }
                order.payment_status = PaymentStatus::Failed;
                order.updated_at = Utc::now();
                Ok(SettleOutcome::Applied(order.clone()))
            }
        }
    }

    async fn delete(&self, id: Uuid) -> Result<Order> {
        let mut orders = self.orders.write().await;
        orders.remove(&id).ok_or(StoreError::NotFound(id))
    }
}
