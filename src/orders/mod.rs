//! Order domain model.
//!
//! An order is created once with a server-side price snapshot and then
//! mutated only by the settlement reconciler and the explicit admin
//! status-update operation. Status and payment status are separate axes:
//! an order can be paid but still pending fulfilment, or confirmed and
//! awaiting cash on delivery.

mod service;

pub use service::{NewOrder, NewOrderItem, OrderError, OrderService, Result};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;


/// Fulfilment status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Delivering,
    Completed,
    Cancelled,
}

impl OrderStatus {
    /// Stable text form, also used as the storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Delivering => "delivering",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Whether the fulfilment DAG allows moving from `self` to `next`.
    ///
    /// Edges: pending → {confirmed, cancelled}, confirmed → {delivering,
    /// cancelled}, delivering → completed. Everything else is rejected,
    /// including self-transitions.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, Delivering)
                | (Confirmed, Cancelled)
                | (Delivering, Completed)
        )
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "delivering" => Ok(OrderStatus::Delivering),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "unpaid" => Ok(PaymentStatus::Unpaid),
            "paid" => Ok(PaymentStatus::Paid),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(format!("unknown payment status: {other}")),
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the customer pays.
///
/// The three gateway variants double as route slugs on the payment API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CashOnDelivery,
    Card,
    Checkout,
    Wallet,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CashOnDelivery => "cash_on_delivery",
            PaymentMethod::Card => "card",
            PaymentMethod::Checkout => "checkout",
            PaymentMethod::Wallet => "wallet",
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "cash_on_delivery" => Ok(PaymentMethod::CashOnDelivery),
            "card" => Ok(PaymentMethod::Card),
            "checkout" => Ok(PaymentMethod::Checkout),
            "wallet" => Ok(PaymentMethod::Wallet),
            other => Err(format!("unknown payment method: {other}")),
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who the order is for and where it goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    pub address: String,
    #[serde(default)]
    pub note: Option<String>,
}

/// One line of an order.
///
/// `unit_price` is the catalog price snapshotted at creation time; it is
/// never re-read from the catalog afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_ref: String,
    pub quantity: u32,
    pub unit_price: i64,
}

impl OrderItem {
    /// Line total, `quantity × unit_price`.
    pub fn line_total(&self) -> Option<i64> {
        i64::from(self.quantity).checked_mul(self.unit_price)
    }
}

/// A customer order with its payment state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub customer: Customer,
    pub items: Vec<OrderItem>,
    /// Σ quantity × unit_price over `items`, fixed at creation.
    pub total_amount: i64,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    pub payment_status: PaymentStatus,
    /// External processor reference. Provisional for the card gateway
    /// until its webhook confirms; final once `payment_status` is paid.
    #[serde(default)]
    pub transaction_id: Option<String>,
    pub status: OrderStatus,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
