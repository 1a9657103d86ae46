//! Database schema definitions using sea-query.
//!
//! These define the table and column identifiers for type-safe query
//! building.

use sea_query::Iden;

/// Orders table schema.
#[derive(Iden)]
pub enum Orders {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "customer_name"]
    CustomerName,
    #[iden = "customer_phone"]
    CustomerPhone,
    #[iden = "customer_email"]
    CustomerEmail,
    #[iden = "customer_address"]
    CustomerAddress,
    #[iden = "customer_note"]
    CustomerNote,
    #[iden = "items"]
    Items,
    #[iden = "total_amount"]
    TotalAmount,
    #[iden = "payment_method"]
    PaymentMethod,
    #[iden = "payment_status"]
    PaymentStatus,
    #[iden = "transaction_id"]
    TransactionId,
    #[iden = "status"]
    Status,
    #[iden = "paid_at"]
    PaidAt,
    #[iden = "created_at"]
    CreatedAt,
    #[iden = "updated_at"]
    UpdatedAt,
}

/// SQL for creating the orders table.
pub const CREATE_ORDERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS orders (
    id TEXT NOT NULL PRIMARY KEY,
    customer_name TEXT NOT NULL,
    customer_phone TEXT NOT NULL,
    customer_email TEXT,
    customer_address TEXT NOT NULL,
    customer_note TEXT,
    items TEXT NOT NULL,
    total_amount INTEGER NOT NULL,
    payment_method TEXT,
    payment_status TEXT NOT NULL,
    transaction_id TEXT,
    status TEXT NOT NULL,
    paid_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_orders_created_at ON orders(created_at);
"#;
