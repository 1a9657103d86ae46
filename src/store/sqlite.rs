//! SQLite OrderStore implementation.
//!
//! The settlement compare-and-set is a single conditional UPDATE keyed
//! on the current payment status, so racing callbacks never read-modify-
//! write across round trips.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_query::{Expr, Order as SortOrder, Query, SqliteQueryBuilder};
use sqlx::{Row, SqlitePool};
use sqlx::sqlite::SqliteRow;
use uuid::Uuid;

use crate::interfaces::order_store::{
    Disposition, OrderStore, Result, SettleOutcome, StoreError,
};
use crate::orders::{Customer, Order, OrderStatus, PaymentMethod, PaymentStatus};
use crate::store::schema::{Orders, CREATE_ORDERS_TABLE};
use crate::store::settle_noop_outcome;

/// SQLite implementation of OrderStore.
pub struct SqliteOrderStore {
    pool: SqlitePool,
}

impl SqliteOrderStore {
    /// Create a new SQLite order store.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the schema if it does not exist yet.
    pub async fn init(&self) -> Result<()> {
        sqlx::raw_sql(CREATE_ORDERS_TABLE).execute(&self.pool).await?;
        Ok(())
    }

    fn select_all() -> sea_query::SelectStatement {
        let mut stmt = Query::select();
        stmt.columns([
            Orders::Id,
            Orders::CustomerName,
            Orders::CustomerPhone,
            Orders::CustomerEmail,
            Orders::CustomerAddress,
            Orders::CustomerNote,
            Orders::Items,
            Orders::TotalAmount,
            Orders::PaymentMethod,
            Orders::PaymentStatus,
            Orders::TransactionId,
            Orders::Status,
            Orders::PaidAt,
            Orders::CreatedAt,
            Orders::UpdatedAt,
        ])
        .from(Orders::Table);
        stmt
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("timestamp: {e}")))
}

fn row_to_order(row: &SqliteRow) -> Result<Order> {
    let id: String = row.try_get("id")?;
    let id = Uuid::parse_str(&id).map_err(|e| StoreError::Corrupt(format!("id: {e}")))?;

    let items_json: String = row.try_get("items")?;
    let items = serde_json::from_str(&items_json)
        .map_err(|e| StoreError::Corrupt(format!("items: {e}")))?;

    let payment_method = match row.try_get::<Option<String>, _>("payment_method")? {
        Some(s) => Some(s.parse().map_err(StoreError::Corrupt)?),
        None => None,
    };
    let payment_status: PaymentStatus = row
        .try_get::<String, _>("payment_status")?
        .parse()
        .map_err(StoreError::Corrupt)?;
    let status: OrderStatus = row
        .try_get::<String, _>("status")?
        .parse()
        .map_err(StoreError::Corrupt)?;

    let paid_at = match row.try_get::<Option<String>, _>("paid_at")? {
        Some(s) => Some(parse_timestamp(&s)?),
        None => None,
    };

    Ok(Order {
        id,
        customer: Customer {
            name: row.try_get("customer_name")?,
            phone: row.try_get("customer_phone")?,
            email: row.try_get("customer_email")?,
            address: row.try_get("customer_address")?,
            note: row.try_get("customer_note")?,
        },
        items,
        total_amount: row.try_get("total_amount")?,
        payment_method,
        payment_status,
        transaction_id: row.try_get("transaction_id")?,
        status,
        paid_at,
        created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
        updated_at: parse_timestamp(&row.try_get::<String, _>("updated_at")?)?,
    })
}

#[async_trait]
impl OrderStore for SqliteOrderStore {
    async fn insert(&self, order: &Order) -> Result<()> {
        let items_json = serde_json::to_string(&order.items)
            .map_err(|e| StoreError::Corrupt(format!("items: {e}")))?;

        let query = Query::insert()
            .into_table(Orders::Table)
            .columns([
                Orders::Id,
                Orders::CustomerName,
                Orders::CustomerPhone,
                Orders::CustomerEmail,
                Orders::CustomerAddress,
                Orders::CustomerNote,
                Orders::Items,
                Orders::TotalAmount,
                Orders::PaymentMethod,
                Orders::PaymentStatus,
                Orders::TransactionId,
                Orders::Status,
                Orders::PaidAt,
                Orders::CreatedAt,
                Orders::UpdatedAt,
            ])
            .values_panic([
                order.id.to_string().into(),
                order.customer.name.clone().into(),
                order.customer.phone.clone().into(),
                order.customer.email.clone().into(),
                order.customer.address.clone().into(),
                order.customer.note.clone().into(),
                items_json.into(),
                order.total_amount.into(),
                order.payment_method.map(|m| m.as_str().to_string()).into(),
                order.payment_status.as_str().into(),
                order.transaction_id.clone().into(),
                order.status.as_str().into(),
                order.paid_at.map(|ts| ts.to_rfc3339()).into(),
                order.created_at.to_rfc3339().into(),
                order.updated_at.to_rfc3339().into(),
            ])
            .to_string(SqliteQueryBuilder);

        sqlx::query(&query).execute(&self.pool).await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Order> {
        let query = Self::select_all()
            .and_where(Expr::col(Orders::Id).eq(id.to_string()))
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound(id))?;
        row_to_order(&row)
    }

    async fn list(&self) -> Result<Vec<Order>> {
        let query = Self::select_all()
            .order_by(Orders::CreatedAt, SortOrder::Desc)
            .to_string(SqliteQueryBuilder);

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_order).collect()
    }

    async fn set_payment_method(
        &self,
        id: Uuid,
        method: PaymentMethod,
        transaction_id: Option<String>,
    ) -> Result<Order> {
        let mut stmt = Query::update();
        stmt.table(Orders::Table)
            .values([
                (Orders::PaymentMethod, method.as_str().into()),
                (Orders::UpdatedAt, Utc::now().to_rfc3339().into()),
            ])
            .and_where(Expr::col(Orders::Id).eq(id.to_string()));
        if let Some(txn) = transaction_id {
            stmt.values([(Orders::TransactionId, txn.into())]);
        }
        let query = stmt.to_string(SqliteQueryBuilder);

        let result = sqlx::query(&query).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        self.get(id).await
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
        mark_paid: Option<DateTime<Utc>>,
    ) -> Result<Order> {
        let mut stmt = Query::update();
        stmt.table(Orders::Table)
            .values([
                (Orders::Status, to.as_str().into()),
                (Orders::UpdatedAt, Utc::now().to_rfc3339().into()),
            ])
            .and_where(Expr::col(Orders::Id).eq(id.to_string()))
            .and_where(Expr::col(Orders::Status).eq(from.as_str()));
        if let Some(paid_at) = mark_paid {
            stmt.values([
                (Orders::PaymentStatus, PaymentStatus::Paid.as_str().into()),
                (Orders::PaidAt, paid_at.to_rfc3339().into()),
            ]);
        }
        let query = stmt.to_string(SqliteQueryBuilder);

        let result = sqlx::query(&query).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            // Distinguish a missing order from a lost race.
            self.get(id).await?;
            return Err(StoreError::Stale(id));
        }
        self.get(id).await
    }

    async fn settle(&self, id: Uuid, disposition: Disposition) -> Result<SettleOutcome> {
        let now = Utc::now().to_rfc3339();
        let query = match &disposition {
            Disposition::Paid { transaction_id } => Query::update()
                .table(Orders::Table)
                .values([
                    (Orders::PaymentStatus, PaymentStatus::Paid.as_str().into()),
                    (Orders::Status, OrderStatus::Confirmed.as_str().into()),
                    (Orders::TransactionId, transaction_id.clone().into()),
                    (Orders::PaidAt, now.clone().into()),
                    (Orders::UpdatedAt, now.clone().into()),
                ])
                .and_where(Expr::col(Orders::Id).eq(id.to_string()))
                .and_where(Expr::col(Orders::PaymentStatus).ne(PaymentStatus::Paid.as_str()))
                .to_string(SqliteQueryBuilder),
            Disposition::Failed => Query::update()
                .table(Orders::Table)
                .values([
                    (Orders::PaymentStatus, PaymentStatus::Failed.as_str().into()),
                    (Orders::UpdatedAt, now.clone().into()),
                ])
                .and_where(Expr::col(Orders::Id).eq(id.to_string()))
                .and_where(Expr::col(Orders::PaymentStatus).eq(PaymentStatus::Unpaid.as_str()))
                .to_string(SqliteQueryBuilder),
        };

        let result = sqlx::query(&query).execute(&self.pool).await?;
        let order = self.get(id).await?;
        if result.rows_affected() == 1 {
            Ok(SettleOutcome::Applied(order))
        } else {
            Ok(settle_noop_outcome(&order, &disposition))
        }
    }

    async fn delete(&self, id: Uuid) -> Result<Order> {
        let order = self.get(id).await?;

        let query = Query::delete()
            .from_table(Orders::Table)
            .and_where(Expr::col(Orders::Id).eq(id.to_string()))
            .to_string(SqliteQueryBuilder);

        let result = sqlx::query(&query).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(order)
    }
}
