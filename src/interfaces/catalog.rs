//! Catalog price lookup interface.
//!
//! The product catalog itself (storage, admin CRUD, media) lives outside
//! this service; order creation only needs the authoritative unit price
//! for a product reference at snapshot time.

use async_trait::async_trait;

/// Result type for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Errors from catalog lookups.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

/// Interface for resolving authoritative unit prices.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Current unit price for a product reference, or `None` when the
    /// reference is unknown to the catalog.
    async fn unit_price(&self, product_ref: &str) -> Result<Option<i64>>;
}
