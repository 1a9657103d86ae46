//! Catalog implementations.
//!
//! The real catalog is owned by the storefront's product service; this
//! crate only ships a config-seeded static implementation for standalone
//! deployments and tests.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::interfaces::catalog::{Catalog, Result};

/// Catalog backed by a fixed price map.
pub struct StaticCatalog {
    prices: HashMap<String, i64>,
}

impl StaticCatalog {
    pub fn new(prices: HashMap<String, i64>) -> Self {
        Self { prices }
    }
}

#[async_trait]
impl Catalog for StaticCatalog {
    async fn unit_price(&self, product_ref: &str) -> Result<Option<i64>> {
        Ok(self.prices.get(product_ref).copied())
    }
}
