//! Product catalog lookups used when placing orders.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use domain::ProductId;

use crate::error::ServiceError;

/// What the catalog knows about a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductInfo {
    /// Units available to order.
    pub stock: u32,
    pub category: Option<String>,
}

impl ProductInfo {
    pub fn new(stock: u32) -> Self {
        Self {
            stock,
            category: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// Trait for product lookups.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Returns None if the product is unknown.
    async fn lookup(&self, product_id: &ProductId) -> Result<Option<ProductInfo>, ServiceError>;
}

/// In-memory product catalog.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProductCatalog {
    products: Arc<RwLock<HashMap<ProductId, ProductInfo>>>,
    fail: Arc<AtomicBool>,
}

impl InMemoryProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a product.
    pub fn insert(&self, product_id: impl Into<ProductId>, info: ProductInfo) {
        self.products.write().unwrap().insert(product_id.into(), info);
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with_product(self, product_id: impl Into<ProductId>, info: ProductInfo) -> Self {
        self.insert(product_id, info);
        self
    }

    /// Configures every lookup to fail.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProductCatalog for InMemoryProductCatalog {
    async fn lookup(&self, product_id: &ProductId) -> Result<Option<ProductInfo>, ServiceError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ServiceError::Unavailable("Catalog unavailable".to_string()));
        }
        Ok(self.products.read().unwrap().get(product_id).cloned())
    }
}
