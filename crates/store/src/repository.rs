use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{Order, OrderStatus};

use crate::{CustomerId, OrderId, Result, Version};

/// A status-only write, checked against the version the caller loaded.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub order_id: OrderId,
    pub status: OrderStatus,
    /// Version the caller read; the write fails with `ConcurrencyConflict`
    /// if the stored order has moved on.
    pub expected_version: Version,
    pub updated_at: DateTime<Utc>,
}

impl StatusUpdate {
    /// Builds a status update for an order the caller already holds.
    ///
    /// Returns `None` if the order was never persisted.
    pub fn for_order(order: &Order) -> Option<Self> {
        Some(Self {
            order_id: order.id()?,
            status: order.status(),
            expected_version: order.version(),
            updated_at: order.updated_at(),
        })
    }
}

/// Core trait for order persistence.
///
/// Implementations must be thread-safe (Send + Sync). Writes to an existing
/// order are compare-and-swap on its [`Version`]: two requests racing on the
/// same order cannot both succeed.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persists a new order.
    ///
    /// Assigns the identifier and sets the version to [`Version::first`].
    /// Returns the stored order.
    async fn create(&self, order: Order) -> Result<Order>;

    /// Loads an order by ID.
    ///
    /// Returns None if the order doesn't exist.
    async fn get_by_id(&self, id: OrderId) -> Result<Option<Order>>;

    /// Changes only the status and update timestamp of an order.
    ///
    /// Returns the new version.
    async fn update_status(&self, update: StatusUpdate) -> Result<Version>;

    /// Replaces a stored order with `order`, expecting `order.version()` to
    /// still be current.
    ///
    /// Returns the new version.
    async fn update(&self, order: &Order) -> Result<Version>;

    /// Lists a customer's orders, oldest first.
    async fn list_by_customer(&self, customer_id: CustomerId) -> Result<Vec<Order>>;
}
