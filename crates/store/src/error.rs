use common::{OrderId, Version};
use thiserror::Error;

/// Errors that can occur when interacting with an order repository.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The stored version did not match the version the caller loaded.
    #[error(
        "Concurrency conflict for order {order_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        order_id: OrderId,
        expected: Version,
        actual: Version,
    },

    /// The order was not found in the repository.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// An update was attempted on an order that was never created.
    #[error("Order has not been persisted yet")]
    Unpersisted,

    /// Refused to persist an order without line items.
    #[error("Refusing to persist an order with no items")]
    EmptyOrder,

    /// The backing storage could not be reached.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, StoreError>;
