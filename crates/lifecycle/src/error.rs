//! Lifecycle error types.

use std::time::Duration;

use common::{OrderId, Version};
use domain::{OrderError, OrderStatus, ProductId};
use store::StoreError;
use thiserror::Error;

/// The external party a lifecycle operation depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collaborator {
    OrderRepository,
    PaymentService,
    ShippingService,
    EventPublisher,
    ProductCatalog,
}

impl Collaborator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collaborator::OrderRepository => "order_repository",
            Collaborator::PaymentService => "payment_service",
            Collaborator::ShippingService => "shipping_service",
            Collaborator::EventPublisher => "event_publisher",
            Collaborator::ProductCatalog => "product_catalog",
        }
    }
}

impl std::fmt::Display for Collaborator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Failures reported by payment, shipping, eventing and catalog services.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The service could not be reached.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// The service refused the request.
    #[error("Request rejected: {0}")]
    Rejected(String),
}

/// Errors returned by [`OrderLifecycle`](crate::OrderLifecycle) operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Order must have at least one item")]
    EmptyOrder,

    #[error("Invalid quantity for {product_id}: {quantity} (must be at least 1)")]
    InvalidQuantity { product_id: String, quantity: u32 },

    #[error("Invalid unit price for {product_id}: {price} cents (must not be negative)")]
    InvalidPrice { product_id: String, price: i64 },

    #[error("Invalid order status: {status:?}")]
    InvalidStatus { status: String },

    /// Line or order amounts do not fit in the money representation.
    #[error("Order amount overflows for {product_id}")]
    AmountOverflow { product_id: String },

    #[error("Insufficient stock for {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u64,
        available: u32,
    },

    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The order is delivered or already cancelled.
    #[error("Order is in terminal state {status}")]
    TerminalState { status: OrderStatus },

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Shipping goes through `mark_shipped`, which records the tracking reference.
    #[error("Cannot ship an order without a tracking reference")]
    MissingTrackingReference,

    #[error("Order not found: {0}")]
    NotFound(OrderId),

    /// Another writer updated the order since it was loaded.
    #[error("Order {order_id} was modified concurrently (expected version {expected}, found {actual})")]
    Conflict {
        order_id: OrderId,
        expected: Version,
        actual: Version,
    },

    #[error("{collaborator} failed: {source}")]
    Dependency {
        collaborator: Collaborator,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("{collaborator} did not respond within {timeout:?}")]
    Timeout {
        collaborator: Collaborator,
        timeout: Duration,
    },

    /// An order invariant that no lifecycle input should be able to break.
    #[error(transparent)]
    Invariant(OrderError),
}

impl LifecycleError {
    /// Wraps a collaborator failure.
    pub fn dependency(
        collaborator: Collaborator,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        LifecycleError::Dependency {
            collaborator,
            source: Box::new(source),
        }
    }

    /// Returns true if repeating the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LifecycleError::Dependency { .. }
                | LifecycleError::Timeout { .. }
                | LifecycleError::Conflict { .. }
        )
    }

    /// The collaborator that caused the failure, if any.
    pub fn collaborator(&self) -> Option<Collaborator> {
        match self {
            LifecycleError::Dependency { collaborator, .. }
            | LifecycleError::Timeout { collaborator, .. } => Some(*collaborator),
            LifecycleError::Conflict { .. } => Some(Collaborator::OrderRepository),
            _ => None,
        }
    }
}

impl From<OrderError> for LifecycleError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::EmptyOrder => LifecycleError::EmptyOrder,
            OrderError::InvalidQuantity {
                product_id,
                quantity,
            } => LifecycleError::InvalidQuantity {
                product_id,
                quantity,
            },
            OrderError::InvalidPrice { product_id, price } => {
                LifecycleError::InvalidPrice { product_id, price }
            }
            OrderError::InvalidStatus { status } => LifecycleError::InvalidStatus { status },
            OrderError::TerminalState { status } => LifecycleError::TerminalState { status },
            OrderError::InvalidTransition { from, to } => {
                LifecycleError::InvalidTransition { from, to }
            }
            OrderError::AmountOverflow { product_id } => {
                LifecycleError::AmountOverflow { product_id }
            }
            OrderError::MissingTrackingReference => LifecycleError::MissingTrackingReference,
            other @ OrderError::DiscountOutOfRange { .. } => LifecycleError::Invariant(other),
        }
    }
}

impl From<StoreError> for LifecycleError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ConcurrencyConflict {
                order_id,
                expected,
                actual,
            } => LifecycleError::Conflict {
                order_id,
                expected,
                actual,
            },
            StoreError::OrderNotFound(order_id) => LifecycleError::NotFound(order_id),
            other => LifecycleError::dependency(Collaborator::OrderRepository, other),
        }
    }
}

/// Convenience type alias for lifecycle results.
pub type Result<T> = std::result::Result<T, LifecycleError>;
