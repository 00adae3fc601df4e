//! Order aggregate and related types.

mod aggregate;
mod commands;
mod state;
mod value_objects;

pub use aggregate::{MAX_DISCOUNT_DENOMINATOR, MAX_DISCOUNT_NUMERATOR, Order};
pub use commands::CreateOrder;
pub use state::{OrderStatus, PaymentStatus};
pub use value_objects::{CustomerTier, Money, OrderItem, ProductId};

use thiserror::Error;

/// Errors raised by order invariants.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Order has no items.
    #[error("Order must have at least one item")]
    EmptyOrder,

    /// Invalid quantity.
    #[error("Invalid quantity for {product_id}: {quantity} (must be at least 1)")]
    InvalidQuantity { product_id: String, quantity: u32 },

    /// Invalid price.
    #[error("Invalid unit price for {product_id}: {price} cents (must not be negative)")]
    InvalidPrice { product_id: String, price: i64 },

    /// Status string is not one of the recognized values.
    #[error("Invalid order status: {status:?}")]
    InvalidStatus { status: String },

    /// The order is delivered or cancelled.
    #[error("Order is in terminal state {status}")]
    TerminalState { status: OrderStatus },

    /// The transition table does not allow this move.
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Line or order amounts do not fit in the money representation.
    #[error("Order amount overflows for {product_id}")]
    AmountOverflow { product_id: String },

    /// Shipping requires a tracking reference; use `mark_shipped`.
    #[error("Cannot ship an order without a tracking reference")]
    MissingTrackingReference,

    /// A discount outside `0..=max` was applied.
    #[error("Discount {discount} out of range (max {max})")]
    DiscountOutOfRange { discount: Money, max: Money },
}
