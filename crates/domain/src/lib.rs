//! Domain layer for the order lifecycle engine.
//!
//! This crate provides:
//! - Money and order line value objects
//! - The `Order` aggregate with its derived totals and discount cap
//! - The order status state machine and its transition table

pub mod order;

pub use common::{CustomerId, OrderId, Version};
pub use order::{
    CreateOrder, CustomerTier, MAX_DISCOUNT_DENOMINATOR, MAX_DISCOUNT_NUMERATOR, Money, Order,
    OrderError, OrderItem, OrderStatus, PaymentStatus, ProductId,
};
