//! Identifier types shared across the order lifecycle crates.

mod types;

pub use types::{CustomerId, OrderId, Version};
