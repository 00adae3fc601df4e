//! Order persistence contract and an in-memory implementation.

pub mod error;
pub mod memory;
pub mod repository;

pub use common::{CustomerId, OrderId, Version};
pub use error::{Result, StoreError};
pub use memory::InMemoryOrderRepository;
pub use repository::{OrderRepository, StatusUpdate};
