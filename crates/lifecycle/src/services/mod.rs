//! External collaborator traits and in-memory implementations.

pub mod catalog;
pub mod events;
pub mod payment;
pub mod shipping;

pub use catalog::{InMemoryProductCatalog, ProductCatalog, ProductInfo};
pub use events::{EventPublisher, InMemoryEventPublisher, OrderCancelled};
pub use payment::{InMemoryPaymentService, PaymentService, Refund};
pub use shipping::{InMemoryShippingService, ShippingService};
