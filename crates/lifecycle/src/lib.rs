//! Order lifecycle engine.
//!
//! This crate ties the order repository, the discount calculator and the
//! external collaborators together:
//! 1. Create: validate items, price them, apply the capped discount, persist
//! 2. Advance: `Pending -> Paid -> Shipped -> Delivered`
//! 3. Cancel: refund, cancel the shipment, persist, publish `OrderCancelled`
//!
//! Compensations run before the cancellation is written. If one fails,
//! nothing is persisted and the error is returned.

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod services;
pub mod telemetry;

pub use config::{LifecycleConfig, LogFormat, TransitionPolicy};
pub use error::{Collaborator, LifecycleError, ServiceError};
pub use lifecycle::OrderLifecycle;
pub use services::{
    EventPublisher, InMemoryEventPublisher, InMemoryPaymentService, InMemoryProductCatalog,
    InMemoryShippingService, OrderCancelled, PaymentService, ProductCatalog, ProductInfo, Refund,
    ShippingService,
};
pub use telemetry::init_tracing;
