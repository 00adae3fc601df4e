//! Payment service trait and in-memory implementation.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use common::OrderId;
use domain::{Money, Order};

use crate::error::ServiceError;

/// A refund the payment service accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Refund {
    pub refund_id: String,
    pub order_id: OrderId,
    pub amount: Money,
}

/// Trait for payment operations the lifecycle compensates with.
#[async_trait]
pub trait PaymentService: Send + Sync {
    /// Refunds the full amount charged for `order` to the customer.
    ///
    /// Only called for orders whose payment status is `Completed`.
    async fn process_refund(&self, order: &Order) -> Result<(), ServiceError>;
}

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    refunds: Vec<Refund>,
    fail_on_refund: bool,
    delay: Option<Duration>,
}

/// In-memory payment service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentService {
    state: Arc<RwLock<InMemoryPaymentState>>,
}

impl InMemoryPaymentService {
    /// Creates a new in-memory payment service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the service to fail on every refund call.
    pub fn set_fail_on_refund(&self, fail: bool) {
        self.state.write().unwrap().fail_on_refund = fail;
    }

    /// Delays every call by `delay` (on the tokio clock).
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.state.write().unwrap().delay = delay;
    }

    /// Returns the number of accepted refunds.
    pub fn refund_count(&self) -> usize {
        self.state.read().unwrap().refunds.len()
    }

    /// Returns the refunds issued for `order_id`.
    pub fn refunds_for(&self, order_id: OrderId) -> Vec<Refund> {
        self.state
            .read()
            .unwrap()
            .refunds
            .iter()
            .filter(|refund| refund.order_id == order_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl PaymentService for InMemoryPaymentService {
    async fn process_refund(&self, order: &Order) -> Result<(), ServiceError> {
        let delay = self.state.read().unwrap().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.write().unwrap();

        if state.fail_on_refund {
            return Err(ServiceError::Unavailable("Refund declined".to_string()));
        }

        let order_id = order
            .id()
            .ok_or_else(|| ServiceError::Rejected("order has no identifier".to_string()))?;

        let refund_id = format!("REF-{:04}", state.refunds.len() + 1);
        state.refunds.push(Refund {
            refund_id,
            order_id,
            amount: order.total(),
        });

        Ok(())
    }
}
