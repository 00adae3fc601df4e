//! Shipping service trait and in-memory implementation.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ServiceError;

/// Trait for shipping operations the lifecycle compensates with.
#[async_trait]
pub trait ShippingService: Send + Sync {
    /// Cancels the shipment identified by `tracking_reference`.
    async fn cancel_shipment(&self, tracking_reference: &str) -> Result<(), ServiceError>;
}

#[derive(Debug, Default)]
struct InMemoryShippingState {
    cancelled: HashSet<String>,
    calls: usize,
    fail_on_cancel: bool,
    delay: Option<Duration>,
}

/// In-memory shipping service for testing.
///
/// Cancelling the same shipment twice is accepted.
#[derive(Debug, Clone, Default)]
pub struct InMemoryShippingService {
    state: Arc<RwLock<InMemoryShippingState>>,
}

impl InMemoryShippingService {
    /// Creates a new in-memory shipping service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the service to fail on every cancel_shipment call.
    pub fn set_fail_on_cancel(&self, fail: bool) {
        self.state.write().unwrap().fail_on_cancel = fail;
    }

    /// Delays every call by `delay` (on the tokio clock).
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.state.write().unwrap().delay = delay;
    }

    /// Returns how many times cancel_shipment was called, failed calls included.
    pub fn cancel_calls(&self) -> usize {
        self.state.read().unwrap().calls
    }

    /// Returns true if the shipment was cancelled.
    pub fn is_cancelled(&self, tracking_reference: &str) -> bool {
        self.state
            .read()
            .unwrap()
            .cancelled
            .contains(tracking_reference)
    }
}

#[async_trait]
impl ShippingService for InMemoryShippingService {
    async fn cancel_shipment(&self, tracking_reference: &str) -> Result<(), ServiceError> {
        let delay = {
            let mut state = self.state.write().unwrap();
            state.calls += 1;
            state.delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.write().unwrap();

        if state.fail_on_cancel {
            return Err(ServiceError::Unavailable(
                "Shipping unavailable".to_string(),
            ));
        }

        state.cancelled.insert(tracking_reference.to_string());
        Ok(())
    }
}
