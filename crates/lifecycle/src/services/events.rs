//! Domain event publishing.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CustomerId, OrderId};
use domain::{Money, Order, PaymentStatus};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::ServiceError;

/// Published once an order's cancellation has been persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCancelled {
    pub event_id: Uuid,
    pub order_id: OrderId,
    pub customer_id: CustomerId,
    pub total: Money,
    pub refunded: bool,
    pub cancelled_at: DateTime<Utc>,
}

impl OrderCancelled {
    /// Builds the event for a persisted, cancelled order.
    pub fn for_order(order: &Order) -> Result<Self, ServiceError> {
        let order_id = order
            .id()
            .ok_or_else(|| ServiceError::Rejected("order has no identifier".to_string()))?;

        Ok(Self {
            event_id: Uuid::new_v4(),
            order_id,
            customer_id: order.customer_id(),
            total: order.total(),
            refunded: order.payment_status() == PaymentStatus::Refunded,
            cancelled_at: order.updated_at(),
        })
    }
}

/// Trait for publishing order lifecycle events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish_order_cancelled(&self, order: &Order) -> Result<(), ServiceError>;
}

#[derive(Debug, Default)]
struct InMemoryPublisherState {
    published: Vec<OrderCancelled>,
    fail: bool,
    delay: Option<Duration>,
}

/// In-memory event publisher.
///
/// Keeps every published event and fans each one out to broadcast
/// subscribers. Events sent while nobody is subscribed are only kept.
#[derive(Debug, Clone)]
pub struct InMemoryEventPublisher {
    state: Arc<RwLock<InMemoryPublisherState>>,
    sender: broadcast::Sender<OrderCancelled>,
}

impl InMemoryEventPublisher {
    /// Buffer size of the broadcast channel.
    const CHANNEL_CAPACITY: usize = 256;

    /// Creates a new in-memory event publisher.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(Self::CHANNEL_CAPACITY);
        Self {
            state: Arc::new(RwLock::new(InMemoryPublisherState::default())),
            sender,
        }
    }

    /// Subscribes to events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<OrderCancelled> {
        self.sender.subscribe()
    }

    /// Configures every publish to fail.
    pub fn set_fail(&self, fail: bool) {
        self.state.write().unwrap().fail = fail;
    }

    /// Delays every publish by `delay` (on the tokio clock).
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.state.write().unwrap().delay = delay;
    }

    /// Returns every event published so far, oldest first.
    pub fn published(&self) -> Vec<OrderCancelled> {
        self.state.read().unwrap().published.clone()
    }

    pub fn published_count(&self) -> usize {
        self.state.read().unwrap().published.len()
    }
}

impl Default for InMemoryEventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventPublisher {
    async fn publish_order_cancelled(&self, order: &Order) -> Result<(), ServiceError> {
        let delay = self.state.read().unwrap().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let event = OrderCancelled::for_order(order)?;

        {
            let mut state = self.state.write().unwrap();
            if state.fail {
                return Err(ServiceError::Unavailable("Event bus unavailable".to_string()));
            }
            state.published.push(event.clone());
        }

        // No subscribers is not an error.
        let _ = self.sender.send(event);
        Ok(())
    }
}
