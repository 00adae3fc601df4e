use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use domain::Order;
use tokio::sync::RwLock;

use crate::{
    CustomerId, OrderId, Result, StoreError, Version,
    repository::{OrderRepository, StatusUpdate},
};

#[derive(Default)]
struct Orders {
    by_id: HashMap<OrderId, Order>,
    /// Creation order, for stable listings.
    created: Vec<OrderId>,
}

/// In-memory order repository.
///
/// Keeps the same contract as a database-backed repository, including
/// identifier assignment and version checks. Failure switches let tests
/// simulate an unavailable store.
#[derive(Clone, Default)]
pub struct InMemoryOrderRepository {
    orders: Arc<RwLock<Orders>>,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
    writes: Arc<AtomicUsize>,
}

impl InMemoryOrderRepository {
    /// Creates a new empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent read fail with `Unavailable`.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent write fail with `Unavailable`.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of write calls received, successful or not.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.orders.read().await.by_id.len()
    }

    fn check_read(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("read refused".to_string()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("write refused".to_string()));
        }
        Ok(())
    }
}

fn check_version(order_id: OrderId, expected: Version, actual: Version) -> Result<()> {
    if expected != actual {
        return Err(StoreError::ConcurrencyConflict {
            order_id,
            expected,
            actual,
        });
    }
    Ok(())
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn create(&self, mut order: Order) -> Result<Order> {
        self.check_write()?;
        if order.items().is_empty() {
            return Err(StoreError::EmptyOrder);
        }

        let id = OrderId::new();
        order.assign_id(id);
        order.set_version(Version::first());

        let mut orders = self.orders.write().await;
        orders.by_id.insert(id, order.clone());
        orders.created.push(id);
        Ok(order)
    }

    async fn get_by_id(&self, id: OrderId) -> Result<Option<Order>> {
        self.check_read()?;
        Ok(self.orders.read().await.by_id.get(&id).cloned())
    }

    async fn update_status(&self, update: StatusUpdate) -> Result<Version> {
        self.check_write()?;
        let mut orders = self.orders.write().await;
        let stored = orders
            .by_id
            .get_mut(&update.order_id)
            .ok_or(StoreError::OrderNotFound(update.order_id))?;

        check_version(update.order_id, update.expected_version, stored.version())?;

        let next = stored.version().next();
        stored.overwrite_status(update.status, update.updated_at);
        stored.set_version(next);
        Ok(next)
    }

    async fn update(&self, order: &Order) -> Result<Version> {
        self.check_write()?;
        let order_id = order.id().ok_or(StoreError::Unpersisted)?;

        let mut orders = self.orders.write().await;
        let stored = orders
            .by_id
            .get_mut(&order_id)
            .ok_or(StoreError::OrderNotFound(order_id))?;

        check_version(order_id, order.version(), stored.version())?;

        let next = stored.version().next();
        *stored = order.clone();
        stored.set_version(next);
        Ok(next)
    }

    async fn list_by_customer(&self, customer_id: CustomerId) -> Result<Vec<Order>> {
        self.check_read()?;
        let orders = self.orders.read().await;
        Ok(orders
            .created
            .iter()
            .filter_map(|id| orders.by_id.get(id))
            .filter(|o| o.customer_id() == customer_id)
            .cloned()
            .collect())
    }
}
