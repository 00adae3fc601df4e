//! Order lifecycle orchestration.

use std::collections::HashMap;
use std::future::Future;

use chrono::{DateTime, Utc};
use common::{CustomerId, OrderId};
use discount::{Discounting, OrderSnapshot};
use domain::{CreateOrder, Order, OrderError, OrderItem, OrderStatus, PaymentStatus, ProductId};
use store::{OrderRepository, StatusUpdate};

use crate::config::{LifecycleConfig, TransitionPolicy};
use crate::error::{Collaborator, LifecycleError, Result};
use crate::services::{EventPublisher, PaymentService, ProductCatalog, ShippingService};

/// Owns every mutation of an order after it is placed.
///
/// The lifecycle holds no per-order state; concurrent requests for the same
/// order are serialized by the repository's version check. Every collaborator
/// call is bounded by [`LifecycleConfig::dependency_timeout`].
pub struct OrderLifecycle<O, D, P, Sh, E>
where
    O: OrderRepository,
    D: Discounting,
    P: PaymentService,
    Sh: ShippingService,
    E: EventPublisher,
{
    orders: O,
    discounts: D,
    payment: P,
    shipping: Sh,
    events: E,
    catalog: Option<Box<dyn ProductCatalog>>,
    config: LifecycleConfig,
}

impl<O, D, P, Sh, E> OrderLifecycle<O, D, P, Sh, E>
where
    O: OrderRepository,
    D: Discounting,
    P: PaymentService,
    Sh: ShippingService,
    E: EventPublisher,
{
    /// Creates a lifecycle with the default configuration and no catalog.
    pub fn new(orders: O, discounts: D, payment: P, shipping: Sh, events: E) -> Self {
        Self {
            orders,
            discounts,
            payment,
            shipping,
            events,
            catalog: None,
            config: LifecycleConfig::default(),
        }
    }

    pub fn with_config(mut self, config: LifecycleConfig) -> Self {
        self.config = config;
        self
    }

    /// Checks stock and fills missing item categories from `catalog` when
    /// orders are created.
    pub fn with_catalog(mut self, catalog: impl ProductCatalog + 'static) -> Self {
        self.catalog = Some(Box::new(catalog));
        self
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Places a new order.
    ///
    /// Validates the items, consults the catalog if one is installed,
    /// computes the discount and persists the `Pending` order. Returns the
    /// stored order with its identifier.
    #[tracing::instrument(skip(self, cmd), fields(customer_id = %cmd.customer_id))]
    pub async fn create_order(&self, cmd: CreateOrder) -> Result<Order> {
        let now = Utc::now();
        let CreateOrder {
            customer_id,
            customer_tier,
            mut items,
            shipping_address,
        } = cmd;

        Order::validate_items(&items)?;

        if let Some(catalog) = &self.catalog {
            self.check_catalog(catalog.as_ref(), &mut items).await?;
        }

        let mut order = Order::place(customer_id, customer_tier, items, shipping_address, now)?;

        let prior_completed_orders = self
            .bounded(
                Collaborator::OrderRepository,
                self.orders.list_by_customer(customer_id),
            )
            .await??
            .iter()
            .filter(|o| o.status() == OrderStatus::Delivered)
            .count();

        let snapshot = OrderSnapshot::of(&order, prior_completed_orders, now);
        let discount = self.discounts.compute_discount(&snapshot).await;
        order.apply_discount(discount)?;

        let order = self
            .bounded(Collaborator::OrderRepository, self.orders.create(order))
            .await??;

        metrics::counter!("orders_created_total").increment(1);
        metrics::histogram!("order_discount_cents").record(discount.cents() as f64);
        tracing::info!(
            order_id = ?order.id(),
            subtotal = %order.subtotal(),
            discount = %order.discount(),
            total = %order.total(),
            "order created"
        );

        Ok(order)
    }

    /// Loads an order. Absence is `Ok(None)`.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self
            .bounded(Collaborator::OrderRepository, self.orders.get_by_id(order_id))
            .await??)
    }

    /// Lists a customer's orders, oldest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_customer_orders(&self, customer_id: CustomerId) -> Result<Vec<Order>> {
        Ok(self
            .bounded(
                Collaborator::OrderRepository,
                self.orders.list_by_customer(customer_id),
            )
            .await??)
    }

    /// Sets the status named by `status`.
    ///
    /// Fails with `InvalidStatus` unless `status` is one of the five known
    /// statuses. Under [`TransitionPolicy::Enforced`] the move must be in the
    /// transition table, and a move to `cancelled` runs the full
    /// cancellation. `shipped` is refused with `MissingTrackingReference`
    /// unless the order already has one; use [`OrderLifecycle::mark_shipped`]. Under [`TransitionPolicy::MembershipOnly`] the status is
    /// written as-is.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(&self, order_id: OrderId, status: &str) -> Result<Order> {
        let status: OrderStatus = status.parse()?;

        match self.config.transition_policy {
            TransitionPolicy::Enforced => match status {
                OrderStatus::Cancelled => self.cancel_order(order_id).await,
                OrderStatus::Paid => self.mark_paid(order_id).await,
                _ => {
                    self.advance(order_id, |order, now| order.transition_to(status, now))
                        .await
                }
            },
            TransitionPolicy::MembershipOnly => {
                let mut order = self.load(order_id).await?;
                let from = order.status();
                order.overwrite_status(status, Utc::now());
                self.save_status(&mut order).await?;

                tracing::info!(%order_id, %from, to = %status, "order status overwritten");
                Ok(order)
            }
        }
    }

    /// Records payment capture: `Pending -> Paid`.
    #[tracing::instrument(skip(self))]
    pub async fn mark_paid(&self, order_id: OrderId) -> Result<Order> {
        self.advance(order_id, |order, now| order.mark_paid(now))
            .await
    }

    /// Records carrier hand-off: `Paid -> Shipped`.
    #[tracing::instrument(skip(self))]
    pub async fn mark_shipped(&self, order_id: OrderId, tracking_reference: &str) -> Result<Order> {
        self.advance(order_id, |order, now| {
            order.mark_shipped(tracking_reference, now)
        })
        .await
    }

    /// Records delivery: `Shipped -> Delivered`.
    #[tracing::instrument(skip(self))]
    pub async fn mark_delivered(&self, order_id: OrderId) -> Result<Order> {
        self.advance(order_id, |order, now| order.mark_delivered(now))
            .await
    }

    /// Cancels an order, compensating first.
    ///
    /// Refunds a completed payment and cancels the shipment before the
    /// cancellation is persisted; either failure aborts with nothing written.
    /// The cancellation event is published after the write. If publishing
    /// fails the error is returned, but the order stays cancelled.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: OrderId) -> Result<Order> {
        let order = match self.cancel_and_persist(order_id).await {
            Ok(order) => order,
            Err(e) => {
                metrics::counter!("order_cancellation_failures_total").increment(1);
                tracing::warn!(%order_id, error = %e, "order cancellation failed");
                return Err(e);
            }
        };

        metrics::counter!("orders_cancelled_total").increment(1);
        tracing::info!(%order_id, payment_status = %order.payment_status(), "order cancelled");

        let published = self
            .bounded(
                Collaborator::EventPublisher,
                self.events.publish_order_cancelled(&order),
            )
            .await?;

        if let Err(e) = published {
            tracing::warn!(%order_id, error = %e, "order cancelled but event not published");
            return Err(LifecycleError::dependency(Collaborator::EventPublisher, e));
        }

        Ok(order)
    }

    async fn cancel_and_persist(&self, order_id: OrderId) -> Result<Order> {
        let mut order = self.load(order_id).await?;
        order.ensure_cancellable()?;

        if order.payment_status() == PaymentStatus::Completed {
            self.bounded(
                Collaborator::PaymentService,
                self.payment.process_refund(&order),
            )
            .await?
            .map_err(|e| LifecycleError::dependency(Collaborator::PaymentService, e))?;
            tracing::debug!(%order_id, total = %order.total(), "payment refunded");
        }

        let now = Utc::now();
        order.record_refund(now);

        match order.tracking_reference() {
            Some(tracking_reference) => {
                self.bounded(
                    Collaborator::ShippingService,
                    self.shipping.cancel_shipment(tracking_reference),
                )
                .await?
                .map_err(|e| LifecycleError::dependency(Collaborator::ShippingService, e))?;
                tracing::debug!(%order_id, tracking_reference, "shipment cancelled");
            }
            None => tracing::debug!(%order_id, "no shipment to cancel"),
        }

        order.cancel(now)?;
        self.save(&mut order).await?;
        Ok(order)
    }

    /// Loads, mutates through `step` and saves an order.
    async fn advance<F>(&self, order_id: OrderId, step: F) -> Result<Order>
    where
        F: FnOnce(&mut Order, DateTime<Utc>) -> std::result::Result<(), OrderError>,
    {
        let mut order = self.load(order_id).await?;
        let from = order.status();

        step(&mut order, Utc::now())?;
        self.save(&mut order).await?;

        tracing::info!(%order_id, %from, to = %order.status(), "order status changed");
        Ok(order)
    }

    async fn load(&self, order_id: OrderId) -> Result<Order> {
        self.get_order(order_id)
            .await?
            .ok_or(LifecycleError::NotFound(order_id))
    }

    /// Writes the whole order, expecting its loaded version.
    async fn save(&self, order: &mut Order) -> Result<()> {
        let version = self
            .bounded(Collaborator::OrderRepository, self.orders.update(order))
            .await??;
        order.set_version(version);
        Ok(())
    }

    /// Writes only the status, expecting the loaded version.
    async fn save_status(&self, order: &mut Order) -> Result<()> {
        let update = StatusUpdate::for_order(order).ok_or_else(|| {
            LifecycleError::dependency(Collaborator::OrderRepository, store::StoreError::Unpersisted)
        })?;
        let version = self
            .bounded(
                Collaborator::OrderRepository,
                self.orders.update_status(update),
            )
            .await??;
        order.set_version(version);
        Ok(())
    }

    /// Checks every line against the catalog and fills missing categories.
    ///
    /// Stock is compared with the total quantity requested per product.
    async fn check_catalog(
        &self,
        catalog: &dyn ProductCatalog,
        items: &mut [OrderItem],
    ) -> Result<()> {
        let mut requested: HashMap<ProductId, u64> = HashMap::new();
        for item in items.iter() {
            *requested.entry(item.product_id.clone()).or_default() += u64::from(item.quantity);
        }

        for item in items.iter_mut() {
            let info = self
                .bounded(Collaborator::ProductCatalog, catalog.lookup(&item.product_id))
                .await?
                .map_err(|e| LifecycleError::dependency(Collaborator::ProductCatalog, e))?
                .ok_or_else(|| LifecycleError::ProductNotFound(item.product_id.clone()))?;

            let wanted = requested
                .get(&item.product_id)
                .copied()
                .unwrap_or_else(|| u64::from(item.quantity));
            if wanted > u64::from(info.stock) {
                return Err(LifecycleError::InsufficientStock {
                    product_id: item.product_id.clone(),
                    requested: wanted,
                    available: info.stock,
                });
            }

            if item.category.is_none() {
                item.category = info.category;
            }
        }

        Ok(())
    }

    /// Runs `fut` under the dependency timeout.
    async fn bounded<F>(&self, collaborator: Collaborator, fut: F) -> Result<F::Output>
    where
        F: Future,
    {
        let timeout = self.config.dependency_timeout;
        tokio::time::timeout(timeout, fut).await.map_err(|_| {
            tracing::warn!(%collaborator, ?timeout, "collaborator call timed out");
            LifecycleError::Timeout {
                collaborator,
                timeout,
            }
        })
    }
}
