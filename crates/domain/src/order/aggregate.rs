//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{CustomerId, OrderId, Version};
use serde::{Deserialize, Serialize};

use super::{CustomerTier, Money, OrderError, OrderItem, OrderStatus, PaymentStatus};

/// Upper bound of the discount, as a fraction of the pre-discount total.
pub const MAX_DISCOUNT_NUMERATOR: i64 = 7;
pub const MAX_DISCOUNT_DENOMINATOR: i64 = 10;

/// Order aggregate root.
///
/// All monetary fields are derived: `subtotal` from the items, `total` from
/// `subtotal - discount`. Mutations go through methods that keep those
/// invariants and the status transition table intact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Assigned by the repository on first persistence.
    id: Option<OrderId>,

    /// Current version for optimistic concurrency.
    #[serde(default)]
    version: Version,

    customer_id: CustomerId,

    #[serde(default)]
    customer_tier: CustomerTier,

    /// Line items in the order they were placed.
    items: Vec<OrderItem>,

    subtotal: Money,
    discount: Money,
    total: Money,

    status: OrderStatus,
    payment_status: PaymentStatus,

    shipping_address: String,
    tracking_reference: Option<String>,

    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Order {
    /// Places a new `Pending` order.
    ///
    /// Validates the items, recomputes every subtotal and derives the order
    /// subtotal. Fails with `AmountOverflow` if an amount does not fit. The
    /// discount starts at zero; see [`Order::apply_discount`].
    pub fn place(
        customer_id: CustomerId,
        customer_tier: CustomerTier,
        mut items: Vec<OrderItem>,
        shipping_address: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, OrderError> {
        Self::validate_items(&items)?;

        let mut subtotal = Money::zero();
        for item in &mut items {
            item.recompute_subtotal()?;
            subtotal = subtotal.checked_add(item.subtotal).ok_or_else(|| {
                OrderError::AmountOverflow {
                    product_id: item.product_id.to_string(),
                }
            })?;
        }

        Ok(Self {
            id: None,
            version: Version::initial(),
            customer_id,
            customer_tier,
            items,
            subtotal,
            discount: Money::zero(),
            total: subtotal,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            shipping_address: shipping_address.into(),
            tracking_reference: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Checks the line items an order would be placed with.
    ///
    /// Rejects an empty list, zero quantities and negative unit prices, in
    /// that order.
    pub fn validate_items(items: &[OrderItem]) -> Result<(), OrderError> {
        if items.is_empty() {
            return Err(OrderError::EmptyOrder);
        }

        for item in items {
            if item.quantity == 0 {
                return Err(OrderError::InvalidQuantity {
                    product_id: item.product_id.to_string(),
                    quantity: item.quantity,
                });
            }
            if item.unit_price.is_negative() {
                return Err(OrderError::InvalidPrice {
                    product_id: item.product_id.to_string(),
                    price: item.unit_price.cents(),
                });
            }
        }
        Ok(())
    }

    /// Largest discount any order with this subtotal may carry.
    pub fn max_discount_for(subtotal: Money) -> Money {
        subtotal.ratio(MAX_DISCOUNT_NUMERATOR, MAX_DISCOUNT_DENOMINATOR)
    }
}

// Query methods
impl Order {
    pub fn id(&self) -> Option<OrderId> {
        self.id
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    pub fn customer_tier(&self) -> CustomerTier {
        self.customer_tier
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    /// Pre-discount total.
    pub fn subtotal(&self) -> Money {
        self.subtotal
    }

    pub fn discount(&self) -> Money {
        self.discount
    }

    /// Amount due after the discount.
    pub fn total(&self) -> Money {
        self.total
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn shipping_address(&self) -> &str {
        &self.shipping_address
    }

    pub fn tracking_reference(&self) -> Option<&str> {
        self.tracking_reference.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

// Mutations
impl Order {
    /// Applies a computed discount and re-derives the total.
    pub fn apply_discount(&mut self, discount: Money) -> Result<(), OrderError> {
        let max = Self::max_discount_for(self.subtotal);
        if discount.is_negative() || discount > max {
            return Err(OrderError::DiscountOutOfRange { discount, max });
        }

        self.discount = discount;
        self.total = self.subtotal - discount;
        Ok(())
    }

    /// Moves the order to `next` if the transition table allows it.
    ///
    /// Moving to `Shipped` also requires a tracking reference, so shipments
    /// go through [`Order::mark_shipped`].
    pub fn transition_to(
        &mut self,
        next: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<(), OrderError> {
        self.check_transition(next)?;
        if next == OrderStatus::Shipped && self.tracking_reference.is_none() {
            return Err(OrderError::MissingTrackingReference);
        }

        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    fn check_transition(&self, next: OrderStatus) -> Result<(), OrderError> {
        if self.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(OrderError::InvalidTransition {
                from: self.status,
                to: next,
            })
        }
    }

    /// Sets the status without consulting the transition table.
    ///
    /// Only for callers that have explicitly opted out of transition
    /// enforcement; see the lifecycle's transition policy.
    pub fn overwrite_status(&mut self, status: OrderStatus, now: DateTime<Utc>) {
        self.status = status;
        self.updated_at = now;
    }

    /// Checks that the order may still be cancelled.
    pub fn ensure_cancellable(&self) -> Result<(), OrderError> {
        if self.status.can_cancel() {
            Ok(())
        } else {
            Err(OrderError::TerminalState {
                status: self.status,
            })
        }
    }

    /// Cancels the order. Fails with `TerminalState` for delivered or
    /// already cancelled orders.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), OrderError> {
        self.ensure_cancellable()?;
        self.status = OrderStatus::Cancelled;
        self.updated_at = now;
        Ok(())
    }

    /// Records a captured payment: `Pending -> Paid`.
    pub fn mark_paid(&mut self, now: DateTime<Utc>) -> Result<(), OrderError> {
        self.transition_to(OrderStatus::Paid, now)?;
        self.payment_status = PaymentStatus::Completed;
        Ok(())
    }

    /// Records the carrier hand-off: `Paid -> Shipped`.
    pub fn mark_shipped(
        &mut self,
        tracking_reference: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), OrderError> {
        self.check_transition(OrderStatus::Shipped)?;
        self.tracking_reference = Some(tracking_reference.into());
        self.transition_to(OrderStatus::Shipped, now)
    }

    /// Records delivery: `Shipped -> Delivered`.
    pub fn mark_delivered(&mut self, now: DateTime<Utc>) -> Result<(), OrderError> {
        self.transition_to(OrderStatus::Delivered, now)
    }

    /// Records that a captured payment was returned to the customer.
    ///
    /// No-op unless the payment is `Completed`.
    pub fn record_refund(&mut self, now: DateTime<Utc>) {
        if self.payment_status == PaymentStatus::Completed {
            self.payment_status = PaymentStatus::Refunded;
            self.updated_at = now;
        }
    }

    /// Called by repositories when the order is first stored.
    pub fn assign_id(&mut self, id: OrderId) {
        self.id = Some(id);
    }

    /// Called by repositories after a successful write.
    pub fn set_version(&mut self, version: Version) {
        self.version = version;
    }
}
