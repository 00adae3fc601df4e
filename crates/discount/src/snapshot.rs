//! Immutable order view consumed by the discount subsystem.

use chrono::{DateTime, Utc};
use common::CustomerId;
use domain::{CustomerTier, Money, Order, OrderItem};

/// What the rule engine and calculator see of an order.
///
/// Built once per evaluation; nothing in this crate mutates an order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSnapshot {
    pub customer_id: CustomerId,
    pub customer_tier: CustomerTier,
    pub items: Vec<OrderItem>,

    /// Pre-discount total, the sum of item subtotals.
    pub subtotal: Money,

    /// Delivered orders the customer already has.
    pub prior_completed_orders: usize,

    /// The instant rules are evaluated against.
    pub evaluated_at: DateTime<Utc>,
}

impl OrderSnapshot {
    /// Builds a snapshot from raw parts; the subtotal is derived from the items.
    pub fn new(
        customer_id: CustomerId,
        customer_tier: CustomerTier,
        items: Vec<OrderItem>,
        prior_completed_orders: usize,
        evaluated_at: DateTime<Utc>,
    ) -> Self {
        let subtotal = items.iter().map(|item| item.unit_price.multiply(item.quantity)).sum();
        Self {
            customer_id,
            customer_tier,
            items,
            subtotal,
            prior_completed_orders,
            evaluated_at,
        }
    }

    /// Snapshots a draft order.
    pub fn of(order: &Order, prior_completed_orders: usize, evaluated_at: DateTime<Utc>) -> Self {
        Self {
            customer_id: order.customer_id(),
            customer_tier: order.customer_tier(),
            items: order.items().to_vec(),
            subtotal: order.subtotal(),
            prior_completed_orders,
            evaluated_at,
        }
    }

    /// Sum of all line quantities.
    pub fn total_quantity(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    /// Returns true if at least one item's category is in `categories`.
    pub fn has_any_category(&self, categories: &[String]) -> bool {
        self.items
            .iter()
            .filter_map(|item| item.category.as_deref())
            .any(|category| categories.iter().any(|c| c == category))
    }
}
