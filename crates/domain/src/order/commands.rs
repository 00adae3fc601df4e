//! Order commands.

use common::CustomerId;

use super::{CustomerTier, OrderItem};

/// Command to place a new order.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    /// The customer placing the order.
    pub customer_id: CustomerId,

    /// The customer's segment, used for tier-restricted and loyalty discounts.
    pub customer_tier: CustomerTier,

    /// Line items. Subtotals are recomputed; whatever the caller put there is ignored.
    pub items: Vec<OrderItem>,

    pub shipping_address: String,
}

impl CreateOrder {
    /// Creates a new CreateOrder command for a regular-tier customer.
    pub fn new(
        customer_id: CustomerId,
        items: Vec<OrderItem>,
        shipping_address: impl Into<String>,
    ) -> Self {
        Self {
            customer_id,
            customer_tier: CustomerTier::default(),
            items,
            shipping_address: shipping_address.into(),
        }
    }

    /// Sets the customer tier.
    pub fn with_tier(mut self, tier: CustomerTier) -> Self {
        self.customer_tier = tier;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Money;

    #[test]
    fn test_new_defaults_to_regular_tier() {
        let cmd = CreateOrder::new(
            CustomerId::new(),
            vec![OrderItem::new("SKU-1", 1, Money::from_cents(100))],
            "1 Main St",
        );
        assert_eq!(cmd.customer_tier, CustomerTier::Regular);
        assert_eq!(cmd.with_tier(CustomerTier::Premium).customer_tier, CustomerTier::Premium);
    }
}
