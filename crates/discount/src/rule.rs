//! Discount rules and their applicability predicates.

use chrono::{DateTime, Utc};
use domain::{CustomerTier, Money};
use serde::{Deserialize, Serialize};

use crate::snapshot::OrderSnapshot;

/// Total quantity at which a `bulk_order` rule becomes eligible.
pub const BULK_ORDER_MIN_QUANTITY: u32 = 10;

/// What a rule contributes once it applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleKind {
    /// `percent`% of the pre-discount total.
    Percentage { percent: f64 },

    /// A flat amount, granted when the order meets the rule's minimum.
    Fixed { amount: Money },

    /// Eligible only for a customer's first purchase.
    FirstPurchase,

    /// Eligible only for orders of at least [`BULK_ORDER_MIN_QUANTITY`] units.
    BulkOrder,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::Percentage { .. } => "percentage",
            RuleKind::Fixed { .. } => "fixed",
            RuleKind::FirstPurchase => "first_purchase",
            RuleKind::BulkOrder => "bulk_order",
        }
    }
}

/// A conditional, time-bounded price reduction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscountRule {
    pub name: String,

    #[serde(flatten)]
    pub kind: RuleKind,

    /// Pre-discount total the order must reach.
    #[serde(default)]
    pub min_order_amount: Money,

    /// Start of the validity window, inclusive.
    pub valid_from: DateTime<Utc>,

    /// End of the validity window, inclusive.
    pub valid_until: DateTime<Utc>,

    /// Restricts the rule to one customer tier.
    #[serde(default)]
    pub customer_tier: Option<CustomerTier>,

    /// Restricts the rule to orders containing any of these categories.
    #[serde(default)]
    pub categories: Vec<String>,
}

/// The first predicate a rule failed for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ineligibility {
    OutsideValidityWindow,
    BelowMinimumAmount,
    TierMismatch,
    NoMatchingCategory,
    NotFirstPurchase,
    BelowBulkQuantity,
}

impl DiscountRule {
    /// Creates an unrestricted rule valid between `valid_from` and `valid_until`.
    pub fn new(
        name: impl Into<String>,
        kind: RuleKind,
        valid_from: DateTime<Utc>,
        valid_until: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            min_order_amount: Money::zero(),
            valid_from,
            valid_until,
            customer_tier: None,
            categories: Vec::new(),
        }
    }

    pub fn percentage(
        name: impl Into<String>,
        percent: f64,
        valid_from: DateTime<Utc>,
        valid_until: DateTime<Utc>,
    ) -> Self {
        Self::new(name, RuleKind::Percentage { percent }, valid_from, valid_until)
    }

    pub fn fixed(
        name: impl Into<String>,
        amount: Money,
        valid_from: DateTime<Utc>,
        valid_until: DateTime<Utc>,
    ) -> Self {
        Self::new(name, RuleKind::Fixed { amount }, valid_from, valid_until)
    }

    pub fn with_min_order_amount(mut self, amount: Money) -> Self {
        self.min_order_amount = amount;
        self
    }

    pub fn for_tier(mut self, tier: CustomerTier) -> Self {
        self.customer_tier = Some(tier);
        self
    }

    pub fn for_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    /// Runs the applicability predicates in order and reports the first one
    /// that fails.
    pub fn check(&self, order: &OrderSnapshot, at: DateTime<Utc>) -> Result<(), Ineligibility> {
        if at < self.valid_from || at > self.valid_until {
            return Err(Ineligibility::OutsideValidityWindow);
        }

        if order.subtotal < self.min_order_amount {
            return Err(Ineligibility::BelowMinimumAmount);
        }

        if let Some(tier) = self.customer_tier
            && tier != order.customer_tier
        {
            return Err(Ineligibility::TierMismatch);
        }

        if !self.categories.is_empty() && !order.has_any_category(&self.categories) {
            return Err(Ineligibility::NoMatchingCategory);
        }

        match self.kind {
            RuleKind::FirstPurchase if order.prior_completed_orders > 0 => {
                Err(Ineligibility::NotFirstPurchase)
            }
            RuleKind::BulkOrder if order.total_quantity() < u64::from(BULK_ORDER_MIN_QUANTITY) => {
                Err(Ineligibility::BelowBulkQuantity)
            }
            _ => Ok(()),
        }
    }

    /// Returns true if every applicability predicate passes.
    pub fn applies_to(&self, order: &OrderSnapshot, at: DateTime<Utc>) -> bool {
        self.check(order, at).is_ok()
    }
}
