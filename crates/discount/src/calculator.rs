//! Combines rule, seasonal and loyalty discounts into one capped amount.

use async_trait::async_trait;
use domain::{CustomerTier, Money, Order};

use crate::cache::RuleCache;
use crate::engine::RuleEngine;
use crate::repository::RuleRepository;
use crate::rule::{DiscountRule, RuleKind};
use crate::snapshot::OrderSnapshot;
use crate::strategy::{DiscountStrategy, HolidaySeason, NoDiscount};

/// Anything that can price the discount for a draft order.
///
/// The lifecycle depends on this seam rather than on the calculator's
/// generic parameters.
#[async_trait]
pub trait Discounting: Send + Sync {
    /// Returns the discount for `order`, already clamped to the hard cap.
    async fn compute_discount(&self, order: &OrderSnapshot) -> Money;
}

/// Breakdown of one discount computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiscountBreakdown {
    pub rules: Money,
    pub seasonal: Money,
    pub loyalty: Money,

    /// Sum of the components after the cap.
    pub applied: Money,
}

impl DiscountBreakdown {
    /// Sum of the components before the cap.
    pub fn uncapped(&self) -> Money {
        self.rules + self.seasonal + self.loyalty
    }

    pub fn was_capped(&self) -> bool {
        self.applied < self.uncapped()
    }
}

/// Sums what each rule contributes to `order`.
///
/// `percentage` rules contribute a share of the pre-discount total. `fixed`
/// rules contribute their amount when the order reaches that rule's own
/// minimum. Eligibility-only kinds contribute nothing.
pub fn rule_discount(rules: &[DiscountRule], order: &OrderSnapshot) -> Money {
    rules
        .iter()
        .map(|rule| match &rule.kind {
            RuleKind::Percentage { percent } => order.subtotal.percent(*percent),
            RuleKind::Fixed { amount } if order.subtotal >= rule.min_order_amount => *amount,
            RuleKind::Fixed { .. } | RuleKind::FirstPurchase | RuleKind::BulkOrder => Money::zero(),
        })
        .sum()
}

/// Clamps `discount` into `0..=70%` of `subtotal`.
pub fn cap_discount(discount: Money, subtotal: Money) -> Money {
    let max = Order::max_discount_for(subtotal);
    if discount.is_negative() {
        Money::zero()
    } else if discount > max {
        max
    } else {
        discount
    }
}

/// The discount calculator.
pub struct DiscountCalculator<R, C>
where
    R: RuleRepository,
    C: RuleCache,
{
    engine: RuleEngine<R, C>,
    holiday_season: Option<HolidaySeason>,
    seasonal: Box<dyn DiscountStrategy>,
    loyalty: Box<dyn DiscountStrategy>,
}

impl<R, C> DiscountCalculator<R, C>
where
    R: RuleRepository,
    C: RuleCache,
{
    /// Creates a calculator with no seasonal or loyalty component.
    pub fn new(engine: RuleEngine<R, C>) -> Self {
        Self {
            engine,
            holiday_season: None,
            seasonal: Box::new(NoDiscount),
            loyalty: Box::new(NoDiscount),
        }
    }

    /// Adds `strategy` to orders evaluated inside `season`.
    pub fn with_holiday_season(
        mut self,
        season: HolidaySeason,
        strategy: impl DiscountStrategy + 'static,
    ) -> Self {
        self.holiday_season = Some(season);
        self.seasonal = Box::new(strategy);
        self
    }

    /// Adds `strategy` to orders from premium customers.
    pub fn with_loyalty(mut self, strategy: impl DiscountStrategy + 'static) -> Self {
        self.loyalty = Box::new(strategy);
        self
    }

    pub fn engine(&self) -> &RuleEngine<R, C> {
        &self.engine
    }

    /// Computes every component of the discount for `order`.
    pub async fn breakdown(&self, order: &OrderSnapshot) -> DiscountBreakdown {
        let at = order.evaluated_at;
        let rules = self.engine.applicable_rules(order, at).await;

        let mut breakdown = DiscountBreakdown {
            rules: rule_discount(&rules, order),
            ..DiscountBreakdown::default()
        };

        if self.holiday_season.is_some_and(|season| season.contains(at)) {
            breakdown.seasonal = self.seasonal.compute(order);
        }

        if order.customer_tier == CustomerTier::Premium {
            breakdown.loyalty = self.loyalty.compute(order);
        }

        breakdown.applied = cap_discount(breakdown.uncapped(), order.subtotal);

        if breakdown.was_capped() {
            tracing::debug!(
                uncapped = %breakdown.uncapped(),
                applied = %breakdown.applied,
                "discount clamped to cap"
            );
        }

        breakdown
    }

    /// Returns the capped discount for `order`.
    pub async fn compute_discount(&self, order: &OrderSnapshot) -> Money {
        self.breakdown(order).await.applied
    }
}

#[async_trait]
impl<R, C> Discounting for DiscountCalculator<R, C>
where
    R: RuleRepository,
    C: RuleCache,
{
    async fn compute_discount(&self, order: &OrderSnapshot) -> Money {
        DiscountCalculator::compute_discount(self, order).await
    }
}
