//! Value objects for the order domain.

use serde::{Deserialize, Serialize};

use super::OrderError;

/// Product identifier (SKU).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Creates a new product ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the product ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ProductId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProductId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Money amount represented in cents to avoid floating point drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money {
    cents: i64,
}

impl Money {
    /// Creates a new Money amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Creates a new Money amount from whole currency units.
    pub fn from_dollars(dollars: i64) -> Self {
        Self {
            cents: dollars.saturating_mul(100),
        }
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns the whole-unit portion.
    pub fn dollars(&self) -> i64 {
        self.cents / 100
    }

    /// Returns the cents portion (remainder after dollars).
    pub fn cents_part(&self) -> i64 {
        self.cents.abs() % 100
    }

    pub fn is_zero(&self) -> bool {
        self.cents == 0
    }

    pub fn is_negative(&self) -> bool {
        self.cents < 0
    }

    /// Multiplies by a quantity, saturating at the representable bounds.
    pub fn multiply(&self, quantity: u32) -> Money {
        Money {
            cents: self.cents.saturating_mul(i64::from(quantity)),
        }
    }

    /// Multiplies by a quantity, or `None` on overflow.
    pub fn checked_multiply(&self, quantity: u32) -> Option<Money> {
        self.cents
            .checked_mul(i64::from(quantity))
            .map(Money::from_cents)
    }

    /// Adds `other`, or `None` on overflow.
    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.cents.checked_add(other.cents).map(Money::from_cents)
    }

    /// Returns `percent`% of this amount, rounded half away from zero to the cent.
    pub fn percent(&self, percent: f64) -> Money {
        Money {
            cents: (self.cents as f64 * percent / 100.0).round() as i64,
        }
    }

    /// Returns `numerator / denominator` of this amount, truncated toward zero.
    ///
    /// Exact integer arithmetic; used for hard caps where float rounding
    /// must never push a value past the limit.
    pub fn ratio(&self, numerator: i64, denominator: i64) -> Money {
        Money {
            cents: (i128::from(self.cents) * i128::from(numerator) / i128::from(denominator))
                as i64,
        }
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.cents < 0 {
            write!(f, "-${}.{:02}", self.dollars().abs(), self.cents_part())
        } else {
            write!(f, "${}.{:02}", self.dollars(), self.cents_part())
        }
    }
}

/// Saturates at the representable bounds. Order amounts that must be exact
/// use [`Money::checked_add`].
impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents.saturating_add(rhs.cents),
        }
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents.saturating_sub(rhs.cents),
        }
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.cents = self.cents.saturating_add(rhs.cents);
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

/// Customer segment used for discount eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerTier {
    #[default]
    Regular,
    Premium,
    Business,
}

impl CustomerTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerTier::Regular => "regular",
            CustomerTier::Premium => "premium",
            CustomerTier::Business => "business",
        }
    }
}

impl std::fmt::Display for CustomerTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One product line of an order.
///
/// `subtotal` is derived. Anything deserialized from a client is recomputed
/// with [`OrderItem::recompute_subtotal`] before it reaches an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// The product identifier.
    pub product_id: ProductId,

    /// Catalog category, matched against category-restricted discount rules.
    #[serde(default)]
    pub category: Option<String>,

    /// Quantity ordered, at least 1.
    pub quantity: u32,

    /// Price per unit, never negative.
    pub unit_price: Money,

    /// quantity x unit_price.
    #[serde(default)]
    pub subtotal: Money,
}

impl OrderItem {
    /// Creates a new order item with its subtotal computed.
    pub fn new(product_id: impl Into<ProductId>, quantity: u32, unit_price: Money) -> Self {
        Self {
            product_id: product_id.into(),
            category: None,
            quantity,
            unit_price,
            subtotal: unit_price.multiply(quantity),
        }
    }

    /// Sets the item's catalog category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Recomputes the subtotal from quantity and unit price.
    pub fn recompute_subtotal(&mut self) -> Result<(), OrderError> {
        self.subtotal = self
            .unit_price
            .checked_multiply(self.quantity)
            .ok_or_else(|| OrderError::AmountOverflow {
                product_id: self.product_id.to_string(),
            })?;
        Ok(())
    }
}
