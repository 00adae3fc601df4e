//! Pluggable discount components layered on top of rule discounts.

use std::str::FromStr;

use chrono::{DateTime, Datelike, Utc};
use domain::Money;

use crate::error::InvalidHolidaySeason;
use crate::snapshot::OrderSnapshot;

/// Computes one discount component for an order.
///
/// New discount types plug in here without touching the calculator's loop.
pub trait DiscountStrategy: Send + Sync {
    fn compute(&self, order: &OrderSnapshot) -> Money;
}

/// Contributes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDiscount;

impl DiscountStrategy for NoDiscount {
    fn compute(&self, _order: &OrderSnapshot) -> Money {
        Money::zero()
    }
}

/// A percentage of the pre-discount total.
#[derive(Debug, Clone, Copy)]
pub struct PercentOff {
    percent: f64,
}

impl PercentOff {
    pub fn new(percent: f64) -> Self {
        Self { percent }
    }
}

impl DiscountStrategy for PercentOff {
    fn compute(&self, order: &OrderSnapshot) -> Money {
        order.subtotal.percent(self.percent)
    }
}

/// A recurring month/day window, inclusive at both ends.
///
/// A window whose start falls after its end wraps the year boundary, so
/// `12-15..01-05` covers the second half of December and the first days
/// of January.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HolidaySeason {
    start: (u32, u32),
    end: (u32, u32),
}

impl HolidaySeason {
    /// Creates a season from `(month, day)` pairs.
    pub fn new(start: (u32, u32), end: (u32, u32)) -> Result<Self, InvalidHolidaySeason> {
        for (month, day) in [start, end] {
            if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
                return Err(InvalidHolidaySeason {
                    value: format!("{month:02}-{day:02}"),
                });
            }
        }
        Ok(Self { start, end })
    }

    /// Returns true if `at` (in UTC) falls inside the season.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let today = (at.month(), at.day());
        if self.start <= self.end {
            self.start <= today && today <= self.end
        } else {
            today >= self.start || today <= self.end
        }
    }
}

impl FromStr for HolidaySeason {
    type Err = InvalidHolidaySeason;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidHolidaySeason {
            value: s.to_string(),
        };
        let parse_day = |part: &str| -> Option<(u32, u32)> {
            let (month, day) = part.trim().split_once('-')?;
            Some((month.parse().ok()?, day.parse().ok()?))
        };

        let (start, end) = s.split_once("..").ok_or_else(invalid)?;
        let start = parse_day(start).ok_or_else(invalid)?;
        let end = parse_day(end).ok_or_else(invalid)?;
        Self::new(start, end).map_err(|_| invalid())
    }
}
