//! Discount rule engine.
//!
//! This crate provides:
//! - `DiscountRule` and its applicability predicates
//! - A TTL cache for the active rule set, shared through `RuleCache`
//! - `RuleEngine`, which resolves applicable rules with cache-then-repository lookup
//! - `DiscountCalculator`, which stacks rule, seasonal and loyalty discounts
//!   and clamps the result to 70% of the pre-discount total

pub mod cache;
pub mod calculator;
pub mod engine;
pub mod error;
pub mod repository;
pub mod rule;
pub mod snapshot;
pub mod strategy;

pub use cache::{ACTIVE_RULES_KEY, ACTIVE_RULES_TTL, InMemoryRuleCache, RuleCache};
pub use calculator::{
    DiscountBreakdown, DiscountCalculator, Discounting, cap_discount, rule_discount,
};
pub use engine::RuleEngine;
pub use error::{InvalidHolidaySeason, RuleRepositoryError};
pub use repository::{InMemoryRuleRepository, RuleRepository};
pub use rule::{BULK_ORDER_MIN_QUANTITY, DiscountRule, Ineligibility, RuleKind};
pub use snapshot::OrderSnapshot;
pub use strategy::{DiscountStrategy, HolidaySeason, NoDiscount, PercentOff};
