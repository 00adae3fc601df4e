//! Lifecycle configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use discount::{
    DiscountCalculator, HolidaySeason, PercentOff, RuleCache, RuleEngine, RuleRepository,
};

/// How `update_status` treats the requested status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionPolicy {
    /// Only moves allowed by the transition table are accepted.
    #[default]
    Enforced,

    /// Any recognized status is written as-is.
    MembershipOnly,
}

impl FromStr for TransitionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "enforced" => Ok(TransitionPolicy::Enforced),
            "membership" | "membership_only" => Ok(TransitionPolicy::MembershipOnly),
            other => Err(format!("unknown transition policy {other:?}")),
        }
    }
}

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format {other:?}")),
        }
    }
}

/// Lifecycle configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `DEPENDENCY_TIMEOUT_MS`: bound on every collaborator call (default: `2000`)
/// - `STATUS_TRANSITIONS`: `enforced` or `membership` (default: `enforced`)
/// - `HOLIDAY_SEASON`: `MM-DD..MM-DD` window for the seasonal discount (default: none)
/// - `SEASONAL_DISCOUNT_PERCENT`: seasonal discount in percent (default: `0`)
/// - `LOYALTY_DISCOUNT_PERCENT`: premium-tier discount in percent (default: `0`)
/// - `LOG_FORMAT`: `pretty` or `json` (default: `pretty`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
///
/// Unparseable values fall back to their defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleConfig {
    pub dependency_timeout: Duration,
    pub transition_policy: TransitionPolicy,
    pub holiday_season: Option<HolidaySeason>,
    pub seasonal_discount_percent: f64,
    pub loyalty_discount_percent: f64,
    pub log_format: LogFormat,
    pub log_level: String,
}

impl LifecycleConfig {
    pub const DEFAULT_DEPENDENCY_TIMEOUT: Duration = Duration::from_millis(2000);

    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from `lookup`, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            dependency_timeout: parse_var(&lookup, "DEPENDENCY_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.dependency_timeout),
            transition_policy: parse_var(&lookup, "STATUS_TRANSITIONS")
                .unwrap_or(defaults.transition_policy),
            holiday_season: parse_var(&lookup, "HOLIDAY_SEASON"),
            seasonal_discount_percent: parse_var(&lookup, "SEASONAL_DISCOUNT_PERCENT")
                .unwrap_or(defaults.seasonal_discount_percent),
            loyalty_discount_percent: parse_var(&lookup, "LOYALTY_DISCOUNT_PERCENT")
                .unwrap_or(defaults.loyalty_discount_percent),
            log_format: parse_var(&lookup, "LOG_FORMAT").unwrap_or(defaults.log_format),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
        }
    }

    /// Builds a rule engine whose repository fetches share the dependency timeout.
    pub fn rule_engine<R, C>(&self, repository: R, cache: C) -> RuleEngine<R, C>
    where
        R: RuleRepository,
        C: RuleCache,
    {
        RuleEngine::new(repository, cache).with_fetch_timeout(self.dependency_timeout)
    }

    /// Wraps `engine` in a calculator carrying the configured season and strategies.
    pub fn build_calculator<R, C>(&self, engine: RuleEngine<R, C>) -> DiscountCalculator<R, C>
    where
        R: RuleRepository,
        C: RuleCache,
    {
        let mut calculator = DiscountCalculator::new(engine);

        if let Some(season) = self.holiday_season {
            calculator = calculator
                .with_holiday_season(season, PercentOff::new(self.seasonal_discount_percent));
        }

        if self.loyalty_discount_percent > 0.0 {
            calculator = calculator.with_loyalty(PercentOff::new(self.loyalty_discount_percent));
        }

        calculator
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|value| value.trim().parse().ok())
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            dependency_timeout: Self::DEFAULT_DEPENDENCY_TIMEOUT,
            transition_policy: TransitionPolicy::Enforced,
            holiday_season: None,
            seasonal_discount_percent: 0.0,
            loyalty_discount_percent: 0.0,
            log_format: LogFormat::Pretty,
            log_level: "info".to_string(),
        }
    }
}
