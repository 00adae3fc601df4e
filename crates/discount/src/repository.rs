//! Rule repository trait and in-memory implementation.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::RuleRepositoryError;
use crate::rule::DiscountRule;

/// Authoritative source of discount rules.
#[async_trait]
pub trait RuleRepository: Send + Sync {
    /// Returns every rule that has not expired as of `at`, in source order.
    ///
    /// Rules that only start later are included; applicability is decided by
    /// the rule engine at evaluation time.
    async fn get_active_rules(
        &self,
        at: DateTime<Utc>,
    ) -> Result<Vec<DiscountRule>, RuleRepositoryError>;
}

#[derive(Debug, Default)]
struct InMemoryRuleState {
    rules: Vec<DiscountRule>,
    delay: Option<Duration>,
}

/// In-memory rule repository for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRuleRepository {
    state: Arc<RwLock<InMemoryRuleState>>,
    fail: Arc<AtomicBool>,
    fetches: Arc<AtomicUsize>,
}

impl InMemoryRuleRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository holding `rules`.
    pub fn with_rules(rules: Vec<DiscountRule>) -> Self {
        let repository = Self::new();
        repository.replace_rules(rules);
        repository
    }

    /// Replaces the stored rule set.
    pub fn replace_rules(&self, rules: Vec<DiscountRule>) {
        self.state.write().unwrap().rules = rules;
    }

    /// Configures every fetch to fail.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Delays every fetch by `delay` (on the tokio clock).
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.state.write().unwrap().delay = delay;
    }

    /// Number of fetches served or refused so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RuleRepository for InMemoryRuleRepository {
    async fn get_active_rules(
        &self,
        at: DateTime<Utc>,
    ) -> Result<Vec<DiscountRule>, RuleRepositoryError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let delay = self.state.read().unwrap().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail.load(Ordering::SeqCst) {
            return Err(RuleRepositoryError::Unavailable(
                "rule store offline".to_string(),
            ));
        }

        let state = self.state.read().unwrap();
        Ok(state
            .rules
            .iter()
            .filter(|rule| rule.valid_until >= at)
            .cloned()
            .collect())
    }
}
