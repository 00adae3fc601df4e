//! Resolves which discount rules apply to an order.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::cache::{ACTIVE_RULES_KEY, ACTIVE_RULES_TTL, RuleCache};
use crate::error::RuleRepositoryError;
use crate::repository::RuleRepository;
use crate::rule::DiscountRule;
use crate::snapshot::OrderSnapshot;

/// Rule lookup backed by a cache with repository fallback.
///
/// The cache is constructed by the caller and injected here so that one
/// cache can be shared by every engine in the process.
pub struct RuleEngine<R, C>
where
    R: RuleRepository,
    C: RuleCache,
{
    repository: R,
    cache: C,
    fetch_timeout: Option<Duration>,
}

impl<R, C> RuleEngine<R, C>
where
    R: RuleRepository,
    C: RuleCache,
{
    /// Creates a rule engine over `repository`, caching in `cache`.
    pub fn new(repository: R, cache: C) -> Self {
        Self {
            repository,
            cache,
            fetch_timeout: None,
        }
    }

    /// Bounds every repository fetch. An elapsed fetch counts as a failed one.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Returns the rules that apply to `order` at `at`, in source order.
    ///
    /// Never fails: if the rule set is not cached and the repository cannot
    /// deliver it, no rules apply to this call.
    #[tracing::instrument(skip(self, order), fields(customer_id = %order.customer_id))]
    pub async fn applicable_rules(
        &self,
        order: &OrderSnapshot,
        at: DateTime<Utc>,
    ) -> Vec<DiscountRule> {
        let rules = self.active_rules(at).await;

        rules
            .iter()
            .filter(|rule| match rule.check(order, at) {
                Ok(()) => true,
                Err(reason) => {
                    tracing::trace!(rule = %rule.name, ?reason, "rule excluded");
                    false
                }
            })
            .cloned()
            .collect()
    }

    async fn active_rules(&self, at: DateTime<Utc>) -> Arc<[DiscountRule]> {
        if let Some(rules) = self.cache.get(ACTIVE_RULES_KEY).await {
            metrics::counter!("rule_cache_hits_total").increment(1);
            tracing::debug!(count = rules.len(), "active rules served from cache");
            return rules;
        }

        metrics::counter!("rule_cache_misses_total").increment(1);

        match self.fetch(at).await {
            Ok(rules) => {
                let rules: Arc<[DiscountRule]> = rules.into();
                self.cache
                    .set(ACTIVE_RULES_KEY, rules.clone(), ACTIVE_RULES_TTL)
                    .await;
                tracing::debug!(count = rules.len(), "active rules refreshed from repository");
                rules
            }
            Err(e) => {
                metrics::counter!("rule_repository_failures_total").increment(1);
                tracing::warn!(error = %e, "rule repository unavailable, evaluating without rules");
                Arc::from(Vec::new())
            }
        }
    }

    async fn fetch(&self, at: DateTime<Utc>) -> Result<Vec<DiscountRule>, RuleRepositoryError> {
        match self.fetch_timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.repository.get_active_rules(at))
                .await
                .map_err(|_| RuleRepositoryError::Timeout(timeout))?,
            None => self.repository.get_active_rules(at).await,
        }
    }
}
