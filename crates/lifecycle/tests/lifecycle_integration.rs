//! Integration tests for the order lifecycle.

use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use common::{CustomerId, OrderId};
use discount::{
    DiscountCalculator, DiscountRule, InMemoryRuleCache, InMemoryRuleRepository, RuleEngine,
};
use domain::{CreateOrder, CustomerTier, Money, Order, OrderItem, OrderStatus, PaymentStatus};
use futures_util::future::join_all;
use lifecycle::{
    Collaborator, InMemoryEventPublisher, InMemoryPaymentService, InMemoryShippingService,
    LifecycleConfig, LifecycleError, OrderLifecycle,
};
use store::{InMemoryOrderRepository, OrderRepository};

type TestLifecycle = OrderLifecycle<
    InMemoryOrderRepository,
    DiscountCalculator<InMemoryRuleRepository, InMemoryRuleCache>,
    InMemoryPaymentService,
    InMemoryShippingService,
    InMemoryEventPublisher,
>;

struct TestHarness {
    lifecycle: TestLifecycle,
    orders: InMemoryOrderRepository,
    rules: InMemoryRuleRepository,
    payment: InMemoryPaymentService,
    shipping: InMemoryShippingService,
    events: InMemoryEventPublisher,
}

impl TestHarness {
    fn new() -> Self {
        Self::with_config(LifecycleConfig::default())
    }

    fn with_config(config: LifecycleConfig) -> Self {
        let orders = InMemoryOrderRepository::new();
        let rules = InMemoryRuleRepository::new();
        let payment = InMemoryPaymentService::new();
        let shipping = InMemoryShippingService::new();
        let events = InMemoryEventPublisher::new();

        let calculator =
            config.build_calculator(config.rule_engine(rules.clone(), InMemoryRuleCache::new()));
        let lifecycle = OrderLifecycle::new(
            orders.clone(),
            calculator,
            payment.clone(),
            shipping.clone(),
            events.clone(),
        )
        .with_config(config);

        Self {
            lifecycle,
            orders,
            rules,
            payment,
            shipping,
            events,
        }
    }

    fn with_rules(self, rules: Vec<DiscountRule>) -> Self {
        self.rules.replace_rules(rules);
        self
    }

    async fn create(&self, items: Vec<OrderItem>) -> Order {
        self.lifecycle
            .create_order(CreateOrder::new(CustomerId::new(), items, "1 Main St"))
            .await
            .unwrap()
    }

    async fn create_hundred_dollar_order(&self) -> OrderId {
        self.create(vec![OrderItem::new("SKU-001", 1, Money::from_dollars(100))])
            .await
            .id()
            .unwrap()
    }

    async fn stored(&self, order_id: OrderId) -> Order {
        self.orders.get_by_id(order_id).await.unwrap().unwrap()
    }
}

fn active_percentage(name: &str, percent: f64) -> DiscountRule {
    let now = Utc::now();
    DiscountRule::percentage(name, percent, now - ChronoDuration::minutes(1), now + ChronoDuration::hours(1))
}

#[tokio::test]
async fn test_twenty_percent_rule() {
    let h = TestHarness::new().with_rules(vec![active_percentage("twenty", 20.0)]);

    let order = h
        .create(vec![OrderItem::new("SKU-001", 1, Money::from_dollars(100))])
        .await;

    assert_eq!(order.discount(), Money::from_dollars(20));
    assert_eq!(order.total(), Money::from_dollars(80));
}

#[tokio::test]
async fn test_stacked_rules_clamp_to_seventy_percent() {
    let h = TestHarness::new().with_rules(vec![
        active_percentage("a", 40.0),
        active_percentage("b", 40.0),
        active_percentage("c", 40.0),
    ]);

    let order = h
        .create(vec![OrderItem::new("SKU-001", 1, Money::from_dollars(100))])
        .await;

    assert_eq!(order.discount(), Money::from_dollars(70));
    assert_eq!(order.total(), Money::from_dollars(30));
}

#[tokio::test]
async fn test_totals_hold_for_many_item_lists() {
    let h = TestHarness::new().with_rules(vec![
        active_percentage("a", 33.0),
        active_percentage("b", 21.5),
        DiscountRule::fixed(
            "flat",
            Money::from_cents(1234),
            Utc::now() - ChronoDuration::minutes(1),
            Utc::now() + ChronoDuration::hours(1),
        ),
    ]);

    for lines in 1..=6u32 {
        for seed in 0..5u32 {
            let items: Vec<_> = (0..lines)
                .map(|i| {
                    let price = i64::from((seed * 7919 + i * 104_729) % 50_000);
                    OrderItem::new(format!("SKU-{i}"), 1 + (seed + i) % 4, Money::from_cents(price))
                })
                .collect();
            let expected_subtotal: Money = items
                .iter()
                .map(|item| item.unit_price.multiply(item.quantity))
                .sum();

            let order = h.create(items).await;

            assert_eq!(order.subtotal(), expected_subtotal);
            assert_eq!(order.total(), expected_subtotal - order.discount());
            assert!(order.discount() <= expected_subtotal.ratio(7, 10));
            assert!(!order.discount().is_negative());
        }
    }
}

#[tokio::test]
async fn test_create_ignores_client_subtotals() {
    let h = TestHarness::new();
    let mut item = OrderItem::new("SKU-001", 3, Money::from_cents(999));
    item.subtotal = Money::from_cents(1);

    let order = h.create(vec![item]).await;

    assert_eq!(order.items()[0].subtotal, Money::from_cents(2997));
    assert_eq!(order.total(), Money::from_cents(2997));
}

#[tokio::test]
async fn test_empty_order_fails_without_persistence() {
    let h = TestHarness::new();

    let err = h
        .lifecycle
        .create_order(CreateOrder::new(CustomerId::new(), vec![], "1 Main St"))
        .await
        .unwrap_err();

    assert!(matches!(err, LifecycleError::EmptyOrder));
    assert!(!err.is_retryable());
    assert_eq!(h.orders.write_count(), 0);
    assert_eq!(h.rules.fetch_count(), 0);
}

#[tokio::test]
async fn test_rule_outage_creates_order_without_discount() {
    let h = TestHarness::new().with_rules(vec![active_percentage("twenty", 20.0)]);
    h.rules.set_fail(true);

    let order = h
        .create(vec![OrderItem::new("SKU-001", 1, Money::from_dollars(100))])
        .await;

    assert_eq!(order.discount(), Money::zero());
    assert_eq!(order.total(), Money::from_dollars(100));
}

#[tokio::test]
async fn test_second_order_within_ttl_uses_cached_rules() {
    let h = TestHarness::new().with_rules(vec![active_percentage("twenty", 20.0)]);

    h.create_hundred_dollar_order().await;
    h.create_hundred_dollar_order().await;

    assert_eq!(h.rules.fetch_count(), 1);
}

#[tokio::test]
async fn test_get_order_distinguishes_absence_from_failure() {
    let h = TestHarness::new();
    let order_id = h.create_hundred_dollar_order().await;

    assert!(h.lifecycle.get_order(order_id).await.unwrap().is_some());
    assert!(h.lifecycle.get_order(OrderId::new()).await.unwrap().is_none());

    h.orders.set_fail_reads(true);
    let err = h.lifecycle.get_order(order_id).await.unwrap_err();
    assert_eq!(err.collaborator(), Some(Collaborator::OrderRepository));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_cancel_pending_order_skips_compensations() {
    let h = TestHarness::new();
    let order_id = h.create_hundred_dollar_order().await;

    let order = h.lifecycle.cancel_order(order_id).await.unwrap();

    assert_eq!(order.status(), OrderStatus::Cancelled);
    assert_eq!(h.payment.refund_count(), 0);
    assert_eq!(h.shipping.cancel_calls(), 0);
    assert_eq!(h.stored(order_id).await.status(), OrderStatus::Cancelled);
    assert_eq!(h.events.published_count(), 1);
}

#[tokio::test]
async fn test_cancel_shipped_order_runs_both_compensations() {
    let h = TestHarness::new();
    let order_id = h.create_hundred_dollar_order().await;
    h.lifecycle.mark_paid(order_id).await.unwrap();
    h.lifecycle.mark_shipped(order_id, "TRACK-0001").await.unwrap();
    let mut receiver = h.events.subscribe();

    let order = h.lifecycle.cancel_order(order_id).await.unwrap();

    assert_eq!(order.payment_status(), PaymentStatus::Refunded);
    assert_eq!(h.payment.refunds_for(order_id)[0].amount, Money::from_dollars(100));
    assert!(h.shipping.is_cancelled("TRACK-0001"));

    let event = receiver.recv().await.unwrap();
    assert_eq!(event.order_id, order_id);
    assert!(event.refunded);
}

#[tokio::test]
async fn test_cancel_delivered_order_is_terminal() {
    let h = TestHarness::new();
    let order_id = h.create_hundred_dollar_order().await;
    h.lifecycle.mark_paid(order_id).await.unwrap();
    h.lifecycle.mark_shipped(order_id, "TRACK-0001").await.unwrap();
    h.lifecycle.mark_delivered(order_id).await.unwrap();
    let before = h.stored(order_id).await;

    let err = h.lifecycle.cancel_order(order_id).await.unwrap_err();

    assert!(matches!(
        err,
        LifecycleError::TerminalState {
            status: OrderStatus::Delivered
        }
    ));
    assert_eq!(h.stored(order_id).await, before);
    assert_eq!(h.payment.refund_count(), 0);
    assert_eq!(h.shipping.cancel_calls(), 0);
}

#[tokio::test]
async fn test_cancel_twice_is_terminal() {
    let h = TestHarness::new();
    let order_id = h.create_hundred_dollar_order().await;
    h.lifecycle.cancel_order(order_id).await.unwrap();

    let err = h.lifecycle.cancel_order(order_id).await.unwrap_err();
    assert!(matches!(
        err,
        LifecycleError::TerminalState {
            status: OrderStatus::Cancelled
        }
    ));
    assert_eq!(h.events.published_count(), 1);
}

#[tokio::test]
async fn test_refund_failure_stops_cancellation() {
    let h = TestHarness::new();
    let order_id = h.create_hundred_dollar_order().await;
    h.lifecycle.mark_paid(order_id).await.unwrap();
    h.lifecycle.mark_shipped(order_id, "TRACK-0001").await.unwrap();
    let before = h.stored(order_id).await;
    h.payment.set_fail_on_refund(true);

    let err = h.lifecycle.cancel_order(order_id).await.unwrap_err();

    assert!(matches!(
        err,
        LifecycleError::Dependency {
            collaborator: Collaborator::PaymentService,
            ..
        }
    ));
    assert_eq!(h.shipping.cancel_calls(), 0);
    assert_eq!(h.stored(order_id).await, before);
    assert_eq!(h.events.published_count(), 0);
}

#[tokio::test]
async fn test_shipping_failure_stops_cancellation() {
    let h = TestHarness::new();
    let order_id = h.create_hundred_dollar_order().await;
    h.lifecycle.mark_paid(order_id).await.unwrap();
    h.lifecycle.mark_shipped(order_id, "TRACK-0001").await.unwrap();
    let before = h.stored(order_id).await;
    h.shipping.set_fail_on_cancel(true);

    let err = h.lifecycle.cancel_order(order_id).await.unwrap_err();

    assert_eq!(err.collaborator(), Some(Collaborator::ShippingService));
    assert_eq!(h.stored(order_id).await, before);
    assert_eq!(h.events.published_count(), 0);
}

#[tokio::test]
async fn test_publish_failure_keeps_cancellation() {
    let h = TestHarness::new();
    let order_id = h.create_hundred_dollar_order().await;
    h.events.set_fail(true);

    let err = h.lifecycle.cancel_order(order_id).await.unwrap_err();

    assert_eq!(err.collaborator(), Some(Collaborator::EventPublisher));
    assert_eq!(h.stored(order_id).await.status(), OrderStatus::Cancelled);
}

#[tokio::test]
async fn test_cancel_unknown_order() {
    let h = TestHarness::new();
    let missing = OrderId::new();

    let err = h.lifecycle.cancel_order(missing).await.unwrap_err();
    assert!(matches!(err, LifecycleError::NotFound(id) if id == missing));
}

#[tokio::test(start_paused = true)]
async fn test_slow_payment_times_out_without_state_change() {
    let h = TestHarness::with_config(LifecycleConfig {
        dependency_timeout: Duration::from_millis(500),
        ..LifecycleConfig::default()
    });
    let order_id = h.create_hundred_dollar_order().await;
    h.lifecycle.mark_paid(order_id).await.unwrap();
    h.payment.set_delay(Some(Duration::from_secs(5)));

    let err = h.lifecycle.cancel_order(order_id).await.unwrap_err();

    assert!(matches!(
        err,
        LifecycleError::Timeout {
            collaborator: Collaborator::PaymentService,
            ..
        }
    ));
    assert!(err.is_retryable());
    assert_eq!(h.stored(order_id).await.status(), OrderStatus::Paid);
    assert_eq!(h.shipping.cancel_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_cancellations_commit_once() {
    let h = TestHarness::new();
    let order_id = h.create_hundred_dollar_order().await;
    h.lifecycle.mark_paid(order_id).await.unwrap();
    // Every cancellation loads the order before the first refund returns.
    h.payment.set_delay(Some(Duration::from_millis(100)));

    let results = join_all((0..8).map(|_| h.lifecycle.cancel_order(order_id))).await;

    let committed = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(LifecycleError::Conflict { .. })))
        .count();
    assert_eq!(committed, 1);
    assert_eq!(conflicts, 7);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(LifecycleError::is_retryable)
    );
    assert_eq!(h.payment.refund_count(), 8);
    assert_eq!(h.events.published_count(), 1);

    let stored = h.stored(order_id).await;
    assert_eq!(stored.status(), OrderStatus::Cancelled);
    assert_eq!(stored.payment_status(), PaymentStatus::Refunded);
}

#[tokio::test]
async fn test_shipping_requires_tracking_before_cancel_compensates() {
    let h = TestHarness::new();
    let order_id = h.create_hundred_dollar_order().await;
    h.lifecycle.update_status(order_id, "paid").await.unwrap();

    let err = h
        .lifecycle
        .update_status(order_id, "shipped")
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::MissingTrackingReference));
    assert_eq!(h.stored(order_id).await.status(), OrderStatus::Paid);

    h.lifecycle.mark_shipped(order_id, "TRACK-55").await.unwrap();
    let cancelled = h.lifecycle.cancel_order(order_id).await.unwrap();

    assert_eq!(cancelled.status(), OrderStatus::Cancelled);
    assert_eq!(h.shipping.cancel_calls(), 1);
    assert!(h.shipping.is_cancelled("TRACK-55"));
}

#[tokio::test]
async fn test_premium_loyalty_discount_from_config() {
    let h = TestHarness::with_config(LifecycleConfig {
        loyalty_discount_percent: 5.0,
        ..LifecycleConfig::default()
    })
    .with_rules(vec![active_percentage("twenty", 20.0)]);

    let order = h
        .lifecycle
        .create_order(
            CreateOrder::new(
                CustomerId::new(),
                vec![OrderItem::new("SKU-001", 1, Money::from_dollars(100))],
                "1 Main St",
            )
            .with_tier(CustomerTier::Premium),
        )
        .await
        .unwrap();

    assert_eq!(order.discount(), Money::from_dollars(25));
}

#[tokio::test]
async fn test_update_status_cancelled_runs_cancellation() {
    let h = TestHarness::new();
    let order_id = h.create_hundred_dollar_order().await;
    h.lifecycle.mark_paid(order_id).await.unwrap();

    let order = h.lifecycle.update_status(order_id, "cancelled").await.unwrap();

    assert_eq!(order.status(), OrderStatus::Cancelled);
    assert_eq!(h.payment.refund_count(), 1);
    assert_eq!(h.events.published_count(), 1);
}
