// Tests covering delayed, cancellable async event rules.
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use arbiter::{AsyncRule, AsyncRuleRegistry};
use arbiter_rules::{AsyncEffect, NO_MATCHING_HANDLER};
use futures::future::join_all;
use mockall::mock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct Territory {
    influence: AtomicI64,
}

mock! {
    pub Effect {}

    #[async_trait::async_trait]
    impl AsyncEffect<Territory> for Effect {
        async fn apply(&self, context: &Territory);
    }
}

fn registry() -> AsyncRuleRegistry<Territory> {
    let registry = AsyncRuleRegistry::new();
    registry.register(
        AsyncRule::new("negotiation", "meeting", "Deal struck")
            .with_guard(|territory: &Territory| territory.influence.load(Ordering::SeqCst) >= 10)
            .with_effect(|territory: &Territory| {
                territory.influence.fetch_add(5, Ordering::SeqCst);
            }),
    );
    registry
}

#[tokio::test(start_paused = true)]
async fn no_matching_guard_returns_fallback_immediately() {
    let registry = registry();
    let territory = Territory::default();
    let started = Instant::now();

    let outcome = registry
        .process_event("meeting", &territory, Duration::from_secs(3_600), &CancellationToken::new())
        .await
        .expect("fallback");

    assert_eq!(outcome, NO_MATCHING_HANDLER);
    assert_eq!(started.elapsed(), Duration::ZERO);
    assert_eq!(territory.influence.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn matching_rule_applies_effect_after_delay() {
    let registry = registry();
    let territory = Territory::default();
    territory.influence.store(12, Ordering::SeqCst);
    let started = Instant::now();

    let outcome = registry
        .process_event("meeting", &territory, Duration::from_millis(1_500), &CancellationToken::new())
        .await
        .expect("resolved");

    assert_eq!(outcome, "Deal struck");
    assert_eq!(territory.influence.load(Ordering::SeqCst), 17);
    assert!(started.elapsed() >= Duration::from_millis(1_500));
}

#[tokio::test(start_paused = true)]
async fn custom_async_effect_runs_once() {
    let mut effect = MockEffect::new();
    effect.expect_apply().times(1).returning(|_| ());

    let registry = AsyncRuleRegistry::new();
    registry.register(
        AsyncRule::new("ambush", "patrol", "Patrol ambushed")
            .with_delay(Duration::from_secs(2))
            .with_async_effect(effect),
    );

    let outcome = registry
        .dispatch("patrol", &Territory::default(), &CancellationToken::new())
        .await
        .expect("resolved");
    assert_eq!(outcome, "Patrol ambushed");
}

#[tokio::test(start_paused = true)]
async fn cancellation_reaches_every_pending_call() {
    let registry = registry();
    let territory = Territory::default();
    territory.influence.store(50, Ordering::SeqCst);
    let token = CancellationToken::new();

    let calls = (0..3).map(|_| {
        registry.process_event("meeting", &territory, Duration::from_secs(30), &token)
    });
    let canceller = async {
        tokio::time::sleep(Duration::from_secs(1)).await;
        token.cancel();
    };

    let (outcomes, _) = tokio::join!(join_all(calls), canceller);
    assert!(outcomes
        .iter()
        .all(|outcome| matches!(outcome, Err(error) if error.is_cancelled())));
    assert_eq!(territory.influence.load(Ordering::SeqCst), 50);
}

#[test]
fn ids_are_listed_in_registration_order() {
    let registry = registry();
    registry.register(AsyncRule::new("raid", "night", "Warehouse raided"));
    assert_eq!(registry.async_rule_ids(), vec!["negotiation", "raid"]);
}
