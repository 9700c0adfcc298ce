//! Visit ledger, reward cycle and claim state machine against the in-memory store

mod common;

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use common::{business, Harness};
use loyalty_core::domain::{ClaimStatus, ClaimToken, RewardOutcome};
use loyalty_core::error::DomainError;
use loyalty_core::services::{ClaimTokenGenerator, IdentityResolver};

#[tokio::test]
async fn test_n_visits_produce_count_n() {
    let harness = Harness::new(5);
    let customer = harness.customer(Some("081200000001"), None).await;
    let business = harness.business_key();

    for expected in 1..=7 {
        let record = harness.ledger.record_visit(&customer.key, &business).await.unwrap();
        assert_eq!(record.new_count(), expected);
        assert_eq!(record.cycle_reached, expected == 5);
    }

    assert_eq!(harness.store.visit_event_count(&business, &customer.key), 7);
    let progress = harness.customers.progress(&customer.key, &business).await.unwrap();
    assert_eq!(progress.visit_count, 7);
    assert_eq!(progress.visits_in_cycle, 2);
    assert_eq!(progress.completed_cycles, 1);

    let history = harness.ledger.history(&customer.key, &business, 3).await.unwrap();
    let counts: Vec<i64> = history.iter().map(|e| e.resulting_count).collect();
    assert_eq!(counts, vec![7, 6, 5]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_visits_are_never_lost() {
    let harness = Harness::new(10);
    let customer = harness.customer(Some("081200000002"), None).await;

    let tasks: Vec<_> = (0..50)
        .map(|_| {
            let engine = harness.engine.clone();
            let customer = customer.key.clone();
            let business = harness.business_key();
            tokio::spawn(async move { engine.evaluate_and_issue(&customer, &business).await })
        })
        .collect();

    let mut counts = BTreeSet::new();
    let mut rewards = 0;
    for result in futures::future::join_all(tasks).await {
        let evaluation = result.unwrap().unwrap();
        counts.insert(evaluation.visit.new_count());
        if matches!(evaluation.outcome, RewardOutcome::RewardIssued(_)) {
            rewards += 1;
        }
    }

    assert_eq!(counts, (1..=50).collect::<BTreeSet<i64>>());
    assert_eq!(rewards, 5);
    let claims = harness.issuer.claims_for_customer(&customer.key, &harness.business_key()).await.unwrap();
    assert_eq!(claims.len(), 5);
}

#[tokio::test]
async fn test_zero_goal_is_configuration_error_without_writes() {
    let harness = Harness::new(5);
    let customer = harness.customer(None, Some("rani@example.com")).await;
    harness.store.seed_business(business(0, "Free es teh", vec![]));

    let result = harness.engine.evaluate_and_issue(&customer.key, &harness.business_key()).await;
    assert!(matches!(result, Err(DomainError::ConfigurationError(_))));
    assert_eq!(harness.store.visit_event_count(&harness.business_key(), &customer.key), 0);
}

#[tokio::test]
async fn test_unknown_customer_and_business() {
    let harness = Harness::new(5);
    let customer = harness.customer(Some("081200000003"), None).await;

    let missing_customer = harness
        .engine
        .evaluate_and_issue(&"not-registered".into(), &harness.business_key())
        .await;
    assert!(matches!(missing_customer, Err(DomainError::CustomerNotFound(_))));

    let missing_business = harness.engine.evaluate_and_issue(&customer.key, &"elsewhere".into()).await;
    assert!(matches!(missing_business, Err(DomainError::BusinessNotFound(_))));
}

#[tokio::test]
async fn test_issuing_twice_for_a_cycle_yields_one_token() {
    let harness = Harness::new(5);
    let customer = harness.customer(Some("081200000004"), None).await;
    let business = harness.business_key();

    let first = harness.issuer.issue(&customer.key, &business, 1, "Free es teh").await.unwrap();
    let second = harness.issuer.issue(&customer.key, &business, 1, "Something else").await.unwrap();

    assert_eq!(first.token, second.token);
    assert_eq!(second.reward_title, "Free es teh");
    assert_eq!(harness.issuer.claims_for_customer(&customer.key, &business).await.unwrap().len(), 1);

    let stored = harness.issuer.find_for_cycle(&customer.key, &business, 1).await.unwrap();
    assert_eq!(stored.map(|c| c.token), Some(first.token));
    assert!(harness.issuer.find_for_cycle(&customer.key, &business, 2).await.unwrap().is_none());
}

#[tokio::test]
async fn test_goal_five_reward_lifecycle() {
    let harness = Harness::new(5);
    let customer = harness.customer(Some("081200000005"), None).await;
    let business = harness.business_key();

    for _ in 0..4 {
        let evaluation = harness.engine.evaluate_and_issue(&customer.key, &business).await.unwrap();
        assert_eq!(evaluation.outcome, RewardOutcome::NoReward);
    }

    let evaluation = harness.engine.evaluate_and_issue(&customer.key, &business).await.unwrap();
    assert_eq!(evaluation.visit.new_count(), 5);
    let token = evaluation.outcome.token().cloned().expect("reward issued");
    assert!(token.is_well_formed(6));

    let pending = harness.issuer.lookup(token.as_str()).await.unwrap();
    assert_eq!(pending.status, ClaimStatus::Pending);
    assert_eq!(pending.cycle_number, 1);

    let claimed = harness.issuer.claim(token.as_str()).await.unwrap();
    assert_eq!(claimed.status, ClaimStatus::Claimed);
    let claimed_at = claimed.claimed_at.expect("claimed timestamp");

    assert_eq!(
        harness.issuer.claim(token.as_str()).await.unwrap_err(),
        DomainError::AlreadyClaimed { claimed_at }
    );

    // Claiming never resets the count.
    let progress = harness.customers.progress(&customer.key, &business).await.unwrap();
    assert_eq!(progress.visit_count, 5);
    assert_eq!(progress.remaining, 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_claims_succeed_exactly_once() {
    let harness = Harness::new(1);
    let customer = harness.customer(Some("081200000006"), None).await;
    let evaluation = harness.engine.evaluate_and_issue(&customer.key, &harness.business_key()).await.unwrap();
    let token = evaluation.outcome.token().cloned().expect("reward issued");

    let tasks: Vec<_> = (0..20)
        .map(|_| {
            let issuer = harness.issuer.clone();
            let token = token.clone();
            tokio::spawn(async move { issuer.claim(token.as_str()).await })
        })
        .collect();

    let results: Vec<_> = futures::future::join_all(tasks).await.into_iter().map(|r| r.unwrap()).collect();
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, DomainError::AlreadyClaimed { .. })));
}

#[tokio::test]
async fn test_reward_title_is_snapshotted() {
    let harness = Harness::new(2);
    let customer = harness.customer(Some("081200000007"), None).await;
    let business = harness.business_key();

    harness.engine.evaluate_and_issue(&customer.key, &business).await.unwrap();
    let evaluation = harness.engine.evaluate_and_issue(&customer.key, &business).await.unwrap();
    let token = evaluation.outcome.token().cloned().expect("reward issued");

    let mut renamed = business_with_goal(2);
    renamed.rename_reward("Free nasi goreng".into());
    harness.store.seed_business(renamed);

    let claim = harness.issuer.lookup(token.as_str()).await.unwrap();
    assert_eq!(claim.reward_title, "Free es teh");

    // The next cycle picks up the new title.
    harness.engine.evaluate_and_issue(&customer.key, &business).await.unwrap();
    let next = harness.engine.evaluate_and_issue(&customer.key, &business).await.unwrap();
    let next_claim = harness.issuer.lookup(next.outcome.token().expect("reward").as_str()).await.unwrap();
    assert_eq!(next_claim.reward_title, "Free nasi goreng");
}

fn business_with_goal(goal: i32) -> loyalty_core::domain::Business {
    business(goal, "Free es teh", vec![])
}

#[tokio::test]
async fn test_failed_visit_write_is_retried_with_its_reward() {
    let harness = Harness::flaky(5, 1);
    let customer = harness.customer(Some("081200000008"), None).await;
    let business = harness.business_key();
    let mut seeded = customer.clone();
    seeded.visit_count = 4;
    harness.store.seed_customer(seeded);

    let err = harness.engine.evaluate_and_issue(&customer.key, &business).await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(harness.store.visit_event_count(&business, &customer.key), 0);

    let evaluation = harness.engine.evaluate_and_issue(&customer.key, &business).await.unwrap();
    assert_eq!(evaluation.visit.new_count(), 5);
    let token = evaluation.outcome.token().expect("cycle 1 reward").clone();

    let claim = harness.issuer.lookup(token.as_str()).await.unwrap();
    assert_eq!(claim.cycle_number, 1);
    assert!(claim.is_pending());
    assert_eq!(harness.issuer.claims_for_customer(&customer.key, &business).await.unwrap().len(), 1);
    assert_eq!(harness.store.visit_event_count(&business, &customer.key), 1);
}

#[tokio::test]
async fn test_failed_registration_is_retried_cleanly() {
    let harness = Harness::flaky(1, 1);
    let business = harness.business_key();

    let err = harness.customers.register(&business, "Tini", Some("081233334444"), None).await.unwrap_err();
    assert!(err.is_retryable());

    let registration = harness
        .customers
        .register(&business, "Tini", Some("081233334444"), None)
        .await
        .expect("retry is not a duplicate");
    assert_eq!(registration.customer.visit_count, 1);
    let claim = registration.visit.claim.expect("goal of one rewards the first visit");

    let stored = harness.customers.find(&business, &registration.customer.key).await.unwrap();
    assert_eq!(stored.visit_count, 1);
    assert_eq!(harness.issuer.lookup(claim.token.as_str()).await.unwrap().cycle_number, 1);
}

struct ScriptedTokens(Mutex<VecDeque<&'static str>>);

impl ClaimTokenGenerator for ScriptedTokens {
    fn generate(&self, _digits: usize) -> ClaimToken {
        ClaimToken::new(self.0.lock().pop_front().unwrap_or("000000"))
    }
}

#[tokio::test]
async fn test_token_conflict_regenerates() {
    let tokens = Arc::new(ScriptedTokens(Mutex::new(VecDeque::from(["111111", "111111", "222222"]))));
    let harness = Harness::with_generator(1, tokens);
    let first = harness.customer(Some("081200000009"), None).await;
    let second = harness.customer(Some("081200000010"), None).await;
    let business = harness.business_key();

    let a = harness.issuer.issue(&first.key, &business, 1, "Free es teh").await.unwrap();
    let b = harness.issuer.issue(&second.key, &business, 1, "Free es teh").await.unwrap();
    assert_eq!(a.token.as_str(), "111111");
    assert_eq!(b.token.as_str(), "222222");
}

#[tokio::test]
async fn test_token_conflict_during_visit_rolls_back_and_retries() {
    let tokens = Arc::new(ScriptedTokens(Mutex::new(VecDeque::from(["111111", "111111", "222222"]))));
    let harness = Harness::with_generator(1, tokens);
    let first = harness.customer(Some("081200000011"), None).await;
    let second = harness.customer(Some("081200000012"), None).await;
    let business = harness.business_key();

    let a = harness.engine.evaluate_and_issue(&first.key, &business).await.unwrap();
    let b = harness.engine.evaluate_and_issue(&second.key, &business).await.unwrap();
    assert_eq!(a.outcome.token().map(|t| t.as_str()), Some("111111"));
    assert_eq!(b.outcome.token().map(|t| t.as_str()), Some("222222"));

    // The colliding attempt left no visit behind.
    assert_eq!(b.visit.new_count(), 1);
    assert_eq!(harness.store.visit_event_count(&business, &second.key), 1);
}

#[tokio::test]
async fn test_scan_link_drives_a_visit() {
    let harness = Harness::new(5);
    let customer = harness.customer(None, Some("joko@example.com")).await;
    let resolver = IdentityResolver::with_defaults().unwrap();

    let link = resolver.scan_link("https://loyalty.example.com/scan", &customer.key).unwrap();
    let key = resolver.resolve(&link).expect("resolvable");
    let record = harness.ledger.record_visit(&key, &harness.business_key()).await.unwrap();
    assert_eq!(record.new_count(), 1);

    assert_eq!(resolver.resolve("garbage"), None);
}

#[tokio::test]
async fn test_duplicate_phone_is_rejected() {
    let harness = Harness::new(5);
    let business = harness.business_key();
    harness.customers.register(&business, "Tini", Some("0812 1111 2222"), None).await.unwrap();

    let duplicate = harness.customers.register(&business, "Tono", Some("081211112222"), None).await;
    assert!(matches!(duplicate, Err(DomainError::CustomerAlreadyExists { .. })));
}
