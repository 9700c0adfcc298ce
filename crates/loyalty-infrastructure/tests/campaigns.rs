//! Campaign dispatch against the in-memory store

mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};

use common::{business, dispatcher, keys, seed_customer, RecordingEmail, RecordingPhone, BUSINESS};
use loyalty_core::domain::{BusinessKey, CampaignStatus, Channel, CustomerKey, DeliveryOutcome};
use loyalty_core::error::DomainError;
use loyalty_infrastructure::MemoryStore;
use loyalty_shared::Pagination;

fn store_with(channels: Vec<Channel>) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.seed_business(business(5, "Free es teh", channels));
    store
}

#[tokio::test]
async fn test_recently_contacted_customer_is_skipped() {
    let store = store_with(vec![]);
    let a = seed_customer(&store, "Ani", Some("081300000001"), None).await;
    let b = seed_customer(&store, "Bayu", Some("081300000002"), None).await;
    let c = seed_customer(&store, "Citra", Some("081300000003"), None).await;
    let business = BusinessKey::from(BUSINESS);
    store.seed_contact(&business, &a.key, Utc::now() - Duration::hours(2));

    let phone = Arc::new(RecordingPhone::default());
    let email = Arc::new(RecordingEmail::default());
    let result = dispatcher(&store, phone.clone(), email.clone())
        .dispatch(&business, "Weekend promo", "Hi {{name}}, see you at {{business}}!", &keys(&[&a, &b, &c]))
        .await
        .unwrap();

    assert_eq!(result.skipped_count, 1);
    assert_eq!(result.sent_count, 2);
    assert_eq!(result.status, CampaignStatus::Sent);

    let sent = phone.sent.lock().clone();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|(number, _)| number != "081300000001"));
    assert!(sent.iter().any(|(_, text)| text == "Hi Bayu, see you at Warung Bu Tini!"));
    assert!(email.sent.lock().is_empty());
}

#[tokio::test]
async fn test_contact_older_than_window_is_eligible() {
    let store = store_with(vec![]);
    let a = seed_customer(&store, "Ani", Some("081300000011"), None).await;
    let business = BusinessKey::from(BUSINESS);
    store.seed_contact(&business, &a.key, Utc::now() - Duration::hours(25));

    let result = dispatcher(&store, Arc::default(), Arc::default())
        .dispatch(&business, "Promo", "Hello", &keys(&[&a]))
        .await
        .unwrap();
    assert_eq!(result.sent_count, 1);
    assert_eq!(result.skipped_count, 0);
    assert!(store.last_contacted(&business, &a.key).unwrap() > Utc::now() - Duration::minutes(1));
}

#[tokio::test]
async fn test_second_campaign_within_window_is_rate_limited() {
    let store = store_with(vec![]);
    let a = seed_customer(&store, "Ani", Some("081300000021"), None).await;
    let business = BusinessKey::from(BUSINESS);
    let dispatcher = dispatcher(&store, Arc::default(), Arc::default());

    dispatcher.dispatch(&business, "First", "Hello", &keys(&[&a])).await.unwrap();
    let second = dispatcher.dispatch(&business, "Second", "Hello again", &keys(&[&a])).await;
    assert_eq!(second.unwrap_err(), DomainError::AllRateLimited);

    let history = dispatcher.history(&business, Pagination::default()).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].title, "First");
}

#[tokio::test]
async fn test_phone_failure_falls_back_to_email() {
    let store = store_with(vec![Channel::Phone, Channel::Email]);
    let a = seed_customer(&store, "Ani", Some("081300000031"), Some("ani@example.com")).await;
    let business = BusinessKey::from(BUSINESS);

    let phone = Arc::new(RecordingPhone::failing_for(&["081300000031"]));
    let email = Arc::new(RecordingEmail::default());
    let dispatcher = dispatcher(&store, phone, email.clone());
    let result = dispatcher
        .dispatch(&business, "Promo", "Hi {{name}}\nYou have {{visits}} visits", &keys(&[&a]))
        .await
        .unwrap();

    assert_eq!(result.sent_count, 1);
    let sent = email.sent.lock().clone();
    assert_eq!(sent, vec![("ani@example.com".to_string(), "Promo".to_string(), "Hi Ani<br>You have 0 visits".to_string())]);

    let record = dispatcher.find(&business, result.campaign_id).await.unwrap().expect("stored");
    assert!(record.is_finished());
    assert_eq!(record.recipients.len(), 1);
    assert_eq!(record.recipients[0].channel, Some(Channel::Email));
    assert!(record.recipients[0].detail.as_deref().unwrap_or_default().contains("503"));
}

#[tokio::test]
async fn test_missing_channel_is_skipped_not_failed() {
    let store = store_with(vec![Channel::Email]);
    let a = seed_customer(&store, "Ani", Some("081300000041"), None).await;
    let b = seed_customer(&store, "Bayu", None, Some("bayu@example.com")).await;
    let business = BusinessKey::from(BUSINESS);

    let dispatcher = dispatcher(&store, Arc::default(), Arc::default());
    let result = dispatcher
        .dispatch(&business, "Promo", "Hello", &keys(&[&a, &b]))
        .await
        .unwrap();
    assert_eq!(result.sent_count, 1);
    assert_eq!(result.failed_count, 0);
    assert_eq!(result.skipped_count, 1);
    assert_eq!(result.status, CampaignStatus::Partial);

    let record = dispatcher.find(&business, result.campaign_id).await.unwrap().expect("stored");
    let skipped = record.recipients.iter().find(|r| r.customer_key == a.key).expect("recipient");
    assert_eq!(skipped.outcome, DeliveryOutcome::SkippedNoChannel);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_campaigns_never_double_contact() {
    let store = store_with(vec![]);
    let mut customers = Vec::new();
    for i in 0..10 {
        customers.push(seed_customer(&store, "Pelanggan", Some(&format!("0813000001{:02}", i)), None).await);
    }
    let candidates = keys(&customers.iter().collect::<Vec<_>>());
    let business = BusinessKey::from(BUSINESS);
    let phone = Arc::new(RecordingPhone::default());
    let dispatcher = Arc::new(dispatcher(&store, phone.clone(), Arc::default()));

    let tasks: Vec<_> = (0..2)
        .map(|n| {
            let dispatcher = dispatcher.clone();
            let business = business.clone();
            let candidates = candidates.clone();
            tokio::spawn(async move { dispatcher.dispatch(&business, &format!("Promo {}", n), "Hello", &candidates).await })
        })
        .collect();

    let mut sent = 0;
    for result in futures::future::join_all(tasks).await {
        match result.unwrap() {
            Ok(r) => sent += r.sent_count,
            Err(e) => assert_eq!(e, DomainError::AllRateLimited),
        }
    }
    assert_eq!(sent, 10);
    assert_eq!(phone.sent.lock().len(), 10);
}

#[tokio::test]
async fn test_unknown_business() {
    let store = store_with(vec![]);
    let result = dispatcher(&store, Arc::default(), Arc::default())
        .dispatch(&BusinessKey::from("elsewhere"), "Promo", "Hello", &[CustomerKey::from("x")])
        .await;
    assert!(matches!(result, Err(DomainError::BusinessNotFound(_))));
}
