#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use fake::faker::name::en::Name;
use fake::Fake;
use parking_lot::Mutex;

use loyalty_core::domain::{Business, BusinessKey, Channel, Customer, CustomerKey, NewCustomer, NewVisit, VisitEvent};
use loyalty_core::error::DomainError;
use loyalty_core::ports::{EmailSender, PhoneMessenger, TransportError};
use loyalty_core::repositories::{VisitRepository, VisitWrite};
use loyalty_core::services::{
    CampaignDispatcher, ClaimTokenGenerator, CustomerService, DispatchSettings, RandomDigitTokens, RewardCycleEngine,
    TokenIssuer, TokenIssuerSettings, VisitLedger,
};
use loyalty_infrastructure::MemoryStore;

pub const BUSINESS: &str = "warung-bu-tini";

pub fn business(goal: i32, reward: &str, channels: Vec<Channel>) -> Business {
    Business::new(BusinessKey::from(BUSINESS), "Warung Bu Tini".into(), goal, reward.into(), channels)
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub ledger: Arc<VisitLedger>,
    pub issuer: Arc<TokenIssuer>,
    pub engine: Arc<RewardCycleEngine>,
    pub customers: CustomerService,
}

impl Harness {
    pub fn new(goal: i32) -> Self {
        Self::with_generator(goal, Arc::new(RandomDigitTokens))
    }

    pub fn with_generator(goal: i32, generator: Arc<dyn ClaimTokenGenerator>) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::build(goal, generator, store.clone(), store)
    }

    /// Visit writes fail `failures` times before reaching the store.
    pub fn flaky(goal: i32, failures: usize) -> Self {
        let store = Arc::new(MemoryStore::new());
        let visits = Arc::new(FlakyVisits { inner: store.clone(), failures: AtomicUsize::new(failures) });
        Self::build(goal, Arc::new(RandomDigitTokens), store, visits)
    }

    fn build(
        goal: i32,
        generator: Arc<dyn ClaimTokenGenerator>,
        store: Arc<MemoryStore>,
        visits: Arc<dyn VisitRepository>,
    ) -> Self {
        store.seed_business(business(goal, "Free es teh", vec![]));

        let timeout = Duration::from_secs(2);
        let issuer = Arc::new(TokenIssuer::with_generator(
            store.clone(),
            generator,
            TokenIssuerSettings { storage_timeout: timeout, ..Default::default() },
        ));
        let ledger = Arc::new(VisitLedger::new(store.clone(), visits, issuer.clone(), timeout));
        let engine = Arc::new(RewardCycleEngine::new(ledger.clone(), issuer.clone()));
        let customers = CustomerService::new(store.clone(), store.clone(), store.clone(), ledger.clone(), timeout);

        Self { store, ledger, issuer, engine, customers }
    }

    pub fn business_key(&self) -> BusinessKey {
        BusinessKey::from(BUSINESS)
    }

    pub async fn customer(&self, phone: Option<&str>, email: Option<&str>) -> Customer {
        let name: String = Name().fake();
        seed_customer(&self.store, &name, phone, email).await
    }
}

pub async fn seed_customer(store: &MemoryStore, name: &str, phone: Option<&str>, email: Option<&str>) -> Customer {
    let customer = NewCustomer::new(BusinessKey::from(BUSINESS), name, phone, email)
        .expect("valid customer")
        .into_customer(Utc::now());
    store.seed_customer(customer.clone());
    customer
}

/// Fails visit writes with a retryable error a fixed number of times, then
/// delegates to the wrapped store.
pub struct FlakyVisits {
    inner: Arc<MemoryStore>,
    failures: AtomicUsize,
}

impl FlakyVisits {
    fn fail_once(&self) -> Result<(), DomainError> {
        match self.failures.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)) {
            Ok(_) => Err(DomainError::StorageUnavailable("connection reset by peer".into())),
            Err(_) => Ok(()),
        }
    }
}

#[async_trait]
impl VisitRepository for FlakyVisits {
    async fn record_visit(&self, visit: &NewVisit) -> Result<Option<VisitWrite>, DomainError> {
        self.fail_once()?;
        self.inner.record_visit(visit).await
    }

    async fn register_with_visit(&self, customer: &Customer, visit: &NewVisit) -> Result<VisitWrite, DomainError> {
        self.fail_once()?;
        self.inner.register_with_visit(customer, visit).await
    }

    async fn recent_visits(
        &self,
        business: &BusinessKey,
        customer: &CustomerKey,
        limit: i64,
    ) -> Result<Vec<VisitEvent>, DomainError> {
        self.inner.recent_visits(business, customer, limit).await
    }
}

/// Records every send; fails for numbers/addresses listed in `failing`.
#[derive(Default)]
pub struct RecordingPhone {
    pub sent: Mutex<Vec<(String, String)>>,
    pub failing: Vec<String>,
}

impl RecordingPhone {
    pub fn failing_for(numbers: &[&str]) -> Self {
        Self { failing: numbers.iter().map(|n| n.to_string()).collect(), ..Default::default() }
    }
}

#[async_trait]
impl PhoneMessenger for RecordingPhone {
    async fn send_phone_message(&self, phone: &str, text: &str) -> Result<(), TransportError> {
        if self.failing.iter().any(|n| n == phone) {
            return Err(TransportError::Unavailable("gateway returned 503".into()));
        }
        self.sent.lock().push((phone.to_string(), text.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingEmail {
    pub sent: Mutex<Vec<(String, String, String)>>,
}

#[async_trait]
impl EmailSender for RecordingEmail {
    async fn send_email(&self, address: &str, subject: &str, html: &str) -> Result<(), TransportError> {
        self.sent.lock().push((address.to_string(), subject.to_string(), html.to_string()));
        Ok(())
    }
}

pub fn dispatcher(store: &Arc<MemoryStore>, phone: Arc<RecordingPhone>, email: Arc<RecordingEmail>) -> CampaignDispatcher {
    CampaignDispatcher::new(
        store.clone(),
        store.clone(),
        store.clone(),
        phone,
        email,
        DispatchSettings {
            pacing: Duration::ZERO,
            send_timeout: Duration::from_secs(2),
            storage_timeout: Duration::from_secs(2),
        },
    )
}

pub fn keys(customers: &[&Customer]) -> Vec<CustomerKey> {
    customers.iter().map(|c| c.key.clone()).collect()
}
