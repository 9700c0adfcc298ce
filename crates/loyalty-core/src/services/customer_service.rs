//! Customer registry: registration and cycle progress

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use loyalty_shared::utils::{mask_email, mask_phone};

use crate::domain::{BusinessKey, Customer, CustomerKey, CycleProgress, NewCustomer, RewardClaim, VisitRecord};
use crate::error::DomainError;
use crate::repositories::{BusinessRepository, CustomerRepository, RewardClaimRepository};
use crate::services::{with_storage_timeout, VisitLedger};

/// Customer snapshot with cycle position and claim history.
#[derive(Debug, Clone, Serialize)]
pub struct CustomerOverview {
    pub customer: Customer,
    pub progress: CycleProgress,
    pub claims: Vec<RewardClaim>,
}

/// A new customer and the first visit its registration counted.
#[derive(Debug, Clone)]
pub struct Registration {
    pub customer: Customer,
    pub visit: VisitRecord,
}

pub struct CustomerService {
    businesses: Arc<dyn BusinessRepository>,
    customers: Arc<dyn CustomerRepository>,
    claims: Arc<dyn RewardClaimRepository>,
    ledger: Arc<VisitLedger>,
    storage_timeout: Duration,
}

impl CustomerService {
    pub fn new(
        businesses: Arc<dyn BusinessRepository>,
        customers: Arc<dyn CustomerRepository>,
        claims: Arc<dyn RewardClaimRepository>,
        ledger: Arc<VisitLedger>,
        storage_timeout: Duration,
    ) -> Self {
        Self { businesses, customers, claims, ledger, storage_timeout }
    }

    /// Registers a customer; registration counts as the first visit. The
    /// customer, the visit and (for a goal of one) the claim are stored as
    /// one operation. Duplicate phones are rejected by the store.
    pub async fn register(
        &self,
        business: &BusinessKey,
        display_name: &str,
        phone: Option<&str>,
        email: Option<&str>,
    ) -> Result<Registration, DomainError> {
        let new_customer = NewCustomer::new(business.clone(), display_name, phone, email)?;
        let tenant = self.ledger.load_business(business).await?;

        let mut customer = new_customer.into_customer(Utc::now());
        let visit = self
            .ledger
            .register_first_visit(&tenant, &customer)
            .await
            .map_err(|e| {
                if let DomainError::CustomerAlreadyExists { .. } = e {
                    warn!(
                        "Registration rejected for business {}: phone {} already registered",
                        business,
                        customer.phone.as_deref().map(mask_phone).unwrap_or_default()
                    );
                }
                e
            })?;

        customer.visit_count = visit.new_count();
        customer.modified_at = Some(visit.event.recorded_at);

        info!(
            "Customer registered: {} in {} (phone: {}, email: {})",
            customer.key,
            business,
            customer.phone.as_deref().map(mask_phone).unwrap_or_else(|| "-".to_string()),
            customer.email.as_deref().map(mask_email).unwrap_or_else(|| "-".to_string())
        );
        Ok(Registration { customer, visit })
    }

    pub async fn find(&self, business: &BusinessKey, customer: &CustomerKey) -> Result<Customer, DomainError> {
        with_storage_timeout(self.storage_timeout, "find_customer", self.customers.find(business, customer))
            .await?
            .ok_or_else(|| DomainError::CustomerNotFound(customer.to_string()))
    }

    pub async fn progress(&self, customer: &CustomerKey, business: &BusinessKey) -> Result<CycleProgress, DomainError> {
        let goal = with_storage_timeout(self.storage_timeout, "find_business", self.businesses.find_by_key(business))
            .await?
            .ok_or_else(|| DomainError::BusinessNotFound(business.to_string()))?
            .goal()?;
        let customer = self.find(business, customer).await?;
        Ok(goal.progress(customer.visit_count))
    }

    pub async fn overview(&self, customer: &CustomerKey, business: &BusinessKey) -> Result<CustomerOverview, DomainError> {
        let goal = with_storage_timeout(self.storage_timeout, "find_business", self.businesses.find_by_key(business))
            .await?
            .ok_or_else(|| DomainError::BusinessNotFound(business.to_string()))?
            .goal()?;
        let found = self.find(business, customer).await?;
        let claims = with_storage_timeout(
            self.storage_timeout,
            "list_claims",
            self.claims.list_for_customer(business, customer),
        )
        .await?;

        Ok(CustomerOverview {
            progress: goal.progress(found.visit_count),
            customer: found,
            claims,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Business, NewRewardClaim, NewVisit, VisitEvent};
    use crate::repositories::{
        MockBusinessRepository, MockCustomerRepository, MockRewardClaimRepository, MockVisitRepository, VisitWrite,
    };
    use crate::services::{TokenIssuer, TokenIssuerSettings};
    use uuid::Uuid;

    fn business(goal: i32) -> Business {
        Business::new(BusinessKey::from("bakso-pak-min"), "Bakso Pak Min".into(), goal, "Free bakso".into(), vec![])
    }

    fn businesses(goal: i32) -> MockBusinessRepository {
        let mut repo = MockBusinessRepository::new();
        repo.expect_find_by_key().returning(move |_| Ok(Some(business(goal))));
        repo
    }

    fn first_visit(customer: &Customer, visit: &NewVisit) -> VisitWrite {
        VisitWrite::Recorded {
            event: VisitEvent {
                id: Uuid::new_v4(),
                customer_key: customer.key.clone(),
                business_key: customer.business_key.clone(),
                recorded_at: visit.recorded_at,
                resulting_count: 1,
            },
            claim: visit.claim_for(1).map(NewRewardClaim::into_pending),
        }
    }

    fn service(
        businesses: MockBusinessRepository,
        customers: MockCustomerRepository,
        claims: MockRewardClaimRepository,
        visits: MockVisitRepository,
    ) -> CustomerService {
        let timeout = Duration::from_secs(1);
        let businesses: Arc<dyn BusinessRepository> = Arc::new(businesses);
        let claims: Arc<dyn RewardClaimRepository> = Arc::new(claims);
        let issuer = TokenIssuer::new(claims.clone(), TokenIssuerSettings { storage_timeout: timeout, ..Default::default() });
        let ledger = VisitLedger::new(businesses.clone(), Arc::new(visits), Arc::new(issuer), timeout);
        CustomerService::new(businesses, Arc::new(customers), claims, Arc::new(ledger), timeout)
    }

    #[tokio::test]
    async fn test_register_counts_first_visit() {
        let mut visits = MockVisitRepository::new();
        visits
            .expect_register_with_visit()
            .withf(|c, _| c.visit_count == 0 && c.phone.as_deref() == Some("081234567"))
            .times(1)
            .returning(|c, v| Ok(first_visit(c, v)));

        let service = service(businesses(5), MockCustomerRepository::new(), MockRewardClaimRepository::new(), visits);
        let registration = service
            .register(&BusinessKey::from("bakso-pak-min"), "Dewi", Some("0812-345-67"), None)
            .await
            .unwrap();
        assert_eq!(registration.customer.display_name, "Dewi");
        assert_eq!(registration.customer.visit_count, 1);
        assert!(!registration.visit.cycle_reached);
        assert!(registration.visit.claim.is_none());
    }

    #[tokio::test]
    async fn test_register_with_goal_of_one_issues_claim() {
        let mut visits = MockVisitRepository::new();
        visits.expect_register_with_visit().returning(|c, v| Ok(first_visit(c, v)));

        let service = service(businesses(1), MockCustomerRepository::new(), MockRewardClaimRepository::new(), visits);
        let registration = service
            .register(&BusinessKey::from("bakso-pak-min"), "Dewi", None, Some("dewi@example.com"))
            .await
            .unwrap();
        let claim = registration.visit.claim.expect("claim stored with the registration");
        assert_eq!(claim.cycle_number, 1);
        assert_eq!(claim.customer_key, registration.customer.key);
    }

    #[tokio::test]
    async fn test_failed_registration_can_be_retried() {
        // Nothing is written when the combined write fails, so the retry must
        // not trip over a half-registered customer.
        let mut visits = MockVisitRepository::new();
        let mut attempts = 0;
        visits.expect_register_with_visit().times(2).returning(move |c, v| {
            attempts += 1;
            if attempts == 1 {
                Err(DomainError::StorageUnavailable("connection reset".into()))
            } else {
                Ok(first_visit(c, v))
            }
        });

        let service = service(businesses(5), MockCustomerRepository::new(), MockRewardClaimRepository::new(), visits);
        let business = BusinessKey::from("bakso-pak-min");

        let err = service.register(&business, "Dewi", Some("081234567"), None).await.unwrap_err();
        assert!(err.is_retryable());

        let registration = service.register(&business, "Dewi", Some("081234567"), None).await.unwrap();
        assert_eq!(registration.customer.visit_count, 1);
    }

    #[tokio::test]
    async fn test_register_unknown_business() {
        let mut businesses = MockBusinessRepository::new();
        businesses.expect_find_by_key().returning(|_| Ok(None));
        let mut visits = MockVisitRepository::new();
        visits.expect_register_with_visit().never();

        let service = service(businesses, MockCustomerRepository::new(), MockRewardClaimRepository::new(), visits);
        let result = service.register(&BusinessKey::from("nope"), "Dewi", None, Some("dewi@example.com")).await;
        assert!(matches!(result, Err(DomainError::BusinessNotFound(_))));
    }

    #[tokio::test]
    async fn test_register_invalid_input_skips_store() {
        let mut businesses = MockBusinessRepository::new();
        businesses.expect_find_by_key().never();

        let service = service(
            businesses,
            MockCustomerRepository::new(),
            MockRewardClaimRepository::new(),
            MockVisitRepository::new(),
        );
        let result = service.register(&BusinessKey::from("bakso-pak-min"), "Dewi", None, None).await;
        assert!(matches!(result, Err(DomainError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_overview_uses_modulo_progress() {
        let mut customers = MockCustomerRepository::new();
        customers.expect_find().returning(|b, _| {
            let mut customer = NewCustomer::new(b.clone(), "Dewi", Some("081234567"), None)
                .unwrap()
                .into_customer(Utc::now());
            customer.visit_count = 7;
            Ok(Some(customer))
        });
        let mut claims = MockRewardClaimRepository::new();
        claims.expect_list_for_customer().returning(|_, _| Ok(vec![]));

        let service = service(businesses(5), customers, claims, MockVisitRepository::new());
        let overview = service
            .overview(&CustomerKey::from("c1"), &BusinessKey::from("bakso-pak-min"))
            .await
            .unwrap();
        assert_eq!(overview.progress.visits_in_cycle, 2);
        assert_eq!(overview.progress.remaining, 3);
        assert_eq!(overview.progress.completed_cycles, 1);
    }

    #[tokio::test]
    async fn test_progress_unknown_customer() {
        let mut customers = MockCustomerRepository::new();
        customers.expect_find().returning(|_, _| Ok(None));

        let service = service(businesses(5), customers, MockRewardClaimRepository::new(), MockVisitRepository::new());
        let result = service.progress(&CustomerKey::from("ghost"), &BusinessKey::from("bakso-pak-min")).await;
        assert!(matches!(result, Err(DomainError::CustomerNotFound(_))));
    }

    #[tokio::test]
    async fn test_find_is_scoped_to_business() {
        let mut customers = MockCustomerRepository::new();
        customers
            .expect_find()
            .withf(|b, k| b.as_str() == "bakso-pak-min" && k.as_str() == "c1")
            .returning(|b, _| {
                Ok(Some(
                    NewCustomer::new(b.clone(), "Dewi", None, Some("dewi@example.com"))
                        .unwrap()
                        .into_customer(Utc::now()),
                ))
            });
        customers
            .expect_find()
            .withf(|b, _| b.as_str() != "bakso-pak-min")
            .returning(|_, _| Ok(None));

        let service = service(businesses(5), customers, MockRewardClaimRepository::new(), MockVisitRepository::new());
        let found = service.find(&BusinessKey::from("bakso-pak-min"), &CustomerKey::from("c1")).await.unwrap();
        assert_eq!(found.email.as_deref(), Some("dewi@example.com"));

        let missing = service.find(&BusinessKey::from("other"), &CustomerKey::from("c1")).await.unwrap_err();
        assert!(missing.is_not_found());
    }
}
