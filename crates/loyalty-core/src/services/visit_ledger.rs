// ============================================================================
// Loyalty Core - Visit Ledger
// File: crates/loyalty-core/src/services/visit_ledger.rs
// Description: Records visits atomically and reports the resulting cycle position
// ============================================================================
//! A visit that closes a cycle is written together with its pending claim, so
//! a failed or timed-out write leaves nothing behind and the caller can retry
//! the whole visit.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::domain::{
    Business, BusinessKey, ClaimToken, Customer, CustomerKey, NewVisit, RewardClaim, VisitEvent, VisitGoal,
    VisitRecord,
};
use crate::error::DomainError;
use crate::repositories::{BusinessRepository, VisitRepository, VisitWrite};
use crate::services::{with_storage_timeout, TokenIssuer};

pub struct VisitLedger {
    businesses: Arc<dyn BusinessRepository>,
    visits: Arc<dyn VisitRepository>,
    issuer: Arc<TokenIssuer>,
    storage_timeout: Duration,
}

impl VisitLedger {
    pub fn new(
        businesses: Arc<dyn BusinessRepository>,
        visits: Arc<dyn VisitRepository>,
        issuer: Arc<TokenIssuer>,
        storage_timeout: Duration,
    ) -> Self {
        Self { businesses, visits, issuer, storage_timeout }
    }

    pub async fn load_business(&self, business: &BusinessKey) -> Result<Business, DomainError> {
        with_storage_timeout(self.storage_timeout, "find_business", self.businesses.find_by_key(business))
            .await?
            .ok_or_else(|| DomainError::BusinessNotFound(business.to_string()))
    }

    /// Appends one visit and increments the count by exactly one.
    pub async fn record_visit(&self, customer: &CustomerKey, business: &BusinessKey) -> Result<VisitRecord, DomainError> {
        let tenant = self.load_business(business).await?;
        self.record_visit_for(&tenant, customer).await
    }

    /// Same as [`VisitLedger::record_visit`] with the tenant already loaded.
    pub async fn record_visit_for(&self, business: &Business, customer: &CustomerKey) -> Result<VisitRecord, DomainError> {
        // A bad goal must fail before anything is written.
        let goal = business.goal()?;
        let visits = &self.visits;
        let timeout = self.storage_timeout;

        let (event, claim) = self
            .issuer
            .with_fresh_tokens(customer, &business.key, move |token| {
                let visit = new_visit(business, customer, goal, token);
                async move {
                    match with_storage_timeout(timeout, "record_visit", visits.record_visit(&visit)).await? {
                        Some(VisitWrite::Recorded { event, claim }) => Ok(Some((event, claim))),
                        Some(VisitWrite::TokenTaken) => Ok(None),
                        None => {
                            warn!("Visit rejected: customer {} not registered in {}", customer, business.key);
                            Err(DomainError::CustomerNotFound(customer.to_string()))
                        }
                    }
                }
            })
            .await?;

        Ok(recorded(business, customer, event, goal, claim))
    }

    /// Stores a new customer together with its first visit. Nothing is written
    /// when any part fails, so a retry never meets its own half-registration.
    pub async fn register_first_visit(&self, business: &Business, customer: &Customer) -> Result<VisitRecord, DomainError> {
        let goal = business.goal()?;
        let visits = &self.visits;
        let timeout = self.storage_timeout;

        let (event, claim) = self
            .issuer
            .with_fresh_tokens(&customer.key, &business.key, move |token| {
                let visit = new_visit(business, &customer.key, goal, token);
                async move {
                    match with_storage_timeout(timeout, "register_customer", visits.register_with_visit(customer, &visit))
                        .await?
                    {
                        VisitWrite::Recorded { event, claim } => Ok(Some((event, claim))),
                        VisitWrite::TokenTaken => Ok(None),
                    }
                }
            })
            .await?;

        Ok(recorded(business, &customer.key, event, goal, claim))
    }

    pub async fn history(
        &self,
        customer: &CustomerKey,
        business: &BusinessKey,
        limit: i64,
    ) -> Result<Vec<VisitEvent>, DomainError> {
        with_storage_timeout(
            self.storage_timeout,
            "recent_visits",
            self.visits.recent_visits(business, customer, limit.max(1)),
        )
        .await
    }
}

fn new_visit(business: &Business, customer: &CustomerKey, goal: VisitGoal, token: ClaimToken) -> NewVisit {
    NewVisit {
        business_key: business.key.clone(),
        customer_key: customer.clone(),
        recorded_at: Utc::now(),
        visit_goal: goal,
        reward_title: business.reward_title.clone(),
        claim_token: token,
    }
}

fn recorded(
    business: &Business,
    customer: &CustomerKey,
    event: VisitEvent,
    goal: VisitGoal,
    claim: Option<RewardClaim>,
) -> VisitRecord {
    let record = VisitRecord::new(event, goal, claim);
    debug!(
        "Visit recorded for {} in {}: count {} (cycle reached: {})",
        customer,
        business.key,
        record.new_count(),
        record.cycle_reached
    );
    if let Some(claim) = &record.claim {
        info!(
            "Cycle {} completed for {} in {} ({})",
            claim.cycle_number, customer, business.key, claim.reward_title
        );
    }
    record
}
