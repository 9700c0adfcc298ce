// ============================================================================
// Loyalty Infrastructure - In-Memory Store
// File: crates/loyalty-infrastructure/src/database/memory.rs
// Description: Process-local adapter for every repository port
// ============================================================================
//! Each operation runs inside one `parking_lot::Mutex` critical section, which
//! gives it the same atomicity the PostgreSQL statements provide.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use loyalty_core::domain::{
    Business, BusinessKey, CampaignDraft, CampaignRecipient, CampaignRecord, CampaignResult, ClaimStatus, ClaimToken,
    Customer, CustomerKey, NewRewardClaim, NewVisit, RewardClaim, VisitEvent,
};
use loyalty_core::error::DomainError;
use loyalty_core::repositories::{
    BusinessRepository, CampaignRepository, ClaimInsert, ClaimTransition, CustomerRepository, RewardClaimRepository,
    StorageHealth, VisitRepository, VisitWrite,
};
use loyalty_shared::Pagination;

type CycleKey = (BusinessKey, CustomerKey, i64);
type ContactKey = (BusinessKey, CustomerKey);

#[derive(Default)]
struct State {
    businesses: HashMap<BusinessKey, Business>,
    customers: HashMap<CustomerKey, Customer>,
    visits: Vec<VisitEvent>,
    claims: HashMap<ClaimToken, RewardClaim>,
    claim_cycles: HashMap<CycleKey, ClaimToken>,
    campaigns: HashMap<Uuid, CampaignRecord>,
    contacts: HashMap<ContactKey, (DateTime<Utc>, Uuid)>,
}

impl State {
    fn insert_customer(&mut self, customer: &Customer) -> Result<(), DomainError> {
        let duplicate_phone = customer.phone.is_some()
            && self
                .customers
                .values()
                .any(|c| c.business_key == customer.business_key && c.phone == customer.phone);
        if duplicate_phone || self.customers.contains_key(&customer.key) {
            return Err(DomainError::CustomerAlreadyExists {
                business_key: customer.business_key.to_string(),
                detail: "phone number already registered".to_string(),
            });
        }
        self.customers.insert(customer.key.clone(), customer.clone());
        Ok(())
    }

    fn insert_claim(&mut self, claim: &NewRewardClaim) -> ClaimInsert {
        let cycle = (claim.business_key.clone(), claim.customer_key.clone(), claim.cycle_number);
        if let Some(existing) = self.claim_cycles.get(&cycle).and_then(|t| self.claims.get(t)) {
            return ClaimInsert::CycleAlreadyIssued(existing.clone());
        }
        if self.claims.contains_key(&claim.token) {
            return ClaimInsert::TokenTaken;
        }

        let pending = claim.clone().into_pending();
        self.claim_cycles.insert(cycle, pending.token.clone());
        self.claims.insert(pending.token.clone(), pending.clone());
        ClaimInsert::Inserted(pending)
    }

    /// `None` when the customer is missing. `TokenTaken` leaves state untouched.
    fn apply_visit(&mut self, visit: &NewVisit) -> Option<VisitWrite> {
        let count = self
            .customers
            .get(&visit.customer_key)
            .filter(|c| c.business_key == visit.business_key)?
            .visit_count
            + 1;

        let claim = match visit.claim_for(count).map(|claim| self.insert_claim(&claim)) {
            None => None,
            Some(ClaimInsert::Inserted(claim)) | Some(ClaimInsert::CycleAlreadyIssued(claim)) => Some(claim),
            Some(ClaimInsert::TokenTaken) => return Some(VisitWrite::TokenTaken),
        };

        let record = self.customers.get_mut(&visit.customer_key)?;
        record.visit_count = count;
        record.modified_at = Some(visit.recorded_at);

        let event = VisitEvent {
            id: Uuid::new_v4(),
            customer_key: visit.customer_key.clone(),
            business_key: visit.business_key.clone(),
            recorded_at: visit.recorded_at,
            resulting_count: count,
        };
        self.visits.push(event.clone());
        Some(VisitWrite::Recorded { event, claim })
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a tenant. Businesses are owned elsewhere; this is
    /// how they reach the in-memory backend.
    pub fn seed_business(&self, business: Business) {
        self.state.lock().businesses.insert(business.key.clone(), business);
    }

    /// Inserts a customer as-is, bypassing registration.
    pub fn seed_customer(&self, customer: Customer) {
        self.state.lock().customers.insert(customer.key.clone(), customer);
    }

    /// Records that `business` last contacted `customer` at `at`.
    pub fn seed_contact(&self, business: &BusinessKey, customer: &CustomerKey, at: DateTime<Utc>) {
        self.state
            .lock()
            .contacts
            .insert((business.clone(), customer.clone()), (at, Uuid::nil()));
    }

    pub fn last_contacted(&self, business: &BusinessKey, customer: &CustomerKey) -> Option<DateTime<Utc>> {
        self.state
            .lock()
            .contacts
            .get(&(business.clone(), customer.clone()))
            .map(|(at, _)| *at)
    }

    pub fn visit_event_count(&self, business: &BusinessKey, customer: &CustomerKey) -> usize {
        self.state
            .lock()
            .visits
            .iter()
            .filter(|v| &v.business_key == business && &v.customer_key == customer)
            .count()
    }
}

#[async_trait]
impl BusinessRepository for MemoryStore {
    async fn find_by_key(&self, key: &BusinessKey) -> Result<Option<Business>, DomainError> {
        Ok(self.state.lock().businesses.get(key).cloned())
    }
}

#[async_trait]
impl CustomerRepository for MemoryStore {
    async fn find(&self, business: &BusinessKey, key: &CustomerKey) -> Result<Option<Customer>, DomainError> {
        Ok(self
            .state
            .lock()
            .customers
            .get(key)
            .filter(|c| &c.business_key == business)
            .cloned())
    }
}

#[async_trait]
impl VisitRepository for MemoryStore {
    async fn record_visit(&self, visit: &NewVisit) -> Result<Option<VisitWrite>, DomainError> {
        Ok(self.state.lock().apply_visit(visit))
    }

    async fn register_with_visit(&self, customer: &Customer, visit: &NewVisit) -> Result<VisitWrite, DomainError> {
        let mut state = self.state.lock();
        state.insert_customer(customer)?;
        match state.apply_visit(visit) {
            Some(VisitWrite::TokenTaken) => {
                state.customers.remove(&customer.key);
                Ok(VisitWrite::TokenTaken)
            }
            Some(written) => Ok(written),
            None => {
                state.customers.remove(&customer.key);
                Err(DomainError::StorageUnavailable(format!(
                    "visit for {} does not match its customer",
                    customer.key
                )))
            }
        }
    }

    async fn recent_visits(
        &self,
        business: &BusinessKey,
        customer: &CustomerKey,
        limit: i64,
    ) -> Result<Vec<VisitEvent>, DomainError> {
        let state = self.state.lock();
        let mut events: Vec<VisitEvent> = state
            .visits
            .iter()
            .filter(|v| &v.business_key == business && &v.customer_key == customer)
            .cloned()
            .collect();
        events.sort_by(|a, b| b.resulting_count.cmp(&a.resulting_count));
        events.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));
        Ok(events)
    }
}

#[async_trait]
impl RewardClaimRepository for MemoryStore {
    async fn insert_pending(&self, claim: &NewRewardClaim) -> Result<ClaimInsert, DomainError> {
        Ok(self.state.lock().insert_claim(claim))
    }

    async fn find_by_token(&self, token: &ClaimToken) -> Result<Option<RewardClaim>, DomainError> {
        Ok(self.state.lock().claims.get(token).cloned())
    }

    async fn find_by_cycle(
        &self,
        business: &BusinessKey,
        customer: &CustomerKey,
        cycle_number: i64,
    ) -> Result<Option<RewardClaim>, DomainError> {
        let state = self.state.lock();
        Ok(state
            .claim_cycles
            .get(&(business.clone(), customer.clone(), cycle_number))
            .and_then(|t| state.claims.get(t))
            .cloned())
    }

    async fn mark_claimed(&self, token: &ClaimToken, claimed_at: DateTime<Utc>) -> Result<ClaimTransition, DomainError> {
        let mut state = self.state.lock();
        let Some(claim) = state.claims.get_mut(token) else {
            return Ok(ClaimTransition::NotFound);
        };
        if claim.status != ClaimStatus::Pending {
            return Ok(ClaimTransition::AlreadyClaimed(claim.clone()));
        }
        claim.status = ClaimStatus::Claimed;
        claim.claimed_at = Some(claimed_at);
        Ok(ClaimTransition::Claimed(claim.clone()))
    }

    async fn list_for_customer(
        &self,
        business: &BusinessKey,
        customer: &CustomerKey,
    ) -> Result<Vec<RewardClaim>, DomainError> {
        let state = self.state.lock();
        let mut claims: Vec<RewardClaim> = state
            .claims
            .values()
            .filter(|c| &c.business_key == business && &c.customer_key == customer)
            .cloned()
            .collect();
        claims.sort_by(|a, b| b.cycle_number.cmp(&a.cycle_number));
        Ok(claims)
    }
}

#[async_trait]
impl CampaignRepository for MemoryStore {
    async fn start_campaign(&self, draft: &CampaignDraft) -> Result<Option<CampaignRecord>, DomainError> {
        let mut state = self.state.lock();
        let reserved: Vec<CustomerKey> = draft
            .candidates
            .iter()
            .filter(|candidate| {
                state
                    .contacts
                    .get(&(draft.business_key.clone(), (*candidate).clone()))
                    .map_or(true, |(last, _)| *last <= draft.window_start)
            })
            .cloned()
            .collect();
        if reserved.is_empty() {
            return Ok(None);
        }

        for key in &reserved {
            state
                .contacts
                .insert((draft.business_key.clone(), key.clone()), (draft.created_at, draft.id));
        }
        let record = draft.clone().into_record(&reserved);
        state.campaigns.insert(record.id, record.clone());
        Ok(Some(record))
    }

    async fn record_outcome(&self, campaign_id: Uuid, recipient: &CampaignRecipient) -> Result<(), DomainError> {
        let mut state = self.state.lock();
        let campaign = state
            .campaigns
            .get_mut(&campaign_id)
            .ok_or_else(|| DomainError::StorageUnavailable(format!("campaign {} does not exist", campaign_id)))?;
        if !campaign.recipients.iter().any(|r| r.customer_key == recipient.customer_key) {
            campaign.recipients.push(recipient.clone());
        }
        Ok(())
    }

    async fn finalize(&self, result: &CampaignResult, finished_at: DateTime<Utc>) -> Result<(), DomainError> {
        let mut state = self.state.lock();
        if let Some(campaign) = state.campaigns.get_mut(&result.campaign_id) {
            if !campaign.is_finished() {
                campaign.sent_count = result.sent_count;
                campaign.failed_count = result.failed_count;
                campaign.skipped_count = result.skipped_count;
                campaign.status = result.status;
                campaign.finished_at = Some(finished_at);
            }
        }
        Ok(())
    }

    async fn find_by_id(&self, business: &BusinessKey, id: Uuid) -> Result<Option<CampaignRecord>, DomainError> {
        Ok(self
            .state
            .lock()
            .campaigns
            .get(&id)
            .filter(|c| &c.business_key == business)
            .cloned())
    }

    async fn list_by_business(
        &self,
        business: &BusinessKey,
        pagination: Pagination,
    ) -> Result<Vec<CampaignRecord>, DomainError> {
        let state = self.state.lock();
        let mut records: Vec<CampaignRecord> = state
            .campaigns
            .values()
            .filter(|c| &c.business_key == business)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let offset = usize::try_from(pagination.offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(pagination.limit()).unwrap_or(usize::MAX);
        Ok(records.into_iter().skip(offset).take(limit).collect())
    }
}

#[async_trait]
impl StorageHealth for MemoryStore {
    async fn ping(&self) -> Result<(), DomainError> {
        Ok(())
    }
}
