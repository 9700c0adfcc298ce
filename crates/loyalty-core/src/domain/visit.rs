//! Visit events and cycle position

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::business::VisitGoal;
use super::keys::{BusinessKey, CustomerKey};
use super::reward_claim::{ClaimToken, NewRewardClaim, RewardClaim};

/// Append-only record of one successful visit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitEvent {
    pub id: Uuid,
    pub customer_key: CustomerKey,
    pub business_key: BusinessKey,
    pub recorded_at: DateTime<Utc>,
    /// Cumulative count after this visit.
    pub resulting_count: i64,
}

/// Write payload for one visit. The store increments the count, appends the
/// event and, when the new count closes a cycle, inserts the pending claim
/// under `claim_token`, all in the same atomic operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVisit {
    pub business_key: BusinessKey,
    pub customer_key: CustomerKey,
    pub recorded_at: DateTime<Utc>,
    pub visit_goal: VisitGoal,
    /// Reward title at the time of the visit.
    pub reward_title: String,
    /// Only used when the visit closes a cycle.
    pub claim_token: ClaimToken,
}

impl NewVisit {
    /// The claim owed once the count reaches `resulting_count`, if any.
    pub fn claim_for(&self, resulting_count: i64) -> Option<NewRewardClaim> {
        self.visit_goal.is_cycle_boundary(resulting_count).then(|| NewRewardClaim {
            token: self.claim_token.clone(),
            customer_key: self.customer_key.clone(),
            business_key: self.business_key.clone(),
            cycle_number: self.visit_goal.cycle_number(resulting_count),
            reward_title: self.reward_title.clone(),
            created_at: self.recorded_at,
        })
    }
}

/// Result of recording one visit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitRecord {
    pub event: VisitEvent,
    pub visit_goal: VisitGoal,
    pub cycle_reached: bool,
    /// Claim for the completed cycle; set whenever `cycle_reached` is.
    pub claim: Option<RewardClaim>,
}

impl VisitRecord {
    pub fn new(event: VisitEvent, visit_goal: VisitGoal, claim: Option<RewardClaim>) -> Self {
        let cycle_reached = visit_goal.is_cycle_boundary(event.resulting_count);
        Self { event, visit_goal, cycle_reached, claim }
    }

    pub fn new_count(&self) -> i64 {
        self.event.resulting_count
    }

    pub fn cycle_number(&self) -> i64 {
        self.visit_goal.cycle_number(self.event.resulting_count)
    }

    pub fn progress(&self) -> CycleProgress {
        self.visit_goal.progress(self.event.resulting_count)
    }
}

/// Position of a customer inside the current reward cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleProgress {
    pub visit_count: i64,
    pub visit_goal: i64,
    pub visits_in_cycle: i64,
    pub remaining: i64,
    pub completed_cycles: i64,
}
