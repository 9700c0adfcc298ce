//! Reward cycle engine: records a visit and reports the claim it produced

use std::sync::Arc;

use tracing::warn;

use crate::domain::{Business, BusinessKey, CustomerKey, RewardEvaluation, RewardOutcome, VisitRecord};
use crate::error::DomainError;
use crate::services::{TokenIssuer, VisitLedger};

pub struct RewardCycleEngine {
    ledger: Arc<VisitLedger>,
    issuer: Arc<TokenIssuer>,
}

impl RewardCycleEngine {
    pub fn new(ledger: Arc<VisitLedger>, issuer: Arc<TokenIssuer>) -> Self {
        Self { ledger, issuer }
    }

    /// Records one visit. When it completes a cycle the claim is written in
    /// the same store operation, so an error here means neither happened and
    /// the call can be retried as a whole.
    pub async fn evaluate_and_issue(
        &self,
        customer: &CustomerKey,
        business: &BusinessKey,
    ) -> Result<RewardEvaluation, DomainError> {
        let tenant = self.ledger.load_business(business).await?;
        let visit = self.ledger.record_visit_for(&tenant, customer).await?;
        self.evaluate(&tenant, visit).await
    }

    /// Outcome for a visit the ledger already recorded.
    pub async fn evaluate(&self, business: &Business, visit: VisitRecord) -> Result<RewardEvaluation, DomainError> {
        if !visit.cycle_reached {
            return Ok(RewardEvaluation { visit, outcome: RewardOutcome::NoReward });
        }

        let token = match &visit.claim {
            Some(claim) => claim.token.clone(),
            None => {
                // Issuance is idempotent per cycle; only reached when a store
                // returns a completed cycle without its claim.
                warn!(
                    "Store returned cycle {} for {} in {} without a claim; issuing separately",
                    visit.cycle_number(),
                    visit.event.customer_key,
                    business.key
                );
                self.issuer
                    .issue(&visit.event.customer_key, &business.key, visit.cycle_number(), &business.reward_title)
                    .await?
                    .token
            }
        };
        Ok(RewardEvaluation { visit, outcome: RewardOutcome::RewardIssued(token) })
    }
}
