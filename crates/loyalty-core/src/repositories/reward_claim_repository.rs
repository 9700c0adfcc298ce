//! Reward claim repository trait (port)

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{BusinessKey, ClaimToken, CustomerKey, NewRewardClaim, RewardClaim};
use crate::error::DomainError;

/// Result of a guarded insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimInsert {
    Inserted(RewardClaim),
    /// A claim for this (business, customer, cycle) already exists; it is
    /// returned unchanged.
    CycleAlreadyIssued(RewardClaim),
    /// The token collided with another claim; nothing was written.
    TokenTaken,
}

/// Result of a conditional `pending -> claimed` update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimTransition {
    Claimed(RewardClaim),
    AlreadyClaimed(RewardClaim),
    NotFound,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RewardClaimRepository: Send + Sync {
    /// Inserts a pending claim guarded by unique (token) and unique
    /// (business, customer, cycle).
    async fn insert_pending(&self, claim: &NewRewardClaim) -> Result<ClaimInsert, DomainError>;

    async fn find_by_token(&self, token: &ClaimToken) -> Result<Option<RewardClaim>, DomainError>;

    async fn find_by_cycle(
        &self,
        business: &BusinessKey,
        customer: &CustomerKey,
        cycle_number: i64,
    ) -> Result<Option<RewardClaim>, DomainError>;

    /// Single conditional write: succeeds only while the claim is pending.
    async fn mark_claimed(&self, token: &ClaimToken, claimed_at: DateTime<Utc>) -> Result<ClaimTransition, DomainError>;

    async fn list_for_customer(
        &self,
        business: &BusinessKey,
        customer: &CustomerKey,
    ) -> Result<Vec<RewardClaim>, DomainError>;
}
