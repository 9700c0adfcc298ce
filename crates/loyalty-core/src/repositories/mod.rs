//! Repository traits (ports)
//!
//! Every mutating method is a single atomic operation against the backing
//! store. Implementations must not emulate them with read-then-write.

pub mod business_repository;
pub mod customer_repository;
pub mod visit_repository;
pub mod reward_claim_repository;
pub mod campaign_repository;

use async_trait::async_trait;

use crate::error::DomainError;

pub use business_repository::BusinessRepository;
pub use customer_repository::CustomerRepository;
pub use visit_repository::{VisitRepository, VisitWrite};
pub use reward_claim_repository::{ClaimInsert, ClaimTransition, RewardClaimRepository};
pub use campaign_repository::CampaignRepository;

#[cfg(test)]
pub use business_repository::MockBusinessRepository;
#[cfg(test)]
pub use customer_repository::MockCustomerRepository;
#[cfg(test)]
pub use visit_repository::MockVisitRepository;
#[cfg(test)]
pub use reward_claim_repository::MockRewardClaimRepository;
#[cfg(test)]
pub use campaign_repository::MockCampaignRepository;

/// Readiness check for the backing store.
#[async_trait]
pub trait StorageHealth: Send + Sync {
    async fn ping(&self) -> Result<(), DomainError>;
}
