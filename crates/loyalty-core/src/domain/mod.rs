//! # Loyalty Core - Domain Module
//! 
//! Domain entities for the loyalty cycle engine.

pub mod keys;
pub mod business;
pub mod customer;
pub mod visit;
pub mod reward_claim;
pub mod campaign;

// Re-export all entities and enums
pub use keys::{BusinessKey, CustomerKey};
pub use business::{Business, Channel, VisitGoal};
pub use customer::{Customer, NewCustomer};
pub use visit::{CycleProgress, NewVisit, VisitEvent, VisitRecord};
pub use reward_claim::{ClaimStatus, ClaimToken, NewRewardClaim, RewardClaim, RewardEvaluation, RewardOutcome};
pub use campaign::{
    CampaignDraft, CampaignRecipient, CampaignRecord, CampaignResult, CampaignStatus, CampaignTally, DeliveryOutcome,
};
