// ============================================================================
// Loyalty Core - Reward Claim Entity
// File: crates/loyalty-core/src/domain/reward_claim.rs
// Description: Single-use claim credential and its pending -> claimed lifecycle
// ============================================================================

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::keys::{BusinessKey, CustomerKey};
use super::visit::VisitRecord;

/// Fixed-length numeric claim credential.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimToken(String);

impl ClaimToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Exactly `digits` ASCII digits.
    pub fn is_well_formed(&self, digits: usize) -> bool {
        self.0.len() == digits && self.0.bytes().all(|b| b.is_ascii_digit())
    }
}

impl fmt::Display for ClaimToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Claim lifecycle. `Claimed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Pending,
    Claimed,
}

impl ClaimStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::Pending => "pending",
            ClaimStatus::Claimed => "claimed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ClaimStatus::Pending),
            "claimed" => Some(ClaimStatus::Claimed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardClaim {
    pub token: ClaimToken,
    pub customer_key: CustomerKey,
    pub business_key: BusinessKey,
    pub cycle_number: i64,
    /// Reward title as it was when the cycle completed.
    pub reward_title: String,
    pub status: ClaimStatus,
    pub created_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
}

impl RewardClaim {
    pub fn is_pending(&self) -> bool {
        self.status == ClaimStatus::Pending
    }
}

/// Insert payload for a pending claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRewardClaim {
    pub token: ClaimToken,
    pub customer_key: CustomerKey,
    pub business_key: BusinessKey,
    pub cycle_number: i64,
    pub reward_title: String,
    pub created_at: DateTime<Utc>,
}

impl NewRewardClaim {
    pub fn into_pending(self) -> RewardClaim {
        RewardClaim {
            token: self.token,
            customer_key: self.customer_key,
            business_key: self.business_key,
            cycle_number: self.cycle_number,
            reward_title: self.reward_title,
            status: ClaimStatus::Pending,
            created_at: self.created_at,
            claimed_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewardOutcome {
    NoReward,
    RewardIssued(ClaimToken),
}

impl RewardOutcome {
    pub fn token(&self) -> Option<&ClaimToken> {
        match self {
            RewardOutcome::NoReward => None,
            RewardOutcome::RewardIssued(token) => Some(token),
        }
    }
}

/// What one recorded visit produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardEvaluation {
    pub visit: VisitRecord,
    pub outcome: RewardOutcome,
}
