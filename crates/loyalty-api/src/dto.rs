//! Request and response payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use loyalty_core::domain::{Customer, RewardClaim};

#[derive(Debug, Deserialize, Validate)]
pub struct RecordVisitRequest {
    #[validate(length(min = 1, max = 2048, message = "Identity payload is required"))]
    pub identity_payload: String,

    #[validate(length(min = 1, max = 100, message = "Business key is required"))]
    pub business_key: String,
}

#[derive(Debug, Serialize)]
pub struct VisitResponse {
    pub customer: String,
    pub visit_count: i64,
    pub visits_in_cycle: i64,
    pub visit_goal: i64,
    pub reward_issued: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claim_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claim_qr_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ClaimDetails {
    pub token: String,
    pub customer: String,
    pub business: String,
    pub reward_title: String,
    pub cycle_number: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<DateTime<Utc>>,
}

impl From<RewardClaim> for ClaimDetails {
    fn from(claim: RewardClaim) -> Self {
        Self {
            token: claim.token.to_string(),
            customer: claim.customer_key.to_string(),
            business: claim.business_key.to_string(),
            reward_title: claim.reward_title,
            cycle_number: claim.cycle_number,
            status: claim.status.as_str().to_string(),
            created_at: claim.created_at,
            claimed_at: claim.claimed_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RedeemResponse {
    pub customer: String,
    pub reward_title: String,
    pub claimed_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct DispatchCampaignRequest {
    #[validate(length(min = 1, max = 120, message = "Title must be between 1 and 120 characters"))]
    pub title: String,

    #[validate(length(min = 1, max = 4096, message = "Body must be between 1 and 4096 characters"))]
    pub body: String,

    #[validate(length(min = 1, message = "At least one customer key is required"))]
    pub customer_keys: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterCustomerRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub display_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterCustomerResponse {
    pub customer: Customer,
    pub scan_url: String,
    pub qr_url: String,
    pub visit_count: i64,
    pub reward_issued: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claim_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}
