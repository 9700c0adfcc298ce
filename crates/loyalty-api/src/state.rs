use std::sync::Arc;

use loyalty_core::ports::QrRenderer;
use loyalty_core::repositories::StorageHealth;
use loyalty_core::services::{CampaignDispatcher, CustomerService, IdentityResolver, RewardCycleEngine, TokenIssuer};

use crate::middleware::rate_limit::ClaimRateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<IdentityResolver>,
    pub engine: Arc<RewardCycleEngine>,
    pub issuer: Arc<TokenIssuer>,
    pub customers: Arc<CustomerService>,
    pub dispatcher: Arc<CampaignDispatcher>,
    pub qr: Arc<dyn QrRenderer>,
    pub storage: Arc<dyn StorageHealth>,
    pub claim_limiter: Arc<ClaimRateLimiter>,
    /// Customer-facing scan page; scan links are `{scan_base_url}?customer=<key>`.
    pub scan_base_url: String,
}
