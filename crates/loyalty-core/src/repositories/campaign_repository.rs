//! Campaign repository trait (port)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use loyalty_shared::Pagination;

use crate::domain::{BusinessKey, CampaignDraft, CampaignRecipient, CampaignRecord, CampaignResult};
use crate::error::DomainError;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CampaignRepository: Send + Sync {
    /// Marks as contacted by the draft's campaign every candidate whose last
    /// contact from this business is at or before `window_start`, and stores
    /// the `in_progress` record targeting exactly those (see
    /// [`CampaignDraft::into_record`]). Reservation and record are one atomic
    /// write, so concurrent dispatches never both win the same customer and a
    /// failure never leaves customers reserved without a campaign.
    /// `None` when every candidate is rate limited; nothing is written then.
    async fn start_campaign(&self, draft: &CampaignDraft) -> Result<Option<CampaignRecord>, DomainError>;

    async fn record_outcome(&self, campaign_id: Uuid, recipient: &CampaignRecipient) -> Result<(), DomainError>;

    async fn finalize(
        &self,
        result: &CampaignResult,
        finished_at: DateTime<Utc>,
    ) -> Result<(), DomainError>;

    async fn find_by_id(&self, business: &BusinessKey, id: Uuid) -> Result<Option<CampaignRecord>, DomainError>;

    /// Newest first.
    async fn list_by_business(
        &self,
        business: &BusinessKey,
        pagination: Pagination,
    ) -> Result<Vec<CampaignRecord>, DomainError>;
}
