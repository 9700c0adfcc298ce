// ============================================================================
// Loyalty Core - Campaign Dispatcher
// File: crates/loyalty-core/src/services/campaign_dispatcher.rs
// Description: Rate-limited campaign fan-out with per-recipient channel failover
// ============================================================================

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use loyalty_shared::constants::{
    DEFAULT_CAMPAIGN_PACING_MS, DEFAULT_SEND_TIMEOUT_MS, DEFAULT_STORAGE_TIMEOUT_MS, MAX_CAMPAIGN_BODY_LENGTH,
    MAX_CAMPAIGN_RECIPIENTS, MAX_CAMPAIGN_TITLE_LENGTH, RATE_LIMIT_WINDOW_HOURS,
};
use loyalty_shared::utils::{mask_email, mask_phone};
use loyalty_shared::Pagination;

use crate::domain::{
    Business, BusinessKey, CampaignDraft, CampaignRecipient, CampaignRecord, CampaignResult, CampaignTally, Channel,
    Customer, CustomerKey, DeliveryOutcome,
};
use crate::error::DomainError;
use crate::ports::{EmailSender, PhoneMessenger, TransportError};
use crate::repositories::{BusinessRepository, CampaignRepository, CustomerRepository};
use crate::services::{with_storage_timeout, MessageContext, MessageRenderer};

#[derive(Debug, Clone, Copy)]
pub struct DispatchSettings {
    /// Delay between consecutive recipients.
    pub pacing: Duration,
    /// Upper bound for a single channel send.
    pub send_timeout: Duration,
    pub storage_timeout: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            pacing: Duration::from_millis(DEFAULT_CAMPAIGN_PACING_MS),
            send_timeout: Duration::from_millis(DEFAULT_SEND_TIMEOUT_MS),
            storage_timeout: Duration::from_millis(DEFAULT_STORAGE_TIMEOUT_MS),
        }
    }
}

pub struct CampaignDispatcher {
    businesses: Arc<dyn BusinessRepository>,
    customers: Arc<dyn CustomerRepository>,
    campaigns: Arc<dyn CampaignRepository>,
    phone: Arc<dyn PhoneMessenger>,
    email: Arc<dyn EmailSender>,
    renderer: MessageRenderer,
    settings: DispatchSettings,
}

impl CampaignDispatcher {
    pub fn new(
        businesses: Arc<dyn BusinessRepository>,
        customers: Arc<dyn CustomerRepository>,
        campaigns: Arc<dyn CampaignRepository>,
        phone: Arc<dyn PhoneMessenger>,
        email: Arc<dyn EmailSender>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            businesses,
            customers,
            campaigns,
            phone,
            email,
            renderer: MessageRenderer::new(),
            settings,
        }
    }

    /// Sends one campaign to every candidate not contacted by this business in
    /// the last 24 hours. Individual delivery failures never abort the batch.
    pub async fn dispatch(
        &self,
        business: &BusinessKey,
        title: &str,
        body: &str,
        candidates: &[CustomerKey],
    ) -> Result<CampaignResult, DomainError> {
        let (title, body) = self.validate(title, body)?;
        let unique = dedupe(candidates);
        if unique.is_empty() {
            return Err(DomainError::ValidationError("At least one customer is required".to_string()));
        }
        if unique.len() > MAX_CAMPAIGN_RECIPIENTS {
            return Err(DomainError::ValidationError(format!(
                "A campaign can target at most {} customers",
                MAX_CAMPAIGN_RECIPIENTS
            )));
        }

        let tenant = self.storage("find_business", self.businesses.find_by_key(business))
            .await?
            .ok_or_else(|| DomainError::BusinessNotFound(business.to_string()))?;

        let now = Utc::now();
        let draft = CampaignDraft {
            id: Uuid::new_v4(),
            business_key: business.clone(),
            title: title.to_string(),
            body: body.to_string(),
            candidates: unique,
            created_at: now,
            window_start: now - chrono::Duration::hours(RATE_LIMIT_WINDOW_HOURS),
        };
        let Some(record) = self.storage("start_campaign", self.campaigns.start_campaign(&draft)).await? else {
            warn!(
                "Campaign for {} dropped: all {} candidates contacted within the window",
                business,
                draft.candidates.len()
            );
            return Err(DomainError::AllRateLimited);
        };

        let campaign_id = record.id;
        let eligible = record.target_keys;
        let rate_limited = draft.candidates.len().saturating_sub(eligible.len());
        info!(
            "Campaign {} started for {}: {} eligible, {} rate limited",
            campaign_id,
            business,
            eligible.len(),
            rate_limited
        );

        let mut tally = CampaignTally::new(eligible.len(), rate_limited);
        for (index, customer) in eligible.iter().enumerate() {
            if index > 0 && !self.settings.pacing.is_zero() {
                tokio::time::sleep(self.settings.pacing).await;
            }

            let recipient = self.deliver(&tenant, customer, title, body).await;
            tally.record(recipient.outcome);

            if let Err(e) = self
                .storage("record_outcome", self.campaigns.record_outcome(campaign_id, &recipient))
                .await
            {
                error!("Failed to record outcome for {} in campaign {}: {}", customer, campaign_id, e);
            }
        }

        let result = tally.result(campaign_id);
        if let Err(e) = self
            .storage("finalize_campaign", self.campaigns.finalize(&result, Utc::now()))
            .await
        {
            error!("Failed to finalize campaign {}: {}", campaign_id, e);
        }

        info!(
            "Campaign {} finished with status {}: sent {}, failed {}, skipped {}",
            campaign_id,
            result.status.as_str(),
            result.sent_count,
            result.failed_count,
            result.skipped_count
        );
        Ok(result)
    }

    pub async fn history(
        &self,
        business: &BusinessKey,
        pagination: Pagination,
    ) -> Result<Vec<CampaignRecord>, DomainError> {
        self.storage("list_campaigns", self.campaigns.list_by_business(business, pagination))
            .await
    }

    pub async fn find(&self, business: &BusinessKey, id: Uuid) -> Result<Option<CampaignRecord>, DomainError> {
        self.storage("find_campaign", self.campaigns.find_by_id(business, id)).await
    }

    fn validate<'a>(&self, title: &'a str, body: &'a str) -> Result<(&'a str, &'a str), DomainError> {
        let title = title.trim();
        let body = body.trim();
        if title.is_empty() || title.chars().count() > MAX_CAMPAIGN_TITLE_LENGTH {
            return Err(DomainError::ValidationError(format!(
                "Title must be between 1 and {} characters",
                MAX_CAMPAIGN_TITLE_LENGTH
            )));
        }
        if body.is_empty() || body.chars().count() > MAX_CAMPAIGN_BODY_LENGTH {
            return Err(DomainError::ValidationError(format!(
                "Body must be between 1 and {} characters",
                MAX_CAMPAIGN_BODY_LENGTH
            )));
        }
        self.renderer.validate_template(body)?;
        Ok((title, body))
    }

    async fn deliver(&self, business: &Business, key: &CustomerKey, title: &str, body: &str) -> CampaignRecipient {
        let customer = match self.storage("find_customer", self.customers.find(&business.key, key)).await {
            Ok(Some(customer)) => customer,
            Ok(None) => return recipient(key, DeliveryOutcome::Failed, None, Some("customer not found".to_string())),
            Err(e) => return recipient(key, DeliveryOutcome::Failed, None, Some(e.to_string())),
        };

        let context = MessageContext {
            name: customer.display_name.clone(),
            business: business.name.clone(),
            reward: business.reward_title.clone(),
            visits: customer.visit_count,
        };

        let mut failures = Vec::new();
        for channel in business.channels() {
            let Some(contact) = customer.contact_for(channel) else {
                continue;
            };

            let sent = match tokio::time::timeout(
                self.settings.send_timeout,
                self.send_via(channel, contact, title, body, &context),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(DomainError::from(TransportError::Timeout)),
            };

            match sent {
                Ok(()) => {
                    debug!("Campaign message sent to {} via {}", describe(&customer, channel), channel.as_str());
                    return recipient(key, DeliveryOutcome::Sent, Some(channel), join_failures(&failures));
                }
                Err(e) => {
                    warn!("Send via {} to {} failed: {}", channel.as_str(), describe(&customer, channel), e);
                    failures.push(format!("{}: {}", channel.as_str(), e));
                }
            }
        }

        if failures.is_empty() {
            debug!("Customer {} has no usable contact channel", key);
            recipient(key, DeliveryOutcome::SkippedNoChannel, None, None)
        } else {
            recipient(key, DeliveryOutcome::Failed, None, join_failures(&failures))
        }
    }

    async fn send_via(
        &self,
        channel: Channel,
        contact: &str,
        title: &str,
        body: &str,
        context: &MessageContext,
    ) -> Result<(), DomainError> {
        match channel {
            Channel::Phone => {
                let text = self
                    .renderer
                    .render_text(body, context)
                    .map_err(|e| TransportError::Rejected(e.to_string()))?;
                Ok(self.phone.send_phone_message(contact, &text).await?)
            }
            Channel::Email => {
                let html = self
                    .renderer
                    .render_html(body, context)
                    .map_err(|e| TransportError::Rejected(e.to_string()))?;
                Ok(self.email.send_email(contact, title, &html).await?)
            }
        }
    }

    async fn storage<T, F>(&self, op: &str, fut: F) -> Result<T, DomainError>
    where
        F: std::future::Future<Output = Result<T, DomainError>>,
    {
        with_storage_timeout(self.settings.storage_timeout, op, fut).await
    }
}

/// Keeps first occurrence order.
fn dedupe(candidates: &[CustomerKey]) -> Vec<CustomerKey> {
    let mut seen = HashSet::with_capacity(candidates.len());
    candidates.iter().filter(|key| seen.insert((*key).clone())).cloned().collect()
}

fn recipient(
    key: &CustomerKey,
    outcome: DeliveryOutcome,
    channel: Option<Channel>,
    detail: Option<String>,
) -> CampaignRecipient {
    CampaignRecipient {
        customer_key: key.clone(),
        outcome,
        channel,
        detail,
        recorded_at: Utc::now(),
    }
}

fn join_failures(failures: &[String]) -> Option<String> {
    (!failures.is_empty()).then(|| failures.join("; "))
}

fn describe(customer: &Customer, channel: Channel) -> String {
    match (channel, customer.contact_for(channel)) {
        (Channel::Phone, Some(phone)) => mask_phone(phone),
        (Channel::Email, Some(email)) => mask_email(email),
        _ => customer.key.to_string(),
    }
}
